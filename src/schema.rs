//! Collection schemas and the entities that conform to them
//!
//! Schemas and entities are checked locally, before anything reaches the
//! service: [`CollectionSchema::validate`] for declarations and
//! [`CollectionSchema::validate_entity`] for rows.

use crate::error::{Result, VectorDbError};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Largest vector dimension the service accepts.
pub const MAX_DIMENSION: usize = 32_768;

/// Kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int64,
    FloatVector,
}

impl DataType {
    pub fn is_vector(self) -> bool {
        matches!(self, DataType::FloatVector)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Int64 => "Int64",
            DataType::FloatVector => "FloatVector",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Int64" | "INT64" => Some(DataType::Int64),
            "FloatVector" | "FLOAT_VECTOR" => Some(DataType::FloatVector),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared field of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: DataType,
    /// Required for vector fields
    pub dim: Option<usize>,
    pub is_primary: bool,
    #[serde(default)]
    pub description: String,
}

impl FieldSchema {
    pub fn int64(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Int64,
            dim: None,
            is_primary: false,
            description: String::new(),
        }
    }

    pub fn float_vector(name: impl Into<String>, dim: usize) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::FloatVector,
            dim: Some(dim),
            is_primary: false,
            description: String::new(),
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Named, typed layout of a collection. Immutable once created on the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }

    pub fn vector_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.data_type.is_vector())
    }

    /// Check the declaration itself.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(VectorDbError::schema(&self.name, reason));

        if self.name.is_empty() {
            return fail("collection name is empty".to_string());
        }
        if self.fields.is_empty() {
            return fail("no fields declared".to_string());
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return fail("field with empty name".to_string());
            }
            if !seen.insert(field.name.as_str()) {
                return fail(format!("duplicate field '{}'", field.name));
            }
            match (field.data_type, field.dim) {
                (DataType::FloatVector, None) => {
                    return fail(format!("vector field '{}' has no dimension", field.name));
                }
                (DataType::FloatVector, Some(dim)) if dim == 0 || dim > MAX_DIMENSION => {
                    return fail(format!(
                        "vector field '{}' has dimension {}, expected 1..={}",
                        field.name, dim, MAX_DIMENSION
                    ));
                }
                (DataType::Int64, Some(_)) => {
                    return fail(format!("scalar field '{}' cannot declare a dimension", field.name));
                }
                _ => {}
            }
        }

        let primaries: Vec<&FieldSchema> = self.fields.iter().filter(|f| f.is_primary).collect();
        match primaries.as_slice() {
            [] => return fail("no primary field declared".to_string()),
            [pk] if pk.data_type != DataType::Int64 => {
                return fail(format!("primary field '{}' must be Int64", pk.name));
            }
            [_] => {}
            many => return fail(format!("{} primary fields declared, expected one", many.len())),
        }

        if self.vector_fields().next().is_none() {
            return fail("no vector field declared".to_string());
        }
        Ok(())
    }

    /// Check one row against the declared fields.
    pub fn validate_entity(&self, entity: &Entity) -> Result<()> {
        let fail = |reason: String| Err(VectorDbError::validation(&self.name, reason));

        for field in &self.fields {
            match (entity.get(&field.name), field.data_type) {
                (None, _) => return fail(format!("missing field '{}'", field.name)),
                (Some(FieldValue::Int64(_)), DataType::Int64) => {}
                (Some(FieldValue::FloatVector(v)), DataType::FloatVector) => {
                    let expected = field.dim.unwrap_or(0);
                    if v.dimension() != expected {
                        return fail(format!(
                            "field '{}' expects dimension {}, got {}",
                            field.name,
                            expected,
                            v.dimension()
                        ));
                    }
                    if let Err(err) = v.check_finite() {
                        return fail(format!("field '{}': {}", field.name, err));
                    }
                }
                (Some(value), expected) => {
                    return fail(format!(
                        "field '{}' expects {}, got {}",
                        field.name,
                        expected,
                        value.data_type()
                    ));
                }
            }
        }

        if let Some(extra) = entity.field_names().find(|name| self.field(name).is_none()) {
            return fail(format!("undeclared field '{}'", extra));
        }
        Ok(())
    }
}

/// Value of a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int64(i64),
    FloatVector(Vector),
}

impl FieldValue {
    pub fn data_type(&self) -> DataType {
        match self {
            FieldValue::Int64(_) => DataType::Int64,
            FieldValue::FloatVector(_) => DataType::FloatVector,
        }
    }
}

/// One row, keyed by field name. Serialized as a flat JSON object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity {
    values: BTreeMap<String, FieldValue>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_int64(mut self, field: impl Into<String>, value: i64) -> Self {
        self.set(field, FieldValue::Int64(value));
        self
    }

    pub fn with_vector(mut self, field: impl Into<String>, vector: impl Into<Vector>) -> Self {
        self.set(field, FieldValue::FloatVector(vector.into()));
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.values.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn int64(&self, field: &str) -> Option<i64> {
        match self.values.get(field) {
            Some(FieldValue::Int64(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn vector(&self, field: &str) -> Option<&Vector> {
        match self.values.get(field) {
            Some(FieldValue::FloatVector(v)) => Some(v),
            _ => None,
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn demo_schema() -> CollectionSchema {
        CollectionSchema::new("demo")
            .with_field(FieldSchema::int64("id_field").primary())
            .with_field(FieldSchema::float_vector("float_vector_field", 4))
    }

    #[test]
    fn test_valid_schema() {
        assert!(demo_schema().validate().is_ok());
        assert_eq!(demo_schema().primary_field().unwrap().name, "id_field");
    }

    #[test]
    fn test_schema_without_primary() {
        let schema = CollectionSchema::new("demo")
            .with_field(FieldSchema::int64("id_field"))
            .with_field(FieldSchema::float_vector("v", 4));
        let err = schema.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("no primary field"));
    }

    #[test]
    fn test_schema_vector_without_dimension() {
        let mut vector = FieldSchema::float_vector("v", 4);
        vector.dim = None;
        let schema = CollectionSchema::new("demo")
            .with_field(FieldSchema::int64("id").primary())
            .with_field(vector);
        assert_eq!(schema.validate().unwrap_err().kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_schema_rejects_bad_declarations() {
        let two_primaries = demo_schema().with_field(FieldSchema::int64("other").primary());
        let duplicate = demo_schema().with_field(FieldSchema::int64("id_field"));
        let zero_dim = CollectionSchema::new("demo")
            .with_field(FieldSchema::int64("id").primary())
            .with_field(FieldSchema::float_vector("v", 0));
        let vector_primary = CollectionSchema::new("demo")
            .with_field(FieldSchema::float_vector("v", 4).primary());
        let no_vector = CollectionSchema::new("demo").with_field(FieldSchema::int64("id").primary());

        for schema in [two_primaries, duplicate, zero_dim, vector_primary, no_vector] {
            assert_eq!(schema.validate().unwrap_err().kind(), ErrorKind::Schema, "{schema:?}");
        }
    }

    #[test]
    fn test_validate_entity() {
        let schema = demo_schema();
        let good = Entity::new()
            .with_int64("id_field", 1)
            .with_vector("float_vector_field", vec![0.1f32, 0.2, 0.3, 0.4]);
        assert!(schema.validate_entity(&good).is_ok());

        let short = Entity::new()
            .with_int64("id_field", 1)
            .with_vector("float_vector_field", vec![0.1f32, 0.2]);
        let err = schema.validate_entity(&short).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("expects dimension 4, got 2"));

        let missing = Entity::new().with_int64("id_field", 1);
        assert_eq!(schema.validate_entity(&missing).unwrap_err().kind(), ErrorKind::Validation);

        let extra = good.clone().with_int64("color", 3);
        assert!(schema.validate_entity(&extra).unwrap_err().to_string().contains("undeclared"));

        let swapped = Entity::new()
            .with_vector("id_field", vec![1.0f32])
            .with_vector("float_vector_field", vec![0.1f32, 0.2, 0.3, 0.4]);
        assert!(schema.validate_entity(&swapped).unwrap_err().to_string().contains("expects Int64"));
    }

    #[test]
    fn test_entity_json_shape() {
        let entity = Entity::new()
            .with_int64("id_field", 7)
            .with_vector("float_vector_field", vec![0.5f32, 0.25]);
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json, serde_json::json!({"id_field": 7, "float_vector_field": [0.5, 0.25]}));

        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back.int64("id_field"), Some(7));
        assert_eq!(back.vector("float_vector_field").unwrap().dimension(), 2);
    }
}
