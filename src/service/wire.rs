//! JSON wire format of the `/v2/vectordb` REST API.
//!
//! Shared by [`MilvusClient`](super::MilvusClient) and the emulator server so
//! both sides agree on field names and status codes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::distance::MetricType;
use crate::error::{Result, VectorDbError};
use crate::filter::Filter;
use crate::index::{IndexKind, IndexParams, SearchParams};
use crate::schema::{CollectionSchema, DataType, Entity, FieldSchema};
use crate::search::{Hit, SearchRequest};
use crate::vector::Vector;

pub const API_PREFIX: &str = "/v2/vectordb";

pub const CODE_SUCCESS: i32 = 0;
pub const CODE_COLLECTION_NOT_FOUND: i32 = 100;
pub const CODE_COLLECTION_NOT_LOADED: i32 = 101;
pub const CODE_INDEX_NOT_FOUND: i32 = 700;
pub const CODE_INDEX_NOT_SUPPORTED: i32 = 701;
pub const CODE_INDEX_DUPLICATE: i32 = 702;
pub const CODE_PARAMETER_INVALID: i32 = 1100;
pub const CODE_SCHEMA_INVALID: i32 = 1101;
pub const CODE_UNEXPECTED: i32 = 65535;

/// Envelope of every reply
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: None,
            data: Some(data),
        }
    }

    pub fn error(err: &VectorDbError) -> Self {
        Self {
            code: error_code(err),
            message: Some(error_message(err)),
            data: None,
        }
    }
}

/// Status code a service reports for `err`.
pub fn error_code(err: &VectorDbError) -> i32 {
    match err.root() {
        VectorDbError::NotFound { what, .. } if what.starts_with("index") => CODE_INDEX_NOT_FOUND,
        VectorDbError::NotFound { .. } => CODE_COLLECTION_NOT_FOUND,
        VectorDbError::NotLoaded { .. } => CODE_COLLECTION_NOT_LOADED,
        VectorDbError::Index { .. } => CODE_INDEX_DUPLICATE,
        VectorDbError::Schema { .. } => CODE_SCHEMA_INVALID,
        VectorDbError::Validation { .. }
        | VectorDbError::DimensionMismatch { .. }
        | VectorDbError::InvalidVector { .. }
        | VectorDbError::InvalidFilter { .. }
        | VectorDbError::Json(_) => CODE_PARAMETER_INVALID,
        VectorDbError::Service { code, .. } => *code,
        _ => CODE_UNEXPECTED,
    }
}

/// Message without the collection prefix the receiving side adds back.
fn error_message(err: &VectorDbError) -> String {
    match err.root() {
        VectorDbError::Schema { reason, .. }
        | VectorDbError::Validation { reason, .. }
        | VectorDbError::Index { reason, .. } => reason.clone(),
        VectorDbError::Service { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Rebuild a typed error from a reply's status code.
pub fn decode_error(code: i32, message: String, collection: &str, field: Option<&str>) -> VectorDbError {
    match code {
        CODE_COLLECTION_NOT_FOUND => VectorDbError::not_found(collection, "collection"),
        CODE_COLLECTION_NOT_LOADED => VectorDbError::NotLoaded {
            collection: collection.to_string(),
        },
        CODE_INDEX_NOT_FOUND => {
            VectorDbError::not_found(collection, format!("index '{}'", field.unwrap_or_default()))
        }
        CODE_INDEX_NOT_SUPPORTED | CODE_INDEX_DUPLICATE => {
            VectorDbError::index(collection, field.unwrap_or_default(), message)
        }
        CODE_PARAMETER_INVALID => VectorDbError::validation(collection, message),
        CODE_SCHEMA_INVALID => VectorDbError::schema(collection, message),
        code => VectorDbError::Service { code, message },
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRequest {
    pub collection_name: String,
}

impl CollectionRequest {
    pub fn new(name: &str) -> Self {
        Self {
            collection_name: name.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HasData {
    pub has: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    pub collection_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub schema: SchemaSpec,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSpec {
    #[serde(default)]
    pub auto_id: bool,
    #[serde(default)]
    pub enable_dynamic_field: bool,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub field_name: String,
    pub data_type: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type_params: Option<ElementTypeParams>,
}

/// Dimension travels as a string, as the service encodes it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ElementTypeParams {
    pub dim: String,
}

impl From<&CollectionSchema> for CreateCollectionRequest {
    fn from(schema: &CollectionSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|f| FieldSpec {
                field_name: f.name.clone(),
                data_type: f.data_type.as_str().to_string(),
                is_primary: f.is_primary,
                description: f.description.clone(),
                element_type_params: f.dim.map(|dim| ElementTypeParams {
                    dim: dim.to_string(),
                }),
            })
            .collect();
        Self {
            collection_name: schema.name.clone(),
            description: schema.description.clone(),
            schema: SchemaSpec {
                auto_id: false,
                enable_dynamic_field: false,
                fields,
            },
        }
    }
}

impl CreateCollectionRequest {
    pub fn into_schema(self) -> Result<CollectionSchema> {
        let name = self.collection_name;
        let fields = self
            .schema
            .fields
            .into_iter()
            .map(|f| -> Result<FieldSchema> {
                let dim = f
                    .element_type_params
                    .map(|p| parse_dim(&name, &f.field_name, &p.dim))
                    .transpose()?;
                Ok(FieldSchema {
                    data_type: parse_data_type(&name, &f.data_type)?,
                    name: f.field_name,
                    dim,
                    is_primary: f.is_primary,
                    description: f.description,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CollectionSchema {
            name,
            description: self.description,
            fields,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeData {
    pub collection_name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldDescription>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<KeyValue>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl From<&CollectionSchema> for DescribeData {
    fn from(schema: &CollectionSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|f| FieldDescription {
                name: f.name.clone(),
                data_type: f.data_type.as_str().to_string(),
                primary_key: f.is_primary,
                description: f.description.clone(),
                params: f
                    .dim
                    .map(|dim| {
                        vec![KeyValue {
                            key: "dim".to_string(),
                            value: dim.to_string(),
                        }]
                    })
                    .unwrap_or_default(),
            })
            .collect();
        Self {
            collection_name: schema.name.clone(),
            description: schema.description.clone(),
            fields,
        }
    }
}

impl DescribeData {
    pub fn into_schema(self) -> Result<CollectionSchema> {
        let name = self.collection_name;
        let fields = self
            .fields
            .into_iter()
            .map(|f| -> Result<FieldSchema> {
                let dim = f
                    .params
                    .iter()
                    .find(|kv| kv.key == "dim")
                    .map(|kv| parse_dim(&name, &f.name, &kv.value))
                    .transpose()?;
                Ok(FieldSchema {
                    data_type: parse_data_type(&name, &f.data_type)?,
                    name: f.name,
                    dim,
                    is_primary: f.primary_key,
                    description: f.description,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CollectionSchema {
            name,
            description: self.description,
            fields,
        })
    }
}

fn parse_data_type(collection: &str, name: &str) -> Result<DataType> {
    DataType::parse(name)
        .ok_or_else(|| VectorDbError::schema(collection, format!("unsupported data type '{}'", name)))
}

fn parse_dim(collection: &str, field: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| {
        VectorDbError::schema(
            collection,
            format!("field '{}' has invalid dim '{}'", field, value),
        )
    })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRequest {
    pub collection_name: String,
    pub data: Vec<Entity>,
}

/// Borrowing form of [`InsertRequest`] for the sending side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertBody<'a> {
    pub collection_name: &'a str,
    pub data: &'a [Entity],
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertData {
    pub insert_count: usize,
    #[serde(default)]
    pub insert_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexCreateRequest {
    pub collection_name: String,
    pub index_params: Vec<IndexSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSpec {
    pub field_name: String,
    pub index_name: String,
    pub metric_type: MetricType,
    pub params: IndexKind,
}

impl From<&IndexParams> for IndexSpec {
    fn from(index: &IndexParams) -> Self {
        Self {
            field_name: index.field_name.clone(),
            index_name: index.index_name().to_string(),
            metric_type: index.metric,
            params: index.kind,
        }
    }
}

impl From<IndexSpec> for IndexParams {
    fn from(spec: IndexSpec) -> Self {
        IndexParams::new(spec.field_name, spec.params, spec.metric_type)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexNameRequest {
    pub collection_name: String,
    pub index_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStateData {
    pub load_state: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub collection_name: String,
    pub data: Vec<Vector>,
    pub anns_field: String,
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default)]
    pub search_params: SearchParamsSpec,
    #[serde(default)]
    pub output_fields: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParamsSpec {
    #[serde(default)]
    pub params: SearchParams,
}

impl SearchBody {
    /// Body for a single query vector of `request`.
    pub fn single(collection: &str, request: &SearchRequest, vector: &Vector) -> Self {
        Self {
            collection_name: collection.to_string(),
            data: vec![vector.clone()],
            anns_field: request.anns_field.clone(),
            limit: request.limit,
            filter: request.filter.as_ref().map(ToString::to_string),
            search_params: SearchParamsSpec {
                params: request.params,
            },
            output_fields: Vec::new(),
        }
    }

    pub fn into_request(self) -> Result<(String, SearchRequest)> {
        let filter = match self.filter.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(expr) => Some(Filter::parse(expr)?),
        };
        let request = SearchRequest {
            anns_field: self.anns_field,
            vectors: self.data,
            limit: self.limit,
            filter,
            params: self.search_params.params,
        };
        Ok((self.collection_name, request))
    }
}

/// A hit as the service returns it: the primary key under its field name, plus `distance`.
pub fn hit_to_json(primary_field: &str, hit: &Hit) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(primary_field.to_string(), Value::from(hit.id));
    map.insert("distance".to_string(), Value::from(hit.distance));
    map
}

pub fn hit_from_json(primary_field: &str, map: &Map<String, Value>) -> Result<Hit> {
    let id = map
        .get(primary_field)
        .or_else(|| map.get("id"))
        .and_then(Value::as_i64);
    let distance = map.get("distance").and_then(Value::as_f64);
    match (id, distance) {
        (Some(id), Some(distance)) => Ok(Hit {
            id,
            distance: distance as f32,
        }),
        _ => Err(VectorDbError::Service {
            code: CODE_UNEXPECTED,
            message: format!("malformed search hit: {}", Value::Object(map.clone())),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn schema() -> CollectionSchema {
        CollectionSchema::new("demo")
            .with_description("collection description")
            .with_field(FieldSchema::int64("id_field").primary().with_description("int64"))
            .with_field(FieldSchema::float_vector("float_vector_field", 128).with_description("float vector"))
    }

    #[test]
    fn test_envelope_without_data() {
        // HasData has no Default, so a missing `data` must not need one
        let reply: ApiResponse<HasData> =
            serde_json::from_value(json!({"code": 100, "message": "collection not found"})).unwrap();
        assert_eq!(reply.code, CODE_COLLECTION_NOT_FOUND);
        assert!(reply.data.is_none());

        let reply: ApiResponse<HasData> =
            serde_json::from_value(json!({"code": 0, "data": {"has": true}})).unwrap();
        assert!(reply.message.is_none());
        assert!(reply.data.unwrap().has);
    }

    #[test]
    fn test_create_request_shape() {
        let json = serde_json::to_value(CreateCollectionRequest::from(&schema())).unwrap();
        assert_eq!(json["collectionName"], "demo");
        assert_eq!(json["schema"]["fields"][0]["dataType"], "Int64");
        assert_eq!(json["schema"]["fields"][0]["isPrimary"], true);
        assert_eq!(json["schema"]["fields"][1]["elementTypeParams"]["dim"], "128");
        assert!(json["schema"]["fields"][0].get("elementTypeParams").is_none());
    }

    #[test]
    fn test_schema_survives_both_encodings() {
        let created: CreateCollectionRequest =
            serde_json::from_value(serde_json::to_value(CreateCollectionRequest::from(&schema())).unwrap())
                .unwrap();
        assert_eq!(created.into_schema().unwrap(), schema());

        let described: DescribeData =
            serde_json::from_value(serde_json::to_value(DescribeData::from(&schema())).unwrap()).unwrap();
        assert_eq!(described.into_schema().unwrap(), schema());
    }

    #[test]
    fn test_describe_rejects_unknown_type() {
        let data: DescribeData = serde_json::from_value(json!({
            "collectionName": "demo",
            "fields": [{"name": "tags", "type": "Array"}]
        }))
        .unwrap();
        assert_eq!(data.into_schema().unwrap_err().kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_index_spec_shape() {
        let index = IndexParams::new("float_vector_field", IndexKind::IvfFlat { nlist: 1024 }, MetricType::L2);
        let json = serde_json::to_value(IndexSpec::from(&index)).unwrap();
        assert_eq!(
            json,
            json!({
                "fieldName": "float_vector_field",
                "indexName": "float_vector_field",
                "metricType": "L2",
                "params": {"index_type": "IVF_FLAT", "nlist": 1024}
            })
        );
    }

    #[test]
    fn test_search_body_filter() {
        let request = SearchRequest::new("v", vec![Vector::new(vec![0.5])], 3)
            .with_filter(Filter::gt("id_field", 0))
            .with_params(SearchParams::with_nprobe(16));
        let body = SearchBody::single("demo", &request, &request.vectors[0]);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["filter"], "id_field > 0");
        assert_eq!(json["searchParams"]["params"]["nprobe"], 16);
        assert_eq!(json["annsField"], "v");

        let (name, back) = body.into_request().unwrap();
        assert_eq!(name, "demo");
        assert_eq!(back, request);
    }

    #[test]
    fn test_error_codes_map_back() {
        let cases = [
            (VectorDbError::not_found("demo", "collection"), ErrorKind::NotFound),
            (VectorDbError::not_found("demo", "index 'v'"), ErrorKind::NotFound),
            (VectorDbError::NotLoaded { collection: "demo".into() }, ErrorKind::NotLoaded),
            (VectorDbError::index("demo", "v", "conflict"), ErrorKind::Index),
            (VectorDbError::schema("demo", "no primary"), ErrorKind::Schema),
            (VectorDbError::validation("demo", "bad dim"), ErrorKind::Validation),
        ];
        for (err, kind) in cases {
            let reply = ApiResponse::<()>::error(&err);
            let decoded = decode_error(reply.code, reply.message.unwrap(), "demo", Some("v"));
            assert_eq!(decoded.kind(), kind);
        }
        assert_eq!(error_code(&VectorDbError::not_found("demo", "index 'v'")), CODE_INDEX_NOT_FOUND);
    }

    #[test]
    fn test_hit_json() {
        let hit = Hit { id: 2, distance: 0.0 };
        let map = hit_to_json("id_field", &hit);
        assert_eq!(Value::Object(map.clone()), json!({"id_field": 2, "distance": 0.0}));
        assert_eq!(hit_from_json("id_field", &map).unwrap(), hit);

        let bare = json!({"id": 5, "distance": 1.5});
        assert_eq!(hit_from_json("pk", bare.as_object().unwrap()).unwrap().id, 5);
        assert!(hit_from_json("pk", json!({"distance": 1.0}).as_object().unwrap()).is_err());
    }
}
