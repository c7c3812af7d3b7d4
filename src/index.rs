//! Index descriptors and search-time tuning

use crate::distance::MetricType;
use crate::error::{Result, VectorDbError};
use crate::schema::CollectionSchema;
use serde::{Deserialize, Serialize};

pub const MAX_NLIST: u32 = 65_536;

/// Index kind plus its build parameters.
///
/// Serialized as the service's `params` object, e.g.
/// `{"index_type": "IVF_FLAT", "nlist": 1024}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "index_type")]
pub enum IndexKind {
    #[serde(rename = "FLAT")]
    Flat,
    #[serde(rename = "IVF_FLAT")]
    IvfFlat { nlist: u32 },
    #[serde(rename = "IVF_SQ8")]
    IvfSq8 { nlist: u32 },
    #[serde(rename = "HNSW")]
    Hnsw {
        #[serde(rename = "M")]
        m: u32,
        #[serde(rename = "efConstruction")]
        ef_construction: u32,
    },
    #[serde(rename = "AUTOINDEX")]
    AutoIndex,
}

impl IndexKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::Flat => "FLAT",
            IndexKind::IvfFlat { .. } => "IVF_FLAT",
            IndexKind::IvfSq8 { .. } => "IVF_SQ8",
            IndexKind::Hnsw { .. } => "HNSW",
            IndexKind::AutoIndex => "AUTOINDEX",
        }
    }

    /// Range checks on the build parameters.
    pub fn check_params(&self) -> std::result::Result<(), String> {
        match *self {
            IndexKind::IvfFlat { nlist } | IndexKind::IvfSq8 { nlist }
                if nlist == 0 || nlist > MAX_NLIST =>
            {
                Err(format!("nlist {} out of range 1..={}", nlist, MAX_NLIST))
            }
            IndexKind::Hnsw { m, .. } if !(2..=2048).contains(&m) => {
                Err(format!("M {} out of range 2..=2048", m))
            }
            IndexKind::Hnsw { ef_construction: 0, .. } => {
                Err("efConstruction must be positive".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Request to build an index over one vector field. The index is named after the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexParams {
    pub field_name: String,
    pub kind: IndexKind,
    pub metric: MetricType,
}

impl IndexParams {
    pub fn new(field_name: impl Into<String>, kind: IndexKind, metric: MetricType) -> Self {
        Self {
            field_name: field_name.into(),
            kind,
            metric,
        }
    }

    pub fn index_name(&self) -> &str {
        &self.field_name
    }

    /// The target must be a declared vector field and the parameters in range.
    pub fn validate_against(&self, schema: &CollectionSchema) -> Result<()> {
        let field = schema.field(&self.field_name).ok_or_else(|| {
            VectorDbError::index(&schema.name, &self.field_name, "field does not exist")
        })?;
        if !field.data_type.is_vector() {
            return Err(VectorDbError::index(
                &schema.name,
                &self.field_name,
                format!("field is {}, only vector fields can be indexed", field.data_type),
            ));
        }
        self.kind
            .check_params()
            .map_err(|reason| VectorDbError::index(&schema.name, &self.field_name, reason))
    }
}

/// Search-time knobs. Unset values are left to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nprobe: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ef: Option<u32>,
}

impl SearchParams {
    pub fn with_nprobe(nprobe: u32) -> Self {
        Self {
            nprobe: Some(nprobe),
            ef: None,
        }
    }
}
