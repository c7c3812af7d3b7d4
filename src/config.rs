//! Connection and workflow settings
//!
//! Defaults reproduce the demo: a local service on port 19530, collection
//! `demo` with 10,000 vectors of dimension 128, an IVF_FLAT/L2 index with
//! 1024 clusters, and a top-3 search probing 16 clusters.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::distance::MetricType;
use crate::error::{Result, VectorDbError};
use crate::index::{IndexKind, IndexParams, SearchParams};
use crate::schema::{CollectionSchema, FieldSchema};

/// Where the service lives and how to reach it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Use TLS
    pub secure: bool,
    /// PEM certificate trusted as the server's root
    pub server_pem_path: Option<PathBuf>,
    /// Name the server certificate is issued for
    pub server_name: Option<String>,
    /// Bearer token, `user:password` or an API key
    pub token: Option<String>,
    pub request_timeout_secs: u64,
    pub load_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 19530,
            secure: false,
            server_pem_path: None,
            server_name: None,
            token: None,
            request_timeout_secs: 30,
            load_timeout_secs: 60,
        }
    }
}

impl ConnectionConfig {
    pub fn uri(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

/// What the lifecycle run creates, inserts and searches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub collection_name: String,
    pub id_field: String,
    pub vector_field: String,
    /// Collection whose existence is reported before anything else
    pub check_collection: String,
    pub dim: usize,
    pub num_entities: usize,
    pub index: IndexKind,
    pub metric: MetricType,
    pub nprobe: u32,
    pub top_k: usize,
    /// Seed for the random vectors; unset draws from the OS
    pub seed: Option<u64>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            collection_name: "demo".to_string(),
            id_field: "id_field".to_string(),
            vector_field: "float_vector_field".to_string(),
            check_collection: "hello_milvus".to_string(),
            dim: 128,
            num_entities: 10_000,
            index: IndexKind::IvfFlat { nlist: 1024 },
            metric: MetricType::L2,
            nprobe: 16,
            top_k: 3,
            seed: None,
        }
    }
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_entities == 0 {
            return Err(VectorDbError::Config("num_entities must be positive".to_string()));
        }
        if self.top_k == 0 {
            return Err(VectorDbError::Config("top_k must be positive".to_string()));
        }
        if i64::try_from(self.num_entities).is_err() {
            return Err(VectorDbError::Config("num_entities exceeds the id range".to_string()));
        }
        Ok(())
    }

    /// `{id_field: Int64 primary, vector_field: FloatVector(dim)}`
    pub fn schema(&self) -> CollectionSchema {
        CollectionSchema::new(&self.collection_name)
            .with_description("collection description")
            .with_field(
                FieldSchema::int64(&self.id_field)
                    .primary()
                    .with_description("int64"),
            )
            .with_field(
                FieldSchema::float_vector(&self.vector_field, self.dim).with_description("float vector"),
            )
    }

    pub fn index_params(&self) -> IndexParams {
        IndexParams::new(&self.vector_field, self.index, self.metric)
    }

    pub fn search_params(&self) -> SearchParams {
        match self.index {
            IndexKind::IvfFlat { .. } | IndexKind::IvfSq8 { .. } => SearchParams::with_nprobe(self.nprobe),
            IndexKind::Hnsw { .. } => SearchParams {
                nprobe: None,
                ef: Some(u32::try_from(self.top_k).unwrap_or(u32::MAX).max(64)),
            },
            IndexKind::Flat | IndexKind::AutoIndex => SearchParams::default(),
        }
    }
}

/// Everything a run needs, as read from a JSON settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionConfig,
    pub workflow: WorkflowConfig,
}

impl Settings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VectorDbError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| VectorDbError::Config(format!("invalid settings in {}: {}", path.display(), e)))
    }
}
