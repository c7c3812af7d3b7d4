//! Client capability interface of a vector search service.
//!
//! [`VectorService`] is everything the lifecycle workflow needs from a
//! service. [`MilvusClient`] talks to a remote service over its REST API;
//! [`InMemoryService`] answers the same calls in process.

pub mod memory;
pub mod milvus;
pub mod wire;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::IndexParams;
use crate::schema::{CollectionSchema, Entity};
use crate::search::{SearchRequest, SearchResult};

pub use memory::InMemoryService;
pub use milvus::MilvusClient;

/// Outcome of a batch insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertSummary {
    pub insert_count: usize,
    /// Primary keys in insertion order
    pub ids: Vec<i64>,
}

/// Query readiness of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotExist,
    NotLoad,
    Loading,
    Loaded,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::NotExist => "LoadStateNotExist",
            LoadState::NotLoad => "LoadStateNotLoad",
            LoadState::Loading => "LoadStateLoading",
            LoadState::Loaded => "LoadStateLoaded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LoadStateNotExist" => Some(LoadState::NotExist),
            "LoadStateNotLoad" => Some(LoadState::NotLoad),
            "LoadStateLoading" => Some(LoadState::Loading),
            "LoadStateLoaded" => Some(LoadState::Loaded),
            _ => None,
        }
    }
}

/// Operations a vector search service offers to a connected session.
#[async_trait]
pub trait VectorService: Send + Sync {
    /// Address of the service this session talks to.
    fn endpoint(&self) -> &str;

    async fn has_collection(&self, name: &str) -> Result<bool>;

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()>;

    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema>;

    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Insert a batch. Either every entity is stored or the call fails.
    async fn insert(&self, name: &str, entities: &[Entity]) -> Result<InsertSummary>;

    /// Build an index. Identical parameters on an indexed field succeed without change.
    async fn create_index(&self, name: &str, index: &IndexParams) -> Result<()>;

    async fn describe_index(&self, name: &str, field_name: &str) -> Result<IndexParams>;

    async fn drop_index(&self, name: &str, field_name: &str) -> Result<()>;

    /// Make a collection query-ready. Returns once loading has finished.
    async fn load_collection(&self, name: &str) -> Result<()>;

    async fn release_collection(&self, name: &str) -> Result<()>;

    async fn load_state(&self, name: &str) -> Result<LoadState>;

    /// One result per query vector, nearest first.
    async fn search(&self, name: &str, request: &SearchRequest) -> Result<Vec<SearchResult>>;

    async fn drop_collection(&self, name: &str) -> Result<()>;
}
