//! # Vector Lifecycle
//!
//! Drives a vector collection through its whole life against a vector search
//! service: create, insert, index, load, search, release, drop.
//!
//! This library provides:
//! - Collection schemas, entities and local validation
//! - Index and search parameters, filter expressions
//! - The [`VectorService`] capability with a REST client and an in-memory service
//! - The lifecycle [`Workflow`] and an HTTP emulator of the service
//!
//! ## Example
//!
//! ```rust
//! use vector_lifecycle::config::WorkflowConfig;
//! use vector_lifecycle::index::IndexKind;
//! use vector_lifecycle::service::InMemoryService;
//! use vector_lifecycle::workflow::Workflow;
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(async {
//!     let config = WorkflowConfig {
//!         dim: 8,
//!         num_entities: 100,
//!         index: IndexKind::IvfFlat { nlist: 16 },
//!         seed: Some(7),
//!         ..WorkflowConfig::default()
//!     };
//!
//!     let mut workflow = Workflow::new(InMemoryService::new());
//!     let report = workflow.run(&config).await.unwrap();
//!     assert_eq!(report.results[0][0].id, 2);
//! });
//! ```

pub mod config;
pub mod distance;
pub mod error;
pub mod filter;
pub mod flat_index;
pub mod index;
pub mod schema;
pub mod search;
pub mod server;
pub mod service;
pub mod vector;
pub mod workflow;

pub use config::{ConnectionConfig, Settings, WorkflowConfig};
pub use distance::MetricType;
pub use error::{ErrorKind, Operation, Result, VectorDbError};
pub use filter::Filter;
pub use index::{IndexKind, IndexParams, SearchParams};
pub use schema::{CollectionSchema, DataType, Entity, FieldSchema, FieldValue};
pub use search::{Hit, SearchRequest, SearchResult};
pub use service::{InMemoryService, MilvusClient, VectorService};
pub use vector::Vector;
pub use workflow::{CollectionState, Workflow, WorkflowReport};
