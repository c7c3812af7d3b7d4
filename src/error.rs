//! Error types for the collection lifecycle

use std::fmt;
use thiserror::Error;

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, VectorDbError>;

/// Workflow step an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    HasCollection,
    EnsureAbsent,
    CreateCollection,
    DescribeCollection,
    ListCollections,
    Insert,
    BuildIndex,
    DropIndex,
    Load,
    Release,
    Search,
    DropCollection,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Connect => "connect",
            Operation::HasCollection => "has_collection",
            Operation::EnsureAbsent => "ensure_absent",
            Operation::CreateCollection => "create_collection",
            Operation::DescribeCollection => "describe_collection",
            Operation::ListCollections => "list_collections",
            Operation::Insert => "insert",
            Operation::BuildIndex => "build_index",
            Operation::DropIndex => "drop_index",
            Operation::Load => "load",
            Operation::Release => "release",
            Operation::Search => "search",
            Operation::DropCollection => "drop_collection",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a [`VectorDbError`], stable across context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Schema,
    Validation,
    Index,
    NotLoaded,
    NotFound,
    Service,
    Config,
    Io,
}

/// Error types that can occur while driving a vector search service
#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Schema error in collection '{collection}': {reason}")]
    Schema { collection: String, reason: String },

    #[error("Validation error in collection '{collection}': {reason}")]
    Validation { collection: String, reason: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Invalid filter '{expr}': {reason}")]
    InvalidFilter { expr: String, reason: String },

    #[error("Index error on '{collection}.{field}': {reason}")]
    Index {
        collection: String,
        field: String,
        reason: String,
    },

    #[error("Collection '{collection}' is not loaded")]
    NotLoaded { collection: String },

    #[error("{what} not found in '{collection}'")]
    NotFound { collection: String, what: String },

    #[error("Service error {code}: {message}")]
    Service { code: i32, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{operation} failed{}: {source}", on_collection(.collection))]
    Operation {
        operation: Operation,
        collection: String,
        #[source]
        source: Box<VectorDbError>,
    },
}

fn on_collection(collection: &str) -> String {
    if collection.is_empty() {
        String::new()
    } else {
        format!(" on collection '{}'", collection)
    }
}

impl VectorDbError {
    pub fn schema(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        VectorDbError::Schema {
            collection: collection.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        VectorDbError::Validation {
            collection: collection.into(),
            reason: reason.into(),
        }
    }

    pub fn index(
        collection: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        VectorDbError::Index {
            collection: collection.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(collection: impl Into<String>, what: impl Into<String>) -> Self {
        VectorDbError::NotFound {
            collection: collection.into(),
            what: what.into(),
        }
    }

    /// Attach the failing step and collection. Already-wrapped errors are kept as is.
    pub fn during(self, operation: Operation, collection: &str) -> Self {
        match self {
            err @ VectorDbError::Operation { .. } => err,
            err => VectorDbError::Operation {
                operation,
                collection: collection.to_string(),
                source: Box::new(err),
            },
        }
    }

    /// The innermost error, skipping operation context.
    pub fn root(&self) -> &VectorDbError {
        match self {
            VectorDbError::Operation { source, .. } => source.root(),
            err => err,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            VectorDbError::Connection(_) => ErrorKind::Connection,
            VectorDbError::Schema { .. } => ErrorKind::Schema,
            VectorDbError::Validation { .. }
            | VectorDbError::DimensionMismatch { .. }
            | VectorDbError::InvalidVector { .. }
            | VectorDbError::InvalidFilter { .. } => ErrorKind::Validation,
            VectorDbError::Index { .. } => ErrorKind::Index,
            VectorDbError::NotLoaded { .. } => ErrorKind::NotLoaded,
            VectorDbError::NotFound { .. } => ErrorKind::NotFound,
            VectorDbError::Service { .. }
            | VectorDbError::Timeout(_)
            | VectorDbError::Http(_)
            | VectorDbError::Json(_) => ErrorKind::Service,
            VectorDbError::Config(_) => ErrorKind::Config,
            VectorDbError::IoError(_) => ErrorKind::Io,
            VectorDbError::Operation { .. } => unreachable!("root() strips operation context"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_during_wraps_once() {
        let err = VectorDbError::NotLoaded {
            collection: "demo".to_string(),
        }
        .during(Operation::Search, "demo")
        .during(Operation::Load, "other");

        match &err {
            VectorDbError::Operation {
                operation,
                collection,
                ..
            } => {
                assert_eq!(*operation, Operation::Search);
                assert_eq!(collection, "demo");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::NotLoaded);
    }

    #[test]
    fn test_display_carries_context() {
        let err = VectorDbError::not_found("demo", "collection").during(Operation::DropCollection, "demo");
        assert_eq!(
            err.to_string(),
            "drop_collection failed on collection 'demo': collection not found in 'demo'"
        );
    }

    #[test]
    fn test_display_without_collection() {
        let err = VectorDbError::Connection("refused".into()).during(Operation::ListCollections, "");
        assert_eq!(err.to_string(), "list_collections failed: Connection error: refused");
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            VectorDbError::DimensionMismatch { expected: 3, actual: 2 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(VectorDbError::index("c", "v", "conflict").kind(), ErrorKind::Index);
        assert_eq!(VectorDbError::Connection("down".into()).kind(), ErrorKind::Connection);
        assert_eq!(VectorDbError::Timeout("load".into()).kind(), ErrorKind::Service);
    }
}
