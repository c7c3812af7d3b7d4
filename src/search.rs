//! Search requests and results

use crate::error::{Result, VectorDbError};
use crate::filter::Filter;
use crate::index::SearchParams;
use crate::schema::CollectionSchema;
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// Largest result count a single query may ask for.
pub const MAX_LIMIT: usize = 16_384;

/// Nearest-neighbor query over one vector field
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub anns_field: String,
    pub vectors: Vec<Vector>,
    pub limit: usize,
    pub filter: Option<Filter>,
    pub params: SearchParams,
}

impl SearchRequest {
    pub fn new(anns_field: impl Into<String>, vectors: Vec<Vector>, limit: usize) -> Self {
        Self {
            anns_field: anns_field.into(),
            vectors,
            limit,
            filter: None,
            params: SearchParams::default(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_params(mut self, params: SearchParams) -> Self {
        self.params = params;
        self
    }

    pub fn validate_against(&self, schema: &CollectionSchema) -> Result<()> {
        let fail = |reason: String| Err(VectorDbError::validation(&schema.name, reason));

        if self.limit == 0 || self.limit > MAX_LIMIT {
            return fail(format!("limit {} out of range 1..={}", self.limit, MAX_LIMIT));
        }
        if self.vectors.is_empty() {
            return fail("no query vectors".to_string());
        }

        let field = match schema.field(&self.anns_field) {
            Some(field) if field.data_type.is_vector() => field,
            Some(_) => return fail(format!("'{}' is not a vector field", self.anns_field)),
            None => return fail(format!("unknown field '{}'", self.anns_field)),
        };
        let dim = field.dim.unwrap_or(0);
        for (i, v) in self.vectors.iter().enumerate() {
            if v.dimension() != dim {
                return fail(format!(
                    "query vector {} has dimension {}, field '{}' expects {}",
                    i,
                    v.dimension(),
                    field.name,
                    dim
                ));
            }
        }

        match &self.filter {
            Some(filter) => filter.validate_against(schema),
            None => Ok(()),
        }
    }
}

/// A single neighbor: the entity's primary key and its distance from the query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: i64,
    pub distance: f32,
}

/// Neighbors of one query vector, nearest first
pub type SearchResult = Vec<Hit>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::FieldSchema;

    fn schema() -> CollectionSchema {
        CollectionSchema::new("demo")
            .with_field(FieldSchema::int64("id").primary())
            .with_field(FieldSchema::float_vector("v", 3))
    }

    #[test]
    fn test_valid_request() {
        let req = SearchRequest::new("v", vec![Vector::new(vec![0.0; 3])], 3)
            .with_filter(Filter::gt("id", 0));
        assert!(req.validate_against(&schema()).is_ok());
    }

    #[test]
    fn test_invalid_requests() {
        let q = || vec![Vector::new(vec![0.0; 3])];
        let cases = [
            SearchRequest::new("v", q(), 0),
            SearchRequest::new("v", q(), MAX_LIMIT + 1),
            SearchRequest::new("v", vec![], 3),
            SearchRequest::new("id", q(), 3),
            SearchRequest::new("w", q(), 3),
            SearchRequest::new("v", vec![Vector::new(vec![0.0; 2])], 3),
            SearchRequest::new("v", q(), 3).with_filter(Filter::gt("v", 1)),
        ];
        for req in cases {
            assert_eq!(req.validate_against(&schema()).unwrap_err().kind(), ErrorKind::Validation);
        }
    }
}
