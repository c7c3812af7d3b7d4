//! In-process vector search service

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::{InsertSummary, LoadState, VectorService};
use crate::distance::MetricType;
use crate::error::{Result, VectorDbError};
use crate::flat_index::FlatIndex;
use crate::index::IndexParams;
use crate::schema::{CollectionSchema, Entity};
use crate::search::{SearchRequest, SearchResult};

#[derive(Debug)]
struct Collection {
    schema: CollectionSchema,
    rows: FlatIndex,
    /// Field name -> index on that field
    indexes: HashMap<String, IndexParams>,
    loaded: bool,
}

/// Vector search service held entirely in memory.
///
/// Follows the remote service's rules (schema checks, atomic batches, index
/// conflicts, load before search) and answers searches by exhaustive scan,
/// so index kinds and tuning are recorded but do not change results.
#[derive(Debug)]
pub struct InMemoryService {
    endpoint: String,
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::with_endpoint("memory://local")
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entities, or `None` for an unknown collection.
    pub fn entity_count(&self, name: &str) -> Option<usize> {
        self.read().ok()?.get(name).map(|c| c.rows.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections.write().map_err(|_| poisoned())
    }
}

impl Default for InMemoryService {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> VectorDbError {
    VectorDbError::Service {
        code: 500,
        message: "Lock poisoned".to_string(),
    }
}

fn missing(name: &str) -> VectorDbError {
    VectorDbError::not_found(name, "collection")
}

#[async_trait]
impl VectorService for InMemoryService {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(name))
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        schema.validate()?;
        let mut collections = self.write()?;
        if collections.contains_key(&schema.name) {
            return Err(VectorDbError::schema(&schema.name, "collection already exists"));
        }
        let primary = schema
            .primary_field()
            .map(|f| f.name.clone())
            .unwrap_or_default();
        collections.insert(
            schema.name.clone(),
            Collection {
                schema: schema.clone(),
                rows: FlatIndex::new(primary),
                indexes: HashMap::new(),
                loaded: false,
            },
        );
        debug!(collection = %schema.name, "collection created");
        Ok(())
    }

    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema> {
        self.read()?
            .get(name)
            .map(|c| c.schema.clone())
            .ok_or_else(|| missing(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn insert(&self, name: &str, entities: &[Entity]) -> Result<InsertSummary> {
        let mut collections = self.write()?;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;

        if entities.is_empty() {
            return Err(VectorDbError::validation(name, "empty insert batch"));
        }
        for entity in entities {
            collection.schema.validate_entity(entity)?;
        }

        let ids = collection.rows.extend(entities);
        debug!(collection = name, count = ids.len(), "entities inserted");
        Ok(InsertSummary {
            insert_count: ids.len(),
            ids,
        })
    }

    async fn create_index(&self, name: &str, index: &IndexParams) -> Result<()> {
        let mut collections = self.write()?;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;
        index.validate_against(&collection.schema)?;

        match collection.indexes.get(&index.field_name) {
            Some(existing) if existing == index => {
                debug!(collection = name, field = %index.field_name, "index already built");
                Ok(())
            }
            Some(existing) => Err(VectorDbError::index(
                name,
                &index.field_name,
                format!(
                    "conflicting index: field already has {} / {}",
                    existing.kind.name(),
                    existing.metric
                ),
            )),
            None => {
                collection
                    .indexes
                    .insert(index.field_name.clone(), index.clone());
                debug!(collection = name, field = %index.field_name, kind = index.kind.name(), "index built");
                Ok(())
            }
        }
    }

    async fn describe_index(&self, name: &str, field_name: &str) -> Result<IndexParams> {
        let collections = self.read()?;
        let collection = collections.get(name).ok_or_else(|| missing(name))?;
        collection
            .indexes
            .get(field_name)
            .cloned()
            .ok_or_else(|| VectorDbError::not_found(name, format!("index '{}'", field_name)))
    }

    async fn drop_index(&self, name: &str, field_name: &str) -> Result<()> {
        let mut collections = self.write()?;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;
        if collection.loaded {
            return Err(VectorDbError::index(
                name,
                field_name,
                "collection is loaded, release it before dropping the index",
            ));
        }
        collection
            .indexes
            .remove(field_name)
            .map(|_| ())
            .ok_or_else(|| VectorDbError::not_found(name, format!("index '{}'", field_name)))
    }

    async fn load_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.write()?;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;

        let unindexed = collection
            .schema
            .vector_fields()
            .find(|f| !collection.indexes.contains_key(&f.name));
        if let Some(field) = unindexed {
            return Err(VectorDbError::index(
                name,
                &field.name,
                "no index built on vector field",
            ));
        }
        collection.loaded = true;
        Ok(())
    }

    async fn release_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.write()?;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;
        collection.loaded = false;
        Ok(())
    }

    async fn load_state(&self, name: &str) -> Result<LoadState> {
        Ok(match self.read()?.get(name) {
            None => LoadState::NotExist,
            Some(c) if c.loaded => LoadState::Loaded,
            Some(_) => LoadState::NotLoad,
        })
    }

    async fn search(&self, name: &str, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let collections = self.read()?;
        let collection = collections.get(name).ok_or_else(|| missing(name))?;
        if !collection.loaded {
            return Err(VectorDbError::NotLoaded {
                collection: name.to_string(),
            });
        }
        request.validate_against(&collection.schema)?;

        let metric = collection
            .indexes
            .get(&request.anns_field)
            .map(|i| i.metric)
            .unwrap_or(MetricType::L2);

        request
            .vectors
            .iter()
            .map(|query| {
                collection.rows.search(
                    &request.anns_field,
                    query,
                    metric,
                    request.limit,
                    request.filter.as_ref(),
                )
            })
            .collect()
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.write()?
            .remove(name)
            .map(|_| debug!(collection = name, "collection dropped"))
            .ok_or_else(|| missing(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::index::IndexKind;
    use crate::schema::FieldSchema;
    use crate::vector::Vector;

    fn schema() -> CollectionSchema {
        CollectionSchema::new("demo")
            .with_field(FieldSchema::int64("id").primary())
            .with_field(FieldSchema::float_vector("v", 2))
    }

    fn rows() -> Vec<Entity> {
        (1..=4)
            .map(|i| {
                Entity::new()
                    .with_int64("id", i)
                    .with_vector("v", vec![i as f32, 0.0])
            })
            .collect()
    }

    fn ivf() -> IndexParams {
        IndexParams::new("v", IndexKind::IvfFlat { nlist: 4 }, MetricType::L2)
    }

    #[tokio::test]
    async fn test_create_and_describe() {
        let service = InMemoryService::new();
        service.create_collection(&schema()).await.unwrap();
        assert!(service.has_collection("demo").await.unwrap());
        assert_eq!(service.describe_collection("demo").await.unwrap(), schema());
        assert_eq!(service.list_collections().await.unwrap(), vec!["demo".to_string()]);

        let again = service.create_collection(&schema()).await.unwrap_err();
        assert_eq!(again.kind(), ErrorKind::Schema);
    }

    #[tokio::test]
    async fn test_insert_is_atomic() {
        let service = InMemoryService::new();
        service.create_collection(&schema()).await.unwrap();

        let mut batch = rows();
        batch.push(Entity::new().with_int64("id", 9).with_vector("v", vec![1.0f32]));
        let err = service.insert("demo", &batch).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(service.entity_count("demo"), Some(0));

        let summary = service.insert("demo", &rows()).await.unwrap();
        assert_eq!(summary.insert_count, 4);
        assert_eq!(summary.ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_index_rules() {
        let service = InMemoryService::new();
        service.create_collection(&schema()).await.unwrap();

        service.create_index("demo", &ivf()).await.unwrap();
        service.create_index("demo", &ivf()).await.unwrap();
        assert_eq!(service.describe_index("demo", "v").await.unwrap(), ivf());

        let other = IndexParams::new("v", IndexKind::Flat, MetricType::L2);
        let err = service.create_index("demo", &other).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Index);

        service.load_collection("demo").await.unwrap();
        let err = service.drop_index("demo", "v").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Index);

        service.release_collection("demo").await.unwrap();
        service.drop_index("demo", "v").await.unwrap();
        let err = service.drop_index("demo", "v").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_load_requires_index() {
        let service = InMemoryService::new();
        service.create_collection(&schema()).await.unwrap();
        let err = service.load_collection("demo").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Index);
        assert_eq!(service.load_state("demo").await.unwrap(), LoadState::NotLoad);
        assert_eq!(service.load_state("nope").await.unwrap(), LoadState::NotExist);
    }

    #[tokio::test]
    async fn test_search_lifecycle() {
        let service = InMemoryService::new();
        service.create_collection(&schema()).await.unwrap();
        service.insert("demo", &rows()).await.unwrap();
        service.create_index("demo", &ivf()).await.unwrap();

        let request = SearchRequest::new("v", vec![Vector::new(vec![2.0, 0.0])], 2);
        let err = service.search("demo", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotLoaded);

        service.load_collection("demo").await.unwrap();
        let results = service.search("demo", &request).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0][0].id, 2);
        assert_eq!(results[0][0].distance, 0.0);
        assert_eq!(results[0].len(), 2);
    }

    #[tokio::test]
    async fn test_cosine_search_with_stored_zero_vector() {
        let service = InMemoryService::new();
        service.create_collection(&schema()).await.unwrap();
        let batch = vec![
            Entity::new().with_int64("id", 1).with_vector("v", vec![1.0f32, 0.0]),
            Entity::new().with_int64("id", 2).with_vector("v", vec![0.0f32, 0.0]),
            Entity::new().with_int64("id", 3).with_vector("v", vec![0.0f32, 1.0]),
        ];
        assert_eq!(service.insert("demo", &batch).await.unwrap().insert_count, 3);
        service
            .create_index("demo", &IndexParams::new("v", IndexKind::Flat, MetricType::Cosine))
            .await
            .unwrap();
        service.load_collection("demo").await.unwrap();

        let request = SearchRequest::new("v", vec![Vector::new(vec![1.0, 0.0])], 3);
        let hits = service.search("demo", &request).await.unwrap().remove(0);
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[2].distance, 1.0);
    }

    #[tokio::test]
    async fn test_drop_missing_collection() {
        let service = InMemoryService::new();
        let err = service.drop_collection("demo").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
