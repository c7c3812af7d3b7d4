//! Collection lifecycle workflow
//!
//! Drives one service session through
//! `Absent -> Created -> Populated -> Indexed -> Loaded -> Released -> IndexDropped -> Absent`.
//! Every step runs after the previous one has finished, and the first failure
//! aborts the run with the step and collection attached to the error. Nothing is
//! cleaned up on failure; [`Workflow::ensure_absent`] makes the next run start clean.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, WorkflowConfig};
use crate::error::{Operation, Result, VectorDbError};
use crate::filter::Filter;
use crate::index::IndexParams;
use crate::schema::{CollectionSchema, Entity};
use crate::search::{SearchRequest, SearchResult};
use crate::service::{InsertSummary, MilvusClient, VectorService};
use crate::vector::Vector;

/// Where a collection stands in the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Absent,
    Created,
    Populated,
    Indexed,
    Loaded,
    Released,
    IndexDropped,
}

/// What a full [`Workflow::run`] observed
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub endpoint: String,
    pub check_collection: String,
    pub check_collection_exists: bool,
    /// Collection listing right after creation
    pub collections: Vec<String>,
    pub insert: InsertSummary,
    /// Primary key of the entity whose vector was used as the query
    pub query_id: i64,
    pub results: Vec<SearchResult>,
}

/// Lifecycle driver bound to one service session.
pub struct Workflow<S> {
    session: S,
    schemas: HashMap<String, CollectionSchema>,
    states: HashMap<String, CollectionState>,
}

impl Workflow<MilvusClient> {
    /// Open a session with a remote service.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        MilvusClient::connect(config)
            .await
            .map(Self::new)
            .map_err(|e| e.during(Operation::Connect, ""))
    }
}

impl<S: VectorService> Workflow<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            schemas: HashMap::new(),
            states: HashMap::new(),
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// `None` until this workflow has seen the collection created, dropped or loaded.
    pub fn state(&self, name: &str) -> Option<CollectionState> {
        self.states.get(name).copied()
    }

    fn advance(&mut self, name: &str, next: impl FnOnce(CollectionState) -> CollectionState) {
        if let Some(state) = self.states.get_mut(name) {
            let from = *state;
            let to = next(from);
            if to != from {
                debug!(collection = name, ?from, ?to, "state change");
                *state = to;
            }
        }
    }

    /// Schema of `name`, from the cache or the service.
    async fn schema_of(&mut self, name: &str, op: Operation) -> Result<CollectionSchema> {
        if let Some(schema) = self.schemas.get(name) {
            return Ok(schema.clone());
        }
        let schema = self
            .session
            .describe_collection(name)
            .await
            .map_err(|e| e.during(op, name))?;
        self.schemas.insert(name.to_string(), schema.clone());
        Ok(schema)
    }

    pub async fn has_collection(&self, name: &str) -> Result<bool> {
        self.session
            .has_collection(name)
            .await
            .map_err(|e| e.during(Operation::HasCollection, name))
    }

    /// Drop `name` if it exists. Returns whether a drop happened.
    pub async fn ensure_absent(&mut self, name: &str) -> Result<bool> {
        let op = Operation::EnsureAbsent;
        let present = self
            .session
            .has_collection(name)
            .await
            .map_err(|e| e.during(op, name))?;
        if present {
            self.session
                .drop_collection(name)
                .await
                .map_err(|e| e.during(op, name))?;
            info!("Drop collection: {}", name);
        }
        self.schemas.remove(name);
        self.states.insert(name.to_string(), CollectionState::Absent);
        Ok(present)
    }

    pub async fn create_collection(&mut self, schema: &CollectionSchema) -> Result<()> {
        let op = Operation::CreateCollection;
        let name = schema.name.as_str();
        schema.validate().map_err(|e| e.during(op, name))?;

        self.session
            .create_collection(schema)
            .await
            .map_err(|e| e.during(op, name))?;
        let described = self
            .session
            .describe_collection(name)
            .await
            .map_err(|e| e.during(Operation::DescribeCollection, name))?;
        let matches = described.fields.len() == schema.fields.len()
            && schema.fields.iter().all(|declared| {
                described.field(&declared.name).map_or(false, |f| {
                    f.data_type == declared.data_type
                        && f.dim == declared.dim
                        && f.is_primary == declared.is_primary
                })
            });
        if !matches {
            let fields: Vec<&str> = described.fields.iter().map(|f| f.name.as_str()).collect();
            return Err(VectorDbError::schema(
                name,
                format!("service describes fields {:?}, which differ from the declaration", fields),
            )
            .during(Operation::DescribeCollection, name));
        }

        info!("collection created: {}", name);
        self.schemas.insert(name.to_string(), schema.clone());
        self.states.insert(name.to_string(), CollectionState::Created);
        Ok(())
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.session
            .list_collections()
            .await
            .map_err(|e| e.during(Operation::ListCollections, ""))
    }

    /// Insert one batch. Every entity is checked against the schema first;
    /// if any fails nothing is sent.
    pub async fn insert_batch(&mut self, name: &str, entities: &[Entity]) -> Result<InsertSummary> {
        let op = Operation::Insert;
        if entities.is_empty() {
            return Err(VectorDbError::validation(name, "empty insert batch").during(op, name));
        }

        let schema = self.schema_of(name, op).await?;
        for (i, entity) in entities.iter().enumerate() {
            if let Err(err) = schema.validate_entity(entity) {
                warn!(collection = name, "entity {} of {} rejected", i, entities.len());
                return Err(err.during(op, name));
            }
        }

        let summary = self
            .session
            .insert(name, entities)
            .await
            .map_err(|e| e.during(op, name))?;
        if summary.insert_count != entities.len() {
            return Err(VectorDbError::Service {
                code: 0,
                message: format!(
                    "inserted {} of {} entities",
                    summary.insert_count,
                    entities.len()
                ),
            }
            .during(op, name));
        }

        self.advance(name, |s| match s {
            CollectionState::Created => CollectionState::Populated,
            other => other,
        });
        Ok(summary)
    }

    /// Build (or identically rebuild) an index on a vector field.
    pub async fn build_index(&mut self, name: &str, index: &IndexParams) -> Result<()> {
        let op = Operation::BuildIndex;
        let schema = self.schema_of(name, op).await?;
        index
            .validate_against(&schema)
            .map_err(|e| e.during(op, name))?;

        self.session
            .create_index(name, index)
            .await
            .map_err(|e| e.during(op, name))?;
        info!(
            "Created index {} ({}) on {}.{}",
            index.kind.name(),
            index.metric,
            name,
            index.field_name
        );

        self.advance(name, |s| match s {
            CollectionState::Created | CollectionState::Populated | CollectionState::IndexDropped => {
                CollectionState::Indexed
            }
            other => other,
        });
        Ok(())
    }

    pub async fn load(&mut self, name: &str) -> Result<()> {
        self.session
            .load_collection(name)
            .await
            .map_err(|e| e.during(Operation::Load, name))?;
        info!("Loaded collection {}", name);
        self.states.insert(name.to_string(), CollectionState::Loaded);
        Ok(())
    }

    pub async fn release(&mut self, name: &str) -> Result<()> {
        self.session
            .release_collection(name)
            .await
            .map_err(|e| e.during(Operation::Release, name))?;
        info!("Released collection {}", name);
        self.states.insert(name.to_string(), CollectionState::Released);
        Ok(())
    }

    /// Nearest neighbors of every query vector. The collection must be loaded.
    pub async fn search(&mut self, name: &str, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let op = Operation::Search;
        if let Some(state) = self.state(name) {
            if state != CollectionState::Loaded {
                return Err(VectorDbError::NotLoaded {
                    collection: name.to_string(),
                }
                .during(op, name));
            }
        }

        let schema = self.schema_of(name, op).await?;
        request
            .validate_against(&schema)
            .map_err(|e| e.during(op, name))?;

        self.session
            .search(name, request)
            .await
            .map_err(|e| e.during(op, name))
    }

    pub async fn drop_index(&mut self, name: &str, field_name: &str) -> Result<()> {
        self.session
            .drop_index(name, field_name)
            .await
            .map_err(|e| e.during(Operation::DropIndex, name))?;
        info!("Drop index successfully: {}.{}", name, field_name);
        self.advance(name, |_| CollectionState::IndexDropped);
        Ok(())
    }

    pub async fn drop_collection(&mut self, name: &str) -> Result<()> {
        self.session
            .drop_collection(name)
            .await
            .map_err(|e| e.during(Operation::DropCollection, name))?;
        info!("Drop collection: {}", name);
        self.schemas.remove(name);
        self.states.insert(name.to_string(), CollectionState::Absent);
        Ok(())
    }

    /// The full demo: set up, populate, index, search with a known vector, tear down.
    pub async fn run(&mut self, config: &WorkflowConfig) -> Result<WorkflowReport> {
        config.validate()?;
        let name = config.collection_name.as_str();
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let endpoint = self.session.endpoint().to_string();
        info!("Connected to {}", endpoint);

        let check_collection_exists = self.has_collection(&config.check_collection).await?;
        info!(
            "Does collection {} exist: {}",
            config.check_collection, check_collection_exists
        );

        self.ensure_absent(name).await?;
        self.create_collection(&config.schema()).await?;

        let collections = self.list_collections().await?;
        info!("list collections: {:?}", collections);

        let entities = random_entities(config, &mut rng);
        let insert = self.insert_batch(name, &entities).await?;
        info!("The number of entity: {}", insert.insert_count);

        self.build_index(name, &config.index_params()).await?;
        self.load(name).await?;

        // the second entity (id 2) is the query, as long as there is one
        let query_entity = entities
            .get(1)
            .or_else(|| entities.first())
            .ok_or_else(|| VectorDbError::Config("no entities to query with".to_string()))?;
        let query_id = query_entity.int64(&config.id_field).ok_or_else(|| {
            VectorDbError::Config(format!("query entity has no '{}' value", config.id_field))
        })?;
        let query = query_entity.vector(&config.vector_field).cloned().ok_or_else(|| {
            VectorDbError::Config(format!("query entity has no '{}' vector", config.vector_field))
        })?;

        let request = SearchRequest::new(&config.vector_field, vec![query], config.top_k)
            .with_filter(Filter::gt(&config.id_field, 0))
            .with_params(config.search_params());
        let results = self.search(name, &request).await?;

        self.release(name).await?;
        self.drop_index(name, &config.vector_field).await?;
        self.drop_collection(name).await?;

        Ok(WorkflowReport {
            endpoint,
            check_collection: config.check_collection.clone(),
            check_collection_exists,
            collections,
            insert,
            query_id,
            results,
        })
    }
}

/// `num_entities` rows with ids `1..=n` and uniformly random vectors.
pub fn random_entities<R: Rng + ?Sized>(config: &WorkflowConfig, rng: &mut R) -> Vec<Entity> {
    (1..=config.num_entities as i64)
        .map(|id| {
            Entity::new()
                .with_int64(&config.id_field, id)
                .with_vector(&config.vector_field, Vector::random(config.dim, rng))
        })
        .collect()
}
