//! HTTP route handlers of the emulated REST API.
//!
//! Replies always use status 200 with the `{code, message, data}` envelope;
//! failures are reported through `code`.

use crate::error::{Result, VectorDbError};
use crate::server::AppState;
use crate::service::wire::{
    self, ApiResponse, CollectionRequest, CreateCollectionRequest, DescribeData, HasData,
    IndexCreateRequest, IndexNameRequest, IndexSpec, InsertData, InsertRequest, LoadStateData,
    SearchBody, API_PREFIX,
};
use crate::service::VectorService;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

type Reply = Json<ApiResponse<Value>>;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub collection_count: usize,
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/collections/has", post(has_collection))
        .route("/collections/create", post(create_collection))
        .route("/collections/describe", post(describe_collection))
        .route("/collections/list", post(list_collections))
        .route("/collections/drop", post(drop_collection))
        .route("/collections/load", post(load_collection))
        .route("/collections/release", post(release_collection))
        .route("/collections/get_load_state", post(load_state))
        .route("/entities/insert", post(insert))
        .route("/entities/search", post(search))
        .route("/indexes/create", post(create_index))
        .route("/indexes/describe", post(describe_index))
        .route("/indexes/drop", post(drop_index));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(health))
        .with_state(state)
}

fn reply<T: Serialize>(result: Result<T>) -> Reply {
    match result.and_then(|data| serde_json::to_value(data).map_err(VectorDbError::from)) {
        Ok(data) => Json(ApiResponse::ok(data)),
        Err(err) => {
            warn!("request failed: {}", err);
            Json(ApiResponse::error(&err))
        }
    }
}

fn done(result: Result<()>) -> Reply {
    reply(result.map(|()| json!({})))
}

// --- Handlers ---

async fn has_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CollectionRequest>,
) -> Reply {
    reply(
        state
            .service
            .has_collection(&req.collection_name)
            .await
            .map(|has| HasData { has }),
    )
}

async fn create_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCollectionRequest>,
) -> Reply {
    let result = match req.into_schema() {
        Ok(schema) => state.service.create_collection(&schema).await,
        Err(err) => Err(err),
    };
    done(result)
}

async fn describe_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CollectionRequest>,
) -> Reply {
    reply(
        state
            .service
            .describe_collection(&req.collection_name)
            .await
            .map(|schema| DescribeData::from(&schema)),
    )
}

async fn list_collections(State(state): State<Arc<AppState>>) -> Reply {
    reply(state.service.list_collections().await)
}

async fn drop_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CollectionRequest>,
) -> Reply {
    done(state.service.drop_collection(&req.collection_name).await)
}

async fn load_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CollectionRequest>,
) -> Reply {
    done(state.service.load_collection(&req.collection_name).await)
}

async fn release_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CollectionRequest>,
) -> Reply {
    done(state.service.release_collection(&req.collection_name).await)
}

async fn load_state(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CollectionRequest>,
) -> Reply {
    reply(
        state
            .service
            .load_state(&req.collection_name)
            .await
            .map(|s| LoadStateData {
                load_state: s.as_str().to_string(),
            }),
    )
}

async fn insert(State(state): State<Arc<AppState>>, Json(req): Json<InsertRequest>) -> Reply {
    debug!(collection = %req.collection_name, rows = req.data.len(), "insert");
    reply(
        state
            .service
            .insert(&req.collection_name, &req.data)
            .await
            .map(|summary| InsertData {
                insert_count: summary.insert_count,
                insert_ids: summary.ids,
            }),
    )
}

async fn search(State(state): State<Arc<AppState>>, Json(body): Json<SearchBody>) -> Reply {
    reply(run_search(&state, body).await)
}

/// Hits of every query vector, flattened in query order.
async fn run_search(state: &AppState, body: SearchBody) -> Result<Vec<Map<String, Value>>> {
    let (name, request) = body.into_request()?;
    let results = state.service.search(&name, &request).await?;
    let schema = state.service.describe_collection(&name).await?;
    let primary = schema
        .primary_field()
        .map(|f| f.name.as_str())
        .unwrap_or("id");
    Ok(results
        .iter()
        .flatten()
        .map(|hit| wire::hit_to_json(primary, hit))
        .collect())
}

async fn create_index(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IndexCreateRequest>,
) -> Reply {
    let mut result = Ok(());
    for spec in req.index_params {
        result = state
            .service
            .create_index(&req.collection_name, &spec.into())
            .await;
        if result.is_err() {
            break;
        }
    }
    done(result)
}

async fn describe_index(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IndexNameRequest>,
) -> Reply {
    reply(
        state
            .service
            .describe_index(&req.collection_name, &req.index_name)
            .await
            .map(|index| vec![IndexSpec::from(&index)]),
    )
}

async fn drop_index(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IndexNameRequest>,
) -> Reply {
    done(
        state
            .service
            .drop_index(&req.collection_name, &req.index_name)
            .await,
    )
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let count = state
        .service
        .list_collections()
        .await
        .map(|names| names.len())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "ok".to_string(),
        collection_count: count,
    })
}
