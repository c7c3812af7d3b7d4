//! REST client for a remote Milvus-compatible service.

use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::wire::{
    self, ApiResponse, CollectionRequest, CreateCollectionRequest, DescribeData, HasData,
    IndexCreateRequest, IndexNameRequest, IndexSpec, InsertBody, InsertData, LoadStateData,
    SearchBody, API_PREFIX, CODE_SUCCESS, CODE_UNEXPECTED,
};
use super::{InsertSummary, LoadState, VectorService};
use crate::config::ConnectionConfig;
use crate::error::{Result, VectorDbError};
use crate::index::IndexParams;
use crate::schema::{CollectionSchema, Entity};
use crate::search::{SearchRequest, SearchResult};

const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Session with a remote service over its `/v2/vectordb` REST API.
#[derive(Debug)]
pub struct MilvusClient {
    base_url: String,
    endpoint: String,
    http: reqwest::Client,
    token: Option<String>,
    load_timeout: Duration,
    /// Collection name -> primary key field, used to decode search hits
    primary_fields: RwLock<HashMap<String, String>>,
}

impl MilvusClient {
    /// Open a session and check it with a collection listing.
    ///
    /// With `secure` set the certificate at `server_pem_path` becomes a
    /// trusted root, and `server_name` is the name the server certificate is
    /// checked against while the connection still goes to `host:port`.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout());
        let mut url_host = config.host.clone();

        if config.secure {
            if let Some(path) = &config.server_pem_path {
                let pem = tokio::fs::read(path).await.map_err(|e| {
                    VectorDbError::Connection(format!(
                        "cannot read server certificate {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    VectorDbError::Connection(format!(
                        "invalid server certificate {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                builder = builder.add_root_certificate(cert);
            }

            if let Some(name) = config.server_name.as_deref().filter(|n| *n != config.host) {
                let addr = tokio::net::lookup_host((config.host.as_str(), config.port))
                    .await
                    .map_err(|e| {
                        VectorDbError::Connection(format!("cannot resolve {}: {}", config.host, e))
                    })?
                    .next()
                    .ok_or_else(|| {
                        VectorDbError::Connection(format!("no address for {}", config.host))
                    })?;
                builder = builder.resolve(name, addr);
                url_host = name.to_string();
            }
        } else if config.server_pem_path.is_some() {
            warn!("server certificate given but secure transport is off; ignoring it");
        }

        let http = builder
            .build()
            .map_err(|e| VectorDbError::Connection(format!("cannot build HTTP client: {}", e)))?;

        let scheme = if config.secure { "https" } else { "http" };
        let host = if url_host.contains(':') {
            format!("[{}]", url_host)
        } else {
            url_host
        };
        let client = Self {
            base_url: format!("{}://{}:{}{}", scheme, host, config.port, API_PREFIX),
            endpoint: config.uri(),
            http,
            token: config.token.clone(),
            load_timeout: config.load_timeout(),
            primary_fields: RwLock::new(HashMap::new()),
        };

        info!("Connecting to {}", client.endpoint);
        client.list_collections().await.map_err(|e| match e {
            err @ VectorDbError::Connection(_) => err,
            other => VectorDbError::Connection(format!(
                "{} did not answer a collection listing: {}",
                client.endpoint, other
            )),
        })?;
        Ok(client)
    }

    async fn call<B, T>(&self, path: &str, body: &B, collection: &str, field: Option<&str>) -> Result<Option<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let mut req = self.http.post(&url).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|e| self.transport_error(e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => format!("<body unreadable: {}>", e),
            };
            return Err(VectorDbError::Service {
                code: i32::from(status.as_u16()),
                message: format!("{} - {}", status, body),
            });
        }

        let reply: ApiResponse<T> = resp.json().await.map_err(|e| self.transport_error(e))?;
        if reply.code != CODE_SUCCESS {
            let message = reply.message.unwrap_or_else(|| "Unknown error".to_string());
            return Err(wire::decode_error(reply.code, message, collection, field));
        }
        Ok(reply.data)
    }

    /// Like [`call`](Self::call) for replies whose `data` must be present.
    async fn call_data<B, T>(&self, path: &str, body: &B, collection: &str) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.call(path, body, collection, None)
            .await?
            .ok_or_else(|| VectorDbError::Service {
                code: CODE_UNEXPECTED,
                message: format!("{} returned no data", path),
            })
    }

    fn transport_error(&self, err: reqwest::Error) -> VectorDbError {
        if err.is_connect() || err.is_timeout() {
            VectorDbError::Connection(format!("cannot reach {}: {}", self.endpoint, err))
        } else {
            VectorDbError::Http(err)
        }
    }

    fn remember_primary(&self, schema: &CollectionSchema) {
        if let (Some(pk), Ok(mut cache)) = (schema.primary_field(), self.primary_fields.write()) {
            cache.insert(schema.name.clone(), pk.name.clone());
        }
    }

    async fn primary_field(&self, name: &str) -> Result<String> {
        let cached = self
            .primary_fields
            .read()
            .ok()
            .and_then(|cache| cache.get(name).cloned());
        if let Some(pk) = cached {
            return Ok(pk);
        }
        let schema = self.describe_collection(name).await?;
        schema
            .primary_field()
            .map(|f| f.name.clone())
            .ok_or_else(|| VectorDbError::schema(name, "collection has no primary field"))
    }
}

#[async_trait]
impl VectorService for MilvusClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        let data: Option<HasData> = self
            .call("/collections/has", &CollectionRequest::new(name), name, None)
            .await?;
        Ok(data.map_or(false, |d| d.has))
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        schema.validate()?;
        let body = CreateCollectionRequest::from(schema);
        self.call::<_, IgnoredAny>("/collections/create", &body, &schema.name, None)
            .await?;
        self.remember_primary(schema);
        Ok(())
    }

    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema> {
        let data: DescribeData = self
            .call_data("/collections/describe", &CollectionRequest::new(name), name)
            .await?;
        let schema = data.into_schema()?;
        self.remember_primary(&schema);
        Ok(schema)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let data: Option<Vec<String>> = self
            .call("/collections/list", &serde_json::json!({}), "", None)
            .await?;
        Ok(data.unwrap_or_default())
    }

    async fn insert(&self, name: &str, entities: &[Entity]) -> Result<InsertSummary> {
        let body = InsertBody {
            collection_name: name,
            data: entities,
        };
        let data: InsertData = self.call_data("/entities/insert", &body, name).await?;
        if data.insert_count != entities.len() {
            return Err(VectorDbError::Service {
                code: CODE_UNEXPECTED,
                message: format!(
                    "service stored {} of {} entities",
                    data.insert_count,
                    entities.len()
                ),
            });
        }
        Ok(InsertSummary {
            insert_count: data.insert_count,
            ids: data.insert_ids,
        })
    }

    async fn create_index(&self, name: &str, index: &IndexParams) -> Result<()> {
        let body = IndexCreateRequest {
            collection_name: name.to_string(),
            index_params: vec![IndexSpec::from(index)],
        };
        self.call::<_, IgnoredAny>("/indexes/create", &body, name, Some(&index.field_name))
            .await?;
        Ok(())
    }

    async fn describe_index(&self, name: &str, field_name: &str) -> Result<IndexParams> {
        let body = IndexNameRequest {
            collection_name: name.to_string(),
            index_name: field_name.to_string(),
        };
        let specs: Option<Vec<IndexSpec>> = self
            .call("/indexes/describe", &body, name, Some(field_name))
            .await?;
        specs
            .unwrap_or_default()
            .into_iter()
            .find(|spec| spec.field_name == field_name)
            .map(IndexParams::from)
            .ok_or_else(|| VectorDbError::not_found(name, format!("index '{}'", field_name)))
    }

    async fn drop_index(&self, name: &str, field_name: &str) -> Result<()> {
        let body = IndexNameRequest {
            collection_name: name.to_string(),
            index_name: field_name.to_string(),
        };
        self.call::<_, IgnoredAny>("/indexes/drop", &body, name, Some(field_name))
            .await?;
        Ok(())
    }

    async fn load_collection(&self, name: &str) -> Result<()> {
        self.call::<_, IgnoredAny>("/collections/load", &CollectionRequest::new(name), name, None)
            .await?;

        let started = Instant::now();
        loop {
            match self.load_state(name).await? {
                LoadState::Loaded => return Ok(()),
                LoadState::NotExist => return Err(VectorDbError::not_found(name, "collection")),
                state => {
                    if started.elapsed() >= self.load_timeout {
                        return Err(VectorDbError::Timeout(format!(
                            "collection '{}' still {} after {:?}",
                            name,
                            state.as_str(),
                            self.load_timeout
                        )));
                    }
                    debug!(collection = name, state = state.as_str(), "waiting for load");
                    tokio::time::sleep(LOAD_POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn release_collection(&self, name: &str) -> Result<()> {
        self.call::<_, IgnoredAny>("/collections/release", &CollectionRequest::new(name), name, None)
            .await?;
        Ok(())
    }

    async fn load_state(&self, name: &str) -> Result<LoadState> {
        let data: LoadStateData = self
            .call_data("/collections/get_load_state", &CollectionRequest::new(name), name)
            .await?;
        LoadState::parse(&data.load_state).ok_or_else(|| VectorDbError::Service {
            code: CODE_UNEXPECTED,
            message: format!("unknown load state '{}'", data.load_state),
        })
    }

    async fn search(&self, name: &str, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let primary = self.primary_field(name).await?;
        let mut results = Vec::with_capacity(request.vectors.len());

        // one call per query vector
        for vector in &request.vectors {
            let body = SearchBody::single(name, request, vector);
            let rows: Option<Vec<Map<String, Value>>> = self
                .call("/entities/search", &body, name, Some(&request.anns_field))
                .await?;
            let hits = rows
                .unwrap_or_default()
                .iter()
                .map(|row| wire::hit_from_json(&primary, row))
                .collect::<Result<SearchResult>>()?;
            results.push(hits);
        }
        Ok(results)
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        if !self.has_collection(name).await? {
            return Err(VectorDbError::not_found(name, "collection"));
        }
        self.call::<_, IgnoredAny>("/collections/drop", &CollectionRequest::new(name), name, None)
            .await?;
        if let Ok(mut cache) = self.primary_fields.write() {
            cache.remove(name);
        }
        Ok(())
    }
}
