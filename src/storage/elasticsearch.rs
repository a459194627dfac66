use async_trait::async_trait;
use elasticsearch::http::request::JsonBody;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::http::Url;
use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts};
use elasticsearch::params::Refresh;
use elasticsearch::{BulkParts, Elasticsearch, SearchParts};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{Storage, StorageError};
use crate::model::chart::{ChartPoint, ChartPointCollection, SprintKey};

const DEFAULT_INDEX: &str = "sprints";
const DEFAULT_PORT: u16 = 9200;
const MAX_POINTS_PER_SPRINT: i64 = 10_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElasticsearchConfig {
    /// Full URL such as `http://user:pw@host:9200`. Wins over the discrete fields.
    pub connection_string: Option<String>,
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Index the points live in.
    pub index: Option<String>,
}

impl ElasticsearchConfig {
    pub fn connection_url(&self) -> Result<Url, StorageError> {
        let raw = match &self.connection_string {
            Some(conn) => conn.clone(),
            None => {
                let scheme = self.scheme.as_deref().unwrap_or("http");
                let host = self.host.as_deref().unwrap_or("localhost");
                let port = self.port.unwrap_or(DEFAULT_PORT);
                let auth = match (self.user.as_deref(), self.password.as_deref()) {
                    (Some(user), Some(pw)) if !user.is_empty() && !pw.is_empty() => {
                        format!("{}:{}@", urlencoding::encode(user), urlencoding::encode(pw))
                    }
                    _ => String::new(),
                };
                format!("{scheme}://{auth}{host}:{port}")
            }
        };

        Url::parse(&raw).map_err(|e| StorageError::InvalidConfig {
            plugin: "Elasticsearch".into(),
            reason: format!("bad connection url: {e}"),
        })
    }

    fn index_name(&self) -> &str {
        self.index.as_deref().unwrap_or(DEFAULT_INDEX)
    }
}

/// Chart points as one document per point in a single index, partitioned by
/// the `sprint` keyword field.
pub struct ElasticsearchStorage {
    client: Elasticsearch,
    index: String,
}

impl ElasticsearchStorage {
    /// Opens the client and makes sure the index exists.
    pub async fn connect(config: ElasticsearchConfig) -> Result<Self, StorageError> {
        let storage = Self::unchecked(&config)?;
        storage.ensure_index().await?;
        log::info!("Connected to Elasticsearch, using index {}", storage.index);
        Ok(storage)
    }

    /// Builds the client without touching the server.
    fn unchecked(config: &ElasticsearchConfig) -> Result<Self, StorageError> {
        let pool = SingleNodeConnectionPool::new(config.connection_url()?);
        let transport = TransportBuilder::new(pool)
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self {
            client: Elasticsearch::new(transport),
            index: config.index_name().to_string(),
        })
    }

    async fn ensure_index(&self) -> Result<(), StorageError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index.as_str()]))
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if exists.status_code().is_success() {
            return Ok(());
        }

        let created = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.index))
            .body(index_mapping())
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if !created.status_code().is_success() {
            let body = created.text().await.unwrap_or_default();
            return Err(StorageError::Connection(format!(
                "failed to create index {}: {body}",
                self.index
            )));
        }
        log::info!("Created Elasticsearch index {}", self.index);
        Ok(())
    }

    async fn search(&self, sprint: &SprintKey) -> Result<ChartPointCollection, StorageError> {
        let response = self
            .client
            .search(SearchParts::Index(&[self.index.as_str()]))
            .body(search_query(sprint))
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if !response.status_code().is_success() {
            let status = response.status_code();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Backend(format!("search returned {status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(hits_to_collection(&body))
    }

    async fn bulk_insert(&self, sprint: &SprintKey, points: &[ChartPoint]) -> Result<(), StorageError> {
        let body: Vec<JsonBody<Value>> = bulk_body(sprint, points)?
            .into_iter()
            .map(JsonBody::from)
            .collect();

        let response = self
            .client
            .bulk(BulkParts::Index(&self.index))
            .refresh(Refresh::WaitFor)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let status = response.status_code();
        let result: Value = response
            .json()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if !status.is_success() || result["errors"].as_bool().unwrap_or(false) {
            return Err(StorageError::Backend(format!(
                "bulk insert returned {status}: {result}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for ElasticsearchStorage {
    fn name(&self) -> &str {
        "Elasticsearch"
    }

    async fn get(&self, sprint: &SprintKey) -> Result<Option<ChartPointCollection>, StorageError> {
        match self.search(sprint).await {
            Ok(points) => Ok(Some(points)),
            Err(e) => {
                log::error!(
                    "Error while attempting to retrieve records from database for sprint {sprint}: {e}"
                );
                Ok(None)
            }
        }
    }

    async fn set(&self, sprint: &SprintKey, points: &[ChartPoint]) -> Result<(), StorageError> {
        if points.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.bulk_insert(sprint, points).await {
            log::error!(
                "Error while attempting to write new records to database for sprint {sprint}: {e}"
            );
        }
        Ok(())
    }
}

fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "sprint": { "type": "keyword" },
                "x": { "type": "date" },
                "y": { "type": "integer" },
                "c": { "type": "keyword" }
            }
        }
    })
}

fn search_query(sprint: &SprintKey) -> Value {
    json!({
        "size": MAX_POINTS_PER_SPRINT,
        "query": { "term": { "sprint": sprint.as_str() } }
    })
}

/// Alternating action/document lines; ids are left to the server.
fn bulk_body(sprint: &SprintKey, points: &[ChartPoint]) -> Result<Vec<Value>, StorageError> {
    let mut body = Vec::with_capacity(points.len() * 2);
    for point in points {
        let mut doc = serde_json::to_value(point)?;
        doc["sprint"] = Value::String(sprint.to_string());
        body.push(json!({ "index": {} }));
        body.push(doc);
    }
    Ok(body)
}

/// Maps search hits to `_id -> point`, dropping the `sprint` field.
fn hits_to_collection(body: &Value) -> ChartPointCollection {
    let hits = body["hits"]["hits"].as_array().cloned().unwrap_or_default();

    hits.into_iter()
        .filter_map(|hit| {
            let id = hit["_id"].as_str()?.to_string();
            match serde_json::from_value::<ChartPoint>(hit["_source"].clone()) {
                Ok(point) => Some((id, point)),
                Err(e) => {
                    log::warn!("Skipping malformed chart point document {id}: {e}");
                    None
                }
            }
        })
        .collect()
}
