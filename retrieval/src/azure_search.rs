use crate::filter::to_odata;
use async_trait::async_trait;
use config::SearchConfig;
use errors::RetrievalError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tg_core::{FilterPredicate, IndexStore, IndexedDocument, StoreHit};
use tracing::{debug, info};

const BACKEND: &str = "azure_search";

/// An Azure AI Search index queried with hybrid text and vector search plus
/// semantic reranking.
///
/// Index fields: `id`, `document_id`, `content`, the vector field named in
/// configuration, `security_tier`, `grantees` (string collection) and
/// `metadata` (JSON text).
pub struct AzureSearchStore {
    http_client: Client,
    index_url: String,
    api_key: String,
    api_version: String,
    semantic_configuration: String,
    vector_field: String,
    vector_k: usize,
    timeout_ms: u64
}

#[derive(Debug, Serialize)]
struct IndexBatch {
    value: Vec<serde_json::Map<String, serde_json::Value>>
}

#[derive(Debug, Deserialize)]
struct IndexBatchResponse {
    value: Vec<IndexingResult>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingResult {
    key: String,
    status: bool,
    error_message: Option<String>
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    search: &'a str,
    top: usize,
    filter: String,
    query_type: &'static str,
    semantic_configuration: &'a str,
    vector_queries: Vec<VectorQuery<'a>>,
    select: &'static str
}

#[derive(Debug, Serialize)]
struct VectorQuery<'a> {
    kind: &'static str,
    vector: &'a [f32],
    k: usize,
    fields: &'a str
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    value: Vec<SearchResult>
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "@search.score")]
    score: f32,
    #[serde(rename = "@search.rerankerScore")]
    reranker_score: Option<f32>,
    id: String,
    #[serde(default)]
    content: String,
    document_id: Option<String>,
    security_tier: Option<String>,
    metadata: Option<String>
}

impl AzureSearchStore {
    pub fn new(config: &SearchConfig) -> Result<Self, RetrievalError> {
        let timeout = config.timeout();
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| backend_error(e.to_string()))?;

        Ok(Self {
            http_client,
            index_url: format!(
                "{}/indexes/{}",
                config.endpoint.trim_end_matches('/'),
                urlencoding::encode(&config.index_name)
            ),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            semantic_configuration: config.semantic_configuration.clone(),
            vector_field: config.vector_field.clone(),
            vector_k: config.vector_k,
            timeout_ms: timeout.as_millis() as u64
        })
    }

    fn url(&self, operation: &str) -> String {
        format!(
            "{}/docs/{}?api-version={}",
            self.index_url,
            operation,
            urlencoding::encode(&self.api_version)
        )
    }

    fn to_index_action(
        &self,
        doc: IndexedDocument
    ) -> Result<serde_json::Map<String, serde_json::Value>, RetrievalError> {
        let metadata =
            serde_json::to_string(&doc.metadata).map_err(|e| backend_error(e.to_string()))?;

        let mut action = serde_json::Map::new();
        action.insert("@search.action".into(), "mergeOrUpload".into());
        action.insert("id".into(), doc.id.into());
        action.insert("document_id".into(), doc.document_id.into());
        action.insert("content".into(), doc.content.into());
        action.insert(self.vector_field.clone(), doc.embedding.into());
        action.insert("security_tier".into(), doc.security_tier.to_string().into());
        action.insert("grantees".into(), doc.grantees.into());
        action.insert("metadata".into(), metadata.into());
        Ok(action)
    }

    async fn post<B, T>(&self, url: &str, body: &B) -> Result<T, RetrievalError>
    where
        B: Serialize + Sync,
        T: for<'de> Deserialize<'de> + Send
    {
        let response = self
            .http_client
            .post(url)
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(backend_error(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        response.json::<T>().await.map_err(|e| self.transport_error(&e))
    }

    fn transport_error(&self, err: &reqwest::Error) -> RetrievalError {
        if err.is_timeout() {
            RetrievalError::Timeout {
                timeout_ms: self.timeout_ms
            }
        } else {
            backend_error(err.to_string())
        }
    }
}

fn backend_error(reason: String) -> RetrievalError {
    RetrievalError::Backend {
        backend: BACKEND.to_string(),
        reason
    }
}

impl From<SearchResult> for StoreHit {
    fn from(result: SearchResult) -> Self {
        let mut metadata: BTreeMap<String, String> = result
            .metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
            .unwrap_or_default();
        if let Some(document_id) = result.document_id {
            metadata.insert("document_id".to_string(), document_id);
        }
        if let Some(tier) = result.security_tier {
            metadata.insert("security_tier".to_string(), tier);
        }

        StoreHit {
            id: result.id,
            content: result.content,
            score: result.score,
            reranker_score: result.reranker_score,
            metadata
        }
    }
}

#[async_trait]
impl IndexStore for AzureSearchStore {
    async fn upsert(&self, documents: Vec<IndexedDocument>) -> Result<usize, RetrievalError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let value = documents
            .into_iter()
            .map(|doc| self.to_index_action(doc))
            .collect::<Result<Vec<_>, _>>()?;
        let count = value.len();

        let response: IndexBatchResponse = self.post(&self.url("index"), &IndexBatch { value }).await?;

        let failures: Vec<String> = response
            .value
            .into_iter()
            .filter(|r| !r.status)
            .map(|r| format!("{}: {}", r.key, r.error_message.unwrap_or_default()))
            .collect();
        if !failures.is_empty() {
            return Err(backend_error(format!(
                "{} of {} documents were rejected ({})",
                failures.len(),
                count,
                failures.join("; ")
            )));
        }

        info!(count, "Uploaded documents to Azure AI Search");
        Ok(count)
    }

    async fn query(
        &self,
        text: &str,
        vector: &[f32],
        filter: &FilterPredicate,
        top_k: usize
    ) -> Result<Vec<StoreHit>, RetrievalError> {
        let filter = to_odata(filter)?;
        debug!(filter = %filter, top_k, "Querying Azure AI Search");

        let request = SearchRequest {
            search: text,
            top: top_k,
            filter,
            query_type: "semantic",
            semantic_configuration: &self.semantic_configuration,
            vector_queries: vec![VectorQuery {
                kind: "vector",
                vector,
                k: self.vector_k,
                fields: &self.vector_field
            }],
            select: "id,document_id,content,security_tier,metadata"
        };

        let response: SearchResponse = self.post(&self.url("search"), &request).await?;
        Ok(response.value.into_iter().map(StoreHit::from).collect())
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
