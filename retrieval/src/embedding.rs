use async_trait::async_trait;
use config::EmbeddingConfig;
use errors::SourceError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tg_core::EmbeddingService;
use tracing::debug;

/// Embeddings from an Azure OpenAI deployment.
pub struct AzureOpenAiEmbeddings {
    http_client: Client,
    url: String,
    api_key: String,
    dimension: usize,
    timeout_ms: u64
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String]
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize
}

impl AzureOpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, SourceError> {
        let timeout = std::time::Duration::from_secs(config.timeout_seconds);
        let timeout_ms = timeout.as_millis() as u64;
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::from_reqwest(&e, timeout_ms))?;

        let url = format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            config.endpoint.trim_end_matches('/'),
            urlencoding::encode(&config.deployment),
            urlencoding::encode(&config.api_version)
        );

        Ok(Self {
            http_client,
            url,
            api_key: config.api_key.clone(),
            dimension: config.dimension,
            timeout_ms
        })
    }
}

#[async_trait]
impl EmbeddingService for AzureOpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SourceError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| SourceError::Decode {
            reason: "embedding response contained no vectors".to_string()
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SourceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), "Requesting embeddings");

        let response = self
            .http_client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&EmbeddingRequest { input: texts })
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(&e, self.timeout_ms))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SourceError::Auth {
                    reason: "Azure OpenAI rejected the API key".to_string()
                });
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(SourceError::RateLimited { retry_after });
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(SourceError::Api {
                    status: status.as_u16(),
                    message: body
                });
            }
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| SourceError::from_reqwest(&e, self.timeout_ms))?;

        if body.data.len() != texts.len() {
            return Err(SourceError::Decode {
                reason: format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    body.data.len()
                )
            });
        }
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            endpoint: endpoint.to_string(),
            api_key: "openai-key".to_string(),
            dimension: 3,
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_batch_is_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/foundational-ada/embeddings"))
            .and(query_param("api-version", "2023-05-15"))
            .and(header("api-key", "openai-key"))
            .and(body_json(json!({ "input": ["first", "second"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 1.0, 0.0] },
                    { "index": 0, "embedding": [1.0, 0.0, 0.0] }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embeddings = AzureOpenAiEmbeddings::new(&config(&server.uri())).unwrap();
        let vectors = embeddings
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_rejected_key_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let embeddings = AzureOpenAiEmbeddings::new(&config(&server.uri())).unwrap();
        let err = embeddings.embed("hello").await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_throttling_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let embeddings = AzureOpenAiEmbeddings::new(&config(&server.uri())).unwrap();
        let err = embeddings.embed("hello").await.unwrap_err();
        assert_eq!(err.retry_after(), Some(7));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let embeddings = AzureOpenAiEmbeddings::new(&config("http://127.0.0.1:9")).unwrap();
        assert!(embeddings.embed_batch(&[]).await.unwrap().is_empty());
    }
}
