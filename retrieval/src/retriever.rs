use crate::filter::{RequesterScope, build_predicate};
use config::SearchConfig;
use errors::RetrievalError;
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tg_core::{EmbeddingService, IndexStore, StoreHit};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPolicy {
    /// Characters of content kept per hit
    pub max_content_chars: usize,
    pub timeout: Duration
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            max_content_chars: 1000,
            timeout: Duration::from_secs(30)
        }
    }
}

impl From<&SearchConfig> for SearchPolicy {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_content_chars: config.max_content_chars,
            timeout: config.timeout()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub document_id: Option<String>,
    pub security_tier: Option<String>,
    pub content: String,
    pub score: f32,
    pub reranker_score: Option<f32>,
    pub metadata: BTreeMap<String, String>
}

/// The enforcement point for tier-filtered search.
///
/// The requester scope is turned into a store-side filter before any query is
/// issued. A scope that admits nobody returns no results without reaching the
/// embedding service or the index.
pub struct SecureRetriever {
    embeddings: Arc<dyn EmbeddingService>,
    store: Arc<dyn IndexStore>,
    policy: SearchPolicy
}

impl SecureRetriever {
    pub fn new(embeddings: Arc<dyn EmbeddingService>, store: Arc<dyn IndexStore>) -> Self {
        Self {
            embeddings,
            store,
            policy: SearchPolicy::default()
        }
    }

    pub fn with_policy(mut self, policy: SearchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    pub async fn search(
        &self,
        query: &str,
        scope: &RequesterScope,
        top_k: usize
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let start = Instant::now();
        let result = self.search_inner(query, scope, top_k).await;

        let outcome = match &result {
            Ok(hits) if hits.is_empty() => "empty",
            Ok(_) => "success",
            Err(RetrievalError::Timeout { .. }) => "timeout",
            Err(_) => "error"
        };
        counter!("tierguard_search_requests_total", "outcome" => outcome).increment(1);
        histogram!("tierguard_search_duration_seconds", "backend" => self.store.backend_name())
            .record(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            warn!(error = %e, "Search failed");
        }
        result
    }

    async fn search_inner(
        &self,
        query: &str,
        scope: &RequesterScope,
        top_k: usize
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let Some(predicate) = build_predicate(scope)? else {
            info!("Empty requester scope, returning no results");
            return Ok(Vec::new());
        };
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let timeout_ms = self.policy.timeout.as_millis() as u64;
        let hits = tokio::time::timeout(self.policy.timeout, async {
            let vector = self
                .embeddings
                .embed(query)
                .await
                .map_err(|e| match e {
                    errors::SourceError::Timeout { .. } => RetrievalError::Timeout { timeout_ms },
                    other => RetrievalError::Embedding {
                        reason: other.to_string()
                    }
                })?;
            self.store.query(query, &vector, &predicate, top_k).await
        })
        .await
        .map_err(|_| RetrievalError::Timeout { timeout_ms })??;

        debug!(
            hits = hits.len(),
            backend = self.store.backend_name(),
            "Index returned hits"
        );
        Ok(self.present(hits, top_k))
    }

    fn present(&self, mut hits: Vec<StoreHit>, top_k: usize) -> Vec<SearchHit> {
        hits.sort_by(|a, b| rank(b).total_cmp(&rank(a)));
        hits.truncate(top_k);
        hits.into_iter()
            .map(|mut hit| SearchHit {
                document_id: hit.metadata.remove("document_id"),
                security_tier: hit.metadata.remove("security_tier"),
                content: bound_content(&hit.content, self.policy.max_content_chars),
                id: hit.id,
                score: hit.score,
                reranker_score: hit.reranker_score,
                metadata: hit.metadata
            })
            .collect()
    }
}

/// Reranker score when the store supplied one, relevance score otherwise.
fn rank(hit: &StoreHit) -> f32 {
    hit.reranker_score.unwrap_or(hit.score)
}

fn bound_content(content: &str, max_chars: usize) -> String {
    content
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .take(max_chars)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32, reranker: Option<f32>) -> StoreHit {
        StoreHit {
            id: id.to_string(),
            content: format!("content of {id}"),
            score,
            reranker_score: reranker,
            metadata: BTreeMap::new()
        }
    }

    #[test]
    fn test_bound_content_flattens_and_truncates() {
        assert_eq!(bound_content("line one\nline two", 100), "line one line two");
        assert_eq!(bound_content("abcdef", 3), "abc");
        assert_eq!(bound_content("ééé", 2), "éé");
    }

    #[test]
    fn test_reranker_score_takes_precedence() {
        let retriever = SecureRetriever::new(
            Arc::new(testing::CountingEmbeddings::new(4)),
            Arc::new(crate::InMemoryIndexStore::new())
        );
        let hits = retriever.present(
            vec![
                hit("a", 0.9, Some(1.0)),
                hit("b", 0.1, Some(3.2)),
                hit("c", 0.5, Some(2.0)),
            ],
            2
        );
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_relevance_score_without_reranker() {
        let retriever = SecureRetriever::new(
            Arc::new(testing::CountingEmbeddings::new(4)),
            Arc::new(crate::InMemoryIndexStore::new())
        );
        let hits = retriever.present(vec![hit("a", 0.2, None), hit("b", 0.7, None)], 5);
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_policy_from_config() {
        let config = SearchConfig {
            max_content_chars: 250,
            timeout_seconds: 5,
            ..SearchConfig::default()
        };
        let policy = SearchPolicy::from(&config);
        assert_eq!(policy.max_content_chars, 250);
        assert_eq!(policy.timeout, Duration::from_secs(5));
    }
}
