use async_trait::async_trait;
use errors::RetrievalError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use tg_core::{FilterPredicate, IndexStore, IndexedDocument, StoreHit};

/// An index held in process memory.
///
/// Relevance is cosine similarity between the query vector and the chunk
/// embedding plus the share of query terms found in the chunk text. There is
/// no reranker, so hits never carry a reranker score.
#[derive(Default)]
pub struct InMemoryIndexStore {
    documents: RwLock<BTreeMap<String, IndexedDocument>>
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<IndexedDocument> {
        self.documents.read().get(id).cloned()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn keyword_overlap(query: &BTreeSet<String>, content: &str) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let content = terms(content);
    query.intersection(&content).count() as f32 / query.len() as f32
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn upsert(&self, documents: Vec<IndexedDocument>) -> Result<usize, RetrievalError> {
        let count = documents.len();
        let mut stored = self.documents.write();
        for doc in documents {
            stored.insert(doc.id.clone(), doc);
        }
        Ok(count)
    }

    async fn query(
        &self,
        text: &str,
        vector: &[f32],
        filter: &FilterPredicate,
        top_k: usize
    ) -> Result<Vec<StoreHit>, RetrievalError> {
        let query_terms = terms(text);
        let stored = self.documents.read();

        let mut hits: Vec<StoreHit> = stored
            .values()
            .filter(|doc| filter.matches(doc))
            .map(|doc| {
                let mut metadata = doc.metadata.clone();
                metadata.insert("document_id".to_string(), doc.document_id.clone());
                metadata.insert("security_tier".to_string(), doc.security_tier.to_string());
                StoreHit {
                    id: doc.id.clone(),
                    content: doc.content.clone(),
                    score: cosine(vector, &doc.embedding) + keyword_overlap(&query_terms, &doc.content),
                    reranker_score: None,
                    metadata
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_core::SecurityTier;
    use tg_core::filter::{GRANTEES_FIELD, TIER_FIELD};

    fn doc(id: &str, content: &str, tier: &str, embedding: Vec<f32>) -> IndexedDocument {
        IndexedDocument {
            id: id.to_string(),
            document_id: id.to_string(),
            content: content.to_string(),
            embedding,
            security_tier: SecurityTier::from(tier),
            grantees: vec!["Members".to_string()],
            metadata: BTreeMap::new()
        }
    }

    #[test]
    fn test_cosine() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = InMemoryIndexStore::new();
        store
            .upsert(vec![doc("a", "old", "Group_low", vec![])])
            .await
            .unwrap();
        let count = store
            .upsert(vec![doc("a", "new", "Group_low", vec![])])
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().content, "new");
    }

    #[tokio::test]
    async fn test_query_applies_filter_before_ranking() {
        let store = InMemoryIndexStore::new();
        store
            .upsert(vec![
                doc("low", "budget plan", "Group_low", vec![1.0, 0.0]),
                doc("critical", "budget plan", "Group_critical", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store
            .query(
                "budget",
                &[1.0, 0.0],
                &FilterPredicate::eq(TIER_FIELD, "Group_low"),
                10
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "low");
        assert_eq!(hits[0].metadata["security_tier"], "Group_low");
        assert!(hits[0].reranker_score.is_none());
    }

    #[tokio::test]
    async fn test_query_ranks_and_truncates() {
        let store = InMemoryIndexStore::new();
        store
            .upsert(vec![
                doc("near", "travel policy", "Group_low", vec![1.0, 0.1]),
                doc("far", "holiday calendar", "Group_low", vec![0.0, 1.0]),
                doc("keyword", "travel expenses", "Group_low", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store
            .query(
                "travel",
                &[1.0, 0.0],
                &FilterPredicate::any_of(GRANTEES_FIELD, ["Members"]),
                2
            )
            .await
            .unwrap();

        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "keyword"]);
    }
}
