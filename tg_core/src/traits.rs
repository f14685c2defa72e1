use crate::filter::FilterPredicate;
use crate::types::{AccessToken, ClientCredentials, FileRef, IndexedDocument, ListRequest, StoreHit};
use async_trait::async_trait;
use errors::{ExtractionError, RetrievalError, SourceError};

/// A permissioned content source such as a SharePoint document library.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn list_files(&self, request: &ListRequest) -> Result<Vec<FileRef>, SourceError>;

    /// Raw permission records as returned by the source, one payload per file.
    async fn get_permissions(&self, file: &FileRef) -> Result<serde_json::Value, SourceError>;

    async fn get_content_bytes(&self, file: &FileRef) -> Result<Vec<u8>, SourceError>;
}

/// Issues bearer tokens for the content source and directory APIs.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn acquire_token(&self, credentials: &ClientCredentials) -> Result<AccessToken, SourceError>;
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SourceError>;

    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SourceError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// The search index. Filters are evaluated by the store itself.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn upsert(&self, documents: Vec<IndexedDocument>) -> Result<usize, RetrievalError>;

    async fn query(
        &self,
        text: &str,
        vector: &[f32],
        filter: &FilterPredicate,
        top_k: usize
    ) -> Result<Vec<StoreHit>, RetrievalError>;

    fn backend_name(&self) -> &'static str;
}

/// Turns a raw payload of a given format into plain text.
pub trait ContentExtractor: Send + Sync {
    /// Lower-case extensions this extractor handles, without the dot.
    fn formats(&self) -> &[&'static str];

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}
