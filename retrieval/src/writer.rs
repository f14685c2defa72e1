use crate::chunker::Chunker;
use errors::RetrievalError;
use std::sync::Arc;
use tg_core::{EmbeddingService, IndexStore, IndexedDocument};
use tracing::{debug, info, warn};

/// Splits tagged documents into chunks, embeds them, and uploads them.
///
/// Every chunk inherits the tier and grantees of its document unchanged.
pub struct IndexWriter {
    embeddings: Arc<dyn EmbeddingService>,
    store: Arc<dyn IndexStore>,
    chunker: Chunker,
    batch_size: usize
}

impl IndexWriter {
    pub fn new(
        embeddings: Arc<dyn EmbeddingService>,
        store: Arc<dyn IndexStore>,
        chunker: Chunker,
        batch_size: usize
    ) -> Self {
        Self {
            embeddings,
            store,
            chunker,
            batch_size: batch_size.max(1)
        }
    }

    pub fn from_config(
        embeddings: Arc<dyn EmbeddingService>,
        store: Arc<dyn IndexStore>,
        config: &config::IngestionConfig
    ) -> Self {
        Self::new(
            embeddings,
            store,
            Chunker::from_config(config),
            config.upsert_batch_size
        )
    }

    pub fn chunk(&self, document: &IndexedDocument) -> Vec<IndexedDocument> {
        let key = index_key(&document.document_id);
        self.chunker
            .split(&document.content)
            .into_iter()
            .enumerate()
            .map(|(n, content)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk".to_string(), n.to_string());
                IndexedDocument {
                    id: format!("{key}-{n}"),
                    document_id: document.document_id.clone(),
                    content,
                    embedding: Vec::new(),
                    security_tier: document.security_tier.clone(),
                    grantees: document.grantees.clone(),
                    metadata
                }
            })
            .collect()
    }

    /// Indexes each document on its own. A document whose chunks fail to
    /// embed or upload is reported and the rest are still written.
    pub async fn write(&self, documents: &[IndexedDocument]) -> WriteReport {
        let mut report = WriteReport::default();
        for document in documents {
            match self.write_document(document).await {
                Ok(written) => {
                    report.written += written;
                    report.documents += 1;
                }
                Err(error) => {
                    warn!(document_id = %document.document_id, error = %error, "Failed to index document");
                    report.failures.push(WriteFailure {
                        document_id: document.document_id.clone(),
                        error
                    });
                }
            }
        }

        info!(
            documents = report.documents,
            failed = report.failures.len(),
            chunks = report.written,
            backend = self.store.backend_name(),
            "Indexed documents"
        );
        report
    }

    /// All chunks are embedded before any is uploaded.
    async fn write_document(&self, document: &IndexedDocument) -> Result<usize, RetrievalError> {
        let chunks = self.chunk(document);
        if chunks.is_empty() {
            debug!(document_id = %document.document_id, "Document has no text to index");
            return Ok(0);
        }

        let mut embedded = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .embeddings
                .embed_batch(&texts)
                .await
                .map_err(|e| RetrievalError::Embedding {
                    reason: e.to_string()
                })?;
            if vectors.len() != batch.len() {
                return Err(RetrievalError::Embedding {
                    reason: format!(
                        "expected {} vectors, received {}",
                        batch.len(),
                        vectors.len()
                    )
                });
            }

            embedded.extend(batch.iter().cloned().zip(vectors).map(|(mut chunk, vector)| {
                chunk.embedding = vector;
                chunk
            }));
        }

        let mut written = 0;
        for batch in embedded.chunks(self.batch_size) {
            written += self.store.upsert(batch.to_vec()).await?;
        }
        debug!(document_id = %document.document_id, chunks = written, "Upserted document chunks");
        Ok(written)
    }
}

/// A document that could not be indexed.
#[derive(Debug)]
pub struct WriteFailure {
    pub document_id: String,
    pub error: RetrievalError
}

/// Outcome of [`IndexWriter::write`].
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Chunks written to the store.
    pub written: usize,
    /// Documents fully indexed, including ones with no text.
    pub documents: usize,
    pub failures: Vec<WriteFailure>
}

impl WriteReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Search keys may only hold letters, digits, `_`, `-` and `=`.
fn index_key(document_id: &str) -> String {
    document_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
