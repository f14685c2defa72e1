use crate::batch::{BatchReport, TagOutcome};
use crate::tagger::DocumentTagger;
use errors::{SourceError, TaggingError};
use futures_util::StreamExt;
use futures_util::stream;
use std::sync::Arc;
use tg_core::{ContentSource, Document, FileRef, ListRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct IngestionRun {
    /// One per listed file, in listing order.
    pub outcomes: Vec<TagOutcome>,
    pub report: BatchReport
}

/// List, fetch and tag documents from a content source with bounded
/// concurrency.
pub struct IngestionPipeline {
    source: Arc<dyn ContentSource>,
    tagger: Arc<DocumentTagger>,
    max_concurrency: usize
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn ContentSource>,
        tagger: Arc<DocumentTagger>,
        max_concurrency: usize
    ) -> Self {
        Self {
            source,
            tagger,
            max_concurrency: max_concurrency.max(1)
        }
    }

    /// A listing failure aborts the run; per-document failures are reported
    /// in the outcomes.
    pub async fn run(
        &self,
        request: &ListRequest,
        cancel: &CancellationToken
    ) -> Result<IngestionRun, SourceError> {
        let files = self.source.list_files(request).await?;
        info!(
            count = files.len(),
            max_concurrency = self.max_concurrency,
            "Starting ingestion"
        );

        let outcomes = self.process(files, cancel).await;
        let mut report = BatchReport::from_outcomes(&outcomes);
        report.complete();

        info!(
            total = report.total,
            tagged = report.tagged,
            failed = report.failed,
            cancelled = report.cancelled,
            "Ingestion completed"
        );
        Ok(IngestionRun { outcomes, report })
    }

    /// Once `cancel` fires no further file is dispatched; files already in
    /// flight finish and the rest come back as [`TagOutcome::Cancelled`].
    pub async fn process(&self, files: Vec<FileRef>, cancel: &CancellationToken) -> Vec<TagOutcome> {
        let mut indexed: Vec<(usize, TagOutcome)> = stream::iter(files.into_iter().enumerate())
            .map(move |(position, file)| async move {
                if cancel.is_cancelled() {
                    return (
                        position,
                        TagOutcome::Cancelled {
                            document_id: file.id
                        }
                    );
                }
                (position, self.ingest_one(&file).await)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(position, _)| *position);
        let outcomes: Vec<TagOutcome> = indexed.into_iter().map(|(_, outcome)| outcome).collect();
        for outcome in &outcomes {
            outcome.record_metric();
        }
        outcomes
    }

    async fn ingest_one(&self, file: &FileRef) -> TagOutcome {
        let format = file.extension().unwrap_or_default();
        if !self.tagger.supports(&format) {
            debug!(document_id = %file.id, format = %format, "Skipping download of unsupported format");
            return TagOutcome::Failed(TaggingError::UnsupportedFormat {
                document_id: file.id.clone(),
                format
            });
        }

        let fetched = async {
            let permissions = self.source.get_permissions(file).await?;
            let content = self.source.get_content_bytes(file).await?;
            Ok::<_, SourceError>((permissions, content))
        }
        .await;

        let (permissions, content) = match fetched {
            Ok(parts) => parts,
            Err(source) => {
                warn!(document_id = %file.id, error = %source, "Failed to fetch document");
                return TagOutcome::Failed(TaggingError::Source {
                    document_id: file.id.clone(),
                    source
                });
            }
        };

        let document = Document::from_file(file, content, permissions);
        match self.tagger.tag(&document) {
            Ok(tagged) => TagOutcome::Tagged(tagged),
            Err(e) => {
                warn!(document_id = %file.id, error = %e, "Failed to tag document");
                TagOutcome::Failed(e)
            }
        }
    }
}
