use chrono::{DateTime, Utc};
use errors::TaggingError;
use metrics::counter;
use serde::Serialize;
use std::collections::BTreeMap;
use tg_core::IndexedDocument;

/// Result of tagging one document. A batch yields one per input, in input
/// order.
#[derive(Debug)]
pub enum TagOutcome {
    Tagged(IndexedDocument),
    Failed(TaggingError),
    /// Never dispatched because the run was cancelled.
    Cancelled { document_id: String }
}

impl TagOutcome {
    pub fn document_id(&self) -> &str {
        match self {
            Self::Tagged(doc) => &doc.document_id,
            Self::Failed(e) => e.document_id(),
            Self::Cancelled { document_id } => document_id
        }
    }

    pub fn is_tagged(&self) -> bool {
        matches!(self, Self::Tagged(_))
    }

    pub fn tagged(&self) -> Option<&IndexedDocument> {
        match self {
            Self::Tagged(doc) => Some(doc),
            _ => None
        }
    }

    pub fn into_tagged(self) -> Option<IndexedDocument> {
        match self {
            Self::Tagged(doc) => Some(doc),
            _ => None
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Tagged(_) => "tagged",
            Self::Failed(_) => "failed",
            Self::Cancelled { .. } => "cancelled"
        }
    }

    pub(crate) fn record_metric(&self) {
        counter!("tierguard_documents_tagged_total", "outcome" => self.label()).increment(1);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    pub document_id: String,
    pub kind: String,
    pub error: String,
    pub timestamp: DateTime<Utc>
}

/// Summary of an ingestion batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total: usize,
    pub tagged: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Chunks written to the index store; zero on a dry run.
    pub indexed_chunks: usize,
    /// Tagged documents the index writer rejected.
    pub index_failed: usize,
    /// Tagged documents per tier.
    pub tiers: BTreeMap<String, usize>,
    pub errors: Vec<BatchError>
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn from_outcomes(outcomes: &[TagOutcome]) -> Self {
        let mut report = Self::new();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    pub fn record(&mut self, outcome: &TagOutcome) {
        self.total += 1;
        match outcome {
            TagOutcome::Tagged(doc) => {
                self.tagged += 1;
                *self
                    .tiers
                    .entry(doc.security_tier.to_string())
                    .or_default() += 1;
            }
            TagOutcome::Failed(e) => {
                self.failed += 1;
                self.errors.push(BatchError {
                    document_id: e.document_id().to_string(),
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                    timestamp: Utc::now()
                });
            }
            TagOutcome::Cancelled { .. } => self.cancelled += 1
        }
    }

    /// Records a tagged document whose chunks never reached the index store.
    pub fn record_index_failure(&mut self, document_id: &str, error: &impl std::fmt::Display) {
        self.index_failed += 1;
        self.errors.push(BatchError {
            document_id: document_id.to_string(),
            kind: "index".to_string(),
            error: error.to_string(),
            timestamp: Utc::now()
        });
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_core::SecurityTier;

    fn tagged(id: &str, tier: &str) -> TagOutcome {
        TagOutcome::Tagged(IndexedDocument {
            id: id.into(),
            document_id: id.into(),
            content: String::new(),
            embedding: Vec::new(),
            security_tier: SecurityTier::from(tier),
            grantees: Vec::new(),
            metadata: BTreeMap::new()
        })
    }

    #[test]
    fn test_report_counts_outcomes() {
        let outcomes = vec![
            tagged("a", "Low"),
            TagOutcome::Failed(TaggingError::UnsupportedFormat {
                document_id: "b".into(),
                format: "exe".into()
            }),
            tagged("c", "Low"),
            TagOutcome::Cancelled {
                document_id: "d".into()
            },
        ];

        let mut report = BatchReport::from_outcomes(&outcomes);
        report.complete();

        assert_eq!(report.total, 4);
        assert_eq!(report.tagged, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.tiers.get("Low"), Some(&2));
        assert!(report.has_errors());
        assert_eq!(report.errors[0].document_id, "b");
        assert_eq!(report.errors[0].kind, "unsupported_format");
        assert!(report.completed_at.is_some());
    }

    #[test]
    fn test_index_failures_keep_tag_counts() {
        let mut report = BatchReport::from_outcomes(&[tagged("a", "Low"), tagged("b", "Low")]);
        report.record_index_failure("b", &"embedding API returned 400");

        assert_eq!(report.tagged, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.index_failed, 1);
        assert_eq!(report.errors[0].kind, "index");
        assert_eq!(report.errors[0].document_id, "b");
    }

    #[test]
    fn test_outcome_document_ids() {
        assert_eq!(tagged("a", "Low").document_id(), "a");
        assert_eq!(
            TagOutcome::Cancelled {
                document_id: "z".into()
            }
            .document_id(),
            "z"
        );
    }
}
