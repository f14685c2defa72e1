use crate::batch::TagOutcome;
use crate::extractors::ExtractorRegistry;
use crate::group_map::GroupTierMap;
use crate::normalizer::PermissionNormalizer;
use crate::resolver::resolve_with_trace;
use errors::TaggingError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tg_core::{Document, IndexedDocument};
use tracing::{debug, info, warn};

/// Turns a fetched [`Document`] into an [`IndexedDocument`] carrying its
/// security tier. Tagging has no side effects.
pub struct DocumentTagger {
    map: Arc<GroupTierMap>,
    normalizer: PermissionNormalizer,
    extractors: ExtractorRegistry
}

impl DocumentTagger {
    pub fn new(map: Arc<GroupTierMap>, extractors: ExtractorRegistry) -> Self {
        Self {
            map,
            normalizer: PermissionNormalizer::new(),
            extractors
        }
    }

    pub fn map(&self) -> &GroupTierMap {
        &self.map
    }

    /// Whether documents of `format` can be tagged. Checked before a
    /// document is downloaded.
    pub fn supports(&self, format: &str) -> bool {
        self.extractors.supports(format)
    }

    pub fn tag(&self, document: &Document) -> Result<IndexedDocument, TaggingError> {
        let entries = self.normalizer.normalize(&document.id, &document.permissions)?;
        let resolution = resolve_with_trace(&entries, &self.map);

        let extractor =
            self.extractors
                .get(&document.format)
                .ok_or_else(|| TaggingError::UnsupportedFormat {
                    document_id: document.id.clone(),
                    format: document.format.clone()
                })?;
        let content = extractor
            .extract(&document.content)
            .map_err(|source| TaggingError::Extraction {
                document_id: document.id.clone(),
                source
            })?;

        debug!(
            document_id = %document.id,
            tier = %resolution.tier,
            defaulted = resolution.defaulted,
            "Document tagged"
        );

        Ok(IndexedDocument {
            id: document.id.clone(),
            document_id: document.id.clone(),
            content,
            embedding: Vec::new(),
            security_tier: resolution.tier,
            grantees: entries
                .iter()
                .map(|e| e.display_name().to_string())
                .collect(),
            metadata: metadata_of(document)
        })
    }

    /// One outcome per document, in input order. A failing document never
    /// stops the batch.
    pub fn tag_batch(&self, documents: &[Document]) -> Vec<TagOutcome> {
        let outcomes: Vec<TagOutcome> = documents
            .iter()
            .map(|document| match self.tag(document) {
                Ok(tagged) => TagOutcome::Tagged(tagged),
                Err(e) => {
                    warn!(document_id = %document.id, error = %e, "Failed to tag document");
                    TagOutcome::Failed(e)
                }
            })
            .collect();

        for outcome in &outcomes {
            outcome.record_metric();
        }

        info!(
            count = outcomes.len(),
            tagged = outcomes.iter().filter(|o| o.is_tagged()).count(),
            "Batch tagged"
        );
        outcomes
    }
}

fn metadata_of(document: &Document) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::from([
        ("id".to_string(), document.id.clone()),
        ("name".to_string(), document.name.clone()),
        ("source".to_string(), document.source_locator.clone())
    ]);

    let optional = [
        ("size", document.size.map(|s| s.to_string())),
        ("created_by", document.created_by.clone()),
        ("created_at", document.created_at.map(|t| t.to_rfc3339())),
        ("modified_by", document.modified_by.clone()),
        ("modified_at", document.modified_at.map(|t| t.to_rfc3339()))
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            metadata.insert(key.to_string(), value);
        }
    }

    metadata
}
