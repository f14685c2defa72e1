//! Access-control tier derivation.
//!
//! Raw permissions are normalized into [`tg_core::PermissionEntry`] values,
//! resolved against a [`GroupTierMap`] into a single
//! [`tg_core::SecurityTier`], and attached to the indexed record by the
//! [`DocumentTagger`]. The [`IngestionPipeline`] drives this over a content
//! source with bounded concurrency.

pub mod batch;
pub mod extractors;
pub mod group_map;
pub mod normalizer;
pub mod pipeline;
pub mod resolver;
pub mod tagger;

pub use batch::{BatchError, BatchReport, TagOutcome};
pub use group_map::GroupTierMap;
pub use normalizer::PermissionNormalizer;
pub use pipeline::{IngestionPipeline, IngestionRun};
pub use resolver::{TierResolution, resolve_tier, resolve_with_trace};
pub use extractors::{
    DocxExtractor, ExtractorRegistry, HtmlExtractor, PdfExtractor, PlainTextExtractor
};
pub use tagger::DocumentTagger;
