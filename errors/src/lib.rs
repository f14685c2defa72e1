//! # Tierguard Errors
//!
//! Error taxonomy shared by the ingestion and retrieval crates.
//!
//! - `SourceError`: failures talking to the content source, the identity
//!   provider, or any other HTTP collaborator.
//! - `ExtractionError`: a payload that could not be turned into text.
//! - `TaggingError`: per-document failures. A batch records them and keeps
//!   going.
//! - `RetrievalError`: failures at the enforcement point. Never swallowed.
//! - `PolicyError`: invalid tier configuration or mapping.

use thiserror::Error;

/// Errors raised by external collaborators (content source, identity
/// provider, embedding service).
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    #[error("Transient network error: {reason}")]
    TransientNetwork { reason: String },

    #[error("Timeout: operation took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Rate limited: retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Upstream API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Failed to decode response: {reason}")]
    Decode { reason: String }
}

impl SourceError {
    /// Maps a transport error, keeping timeouts distinct from other network
    /// failures. `timeout_ms` is the client timeout that was in force.
    pub fn from_reqwest(err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            return Self::Timeout { timeout_ms };
        }
        if err.is_decode() {
            return Self::Decode {
                reason: err.to_string()
            };
        }
        if let Some(status) = err.status() {
            return Self::Api {
                status: status.as_u16(),
                message: err.to_string()
            };
        }
        Self::TransientNetwork {
            reason: err.to_string()
        }
    }

    /// Whether a call site may retry with backoff. Auth failures and timeouts
    /// are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransientNetwork { .. } | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        if let Self::RateLimited { retry_after } = self {
            Some(*retry_after)
        } else {
            None
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode {
            reason: e.to_string()
        }
    }
}

/// Raised by content extractors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Content is not valid UTF-8: {reason}")]
    Encoding { reason: String },

    #[error("Unreadable {format} container: {reason}")]
    Container { format: String, reason: String },

    #[error("Malformed markup: {reason}")]
    Markup { reason: String },

    #[error("PDF text extraction failed: {reason}")]
    Pdf { reason: String }
}

/// Per-document tagging failures.
#[derive(Debug, Error)]
pub enum TaggingError {
    #[error("Malformed permissions on {document_id}: {reason}")]
    MalformedPermissions { document_id: String, reason: String },

    #[error("Unsupported format '{format}' for {document_id}")]
    UnsupportedFormat { document_id: String, format: String },

    #[error("Content extraction failed for {document_id}: {source}")]
    Extraction {
        document_id: String,
        #[source]
        source: ExtractionError
    },

    #[error("Source error while ingesting {document_id}: {source}")]
    Source {
        document_id: String,
        #[source]
        source: SourceError
    }
}

impl TaggingError {
    pub fn document_id(&self) -> &str {
        match self {
            Self::MalformedPermissions { document_id, .. }
            | Self::UnsupportedFormat { document_id, .. }
            | Self::Extraction { document_id, .. }
            | Self::Source { document_id, .. } => document_id
        }
    }

    /// Short, stable label used for metrics and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPermissions { .. } => "malformed_permissions",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::Extraction { .. } => "extraction",
            Self::Source { .. } => "source"
        }
    }
}

/// Errors raised at the retrieval enforcement point.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Invalid filter: {reason}")]
    InvalidFilter { reason: String },

    #[error("Embedding generation failed: {reason}")]
    Embedding { reason: String },

    #[error("Index backend {backend} failed: {reason}")]
    Backend { backend: String, reason: String },

    #[error("Timeout: search took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 }
}

/// Invalid tier policy or mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Tier priority list is empty")]
    EmptyPriority,

    #[error("Tier {tier} appears more than once in the priority list")]
    DuplicateTier { tier: String },

    #[error("Unknown tier: {tier}")]
    UnknownTier { tier: String }
}
