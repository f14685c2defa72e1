//! # Tierguard Core
//!
//! Shared types and collaborator traits for Tierguard.
//!
//! This crate provides:
//! - The data model: grantees, permission entries, documents and indexed
//!   records
//! - Security tiers and the tier policy (priority order plus default tier)
//! - The filter predicate language the enforcement point hands to an index
//! - Traits for the external collaborators (content source, identity
//!   provider, embedding service, index store, content extractor)

pub mod filter;
pub mod tier;
pub mod traits;
pub mod types;

pub use filter::FilterPredicate;
pub use tier::{SecurityTier, TierPolicy};
pub use traits::{
    ContentExtractor, ContentSource, EmbeddingService, IdentityProvider, IndexStore
};
pub use types::{
    AccessToken, ClientCredentials, Document, FileRef, Grantee, GranteeKind, IndexedDocument,
    ItemKind, ListRequest, PermissionEntry, StoreHit, VISIBILITY_ROLES
};
