//! Tier-filtered retrieval.
//!
//! [`IndexWriter`] chunks and embeds tagged documents and writes them to an
//! [`tg_core::IndexStore`]. [`SecureRetriever`] is the only read path: it
//! converts a [`RequesterScope`] into a store-side filter and fails closed
//! when the scope admits nobody.

pub mod azure_search;
pub mod chunker;
pub mod embedding;
pub mod filter;
pub mod memory_store;
pub mod retriever;
pub mod writer;

pub use azure_search::AzureSearchStore;
pub use chunker::Chunker;
pub use embedding::AzureOpenAiEmbeddings;
pub use filter::{RequesterScope, build_predicate, to_odata};
pub use memory_store::InMemoryIndexStore;
pub use retriever::{SearchHit, SearchPolicy, SecureRetriever};
pub use writer::{IndexWriter, WriteFailure, WriteReport};
