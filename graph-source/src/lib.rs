//! Microsoft Graph adapters.
//!
//! - [`AuthSession`]: cached, single-flight bearer tokens over any
//!   [`tg_core::IdentityProvider`].
//! - [`AzureAdIdentityProvider`]: OAuth2 client-credentials grant.
//! - [`GraphContentSource`]: SharePoint document library listing,
//!   permissions and content.

pub mod auth;
pub mod graph;
pub mod retry;

pub use auth::{AuthSession, AzureAdIdentityProvider, client_credentials};
pub use graph::GraphContentSource;
pub use retry::{RetryPolicy, retry_with_backoff};
