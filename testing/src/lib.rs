//! Shared test doubles for the Tierguard workspace.
//!
//! - [`InMemoryContentSource`]: a document library held in memory
//! - [`CountingIdentityProvider`]: issues tokens and counts how often
//! - [`CountingEmbeddings`]: deterministic vectors plus a call counter
//! - [`fixtures`]: Graph-shaped permission payloads

pub mod fixtures;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use errors::SourceError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tg_core::{
    AccessToken, ClientCredentials, ContentSource, EmbeddingService, FileRef, IdentityProvider,
    ListRequest
};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

pub fn credentials() -> ClientCredentials {
    ClientCredentials {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        authority: "https://login.example.test/test-tenant".to_string(),
        scope: "https://graph.microsoft.com/.default".to_string()
    }
}

struct StoredFile {
    file: FileRef,
    permissions: serde_json::Value,
    content: Vec<u8>
}

/// A content source backed by a map, listing files in insertion order.
#[derive(Default)]
pub struct InMemoryContentSource {
    files: RwLock<Vec<StoredFile>>,
    failing_content: RwLock<HashMap<String, SourceError>>,
    content_fetches: AtomicUsize
}

impl InMemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(
        self,
        file: FileRef,
        content: impl Into<Vec<u8>>,
        permissions: serde_json::Value
    ) -> Self {
        self.files.write().push(StoredFile {
            file,
            permissions,
            content: content.into()
        });
        self
    }

    /// Content fetches for `file_id` fail with `error` from now on.
    pub fn fail_content(self, file_id: &str, error: SourceError) -> Self {
        self.failing_content
            .write()
            .insert(file_id.to_string(), error);
        self
    }

    /// Number of `get_content_bytes` calls so far.
    pub fn content_fetches(&self) -> usize {
        self.content_fetches.load(Ordering::SeqCst)
    }

    fn find<T>(&self, id: &str, f: impl FnOnce(&StoredFile) -> T) -> Result<T, SourceError> {
        self.files
            .read()
            .iter()
            .find(|s| s.file.id == id)
            .map(f)
            .ok_or_else(|| SourceError::NotFound {
                resource: id.to_string()
            })
    }
}

#[async_trait]
impl ContentSource for InMemoryContentSource {
    async fn list_files(&self, request: &ListRequest) -> Result<Vec<FileRef>, SourceError> {
        let now = Utc::now();
        Ok(self
            .files
            .read()
            .iter()
            .filter(|s| s.file.kind == request.kind && request.accepts(&s.file, now))
            .map(|s| s.file.clone())
            .collect())
    }

    async fn get_permissions(&self, file: &FileRef) -> Result<serde_json::Value, SourceError> {
        self.find(&file.id, |s| s.permissions.clone())
    }

    async fn get_content_bytes(&self, file: &FileRef) -> Result<Vec<u8>, SourceError> {
        self.content_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.failing_content.read().get(&file.id) {
            return Err(e.clone());
        }
        self.find(&file.id, |s| s.content.clone())
    }
}

/// Issues `token-N` tokens valid for `lifetime`, counting each acquisition.
pub struct CountingIdentityProvider {
    calls: AtomicUsize,
    lifetime: chrono::Duration,
    delay: Duration,
    fail: bool
}

impl CountingIdentityProvider {
    pub fn new(lifetime: chrono::Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            lifetime,
            delay: Duration::ZERO,
            fail: false
        }
    }

    /// Every acquisition waits `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(chrono::Duration::hours(1))
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for CountingIdentityProvider {
    async fn acquire_token(&self, _credentials: &ClientCredentials) -> Result<AccessToken, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(SourceError::Auth {
                reason: "invalid_client".to_string()
            });
        }

        let expires_at: DateTime<Utc> = Utc::now() + self.lifetime;
        Ok(AccessToken {
            token: format!("token-{n}"),
            expires_at
        })
    }
}

/// Letter-frequency vectors: identical text gives identical vectors and
/// texts sharing words land close together.
pub struct CountingEmbeddings {
    dimension: usize,
    calls: AtomicUsize
}

impl CountingEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            calls: AtomicUsize::new(0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for CountingEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0f32; self.dimension];
        for b in text.to_lowercase().bytes().filter(u8::is_ascii_alphanumeric) {
            vector[b as usize % self.dimension] += 1.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
