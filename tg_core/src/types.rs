use crate::tier::SecurityTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, EnumString};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Roles that make a document visible to a grantee for tiering purposes.
pub const VISIBILITY_ROLES: [&str; 2] = ["owner", "read"];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum GranteeKind {
    User,
    Group
}

/// A user or group holding some role on a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grantee {
    pub id: String,
    pub display_name: String,
    pub kind: GranteeKind
}

impl Grantee {
    pub fn user(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind: GranteeKind::User
        }
    }

    pub fn group(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind: GranteeKind::Group
        }
    }
}

/// One normalized access-control row: a grantee and the roles it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub grantee: Grantee,
    pub roles: BTreeSet<String>
}

impl PermissionEntry {
    pub fn new<I, S>(grantee: Grantee, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        Self {
            grantee,
            roles: roles.into_iter().map(Into::into).collect()
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// `owner` or `read` present.
    pub fn confers_visibility(&self) -> bool {
        VISIBILITY_ROLES.iter().any(|r| self.has_role(r))
    }

    pub fn display_name(&self) -> &str {
        &self.grantee.display_name
    }
}

/// What a listing entry points at.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ItemKind {
    /// A file in the document library.
    #[default]
    File,
    /// A modern SharePoint site page. Its content is the page's HTML.
    SitePage
}

/// A file listed by the content source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: ItemKind,
    pub web_url: Option<String>,
    pub size: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub modified_by: Option<String>
}

impl FileRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::File,
            web_url: None,
            size: None,
            created_at: None,
            modified_at: None,
            created_by: None,
            modified_by: None
        }
    }

    pub fn site_page(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::SitePage,
            ..Self::new(id, name)
        }
    }

    /// Lower-cased extension after the last dot, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

pub(crate) fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Parameters for listing files in a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Library files or site pages.
    pub kind: ItemKind,
    /// Folder path inside the drive, such as `/reports/2024/`.
    pub folder: Option<String>,
    /// Only files created or modified within this many minutes.
    pub modified_within_minutes: Option<u64>,
    /// Allowed extensions without the dot. Empty allows everything.
    pub formats: Vec<String>,
    /// Exact file names to keep. Empty keeps everything.
    pub names: Vec<String>
}

impl ListRequest {
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        self.formats = formats.into_iter().map(Into::into).collect();
        self
    }

    pub fn modified_within(mut self, minutes: u64) -> Self {
        self.modified_within_minutes = Some(minutes);
        self
    }

    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = kind;
        self
    }

    /// Applies the name, format and time-window filters to a listing entry.
    /// Site pages are not subject to the format filter.
    pub fn accepts(&self, file: &FileRef, now: DateTime<Utc>) -> bool {
        if !self.names.is_empty() && !self.names.iter().any(|n| n == &file.name) {
            return false;
        }

        if !self.formats.is_empty() && file.kind == ItemKind::File {
            let Some(ext) = file.extension() else {
                return false;
            };
            if !self.formats.iter().any(|f| f.eq_ignore_ascii_case(&ext)) {
                return false;
            }
        }

        let window = self
            .modified_within_minutes
            .and_then(|m| chrono::Duration::try_minutes(i64::try_from(m).ok()?));
        if let Some(window) = window {
            let limit = now - window;
            let recent = [file.created_at, file.modified_at]
                .into_iter()
                .flatten()
                .any(|ts| ts >= limit);
            if !recent {
                return false;
            }
        }

        true
    }
}

/// A fetched document, ready for tagging.
///
/// `content` is the raw payload; text is derived by the tagger's extractor.
/// `permissions` is the source-shaped access-control list, normalized later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub format: String,
    pub content: Vec<u8>,
    pub source_locator: String,
    pub size: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub modified_by: Option<String>,
    pub permissions: serde_json::Value
}

impl Document {
    /// Builds a document from a listing entry and its fetched parts.
    pub fn from_file(file: &FileRef, content: Vec<u8>, permissions: serde_json::Value) -> Self {
        Self {
            id: file.id.clone(),
            name: file.name.clone(),
            format: file.extension().unwrap_or_default(),
            content,
            source_locator: file.web_url.clone().unwrap_or_else(|| file.name.clone()),
            size: file.size,
            created_at: file.created_at,
            modified_at: file.modified_at,
            created_by: file.created_by.clone(),
            modified_by: file.modified_by.clone(),
            permissions
        }
    }

    /// Minimal document, mostly useful in tests and local tooling.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<Vec<u8>>,
        permissions: serde_json::Value
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            format: extension_of(&name).unwrap_or_default(),
            source_locator: name.clone(),
            name,
            content: content.into(),
            size: None,
            created_at: None,
            modified_at: None,
            created_by: None,
            modified_by: None,
            permissions
        }
    }
}

/// A record ready for (or stored in) the index.
///
/// `security_tier` is always set. `embedding` stays empty until the index
/// writer fills it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedDocument {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub security_tier: SecurityTier,
    pub grantees: Vec<String>,
    pub metadata: BTreeMap<String, String>
}

/// One hit returned by an index store query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreHit {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub reranker_score: Option<f32>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>
}

/// Client-credential material for the identity provider.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub authority: String,
    pub scope: String
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority", &self.authority)
            .field("scope", &self.scope)
            .finish()
    }
}

/// A bearer token and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>
}

impl AccessToken {
    /// Valid for at least `skew` longer.
    pub fn is_fresh(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        self.expires_at > now + skew
    }
}
