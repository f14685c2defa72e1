use crate::auth::AuthSession;
use crate::retry::{RetryPolicy, retry_with_backoff};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::GraphSourceConfig;
use errors::SourceError;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tg_core::{ContentSource, FileRef, ItemKind, ListRequest};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A SharePoint document library reached through Microsoft Graph.
///
/// The site and drive ids are resolved once, on first use. Library files and
/// modern site pages are listed separately; see [`ListRequest::kind`].
pub struct GraphContentSource {
    http_client: Client,
    session: Arc<AuthSession>,
    base_url: String,
    site_domain: String,
    site_name: String,
    timeout_ms: u64,
    retry: RetryPolicy,
    location: OnceCell<DriveLocation>
}

#[derive(Debug, Clone)]
struct DriveLocation {
    site_id: String,
    drive_id: String
}

#[derive(Debug, Deserialize)]
struct GraphListResponse<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    odata_next_link: Option<String>
}

#[derive(Debug, Deserialize)]
struct GraphResource {
    id: String
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveItem {
    id: String,
    name: String,
    web_url: Option<String>,
    size: Option<u64>,
    created_date_time: Option<DateTime<Utc>>,
    last_modified_date_time: Option<DateTime<Utc>>,
    created_by: Option<IdentitySet>,
    last_modified_by: Option<IdentitySet>,
    folder: Option<Value>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SitePage {
    id: String,
    name: String,
    web_url: Option<String>,
    created_date_time: Option<DateTime<Utc>>,
    last_modified_date_time: Option<DateTime<Utc>>,
    created_by: Option<IdentitySet>,
    last_modified_by: Option<IdentitySet>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SitePageContent {
    title: Option<String>,
    canvas_layout: Option<Value>
}

#[derive(Debug, Deserialize)]
struct IdentitySet {
    user: Option<Identity>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Identity {
    display_name: Option<String>
}

fn display_name(set: Option<IdentitySet>) -> Option<String> {
    set.and_then(|s| s.user).and_then(|u| u.display_name)
}

impl From<DriveItem> for FileRef {
    fn from(item: DriveItem) -> Self {
        FileRef {
            id: item.id,
            name: item.name,
            kind: ItemKind::File,
            web_url: item.web_url,
            size: item.size,
            created_at: item.created_date_time,
            modified_at: item.last_modified_date_time,
            created_by: display_name(item.created_by),
            modified_by: display_name(item.last_modified_by)
        }
    }
}

impl From<SitePage> for FileRef {
    fn from(page: SitePage) -> Self {
        FileRef {
            id: page.id,
            name: page.name,
            kind: ItemKind::SitePage,
            web_url: page.web_url,
            size: None,
            created_at: page.created_date_time,
            modified_at: page.last_modified_date_time,
            created_by: display_name(page.created_by),
            modified_by: display_name(page.last_modified_by)
        }
    }
}

/// The page title followed by the HTML of every web part on the canvas.
fn page_html(page: SitePageContent) -> String {
    let mut parts: Vec<String> = page.title.into_iter().collect();
    if let Some(layout) = &page.canvas_layout {
        collect_inner_html(layout, &mut parts);
    }
    parts.join("\n")
}

fn collect_inner_html(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("innerHtml", Value::String(html)) => out.push(html.clone()),
                    _ => collect_inner_html(child, out)
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_inner_html(item, out)),
        _ => {}
    }
}

impl GraphContentSource {
    pub fn new(config: &GraphSourceConfig, session: Arc<AuthSession>) -> Result<Self, SourceError> {
        let timeout = config.timeout();
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::from_reqwest(&e, timeout.as_millis() as u64))?;

        Ok(Self {
            http_client,
            session,
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            site_domain: config.site_domain.clone(),
            site_name: config.site_name.clone(),
            timeout_ms: timeout.as_millis() as u64,
            retry: RetryPolicy::from(&config.retry),
            location: OnceCell::new()
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One authenticated GET. A 401 drops the cached token and the request
    /// is sent once more with a fresh one.
    async fn send_get(&self, url: &str) -> Result<Response, SourceError> {
        let mut reauthenticated = false;
        loop {
            let token = self.session.token().await?;
            debug!(url = %url, "Making Microsoft Graph API request");

            let response = self
                .http_client
                .get(url)
                .header("Authorization", format!("Bearer {}", token))
                .send()
                .await
                .map_err(|e| SourceError::from_reqwest(&e, self.timeout_ms))?;

            match response.status() {
                status if status.is_success() => return Ok(response),
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(SourceError::RateLimited { retry_after });
                }
                StatusCode::UNAUTHORIZED => {
                    self.session.invalidate().await;
                    if reauthenticated {
                        return Err(SourceError::Auth {
                            reason: "Microsoft Graph rejected the access token".to_string()
                        });
                    }
                    reauthenticated = true;
                }
                StatusCode::NOT_FOUND => {
                    return Err(SourceError::NotFound {
                        resource: url.to_string()
                    });
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(SourceError::Api {
                        status: status.as_u16(),
                        message: body
                    });
                }
            }
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de> + Send>(&self, url: &str) -> Result<T, SourceError> {
        retry_with_backoff(&self.retry, "graph_get", || async move {
            let response = self.send_get(url).await?;
            response
                .json::<T>()
                .await
                .map_err(|e| SourceError::from_reqwest(&e, self.timeout_ms))
        })
        .await
    }

    /// Collects every page of a collection, following `@odata.nextLink`.
    async fn get_all<T: for<'de> Deserialize<'de> + Send>(&self, first: String) -> Result<Vec<T>, SourceError> {
        let mut url = Some(first);
        let mut items = Vec::new();
        let mut pages = 0;

        while let Some(next) = url {
            let page: GraphListResponse<T> = self.get_json(&next).await?;
            pages += 1;
            items.extend(page.value);
            url = page.odata_next_link;
        }

        debug!(count = items.len(), pages, "Collected paged Graph response");
        Ok(items)
    }

    async fn location(&self) -> Result<&DriveLocation, SourceError> {
        self.location
            .get_or_try_init(|| async move {
                let site_url = format!(
                    "{}/sites/{}:/sites/{}:/",
                    self.base_url,
                    self.site_domain,
                    urlencoding::encode(&self.site_name)
                );
                let site: GraphResource = self.get_json(&site_url).await?;

                let drive_url = format!("{}/sites/{}/drive", self.base_url, site.id);
                let drive: GraphResource = self.get_json(&drive_url).await?;

                info!(site_id = %site.id, drive_id = %drive.id, "Resolved SharePoint drive");
                Ok(DriveLocation {
                    site_id: site.id,
                    drive_id: drive.id
                })
            })
            .await
    }

    fn children_url(&self, site_id: &str, folder: Option<&str>) -> String {
        let folder = folder
            .map(|f| f.trim_matches('/'))
            .filter(|f| !f.is_empty());

        match folder {
            Some(folder) => {
                let encoded: Vec<_> = folder
                    .split('/')
                    .map(|segment| urlencoding::encode(segment).into_owned())
                    .collect();
                format!(
                    "{}/sites/{}/drive/root:/{}:/children?$top=200",
                    self.base_url,
                    site_id,
                    encoded.join("/")
                )
            }
            None => format!(
                "{}/sites/{}/drive/root/children?$top=200",
                self.base_url, site_id
            )
        }
    }
}

#[async_trait]
impl ContentSource for GraphContentSource {
    async fn list_files(&self, request: &ListRequest) -> Result<Vec<FileRef>, SourceError> {
        let location = self.location().await?;
        let now = Utc::now();

        let files: Vec<FileRef> = match request.kind {
            ItemKind::File => {
                let url = self.children_url(&location.site_id, request.folder.as_deref());
                self.get_all::<DriveItem>(url)
                    .await?
                    .into_iter()
                    .filter(|item| item.folder.is_none())
                    .map(FileRef::from)
                    .filter(|file| request.accepts(file, now))
                    .collect()
            }
            ItemKind::SitePage => {
                let url = format!(
                    "{}/sites/{}/pages/microsoft.graph.sitePage",
                    self.base_url, location.site_id
                );
                self.get_all::<SitePage>(url)
                    .await?
                    .into_iter()
                    .map(FileRef::from)
                    .filter(|file| request.accepts(file, now))
                    .collect()
            }
        };

        info!(count = files.len(), kind = %request.kind, "Listed items from SharePoint");
        Ok(files)
    }

    /// Site pages have no item-level permissions in Graph v1.0, so they are
    /// governed by the site library root.
    async fn get_permissions(&self, file: &FileRef) -> Result<Value, SourceError> {
        let location = self.location().await?;
        let url = match file.kind {
            ItemKind::File => format!(
                "{}/sites/{}/drive/items/{}/permissions",
                self.base_url, location.site_id, file.id
            ),
            ItemKind::SitePage => format!(
                "{}/sites/{}/drive/root/permissions",
                self.base_url, location.site_id
            )
        };
        let entries: Vec<Value> = self.get_all(url).await?;
        Ok(serde_json::json!({ "value": entries }))
    }

    async fn get_content_bytes(&self, file: &FileRef) -> Result<Vec<u8>, SourceError> {
        let location = self.location().await?;
        if file.kind == ItemKind::SitePage {
            let url = format!(
                "{}/sites/{}/pages/{}/microsoft.graph.sitePage?$expand=canvasLayout",
                self.base_url, location.site_id, file.id
            );
            let page: SitePageContent = self.get_json(&url).await?;
            return Ok(page_html(page).into_bytes());
        }

        let url = format!(
            "{}/drives/{}/items/{}/content",
            self.base_url, location.drive_id, file.id
        );

        let url = url.as_str();
        retry_with_backoff(&self.retry, "graph_content", || async move {
            let response = self.send_get(url).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| SourceError::from_reqwest(&e, self.timeout_ms))?;
            Ok(bytes.to_vec())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(base_url: &str) -> GraphContentSource {
        let config = GraphSourceConfig {
            graph_base_url: base_url.to_string(),
            ..GraphSourceConfig::default()
        };
        let session = Arc::new(AuthSession::new(
            Arc::new(testing::CountingIdentityProvider::new(chrono::Duration::hours(1))),
            testing::credentials()
        ));
        GraphContentSource::new(&config, session).unwrap()
    }

    #[test]
    fn test_children_url_root() {
        let s = source("https://graph.example.test/v1.0/");
        assert_eq!(
            s.children_url("site-1", None),
            "https://graph.example.test/v1.0/sites/site-1/drive/root/children?$top=200"
        );
        assert_eq!(
            s.children_url("site-1", Some("/")),
            "https://graph.example.test/v1.0/sites/site-1/drive/root/children?$top=200"
        );
    }

    #[test]
    fn test_children_url_folder_segments_are_encoded() {
        let s = source("https://graph.example.test/v1.0");
        assert_eq!(
            s.children_url("site-1", Some("/Quarterly Reports/2024/")),
            "https://graph.example.test/v1.0/sites/site-1/drive/root:/Quarterly%20Reports/2024:/children?$top=200"
        );
    }

    #[test]
    fn test_drive_item_maps_to_file_ref() {
        let item: DriveItem = serde_json::from_value(serde_json::json!({
            "id": "item-1",
            "name": "plan.docx",
            "webUrl": "https://contoso.sharepoint.com/plan.docx",
            "size": 2048,
            "createdDateTime": "2024-05-01T10:00:00Z",
            "lastModifiedDateTime": "2024-05-02T10:00:00Z",
            "createdBy": { "user": { "displayName": "Adele Vance" } },
            "lastModifiedBy": { "user": { "displayName": "Megan Bowen" } },
            "file": { "mimeType": "application/vnd.openxmlformats-officedocument.wordprocessingml.document" }
        }))
        .unwrap();

        let file = FileRef::from(item);
        assert_eq!(file.id, "item-1");
        assert_eq!(file.size, Some(2048));
        assert_eq!(file.created_by.as_deref(), Some("Adele Vance"));
        assert_eq!(file.modified_by.as_deref(), Some("Megan Bowen"));
        assert_eq!(file.extension().as_deref(), Some("docx"));
        assert_eq!(file.kind, ItemKind::File);
    }

    #[test]
    fn test_page_html_walks_canvas_sections_in_order() {
        let page: SitePageContent = serde_json::from_value(serde_json::json!({
            "title": "Benefits",
            "canvasLayout": {
                "horizontalSections": [
                    { "columns": [
                        { "webparts": [{ "innerHtml": "<p>Dental</p>" }] },
                        { "webparts": [{ "innerHtml": "<p>Vision</p>" }, { "data": { "title": "image" } }] }
                    ] },
                    { "columns": [{ "webparts": [{ "innerHtml": "<h2>Contacts</h2>" }] }] }
                ]
            }
        }))
        .unwrap();

        assert_eq!(page_html(page), "Benefits\n<p>Dental</p>\n<p>Vision</p>\n<h2>Contacts</h2>");
    }

    #[test]
    fn test_page_without_canvas_is_just_its_title() {
        let page = SitePageContent {
            title: Some("Empty".to_string()),
            canvas_layout: None
        };
        assert_eq!(page_html(page), "Empty");
    }
}
