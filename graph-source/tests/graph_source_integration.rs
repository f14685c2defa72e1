use config::GraphSourceConfig;
use errors::SourceError;
use graph_source::{AuthSession, GraphContentSource, RetryPolicy};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use testing::CountingIdentityProvider;
use tg_core::{ContentSource, FileRef, ItemKind, ListRequest};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE_PATH: &str = "/sites/contoso.sharepoint.com:/sites/Finance:/";

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5)
    }
}

fn source_for(server: &MockServer, provider: Arc<CountingIdentityProvider>) -> GraphContentSource {
    let config = GraphSourceConfig {
        graph_base_url: server.uri(),
        site_domain: "contoso.sharepoint.com".to_string(),
        site_name: "Finance".to_string(),
        timeout_seconds: 5,
        ..GraphSourceConfig::default()
    };
    let session = Arc::new(AuthSession::new(provider, testing::credentials()));
    GraphContentSource::new(&config, session)
        .unwrap()
        .with_retry_policy(fast_retry())
}

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(SITE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "site-1" })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sites/site-1/drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "drive-1" })))
        .mount(server)
        .await;
}

fn item(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "webUrl": format!("https://contoso.sharepoint.com/{name}"),
        "size": 10,
        "createdDateTime": chrono::Utc::now().to_rfc3339(),
        "lastModifiedDateTime": chrono::Utc::now().to_rfc3339(),
        "file": {}
    })
}

#[tokio::test]
async fn test_list_files_follows_next_link_and_filters() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/sites/site-1/drive/root/children"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [item("item-3", "notes.txt")]
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sites/site-1/drive/root/children"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                item("item-1", "plan.docx"),
                item("item-2", "photo.png"),
                { "id": "folder-1", "name": "Archive", "folder": { "childCount": 3 } }
            ],
            "@odata.nextLink": format!(
                "{}/sites/site-1/drive/root/children?$skiptoken=page2",
                server.uri()
            )
        })))
        .mount(&server)
        .await;

    let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::hours(1)));
    let source = source_for(&server, provider.clone());

    let request = ListRequest::default().with_formats(["docx", "txt"]);
    let files = source.list_files(&request).await.unwrap();

    let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["plan.docx", "notes.txt"]);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_list_files_in_folder() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/sites/site-1/drive/root:/Reports/2024:/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [item("item-9", "q1.pdf")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::hours(1)));
    let source = source_for(&server, provider);

    let request = ListRequest::default().with_folder("/Reports/2024/");
    let files = source.list_files(&request).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, "item-9");
}

#[tokio::test]
async fn test_permissions_and_content() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/sites/site-1/drive/items/item-1/permissions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(testing::fixtures::contoso_site_permissions())
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drives/drive-1/items/item-1/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"quarterly plan".to_vec()))
        .mount(&server)
        .await;

    let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::hours(1)));
    let source = source_for(&server, provider);
    let file = FileRef::new("item-1", "plan.txt");

    let permissions = source.get_permissions(&file).await.unwrap();
    assert_eq!(permissions["value"].as_array().unwrap().len(), 3);

    let content = source.get_content_bytes(&file).await.unwrap();
    assert_eq!(content, b"quarterly plan");
}

#[tokio::test]
async fn test_permissions_follow_next_link() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let entries = testing::fixtures::contoso_site_permissions()["value"]
        .as_array()
        .unwrap()
        .clone();

    Mock::given(method("GET"))
        .and(path("/sites/site-1/drive/items/item-1/permissions"))
        .and(query_param("$skiptoken", "perm2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": entries[2..].to_vec()
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sites/site-1/drive/items/item-1/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": entries[..2].to_vec(),
            "@odata.nextLink": format!(
                "{}/sites/site-1/drive/items/item-1/permissions?$skiptoken=perm2",
                server.uri()
            )
        })))
        .mount(&server)
        .await;

    let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::hours(1)));
    let source = source_for(&server, provider);

    let permissions = source
        .get_permissions(&FileRef::new("item-1", "plan.txt"))
        .await
        .unwrap();
    assert_eq!(permissions["value"].as_array().unwrap(), &entries);
}

#[tokio::test]
async fn test_site_pages_are_listed_and_rendered() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/sites/site-1/pages/microsoft.graph.sitePage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "page-1",
                "name": "Home.aspx",
                "title": "Home",
                "webUrl": "https://contoso.sharepoint.com/sites/Finance/SitePages/Home.aspx",
                "lastModifiedDateTime": chrono::Utc::now().to_rfc3339()
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sites/site-1/pages/page-1/microsoft.graph.sitePage"))
        .and(query_param("$expand", "canvasLayout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "page-1",
            "title": "Home",
            "canvasLayout": {
                "horizontalSections": [{
                    "columns": [{ "webparts": [{ "innerHtml": "<p>Welcome</p>" }] }]
                }]
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sites/site-1/drive/root/permissions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(testing::fixtures::contoso_site_permissions())
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::hours(1)));
    let source = source_for(&server, provider);

    // The format filter applies to library files only.
    let request = ListRequest::default()
        .with_kind(ItemKind::SitePage)
        .with_formats(["docx"]);
    let pages = source.list_files(&request).await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].kind, ItemKind::SitePage);
    assert_eq!(pages[0].name, "Home.aspx");

    let content = source.get_content_bytes(&pages[0]).await.unwrap();
    assert_eq!(String::from_utf8(content).unwrap(), "Home\n<p>Welcome</p>");

    let permissions = source.get_permissions(&pages[0]).await.unwrap();
    assert_eq!(permissions["value"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unauthorized_invalidates_token_and_retries_once() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/drives/drive-1/items/item-1/content"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drives/drive-1/items/item-1/content"))
        .and(header("Authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
        .mount(&server)
        .await;

    let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::hours(1)));
    let source = source_for(&server, provider.clone());

    let content = source
        .get_content_bytes(&FileRef::new("item-1", "a.txt"))
        .await
        .unwrap();
    assert_eq!(content, b"fresh");
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_server_errors_are_retried_then_surface() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/sites/site-1/drive/items/item-1/permissions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(3)
        .mount(&server)
        .await;

    let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::hours(1)));
    let source = source_for(&server, provider);

    let err = source
        .get_permissions(&FileRef::new("item-1", "a.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_missing_item_is_not_found_without_retry() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    Mock::given(method("GET"))
        .and(path("/drives/drive-1/items/gone/content"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::hours(1)));
    let source = source_for(&server, provider);

    let err = source
        .get_content_bytes(&FileRef::new("gone", "a.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::NotFound { .. }));
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let server = MockServer::start().await;

    let source = source_for(&server, Arc::new(CountingIdentityProvider::failing()));
    let err = source.list_files(&ListRequest::default()).await.unwrap_err();
    assert!(err.is_auth());
}
