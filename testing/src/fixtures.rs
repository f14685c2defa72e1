//! Permission payloads shaped like Microsoft Graph `driveItem/permissions`.

use serde_json::{Value, json};

pub fn site_group(name: &str, roles: &[&str]) -> Value {
    json!({
        "id": format!("perm-{name}"),
        "roles": roles,
        "grantedToV2": {
            "siteGroup": { "id": format!("sg-{name}"), "displayName": name }
        }
    })
}

pub fn directory_group(name: &str, roles: &[&str]) -> Value {
    json!({
        "id": format!("perm-{name}"),
        "roles": roles,
        "grantedToV2": {
            "group": { "id": format!("g-{name}"), "displayName": name }
        }
    })
}

pub fn user(name: &str, roles: &[&str]) -> Value {
    json!({
        "id": format!("perm-{name}"),
        "roles": roles,
        "grantedToV2": {
            "user": { "id": format!("u-{name}"), "displayName": name }
        }
    })
}

/// A sharing link granted to several users at once.
pub fn sharing_link(users: &[&str], roles: &[&str]) -> Value {
    let identities: Vec<Value> = users
        .iter()
        .map(|u| json!({ "user": { "id": format!("u-{u}"), "displayName": u } }))
        .collect();
    json!({
        "id": "perm-link",
        "roles": roles,
        "link": { "scope": "users", "type": "view" },
        "grantedToIdentitiesV2": identities
    })
}

/// Wraps records in the `{"value": [...]}` envelope Graph returns.
pub fn envelope(records: Vec<Value>) -> Value {
    json!({ "value": records })
}

/// The three default SharePoint site groups.
pub fn contoso_site_permissions() -> Value {
    envelope(vec![
        site_group("Contoso Owners", &["owner"]),
        site_group("Contoso Visitors", &["read"]),
        site_group("Contoso Members", &["write"]),
    ])
}
