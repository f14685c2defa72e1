//! Graph permission records to [`PermissionEntry`] values.
//!
//! A record's grantee is the first identity found in this order:
//! `grantedToV2.user`, `grantedToV2.siteUser`, legacy `grantedTo.user`,
//! `grantedToV2.siteGroup`, `grantedToV2.group`. Sharing links list their
//! grantees under `grantedToIdentitiesV2` (or legacy `grantedToIdentities`)
//! and each of those becomes its own entry.

use errors::TaggingError;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use tg_core::{Grantee, GranteeKind, PermissionEntry, VISIBILITY_ROLES};
use tracing::{debug, warn};

const PRIMARY_CANDIDATES: [(&str, &str, GranteeKind); 5] = [
    ("grantedToV2", "user", GranteeKind::User),
    ("grantedToV2", "siteUser", GranteeKind::User),
    ("grantedTo", "user", GranteeKind::User),
    ("grantedToV2", "siteGroup", GranteeKind::Group),
    ("grantedToV2", "group", GranteeKind::Group)
];

const IDENTITY_SET_CANDIDATES: [(&str, GranteeKind); 4] = [
    ("user", GranteeKind::User),
    ("siteUser", GranteeKind::User),
    ("siteGroup", GranteeKind::Group),
    ("group", GranteeKind::Group)
];

#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionNormalizer;

impl PermissionNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Entries granting `read` or `owner`, merged by display name in
    /// first-seen order.
    pub fn normalize(
        &self,
        document_id: &str,
        payload: &Value
    ) -> Result<Vec<PermissionEntry>, TaggingError> {
        let records = records(payload).ok_or_else(|| TaggingError::MalformedPermissions {
            document_id: document_id.to_string(),
            reason: format!(
                "expected an array or a 'value' envelope, got {}",
                kind_of(payload)
            )
        })?;

        let mut entries: Vec<PermissionEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (position, record) in records.iter().enumerate() {
            let Some(record) = record.as_object() else {
                warn!(document_id, position, "Skipping permission record that is not an object");
                continue;
            };
            let Some(roles) = record.get("roles").and_then(Value::as_array) else {
                warn!(document_id, position, "Skipping permission record without roles");
                continue;
            };

            let roles: BTreeSet<String> = roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            if !roles.iter().any(|r| VISIBILITY_ROLES.contains(&r.as_str())) {
                continue;
            }

            let grantees = grantees_of(record);
            if grantees.is_empty() {
                debug!(document_id, position, "Dropping permission record with no resolvable grantee");
                continue;
            }

            for grantee in grantees {
                match index.get(&grantee.display_name) {
                    Some(&i) => entries[i].roles.extend(roles.iter().cloned()),
                    None => {
                        index.insert(grantee.display_name.clone(), entries.len());
                        entries.push(PermissionEntry::new(grantee, roles.iter().cloned()));
                    }
                }
            }
        }

        debug!(document_id, count = entries.len(), "Normalized permissions");
        Ok(entries)
    }
}

fn records(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(records) => Some(records),
        Value::Object(envelope) => envelope.get("value").and_then(Value::as_array),
        _ => None
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object without 'value'"
    }
}

fn grantees_of(record: &Map<String, Value>) -> Vec<Grantee> {
    let mut grantees: Vec<Grantee> = PRIMARY_CANDIDATES
        .iter()
        .find_map(|(set, key, kind)| identity(record.get(*set)?.get(*key)?, *kind))
        .into_iter()
        .collect();

    let link_identities = record
        .get("grantedToIdentitiesV2")
        .or_else(|| record.get("grantedToIdentities"))
        .and_then(Value::as_array);

    if let Some(sets) = link_identities {
        grantees.extend(sets.iter().filter_map(|set| {
            IDENTITY_SET_CANDIDATES
                .iter()
                .find_map(|(key, kind)| identity(set.get(*key)?, *kind))
        }));
    }

    grantees
}

/// A group needs a display name; a user without one falls back to its id.
fn identity(value: &Value, kind: GranteeKind) -> Option<Grantee> {
    let id = value.get("id").and_then(Value::as_str).unwrap_or_default();
    let name = value
        .get("displayName")
        .and_then(Value::as_str)
        .filter(|n| !n.trim().is_empty());

    match (name, kind) {
        (Some(name), GranteeKind::User) => Some(Grantee::user(id, name)),
        (Some(name), GranteeKind::Group) => Some(Grantee::group(id, name)),
        (None, GranteeKind::User) if !id.is_empty() => Some(Grantee::user(id, id)),
        _ => None
    }
}
