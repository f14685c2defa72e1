//! Filter predicates evaluated by the index store.
//!
//! Only two shapes exist: equality on a single field and set membership on a
//! string (or string collection) field. Stores render them into their own
//! query language; [`FilterPredicate::matches`] is the reference semantics
//! used by in-process stores.

use crate::types::IndexedDocument;
use serde::{Deserialize, Serialize};

pub const TIER_FIELD: &str = "security_tier";
pub const GRANTEES_FIELD: &str = "grantees";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterPredicate {
    Eq { field: String, value: String },
    AnyOf { field: String, values: Vec<String> }
}

impl FilterPredicate {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into()
        }
    }

    pub fn any_of<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        Self::AnyOf {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect()
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::Eq { field, .. } | Self::AnyOf { field, .. } => field
        }
    }

    /// An `AnyOf` with no values admits nothing.
    pub fn matches(&self, doc: &IndexedDocument) -> bool {
        let candidates = field_values(doc, self.field());
        match self {
            Self::Eq { value, .. } => candidates.iter().any(|c| c == value),
            Self::AnyOf { values, .. } => candidates.iter().any(|c| values.contains(c))
        }
    }
}

fn field_values(doc: &IndexedDocument, field: &str) -> Vec<String> {
    match field {
        TIER_FIELD => vec![doc.security_tier.to_string()],
        GRANTEES_FIELD => doc.grantees.clone(),
        other => doc.metadata.get(other).cloned().into_iter().collect()
    }
}
