//! Requester scopes and their rendering as store filters.
//!
//! A scope that admits nobody produces no predicate at all; callers must
//! treat that as "return nothing", never as "unfiltered".

use errors::RetrievalError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tg_core::filter::{GRANTEES_FIELD, TIER_FIELD};
use tg_core::{FilterPredicate, SecurityTier};

/// Delimiter used by `search.in`; group names containing it cannot be
/// expressed.
const IN_DELIMITER: char = ',';

/// What the caller is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterScope {
    Tier(SecurityTier),
    Groups(BTreeSet<String>)
}

impl RequesterScope {
    pub fn tier(tier: impl Into<String>) -> Self {
        Self::Tier(SecurityTier::new(tier))
    }

    pub fn groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        Self::Groups(groups.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Tier(tier) => tier.as_str().trim().is_empty(),
            Self::Groups(groups) => groups.iter().all(|g| g.trim().is_empty())
        }
    }
}

/// `Ok(None)` for an empty scope.
pub fn build_predicate(scope: &RequesterScope) -> Result<Option<FilterPredicate>, RetrievalError> {
    if scope.is_empty() {
        return Ok(None);
    }

    let predicate = match scope {
        RequesterScope::Tier(tier) => FilterPredicate::eq(TIER_FIELD, tier.as_str()),
        RequesterScope::Groups(groups) => FilterPredicate::any_of(
            GRANTEES_FIELD,
            groups.iter().filter(|g| !g.trim().is_empty()).cloned()
        )
    };
    validate(&predicate)?;
    Ok(Some(predicate))
}

fn validate(predicate: &FilterPredicate) -> Result<(), RetrievalError> {
    let values: Vec<&String> = match predicate {
        FilterPredicate::Eq { value, .. } => vec![value],
        FilterPredicate::AnyOf { values, .. } => values.iter().collect()
    };

    for value in values {
        if value.chars().any(char::is_control) {
            return Err(RetrievalError::InvalidFilter {
                reason: format!("value {:?} contains control characters", value)
            });
        }
        if matches!(predicate, FilterPredicate::AnyOf { .. }) && value.contains(IN_DELIMITER) {
            return Err(RetrievalError::InvalidFilter {
                reason: format!("group name {:?} contains the '{}' delimiter", value, IN_DELIMITER)
            });
        }
    }
    Ok(())
}

/// Renders a predicate as an Azure AI Search OData filter.
///
/// `Eq` on a collection field and `AnyOf` on a scalar field are rendered with
/// the matching OData form for the field, so the index schema decides.
pub fn to_odata(predicate: &FilterPredicate) -> Result<String, RetrievalError> {
    validate(predicate)?;
    Ok(match predicate {
        FilterPredicate::Eq { field, value } if field == GRANTEES_FIELD => {
            format!("{field}/any(g: g eq '{}')", escape(value))
        }
        FilterPredicate::Eq { field, value } => format!("{field} eq '{}'", escape(value)),
        FilterPredicate::AnyOf { field, values } => {
            let joined = values.iter().map(|v| escape(v)).collect::<Vec<_>>().join(",");
            if field == GRANTEES_FIELD {
                format!("{field}/any(g: search.in(g, '{joined}', ','))")
            } else {
                format!("search.in({field}, '{joined}', ',')")
            }
        }
    })
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_scope_renders_eq() {
        let predicate = build_predicate(&RequesterScope::tier("Group_low"))
            .unwrap()
            .unwrap();
        assert_eq!(to_odata(&predicate).unwrap(), "security_tier eq 'Group_low'");
    }

    #[test]
    fn test_group_scope_renders_search_in() {
        let predicate = build_predicate(&RequesterScope::groups(["Visitors", "Members"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            to_odata(&predicate).unwrap(),
            "grantees/any(g: search.in(g, 'Members,Visitors', ','))"
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        let predicate = build_predicate(&RequesterScope::groups(["O'Brien Team"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            to_odata(&predicate).unwrap(),
            "grantees/any(g: search.in(g, 'O''Brien Team', ','))"
        );

        let predicate = FilterPredicate::eq(TIER_FIELD, "it's");
        assert_eq!(to_odata(&predicate).unwrap(), "security_tier eq 'it''s'");
    }

    #[test]
    fn test_empty_scopes_build_nothing() {
        assert_eq!(build_predicate(&RequesterScope::tier("")).unwrap(), None);
        assert_eq!(build_predicate(&RequesterScope::tier("  ")).unwrap(), None);
        assert_eq!(
            build_predicate(&RequesterScope::groups(Vec::<String>::new())).unwrap(),
            None
        );
        assert_eq!(build_predicate(&RequesterScope::groups([" "])).unwrap(), None);
    }

    #[test]
    fn test_blank_groups_are_dropped() {
        let predicate = build_predicate(&RequesterScope::groups(["", "Members"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            predicate,
            FilterPredicate::any_of(GRANTEES_FIELD, ["Members"])
        );
    }

    #[test]
    fn test_delimiter_in_group_rejected() {
        let err = build_predicate(&RequesterScope::groups(["Sales, EMEA"])).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidFilter { .. }));
    }

    #[test]
    fn test_control_characters_rejected() {
        let err = build_predicate(&RequesterScope::tier("Group_low\n or true")).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidFilter { .. }));
    }

    #[test]
    fn test_eq_on_grantees_uses_any() {
        let predicate = FilterPredicate::eq(GRANTEES_FIELD, "Members");
        assert_eq!(to_odata(&predicate).unwrap(), "grantees/any(g: g eq 'Members')");
    }
}
