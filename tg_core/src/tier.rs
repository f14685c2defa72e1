use errors::PolicyError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A coarse security classification attached to every indexed record.
///
/// Tiers are named by configuration (for example `Group_critical`), so this
/// is a transparent string newtype rather than a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityTier(String);

impl SecurityTier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SecurityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SecurityTier {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PolicyError::UnknownTier {
                tier: s.to_string()
            });
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for SecurityTier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The fixed, strictly ordered tier set and the fallback tier.
///
/// `priority` is ordered highest priority first. The default tier is always a
/// member of `priority`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    priority: Vec<SecurityTier>,
    default_tier: SecurityTier
}

impl TierPolicy {
    pub fn new(priority: Vec<SecurityTier>, default_tier: SecurityTier) -> Result<Self, PolicyError> {
        if priority.is_empty() {
            return Err(PolicyError::EmptyPriority);
        }

        let mut seen = HashSet::with_capacity(priority.len());
        for tier in &priority {
            if !seen.insert(tier) {
                return Err(PolicyError::DuplicateTier {
                    tier: tier.to_string()
                });
            }
        }

        if !seen.contains(&default_tier) {
            return Err(PolicyError::UnknownTier {
                tier: default_tier.into_inner()
            });
        }

        Ok(Self {
            priority,
            default_tier
        })
    }

    /// Highest priority first.
    pub fn priority(&self) -> &[SecurityTier] {
        &self.priority
    }

    pub fn default_tier(&self) -> &SecurityTier {
        &self.default_tier
    }

    pub fn contains(&self, tier: &SecurityTier) -> bool {
        self.priority.contains(tier)
    }

    /// Position in the priority order, 0 being the highest.
    pub fn rank(&self, tier: &SecurityTier) -> Option<usize> {
        self.priority.iter().position(|t| t == tier)
    }

    pub fn ensure_known(&self, tier: &SecurityTier) -> Result<(), PolicyError> {
        if self.contains(tier) {
            Ok(())
        } else {
            Err(PolicyError::UnknownTier {
                tier: tier.to_string()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers(names: &[&str]) -> Vec<SecurityTier> {
        names.iter().map(|n| SecurityTier::from(*n)).collect()
    }

    #[test]
    fn test_policy_orders_highest_first() {
        let policy = TierPolicy::new(
            tiers(&["Critical", "Medium", "Low"]),
            SecurityTier::from("Medium")
        )
        .unwrap();

        assert_eq!(policy.rank(&"Critical".into()), Some(0));
        assert_eq!(policy.rank(&"Low".into()), Some(2));
        assert_eq!(policy.rank(&"Unknown".into()), None);
        assert_eq!(policy.default_tier().as_str(), "Medium");
    }

    #[test]
    fn test_policy_rejects_empty_priority() {
        let err = TierPolicy::new(Vec::new(), SecurityTier::from("Medium")).unwrap_err();
        assert_eq!(err, PolicyError::EmptyPriority);
    }

    #[test]
    fn test_policy_rejects_duplicates() {
        let err = TierPolicy::new(tiers(&["A", "B", "A"]), SecurityTier::from("B")).unwrap_err();
        assert_eq!(
            err,
            PolicyError::DuplicateTier {
                tier: "A".to_string()
            }
        );
    }

    #[test]
    fn test_policy_rejects_default_outside_priority() {
        let err = TierPolicy::new(tiers(&["A", "B"]), SecurityTier::from("C")).unwrap_err();
        assert!(matches!(err, PolicyError::UnknownTier { .. }));
    }

    #[test]
    fn test_tier_from_str_trims_and_rejects_blank() {
        let tier: SecurityTier = " Group_low ".parse().unwrap();
        assert_eq!(tier.as_str(), "Group_low");
        assert!("   ".parse::<SecurityTier>().is_err());
    }

    #[test]
    fn test_tier_serializes_transparently() {
        let tier = SecurityTier::from("Group_critical");
        assert_eq!(
            serde_json::to_string(&tier).unwrap(),
            "\"Group_critical\""
        );
    }
}
