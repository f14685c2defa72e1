use crate::group_map::GroupTierMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tg_core::{PermissionEntry, SecurityTier};
use tracing::{debug, warn};

/// The chosen tier and the grantees that mapped to a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierResolution {
    pub tier: SecurityTier,
    /// Every visible grantee with a mapping, by display name.
    pub matched: BTreeMap<String, SecurityTier>,
    /// No grantee mapped and the default tier was used.
    pub defaulted: bool
}

impl TierResolution {
    /// Grantees whose mapping produced the chosen tier.
    pub fn deciding_grantees(&self) -> Vec<&str> {
        self.matched
            .iter()
            .filter(|(_, tier)| **tier == self.tier)
            .map(|(grantee, _)| grantee.as_str())
            .collect()
    }
}

/// The highest-priority tier reachable from `entries`, or the default tier.
///
/// Only entries holding `owner` or `read` count. The result does not depend
/// on entry order or repetition.
pub fn resolve_tier(entries: &[PermissionEntry], map: &GroupTierMap) -> SecurityTier {
    resolve_with_trace(entries, map).tier
}

pub fn resolve_with_trace(entries: &[PermissionEntry], map: &GroupTierMap) -> TierResolution {
    let matched: BTreeMap<String, SecurityTier> = {
        let mappings = map.read();
        entries
            .iter()
            .filter(|e| e.confers_visibility())
            .filter_map(|e| {
                mappings
                    .get(e.display_name())
                    .map(|tier| (e.display_name().to_string(), tier.clone()))
            })
            .collect()
    };

    let chosen = map
        .tier_priority_order()
        .iter()
        .find(|tier| matched.values().any(|t| t == *tier));

    match chosen {
        Some(tier) => {
            debug!(tier = %tier, matched = matched.len(), "Resolved security tier");
            TierResolution {
                tier: tier.clone(),
                matched,
                defaulted: false
            }
        }
        None => {
            let tier = map.default_tier().clone();
            warn!(
                tier = %tier,
                grantees = entries.len(),
                "No grantee mapped to a tier, using default"
            );
            TierResolution {
                tier,
                matched,
                defaulted: true
            }
        }
    }
}
