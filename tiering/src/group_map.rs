use config::TierConfig;
use errors::PolicyError;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::BTreeMap;
use tg_core::{SecurityTier, TierPolicy};
use tracing::info;

/// Grantee display name to security tier.
///
/// Keys match exactly: no trimming, no case folding. Every stored tier is a
/// member of the policy's priority list.
pub struct GroupTierMap {
    policy: TierPolicy,
    mappings: RwLock<BTreeMap<String, SecurityTier>>
}

impl GroupTierMap {
    pub fn new(policy: TierPolicy) -> Self {
        Self {
            policy,
            mappings: RwLock::new(BTreeMap::new())
        }
    }

    pub fn seeded<I, S>(policy: TierPolicy, entries: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = (S, SecurityTier)>,
        S: Into<String>
    {
        let map = Self::new(policy);
        for (grantee, tier) in entries {
            map.set_mapping(grantee, tier)?;
        }
        Ok(map)
    }

    pub fn from_config(config: &TierConfig) -> Result<Self, PolicyError> {
        Self::seeded(config.to_policy()?, config.seed_entries())
    }

    /// Inserts or replaces the tier for `grantee`. Setting the same pair
    /// twice leaves the map unchanged.
    pub fn set_mapping(
        &self,
        grantee: impl Into<String>,
        tier: SecurityTier
    ) -> Result<(), PolicyError> {
        self.policy.ensure_known(&tier)?;
        let grantee = grantee.into();

        let previous = self.mappings.write().insert(grantee.clone(), tier.clone());
        if previous.as_ref() != Some(&tier) {
            info!(grantee = %grantee, tier = %tier, "Group tier mapping set");
        }
        Ok(())
    }

    pub fn remove_mapping(&self, grantee: &str) -> Option<SecurityTier> {
        let removed = self.mappings.write().remove(grantee);
        if let Some(tier) = &removed {
            info!(grantee = %grantee, tier = %tier, "Group tier mapping removed");
        }
        removed
    }

    pub fn lookup(&self, grantee: &str) -> Option<SecurityTier> {
        self.mappings.read().get(grantee).cloned()
    }

    /// Highest priority first.
    pub fn tier_priority_order(&self) -> &[SecurityTier] {
        self.policy.priority()
    }

    pub fn default_tier(&self) -> &SecurityTier {
        self.policy.default_tier()
    }

    pub fn policy(&self) -> &TierPolicy {
        &self.policy
    }

    pub fn snapshot(&self) -> BTreeMap<String, SecurityTier> {
        self.mappings.read().clone()
    }

    /// One consistent view of the mappings for the duration of a resolution.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, SecurityTier>> {
        self.mappings.read()
    }
}
