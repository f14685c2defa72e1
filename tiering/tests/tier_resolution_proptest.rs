use proptest::prelude::*;
use tg_core::{Grantee, PermissionEntry, SecurityTier, TierPolicy};
use tiering::{GroupTierMap, resolve_tier};

const GRANTEES: [&str; 6] = ["Owners", "Visitors", "Members", "Finance", "RandomGroup", "Adele"];
const ROLES: [&str; 3] = ["read", "owner", "write"];

fn map() -> GroupTierMap {
    let policy = TierPolicy::new(
        vec!["Critical".into(), "Medium".into(), "Low".into()],
        "Medium".into()
    )
    .unwrap();
    GroupTierMap::seeded(
        policy,
        [
            ("Owners", SecurityTier::from("Critical")),
            ("Visitors", SecurityTier::from("Low")),
            ("Members", SecurityTier::from("Low")),
            ("Finance", SecurityTier::from("Medium"))
        ]
    )
    .unwrap()
}

fn entry_strategy() -> impl Strategy<Value = PermissionEntry> {
    (0..GRANTEES.len(), 0..ROLES.len()).prop_map(|(g, r)| {
        PermissionEntry::new(Grantee::group(GRANTEES[g], GRANTEES[g]), [ROLES[r]])
    })
}

/// Direct statement of the rule: first tier in priority order that any
/// visible, mapped grantee reaches.
fn expected(entries: &[PermissionEntry], map: &GroupTierMap) -> SecurityTier {
    map.tier_priority_order()
        .iter()
        .find(|tier| {
            entries.iter().any(|e| {
                e.confers_visibility() && map.lookup(e.display_name()).as_ref() == Some(*tier)
            })
        })
        .cloned()
        .unwrap_or_else(|| map.default_tier().clone())
}

proptest! {
    #[test]
    fn test_resolution_matches_priority_rule(entries in prop::collection::vec(entry_strategy(), 0..12)) {
        let map = map();
        prop_assert_eq!(resolve_tier(&entries, &map), expected(&entries, &map));
    }

    #[test]
    fn test_resolution_ignores_order(
        entries in prop::collection::vec(entry_strategy(), 0..12),
        seed in any::<u64>()
    ) {
        let map = map();
        let mut shuffled = entries.clone();
        let len = shuffled.len();
        if len > 1 {
            let shift = (seed % len as u64) as usize;
            shuffled.rotate_left(shift);
            shuffled.reverse();
        }
        prop_assert_eq!(resolve_tier(&entries, &map), resolve_tier(&shuffled, &map));
    }

    #[test]
    fn test_resolution_ignores_duplicates(entries in prop::collection::vec(entry_strategy(), 0..12)) {
        let map = map();
        let mut doubled = entries.clone();
        doubled.extend(entries.iter().cloned());
        prop_assert_eq!(resolve_tier(&entries, &map), resolve_tier(&doubled, &map));
    }

    #[test]
    fn test_resolution_always_in_policy(entries in prop::collection::vec(entry_strategy(), 0..12)) {
        let map = map();
        let tier = resolve_tier(&entries, &map);
        prop_assert!(map.policy().contains(&tier));
    }
}

#[test]
fn test_owners_and_unknown_group_resolve_to_critical() {
    let policy = TierPolicy::new(
        vec!["Critical".into(), "Medium".into(), "Low".into()],
        "Medium".into()
    )
    .unwrap();
    let map = GroupTierMap::seeded(
        policy,
        [
            ("Owners", SecurityTier::from("Critical")),
            ("Visitors", SecurityTier::from("Low"))
        ]
    )
    .unwrap();

    let owners_and_random = vec![
        PermissionEntry::new(Grantee::group("1", "Owners"), ["owner"]),
        PermissionEntry::new(Grantee::group("2", "RandomGroup"), ["read"]),
    ];
    assert_eq!(resolve_tier(&owners_and_random, &map).as_str(), "Critical");

    let random_only = vec![PermissionEntry::new(Grantee::group("2", "RandomGroup"), ["read"])];
    assert_eq!(resolve_tier(&random_only, &map).as_str(), "Medium");
    assert_eq!(resolve_tier(&[], &map).as_str(), "Medium");
}
