use crate::{output, runtime, ux_error};
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use config::TierguardConfig;
use tg_core::{Grantee, PermissionEntry};
use tiering::resolve_with_trace;

#[derive(Subcommand)]
pub enum TiersCommand {
    #[command(about = "Show tier priority, the default tier and group mappings")]
    List(ListArgs),

    #[command(about = "Resolve the tier a document with these grantees would get")]
    Resolve(ResolveArgs)
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

#[derive(Args)]
pub struct ResolveArgs {
    /// NAME:ROLE, e.g. "Contoso Owners:owner". Roles may be comma separated;
    /// without a role the grantee is treated as a reader.
    #[arg(long = "grantee", required = true, value_parser = parse_grantee)]
    pub grantees: Vec<PermissionEntry>,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

fn parse_grantee(value: &str) -> Result<PermissionEntry, String> {
    let (name, roles) = match value.rsplit_once(':') {
        Some((name, roles)) => (name.trim(), roles),
        None => (value.trim(), "read")
    };
    let roles: Vec<&str> = roles
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .collect();

    if name.is_empty() || roles.is_empty() {
        return Err(ux_error::invalid_grantee(value).to_string());
    }
    Ok(PermissionEntry::new(Grantee::group(name, name), roles))
}

pub fn run(cmd: TiersCommand, config: &TierguardConfig) -> Result<()> {
    runtime::ensure_valid(config)?;
    match cmd {
        TiersCommand::List(args) => list(args, config),
        TiersCommand::Resolve(args) => resolve(args, config)
    }
}

fn list(args: ListArgs, config: &TierguardConfig) -> Result<()> {
    let map = runtime::tier_map(config)?;
    let mappings = map.snapshot();

    if args.json {
        return output::json(&serde_json::json!({
            "priority": map.tier_priority_order(),
            "default_tier": map.default_tier(),
            "mappings": mappings
        }));
    }

    let policy = map.policy();
    output::header("Security Tiers");
    println!();
    output::subheader("Priority (highest first):");
    for (rank, tier) in policy.priority().iter().enumerate() {
        let marker = if tier == policy.default_tier() {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };
        println!("  {}. {}{}", rank + 1, output::tier(tier, policy), marker);
    }

    println!();
    output::subheader("Group mappings:");
    if mappings.is_empty() {
        println!("  {}", "none; every document gets the default tier".dimmed());
    }
    for (grantee, tier) in &mappings {
        println!("  {:<32} {}", grantee, output::tier(tier, policy));
    }
    Ok(())
}

fn resolve(args: ResolveArgs, config: &TierguardConfig) -> Result<()> {
    let map = runtime::tier_map(config)?;
    let resolution = resolve_with_trace(&args.grantees, &map);

    if args.json {
        return output::json(&resolution);
    }

    let policy = map.policy();
    output::header("Tier Resolution");
    println!();
    output::field("tier", output::tier(&resolution.tier, policy));
    if resolution.defaulted {
        output::field("reason", "no visible grantee is mapped; default tier".dimmed());
    } else {
        output::field("decided by", resolution.deciding_grantees().join(", "));
    }

    let ignored: Vec<&str> = args
        .grantees
        .iter()
        .filter(|e| !e.confers_visibility())
        .map(|e| e.display_name())
        .collect();
    if !ignored.is_empty() {
        println!();
        output::hint(&format!(
            "Ignored without owner or read role: {}",
            ignored.join(", ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grantee_with_roles() {
        let entry = parse_grantee("Contoso Owners:owner,write").unwrap();
        assert_eq!(entry.display_name(), "Contoso Owners");
        assert!(entry.has_role("owner"));
        assert!(entry.has_role("write"));
    }

    #[test]
    fn test_parse_grantee_defaults_to_read() {
        let entry = parse_grantee("Finance").unwrap();
        assert!(entry.has_role("read"));
        assert!(entry.confers_visibility());
    }

    #[test]
    fn test_parse_grantee_keeps_colons_in_name() {
        let entry = parse_grantee("Team: Sales:read").unwrap();
        assert_eq!(entry.display_name(), "Team: Sales");
    }

    #[test]
    fn test_parse_grantee_rejects_empty_parts() {
        assert!(parse_grantee(":read").is_err());
        assert!(parse_grantee("Owners:").is_err());
    }

    #[test]
    fn test_list_and_resolve_with_defaults() {
        let config = TierguardConfig::default();
        assert!(list(ListArgs { json: true }, &config).is_ok());

        let args = ResolveArgs {
            grantees: vec![parse_grantee("Contoso Owners:owner").unwrap()],
            json: true
        };
        assert!(resolve(args, &config).is_ok());
    }
}
