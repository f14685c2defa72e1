use colored::{ColoredString, Colorize};
use tg_core::{SecurityTier, TierPolicy};

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn subheader(title: &str) {
    println!("{}", title.bold());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Aligned `label: value` line.
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<16} {}", format!("{label}:"), value);
}

/// Highest-priority tier in red, lowest in green, the rest in yellow.
pub fn tier(tier: &SecurityTier, policy: &TierPolicy) -> ColoredString {
    let last = policy.priority().len().saturating_sub(1);
    match policy.rank(tier) {
        Some(0) => tier.as_str().red().bold(),
        Some(rank) if rank == last => tier.as_str().green(),
        Some(_) => tier.as_str().yellow(),
        None => tier.as_str().dimmed()
    }
}

pub fn json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
