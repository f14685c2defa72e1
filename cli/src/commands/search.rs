use crate::{output, runtime, ux_error};
use anyhow::Result;
use clap::{ArgGroup, Args};
use colored::Colorize;
use config::TierguardConfig;
use retrieval::{RequesterScope, SearchHit};
use tg_core::SecurityTier;

#[derive(Args)]
#[command(group(ArgGroup::new("scope").required(true).args(["tier", "group"])))]
pub struct SearchArgs {
    #[arg(help = "Search query")]
    pub query: String,

    #[arg(long, help = "Search within this security tier")]
    pub tier: Option<String>,

    #[arg(long, help = "Search as a member of this group (repeatable)")]
    pub group: Vec<String>,

    #[arg(long, help = "Maximum number of results (default: search.top_k)")]
    pub top_k: Option<usize>,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

impl SearchArgs {
    fn scope(&self) -> RequesterScope {
        match &self.tier {
            Some(tier) => RequesterScope::tier(tier.as_str()),
            None => RequesterScope::groups(self.group.iter().cloned())
        }
    }
}

pub async fn run(args: SearchArgs, config: &TierguardConfig) -> Result<()> {
    runtime::ensure_valid(config)?;
    if let Some(tier) = &args.tier {
        if !config.tiers.priority.contains(tier) {
            return Err(ux_error::unknown_tier(tier, &config.tiers.priority).into());
        }
    }
    runtime::require(config, &["search", "embedding"], "search")?;

    let top_k = args.top_k.unwrap_or(config.search.top_k);
    let retriever = runtime::retriever(config)?;
    let hits = retriever.search(&args.query, &args.scope(), top_k).await?;

    if args.json {
        return output::json(&hits);
    }
    print_hits(&args.query, &hits, config);
    Ok(())
}

fn print_hits(query: &str, hits: &[SearchHit], config: &TierguardConfig) {
    output::header(&format!("Results for \"{}\"", query));
    println!();

    if hits.is_empty() {
        println!("  {}", "No documents visible to this scope matched".dimmed());
        return;
    }

    let policy = config.tiers.to_policy().ok();
    for (i, hit) in hits.iter().enumerate() {
        let name = hit
            .metadata
            .get("name")
            .cloned()
            .or_else(|| hit.document_id.clone())
            .unwrap_or_else(|| hit.id.clone());
        let tier = match (&hit.security_tier, &policy) {
            (Some(tier), Some(policy)) => output::tier(&SecurityTier::new(tier.as_str()), policy).to_string(),
            (Some(tier), None) => tier.clone(),
            (None, _) => "-".to_string()
        };
        let score = match hit.reranker_score {
            Some(reranker) => format!("reranker {:.2}, score {:.3}", reranker, hit.score),
            None => format!("score {:.3}", hit.score)
        };

        println!("{}. {} [{}] {}", i + 1, name.bold(), tier, score.dimmed());
        println!("   {}", hit.content);
        println!();
    }
}
