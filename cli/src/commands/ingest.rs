use crate::{output, runtime};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use config::{IngestionConfig, TierguardConfig};
use retrieval::IndexWriter;
use std::sync::Arc;
use tg_core::{IndexedDocument, ItemKind, ListRequest};
use tiering::{BatchReport, DocumentTagger, ExtractorRegistry, IngestionPipeline, TagOutcome};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Args)]
pub struct IngestArgs {
    #[arg(long, help = "Folder inside the document library, e.g. /reports/2024")]
    pub folder: Option<String>,

    #[arg(long, help = "Only files created or modified in the last N minutes")]
    pub since_minutes: Option<u64>,

    #[arg(long, value_delimiter = ',', help = "Allowed file extensions, comma separated")]
    pub formats: Vec<String>,

    #[arg(long, help = "Ingest SharePoint site pages instead of document library files")]
    pub site_pages: bool,

    #[arg(long, help = "Tag documents without writing to the index")]
    pub dry_run: bool,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub async fn run(args: IngestArgs, config: &TierguardConfig) -> Result<()> {
    runtime::ensure_valid(config)?;
    let sections: &[&str] = if args.dry_run {
        &["source"]
    } else {
        &["source", "search", "embedding"]
    };
    runtime::require(config, sections, "ingest")?;

    let map = runtime::tier_map(config)?;
    let tagger = Arc::new(DocumentTagger::new(map, ExtractorRegistry::with_defaults()));
    let pipeline = IngestionPipeline::new(
        runtime::content_source(config)?,
        tagger,
        config.ingestion.max_concurrency
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing documents already in flight");
            on_interrupt.cancel();
        }
    });

    let request = list_request(&args, &config.ingestion);
    let run = pipeline.run(&request, &cancel).await?;
    let mut report = run.report;

    if !args.dry_run {
        let documents: Vec<IndexedDocument> = run
            .outcomes
            .into_iter()
            .filter_map(TagOutcome::into_tagged)
            .collect();
        if !documents.is_empty() {
            let writer = IndexWriter::from_config(
                runtime::embeddings(config)?,
                runtime::index_store(config)?,
                &config.ingestion
            );
            let written = writer.write(&documents).await;
            report.indexed_chunks = written.written;
            for failure in &written.failures {
                report.record_index_failure(&failure.document_id, &failure.error);
            }
        }
    }

    if args.json {
        return output::json(&report);
    }
    print_report(&report, args.dry_run, config);
    Ok(())
}

/// Flags win over configured defaults.
fn list_request(args: &IngestArgs, config: &IngestionConfig) -> ListRequest {
    let formats = if args.formats.is_empty() {
        config.file_formats.clone()
    } else {
        args.formats.clone()
    };

    let mut request = ListRequest::default().with_formats(formats);
    if let Some(folder) = args.folder.clone().or_else(|| config.folder_path.clone()) {
        request = request.with_folder(folder);
    }
    if let Some(minutes) = args.since_minutes.or(config.modified_within_minutes) {
        request = request.modified_within(minutes);
    }
    if args.site_pages {
        request = request.with_kind(ItemKind::SitePage);
    }
    request
}

fn print_report(report: &BatchReport, dry_run: bool, config: &TierguardConfig) {
    output::header(if dry_run {
        "Ingestion Report (dry run)"
    } else {
        "Ingestion Report"
    });
    println!();

    output::field("documents", report.total);
    output::field("tagged", report.tagged.to_string().green());
    output::field("failed", if report.failed > 0 {
        report.failed.to_string().red()
    } else {
        report.failed.to_string().normal()
    });
    if report.cancelled > 0 {
        output::field("cancelled", report.cancelled.to_string().yellow());
    }
    if !dry_run {
        output::field("indexed chunks", report.indexed_chunks);
        if report.index_failed > 0 {
            output::field("index failures", report.index_failed.to_string().red());
        }
    }

    if !report.tiers.is_empty() {
        println!();
        output::subheader("Tiers:");
        let policy = config.tiers.to_policy().ok();
        for (tier, count) in &report.tiers {
            let label = match &policy {
                Some(policy) => output::tier(&tier.as_str().into(), policy).to_string(),
                None => tier.clone()
            };
            println!("  {:<20} {}", label, count);
        }
    }

    if report.has_errors() {
        println!();
        output::subheader("Errors:");
        for error in &report.errors {
            println!(
                "  {} {} {}",
                error.document_id.bold(),
                format!("[{}]", error.kind).dimmed(),
                error.error
            );
        }
    }

    if report.cancelled > 0 {
        println!();
        output::hint("Ingestion was interrupted; run it again to process the remaining documents");
    } else if report.failed == 0 && report.index_failed == 0 && report.total > 0 {
        println!();
        output::success("All documents tagged");
    }
}
