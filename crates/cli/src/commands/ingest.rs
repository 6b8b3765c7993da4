//! `repolens ingest` — Chunk and index a repository.

use super::{build_engine, ctrl_c_token, load_config, workspace};
use anyhow::Context;
use repolens_index::IngestReport;
use std::path::{Path, PathBuf};

pub struct IngestArgs {
    pub path: PathBuf,
    pub workspace: String,
    pub ignore: Vec<String>,
    pub retain_orphans: bool,
    pub json: bool,
}

pub async fn run(config_path: Option<&Path>, args: IngestArgs) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if args.retain_orphans {
        config.index.orphan_policy = "retain".into();
    }
    let ws = workspace(&args.workspace)?;
    if !args.path.is_dir() {
        anyhow::bail!("'{}' is not a directory", args.path.display());
    }

    let engine = build_engine(config).await?;
    let cancel = ctrl_c_token();
    let ignore = (!args.ignore.is_empty()).then_some(args.ignore.as_slice());

    eprintln!("  Ingesting {} into '{}'...", args.path.display(), ws);
    let report = engine
        .pipeline
        .run(&ws, &args.path, ignore, &cancel)
        .await
        .context("Ingestion failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &IngestReport) {
    println!();
    if report.cancelled {
        println!("  Ingestion cancelled; partial results below.");
    }
    println!("  Files indexed:    {}", report.files_indexed);
    println!("  Chunks upserted:  {}", report.chunks_upserted);
    println!("  Chunks pruned:    {}", report.chunks_pruned);
    if !report.errors.is_empty() {
        println!("  Skipped files:    {}", report.errors.len());
        for failure in &report.errors {
            println!("    {}: {}", failure.file_path, failure.reason);
        }
    }
    println!();
}
