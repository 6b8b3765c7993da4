//! `repolens search` — Hybrid-ranked retrieval.

use super::{build_engine, load_config, preview, workspace};
use anyhow::Context;
use repolens_core::{RetrievedContext, SearchFilters};
use std::path::Path;

pub struct SearchArgs {
    pub query: String,
    pub workspace: String,
    pub file: Option<String>,
    pub top_k: Option<usize>,
    pub language: Option<String>,
    pub path_contains: Option<String>,
    pub json: bool,
}

pub async fn run(config_path: Option<&Path>, args: SearchArgs) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let ws = workspace(&args.workspace)?;
    let top_k = args.top_k.unwrap_or(config.retrieval.default_top_k);
    let engine = build_engine(config).await?;

    let filters = SearchFilters {
        language: args.language,
        file_path_contains: args.path_contains,
    };
    let results = engine
        .ranker
        .rank_filtered(&ws, &args.query, args.file.as_deref(), top_k, &filters)
        .await
        .context("Search failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("  No results in workspace '{ws}'.");
        return Ok(());
    }
    for (rank, ctx) in results.iter().enumerate() {
        println!("{}", headline(rank + 1, ctx));
        println!("{}\n", preview(&ctx.content, 6));
    }
    Ok(())
}

fn headline(rank: usize, ctx: &RetrievedContext) -> String {
    let m = &ctx.metadata;
    let name = if m.name.is_empty() {
        String::new()
    } else {
        format!(" {}", m.name)
    };
    format!(
        "  {rank}. {}:{}-{}  [{}{name}]  score {:.3} (similarity {:.3})",
        m.file_path,
        m.line_start,
        m.line_end,
        m.construct_kind.as_str(),
        ctx.boosted_score,
        ctx.similarity_score
    )
}
