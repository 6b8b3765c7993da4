//! `repolens analyze` — Streamed analysis with suggested actions.

use super::{build_engine, load_config, workspace};
use anyhow::Context;
use repolens_agent::{AnalysisGoal, AnalysisRequest, AnalysisResponse};
use std::io::Write;
use std::path::Path;

pub struct AnalyzeArgs {
    pub query: String,
    pub workspace: String,
    pub goal: AnalysisGoal,
    pub file: Option<String>,
    pub top_k: Option<usize>,
    pub json: bool,
}

pub async fn run(config_path: Option<&Path>, args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let request = AnalysisRequest {
        workspace_id: workspace(&args.workspace)?,
        query: args.query,
        goal: args.goal,
        file_path: args.file,
        top_k: args.top_k,
    };
    let engine = build_engine(config).await?;

    let result = if args.json {
        engine.analysis.analyze(request).await
    } else {
        println!();
        let result = engine
            .analysis
            .analyze_streaming(request, |delta| {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            })
            .await;
        println!("\n");
        result
    };
    let response = result.context("Analysis failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_details(&response);
    }
    Ok(())
}

fn print_details(response: &AnalysisResponse) {
    if !response.relevant_contexts.is_empty() {
        println!("  Relevant code:");
        for ctx in &response.relevant_contexts {
            println!(
                "    {}:{}-{}  ({:.3})",
                ctx.metadata.file_path,
                ctx.metadata.line_start,
                ctx.metadata.line_end,
                ctx.boosted_score
            );
        }
        println!();
    }

    if !response.suggested_actions.is_empty() {
        println!("  Suggested actions:");
        for action in &response.suggested_actions {
            println!(
                "    [{}] {}: {} (confidence {:.2})",
                action.kind, action.target_file, action.description, action.confidence
            );
        }
        println!();
    }

    println!("  Follow-up questions:");
    for question in &response.follow_up_questions {
        println!("    - {question}");
    }
    println!("\n  ({} ms)", response.execution_time_ms);
}
