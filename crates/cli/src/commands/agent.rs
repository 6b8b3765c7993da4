//! `repolens agent` — Run one bounded agent session.

use super::{build_engine, ctrl_c_token, load_config, workspace};
use anyhow::Context;
use repolens_agent::{AgentOutcome, Termination};
use std::path::{Path, PathBuf};

pub struct AgentArgs {
    pub query: String,
    pub workspace: String,
    pub repo: Option<PathBuf>,
    pub max_iterations: Option<u32>,
    pub apply: bool,
    pub json: bool,
}

pub async fn run(config_path: Option<&Path>, args: AgentArgs) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if args.apply {
        config.agent.apply_edits = true;
    }
    let ws = workspace(&args.workspace)?;
    let repo = match args.repo {
        Some(path) => path,
        None => std::env::current_dir().context("Cannot determine the current directory")?,
    };
    if !repo.is_dir() {
        anyhow::bail!("'{}' is not a directory", repo.display());
    }

    let apply_edits = config.agent.apply_edits;
    let engine = build_engine(config).await?;
    let executor = engine.executor_for(Some(repo.as_path()));
    let agent = engine.agent(executor, args.max_iterations);
    let cancel = ctrl_c_token();

    if !args.json {
        eprintln!(
            "  Agent on '{ws}' ({}, repo {})",
            if apply_edits { "applying edits" } else { "dry run" },
            repo.display()
        );
    }

    let outcome = agent
        .run(&ws, &args.query, &cancel)
        .await
        .context("Agent session failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &AgentOutcome) {
    println!();
    for turn in &outcome.turns {
        println!("  Step {}", turn.iteration);
        for obs in &turn.observations {
            println!("    {} -> {}", obs.tool_name, obs.observation);
        }
    }
    println!();

    let ending = match outcome.termination {
        Termination::NaturalStop => "finished",
        Termination::IterationBudgetExhausted => "stopped at the iteration limit",
        Termination::Cancelled => "cancelled",
    };
    println!("  Agent {ending} after {} step(s).", outcome.iterations);
    if !outcome.actions_taken.is_empty() {
        println!("  Edits: {}", outcome.actions_taken.len());
    }
    println!();
    for line in outcome.final_answer.lines() {
        println!("  {line}");
    }
    println!();
}
