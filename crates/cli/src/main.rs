//! RepoLens CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Write a default config file
//! - `ingest`   — Chunk and index a repository into a workspace
//! - `search`   — Hybrid-ranked retrieval over a workspace
//! - `analyze`  — Streamed analysis with suggested actions
//! - `agent`    — Run a bounded agent session
//! - `serve`    — Start the HTTP gateway

use clap::{Parser, Subcommand};
use repolens_agent::AnalysisGoal;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "repolens",
    about = "RepoLens — context retrieval and agentic actions over code repositories",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.repolens/config.toml)
    #[arg(short, long, global = true, env = "REPOLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Index a repository into a workspace
    Ingest {
        /// Repository root
        path: PathBuf,

        #[arg(short, long, default_value = "default")]
        workspace: String,

        /// Ignore pattern; repeat to replace the configured list
        #[arg(long = "ignore")]
        ignore: Vec<String>,

        /// Keep stale chunks of re-ingested files
        #[arg(long)]
        retain_orphans: bool,

        #[arg(long)]
        json: bool,
    },

    /// Search a workspace
    Search {
        query: String,

        #[arg(short, long, default_value = "default")]
        workspace: String,

        /// The file you are looking at; boosts nearby results
        #[arg(short, long)]
        file: Option<String>,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Only chunks in this language
        #[arg(long)]
        language: Option<String>,

        /// Only chunks whose path contains this text
        #[arg(long)]
        path_contains: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Analyze a question against a workspace
    Analyze {
        query: String,

        #[arg(short, long, default_value = "default")]
        workspace: String,

        /// explain, debug, refactor, review or test_generate
        #[arg(short, long, default_value = "explain")]
        goal: AnalysisGoal,

        #[arg(short, long)]
        file: Option<String>,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Run an agent session
    Agent {
        query: String,

        #[arg(short, long, default_value = "default")]
        workspace: String,

        /// Repository the agent edits and tests (defaults to the current directory)
        #[arg(short, long)]
        repo: Option<PathBuf>,

        #[arg(long)]
        max_iterations: Option<u32>,

        /// Write edits to disk instead of recording proposals
        #[arg(long)]
        apply: bool,

        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP gateway
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init { force } => commands::init::run(config_path, force)?,
        Commands::Ingest {
            path,
            workspace,
            ignore,
            retain_orphans,
            json,
        } => {
            commands::ingest::run(
                config_path,
                commands::ingest::IngestArgs {
                    path,
                    workspace,
                    ignore,
                    retain_orphans,
                    json,
                },
            )
            .await?
        }
        Commands::Search {
            query,
            workspace,
            file,
            top_k,
            language,
            path_contains,
            json,
        } => {
            commands::search::run(
                config_path,
                commands::search::SearchArgs {
                    query,
                    workspace,
                    file,
                    top_k,
                    language,
                    path_contains,
                    json,
                },
            )
            .await?
        }
        Commands::Analyze {
            query,
            workspace,
            goal,
            file,
            top_k,
            json,
        } => {
            commands::analyze::run(
                config_path,
                commands::analyze::AnalyzeArgs {
                    query,
                    workspace,
                    goal,
                    file,
                    top_k,
                    json,
                },
            )
            .await?
        }
        Commands::Agent {
            query,
            workspace,
            repo,
            max_iterations,
            apply,
            json,
        } => {
            commands::agent::run(
                config_path,
                commands::agent::AgentArgs {
                    query,
                    workspace,
                    repo,
                    max_iterations,
                    apply,
                    json,
                },
            )
            .await?
        }
        Commands::Serve { host, port } => commands::serve::run(config_path, host, port).await?,
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
