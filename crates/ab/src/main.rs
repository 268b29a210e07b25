//! Agent Brain CLI
//!
//! Per-project retrieval service: lifecycle commands talk to the instance
//! through the on-disk rendezvous; one instance per project root.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod client;
mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ab_domain::error::{Error, ErrorKind};
use ab_server::ServerOverrides;

#[derive(Parser)]
#[command(name = "ab", version, about = "Per-project retrieval service")]
struct Cli {
    /// Start path used for project-root resolution (default: cwd)
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the state directory and a default config
    Init,
    /// Start the instance for this project
    Start {
        /// Instance scoping mode
        #[arg(long, default_value = "project")]
        mode: String,
        /// Run in the foreground instead of spawning a detached instance
        #[arg(long)]
        foreground: bool,
        /// Bind host override
        #[arg(long)]
        host: Option<String>,
        /// Bind port override (0 = OS-assigned)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Gracefully stop the running instance
    Stop,
    /// Show instance status
    Status {
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },
    /// List running instances across projects
    List,
    /// Submit an ingestion job
    Index {
        /// Folder to ingest
        folder: PathBuf,
        /// Ingest code files too (default: docs only)
        #[arg(long)]
        include_code: bool,
        /// Restrict code ingestion to these languages
        #[arg(long, value_delimiter = ',')]
        languages: Vec<String>,
        /// Glob patterns to exclude
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
        /// Re-embed and re-upsert unconditionally
        #[arg(long)]
        rebuild: bool,
        /// Clear and re-extract the graph index
        #[arg(long)]
        rebuild_graph: bool,
    },
    /// Run a retrieval query
    Query {
        /// Query text
        text: String,
        /// Retrieval mode: vector, bm25, hybrid, graph, multi
        #[arg(long, default_value = "hybrid")]
        mode: String,
        /// Results to return
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Minimum score for vector/hybrid results
        #[arg(long)]
        threshold: Option<f32>,
        /// Vector weight for hybrid fusion
        #[arg(long)]
        alpha: Option<f32>,
        /// Language filter
        #[arg(long, value_delimiter = ',')]
        languages: Vec<String>,
        /// Source-type filter (doc, code, test)
        #[arg(long, value_delimiter = ',')]
        source_types: Vec<String>,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Clear all indexed data
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// List, inspect, watch, or cancel jobs
    Jobs {
        /// Job id (omit to list all jobs)
        job_id: Option<String>,
        /// Poll the job until it reaches a terminal state
        #[arg(long)]
        watch: bool,
        /// Cancel the job
        #[arg(long)]
        cancel: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let start_path = cli
        .path
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    // The foreground server installs its own file-logging subscriber.
    let foreground_start = matches!(
        cli.command,
        Command::Start {
            foreground: true,
            ..
        }
    );
    if !foreground_start {
        ab_infrastructure::logging::init_stderr();
    }

    match dispatch(cli, &start_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn dispatch(cli: Cli, start_path: &std::path::Path) -> Result<(), Error> {
    match cli.command {
        Command::Init => commands::init(start_path).await,
        Command::Start {
            mode,
            foreground,
            host,
            port,
        } => {
            let mode = commands::parse_mode(&mode)?;
            commands::start(start_path, mode, foreground, ServerOverrides { host, port }).await
        }
        Command::Stop => commands::stop(start_path).await,
        Command::Status { json } => commands::status(start_path, json).await,
        Command::List => commands::list().await,
        Command::Index {
            folder,
            include_code,
            languages,
            exclude,
            rebuild,
            rebuild_graph,
        } => {
            commands::index(
                start_path,
                commands::IndexArgs {
                    folder,
                    include_code,
                    languages,
                    exclude,
                    rebuild,
                    rebuild_graph,
                },
            )
            .await
        }
        Command::Query {
            text,
            mode,
            top_k,
            threshold,
            alpha,
            languages,
            source_types,
            json,
        } => {
            commands::query(
                start_path,
                commands::QueryArgs {
                    text,
                    mode,
                    top_k,
                    threshold,
                    alpha,
                    languages,
                    source_types,
                    json,
                },
            )
            .await
        }
        Command::Reset { yes } => commands::reset(start_path, yes).await,
        Command::Jobs {
            job_id,
            watch,
            cancel,
        } => commands::jobs(start_path, job_id, watch, cancel).await,
    }
}

/// Exit codes: 0 success, 2 user error, 3 backend unavailable,
/// 4 no running instance, 5 configuration error.
fn exit_code_for(error: &Error) -> u8 {
    match error.kind() {
        ErrorKind::InvalidArgument => 2,
        ErrorKind::BackendUnavailable | ErrorKind::ProviderUnavailable => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::Configuration => 5,
        _ => 1,
    }
}
