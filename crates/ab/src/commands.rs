//! Command implementations

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ab_domain::entities::InstanceMode;
use ab_domain::error::{Error, Result};
use ab_infrastructure::config::ConfigLoader;
use ab_infrastructure::lock::is_pid_alive;
use ab_infrastructure::paths::StatePaths;
use ab_infrastructure::project::resolve_project_root;
use ab_infrastructure::registry::InstanceRegistry;
use ab_infrastructure::rendezvous::discover_live_instance;
use ab_server::ServerOverrides;

use crate::client::InstanceClient;

/// How long `start` waits for the spawned instance to become discoverable
const START_WAIT: Duration = Duration::from_secs(10);
/// How long `stop` waits for the instance process to exit
const STOP_WAIT: Duration = Duration::from_secs(10);

/// `ab init`: create the state directory and a default config
pub async fn init(start_path: &Path) -> Result<()> {
    let project_root = resolve_project_root(start_path).await?;
    let paths = StatePaths::for_project(&project_root);
    paths.ensure_dirs()?;
    let config_path = ConfigLoader::write_default_project_config(&paths)?;

    println!("initialized {}", paths.state_dir.display());
    println!("config: {}", config_path.display());
    Ok(())
}

/// `ab start`: run in the foreground, or spawn a detached instance and
/// wait for its rendezvous
pub async fn start(
    start_path: &Path,
    mode: InstanceMode,
    foreground: bool,
    overrides: ServerOverrides,
) -> Result<()> {
    if foreground {
        return ab_server::run(start_path, mode, overrides).await;
    }

    let project_root = resolve_project_root(start_path).await?;
    let paths = StatePaths::for_project(&project_root);
    if let Some(existing) = discover_live_instance(&paths).await {
        println!(
            "already running at {} (pid {})",
            existing.base_url, existing.pid
        );
        return Ok(());
    }

    let exe = std::env::current_exe()
        .map_err(|e| Error::internal(format!("cannot locate own executable: {e}")))?;
    let mut command = std::process::Command::new(exe);
    command
        .arg("--path")
        .arg(&project_root)
        .arg("start")
        .arg("--foreground")
        .arg("--mode")
        .arg(mode.as_str())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    if let Some(host) = &overrides.host {
        command.arg("--host").arg(host);
    }
    if let Some(port) = overrides.port {
        command.arg("--port").arg(port.to_string());
    }
    command
        .spawn()
        .map_err(|e| Error::internal(format!("failed to spawn instance: {e}")))?;

    let deadline = tokio::time::Instant::now() + START_WAIT;
    while tokio::time::Instant::now() < deadline {
        if let Some(state) = discover_live_instance(&paths).await {
            println!("running at {} (pid {})", state.base_url, state.pid);
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    Err(Error::timeout("waiting for the instance to come up"))
}

/// `ab stop`: graceful shutdown via the rendezvous URL
pub async fn stop(start_path: &Path) -> Result<()> {
    let client = InstanceClient::discover(start_path).await?;
    let pid = client.runtime.pid;
    client.post_empty("/shutdown").await?;

    let deadline = tokio::time::Instant::now() + STOP_WAIT;
    while tokio::time::Instant::now() < deadline {
        if !is_pid_alive(pid) {
            println!("stopped (pid {pid})");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    Err(Error::timeout(format!("instance pid {pid} did not exit")))
}

/// `ab status`: probe the instance and print its aggregated state
pub async fn status(start_path: &Path, json: bool) -> Result<()> {
    let client = InstanceClient::discover(start_path).await?;
    let snapshot = client.get("/health/status").await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("status:    {}", field(&snapshot, "status"));
    println!("mode:      {}", field(&snapshot, "mode"));
    println!("url:       {}", client.runtime.base_url);
    println!("pid:       {}", client.runtime.pid);
    println!("documents: {}", snapshot["documents"]["total"]);
    if let Some(by_type) = snapshot["documents"]["by_type"].as_array() {
        for entry in by_type {
            if let (Some(kind), Some(count)) = (entry[0].as_str(), entry[1].as_u64()) {
                println!("  {kind}: {count}");
            }
        }
    }
    println!(
        "queue:     {} pending{}",
        snapshot["queue"]["pending"],
        snapshot["queue"]["running_job_id"]
            .as_str()
            .map(|id| format!(", running {id}"))
            .unwrap_or_default()
    );
    if snapshot["graph"]["enabled"].as_bool() == Some(true) {
        println!(
            "graph:     {} entities, {} relationships ({})",
            snapshot["graph"]["entity_count"],
            snapshot["graph"]["relationship_count"],
            field(&snapshot["graph"], "store"),
        );
    } else {
        println!("graph:     disabled");
    }
    Ok(())
}

/// `ab list`: report running instances from the user-level registry
pub async fn list() -> Result<()> {
    let Some(registry) = InstanceRegistry::user_default() else {
        println!("no user data directory available");
        return Ok(());
    };
    let instances = registry.list_live()?;
    if instances.is_empty() {
        println!("no running instances");
        return Ok(());
    }
    for state in instances {
        println!(
            "{}  {}  pid {}",
            state.project_root.display(),
            state.base_url,
            state.pid
        );
    }
    Ok(())
}

/// Arguments of `ab index`
#[derive(Debug, Clone)]
pub struct IndexArgs {
    /// Folder to ingest
    pub folder: PathBuf,
    /// Ingest code files too
    pub include_code: bool,
    /// Language restriction
    pub languages: Vec<String>,
    /// Excluded glob patterns
    pub exclude: Vec<String>,
    /// Re-embed and re-upsert unconditionally
    pub rebuild: bool,
    /// Clear and re-extract the graph
    pub rebuild_graph: bool,
}

/// `ab index`: submit an ingestion job
pub async fn index(start_path: &Path, args: IndexArgs) -> Result<()> {
    let folder = std::fs::canonicalize(&args.folder)
        .map_err(|_| Error::invalid_argument(format!("not a folder: {}", args.folder.display())))?;

    let client = InstanceClient::discover(start_path).await?;
    let response = client
        .post(
            "/index",
            &serde_json::json!({
                "path": folder.to_string_lossy(),
                "include_code": args.include_code,
                "languages": args.languages,
                "exclude_patterns": args.exclude,
                "rebuild": args.rebuild,
                "rebuild_graph": args.rebuild_graph,
            }),
        )
        .await?;
    println!("job {}", field(&response, "job_id"));
    Ok(())
}

/// Arguments of `ab query`
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// Query text
    pub text: String,
    /// Retrieval mode
    pub mode: String,
    /// Results to return
    pub top_k: usize,
    /// Score threshold override
    pub threshold: Option<f32>,
    /// Hybrid alpha override
    pub alpha: Option<f32>,
    /// Language filter
    pub languages: Vec<String>,
    /// Source-type filter
    pub source_types: Vec<String>,
    /// Print raw JSON
    pub json: bool,
}

/// `ab query`: run a retrieval query against the instance
pub async fn query(start_path: &Path, args: QueryArgs) -> Result<()> {
    let client = InstanceClient::discover(start_path).await?;
    let mut body = serde_json::json!({
        "query": args.text,
        "mode": args.mode,
        "top_k": args.top_k,
        "languages": args.languages,
        "source_types": args.source_types,
    });
    if let Some(threshold) = args.threshold {
        body["threshold"] = serde_json::json!(threshold);
    }
    if let Some(alpha) = args.alpha {
        body["alpha"] = serde_json::json!(alpha);
    }

    let response = client.post("/query", &body).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let Some(results) = response["results"].as_array() else {
        println!("no results");
        return Ok(());
    };
    if results.is_empty() {
        println!("no results");
        return Ok(());
    }
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. {} (score {:.3})",
            rank + 1,
            field(result, "source"),
            result["score"].as_f64().unwrap_or_default()
        );
        let text = field(result, "text");
        for line in text.lines().take(3) {
            println!("   {line}");
        }
    }
    Ok(())
}

/// `ab reset`: clear the indexes (prompts unless `--yes`)
pub async fn reset(start_path: &Path, yes: bool) -> Result<()> {
    if !yes {
        eprint!("clear all indexed data? [y/N] ");
        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .map_err(Error::from)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("aborted");
            return Ok(());
        }
    }

    let client = InstanceClient::discover(start_path).await?;
    client.post_empty("/reset").await?;
    println!("indexes cleared");
    Ok(())
}

/// `ab jobs`: list, inspect, watch, or cancel jobs
pub async fn jobs(
    start_path: &Path,
    job_id: Option<String>,
    watch: bool,
    cancel: bool,
) -> Result<()> {
    let client = InstanceClient::discover(start_path).await?;

    let Some(job_id) = job_id else {
        if cancel {
            return Err(Error::invalid_argument("--cancel requires a job id"));
        }
        let response = client.get("/jobs").await?;
        let Some(jobs) = response["jobs"].as_array() else {
            println!("no jobs");
            return Ok(());
        };
        if jobs.is_empty() {
            println!("no jobs");
            return Ok(());
        }
        for job in jobs {
            print_job_line(job);
        }
        return Ok(());
    };

    if cancel {
        let response = client.post_empty(&format!("/jobs/{job_id}/cancel")).await?;
        println!("{}: {}", job_id, field(&response, "status"));
        return Ok(());
    }

    if watch {
        loop {
            let job = client.get(&format!("/jobs/{job_id}")).await?;
            print_job_line(&job);
            let status = field(&job, "status");
            if matches!(status.as_str(), "done" | "failed" | "cancelled") {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    let job = client.get(&format!("/jobs/{job_id}")).await?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

fn print_job_line(job: &serde_json::Value) {
    let progress = job["progress"].as_f64().unwrap_or_default();
    println!(
        "{}  {}  {:>5.1}%  {}",
        field(job, "job_id"),
        field(job, "status"),
        progress * 100.0,
        job["request"]["folder_path"].as_str().unwrap_or(""),
    );
}

fn field(value: &serde_json::Value, key: &str) -> String {
    value[key].as_str().unwrap_or("?").to_owned()
}

/// Parse the `--mode` argument of `start`
pub fn parse_mode(raw: &str) -> Result<InstanceMode> {
    InstanceMode::from_str(raw)
}
