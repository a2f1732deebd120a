//! Forgeguard - model promotion CLI
//!
//! The `forgeguard` command runs after each training job and decides whether
//! the freshly trained forgery-detection model replaces production.
//!
//! ## Commands
//!
//! - `promote`: Compare a candidate with production and publish it if better
//! - `current`: Show the production model
//! - `history`: Show past releases
//! - `rollback`: Restore the previous production model
//! - `score`: Turn classifier predictions into a metrics file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forgeguard_core::{
    CloudSync, CommandExporter, NoopSync, PassthroughExporter, PredictionSet, PromoteConfig,
    Promoter, SpaceSync, UnconfiguredSync, DEFAULT_THRESHOLD,
};
use hf_space_sync::{SpaceClient, SpaceConfig};
use model_registry::{FsModelRegistry, MetricsRecord, ModelRegistry, ProductionEntry};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "forgeguard")]
#[command(author = "Forgeguard Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Promote trained forgery-detection models to production", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Production registry directory
    #[arg(long, global = true, env = "FORGEGUARD_REGISTRY")]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Promote a candidate model if it beats production on F1
    Promote {
        /// Metrics JSON produced by the evaluator (`score`)
        #[arg(short, long)]
        metrics: PathBuf,

        /// Trained candidate model file
        #[arg(short, long)]
        candidate: PathBuf,

        /// Skip the Hugging Face Space sync
        #[arg(long)]
        no_sync: bool,

        /// Weights export command; `{model}` and `{output}` are substituted
        #[arg(long, env = "FORGEGUARD_EXPORT_CMD")]
        export_cmd: Option<String>,

        /// Scratch directory for exported weights (default: <registry>/export)
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Print the full promotion report as JSON
        #[arg(long)]
        json_report: bool,
    },

    /// Show the current production model
    Current,

    /// Show release history, newest first
    History {
        /// Maximum number of releases to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Restore the release before the current one
    Rollback {
        /// Recorded as the promoter of the restored release
        #[arg(long, default_value = "operator")]
        by: String,
    },

    /// Score classifier predictions into a metrics file
    Score {
        /// JSON file with `probabilities` and `labels`
        #[arg(short, long)]
        predictions: PathBuf,

        /// Probability above which an image counts as forged
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,

        /// Write metrics here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    forgeguard_core::init_tracing(cli.json, level);

    let mut config = PromoteConfig::from_env();
    if let Some(registry) = cli.registry {
        config.registry_root = registry;
    }

    match cli.command {
        Commands::Promote {
            metrics,
            candidate,
            no_sync,
            export_cmd,
            export_dir,
            json_report,
        } => {
            let sync = SyncOptions {
                enabled: !no_sync,
                export_cmd,
                export_dir,
            };
            cmd_promote(&config, &metrics, &candidate, sync, json_report).await
        }
        Commands::Current => cmd_current(&config).await,
        Commands::History { limit } => cmd_history(&config, limit).await,
        Commands::Rollback { by } => cmd_rollback(&config, &by).await,
        Commands::Score {
            predictions,
            threshold,
            output,
        } => cmd_score(&predictions, threshold, output.as_deref()),
    }
}

fn open_registry(config: &PromoteConfig) -> Result<FsModelRegistry> {
    let registry = FsModelRegistry::open(&config.registry_root).with_context(|| {
        format!(
            "failed to open registry at {}",
            config.registry_root.display()
        )
    })?;
    Ok(registry.with_lock_timeout(config.lock_timeout))
}

fn describe(entry: &ProductionEntry) -> String {
    let metric = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    format!(
        "v{} {} f1={} accuracy={} ({})",
        entry.version,
        entry.model.digest.short(),
        metric(entry.metrics.f1()),
        metric(entry.metrics.accuracy()),
        entry.model.file_name,
    )
}

struct SyncOptions {
    enabled: bool,
    export_cmd: Option<String>,
    export_dir: Option<PathBuf>,
}

async fn cmd_promote(
    config: &PromoteConfig,
    metrics_path: &Path,
    candidate: &Path,
    sync: SyncOptions,
    json_report: bool,
) -> Result<()> {
    let metrics = MetricsRecord::from_json_file(metrics_path)
        .with_context(|| format!("failed to load metrics from {}", metrics_path.display()))?;
    let registry = open_registry(config)?;

    if !sync.enabled {
        return run_promotion(config, registry, NoopSync, &metrics, candidate, json_report).await;
    }

    let space = SpaceConfig::from_env();
    if space.token.is_none() {
        let sync = UnconfiguredSync::new("HF_TOKEN is not set");
        return run_promotion(config, registry, sync, &metrics, candidate, json_report).await;
    }
    let client = match SpaceClient::new(space) {
        Ok(client) => client,
        Err(e) => {
            let sync = UnconfiguredSync::new(e.to_string());
            return run_promotion(config, registry, sync, &metrics, candidate, json_report).await;
        }
    };

    let export_dir = sync
        .export_dir
        .unwrap_or_else(|| config.registry_root.join("export"));
    match sync.export_cmd.as_deref() {
        Some(line) => {
            let exporter = CommandExporter::from_command_line(line)
                .context("invalid weights export command")?;
            let sync = SpaceSync::new(client, exporter, export_dir);
            run_promotion(config, registry, sync, &metrics, candidate, json_report).await
        }
        None => {
            let sync = SpaceSync::new(client, PassthroughExporter, export_dir);
            run_promotion(config, registry, sync, &metrics, candidate, json_report).await
        }
    }
}

async fn run_promotion<S: CloudSync>(
    config: &PromoteConfig,
    registry: FsModelRegistry,
    sync: S,
    metrics: &MetricsRecord,
    candidate: &Path,
    json_report: bool,
) -> Result<()> {
    let promoter = Promoter::new(registry, sync).with_config(config.clone());
    let report = promoter
        .deploy_model_if_better(metrics, candidate)
        .await
        .context("promotion failed")?;

    if json_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.outcome);
        if let Some(entry) = &report.entry {
            println!("production: {}", describe(entry));
        }
    }

    info!(
        outcome = %report.outcome,
        stage = ?report.stage,
        "promotion run complete"
    );
    forgeguard_core::metrics::PROMOTION_METRICS.flush();
    Ok(())
}

async fn cmd_current(config: &PromoteConfig) -> Result<()> {
    let registry = open_registry(config)?;
    match registry.read().await.context("failed to read registry")? {
        Some(entry) => {
            println!("{}", describe(&entry));
            println!(
                "promoted {} by {}",
                entry.promoted_at.format("%Y-%m-%d %H:%M:%S UTC"),
                entry.promoted_by
            );
            println!("artifact {}", registry.artifact_path(&entry).display());
        }
        None => println!("No production model in {}", config.registry_root.display()),
    }
    Ok(())
}

async fn cmd_history(config: &PromoteConfig, limit: usize) -> Result<()> {
    let registry = open_registry(config)?;
    let history = registry.history().await.context("failed to read history")?;

    if history.is_empty() {
        println!("No releases in {}", config.registry_root.display());
        return Ok(());
    }

    for entry in history.iter().take(limit) {
        println!("{}", describe(entry));
        println!(
            "    {} by {} from {}",
            entry.promoted_at.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.promoted_by,
            entry.source
        );
    }
    Ok(())
}

async fn cmd_rollback(config: &PromoteConfig, by: &str) -> Result<()> {
    let registry = open_registry(config)?;
    let entry = registry.rollback(by).await.context("rollback failed")?;
    println!("Rolled back -> {}", describe(&entry));
    warn!(
        version = entry.version,
        "production rolled back; cloud Space still serves the newer model until the next sync"
    );
    Ok(())
}

fn cmd_score(predictions: &Path, threshold: f64, output: Option<&Path>) -> Result<()> {
    let set = PredictionSet::from_json_file(predictions)
        .with_context(|| format!("failed to load predictions from {}", predictions.display()))?;
    let metrics = set.score(threshold).context("failed to score predictions")?;
    let json = metrics.to_json_pretty()?;

    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "metrics written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
