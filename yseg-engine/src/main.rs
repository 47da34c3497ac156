//! yseg-engine - Youth segmentation operator binary
//!
//! Triggers clustering runs against the local segmentation database and
//! prints run results, run history and active segments as JSON.
//!
//! Usage:
//!   yseg-engine run --scope barangay --barangay-id BAR001 --triggered-by admin
//!   yseg-engine history --scope municipality
//!   yseg-engine segments --scope barangay --barangay-id BAR001

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yseg_common::config::{self, TomlConfig};
use yseg_common::db::{RunType, Scope, ScopeKey};

use yseg_engine::db::{recommendations, runs, segments};
use yseg_engine::models::RunRequest;
use yseg_engine::{RunOrchestrator, TracingAuditSink};

/// Command-line arguments for yseg-engine
#[derive(Parser, Debug)]
#[command(name = "yseg-engine")]
#[command(about = "Youth clustering and segmentation engine")]
#[command(version)]
struct Cli {
    /// TOML bootstrap configuration file
    #[arg(short, long, env = "YSEG_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run clustering for a scope and print the run result
    Run {
        #[command(flatten)]
        selector: SelectorArgs,

        /// User id recorded for audit
        #[arg(long)]
        triggered_by: String,

        #[arg(long, default_value = "manual")]
        run_type: RunType,
    },

    /// List recent runs for a scope key
    History {
        #[command(flatten)]
        selector: SelectorArgs,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Print the active segments of a scope key with their recommendations
    Segments {
        #[command(flatten)]
        selector: SelectorArgs,
    },
}

#[derive(Args, Debug)]
struct SelectorArgs {
    /// municipality or barangay
    #[arg(long)]
    scope: Scope,

    /// Required when scope is barangay
    #[arg(long)]
    barangay_id: Option<String>,

    /// Survey batch filter
    #[arg(long)]
    batch_id: Option<String>,
}

impl SelectorArgs {
    fn request(&self, triggered_by: &str, run_type: RunType) -> RunRequest {
        RunRequest {
            scope: self.scope,
            barangay_id: self.barangay_id.clone(),
            batch_id: self.batch_id.clone(),
            triggered_by: triggered_by.to_string(),
            run_type,
        }
    }

    fn scope_key(&self) -> Result<ScopeKey> {
        let selector = self.request("operator", RunType::Manual).validate()?;
        Ok(selector.scope_key)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let toml_config = config::load_toml_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    init_logging(&toml_config)?;

    let root_folder = config::resolve_root_folder(cli.root_folder.as_deref(), &toml_config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;

    let db_path = toml_config.database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db = yseg_engine::db::init_database_pool(&db_path).await?;

    match cli.command {
        Command::Run {
            selector,
            triggered_by,
            run_type,
        } => {
            let mut orchestrator =
                RunOrchestrator::from_database(db, Arc::new(TracingAuditSink)).await?;
            if let Some(seconds) = toml_config.run_timeout_seconds {
                orchestrator = orchestrator.with_run_timeout(Duration::from_secs(seconds));
            }

            let outcome = orchestrator
                .execute_run(&selector.request(&triggered_by, run_type))
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            orchestrator.close().await;

            if !outcome.is_completed() {
                std::process::exit(1);
            }
        }
        Command::History { selector, limit } => {
            let history = runs::list_runs(&db, &selector.scope_key()?, limit).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        Command::Segments { selector } => {
            let active = segments::active_segments(&db, &selector.scope_key()?).await?;
            let mut rendered = Vec::with_capacity(active.len());
            for segment in active {
                let programs =
                    recommendations::recommendations_for_segment(&db, segment.segment_id).await?;
                rendered.push(json!({ "segment": segment, "recommendations": programs }));
            }
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
    }

    Ok(())
}

/// Logs go to stderr (or the configured file) so stdout stays valid JSON
///
/// `RUST_LOG` overrides the `[logging] level` value.
fn init_logging(toml_config: &TomlConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| toml_config.logging.level.as_str().into());

    let file_layer = match &toml_config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = toml_config
        .logging
        .file
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}
