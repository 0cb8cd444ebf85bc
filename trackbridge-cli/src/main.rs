use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use trackbridge_core::config::Config;
use trackbridge_core::correlation::{CorrelationStore, SqlCorrelationStore};
use trackbridge_core::engine::Reconciler;
use trackbridge_core::equivalence::{EquivalenceResolver, TargetCatalog};
use trackbridge_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use trackbridge_core::metrics::describe_metrics;
use trackbridge_core::model::NewProjectPair;
use trackbridge_core::snapshot::{Snapshot, SnapshotSourceClient, SnapshotTargetClient};
use trackbridge_core::validator::{ConfigurationValidator, RemoteValidator};
use trackbridge_core::SyncContext;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "trackbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file; TRACKBRIDGE_* environment variables are used when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the project pairs kept in the correlation store
    Projects {
        #[command(subcommand)]
        action: ProjectsCommand,
    },

    /// Check every project pair against a snapshot of both systems
    Validate {
        #[arg(long)]
        snapshot: String,
    },

    /// Reconcile every project pair against a snapshot of both systems
    Run {
        #[arg(long)]
        snapshot: String,

        /// Save the Target state after the run back into the snapshot
        #[arg(long)]
        write_back: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectsCommand {
    List,

    Add {
        #[arg(long)]
        name: String,

        /// Source workspace id
        #[arg(long)]
        source_workspace: String,

        /// Target project id
        #[arg(long)]
        target_project: i64,

        /// Target project key, e.g. SHOP
        #[arg(long)]
        target_key: String,

        /// Number part of the Target epic key
        #[arg(long)]
        epic: i64,
    },
}

fn expand(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Cannot expand path '{}'", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(expand(path)?)?,
        None => Config::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &Config, args: &Args) -> Result<()> {
    let mut log_config = LogConfig::from_settings(&config.logging)?;
    if let Some(level) = &args.log_level {
        log_config.level = level.parse().unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', using 'info'", level);
            LogLevel::Info
        });
    }
    if args.json_logs {
        log_config = log_config.json_format(true);
    }
    init_logging_with_config(log_config)?;
    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<SqlCorrelationStore>> {
    let path = expand(&config.store.database_path.to_string_lossy())?;
    let store = SqlCorrelationStore::open(&path, config.store.pool_size)
        .with_context(|| format!("Cannot open correlation store at {}", path.display()))?;
    Ok(Arc::new(store))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn projects(store: Arc<SqlCorrelationStore>, action: ProjectsCommand) -> Result<()> {
    match action {
        ProjectsCommand::List => print_json(&store.list_projects().await?),
        ProjectsCommand::Add {
            name,
            source_workspace,
            target_project,
            target_key,
            epic,
        } => {
            let pair = store
                .add_project(NewProjectPair {
                    name,
                    source_workspace_id: source_workspace,
                    target_project_id: target_project,
                    target_project_key: target_key,
                    target_epic_id: epic,
                })
                .await?;
            info!(project = %pair.name, id = pair.id, "Added project pair");
            print_json(&pair)
        }
    }
}

async fn validate(config: Config, store: Arc<SqlCorrelationStore>, snapshot: &str) -> Result<()> {
    let snapshot = Snapshot::load(expand(snapshot)?)?;
    let ctx = SyncContext::new(
        Arc::new(SnapshotSourceClient::new(snapshot.source)),
        Arc::new(SnapshotTargetClient::new(snapshot.target)),
        store.clone(),
        EquivalenceResolver::new(TargetCatalog::default()),
        config.sync,
    );
    let validator = RemoteValidator::new(ctx);

    let mut results = Vec::new();
    for pair in store.list_projects().await? {
        let valid = validator.is_valid(&pair).await;
        if !valid {
            warn!(project = %pair.name, "Invalid sync configuration");
        }
        results.push(json!({ "project": pair.name, "valid": valid }));
    }
    print_json(&results)
}

async fn run(
    config: Config,
    store: Arc<SqlCorrelationStore>,
    snapshot_path: &str,
    write_back: bool,
) -> Result<()> {
    let snapshot_path = expand(snapshot_path)?;
    let mut snapshot = Snapshot::load(&snapshot_path)?;
    let target = SnapshotTargetClient::new(snapshot.target.clone());
    let ctx = SyncContext::establish(
        Arc::new(SnapshotSourceClient::new(snapshot.source.clone())),
        Arc::new(target.clone()),
        store,
        config.sync,
    )
    .await
    .context("Cannot start the sync run")?;

    let report = Reconciler::new(ctx).run_all().await?;
    print_json(&report.summaries())?;

    if write_back {
        snapshot.target = target.data().await;
        snapshot.save(&snapshot_path)?;
        info!(path = %snapshot_path.display(), "Wrote Target state back to snapshot");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_logging(&config, &args)?;
    describe_metrics();

    info!("trackbridge started");
    let store = open_store(&config)?;

    match args.command {
        Command::Projects { action } => projects(store, action).await?,
        Command::Validate { snapshot } => validate(config, store, &snapshot).await?,
        Command::Run {
            snapshot,
            write_back,
        } => run(config, store, &snapshot, write_back).await?,
    }

    info!("trackbridge finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_run_command() {
        let args = Args::try_parse_from([
            "trackbridge",
            "--log-level",
            "debug",
            "run",
            "--snapshot",
            "snap.json",
            "--write-back",
        ])
        .unwrap();
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        match args.command {
            Command::Run {
                snapshot,
                write_back,
            } => {
                assert_eq!(snapshot, "snap.json");
                assert!(write_back);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_projects_add() {
        let args = Args::try_parse_from([
            "trackbridge",
            "projects",
            "add",
            "--name",
            "Storefront",
            "--source-workspace",
            "900",
            "--target-project",
            "10100",
            "--target-key",
            "SHOP",
            "--epic",
            "42",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Command::Projects {
                action: ProjectsCommand::Add { epic: 42, .. }
            }
        ));
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trackbridge.toml");
        std::fs::write(&path, "[sync]\nmilestone_title = \"Build\"\n").unwrap();
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.sync.milestone_title, "Build");

        std::fs::write(&path, "[sync]\nworklog_timezone = \"IST\"\n").unwrap();
        assert!(load_config(path.to_str()).is_err());
    }
}
