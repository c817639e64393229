use std::{env, path::PathBuf, sync::Arc};

use anyhow::Context;
use checkop_checkly::{ChecklyClient, MonitoringApi, SyncAdapter};
use checkop_controller::config::OperatorConfig;
use checkop_controller::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use checkop_controller::{Controller, manifest};
use checkop_db_memory::{InMemoryEventLog, InMemoryStore};
use checkop_storage::{ChangeBroadcaster, DynEventRecorder, DynStore, EventedStore};
use tokio_util::sync::CancellationToken;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From CHECKOP_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (checkop.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (CHECKOP_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present, before reading any configuration
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    checkop_controller::observability::init_tracing();

    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    if cfg.checkly.api_key.is_empty() || cfg.checkly.account_id.is_empty() {
        eprintln!(
            "Configuration error: checkly.api_key and checkly.account_id must be set \
             (CHECKOP__CHECKLY__API_KEY, CHECKOP__CHECKLY__ACCOUNT_ID)"
        );
        std::process::exit(2);
    }

    tracing::info!(
        path = %config_path,
        source = %source,
        domain = %cfg.controller.domain.as_str(),
        "Configuration loaded"
    );

    checkop_controller::observability::apply_logging_level(&cfg.logging.level);

    if let Err(err) = run(cfg, manifests_dir()).await {
        eprintln!("Controller error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cfg: OperatorConfig, manifests: Option<PathBuf>) -> anyhow::Result<()> {
    let broadcaster = ChangeBroadcaster::new_shared();
    let store: DynStore = Arc::new(EventedStore::new(
        InMemoryStore::new(),
        broadcaster.clone(),
    ));
    let events: DynEventRecorder = Arc::new(InMemoryEventLog::new());

    let api: Arc<dyn MonitoringApi> = Arc::new(
        ChecklyClient::new(
            &cfg.checkly.base_url,
            cfg.checkly.api_key.clone(),
            cfg.checkly.account_id.clone(),
            cfg.checkly.request_timeout(),
        )
        .context("failed to build Checkly client")?,
    );
    let adapter = SyncAdapter::with_timeout(api, cfg.checkly.sync_timeout());

    let controller = Arc::new(Controller::new(
        store.clone(),
        events,
        adapter,
        &cfg.controller.domain,
        cfg.controller.scheduler_options(),
    ));

    // Subscribe before seeding so no change is missed.
    let changes = broadcaster.subscribe();
    if let Some(dir) = manifests {
        manifest::seed(store.as_ref(), &dir)
            .await
            .with_context(|| format!("failed to seed manifests from {}", dir.display()))?;
    }

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(controller.run(changes, cancel.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");
    cancel.cancel();
    handle.await.context("controller task panicked")?;
    Ok(())
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: CHECKOP_CONFIG
/// 3. Default: checkop.toml
fn resolve_config_path() -> (String, ConfigSource) {
    if let Some(path) = flag_value("--config") {
        return (path, ConfigSource::CliArgument);
    }

    if let Ok(path) = env::var("CHECKOP_CONFIG")
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }

    (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
}

/// Directory of records to create at startup: --manifests <dir>
fn manifests_dir() -> Option<PathBuf> {
    flag_value("--manifests").map(PathBuf::from)
}

fn flag_value(flag: &str) -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}
