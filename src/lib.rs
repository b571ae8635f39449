pub mod adapters;
pub mod client;
pub mod errors;
pub mod host;
pub mod launch;
pub mod migration;
pub mod models;
pub mod normalization;
pub mod poller;
pub mod redaction;
pub mod registry;
pub mod runtime;
pub mod settings;

use crate::client::BeadsClient;
use crate::host::logs::LOG_FILE_PREFIX;
use crate::host::CliHost;
use crate::poller::PollCoordinator;
use crate::registry::ProjectRegistry;
use crate::runtime::{ExecutionContext, ProcessEnvMarkers, RuntimeMarkers};
use crate::settings::{default_data_dir, AppSettings, SettingsStore, PROJECT_DIR_VAR};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

const MIN_POLL_INTERVAL_MS: u64 = 250;

pub async fn run() -> anyhow::Result<()> {
    let data_dir = default_data_dir();
    let store = Arc::new(SettingsStore::load(&data_dir)?);
    let settings = store.current();
    init_tracing(&data_dir, &settings).map_err(anyhow::Error::msg)?;

    let project = resolve_project_dir()?;
    let project_path = project.to_string_lossy().to_string();
    let markers: &dyn RuntimeMarkers = &ProcessEnvMarkers;
    let context = ExecutionContext::detect(Some(markers), &settings.web_base_url);
    tracing::info!(
        runtime = context.runtime.as_str(),
        project = %project_path,
        data_dir = %data_dir.display(),
        "starting control panel"
    );

    let host = Arc::new(CliHost::new(store.clone(), &data_dir, project.clone()));
    let client = BeadsClient::from_context(&context, host);
    launch::wait_until_ready(&client).await;

    match migration::needs_storage_engine_migration(&client, Some(&project_path)).await {
        Ok(check) if check.needs_migration => tracing::warn!(
            reason = check.reason.as_deref().unwrap_or_default(),
            "project needs a storage engine migration"
        ),
        Ok(_) => {}
        Err(error) => tracing::warn!(error = %error, "storage engine check failed"),
    }

    let registration = match settings.dashboard_url.as_deref() {
        Some(url) => register_with_dashboard(url, &project).await,
        None => None,
    };

    if client.is_native() {
        if let Err(error) = client.start_watching(Some(&project_path)).await {
            tracing::warn!(error = %error, "failed to start project watcher");
        }
    }

    let coordinator = PollCoordinator::new(client.clone(), Some(project_path));
    let interval = Duration::from_millis(settings.poll_interval_ms.max(MIN_POLL_INTERVAL_MS));
    let poll_loop = coordinator.spawn(interval, |data| {
        tracing::info!(
            open = data.open.len(),
            closed = data.closed.len(),
            ready = data.ready.len(),
            "issues refreshed"
        );
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    poll_loop.abort();
    if client.is_native() {
        if let Err(error) = client.stop_watching().await {
            tracing::warn!(error = %error, "failed to stop project watcher");
        }
    }
    if let Some((registry, id)) = registration {
        registry.unregister(&id).await;
    }
    Ok(())
}

fn resolve_project_dir() -> std::io::Result<PathBuf> {
    match std::env::var_os(PROJECT_DIR_VAR).filter(|value| !value.is_empty()) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => std::env::current_dir(),
    }
}

async fn register_with_dashboard(dashboard_url: &str, project: &Path) -> Option<(ProjectRegistry, String)> {
    let registry = ProjectRegistry::new(dashboard_url);
    let name = project
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| project.to_string_lossy().to_string());
    match registry.register(&name, &project.to_string_lossy()).await {
        Ok(registration) => Some((registry, registration.id)),
        Err(error) => {
            tracing::warn!(error = %error, "project registration failed");
            None
        }
    }
}

fn log_filter(settings: &AppSettings) -> &'static str {
    if !settings.logging_enabled {
        "off"
    } else if settings.verbose_logging {
        "debug"
    } else {
        "info"
    }
}

fn init_tracing(app_data_dir: &Path, settings: &AppSettings) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter(settings))),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
