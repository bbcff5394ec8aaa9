//! HTTP server lifecycle.

use super::{
    middleware::{create_middleware_stack, request_logger},
    routes::create_router,
    AppState,
};
use crate::commands::cli::ServeArgs;
use axum::middleware;
use forgetube_core::api::{AppConfig, CliError, Orchestrator, TaskState};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

const STATE_FILE: &str = "forgetube.state";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl ServerConfig {
    /// CLI flags win over the config file.
    pub fn resolve(args: &ServeArgs, cfg: &AppConfig) -> Self {
        Self {
            host: args
                .host
                .clone()
                .unwrap_or_else(|| cfg.http_server.host.clone()),
            port: args.port.unwrap_or(cfg.http_server.port),
            request_timeout: Duration::from_secs(cfg.http_server.request_timeout_secs),
        }
    }
}

fn state_file_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

fn write_state_file(root: &Path, session_id: &str, config: &ServerConfig) -> Result<PathBuf, CliError> {
    fs::create_dir_all(root)?;
    let path = state_file_path(root);
    let state = serde_json::json!({
        "session_id": session_id,
        "port": config.port,
        "pid": std::process::id(),
        "url": format!("http://{}:{}", config.host, config.port),
        "started_at": chrono::Local::now().to_rfc3339()
    });
    let body = serde_json::to_string_pretty(&state)
        .map_err(|e| CliError::Command(format!("Failed to encode state file: {e}")))?;
    fs::write(&path, body)
        .map_err(|e| CliError::Command(format!("Failed to write state file: {e}")))?;
    info!("State file written to: {}", path.display());
    Ok(path)
}

/// Handles `forgetube serve`.
pub async fn handle_serve(
    args: ServeArgs,
    cfg: AppConfig,
    orchestrator: Orchestrator,
) -> Result<(), CliError> {
    let session_id = Uuid::new_v4().to_string();
    let config = ServerConfig::resolve(&args, &cfg);
    let root = PathBuf::from(&cfg.output.root_dir);

    let (shutdown_tx, _) = broadcast::channel(1);
    let state = AppState::new(session_id.clone(), orchestrator.clone(), cfg, shutdown_tx);

    let state_file = write_state_file(&root, &session_id, &config)?;

    let served = start_server(session_id, config, state).await;

    drain(&orchestrator).await;

    if let Err(e) = fs::remove_file(&state_file) {
        warn!("Failed to remove state file: {}", e);
    }

    served.map_err(|e| CliError::Command(e.to_string()))
}

pub async fn start_server(
    session_id: String,
    config: ServerConfig,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(
        "Starting HTTP server on {}:{} (session: {})",
        config.host, config.port, session_id
    );

    let app = create_router(state.clone())
        .layer(middleware::from_fn(request_logger))
        .layer(create_middleware_stack(config.request_timeout));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{}", addr);

    let mut shutdown_rx = state.shutdown_tx.subscribe();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C signal");
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal from API");
                }
                _ = wait_for_sigterm() => {
                    info!("Received SIGTERM signal");
                }
            }
            info!("Starting graceful shutdown...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Cancels whatever is still in flight and waits for the runs to unwind so
/// partial outputs get cleaned up before the process exits.
async fn drain(orchestrator: &Orchestrator) {
    for task in orchestrator.list().await {
        if task.state.is_terminal() {
            continue;
        }
        if let Err(e) = orchestrator.request_cancel(task.id).await {
            warn!(task_id = %task.id, error = %e, "cancel on shutdown failed");
        }
    }
    orchestrator.join_all().await;
    let cancelled = orchestrator
        .list()
        .await
        .iter()
        .filter(|t| t.state == TaskState::Cancelled)
        .count();
    info!(cancelled, "all tasks settled");
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn flags_override_config() {
        let cfg = AppConfig::default();
        let args = ServeArgs {
            host: None,
            port: Some(9999),
        };
        let resolved = ServerConfig::resolve(&args, &cfg);
        assert_eq!(resolved.host, cfg.http_server.host);
        assert_eq!(resolved.port, 9999);
        assert_eq!(
            resolved.request_timeout,
            Duration::from_secs(cfg.http_server.request_timeout_secs)
        );
    }

    #[test]
    fn state_file_records_session() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 8123,
            request_timeout: Duration::from_secs(5),
        };
        let path = write_state_file(dir.path(), "abc", &config).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["session_id"], "abc");
        assert_eq!(value["url"], "http://127.0.0.1:8123");
    }
}
