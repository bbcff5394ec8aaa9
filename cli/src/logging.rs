//! Subscriber setup and the task event log.

use forgetube_core::api::{LoggingConfig, TaskEvent};
use tokio::sync::broadcast;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

pub fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("forgetube"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("forgetube.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// Logs every task event until the store is dropped.
pub fn spawn_event_logger(mut event_rx: broadcast::Receiver<TaskEvent>) {
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "forgetube.events", skipped, "event log lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn log_event(event: &TaskEvent) {
    match event {
        TaskEvent::Created { task_id, .. } => {
            tracing::debug!(target: "forgetube.events", %task_id, "task created");
        }
        TaskEvent::StateChanged {
            task_id, old, new, ..
        } => {
            tracing::info!(target: "forgetube.events", %task_id, %old, %new, "task state changed");
        }
        TaskEvent::Progress {
            task_id,
            media,
            done,
            total,
            ..
        } => {
            tracing::debug!(target: "forgetube.events", %task_id, %media, done, total, "segment done");
        }
        TaskEvent::SegmentDegraded {
            task_id,
            media,
            index,
            ..
        } => {
            tracing::warn!(target: "forgetube.events", %task_id, %media, index, "segment replaced by placeholder");
        }
        TaskEvent::TimelineRevised {
            task_id, revision, ..
        } => {
            tracing::info!(target: "forgetube.events", %task_id, revision, "script revised");
        }
        TaskEvent::Failed {
            task_id,
            kind,
            summary,
            ..
        } => {
            tracing::error!(target: "forgetube.events", %task_id, %kind, "task failed: {}", summary);
        }
        TaskEvent::Completed {
            task_id,
            duration_ms,
            ..
        } => {
            tracing::info!(target: "forgetube.events", %task_id, duration_ms, "task completed");
        }
    }
}
