//! `forgetube run`: one task from submission to video, with a live spinner.

use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

use forgetube_core::api::{
    parse_key_points, AppConfig, CliError, Credentials, ErrorKind, Orchestrator, SubmitRequest,
    TaskError, TaskId, TaskState, TaskStatus,
};

use super::cli::RunArgs;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const DRY_RUN_KEY: &str = "dry-run";
pub const EXIT_CANCELLED: i32 = 130;

pub async fn handle_run(
    args: RunArgs,
    cfg: &AppConfig,
    orchestrator: &Orchestrator,
) -> Result<i32, CliError> {
    let credentials = resolve_credentials(&args, cfg);
    let feedback = args
        .feedback
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);

    let id = orchestrator
        .submit(SubmitRequest {
            topic: args.topic.clone(),
            duration: args.duration.map(Duration::from_secs),
            key_points: args
                .key_points
                .as_deref()
                .map(parse_key_points)
                .unwrap_or_default(),
            credentials,
            review: feedback.is_some(),
        })
        .await?;

    let spinner = spinner();
    spinner.set_message(format!("task {id} queued"));
    let status = follow(orchestrator, id, feedback, &spinner, tokio::signal::ctrl_c()).await?;
    spinner.finish_and_clear();
    finish(&status)
}

/// Polls the task until it settles. Applies pending feedback once the script
/// is ready and turns the first `interrupt` into a cancel request.
async fn follow<F>(
    orchestrator: &Orchestrator,
    id: TaskId,
    mut feedback: Option<String>,
    spinner: &ProgressBar,
    interrupt: F,
) -> Result<TaskStatus, CliError>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(interrupt);
    let mut cancel_sent = false;
    loop {
        tokio::select! {
            _ = &mut interrupt, if !cancel_sent => {
                cancel_sent = true;
                spinner.set_message("cancelling...");
                orchestrator.request_cancel(id).await?;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        let status = orchestrator.get_status(id).await?;
        spinner.set_message(progress_message(&status));
        if status.state.is_terminal() {
            break;
        }
        if status.state == TaskState::ScriptReady {
            if let Some(text) = feedback.take() {
                spinner.set_message("refining script");
                if let Err(e) = orchestrator.refine(id, text).await {
                    spinner.suspend(|| eprintln!("refinement failed, keeping the first script: {e}"));
                }
                orchestrator.dispatch(id).await?;
            }
        }
    }

    Ok(orchestrator.join(id).await?)
}

fn resolve_credentials(args: &RunArgs, cfg: &AppConfig) -> Credentials {
    let pick = |flag: &Option<String>, configured: &str| {
        let key = flag
            .clone()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| configured.to_string());
        if key.trim().is_empty() && args.dry_run {
            DRY_RUN_KEY.to_string()
        } else {
            key
        }
    };
    Credentials::new(
        pick(&args.gemini_key, &cfg.providers.gemini.api_key),
        pick(&args.serp_key, &cfg.providers.serp.api_key),
    )
}

fn spinner() -> ProgressBar {
    if !atty::is(atty::Stream::Stderr) {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed}] {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

pub fn progress_message(status: &TaskStatus) -> String {
    let mut msg = status.stage_label.clone();
    if status.state == TaskState::MediaGenerating {
        let p = &status.progress;
        msg.push_str(&format!(
            " (images {}/{}, audio {}/{})",
            p.images.done, p.images.total, p.audio.done, p.audio.total
        ));
    }
    if !status.degraded.is_empty() {
        msg.push_str(&format!(", {} placeholder(s)", status.degraded.len()));
    }
    msg
}

fn finish(status: &TaskStatus) -> Result<i32, CliError> {
    match status.state {
        TaskState::Completed => {
            for d in &status.degraded {
                eprintln!(
                    "warning: {} segment {} used a placeholder after {} attempts: {}",
                    d.media, d.index, d.attempts, d.error
                );
            }
            match &status.result_ref {
                Some(path) => println!("{}", path.display()),
                None => println!("task {} completed", status.id),
            }
            Ok(0)
        }
        TaskState::Cancelled => {
            eprintln!("task {} cancelled", status.id);
            Ok(EXIT_CANCELLED)
        }
        _ => {
            let kind = status.error_kind.unwrap_or(ErrorKind::Internal);
            let summary = status
                .error_summary
                .clone()
                .unwrap_or_else(|| format!("task ended in state {}", status.state));
            Err(CliError::Pipeline(TaskError::new(kind, summary)))
        }
    }
}
