//! External-Tool Invoker (C4): builds the final argument vector for one
//! move, spawns the copy tool as a subprocess (never via a shell), and
//! streams its stdout through the progress parser while stderr is
//! captured for the error classifier (spec §4.4, §6.4).

use super::profiles::build_args;
use super::progress::{parse_progress_line, TransferProgress};
use crate::config::Profile;
use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Outcome of running one copy-tool invocation to completion (or being
/// asked to stop early).
pub(crate) enum InvocationOutcome {
    Finished { exit_code: Option<i32>, stderr_tail: String },
    TimedOut,
}

/// Spawn the copy tool for one move and drive it to completion, invoking
/// `on_progress` for every parsed progress line as it arrives (not buffered
/// until exit, so a subscriber sees live updates).
///
/// Cancellation does not reach into an already-running invocation: the
/// engine only consults the cancel token before starting a new move (spec
/// §4.7, §5 — in-flight moves are allowed to complete since they are
/// already atomic). Only a per-move timeout terminates a running subprocess.
pub(crate) async fn run_copy(
    copy_tool: &str,
    profile: Profile,
    extra: &str,
    use_progress2: bool,
    source: &str,
    dest: &str,
    timeout: std::time::Duration,
    on_progress: impl Fn(TransferProgress) + Send + 'static,
) -> Result<InvocationOutcome> {
    let mut args = build_args(profile, extra, use_progress2);
    args.push(source.to_string());
    args.push(dest.to_string());

    let mut child = Command::new(copy_tool)
        .args(&args)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning {copy_tool} {args:?}"))?;

    let stdout = child.stdout.take().context("child stdout was not piped")?;
    let stderr = child.stderr.take().context("child stderr was not piped")?;

    let stdout_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(progress) = parse_progress_line(&line) {
                on_progress(progress);
            }
        }
    });

    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            tail.push_str(&line);
            tail.push('\n');
        }
        tail
    });

    let result = tokio::time::timeout(timeout, child.wait()).await;

    let status = match result {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(e).context("waiting for copy tool"),
        Err(_) => {
            kill(&mut child).await;
            stdout_task.abort();
            let _ = stderr_task.await;
            return Ok(InvocationOutcome::TimedOut);
        }
    };

    let _ = stdout_task.await;
    let stderr_tail = stderr_task.await.unwrap_or_default();

    Ok(InvocationOutcome::Finished { exit_code: status.code(), stderr_tail })
}

async fn kill(child: &mut Child) {
    let _ = child.kill().await;
    let _ = child.wait().await;
}
