pub(crate) mod classify;
pub mod engine;
pub(crate) mod invoke;
pub(crate) mod profiles;
pub(crate) mod progress;
pub mod recovery;
pub(crate) mod validator;

pub use engine::{execute_plan, ExecutionSummary};

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::info;

/// Cached result of rsync --info=progress2 support check.
static RSYNC_PROGRESS2: OnceLock<bool> = OnceLock::new();

/// Check rsync version to determine if --info=progress2 is supported (>= 3.1.0).
async fn probe_rsync_progress2() -> Result<bool> {
    let output = Command::new("rsync")
        .arg("--version")
        .output()
        .await
        .context("Failed to execute rsync --version")?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let re = Regex::new(r"rsync\s+version\s+(\d+)\.(\d+)\.(\d+)")?;

    if let Some(caps) = re.captures(&stdout) {
        let major: u32 = caps[1].parse()?;
        let minor: u32 = caps[2].parse()?;
        let patch: u32 = caps[3].parse()?;
        info!("rsync version: {major}.{minor}.{patch}");
        Ok(major > 3 || (major == 3 && minor >= 1))
    } else {
        bail!("Could not parse rsync version from output");
    }
}

/// Check if rsync supports --info=progress2 (cached after first call).
pub(crate) async fn rsync_supports_progress2() -> bool {
    if let Some(&cached) = RSYNC_PROGRESS2.get() {
        return cached;
    }
    let result = probe_rsync_progress2().await.unwrap_or(false);
    *RSYNC_PROGRESS2.get_or_init(|| result)
}

