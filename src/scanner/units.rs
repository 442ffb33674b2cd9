use crate::config::Excludes;
use anyhow::{Context, Result};
use glob::Pattern;
use jwalk::WalkDir;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A discovered allocation unit, sized and ready for the planner.
#[derive(Debug, Clone)]
pub struct Unit {
    pub disk_name: String,
    pub share: String,
    pub relative_path: String,
    pub size_bytes: u64,
}

/// Walk every share under `mount_path` to `unit_depth` components, size each
/// candidate, and return the units that pass the include/exclude and
/// minimum-size filters. Output is sorted by `(share, relative_path)` so that
/// plans built from it are reproducible.
pub fn build_units(
    disk_name: &str,
    mount_path: &str,
    unit_depth: usize,
    min_unit_size: u64,
    excludes: &Excludes,
) -> Result<Vec<Unit>> {
    let mount = Path::new(mount_path);
    let globs: Vec<Pattern> = excludes
        .exclude_globs
        .iter()
        .filter_map(|g| match Pattern::new(g) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("ignoring invalid exclude glob '{g}': {e}");
                None
            }
        })
        .collect();

    let mut units = Vec::new();

    let entries = std::fs::read_dir(mount)
        .with_context(|| format!("reading shares under {mount_path}"))?;

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let share = entry.file_name().to_string_lossy().to_string();

        if !excludes.include_shares.is_empty() && !excludes.include_shares.contains(&share) {
            continue;
        }
        if excludes.exclude_shares.contains(&share) {
            continue;
        }

        let share_root = entry.path();
        let candidates = collect_depth_roots(&share_root, unit_depth);

        for root in candidates {
            let relative_path = root
                .strip_prefix(&share_root)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();
            let relative_path = if relative_path.is_empty() { ".".to_string() } else { relative_path };

            let probe = if relative_path == "." {
                share.clone()
            } else {
                format!("{share}/{relative_path}")
            };
            if globs.iter().any(|g| g.matches(&probe)) {
                continue;
            }

            let size_bytes = size_of_subtree(&root);
            if size_bytes < min_unit_size {
                continue;
            }

            units.push(Unit {
                disk_name: disk_name.to_string(),
                share: share.clone(),
                relative_path,
                size_bytes,
            });
        }
    }

    units.sort_by(|a, b| (&a.share, &a.relative_path).cmp(&(&b.share, &b.relative_path)));

    Ok(units)
}

/// Descend exactly `remaining_depth` directory levels from `dir`, returning
/// every directory found at that depth. A directory with no subdirectories
/// before reaching the target depth is returned as-is (it cannot be split
/// further).
fn collect_depth_roots(dir: &Path, remaining_depth: usize) -> Vec<PathBuf> {
    if remaining_depth == 0 {
        return vec![dir.to_path_buf()];
    }

    let subdirs: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.path())
            .collect(),
        Err(e) => {
            warn!("cannot read {}: {}", dir.display(), e);
            Vec::new()
        }
    };

    if subdirs.is_empty() {
        return vec![dir.to_path_buf()];
    }

    subdirs.into_iter().flat_map(|d| collect_depth_roots(&d, remaining_depth - 1)).collect()
}

/// Sum the sizes of every regular file in `root`'s subtree. Symlinks are not
/// followed and contribute nothing; broken symlinks are logged and ignored.
fn size_of_subtree(root: &Path) -> u64 {
    let mut total = 0u64;

    for entry in WalkDir::new(root).skip_hidden(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("error walking {}: {}", root.display(), e);
                continue;
            }
        };

        let path = entry.path();
        let symlink_meta = match std::fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!("cannot stat {}: {}", path.display(), e);
                continue;
            }
        };

        if symlink_meta.file_type().is_symlink() {
            if std::fs::metadata(&path).is_err() {
                warn!("ignoring broken symlink: {}", path.display());
            }
            continue;
        }

        if symlink_meta.is_file() {
            total += symlink_meta.len();
        }
    }

    total
}
