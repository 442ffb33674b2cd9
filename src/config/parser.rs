use super::settings::{AppConfig, Excludes, Profile, Strategy};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Mirrors `AppConfig`/`CoreConfig`, but every field is optional so a config
/// file only needs to mention what it overrides. Unlike the teacher's INI
/// parser (which silently ignores unknown keys by matching key-by-key),
/// unknown TOML keys are rejected by `#[serde(deny_unknown_fields)]` — a typo
/// in a config file should fail loudly rather than be silently ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    port: Option<u16>,
    db_path: Option<String>,
    scan_threads: Option<usize>,
    target_percent: Option<f64>,
    headroom_percent: Option<f64>,
    strategy: Option<Strategy>,
    profile: Option<Profile>,
    unit_depth: Option<usize>,
    min_unit_size: Option<u64>,
    state_dir: Option<String>,
    mount_prefix: Option<String>,
    disk_name_pattern: Option<String>,
    reserve_bytes: Option<u64>,
    per_move_timeout_secs: Option<u64>,
    rsync_extra: Option<String>,
    copy_tool: Option<String>,
    #[serde(default)]
    include_disks: Vec<String>,
    #[serde(default)]
    exclude_disks: Vec<String>,
    #[serde(default)]
    include_shares: Vec<String>,
    #[serde(default)]
    exclude_shares: Vec<String>,
    #[serde(default)]
    exclude_globs: Vec<String>,
}

impl AppConfig {
    /// Merge a TOML config file's contents onto this config, overriding only
    /// the fields the file actually sets.
    pub(crate) fn merge_toml(&mut self, contents: &str) -> Result<()> {
        let file: ConfigFile = toml::from_str(contents).context("invalid TOML config")?;

        if let Some(v) = file.port {
            self.port = v;
        }
        if let Some(v) = file.db_path {
            self.db_path = v;
        }
        if let Some(v) = file.scan_threads {
            self.scan_threads = v;
        }
        if let Some(v) = file.target_percent {
            self.core.target_percent = v;
        }
        if let Some(v) = file.headroom_percent {
            self.core.headroom_percent = v;
        }
        if let Some(v) = file.strategy {
            self.core.strategy = v;
        }
        if let Some(v) = file.profile {
            self.core.profile = v;
        }
        if let Some(v) = file.unit_depth {
            self.core.unit_depth = v;
        }
        if let Some(v) = file.min_unit_size {
            self.core.min_unit_size = v;
        }
        if let Some(v) = file.state_dir {
            self.core.state_dir = v;
        }
        if let Some(v) = file.mount_prefix {
            self.core.mount_prefix = v;
        }
        if let Some(v) = file.disk_name_pattern {
            self.core.disk_name_pattern = v;
        }
        if let Some(v) = file.reserve_bytes {
            self.core.reserve_bytes = v;
        }
        if let Some(v) = file.per_move_timeout_secs {
            self.core.per_move_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.rsync_extra {
            self.core.rsync_extra = v;
        }
        if let Some(v) = file.copy_tool {
            self.core.copy_tool = v;
        }
        if !file.include_disks.is_empty() {
            self.core.excludes.include_disks = file.include_disks.into_iter().collect();
        }
        if !file.exclude_disks.is_empty() {
            self.core.excludes.exclude_disks = file.exclude_disks.into_iter().collect();
        }
        if !file.include_shares.is_empty() {
            self.core.excludes.include_shares = file.include_shares.into_iter().collect();
        }
        if !file.exclude_shares.is_empty() {
            self.core.excludes.exclude_shares = file.exclude_shares.into_iter().collect();
        }
        if !file.exclude_globs.is_empty() {
            self.core.excludes.exclude_globs = file.exclude_globs;
        }

        Ok(())
    }

    /// Save current config back to its TOML file.
    pub fn save(&self) -> Result<()> {
        let excludes = &self.core.excludes;
        let contents = format!(
            r#"# Array rebalancer configuration
# Auto-generated — edit via the daemon API or by hand
port = {}
db_path = "{}"
scan_threads = {}
target_percent = {}
headroom_percent = {}
strategy = "{}"
profile = "{}"
unit_depth = {}
min_unit_size = {}
state_dir = "{}"
mount_prefix = "{}"
disk_name_pattern = "{}"
reserve_bytes = {}
per_move_timeout_secs = {}
rsync_extra = "{}"
copy_tool = "{}"
include_disks = {:?}
exclude_disks = {:?}
include_shares = {:?}
exclude_shares = {:?}
exclude_globs = {:?}
"#,
            self.port,
            self.db_path,
            self.scan_threads,
            self.core.target_percent,
            self.core.headroom_percent,
            self.core.strategy.as_str(),
            self.core.profile.as_str(),
            self.core.unit_depth,
            self.core.min_unit_size,
            self.core.state_dir,
            self.core.mount_prefix,
            self.core.disk_name_pattern,
            self.core.reserve_bytes,
            self.core.per_move_timeout.as_secs(),
            self.core.rsync_extra,
            self.core.copy_tool,
            Vec::from_iter(excludes.include_disks.iter()),
            Vec::from_iter(excludes.exclude_disks.iter()),
            Vec::from_iter(excludes.include_shares.iter()),
            Vec::from_iter(excludes.exclude_shares.iter()),
            excludes.exclude_globs,
        );

        if let Some(parent) = Path::new(&self.config_path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.config_path, contents)
            .with_context(|| format!("Failed to write config to {}", self.config_path))?;

        Ok(())
    }
}
