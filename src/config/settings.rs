use super::defaults::{
    AUTO_TARGET_SENTINEL, DEFAULT_CONFIG_PATH, DEFAULT_DB_PATH, DEFAULT_DISK_NAME_PATTERN,
    DEFAULT_HEADROOM_PERCENT, DEFAULT_MIN_UNIT_SIZE, DEFAULT_MOUNT_PREFIX,
    DEFAULT_PER_MOVE_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_RESERVE_BYTES, DEFAULT_SCAN_THREADS,
    DEFAULT_STATE_DIR, DEFAULT_UNIT_DEPTH,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Unit-selection strategy for the planner (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Largest units first, on each source, regardless of which source.
    Size,
    /// Shed from the most-pressured (least free space) source disks first.
    LowSpaceFirst,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Size
    }
}

impl Strategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::LowSpaceFirst => "low_space_first",
        }
    }
}

/// Performance profile selecting the copy tool's flag set (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Fast,
    Balanced,
    Integrity,
}

impl Default for Profile {
    fn default() -> Self {
        Self::Balanced
    }
}

impl Profile {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Integrity => "integrity",
        }
    }
}

/// Glob/name based exclusion filters shared by the scanner and planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Excludes {
    pub include_disks: HashSet<String>,
    pub exclude_disks: HashSet<String>,
    pub include_shares: HashSet<String>,
    pub exclude_shares: HashSet<String>,
    pub exclude_globs: Vec<String>,
}

/// Every component takes what it needs from this record; no component
/// reaches into a process-wide store (spec §9 design note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Explicit target fill percentage, or the auto-balance sentinel (< 0).
    pub target_percent: f64,
    /// Headroom percentage used when auto-balancing.
    pub headroom_percent: f64,
    pub strategy: Strategy,
    pub profile: Profile,
    /// Path components below a share root that define a unit's root.
    pub unit_depth: usize,
    /// Minimum allocation-unit size eligible for planning.
    pub min_unit_size: u64,
    pub excludes: Excludes,
    /// Directory holding the transfer-state journal (spec §6.3).
    pub state_dir: String,
    /// Base path under which data disks are mounted.
    pub mount_prefix: String,
    /// Regex a directory name under `mount_prefix` must match to be a data disk.
    pub disk_name_pattern: String,
    /// Fixed safety reserve applied per destination disk.
    pub reserve_bytes: u64,
    /// Soft per-move timeout before the subprocess is terminated and retried.
    pub per_move_timeout: Duration,
    /// Extra flags appended verbatim to the copy tool invocation.
    pub rsync_extra: String,
    /// Name of the copy tool executable (defaults to `rsync`).
    pub copy_tool: String,
}

impl CoreConfig {
    pub const fn is_auto_target(&self) -> bool {
        self.target_percent < 0.0
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            target_percent: AUTO_TARGET_SENTINEL,
            headroom_percent: DEFAULT_HEADROOM_PERCENT,
            strategy: Strategy::default(),
            profile: Profile::default(),
            unit_depth: DEFAULT_UNIT_DEPTH,
            min_unit_size: DEFAULT_MIN_UNIT_SIZE,
            excludes: Excludes::default(),
            state_dir: DEFAULT_STATE_DIR.to_string(),
            mount_prefix: DEFAULT_MOUNT_PREFIX.to_string(),
            disk_name_pattern: DEFAULT_DISK_NAME_PATTERN.to_string(),
            reserve_bytes: DEFAULT_RESERVE_BYTES,
            per_move_timeout: Duration::from_secs(DEFAULT_PER_MOVE_TIMEOUT_SECS),
            rsync_extra: String::new(),
            copy_tool: "rsync".to_string(),
        }
    }
}

/// Daemon-only ambient settings (HTTP port, catalog location, file layout).
/// Wraps a `CoreConfig` the way the teacher's `AppConfig` wrapped its own
/// balance parameters — the daemon binary's process-wide settings object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: String,
    pub config_path: String,
    pub scan_threads: usize,
    #[serde(flatten)]
    pub core: CoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: DEFAULT_DB_PATH.to_string(),
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            scan_threads: DEFAULT_SCAN_THREADS,
            core: CoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration, merging defaults with config file values and env overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("REBAL_CONFIG_PATH") {
            config.config_path = path;
        }
        if let Ok(path) = std::env::var("REBAL_DB_PATH") {
            config.db_path = path;
        }
        if let Ok(port) = std::env::var("REBAL_PORT") {
            config.port = port.parse().context("REBAL_PORT must be a valid port number")?;
        }
        if let Ok(base) = std::env::var("REBAL_MOUNT_PREFIX") {
            config.core.mount_prefix = base;
        }

        let cfg_path = Path::new(&config.config_path);
        if cfg_path.exists() {
            let contents = fs::read_to_string(cfg_path)
                .with_context(|| format!("Failed to read config file: {}", config.config_path))?;
            config.merge_toml(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config.config_path)
            })?;
        }

        config.validate()?;
        Ok(config)
    }
}
