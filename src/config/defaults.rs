/// Default path for the daemon's TOML config file.
pub(super) const DEFAULT_CONFIG_PATH: &str = "/etc/array-rebalancer/config.toml";

/// Default path for the SQLite catalog database.
pub(super) const DEFAULT_DB_PATH: &str = "/var/lib/array-rebalancer/catalog.db";

/// Default directory for the transfer-state journal (spec §6.3).
pub(super) const DEFAULT_STATE_DIR: &str = "/var/lib/array-rebalancer/state";

/// Default port the daemon listens on (localhost only).
pub(super) const DEFAULT_PORT: u16 = 7090;

/// Default number of parallel scan threads.
pub(super) const DEFAULT_SCAN_THREADS: usize = 2;

/// Auto-balance sentinel for `target_percent` (spec §4.3).
pub(super) const AUTO_TARGET_SENTINEL: f64 = -1.0;

/// Default headroom percentage used with auto-balance.
pub(super) const DEFAULT_HEADROOM_PERCENT: f64 = 5.0;

/// The documented 1-GiB safety reserve floor applied per destination disk.
pub(super) const DEFAULT_RESERVE_BYTES: u64 = 1_073_741_824;

/// Default allocation-unit depth (0 = whole share per disk).
pub(super) const DEFAULT_UNIT_DEPTH: usize = 1;

/// Default minimum allocation-unit size eligible for planning (1 MiB).
pub(super) const DEFAULT_MIN_UNIT_SIZE: u64 = 1_048_576;

/// The base path where array disks are mounted.
pub(super) const DEFAULT_MOUNT_PREFIX: &str = "/mnt";

/// Default pattern data disks must match under the mount prefix.
pub(super) const DEFAULT_DISK_NAME_PATTERN: &str = r"^disk\d+$";

/// Default soft per-move timeout (spec §5): 6 hours.
pub(super) const DEFAULT_PER_MOVE_TIMEOUT_SECS: u64 = 6 * 60 * 60;
