//! Typed error taxonomy for the parts of the core that other code needs to
//! match on (exit codes, retry decisions). Everything else uses `anyhow`.

use thiserror::Error;

/// No usable disks were discovered, or a disk named in an allow/deny list is
/// missing. Fatal to the run (spec §7).
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no data disks found under {mount_prefix}")]
    NoDisksFound { mount_prefix: String },

    #[error("disk '{name}' was requested but is not present under {mount_prefix}")]
    DiskMissing { name: String, mount_prefix: String },

    #[error("mount base path does not exist: {0}")]
    MountBaseMissing(String),

    #[error("failed to read disk {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Contradictory planning options (e.g. empty include/exclude intersection).
/// Fatal to the run.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("need at least 2 disks to balance, found {0}")]
    TooFewDisks(usize),

    #[error("total disk capacity is zero")]
    ZeroCapacity,

    #[error("include/exclude share filters leave no shares eligible")]
    EmptyShareSelection,

    #[error("include/exclude disk filters leave no disks eligible")]
    EmptyDiskSelection,
}

/// A single move cannot start. The move is failed but the run continues.
#[derive(Debug, Error, Clone)]
pub enum PreValidationError {
    #[error("source path does not exist: {0}")]
    SourceMissing(String),

    #[error("source is neither a directory nor a regular file: {0}")]
    SourceNotMovable(String),

    #[error("cannot create destination parent directory: {0}")]
    DestinationParentUncreatable(String),

    #[error("destination disk has insufficient free space: need {needed} bytes, have {available}")]
    InsufficientDestinationSpace { needed: u64, available: u64 },

    #[error("path escapes configured mount prefix: {0}")]
    PathOutsideMountPrefix(String),

    #[error("source and destination are on the same disk: {0}")]
    SameDisk(String),

    #[error("copy tool executable could not be resolved: {0}")]
    ToolNotResolvable(String),
}

/// The external tool failed. Classified by the error classifier into
/// retryable vs terminal.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("copy tool exited with status {code:?}: {stderr_tail}")]
    ToolFailed { code: Option<i32>, stderr_tail: String },

    #[error("copy tool could not be spawned: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("move timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("move was cancelled")]
    Cancelled,
}

/// The move finished but a post-transfer invariant does not hold. Terminal
/// for that move; the run continues but reports a non-zero exit.
#[derive(Debug, Error, Clone)]
pub enum PostValidationError {
    #[error("destination does not exist after transfer: {0}")]
    DestinationMissing(String),

    #[error("source still exists after an atomic-move transfer: {0}")]
    SourceNotRemoved(String),

    #[error("integrity profile checksum verification failed")]
    ChecksumFailed,

    #[error("destination size {actual} does not match expected unit size {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// The journal cannot be read or written. Fatal: durability is required.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read transfer record {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to durably write transfer record {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer record {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("state directory {0} is not usable")]
    StateDirUnusable(String),
}

/// Every user-facing fatal error carries a short, actionable hint alongside
/// the exit code it maps to (spec §6.1 / §7).
pub trait ActionableHint {
    fn hint(&self) -> String;
}

impl ActionableHint for DiscoveryError {
    fn hint(&self) -> String {
        match self {
            Self::NoDisksFound { mount_prefix } => {
                format!("check that array disks are mounted under {mount_prefix}")
            }
            Self::DiskMissing { name, mount_prefix } => {
                format!("mount {name} under {mount_prefix} or remove it from the disk list")
            }
            Self::MountBaseMissing(path) => format!("create or mount {path} before running"),
            Self::Io { name, .. } => format!("check permissions on disk {name}'s mount point"),
        }
    }
}

impl ActionableHint for PlanningError {
    fn hint(&self) -> String {
        match self {
            Self::TooFewDisks(_) => "include at least 2 disks via --include-disks".to_string(),
            Self::ZeroCapacity => "verify disk sizes were read correctly during scan".to_string(),
            Self::EmptyShareSelection => {
                "loosen --include-shares/--exclude-shares so at least one share remains"
                    .to_string()
            }
            Self::EmptyDiskSelection => {
                "loosen --include-disks/--exclude-disks so at least one disk remains".to_string()
            }
        }
    }
}

impl ActionableHint for PreValidationError {
    fn hint(&self) -> String {
        match self {
            Self::SourceMissing(_) => {
                "rescan before executing; the catalog may be stale".to_string()
            }
            Self::SourceNotMovable(_) => {
                "check for a special file (socket, device) at this path and exclude it".to_string()
            }
            Self::DestinationParentUncreatable(_) => {
                "check permissions on the destination disk".to_string()
            }
            Self::InsufficientDestinationSpace { needed, available } => {
                let short = needed.saturating_sub(*available);
                format!("destination disk short by {short} bytes; free space or lower target")
            }
            Self::PathOutsideMountPrefix(_) => {
                "check --mount-prefix matches where disks are actually mounted".to_string()
            }
            Self::SameDisk(_) => "this move should not have been planned; rerun planning".to_string(),
            Self::ToolNotResolvable(tool) => format!("install {tool} or set --copy-tool to its path"),
        }
    }
}

impl ActionableHint for TransferError {
    fn hint(&self) -> String {
        match self {
            Self::ToolFailed { .. } => "see the copy tool's stderr tail for the underlying cause".to_string(),
            Self::SpawnFailed(_) => "verify the copy tool is installed and executable".to_string(),
            Self::TimedOut(_) => "increase --per-move-timeout or check for a stalled disk".to_string(),
            Self::Cancelled => "resume by rerunning; the journal will pick up where it left off".to_string(),
        }
    }
}

impl ActionableHint for PostValidationError {
    fn hint(&self) -> String {
        match self {
            Self::DestinationMissing(_) => {
                "rerun the move; the copy tool may have failed silently".to_string()
            }
            Self::SourceNotRemoved(_) => {
                "source was not cleared after copy; check for open file handles".to_string()
            }
            Self::ChecksumFailed => {
                "rerun under the integrity profile; the destination copy may be corrupt".to_string()
            }
            Self::SizeMismatch { .. } => {
                "rerun the move; the destination may have been modified concurrently".to_string()
            }
        }
    }
}

impl ActionableHint for StateError {
    fn hint(&self) -> String {
        match self {
            Self::Read { .. } => "check permissions on the state directory".to_string(),
            Self::Write { .. } => "ensure the state directory's filesystem has free space".to_string(),
            Self::Corrupt { .. } => {
                "remove the corrupt record file; the move will be re-validated on next run".to_string()
            }
            Self::StateDirUnusable(_) => {
                "point --state-dir at a writable directory on a durable filesystem".to_string()
            }
        }
    }
}
