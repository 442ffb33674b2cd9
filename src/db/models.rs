use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a physical data disk in the array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disk {
    pub id: i64,
    pub disk_name: String,
    pub mount_path: String,
    pub size_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub included: bool,
    pub updated_at: Option<String>,
}

impl Disk {
    /// Current fill percentage as a fraction (0.0 - 1.0).
    pub fn fill_percent(&self) -> f64 {
        if self.size_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.size_bytes as f64
    }
}

/// A discovered allocation unit — `(share, relative_path)` on one disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationUnit {
    pub id: i64,
    pub disk_id: i64,
    pub share: String,
    pub relative_path: String,
    pub size_bytes: u64,
}

impl AllocationUnit {
    /// The path relative to the disk's mount, e.g. `movies/Foo (2020)`.
    pub fn share_relative_path(&self) -> String {
        if self.relative_path.is_empty() || self.relative_path == "." {
            self.share.clone()
        } else {
            format!("{}/{}", self.share, self.relative_path)
        }
    }
}

/// Status of a rebalance plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Planned,
    Executing,
    Completed,
    Cancelled,
    Failed,
}

impl PlanStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for PlanStatus {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "planned" => Ok(Self::Planned),
            "executing" => Ok(Self::Executing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid plan status: {s}")),
        }
    }
}

/// Status of a single planned move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveStatus {
    Planned,
    InFlight,
    Completed,
    Failed,
    Aborted,
}

impl MoveStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InFlight => "in_flight",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MoveStatus {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "planned" => Ok(Self::Planned),
            "in_flight" => Ok(Self::InFlight),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "aborted" => Ok(Self::Aborted),
            _ => Err(format!("invalid move status: {s}")),
        }
    }
}

/// A rebalance plan that groups a set of planned moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRow {
    pub id: i64,
    pub created_at: Option<String>,
    pub target_percent: f64,
    pub headroom_percent: f64,
    pub strategy: String,
    pub profile: String,
    pub initial_imbalance: Option<f64>,
    pub total_moves: i32,
    pub total_bytes_to_move: u64,
    pub status: PlanStatus,
    pub diagnostic: Option<String>,
}

/// A single unit move within a rebalance plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRow {
    pub id: i64,
    pub plan_id: i64,
    pub unit_id: i64,
    pub src_disk_id: i64,
    pub dest_disk_id: i64,
    pub share: String,
    pub relative_path: String,
    pub size_bytes: u64,
    pub move_order: i32,
    pub status: MoveStatus,
    pub error_message: Option<String>,
}

/// A move with additional context for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRowDetail {
    #[serde(flatten)]
    pub move_info: MoveRow,
    pub src_disk_name: String,
    pub dest_disk_name: String,
}

/// Lightweight path info used by crash recovery.
#[derive(Debug, Clone)]
pub struct MovePathInfo {
    pub id: i64,
    pub share: String,
    pub relative_path: String,
    pub src_mount: String,
    pub dest_mount: String,
}

/// Insert batch for the unit builder — one row per discovered unit.
#[derive(Debug, Clone)]
pub struct UnitInsert {
    pub disk_id: i64,
    pub share: String,
    pub relative_path: String,
    pub size_bytes: u64,
}
