use crate::config::{Profile, Strategy};
use crate::db::{MoveRowDetail, PlanStatus};
use serde::{Deserialize, Serialize};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) const fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub(crate) fn err(msg: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(msg.into()) }
    }
}

/// Request body for POST /api/scan. An empty body scans every included disk
/// with the configured thread count.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScanRequest {
    pub threads: Option<usize>,
    pub disk_ids: Option<Vec<i64>>,
}

/// Request body for POST /api/plan. Unset fields fall back to the running
/// `CoreConfig` (spec §6.1's CLI flags, offered over HTTP instead).
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PlanRequest {
    pub target_percent: Option<f64>,
    pub headroom_percent: Option<f64>,
    pub strategy: Option<Strategy>,
    pub profile: Option<Profile>,
}

/// Request body for POST /api/settings. Unset fields leave the current
/// setting untouched.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SettingsUpdateRequest {
    pub scan_threads: Option<usize>,
    pub target_percent: Option<f64>,
    pub headroom_percent: Option<f64>,
    pub strategy: Option<Strategy>,
    pub profile: Option<Profile>,
    pub unit_depth: Option<usize>,
    pub min_unit_size: Option<u64>,
    pub mount_prefix: Option<String>,
    pub disk_name_pattern: Option<String>,
    pub rsync_extra: Option<String>,
    pub copy_tool: Option<String>,
    pub include_disks: Option<Vec<String>>,
    pub exclude_disks: Option<Vec<String>>,
    pub include_shares: Option<Vec<String>>,
    pub exclude_shares: Option<Vec<String>>,
    pub exclude_globs: Option<Vec<String>>,
}

/// Scan/plan/execute progress summary returned by the status endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    pub state: crate::DaemonState,
    pub detail: Option<String>,
    pub version: String,
}

/// Plan summary for responses, flattening `PlanRow` with its moves.
#[derive(Debug, Serialize)]
pub(crate) struct PlanSummary {
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
    pub moves: Vec<MoveRowDetail>,
}
