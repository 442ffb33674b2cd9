use crate::api::responses::{ApiResponse, SettingsUpdateRequest};
use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

pub(crate) async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.config.read().await.clone()))
}

pub(crate) async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SettingsUpdateRequest>,
) -> impl IntoResponse {
    let mut config = state.config.read().await.clone();

    if let Some(v) = req.scan_threads {
        config.scan_threads = v;
    }
    if let Some(v) = req.target_percent {
        config.core.target_percent = v;
    }
    if let Some(v) = req.headroom_percent {
        config.core.headroom_percent = v;
    }
    if let Some(v) = req.strategy {
        config.core.strategy = v;
    }
    if let Some(v) = req.profile {
        config.core.profile = v;
    }
    if let Some(v) = req.unit_depth {
        config.core.unit_depth = v;
    }
    if let Some(v) = req.min_unit_size {
        config.core.min_unit_size = v;
    }
    if let Some(v) = req.mount_prefix {
        config.core.mount_prefix = v;
    }
    if let Some(v) = req.disk_name_pattern {
        config.core.disk_name_pattern = v;
    }
    if let Some(v) = req.rsync_extra {
        config.core.rsync_extra = v;
    }
    if let Some(v) = req.copy_tool {
        config.core.copy_tool = v;
    }
    if let Some(v) = req.include_disks {
        config.core.excludes.include_disks = v.into_iter().collect();
    }
    if let Some(v) = req.exclude_disks {
        config.core.excludes.exclude_disks = v.into_iter().collect();
    }
    if let Some(v) = req.include_shares {
        config.core.excludes.include_shares = v.into_iter().collect();
    }
    if let Some(v) = req.exclude_shares {
        config.core.excludes.exclude_shares = v.into_iter().collect();
    }
    if let Some(v) = req.exclude_globs {
        config.core.excludes.exclude_globs = v;
    }

    if let Err(e) = config.validate() {
        return Json(ApiResponse::<&str>::err(format!("Invalid settings: {e}")));
    }

    if let Err(e) = config.save() {
        return Json(ApiResponse::<&str>::err(format!("Failed to save settings: {e}")));
    }

    *state.config.write().await = config;

    Json(ApiResponse::ok("Settings saved and applied"))
}
