use crate::api::responses::{ApiResponse, ScanRequest};
use crate::scanner::{self, ScanContext};
use crate::{AppState, DaemonState, DaemonStatus};
use axum::{extract::State, response::IntoResponse, Json};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Kick off a scan of every discovered (and non-excluded) disk as a
/// background task and return immediately; progress streams over
/// `/api/events` and final counts arrive as `Event::ScanComplete`. Runs on a
/// blocking thread since disk discovery and the unit walk are synchronous
/// filesystem work.
pub(crate) async fn start_scan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScanRequest>,
) -> impl IntoResponse {
    {
        let status = state.status.read().await;
        if status.state != DaemonState::Idle {
            return Json(ApiResponse::<&str>::err(format!(
                "Cannot start scan: daemon is currently {:?}",
                status.state
            )));
        }
    }

    let config = state.config.read().await.clone();
    let token = state.new_operation_token().await;
    *state.status.write().await = DaemonStatus::scanning("Discovering disks...");

    let state_clone = state.clone();
    let handle = tokio::task::spawn_blocking(move || {
        let rt = tokio::runtime::Handle::current();

        let result =
            std::panic::catch_unwind(AssertUnwindSafe(|| run_scan(&rt, &state_clone, &config.core, req.disk_ids.as_deref(), &token)));

        if result.is_err() {
            error!("Scan task panicked");
            let _ = state_clone
                .event_hub
                .publish(crate::events::Event::DaemonError { message: "Scan task panicked".to_string() });
        }

        rt.block_on(async {
            *state_clone.status.write().await = DaemonStatus::idle();
            *state_clone.background_task.lock().await = None;
        });
    });

    *state.background_task.lock().await = Some(handle);

    Json(ApiResponse::ok("Scan started"))
}

fn run_scan(
    rt: &tokio::runtime::Handle,
    state: &Arc<AppState>,
    config: &crate::config::CoreConfig,
    disk_ids: Option<&[i64]>,
    cancel: &CancellationToken,
) {
    let start = std::time::Instant::now();

    let discovered =
        match scanner::discover_disks(&config.mount_prefix, &config.disk_name_pattern, &config.excludes)
        {
            Ok(d) => d,
            Err(e) => {
                error!("Disk discovery failed: {}", e);
                let _ = state
                    .event_hub
                    .publish(crate::events::Event::DaemonError { message: format!("{e}") });
                return;
            }
        };

    info!("Discovered {} disks", discovered.len());

    let mut total_units = 0u64;
    let mut total_bytes = 0u64;

    for disk in &discovered {
        if cancel.is_cancelled() {
            info!("Scan cancelled by user");
            break;
        }

        let space = match scanner::get_disk_space(&disk.mount_path) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to get disk space for {}: {}", disk.name, e);
                continue;
            }
        };

        let disk_id =
            match state.db.upsert_disk(&disk.name, &disk.mount_path, space.total, space.used, space.free)
            {
                Ok(id) => id,
                Err(e) => {
                    error!("Failed to upsert disk {}: {}", disk.name, e);
                    continue;
                }
            };

        if let Some(ids) = disk_ids {
            if !ids.contains(&disk_id) {
                continue;
            }
        }

        rt.block_on(async {
            *state.status.write().await = DaemonStatus::scanning(format!("Scanning {}...", disk.name));
        });

        let ctx = ScanContext {
            db: &state.db,
            disk_id,
            disk_name: &disk.name,
            mount_path: &disk.mount_path,
            mount_prefix: &config.mount_prefix,
            unit_depth: config.unit_depth,
            min_unit_size: config.min_unit_size,
            excludes: &config.excludes,
            event_hub: &state.event_hub,
            cancel: cancel.clone(),
        };

        match scanner::scan_disk(&ctx) {
            Ok(stats) => {
                total_units += stats.units_found;
                total_bytes += stats.bytes_cataloged;
            }
            Err(e) => error!("Scan failed for {}: {}", disk.name, e),
        }
    }

    let duration_seconds = start.elapsed().as_secs_f64();

    let _ = state.event_hub.publish(crate::events::Event::ScanComplete {
        total_disks: discovered.len() as u32,
        total_units,
        total_bytes,
        duration_seconds,
    });

    info!(
        "Full scan complete: {} disks, {} units, {} bytes in {:.1}s",
        discovered.len(),
        total_units,
        total_bytes,
        duration_seconds
    );
}
