use crate::api::responses::ApiResponse;
use crate::db::PlanStatus;
use crate::executor;
use crate::{AppState, DaemonState, DaemonStatus};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info};

/// Start executing a planned plan's moves as a background task. The actual
/// transfer engine (spec §4.7, §5) publishes its own progress/completion
/// events; this handler only owns the daemon status and panic recovery.
pub(crate) async fn execute_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<i64>,
) -> impl IntoResponse {
    {
        let status = state.status.read().await;
        if status.state != DaemonState::Idle {
            return Json(ApiResponse::<&str>::err(format!(
                "Cannot execute: daemon is currently {:?}",
                status.state
            )));
        }
    }

    match state.db.get_plan(plan_id) {
        Ok(Some(plan)) if plan.status == PlanStatus::Planned => {}
        Ok(Some(plan)) => {
            return Json(ApiResponse::<&str>::err(format!(
                "Plan is in '{}' status, can only execute 'planned' plans",
                plan.status
            )));
        }
        Ok(None) => return Json(ApiResponse::<&str>::err("Plan not found")),
        Err(e) => return Json(ApiResponse::<&str>::err(format!("{e}"))),
    }

    let token = state.new_operation_token().await;
    let config = state.config.read().await.core.clone();

    *state.status.write().await = DaemonStatus::executing("Starting plan execution...");

    let state_clone = state.clone();
    let handle = tokio::spawn(async move {
        let result = AssertUnwindSafe(executor::execute_plan(
            &state_clone.db,
            &config,
            &state_clone.event_hub,
            plan_id,
            token,
        ))
        .catch_unwind()
        .await;

        match result {
            Ok(Ok(summary)) => {
                info!(
                    "Plan {} execution task completed: {} ok, {} failed, {} cancelled",
                    plan_id, summary.completed, summary.failed, summary.cancelled_remaining
                );
            }
            Ok(Err(e)) => {
                error!("Plan {} execution failed: {}", plan_id, e);
                let _ = state_clone
                    .event_hub
                    .publish(crate::events::Event::DaemonError { message: format!("Execution failed: {e}") });
            }
            Err(_) => {
                error!("Plan {} execution panicked!", plan_id);
                let _ = state_clone.db.update_plan_status(plan_id, PlanStatus::Failed);
                let _ = state_clone.db.fail_in_flight_moves(plan_id);
                let _ = state_clone.event_hub.publish(crate::events::Event::DaemonError {
                    message: format!("Execution panicked for plan {plan_id}"),
                });
            }
        }

        // ALWAYS reset to idle — both normal and panic paths
        *state_clone.status.write().await = DaemonStatus::idle();
        *state_clone.background_task.lock().await = None;
    });

    *state.background_task.lock().await = Some(handle);

    Json(ApiResponse::ok("Execution started"))
}

pub(crate) async fn cancel_operation(
    State(state): State<Arc<AppState>>,
    Path(_plan_id): Path<i64>,
) -> impl IntoResponse {
    state.request_cancel().await;
    info!("Cancellation requested");
    Json(ApiResponse::ok("Cancellation requested"))
}
