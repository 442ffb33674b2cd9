use crate::api::responses::{ApiResponse, PlanRequest, PlanSummary};
use crate::balancer;
use crate::db::PlanRow;
use crate::{AppState, DaemonState, DaemonStatus};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

fn to_summary(plan: PlanRow, moves: Vec<crate::db::MoveRowDetail>) -> PlanSummary {
    PlanSummary {
        id: plan.id,
        created_at: plan.created_at,
        target_percent: plan.target_percent,
        headroom_percent: plan.headroom_percent,
        strategy: plan.strategy,
        profile: plan.profile,
        initial_imbalance: plan.initial_imbalance,
        total_moves: plan.total_moves,
        total_bytes_to_move: plan.total_bytes_to_move,
        status: plan.status,
        diagnostic: plan.diagnostic,
        moves,
    }
}

/// Generate a rebalance plan for the currently cataloged disks, overriding
/// the running config's target/headroom/strategy/profile with any fields the
/// request sets (spec §6.1's CLI flags, offered over HTTP instead).
pub(crate) async fn handle_generate_plan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlanRequest>,
) -> impl IntoResponse {
    {
        let status = state.status.read().await;
        if status.state != DaemonState::Idle {
            return Json(ApiResponse::<PlanSummary>::err(format!(
                "Cannot generate plan: daemon is currently {:?}",
                status.state
            )));
        }
    }

    let mut config = state.config.read().await.clone();
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

    *state.status.write().await = DaemonStatus::planning();

    let result = balancer::generate_plan(&state.db, &config.core);

    *state.status.write().await = DaemonStatus::idle();

    match result {
        Ok(outcome) => {
            let _ = state.event_hub.publish(crate::events::Event::PlanReady {
                plan_id: outcome.plan_id,
                total_moves: outcome.total_moves as u32,
                total_bytes: outcome.total_bytes,
                diagnostic: outcome.diagnostic.clone(),
            });

            let moves = state.db.get_plan_moves(outcome.plan_id).unwrap_or_default();
            let plan = match state.db.get_plan(outcome.plan_id) {
                Ok(Some(p)) => p,
                Ok(None) => {
                    return Json(ApiResponse::<PlanSummary>::err("Plan vanished after creation"));
                }
                Err(e) => return Json(ApiResponse::<PlanSummary>::err(format!("{e}"))),
            };

            Json(ApiResponse::ok(to_summary(plan, moves)))
        }
        Err(e) => Json(ApiResponse::<PlanSummary>::err(format!("Planning failed: {e}"))),
    }
}

pub(crate) async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<i64>,
) -> impl IntoResponse {
    let plan = match state.db.get_plan(plan_id) {
        Ok(Some(p)) => p,
        Ok(None) => return Json(ApiResponse::<PlanSummary>::err("Plan not found")),
        Err(e) => return Json(ApiResponse::<PlanSummary>::err(format!("{e}"))),
    };

    let moves = state.db.get_plan_moves(plan_id).unwrap_or_default();

    Json(ApiResponse::ok(to_summary(plan, moves)))
}
