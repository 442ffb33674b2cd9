use super::types::{DiskClass, DiskState, PlanOutcome};
use crate::config::{CoreConfig, Strategy};
use crate::db::{AllocationUnit, Database, Disk, MoveRow, MoveStatus};
use crate::error::PlanningError;
use anyhow::Result;
use tracing::info;

/// Compute the cap (maximum permitted used bytes) for a single disk.
fn compute_cap(disk: &Disk, config: &CoreConfig, uniform_fill: f64) -> u64 {
    if config.is_auto_target() {
        let raw = disk.size_bytes as f64 * (uniform_fill + config.headroom_percent / 100.0);
        let ceiling = disk.size_bytes.saturating_sub(config.reserve_bytes) as f64;
        raw.clamp(0.0, ceiling) as u64
    } else {
        (disk.size_bytes as f64 * config.target_percent / 100.0) as u64
    }
}

/// Generate a rebalance plan for the currently included, cataloged disks.
///
/// Returns an empty plan with a "balanced" diagnostic when no disk exceeds
/// its cap, and a partial plan with an "under-served" diagnostic when some
/// source disk cannot fully shed within the available destination capacity.
pub fn generate_plan(db: &Database, config: &CoreConfig) -> Result<PlanOutcome> {
    let disks = db.get_included_disks()?;

    if disks.len() < 2 {
        return Err(PlanningError::TooFewDisks(disks.len()).into());
    }

    let total_used: u64 = disks.iter().map(|d| d.used_bytes).sum();
    let total_size: u64 = disks.iter().map(|d| d.size_bytes).sum();

    if total_size == 0 {
        return Err(PlanningError::ZeroCapacity.into());
    }

    let uniform_fill = total_used as f64 / total_size as f64;

    let mut disk_states: Vec<DiskState> = disks
        .into_iter()
        .map(|disk| {
            let cap = compute_cap(&disk, config, uniform_fill);
            let class = if disk.used_bytes > cap {
                DiskClass::Source
            } else if (disk.used_bytes as i64) < cap as i64 - config.reserve_bytes as i64 {
                DiskClass::Destination
            } else {
                DiskClass::Neutral
            };
            DiskState { sim_used: disk.used_bytes, cap, class, disk }
        })
        .collect();

    let initial_imbalance =
        disk_states.iter().map(|ds| ds.over_cap_by()).max().unwrap_or(0) as f64;

    let plan_id = db.create_plan(
        config.target_percent,
        config.headroom_percent,
        config.strategy.as_str(),
        config.profile.as_str(),
        initial_imbalance,
    )?;

    let has_source = disk_states.iter().any(|ds| ds.class == DiskClass::Source);

    if !has_source {
        info!("Array is already balanced within target");
        db.update_plan_totals(plan_id, 0, 0)?;
        db.set_plan_diagnostic(plan_id, "balanced")?;
        return Ok(PlanOutcome {
            plan_id,
            target_percent: config.target_percent,
            initial_imbalance,
            total_moves: 0,
            total_bytes: 0,
            diagnostic: "balanced".to_string(),
        });
    }

    let mut source_order: Vec<usize> = disk_states
        .iter()
        .enumerate()
        .filter(|(_, ds)| ds.class == DiskClass::Source)
        .map(|(i, _)| i)
        .collect();

    match config.strategy {
        Strategy::Size => source_order.sort_by(|&a, &b| disk_states[a].disk.disk_name.cmp(&disk_states[b].disk.disk_name)),
        Strategy::LowSpaceFirst => source_order.sort_by(|&a, &b| {
            disk_states[a]
                .sim_free()
                .cmp(&disk_states[b].sim_free())
                .then_with(|| disk_states[a].disk.disk_name.cmp(&disk_states[b].disk.disk_name))
        }),
    }

    let mut planned_moves: Vec<MoveRow> = Vec::new();
    let mut total_bytes_to_move: u64 = 0;
    let mut move_order: i32 = 0;
    let mut under_served: Vec<String> = Vec::new();

    for &src_idx in &source_order {
        let src_disk_id = disk_states[src_idx].disk.id;
        let units = db.get_all_units_on_disk_by_size(src_disk_id)?;

        let mut candidates: Vec<AllocationUnit> = units;
        candidates.sort_by(|a, b| {
            b.size_bytes
                .cmp(&a.size_bytes)
                .then_with(|| (&a.share, &a.relative_path).cmp(&(&b.share, &b.relative_path)))
        });

        for unit in &candidates {
            if disk_states[src_idx].sim_used <= disk_states[src_idx].cap {
                break;
            }

            let Some(dest_idx) =
                find_best_destination(&disk_states, src_idx, unit.size_bytes, config.reserve_bytes)
            else {
                continue;
            };

            move_order += 1;
            let dest_disk_id = disk_states[dest_idx].disk.id;

            planned_moves.push(MoveRow {
                id: 0,
                plan_id,
                unit_id: unit.id,
                src_disk_id,
                dest_disk_id,
                share: unit.share.clone(),
                relative_path: unit.relative_path.clone(),
                size_bytes: unit.size_bytes,
                move_order,
                status: MoveStatus::Planned,
                error_message: None,
            });

            disk_states[src_idx].sim_used =
                disk_states[src_idx].sim_used.saturating_sub(unit.size_bytes);
            disk_states[dest_idx].sim_used += unit.size_bytes;
            total_bytes_to_move += unit.size_bytes;
        }

        if disk_states[src_idx].sim_used > disk_states[src_idx].cap {
            under_served.push(disk_states[src_idx].disk.disk_name.clone());
        }
    }

    if !planned_moves.is_empty() {
        db.insert_planned_moves(&planned_moves)?;
    }

    db.update_plan_totals(plan_id, planned_moves.len() as i32, total_bytes_to_move)?;

    let diagnostic = if under_served.is_empty() {
        "complete".to_string()
    } else {
        format!("under-served: {}", under_served.join(", "))
    };
    db.set_plan_diagnostic(plan_id, &diagnostic)?;

    info!(
        "Plan {} generated: {} moves, {} bytes, diagnostic={}",
        plan_id,
        planned_moves.len(),
        total_bytes_to_move,
        diagnostic
    );

    Ok(PlanOutcome {
        plan_id,
        target_percent: config.target_percent,
        initial_imbalance,
        total_moves: planned_moves.len(),
        total_bytes: total_bytes_to_move,
        diagnostic,
    })
}

/// Scan destinations in descending remaining-capacity order and return the
/// first that can hold `size_bytes`, honoring the per-destination reserve.
/// Ties are broken by disk name ascending.
fn find_best_destination(
    disk_states: &[DiskState],
    src_idx: usize,
    size_bytes: u64,
    reserve_bytes: u64,
) -> Option<usize> {
    let mut ranked: Vec<usize> =
        (0..disk_states.len()).filter(|&i| i != src_idx).collect();

    ranked.sort_by(|&a, &b| {
        disk_states[b]
            .remaining_capacity(reserve_bytes)
            .cmp(&disk_states[a].remaining_capacity(reserve_bytes))
            .then_with(|| disk_states[a].disk.disk_name.cmp(&disk_states[b].disk.disk_name))
    });

    ranked.into_iter().find(|&i| disk_states[i].remaining_capacity(reserve_bytes) >= size_bytes as i64)
}
