//! Transfer Engine (C8): sequences moves, holds the move-in-flight state,
//! drives retries, and updates in-memory disk accounting (spec §4.7, §5).
//!
//! Concurrency model: no disk participates in more than one concurrent
//! move (as either source or destination) — the active set of moves forms
//! a matching on the disk graph (spec §5). This is enforced with one
//! `tokio::sync::Mutex<()>` per disk, always acquired in ascending disk-id
//! order to avoid deadlock between two moves that share a disk pair in
//! opposite roles. Worker concurrency is additionally bounded by
//! `floor(disks / 2)` via `for_each_concurrent`.

use super::classify::{self, Category};
use super::invoke::{run_copy, InvocationOutcome};
use super::validator::{post_validate, pre_validate, PostCheckInput, PreCheckInput};
use crate::config::CoreConfig;
use crate::db::{Database, MoveRowDetail, MoveStatus, PlanStatus};
use crate::events::{Event, EventHub};
use crate::tracker;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Retry policy for recoverable failures (spec §4.6): exponential backoff
/// starting at 2s, multiplier 2, capped at 60s, 3 attempts per move.
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: std::time::Duration = std::time::Duration::from_secs(2);
const BACKOFF_MULTIPLIER: u32 = 2;
const BACKOFF_CAP: std::time::Duration = std::time::Duration::from_secs(60);

/// In-memory disk usage table (spec §5): the only shared mutable state
/// besides the journal, guarded by one mutex, updated only by workers on
/// successful completion of a move.
struct DiskTable {
    usage: std::sync::Mutex<HashMap<i64, (u64, u64)>>, // disk_id -> (used, size)
}

impl DiskTable {
    fn apply_move(&self, src: i64, dest: i64, size: u64) {
        let mut table = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = table.get_mut(&src) {
            entry.0 = entry.0.saturating_sub(size);
        }
        if let Some(entry) = table.get_mut(&dest) {
            entry.0 += size;
        }
    }

    fn snapshot(&self, disk_id: i64) -> Option<(u64, u64)> {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).get(&disk_id).copied()
    }
}

pub struct ExecutionSummary {
    pub completed: u32,
    pub failed: u32,
    pub cancelled_remaining: u32,
    pub duration_seconds: f64,
}

struct EngineCtx<'a> {
    db: &'a Database,
    config: &'a CoreConfig,
    event_hub: &'a EventHub,
    cancel: CancellationToken,
    disk_locks: HashMap<i64, Arc<AsyncMutex<()>>>,
    disk_table: DiskTable,
    disk_names: HashMap<i64, String>,
    disk_mounts: HashMap<i64, String>,
    completed: AtomicU32,
    failed: AtomicU32,
}

/// Execute every planned move of `plan_id` to completion or cancellation.
pub async fn execute_plan(
    db: &Database,
    config: &CoreConfig,
    event_hub: &EventHub,
    plan_id: i64,
    cancel: CancellationToken,
) -> Result<ExecutionSummary> {
    let start = std::time::Instant::now();

    let disks = db.get_all_disks()?;
    let mut disk_locks = HashMap::new();
    let mut usage = HashMap::new();
    let mut disk_names = HashMap::new();
    let mut disk_mounts = HashMap::new();
    for d in &disks {
        disk_locks.insert(d.id, Arc::new(AsyncMutex::new(())));
        usage.insert(d.id, (d.used_bytes, d.size_bytes));
        disk_names.insert(d.id, d.disk_name.clone());
        disk_mounts.insert(d.id, d.mount_path.clone());
    }

    let pool_size = (disks.len() / 2).max(1);

    let ctx = Arc::new(EngineCtx {
        db,
        config,
        event_hub,
        cancel: cancel.clone(),
        disk_locks,
        disk_table: DiskTable { usage: std::sync::Mutex::new(usage) },
        disk_names,
        disk_mounts,
        completed: AtomicU32::new(0),
        failed: AtomicU32::new(0),
    });

    db.update_plan_status(plan_id, PlanStatus::Executing)?;

    let moves = db.get_pending_moves(plan_id)?;
    let total = moves.len();

    stream::iter(moves.into_iter())
        .for_each_concurrent(pool_size, |m| {
            let ctx = ctx.clone();
            async move {
                if ctx.cancel.is_cancelled() {
                    return;
                }
                process_move(&ctx, &m).await;
            }
        })
        .await;

    let completed = ctx.completed.load(Ordering::SeqCst);
    let failed = ctx.failed.load(Ordering::SeqCst);
    let cancelled_remaining = (total as u32).saturating_sub(completed + failed);

    let final_status =
        if cancel.is_cancelled() { PlanStatus::Cancelled } else { PlanStatus::Completed };
    db.update_plan_status(plan_id, final_status)?;

    for (disk_id, (used, _size)) in ctx.disk_table.usage.lock().unwrap_or_else(|e| e.into_inner()).iter() {
        if let Some(size) = ctx.disk_table.snapshot(*disk_id).map(|(_, s)| s) {
            db.update_disk_used_bytes(*disk_id, *used, size.saturating_sub(*used))?;
        }
    }

    let duration_seconds = start.elapsed().as_secs_f64();

    let _ = event_hub.publish(Event::ExecutionComplete {
        plan_id,
        moves_completed: completed,
        moves_failed: failed,
        moves_aborted: cancelled_remaining,
        duration_seconds,
    });

    info!(
        "Plan {} execution finished: {} completed, {} failed, {} cancelled, {:.1}s",
        plan_id, completed, failed, cancelled_remaining, duration_seconds
    );

    Ok(ExecutionSummary { completed, failed, cancelled_remaining, duration_seconds })
}

/// Recursively remove directories left completely empty, bottom-up.
/// A directory that still contains a file is left in place.
fn prune_empty_dirs(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            prune_empty_dirs(&path);
        }
    }
    let _ = std::fs::remove_dir(dir);
}

fn move_paths(ctx: &EngineCtx<'_>, m: &MoveRowDetail) -> (String, String) {
    let info = &m.move_info;
    let rel = if info.relative_path == "." {
        info.share.clone()
    } else {
        format!("{}/{}", info.share, info.relative_path)
    };
    let src_mount = ctx.disk_mounts.get(&info.src_disk_id).cloned().unwrap_or_default();
    let dest_mount = ctx.disk_mounts.get(&info.dest_disk_id).cloned().unwrap_or_default();
    (format!("{src_mount}/{rel}"), format!("{dest_mount}/{rel}"))
}

async fn process_move(ctx: &Arc<EngineCtx<'_>>, m: &MoveRowDetail) {
    let info = &m.move_info;
    let (src_id, dest_id) = (info.src_disk_id, info.dest_disk_id);

    // Acquire both disks' locks in ascending id order so a move A->B and a
    // concurrent move B->A can never deadlock on each other's locks.
    let (first_id, second_id) = if src_id < dest_id { (src_id, dest_id) } else { (dest_id, src_id) };
    let Some(first_lock) = ctx.disk_locks.get(&first_id).cloned() else {
        mark_failed(ctx, info.id, "unknown disk in move").await;
        return;
    };
    let Some(second_lock) = ctx.disk_locks.get(&second_id).cloned() else {
        mark_failed(ctx, info.id, "unknown disk in move").await;
        return;
    };

    let _first_guard = first_lock.lock().await;
    let _second_guard = second_lock.lock().await;

    if ctx.cancel.is_cancelled() {
        return;
    }

    let (source_path, dest_path) = move_paths(ctx, m);

    if let Err(e) = ctx.db.update_move_status(info.id, MoveStatus::InFlight, None) {
        error!("failed to record in-flight status for move {}: {}", info.id, e);
        return;
    }

    if let Err(e) = tracker::record_started(
        &ctx.config.state_dir,
        info.id,
        &source_path,
        &dest_path,
        info.size_bytes,
    ) {
        error!("failed to write transfer journal for move {}: {:#}", info.id, e);
        mark_failed(ctx, info.id, "journal write failed").await;
        return;
    }

    let dest_free = ctx
        .disk_table
        .snapshot(dest_id)
        .map(|(used, size)| size.saturating_sub(used))
        .unwrap_or(0);

    let pre = pre_validate(&PreCheckInput {
        source_path: &source_path,
        dest_path: &dest_path,
        dest_free_bytes: dest_free,
        unit_size_bytes: info.size_bytes,
        mount_prefix: &ctx.config.mount_prefix,
        src_disk_name: ctx.disk_names.get(&src_id).map_or("", String::as_str),
        dest_disk_name: ctx.disk_names.get(&dest_id).map_or("", String::as_str),
        copy_tool: &ctx.config.copy_tool,
    });

    if let Err(e) = pre {
        warn!("pre-validation failed for move {}: {}", info.id, e);
        mark_failed(ctx, info.id, &e.to_string()).await;
        let _ = tracker::record_finished(
            &ctx.config.state_dir,
            info.id,
            tracker::RecordStatus::Failed,
            Some(e.to_string()),
        );
        return;
    }

    // Per-move we always use the engine's current configured profile (rather than
    // whatever was recorded on the plan) so a config reload between planning and
    // execution takes effect.
    let profile = ctx.config.profile;

    let mut attempt = 0u32;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        attempt += 1;

        let event_hub = ctx.event_hub.clone();
        let move_id = info.id;
        let rel_path = dest_path.clone();
        let on_progress = move |p: super::progress::TransferProgress| {
            let _ = event_hub.publish(Event::MoveProgress {
                move_id,
                relative_path: rel_path.clone(),
                bytes_done: p.bytes_done,
                bytes_total: p.bytes_total,
                rate_bytes_per_sec: p.rate_bytes_per_sec,
                eta_seconds: p.eta_seconds,
            });
        };

        let outcome = run_copy(
            &ctx.config.copy_tool,
            profile,
            &ctx.config.rsync_extra,
            true,
            &source_path,
            &dest_path,
            ctx.config.per_move_timeout,
            on_progress,
        )
        .await;

        let (exit_code, stderr_tail, verdict) = match outcome {
            Ok(InvocationOutcome::Finished { exit_code, stderr_tail }) => {
                let verdict = classify::classify(exit_code, &stderr_tail);
                (exit_code, stderr_tail, verdict)
            }
            Ok(InvocationOutcome::TimedOut) => {
                (None, "move timed out".to_string(), classify::classify_timeout())
            }
            Err(e) => {
                error!("move {} failed to spawn copy tool: {:#}", info.id, e);
                mark_failed(ctx, info.id, &e.to_string()).await;
                let _ = tracker::record_finished(
                    &ctx.config.state_dir,
                    info.id,
                    tracker::RecordStatus::Failed,
                    Some(e.to_string()),
                );
                return;
            }
        };

        if verdict.category == Category::Success {
            // --remove-source-files only removes files, never the directory
            // skeleton a unit's subtree leaves behind. Prune directories left
            // completely empty so "source no longer exists" holds for
            // directory-shaped units; a directory with a genuine leftover
            // file is left alone and still fails the check below.
            if Path::new(&source_path).is_dir() {
                prune_empty_dirs(Path::new(&source_path));
            }

            let post = post_validate(&PostCheckInput {
                source_path: &source_path,
                dest_path: &dest_path,
                expected_size_bytes: info.size_bytes,
                profile,
                tool_exit_success: true,
            });

            match post {
                Ok(()) => {
                    ctx.disk_table.apply_move(src_id, dest_id, info.size_bytes);
                    let _ = ctx.db.update_move_status(info.id, MoveStatus::Completed, None);
                    let _ = tracker::record_finished(
                        &ctx.config.state_dir,
                        info.id,
                        tracker::RecordStatus::Completed,
                        None,
                    );
                    ctx.completed.fetch_add(1, Ordering::SeqCst);
                    let _ = ctx.event_hub.publish(Event::MoveComplete {
                        move_id: info.id,
                        status: "completed".to_string(),
                        error: None,
                    });
                    return;
                }
                Err(e) => {
                    warn!("post-validation failed for move {}: {}", info.id, e);
                    mark_failed(ctx, info.id, &e.to_string()).await;
                    let _ = tracker::record_finished(
                        &ctx.config.state_dir,
                        info.id,
                        tracker::RecordStatus::Failed,
                        Some(e.to_string()),
                    );
                    return;
                }
            }
        }

        if verdict.recoverable && attempt < MAX_ATTEMPTS {
            warn!(
                "move {} failed (attempt {}/{}), retrying in {:?}: {}",
                info.id, attempt, MAX_ATTEMPTS, backoff, stderr_tail.trim()
            );
            tokio::time::sleep(backoff).await;
            backoff = (backoff * BACKOFF_MULTIPLIER).min(BACKOFF_CAP);
            continue;
        }

        let message = if stderr_tail.trim().is_empty() {
            format!("copy tool exited with {exit_code:?}")
        } else {
            stderr_tail.trim().to_string()
        };
        mark_failed(ctx, info.id, &message).await;
        let _ = tracker::record_finished(
            &ctx.config.state_dir,
            info.id,
            tracker::RecordStatus::Failed,
            Some(message),
        );
        return;
    }
}

async fn mark_failed(ctx: &Arc<EngineCtx<'_>>, move_id: i64, message: &str) {
    let _ = ctx.db.update_move_status(move_id, MoveStatus::Failed, Some(message));
    ctx.failed.fetch_add(1, Ordering::SeqCst);
    let _ = ctx.event_hub.publish(Event::MoveComplete {
        move_id,
        status: "failed".to_string(),
        error: Some(message.to_string()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::db::{Database, MoveRow, PlanStatus};

    /// Two disks under one mount prefix, one source file seeded under
    /// `disk1/media/movie`, one pending move from `disk1` to `disk2`.
    /// Returns the tempdir (kept alive for the test's duration), the db,
    /// the config, and the plan id.
    fn seeded_plan(dir: &std::path::Path) -> (Database, CoreConfig, i64) {
        let src_mount = dir.join("disk1");
        let dest_mount = dir.join("disk2");
        std::fs::create_dir_all(src_mount.join("media")).unwrap();
        std::fs::create_dir_all(dest_mount.join("media")).unwrap();
        std::fs::write(src_mount.join("media/movie"), b"hello world").unwrap();

        let db = Database::open_in_memory().unwrap();
        db.run_migrations().unwrap();
        let src_id = db.upsert_disk("disk1", src_mount.to_str().unwrap(), 1_000_000, 500_000, 500_000).unwrap();
        let dest_id = db.upsert_disk("disk2", dest_mount.to_str().unwrap(), 1_000_000, 0, 1_000_000).unwrap();

        let plan_id = db.create_plan(80.0, 0.0, "size", "balanced", 50.0).unwrap();
        db.insert_planned_moves(&[MoveRow {
            id: 0,
            plan_id,
            unit_id: 1,
            src_disk_id: src_id,
            dest_disk_id: dest_id,
            share: "media".to_string(),
            relative_path: "movie".to_string(),
            size_bytes: 11,
            move_order: 0,
            status: MoveStatus::Planned,
            error_message: None,
        }])
        .unwrap();

        let mut config = CoreConfig::default();
        config.mount_prefix = dir.to_str().unwrap().to_string();
        config.state_dir = dir.join("state").to_str().unwrap().to_string();
        std::fs::create_dir_all(&config.state_dir).unwrap();
        config.reserve_bytes = 1;
        config.per_move_timeout = std::time::Duration::from_secs(30);

        (db, config, plan_id)
    }

    #[tokio::test]
    async fn successful_move_updates_db_and_moves_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let (db, config, plan_id) = seeded_plan(dir.path());
        let event_hub = EventHub::new(16);

        let summary =
            execute_plan(&db, &config, &event_hub, plan_id, CancellationToken::new()).await.unwrap();

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 0);
        assert!(!dir.path().join("disk1/media/movie").exists());
        assert_eq!(
            std::fs::read(dir.path().join("disk2/media/movie")).unwrap(),
            b"hello world"
        );

        let moves = db.get_plan_moves(plan_id).unwrap();
        assert_eq!(moves[0].move_info.status, MoveStatus::Completed);
        assert_eq!(db.get_plan(plan_id).unwrap().unwrap().status, PlanStatus::Completed);
    }

    #[tokio::test]
    async fn missing_source_fails_the_move_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let (db, config, plan_id) = seeded_plan(dir.path());
        std::fs::remove_file(dir.path().join("disk1/media/movie")).unwrap();
        let event_hub = EventHub::new(16);

        let summary =
            execute_plan(&db, &config, &event_hub, plan_id, CancellationToken::new()).await.unwrap();

        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 1);
        let moves = db.get_plan_moves(plan_id).unwrap();
        assert_eq!(moves[0].move_info.status, MoveStatus::Failed);
    }

    #[tokio::test]
    async fn cancelling_before_dispatch_leaves_the_move_pending() {
        let dir = tempfile::tempdir().unwrap();
        let (db, config, plan_id) = seeded_plan(dir.path());
        let event_hub = EventHub::new(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = execute_plan(&db, &config, &event_hub, plan_id, cancel).await.unwrap();

        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.cancelled_remaining, 1);
        // The source file is untouched: cancellation only gates new dispatch,
        // it never reverts or half-applies a move that never started.
        assert!(dir.path().join("disk1/media/movie").exists());
        let moves = db.get_plan_moves(plan_id).unwrap();
        assert_eq!(moves[0].move_info.status, MoveStatus::Planned);
        assert_eq!(db.get_plan(plan_id).unwrap().unwrap().status, PlanStatus::Cancelled);
    }

    #[tokio::test]
    async fn directory_shaped_unit_leaves_no_empty_source_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let src_mount = dir.path().join("disk1");
        let dest_mount = dir.path().join("disk2");
        std::fs::create_dir_all(src_mount.join("media/show/season1")).unwrap();
        std::fs::create_dir_all(dest_mount.join("media")).unwrap();
        std::fs::write(src_mount.join("media/show/season1/episode.mkv"), b"abcde").unwrap();

        let db = Database::open_in_memory().unwrap();
        db.run_migrations().unwrap();
        let src_id = db.upsert_disk("disk1", src_mount.to_str().unwrap(), 1_000_000, 500_000, 500_000).unwrap();
        let dest_id = db.upsert_disk("disk2", dest_mount.to_str().unwrap(), 1_000_000, 0, 1_000_000).unwrap();
        let plan_id = db.create_plan(80.0, 0.0, "size", "balanced", 50.0).unwrap();
        db.insert_planned_moves(&[MoveRow {
            id: 0,
            plan_id,
            unit_id: 1,
            src_disk_id: src_id,
            dest_disk_id: dest_id,
            share: "media".to_string(),
            relative_path: "show".to_string(),
            size_bytes: 5,
            move_order: 0,
            status: MoveStatus::Planned,
            error_message: None,
        }])
        .unwrap();

        let mut config = CoreConfig::default();
        config.mount_prefix = dir.path().to_str().unwrap().to_string();
        config.state_dir = dir.path().join("state").to_str().unwrap().to_string();
        std::fs::create_dir_all(&config.state_dir).unwrap();
        config.reserve_bytes = 1;
        config.per_move_timeout = std::time::Duration::from_secs(30);

        let event_hub = EventHub::new(16);
        let summary =
            execute_plan(&db, &config, &event_hub, plan_id, CancellationToken::new()).await.unwrap();

        assert_eq!(summary.completed, 1);
        assert!(!src_mount.join("media/show").exists());
        assert_eq!(
            std::fs::read(dest_mount.join("media/show/season1/episode.mkv")).unwrap(),
            b"abcde"
        );
    }
}
