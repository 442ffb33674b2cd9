//! Engine/tracker integration: re-running execution after a crash or a
//! clean restart never duplicates a move or loses bytes, and cancellation
//! never leaves the filesystem in a half-applied state.

use crate::config::CoreConfig;
use crate::db::{Database, MoveRow, MoveStatus};
use crate::events::EventHub;
use crate::executor::{execute_plan, recovery};
use crate::tracker;
use tokio_util::sync::CancellationToken;

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

/// Running `execute_plan` a second time against a plan that already
/// finished is a no-op: the planned-only query sees nothing left to do,
/// the file isn't touched again, and nothing is double-counted.
#[tokio::test]
async fn rerunning_a_completed_plan_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let (db, config, plan_id) = seeded_plan(dir.path());
    let event_hub = EventHub::new(16);

    let first = execute_plan(&db, &config, &event_hub, plan_id, CancellationToken::new()).await.unwrap();
    assert_eq!(first.completed, 1);

    let second = execute_plan(&db, &config, &event_hub, plan_id, CancellationToken::new()).await.unwrap();
    assert_eq!(second.completed, 0);
    assert_eq!(second.failed, 0);
    assert_eq!(second.cancelled_remaining, 0);

    assert_eq!(
        std::fs::read(dir.path().join("disk2/media/movie")).unwrap(),
        b"hello world"
    );
}

/// A move caught `in_flight` by a crash, with a partial copy already
/// sitting at the destination: the startup recovery sequence (DB reset +
/// journal-driven partial-target cleanup) must leave exactly one path to
/// resolution — a clean resume that finishes the move exactly once, with
/// no stray partial bytes left over from the crashed attempt.
#[tokio::test]
async fn partial_copy_left_by_a_crash_resumes_cleanly_and_completes_once() {
    let dir = tempfile::tempdir().unwrap();
    let (db, config, plan_id) = seeded_plan(dir.path());
    let moves = db.get_plan_moves(plan_id).unwrap();
    let move_id = moves[0].move_info.id;

    // Simulate a crash mid-move: DB says in_flight, the journal says
    // started, and a half-written file sits at the destination.
    db.update_move_status(move_id, MoveStatus::InFlight, None).unwrap();
    let src = dir.path().join("disk1/media/movie");
    let dest = dir.path().join("disk2/media/movie");
    std::fs::write(&dest, b"hel").unwrap();
    tracker::record_started(&config.state_dir, move_id, src.to_str().unwrap(), dest.to_str().unwrap(), 11)
        .unwrap();

    // Startup recovery, exactly as main.rs / rebalance.rs run it.
    let recovered_ids = db.reset_in_flight_moves().unwrap();
    assert_eq!(recovered_ids, vec![move_id]);
    let stats = recovery::cleanup_partial_files(&db, &recovered_ids).await.unwrap();
    assert_eq!(stats.cleaned, 1);
    assert!(!dest.exists());

    for record in tracker::load_unterminated(&config.state_dir).unwrap() {
        match tracker::classify_orphan(&record) {
            tracker::OrphanVerdict::CompletedUnrecorded | tracker::OrphanVerdict::Stale => {
                let _ = tracker::remove_record(&config.state_dir, record.move_id);
            }
            tracker::OrphanVerdict::PartialRerun | tracker::OrphanVerdict::NotStarted => {}
        }
    }

    // The move is back to `planned`; executing the plan again resumes it
    // as an ordinary move and finishes it exactly once.
    let event_hub = EventHub::new(16);
    let summary = execute_plan(&db, &config, &event_hub, plan_id, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert!(!src.exists());
    assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
}

/// Cancelling before a move's dispatch and then "restarting" (running the
/// plan again with a fresh token) finishes every move exactly once —
/// cancellation defers work, it never corrupts or duplicates it.
#[tokio::test]
async fn cancelled_moves_resume_and_complete_exactly_once_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (db, config, plan_id) = seeded_plan(dir.path());
    let event_hub = EventHub::new(16);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let first = execute_plan(&db, &config, &event_hub, plan_id, cancel).await.unwrap();
    assert_eq!(first.completed, 0);
    assert_eq!(first.cancelled_remaining, 1);
    assert!(dir.path().join("disk1/media/movie").exists());
    assert!(!dir.path().join("disk2/media/movie").exists());

    let second = execute_plan(&db, &config, &event_hub, plan_id, CancellationToken::new()).await.unwrap();
    assert_eq!(second.completed, 1);
    assert!(!dir.path().join("disk1/media/movie").exists());
    assert_eq!(
        std::fs::read(dir.path().join("disk2/media/movie")).unwrap(),
        b"hello world"
    );
}
