use crate::db::{Database, MoveStatus};
use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

/// Stats returned by partial file cleanup.
pub struct CleanupStats {
    pub completed: usize,
    pub cleaned: usize,
    pub data_loss: usize,
}

/// Examine the filesystem state for each recovered move and take corrective action.
///
/// Decision matrix (based on `--remove-source-files` semantics):
///
/// | Source | Target | Action                                                  |
/// |--------|--------|---------------------------------------------------------|
/// | exists | exists | Delete target (partial), leave move as Pending          |
/// | exists | absent | No action, move stays Pending                           |
/// | absent | exists | rsync completed successfully — mark Completed           |
/// | absent | absent | Data loss — mark Failed                                 |
pub async fn cleanup_partial_files(
    db: &Database,
    recovered_move_ids: &[i64],
) -> Result<CleanupStats> {
    if recovered_move_ids.is_empty() {
        return Ok(CleanupStats { completed: 0, cleaned: 0, data_loss: 0 });
    }

    let move_infos = db.get_moves_path_info(recovered_move_ids)?;

    let mut completed = 0usize;
    let mut cleaned = 0usize;
    let mut data_loss = 0usize;

    for m in &move_infos {
        let rel = if m.relative_path == "." {
            m.share.clone()
        } else {
            format!("{}/{}", m.share, m.relative_path)
        };
        let source = format!("{}/{}", m.src_mount, rel);
        let target = format!("{}/{}", m.dest_mount, rel);

        let source_exists = Path::new(&source).exists();
        let target_exists = Path::new(&target).exists();

        match (source_exists, target_exists) {
            (true, true) => {
                // Target is a partial copy from an interrupted move — an
                // allocation unit may be a single file or a directory
                // subtree, so pick the removal call that matches.
                let is_dir = tokio::fs::metadata(&target).await.map(|m| m.is_dir()).unwrap_or(false);
                let result = if is_dir {
                    tokio::fs::remove_dir_all(&target).await
                } else {
                    tokio::fs::remove_file(&target).await
                };
                if let Err(e) = result {
                    warn!(
                        "Failed to remove partial target {} for move {}: {}",
                        target, m.id, e
                    );
                } else {
                    info!("Removed partial target: {}", target);
                    cleaned += 1;
                }
                // Move stays Planned (already reset by reset_in_flight_moves)
            }
            (true, false) => {
                // No partial file to clean up, move stays Pending
            }
            (false, true) => {
                // rsync completed the transfer (source was removed after verified copy)
                // but the daemon crashed before updating the DB
                db.update_move_status(m.id, MoveStatus::Completed, None)?;
                info!(
                    "Move {} recovered as completed (source gone, target present): {}",
                    m.id, rel
                );
                completed += 1;
            }
            (false, false) => {
                // Both source and target are gone — data loss
                db.update_move_status(
                    m.id,
                    MoveStatus::Failed,
                    Some("Data loss: source and target both missing after crash"),
                )?;
                warn!(
                    "Move {} data loss (both source and target missing): {}",
                    m.id, rel
                );
                data_loss += 1;
            }
        }
    }

    if completed > 0 || cleaned > 0 || data_loss > 0 {
        info!(
            "Partial file cleanup: {} recovered as completed, {} partial files removed, {} data loss",
            completed, cleaned, data_loss
        );
    }

    Ok(CleanupStats { completed, cleaned, data_loss })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MoveRow, MoveStatus};

    fn seeded_move(dir: &std::path::Path) -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().unwrap();

        let src_mount = dir.join("disk1");
        let dest_mount = dir.join("disk2");
        std::fs::create_dir_all(src_mount.join("media")).unwrap();
        std::fs::create_dir_all(dest_mount.join("media")).unwrap();

        let src_id = db
            .upsert_disk("disk1", src_mount.to_str().unwrap(), 1000, 500, 500)
            .unwrap();
        let dest_id = db
            .upsert_disk("disk2", dest_mount.to_str().unwrap(), 1000, 100, 900)
            .unwrap();
        let plan_id = db.create_plan(80.0, 0.0, "size", "balanced", 40.0).unwrap();
        db.insert_planned_moves(&[MoveRow {
            id: 0,
            plan_id,
            unit_id: 1,
            src_disk_id: src_id,
            dest_disk_id: dest_id,
            share: "media".to_string(),
            relative_path: "movie".to_string(),
            size_bytes: 1024,
            move_order: 0,
            status: MoveStatus::InFlight,
            error_message: None,
        }])
        .unwrap();

        let move_id = db.get_plan_moves(plan_id).unwrap()[0].move_info.id;
        db.update_move_status(move_id, MoveStatus::InFlight, None).unwrap();
        (db, move_id)
    }

    #[tokio::test]
    async fn source_and_target_both_present_removes_partial_target_and_stays_pending() {
        let dir = tempfile::tempdir().unwrap();
        let (db, move_id) = seeded_move(dir.path());
        let info = &db.get_moves_path_info(&[move_id]).unwrap()[0];
        std::fs::write(format!("{}/media/movie", info.src_mount), b"x").unwrap();
        std::fs::write(format!("{}/media/movie", info.dest_mount), b"partial").unwrap();

        let stats = cleanup_partial_files(&db, &[move_id]).await.unwrap();

        assert_eq!(stats.cleaned, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.data_loss, 0);
        assert!(!Path::new(&format!("{}/media/movie", info.dest_mount)).exists());
    }

    #[tokio::test]
    async fn source_present_target_absent_leaves_move_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (db, move_id) = seeded_move(dir.path());
        let info = &db.get_moves_path_info(&[move_id]).unwrap()[0];
        std::fs::write(format!("{}/media/movie", info.src_mount), b"x").unwrap();

        let stats = cleanup_partial_files(&db, &[move_id]).await.unwrap();

        assert_eq!(stats.cleaned, 0);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.data_loss, 0);
    }

    #[tokio::test]
    async fn source_absent_target_present_is_marked_completed() {
        let dir = tempfile::tempdir().unwrap();
        let (db, move_id) = seeded_move(dir.path());
        let info = &db.get_moves_path_info(&[move_id]).unwrap()[0];
        std::fs::write(format!("{}/media/movie", info.dest_mount), b"x").unwrap();

        let stats = cleanup_partial_files(&db, &[move_id]).await.unwrap();

        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cleaned, 0);
        assert_eq!(stats.data_loss, 0);
    }

    #[tokio::test]
    async fn source_and_target_both_absent_is_data_loss() {
        let dir = tempfile::tempdir().unwrap();
        let (db, move_id) = seeded_move(dir.path());

        let stats = cleanup_partial_files(&db, &[move_id]).await.unwrap();

        assert_eq!(stats.data_loss, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.cleaned, 0);
    }
}
