//! Transfer-State Tracker (C9): a persistent, append-in-place journal under
//! `<state_dir>/transfers/`, one file per in-flight or recently completed
//! move (spec §4.8, §6.3). Every write is atomic (write-temp-then-rename)
//! via `tempfile::NamedTempFile::persist`, mirroring the teacher's
//! begin/commit/rollback transactional discipline applied to the
//! filesystem instead of SQL.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Started,
    Completed,
    Failed,
}

/// One per in-flight or recently completed Move (spec §3 TransferRecord).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub move_id: i64,
    pub source_path: String,
    pub dest_path: String,
    pub size_bytes: u64,
    pub started_at: DateTime<Utc>,
    pub status: RecordStatus,
    pub error: Option<String>,
}

fn transfers_dir(state_dir: &str) -> PathBuf {
    Path::new(state_dir).join("transfers")
}

fn record_path(state_dir: &str, move_id: i64) -> PathBuf {
    transfers_dir(state_dir).join(format!("move-{move_id}.rec"))
}

/// Atomically write (or overwrite) a record: the journal is the system's
/// durability boundary — no move is considered started until this flushes.
fn write_record(state_dir: &str, record: &TransferRecord) -> Result<()> {
    let dir = transfers_dir(state_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating transfer state dir {}", dir.display()))?;

    let json = serde_json::to_vec_pretty(record).context("serializing transfer record")?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .context("creating temp file for transfer record")?;
    std::io::Write::write_all(&mut tmp, &json).context("writing transfer record")?;
    tmp.flush().context("flushing transfer record")?;

    let dest = record_path(state_dir, record.move_id);
    tmp.persist(&dest)
        .map_err(|e| anyhow::anyhow!("persisting transfer record {}: {}", dest.display(), e.error))?;

    Ok(())
}

/// Record that a move has started. Must be called (and flushed) before the
/// external tool is spawned.
pub(crate) fn record_started(
    state_dir: &str,
    move_id: i64,
    source_path: &str,
    dest_path: &str,
    size_bytes: u64,
) -> Result<()> {
    write_record(
        state_dir,
        &TransferRecord {
            move_id,
            source_path: source_path.to_string(),
            dest_path: dest_path.to_string(),
            size_bytes,
            started_at: Utc::now(),
            status: RecordStatus::Started,
            error: None,
        },
    )
}

/// Update an existing record's terminal status. No-op if the record was
/// never written (defensive — should not happen in practice).
pub(crate) fn record_finished(
    state_dir: &str,
    move_id: i64,
    status: RecordStatus,
    error: Option<String>,
) -> Result<()> {
    let path = record_path(state_dir, move_id);
    let Some(mut record) = read_record(&path)? else {
        return Ok(());
    };
    record.status = status;
    record.error = error;

    // Completed records are retained briefly for crash-recovery diagnostics,
    // then purged by `purge_completed` on a later startup.
    write_record(state_dir, &record)
}

/// Remove a record outright (used after a successfully verified move is
/// fully reconciled and no longer needs to be retained).
pub(crate) fn remove_record(state_dir: &str, move_id: i64) -> Result<()> {
    let path = record_path(state_dir, move_id);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing transfer record {}", path.display())),
    }
}

fn read_record(path: &Path) -> Result<Option<TransferRecord>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let record = serde_json::from_slice(&bytes)
                .with_context(|| format!("transfer record {} is corrupt", path.display()))?;
            Ok(Some(record))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading transfer record {}", path.display())),
    }
}

/// Load every record whose terminal status is not `Completed` — the
/// recovery input on startup (spec §4.8 step 1).
pub fn load_unterminated(state_dir: &str) -> Result<Vec<TransferRecord>> {
    let dir = transfers_dir(state_dir);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for entry in std::fs::read_dir(&dir)
        .with_context(|| format!("reading transfer state dir {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.path().extension().is_some_and(|ext| ext == "rec") {
            continue;
        }
        if let Some(record) = read_record(&entry.path())? {
            if record.status != RecordStatus::Completed {
                records.push(record);
            }
        }
    }

    records.sort_by_key(|r| r.move_id);
    Ok(records)
}

/// Outcome of probing an orphaned record's filesystem state (spec §4.8
/// step 2): the destination exists but nothing currently owns the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanVerdict {
    /// Destination exists, source gone: the move actually completed before
    /// the crash; the catalog just never heard about it.
    CompletedUnrecorded,
    /// Both exist: a partial copy is sitting at the destination. Safe to
    /// rerun — atomic-move mode's underlying tool resumes/overwrites.
    PartialRerun,
    /// Neither exists: the record is stale (never started) or the unit was
    /// already removed by a previous successful run; safe to drop.
    Stale,
    /// Source remains, destination absent: never actually started copying.
    NotStarted,
}

/// Classify one unterminated record against the current filesystem state.
pub fn classify_orphan(record: &TransferRecord) -> OrphanVerdict {
    let source_exists = Path::new(&record.source_path).exists();
    let dest_exists = Path::new(&record.dest_path).exists();

    match (source_exists, dest_exists) {
        (false, true) => OrphanVerdict::CompletedUnrecorded,
        (true, true) => OrphanVerdict::PartialRerun,
        (false, false) => OrphanVerdict::Stale,
        (true, false) => OrphanVerdict::NotStarted,
    }
}

/// Purge completed records older than `retention` (spec §4.8 step 4).
pub fn purge_completed(state_dir: &str, retention: chrono::Duration) -> Result<usize> {
    let dir = transfers_dir(state_dir);
    if !dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - retention;
    let mut purged = 0usize;

    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if !entry.path().extension().is_some_and(|ext| ext == "rec") {
            continue;
        }
        if let Some(record) = read_record(&entry.path())? {
            if record.status == RecordStatus::Completed && record.started_at < cutoff {
                std::fs::remove_file(entry.path())?;
                purged += 1;
            }
        }
    }

    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_started_record() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().to_str().unwrap();

        record_started(state_dir, 1, "/mnt/disk1/a", "/mnt/disk2/a", 1024).unwrap();

        let pending = load_unterminated(state_dir).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].move_id, 1);
        assert_eq!(pending[0].status, RecordStatus::Started);
    }

    #[test]
    fn completed_records_are_excluded_from_unterminated() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().to_str().unwrap();

        record_started(state_dir, 1, "/mnt/disk1/a", "/mnt/disk2/a", 1024).unwrap();
        record_finished(state_dir, 1, RecordStatus::Completed, None).unwrap();

        assert!(load_unterminated(state_dir).unwrap().is_empty());
    }

    #[test]
    fn classifies_orphans_by_filesystem_state() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");

        let record = TransferRecord {
            move_id: 1,
            source_path: src.to_str().unwrap().to_string(),
            dest_path: dst.to_str().unwrap().to_string(),
            size_bytes: 0,
            started_at: Utc::now(),
            status: RecordStatus::Started,
            error: None,
        };

        assert_eq!(classify_orphan(&record), OrphanVerdict::Stale);

        std::fs::write(&src, b"x").unwrap();
        assert_eq!(classify_orphan(&record), OrphanVerdict::NotStarted);

        std::fs::write(&dst, b"x").unwrap();
        assert_eq!(classify_orphan(&record), OrphanVerdict::PartialRerun);

        std::fs::remove_file(&src).unwrap();
        assert_eq!(classify_orphan(&record), OrphanVerdict::CompletedUnrecorded);
    }

    #[test]
    fn purge_removes_only_old_completed_records() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().to_str().unwrap();

        record_started(state_dir, 1, "/a", "/b", 0).unwrap();
        record_finished(state_dir, 1, RecordStatus::Completed, None).unwrap();

        // Not yet past retention: nothing purged.
        let purged = purge_completed(state_dir, chrono::Duration::hours(1)).unwrap();
        assert_eq!(purged, 0);

        // A negative retention window treats every record as expired.
        let purged = purge_completed(state_dir, chrono::Duration::seconds(-1)).unwrap();
        assert_eq!(purged, 1);
    }
}
