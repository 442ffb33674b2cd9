use super::models::{MovePathInfo, MoveRow, MoveRowDetail, MoveStatus};
use super::Database;
use anyhow::Result;
use rusqlite::params;

/// Map a row from the moves JOIN query into a `MoveRowDetail`.
fn map_move_detail_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MoveRowDetail> {
    let status_str: String = row.get(9)?;
    let status = MoveStatus::try_from(status_str.as_str())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::from(e)))?;
    Ok(MoveRowDetail {
        move_info: MoveRow {
            id: row.get(0)?,
            plan_id: row.get(1)?,
            unit_id: row.get(2)?,
            src_disk_id: row.get(3)?,
            dest_disk_id: row.get(4)?,
            share: row.get(5)?,
            relative_path: row.get(6)?,
            size_bytes: row.get::<_, i64>(7)? as u64,
            move_order: row.get(8)?,
            status,
            error_message: row.get(10)?,
        },
        src_disk_name: row.get(11)?,
        dest_disk_name: row.get(12)?,
    })
}

impl Database {
    /// Insert a batch of planned moves within a single transaction.
    pub fn insert_planned_moves(&self, moves: &[MoveRow]) -> Result<()> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO moves \
                 (plan_id, unit_id, src_disk_id, dest_disk_id, share, relative_path, \
                 size_bytes, move_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;

            for m in moves {
                stmt.execute(params![
                    m.plan_id,
                    m.unit_id,
                    m.src_disk_id,
                    m.dest_disk_id,
                    m.share,
                    m.relative_path,
                    m.size_bytes as i64,
                    m.move_order,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get all moves for a plan, ordered by execution order.
    pub fn get_plan_moves(&self, plan_id: i64) -> Result<Vec<MoveRowDetail>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.plan_id, m.unit_id, m.src_disk_id, m.dest_disk_id,
                    m.share, m.relative_path, m.size_bytes, m.move_order, m.status, \
             m.error_message,
                    s.disk_name AS src_disk_name, t.disk_name AS dest_disk_name
             FROM moves m
             JOIN disks s ON m.src_disk_id = s.id
             JOIN disks t ON m.dest_disk_id = t.id
             WHERE m.plan_id = ?1
             ORDER BY m.move_order",
        )?;

        let moves = stmt
            .query_map(params![plan_id], map_move_detail_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(moves)
    }

    /// Update the status of a specific move.
    pub fn update_move_status(
        &self,
        move_id: i64,
        status: MoveStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE moves SET status = ?1, error_message = ?2 WHERE id = ?3",
            params![status.as_str(), error_message, move_id],
        )?;
        Ok(())
    }

    /// Get all moves still planned for a plan, in order.
    pub fn get_pending_moves(&self, plan_id: i64) -> Result<Vec<MoveRowDetail>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.plan_id, m.unit_id, m.src_disk_id, m.dest_disk_id,
                    m.share, m.relative_path, m.size_bytes, m.move_order, m.status, \
             m.error_message,
                    s.disk_name AS src_disk_name, t.disk_name AS dest_disk_name
             FROM moves m
             JOIN disks s ON m.src_disk_id = s.id
             JOIN disks t ON m.dest_disk_id = t.id
             WHERE m.plan_id = ?1 AND m.status = 'planned'
             ORDER BY m.move_order",
        )?;

        let moves = stmt
            .query_map(params![plan_id], map_move_detail_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(moves)
    }

    /// Get lightweight path info for a set of move IDs (used by crash recovery).
    pub fn get_moves_path_info(&self, ids: &[i64]) -> Result<Vec<MovePathInfo>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let placeholders: String = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT m.id, m.share, m.relative_path, s.mount_path, t.mount_path \
             FROM moves m \
             JOIN disks s ON m.src_disk_id = s.id \
             JOIN disks t ON m.dest_disk_id = t.id \
             WHERE m.id IN ({placeholders})"
        );

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::types::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

        let moves = stmt
            .query_map(params.as_slice(), |row| {
                Ok(MovePathInfo {
                    id: row.get(0)?,
                    share: row.get(1)?,
                    relative_path: row.get(2)?,
                    src_mount: row.get(3)?,
                    dest_mount: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(moves)
    }

    /// Mark all in-flight moves for a plan as failed (used by the panic guard).
    pub fn fail_in_flight_moves(&self, plan_id: i64) -> Result<usize> {
        let conn = self.conn();
        let count = conn.execute(
            "UPDATE moves SET status = 'failed', error_message = 'Task panicked' \
             WHERE plan_id = ?1 AND status = 'in_flight'",
            params![plan_id],
        )?;
        Ok(count)
    }

    /// Reset every in-flight move back to `planned`, returning their ids.
    /// Called once at daemon startup: a previous run's crash can leave moves
    /// stuck in `in_flight`; the transfer-state journal (C9) then decides,
    /// from filesystem state, whether each one actually finished.
    pub fn reset_in_flight_moves(&self) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM moves WHERE status = 'in_flight'")?;
        let ids: Vec<i64> = stmt.query_map([], |row| row.get(0))?.collect::<Result<_, _>>()?;
        drop(stmt);

        conn.execute(
            "UPDATE moves SET status = 'planned' WHERE status = 'in_flight'",
            [],
        )?;

        Ok(ids)
    }
}
