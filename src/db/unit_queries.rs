use super::models::{AllocationUnit, UnitInsert};
use super::Database;
use anyhow::Result;
use rusqlite::params;

/// Map a row from the allocation_units table into an `AllocationUnit`.
fn map_unit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AllocationUnit> {
    Ok(AllocationUnit {
        id: row.get(0)?,
        disk_id: row.get(1)?,
        share: row.get(2)?,
        relative_path: row.get(3)?,
        size_bytes: row.get::<_, i64>(4)? as u64,
    })
}

const UNIT_COLUMNS: &str = "id, disk_id, share, relative_path, size_bytes";

impl Database {
    /// Begin a full disk rescan: clear existing units and return a transaction guard.
    /// The caller must call `commit_disk_scan` when done, or the changes are rolled back.
    pub fn begin_disk_scan(&self, disk_id: i64) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        conn.execute("DELETE FROM allocation_units WHERE disk_id = ?1", params![disk_id])?;
        Ok(())
    }

    /// Batch insert allocation units within the current transaction.
    pub fn insert_units_batch(&self, units: &[UnitInsert]) -> Result<()> {
        let conn = self.conn();

        let mut stmt = conn.prepare_cached(
            "INSERT OR REPLACE INTO allocation_units \
             (disk_id, share, relative_path, size_bytes)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for u in units {
            stmt.execute(params![u.disk_id, u.share, u.relative_path, u.size_bytes as i64])?;
        }

        Ok(())
    }

    /// Finalize a disk scan and commit the transaction.
    pub fn commit_disk_scan(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Roll back a disk scan transaction (e.g. on error or cancellation).
    pub fn rollback_disk_scan(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    /// Get all allocation units on a disk, sorted by size descending.
    pub fn get_all_units_on_disk_by_size(&self, disk_id: i64) -> Result<Vec<AllocationUnit>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {UNIT_COLUMNS} FROM allocation_units \
             WHERE disk_id = ?1 \
             ORDER BY size_bytes DESC"
        ))?;

        let units = stmt
            .query_map(params![disk_id], map_unit_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(units)
    }

    /// Get total unit count and bytes for a disk.
    pub fn get_disk_unit_stats(&self, disk_id: i64) -> Result<(u64, u64)> {
        let conn = self.conn();
        let (count, bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) \
             FROM allocation_units WHERE disk_id = ?1",
            params![disk_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((count as u64, bytes as u64))
    }

    /// Look up a single allocation unit by ID.
    pub fn get_unit(&self, unit_id: i64) -> Result<Option<AllocationUnit>> {
        use super::optional_ext::OptionalExt;
        let conn = self.conn();
        let unit = conn
            .query_row(
                &format!("SELECT {UNIT_COLUMNS} FROM allocation_units WHERE id = ?1"),
                params![unit_id],
                map_unit_row,
            )
            .optional()?;
        Ok(unit)
    }
}
