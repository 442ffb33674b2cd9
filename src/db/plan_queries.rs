use super::models::{PlanRow, PlanStatus};
use super::optional_ext::OptionalExt;
use super::Database;
use anyhow::Result;
use rusqlite::params;

impl Database {
    /// Create a new rebalance plan.
    pub fn create_plan(
        &self,
        target_percent: f64,
        headroom_percent: f64,
        strategy: &str,
        profile: &str,
        initial_imbalance: f64,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO plans \
             (target_percent, headroom_percent, strategy, profile, initial_imbalance)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![target_percent, headroom_percent, strategy, profile, initial_imbalance],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Update a plan with the computed move totals.
    pub fn update_plan_totals(&self, plan_id: i64, total_moves: i32, total_bytes: u64) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE plans SET total_moves = ?1, total_bytes_to_move = ?2 WHERE id = ?3",
            params![total_moves, total_bytes as i64, plan_id],
        )?;
        Ok(())
    }

    /// Update plan status.
    pub fn update_plan_status(&self, plan_id: i64, status: PlanStatus) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE plans SET status = ?1 WHERE id = ?2",
            params![status.as_str(), plan_id],
        )?;
        Ok(())
    }

    /// Record a human-readable diagnostic on a plan (e.g. "already balanced").
    pub fn set_plan_diagnostic(&self, plan_id: i64, diagnostic: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE plans SET diagnostic = ?1 WHERE id = ?2",
            params![diagnostic, plan_id],
        )?;
        Ok(())
    }

    /// Get a rebalance plan by ID.
    pub fn get_plan(&self, plan_id: i64) -> Result<Option<PlanRow>> {
        let conn = self.conn();
        let plan = conn
            .query_row(
                "SELECT id, created_at, target_percent, headroom_percent, strategy, profile,
                        initial_imbalance, total_moves, total_bytes_to_move, status, diagnostic
                 FROM plans WHERE id = ?1",
                params![plan_id],
                map_plan_row,
            )
            .optional()?;

        Ok(plan)
    }

    /// Get the most recently created plan, if any.
    pub fn get_latest_plan(&self) -> Result<Option<PlanRow>> {
        let conn = self.conn();
        let plan = conn
            .query_row(
                "SELECT id, created_at, target_percent, headroom_percent, strategy, profile,
                        initial_imbalance, total_moves, total_bytes_to_move, status, diagnostic
                 FROM plans ORDER BY id DESC LIMIT 1",
                [],
                map_plan_row,
            )
            .optional()?;

        Ok(plan)
    }
}

fn map_plan_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlanRow> {
    let status_str: String = row.get(9)?;
    let status = PlanStatus::try_from(status_str.as_str())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::from(e)))?;
    Ok(PlanRow {
        id: row.get(0)?,
        created_at: row.get(1)?,
        target_percent: row.get(2)?,
        headroom_percent: row.get(3)?,
        strategy: row.get(4)?,
        profile: row.get(5)?,
        initial_imbalance: row.get(6)?,
        total_moves: row.get(7)?,
        total_bytes_to_move: row.get::<_, i64>(8)? as u64,
        status,
        diagnostic: row.get(10)?,
    })
}
