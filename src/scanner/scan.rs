use super::units::build_units;
use super::validation::validate_under_mount_prefix;
use crate::config::Excludes;
use crate::db::{Database, UnitInsert};
use crate::events::{Event, EventHub};
use anyhow::{bail, Result};
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// All context needed to scan a single disk's shares into allocation units.
pub struct ScanContext<'a> {
    pub db: &'a Database,
    pub disk_id: i64,
    pub disk_name: &'a str,
    pub mount_path: &'a str,
    pub mount_prefix: &'a str,
    pub unit_depth: usize,
    pub min_unit_size: u64,
    pub excludes: &'a Excludes,
    pub event_hub: &'a EventHub,
    pub cancel: CancellationToken,
}

/// Statistics from scanning a single disk.
pub struct ScanStats {
    pub units_found: u64,
    pub bytes_cataloged: u64,
}

/// Scan a single disk's shares and populate the allocation-unit catalog.
///
/// The clear-and-repopulate runs in a single transaction: if the scan fails
/// or is cancelled, the previous catalog for this disk is preserved.
pub fn scan_disk(ctx: &ScanContext<'_>) -> Result<ScanStats> {
    validate_under_mount_prefix(ctx.mount_path, ctx.mount_prefix)?;

    let mount = Path::new(ctx.mount_path);
    if !mount.exists() {
        bail!("Mount path does not exist: {}", ctx.mount_path);
    }
    if !mount.is_dir() {
        bail!("Mount path is not a directory: {}", ctx.mount_path);
    }

    info!("Starting scan of {} (disk_id={})", ctx.mount_path, ctx.disk_id);

    ctx.db.begin_disk_scan(ctx.disk_id)?;

    let result = run_scan(ctx);

    match &result {
        Ok(_) => {
            ctx.db.commit_disk_scan()?;
        }
        Err(_) => {
            if let Err(rb_err) = ctx.db.rollback_disk_scan() {
                tracing::error!("Failed to rollback scan transaction: {}", rb_err);
            }
        }
    }

    result
}

fn run_scan(ctx: &ScanContext<'_>) -> Result<ScanStats> {
    if ctx.cancel.is_cancelled() {
        bail!("Scan cancelled");
    }

    let start = Instant::now();

    let units =
        build_units(ctx.disk_name, ctx.mount_path, ctx.unit_depth, ctx.min_unit_size, ctx.excludes)?;

    if ctx.cancel.is_cancelled() {
        bail!("Scan cancelled");
    }

    let inserts: Vec<UnitInsert> = units
        .iter()
        .map(|u| UnitInsert {
            disk_id: ctx.disk_id,
            share: u.share.clone(),
            relative_path: u.relative_path.clone(),
            size_bytes: u.size_bytes,
        })
        .collect();

    ctx.db.insert_units_batch(&inserts)?;

    let units_found = inserts.len() as u64;
    let bytes_cataloged: u64 = inserts.iter().map(|u| u.size_bytes).sum();
    let duration = start.elapsed().as_secs_f64();

    info!(
        "Scan complete for {}: {} units, {} bytes in {:.1}s",
        ctx.mount_path, units_found, bytes_cataloged, duration
    );

    let _ = ctx.event_hub.publish(Event::ScanDiskComplete {
        disk: ctx.disk_name.to_string(),
        total_units: units_found,
        total_bytes: bytes_cataloged,
    });

    Ok(ScanStats { units_found, bytes_cataloged })
}
