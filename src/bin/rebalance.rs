//! `rebalance` — a CLI driver for the array-rebalancer core (spec §6.1),
//! running the same scanner/balancer/executor the daemon exposes over HTTP,
//! without requiring the daemon process to be running.
//!
//! This binary is the one place `println!` is legitimate in this crate: a
//! dry run's whole job is to print the plan to the user, which is not a
//! `tracing` log line.
#![allow(clippy::print_stdout)]

use array_rebalancer::balancer::generate_plan;
use array_rebalancer::config::{CoreConfig, Excludes, Profile, Strategy};
use array_rebalancer::db::Database;
use array_rebalancer::events::EventHub;
use array_rebalancer::executor::{self, execute_plan};
use array_rebalancer::plan::{apply_options, build_plan_file, deserialize, serialize};
use array_rebalancer::scanner::{discover_disks, get_disk_space, scan_disk, ScanContext};
use array_rebalancer::tracker;
use clap::Parser;
use std::collections::HashSet;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Redistribute data across JBOD-style data disks.
#[derive(Debug, Parser)]
#[command(name = "rebalance", version, about)]
struct Cli {
    /// Explicit target fill percentage, or -1 to auto-balance (spec §6.1).
    #[arg(long, allow_hyphen_values = true, default_value_t = -1.0)]
    target_percent: f64,

    /// Headroom percentage used with auto-balance.
    #[arg(long, default_value_t = 5.0)]
    headroom_percent: f64,

    /// Perform the planned moves. Without this flag the run is a dry run
    /// that only prints the plan.
    #[arg(long)]
    execute: bool,

    #[arg(long, value_delimiter = ',')]
    include_disks: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    exclude_disks: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    include_shares: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    exclude_shares: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    exclude_globs: Vec<String>,

    /// Depth in C2: how many path components below a share root form a unit.
    #[arg(long, default_value_t = 1)]
    unit_depth: usize,

    /// Minimum allocation-unit size eligible for planning. Accepts suffixed
    /// human sizes (`1MiB`, `512K`, `2G`, ...).
    #[arg(long, default_value = "1MiB")]
    min_unit_size: String,

    /// Save the generated plan to this path instead of (or in addition to)
    /// executing it.
    #[arg(long)]
    save_plan: Option<String>,

    /// Load a previously saved plan instead of generating a new one; only
    /// its planning options (target/headroom/strategy/profile) are reused,
    /// moves are always recomputed against the current catalog.
    #[arg(long)]
    load_plan: Option<String>,

    #[arg(long, value_enum, default_value = "balanced")]
    rsync_mode: ProfileArg,

    /// Extra flags appended verbatim to the copy tool invocation.
    #[arg(long, default_value = "")]
    rsync_extra: String,

    /// Select the low-space-first strategy instead of size-first.
    #[arg(long)]
    prioritize_low_space: bool,

    /// Base path under which data disks are mounted.
    #[arg(long, default_value = "/mnt")]
    mount_prefix: String,

    /// Path to the SQLite catalog used for this run.
    #[arg(long, default_value = "./rebalance-catalog.db")]
    db_path: String,

    /// Directory holding the transfer-state journal.
    #[arg(long, default_value = "./rebalance-state")]
    state_dir: String,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ProfileArg {
    Fast,
    Balanced,
    Integrity,
}

impl From<ProfileArg> for Profile {
    fn from(p: ProfileArg) -> Self {
        match p {
            ProfileArg::Fast => Self::Fast,
            ProfileArg::Balanced => Self::Balanced,
            ProfileArg::Integrity => Self::Integrity,
        }
    }
}

/// Exit codes per spec §6.1.
mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const GENERIC_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const DISCOVERY_FAILURE: u8 = 3;
    pub const EXECUTION_HAD_FAILURES: u8 = 4;
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return ExitCode::from(exit_code::GENERIC_ERROR);
        }
    };

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    let min_unit_size = match cli.min_unit_size.parse::<bytesize::ByteSize>() {
        Ok(size) => size.as_u64(),
        Err(e) => {
            error!("invalid --min-unit-size {:?}: {e}", cli.min_unit_size);
            return ExitCode::from(exit_code::INVALID_ARGS);
        }
    };

    let strategy =
        if cli.prioritize_low_space { Strategy::LowSpaceFirst } else { Strategy::Size };

    let mut config = CoreConfig {
        target_percent: cli.target_percent,
        headroom_percent: cli.headroom_percent,
        strategy,
        profile: cli.rsync_mode.into(),
        unit_depth: cli.unit_depth,
        min_unit_size,
        excludes: Excludes {
            include_disks: cli.include_disks.into_iter().collect::<HashSet<_>>(),
            exclude_disks: cli.exclude_disks.into_iter().collect::<HashSet<_>>(),
            include_shares: cli.include_shares.into_iter().collect::<HashSet<_>>(),
            exclude_shares: cli.exclude_shares.into_iter().collect::<HashSet<_>>(),
            exclude_globs: cli.exclude_globs,
        },
        state_dir: cli.state_dir,
        mount_prefix: cli.mount_prefix,
        disk_name_pattern: r"^disk\d+$".to_string(),
        reserve_bytes: 1_073_741_824,
        per_move_timeout: std::time::Duration::from_secs(6 * 60 * 60),
        rsync_extra: cli.rsync_extra,
        copy_tool: "rsync".to_string(),
    };

    if let Some(load_path) = &cli.load_plan {
        match std::fs::read_to_string(load_path).map(|text| deserialize(&text)) {
            Ok(Ok(plan_file)) => apply_options(&mut config, &plan_file.options),
            Ok(Err(e)) => {
                error!("failed to parse plan file {load_path}: {e}");
                return ExitCode::from(exit_code::INVALID_ARGS);
            }
            Err(e) => {
                error!("failed to read plan file {load_path}: {e}");
                return ExitCode::from(exit_code::INVALID_ARGS);
            }
        }
    }

    let db = match Database::open(&cli.db_path) {
        Ok(db) => db,
        Err(e) => {
            error!("failed to open catalog database: {e:#}");
            return ExitCode::from(exit_code::GENERIC_ERROR);
        }
    };
    if let Err(e) = db.run_migrations() {
        error!("failed to run migrations: {e:#}");
        return ExitCode::from(exit_code::GENERIC_ERROR);
    }

    // --- Startup recovery: this binary is one process per invocation, so a
    // kill mid-move always shows up here on the next run, not in a daemon
    // that stays running. Same sequence `main.rs` runs before serving the API. ---
    let recovered_move_ids = match db.reset_in_flight_moves() {
        Ok(ids) => ids,
        Err(e) => {
            error!("failed to reset in-flight moves: {e:#}");
            return ExitCode::from(exit_code::GENERIC_ERROR);
        }
    };
    if !recovered_move_ids.is_empty() {
        warn!("{} move(s) were in flight at last exit; recovering", recovered_move_ids.len());
        match executor::recovery::cleanup_partial_files(&db, &recovered_move_ids).await {
            Ok(stats) if stats.data_loss > 0 => {
                error!("{} move(s) suffered data loss across the last crash", stats.data_loss);
            }
            Ok(_) => {}
            Err(e) => {
                error!("failed to reconcile partial files: {e:#}");
                return ExitCode::from(exit_code::GENERIC_ERROR);
            }
        }
    }

    match tracker::load_unterminated(&config.state_dir) {
        Ok(records) => {
            for record in records {
                match tracker::classify_orphan(&record) {
                    tracker::OrphanVerdict::CompletedUnrecorded | tracker::OrphanVerdict::Stale => {
                        let _ = tracker::remove_record(&config.state_dir, record.move_id);
                    }
                    tracker::OrphanVerdict::PartialRerun | tracker::OrphanVerdict::NotStarted => {
                        // Left in place: the move is already `planned` and will be
                        // picked up and retried the next time a plan is executed.
                    }
                }
            }
        }
        Err(e) => error!("failed to read transfer journal: {e:#}"),
    }
    let _ = tracker::purge_completed(&config.state_dir, chrono::Duration::days(7));

    let event_hub = EventHub::new(256);
    let cancel = CancellationToken::new();

    let discovered = match discover_disks(&config.mount_prefix, &config.disk_name_pattern, &config.excludes) {
        Ok(disks) => disks,
        Err(e) => {
            error!("disk discovery failed: {e}");
            return ExitCode::from(exit_code::DISCOVERY_FAILURE);
        }
    };

    info!("discovered {} disks under {}", discovered.len(), config.mount_prefix);

    for disk in &discovered {
        let space = match get_disk_space(&disk.mount_path) {
            Ok(space) => space,
            Err(e) => {
                error!("failed to read disk space for {}: {e}", disk.mount_path);
                return ExitCode::from(exit_code::DISCOVERY_FAILURE);
            }
        };

        let disk_id = match db.upsert_disk(&disk.name, &disk.mount_path, space.total, space.used, space.free) {
            Ok(id) => id,
            Err(e) => {
                error!("failed to record disk {}: {e:#}", disk.name);
                return ExitCode::from(exit_code::GENERIC_ERROR);
            }
        };

        let ctx = ScanContext {
            db: &db,
            disk_id,
            disk_name: &disk.name,
            mount_path: &disk.mount_path,
            mount_prefix: &config.mount_prefix,
            unit_depth: config.unit_depth,
            min_unit_size: config.min_unit_size,
            excludes: &config.excludes,
            event_hub: &event_hub,
            cancel: cancel.clone(),
        };

        if let Err(e) = scan_disk(&ctx) {
            error!("failed to scan disk {}: {e:#}", disk.name);
            return ExitCode::from(exit_code::GENERIC_ERROR);
        }
    }

    let outcome = match generate_plan(&db, &config) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("planning failed: {e:#}");
            return ExitCode::from(exit_code::GENERIC_ERROR);
        }
    };

    println!(
        "plan {}: {} moves, {} bytes, diagnostic: {}",
        outcome.plan_id, outcome.total_moves, outcome.total_bytes, outcome.diagnostic
    );

    if let Some(save_path) = &cli.save_plan {
        let Ok(Some(plan_row)) = db.get_plan(outcome.plan_id) else {
            error!("could not reload plan {} to save it", outcome.plan_id);
            return ExitCode::from(exit_code::GENERIC_ERROR);
        };
        let Ok(moves) = db.get_plan_moves(outcome.plan_id) else {
            error!("could not load moves for plan {}", outcome.plan_id);
            return ExitCode::from(exit_code::GENERIC_ERROR);
        };
        let Ok(disks) = db.get_all_disks() else {
            error!("could not load disks to save plan {}", outcome.plan_id);
            return ExitCode::from(exit_code::GENERIC_ERROR);
        };

        let plan_file = build_plan_file(&plan_row, &moves, &disks);
        match serialize(&plan_file) {
            Ok(json) => {
                if let Err(e) = std::fs::write(save_path, json) {
                    error!("failed to write plan file {save_path}: {e}");
                    return ExitCode::from(exit_code::GENERIC_ERROR);
                }
            }
            Err(e) => {
                error!("failed to serialize plan: {e}");
                return ExitCode::from(exit_code::GENERIC_ERROR);
            }
        }
    }

    if !cli.execute {
        return ExitCode::from(exit_code::SUCCESS);
    }

    if outcome.total_moves == 0 {
        return ExitCode::from(exit_code::SUCCESS);
    }

    match execute_plan(&db, &config, &event_hub, outcome.plan_id, cancel).await {
        Ok(summary) => {
            info!(
                "execution finished: {} completed, {} failed, {} cancelled",
                summary.completed, summary.failed, summary.cancelled_remaining
            );
            if summary.failed > 0 {
                ExitCode::from(exit_code::EXECUTION_HAD_FAILURES)
            } else {
                ExitCode::from(exit_code::SUCCESS)
            }
        }
        Err(e) => {
            error!("execution failed: {e:#}");
            ExitCode::from(exit_code::GENERIC_ERROR)
        }
    }
}
