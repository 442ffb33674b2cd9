use crate::balancer::generate_plan;
use crate::config::{CoreConfig, Strategy};
use crate::db::{Database, UnitInsert};

fn test_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().unwrap();
    db
}

fn config_with_target(target_percent: f64) -> CoreConfig {
    let mut config = CoreConfig::default();
    config.target_percent = target_percent;
    config.headroom_percent = 0.0;
    config.reserve_bytes = 0;
    config
}

fn seed_disk(db: &Database, name: &str, size: u64, used: u64) -> i64 {
    db.upsert_disk(name, &format!("/mnt/{name}"), size, used, size - used).unwrap()
}

fn seed_unit(db: &Database, disk_id: i64, share: &str, rel: &str, size: u64) {
    db.begin_disk_scan(disk_id).unwrap();
    db.insert_units_batch(&[UnitInsert {
        disk_id,
        share: share.to_string(),
        relative_path: rel.to_string(),
        size_bytes: size,
    }])
    .unwrap();
    db.commit_disk_scan().unwrap();
}

const GB: u64 = 1_000_000_000;

/// S1: every disk already under its cap -> empty, "balanced" plan.
#[test]
fn already_balanced_produces_no_moves() {
    let db = test_db();
    let d1 = seed_disk(&db, "disk1", 1000 * GB, 400 * GB);
    let d2 = seed_disk(&db, "disk2", 1000 * GB, 450 * GB);
    seed_unit(&db, d1, "media", "a", 10 * GB);
    seed_unit(&db, d2, "media", "b", 10 * GB);

    let config = config_with_target(90.0);
    let outcome = generate_plan(&db, &config).unwrap();

    assert_eq!(outcome.total_moves, 0);
    assert_eq!(outcome.diagnostic, "balanced");
}

/// S2: one disk well over cap, another with plenty of room -> a simple shed.
#[test]
fn simple_shed_moves_units_off_the_full_disk() {
    let db = test_db();
    let full = seed_disk(&db, "disk1", 1000 * GB, 900 * GB);
    let empty = seed_disk(&db, "disk2", 1000 * GB, 100 * GB);
    seed_unit(&db, full, "media", "movies", 600 * GB);
    seed_unit(&db, full, "media", "shows", 300 * GB);
    seed_unit(&db, empty, "media", "other", 100 * GB);

    let config = config_with_target(50.0);
    let outcome = generate_plan(&db, &config).unwrap();

    assert!(outcome.total_moves > 0);
    assert_eq!(outcome.diagnostic, "complete");

    let moves = db.get_plan_moves(outcome.plan_id).unwrap();
    assert!(moves.iter().all(|m| m.move_info.src_disk_id == full && m.move_info.dest_disk_id == empty));
}

/// S3: the source can't fully shed within the array's spare capacity ->
/// partial plan with an "under-served" diagnostic, not an error.
#[test]
fn no_fit_spill_reports_under_served_instead_of_failing() {
    let db = test_db();
    let full = seed_disk(&db, "disk1", 1000 * GB, 950 * GB);
    let tight = seed_disk(&db, "disk2", 1000 * GB, 900 * GB);
    seed_unit(&db, full, "media", "huge", 900 * GB);
    seed_unit(&db, tight, "media", "other", 900 * GB);

    let config = config_with_target(10.0);
    let outcome = generate_plan(&db, &config).unwrap();

    assert!(outcome.diagnostic.starts_with("under-served"));
}

/// S4: `LowSpaceFirst` sheds the most-pressured source disk before others.
#[test]
fn low_space_first_orders_sources_by_ascending_free_space() {
    let db = test_db();
    let tightest = seed_disk(&db, "disk1", 1000 * GB, 950 * GB);
    let less_tight = seed_disk(&db, "disk2", 1000 * GB, 900 * GB);
    let dest = seed_disk(&db, "disk3", 1000 * GB, 100 * GB);
    seed_unit(&db, tightest, "media", "a", 50 * GB);
    seed_unit(&db, less_tight, "media", "b", 50 * GB);
    seed_unit(&db, dest, "media", "c", 10 * GB);

    let mut config = config_with_target(80.0);
    config.strategy = Strategy::LowSpaceFirst;
    let outcome = generate_plan(&db, &config).unwrap();

    let moves = db.get_plan_moves(outcome.plan_id).unwrap();
    assert_eq!(moves[0].move_info.src_disk_id, tightest);
}

#[test]
fn fewer_than_two_disks_is_an_error() {
    let db = test_db();
    seed_disk(&db, "disk1", 1000 * GB, 500 * GB);

    let config = config_with_target(50.0);
    assert!(generate_plan(&db, &config).is_err());
}

proptest::proptest! {
    /// No matter how two disks' used-bytes are split, a generated plan never
    /// moves more bytes than the sources collectively held, and never drives
    /// a source's simulated usage negative.
    #[test]
    fn plan_never_moves_more_than_the_sources_hold(
        used_a in 0u64..1000 * GB,
        used_b in 0u64..1000 * GB,
    ) {
        let db = test_db();
        let a = seed_disk(&db, "disk1", 1000 * GB, used_a);
        let b = seed_disk(&db, "disk2", 1000 * GB, used_b);
        if used_a > 0 {
            seed_unit(&db, a, "media", "all", used_a);
        }
        if used_b > 0 {
            seed_unit(&db, b, "media", "all", used_b);
        }

        let config = config_with_target(50.0);
        let outcome = generate_plan(&db, &config).unwrap();

        proptest::prop_assert!(outcome.total_bytes <= used_a + used_b);
    }

    /// A plan never schedules a move whose source and destination disk are
    /// the same, regardless of how usage is split across three disks.
    #[test]
    fn plan_never_moves_a_unit_to_its_own_disk(
        used_a in 0u64..1000 * GB,
        used_b in 0u64..1000 * GB,
        used_c in 0u64..1000 * GB,
    ) {
        let db = test_db();
        let a = seed_disk(&db, "disk1", 1000 * GB, used_a);
        let b = seed_disk(&db, "disk2", 1000 * GB, used_b);
        let c = seed_disk(&db, "disk3", 1000 * GB, used_c);
        for (disk_id, used) in [(a, used_a), (b, used_b), (c, used_c)] {
            if used > 0 {
                seed_unit(&db, disk_id, "media", "all", used);
            }
        }

        let config = config_with_target(50.0);
        let outcome = generate_plan(&db, &config).unwrap();

        let moves = db.get_plan_moves(outcome.plan_id).unwrap();
        for m in &moves {
            proptest::prop_assert_ne!(m.move_info.src_disk_id, m.move_info.dest_disk_id);
        }
    }

    /// Every unit a plan moves is one the scan actually discovered on that
    /// move's source disk — a plan can shed units, never invent them.
    #[test]
    fn plan_only_moves_units_the_scan_discovered(
        used_a in 1u64..1000 * GB,
        used_b in 0u64..900 * GB,
    ) {
        let db = test_db();
        let a = seed_disk(&db, "disk1", 1000 * GB, used_a);
        let b = seed_disk(&db, "disk2", 1000 * GB, used_b);
        seed_unit(&db, a, "media", "all", used_a);
        if used_b > 0 {
            seed_unit(&db, b, "media", "all", used_b);
        }

        let config = config_with_target(10.0);
        let outcome = generate_plan(&db, &config).unwrap();

        let moves = db.get_plan_moves(outcome.plan_id).unwrap();
        for m in &moves {
            let Some(unit) = db.get_unit(m.move_info.unit_id).unwrap() else {
                proptest::prop_assert!(false, "move references a unit the scan never recorded");
                continue;
            };
            proptest::prop_assert_eq!(unit.disk_id, m.move_info.src_disk_id);
        }
    }
}
