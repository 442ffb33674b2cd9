use crate::db::Database;

fn test_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().unwrap();
    db
}

#[test]
fn migrations_create_every_table() {
    let db = test_db();
    let conn = db.conn();
    for table in ["schema_version", "disks", "allocation_units", "plans", "moves"] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "expected table {table} to exist");
    }
}

#[test]
fn migrations_are_idempotent() {
    let db = test_db();
    // Running again should be a no-op, not an error (current_version already >= 1).
    db.run_migrations().unwrap();
}

#[test]
fn upsert_disk_is_keyed_by_name() {
    let db = test_db();
    let id1 = db.upsert_disk("disk1", "/mnt/disk1", 1000, 100, 900).unwrap();
    let id2 = db.upsert_disk("disk1", "/mnt/disk1", 1000, 200, 800).unwrap();
    assert_eq!(id1, id2);

    let disk = db.get_disk(id1).unwrap().unwrap();
    assert_eq!(disk.used_bytes, 200);
    assert_eq!(disk.free_bytes, 800);
}

#[test]
fn get_all_disks_returns_every_disk_regardless_of_inclusion() {
    let db = test_db();
    let id = db.upsert_disk("disk1", "/mnt/disk1", 1000, 100, 900).unwrap();
    db.set_disk_included(id, false).unwrap();

    assert_eq!(db.get_all_disks().unwrap().len(), 1);
    assert_eq!(db.get_included_disks().unwrap().len(), 0);
}
