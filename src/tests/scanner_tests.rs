use crate::config::Excludes;
use crate::scanner::units::build_units;
use crate::scanner::validation::validate_under_mount_prefix;
use std::fs;

#[test]
fn validate_under_mount_prefix_accepts_paths_under_the_prefix() {
    assert!(validate_under_mount_prefix("/mnt/disk1/movies/test.mkv", "/mnt").is_ok());
    assert!(validate_under_mount_prefix("/mnt/disk1", "/mnt").is_ok());
}

#[test]
fn validate_under_mount_prefix_rejects_paths_outside_the_prefix() {
    assert!(validate_under_mount_prefix("/mnt/user/some/file", "/mnt/disk1").is_err());
    assert!(validate_under_mount_prefix("/other/disk1/file", "/mnt").is_err());
}

#[test]
fn validate_under_mount_prefix_tolerates_a_trailing_slash_on_the_prefix() {
    assert!(validate_under_mount_prefix("/mnt/disk1/file", "/mnt/").is_ok());
}

fn write_file(path: &std::path::Path, size: usize) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, vec![0u8; size]).unwrap();
}

#[test]
fn build_units_respects_depth_and_min_size() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_file(&root.join("movies/Movie A (2020)/movie.mkv"), 2_000_000);
    write_file(&root.join("movies/Movie B (2021)/movie.mkv"), 100); // below min size

    let units = build_units("disk1", root.to_str().unwrap(), 1, 1_000_000, &Excludes::default())
        .unwrap();

    assert_eq!(units.len(), 1);
    assert_eq!(units[0].share, "movies");
    assert_eq!(units[0].relative_path, "Movie A (2020)");
    assert_eq!(units[0].size_bytes, 2_000_000);
}

#[test]
fn build_units_excludes_shares_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_file(&root.join("appdata/config/state.db"), 2_000_000);
    write_file(&root.join("movies/Movie A/movie.mkv"), 2_000_000);

    let excludes = Excludes { exclude_shares: ["appdata".to_string()].into(), ..Default::default() };

    let units = build_units("disk1", root.to_str().unwrap(), 1, 1, &excludes).unwrap();

    assert_eq!(units.len(), 1);
    assert_eq!(units[0].share, "movies");
}

#[test]
fn build_units_excludes_by_glob() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_file(&root.join("movies/Sample/movie.mkv"), 2_000_000);
    write_file(&root.join("movies/Real Movie/movie.mkv"), 2_000_000);

    let excludes =
        Excludes { exclude_globs: vec!["movies/Sample".to_string()], ..Default::default() };

    let units = build_units("disk1", root.to_str().unwrap(), 1, 1, &excludes).unwrap();

    assert_eq!(units.len(), 1);
    assert_eq!(units[0].relative_path, "Real Movie");
}

#[test]
fn build_units_depth_zero_treats_each_share_as_one_unit() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_file(&root.join("media/a/one.bin"), 1_000_000);
    write_file(&root.join("media/b/two.bin"), 1_000_000);

    let units = build_units("disk1", root.to_str().unwrap(), 0, 1, &Excludes::default()).unwrap();

    assert_eq!(units.len(), 1);
    assert_eq!(units[0].share, "media");
    assert_eq!(units[0].relative_path, ".");
    assert_eq!(units[0].size_bytes, 2_000_000);
}
