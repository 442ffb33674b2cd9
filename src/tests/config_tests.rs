use crate::config::AppConfig;

#[test]
fn test_default_config_validates() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_merge_toml_overrides_only_set_fields() {
    let mut config = AppConfig::default();
    let original_mount_prefix = config.core.mount_prefix.clone();

    let toml = r#"
port = 7092
scan_threads = 4
target_percent = 80.0
headroom_percent = 7.5
strategy = "low_space_first"
exclude_disks = ["disk3", "cache"]
"#;
    config.merge_toml(toml).unwrap();

    assert_eq!(config.port, 7092);
    assert_eq!(config.scan_threads, 4);
    assert!((config.core.target_percent - 80.0).abs() < f64::EPSILON);
    assert!((config.core.headroom_percent - 7.5).abs() < f64::EPSILON);
    assert!(config.core.excludes.exclude_disks.contains("disk3"));
    assert!(config.core.excludes.exclude_disks.contains("cache"));
    // Fields the file didn't mention are left untouched.
    assert_eq!(config.core.mount_prefix, original_mount_prefix);
}

#[test]
fn test_merge_toml_rejects_unknown_fields() {
    let mut config = AppConfig::default();
    let toml = r#"
this_key_does_not_exist = true
"#;
    assert!(config.merge_toml(toml).is_err());
}

#[test]
fn test_validate_rejects_bad_port() {
    let mut config = AppConfig::default();
    config.port = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_overlapping_include_exclude_disks() {
    let mut config = AppConfig::default();
    config.core.excludes.include_disks.insert("disk1".to_string());
    config.core.excludes.exclude_disks.insert("disk1".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_bad_disk_name_pattern() {
    let mut config = AppConfig::default();
    config.core.disk_name_pattern = "(unclosed".to_string();
    assert!(config.validate().is_err());
}
