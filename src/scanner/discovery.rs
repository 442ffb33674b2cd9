use crate::config::Excludes;
use crate::error::DiscoveryError;
use regex::Regex;
use std::path::Path;

/// A disk discovered under the configured mount prefix, before a free-space
/// probe has been taken.
pub struct DiscoveredDisk {
    pub name: String,
    pub mount_path: String,
}

/// Enumerate data disks by reading the mount-prefix directory and matching
/// subdirectory names against `disk_name_pattern`, honoring include/exclude
/// disk lists.
pub fn discover_disks(
    mount_prefix: &str,
    disk_name_pattern: &str,
    excludes: &Excludes,
) -> Result<Vec<DiscoveredDisk>, DiscoveryError> {
    let mnt_path = Path::new(mount_prefix);
    if !mnt_path.exists() {
        return Err(DiscoveryError::MountBaseMissing(mount_prefix.to_string()));
    }

    let pattern = Regex::new(disk_name_pattern).map_err(|e| DiscoveryError::Io {
        name: mount_prefix.to_string(),
        source: std::io::Error::other(format!("invalid disk_name_pattern: {e}")),
    })?;

    let entries = std::fs::read_dir(mnt_path)
        .map_err(|source| DiscoveryError::Io { name: mount_prefix.to_string(), source })?;

    let mut disks = Vec::new();

    for entry in entries {
        let entry =
            entry.map_err(|source| DiscoveryError::Io { name: mount_prefix.to_string(), source })?;
        let name = entry.file_name().to_string_lossy().to_string();

        if !pattern.is_match(&name) {
            continue;
        }
        if !excludes.include_disks.is_empty() && !excludes.include_disks.contains(&name) {
            continue;
        }
        if excludes.exclude_disks.contains(&name) {
            continue;
        }

        let mount_path = format!("{mount_prefix}/{name}");
        if Path::new(&mount_path).is_dir() {
            disks.push(DiscoveredDisk { name, mount_path });
        }
    }

    disks.sort_by(|a, b| a.name.cmp(&b.name));

    for required in &excludes.include_disks {
        if !disks.iter().any(|d| &d.name == required) {
            return Err(DiscoveryError::DiskMissing {
                name: required.clone(),
                mount_prefix: mount_prefix.to_string(),
            });
        }
    }

    if disks.is_empty() {
        return Err(DiscoveryError::NoDisksFound { mount_prefix: mount_prefix.to_string() });
    }

    Ok(disks)
}
