use super::settings::AppConfig;
use anyhow::Result;

impl AppConfig {
    /// Validate configuration values are sane.
    pub(crate) fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.port > 0, "port must be > 0");
        anyhow::ensure!(
            self.scan_threads >= 1 && self.scan_threads <= 32,
            "scan_threads must be between 1 and 32"
        );
        anyhow::ensure!(
            self.core.is_auto_target() || (0.0..=100.0).contains(&self.core.target_percent),
            "target_percent must be -1 (auto) or between 0 and 100"
        );
        anyhow::ensure!(
            self.core.headroom_percent >= 0.0 && self.core.headroom_percent <= 100.0,
            "headroom_percent must be between 0 and 100"
        );
        anyhow::ensure!(
            regex::Regex::new(&self.core.disk_name_pattern).is_ok(),
            "disk_name_pattern is not a valid regex"
        );
        anyhow::ensure!(!self.core.mount_prefix.is_empty(), "mount_prefix must not be empty");
        anyhow::ensure!(!self.core.state_dir.is_empty(), "state_dir must not be empty");
        anyhow::ensure!(!self.core.copy_tool.is_empty(), "copy_tool must not be empty");

        let both_named: Vec<&String> = self
            .core
            .excludes
            .include_disks
            .intersection(&self.core.excludes.exclude_disks)
            .collect();
        anyhow::ensure!(
            both_named.is_empty(),
            "disks named in both --include-disks and --exclude-disks: {both_named:?}"
        );

        Ok(())
    }
}
