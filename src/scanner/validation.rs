use crate::error::PreValidationError;

/// Confirm a path lies under the configured mount prefix.
///
/// Every path the engine touches — sources, destinations, scan roots — must
/// resolve to a direct disk mount rather than any aggregated or networked
/// view of the array. A path outside the prefix is always rejected.
pub fn validate_under_mount_prefix(
    path: &str,
    mount_prefix: &str,
) -> Result<(), PreValidationError> {
    let prefix = mount_prefix.trim_end_matches('/');
    let normalized = format!("{prefix}/");
    if path == prefix || path.starts_with(&normalized) {
        Ok(())
    } else {
        Err(PreValidationError::PathOutsideMountPrefix(path.to_string()))
    }
}
