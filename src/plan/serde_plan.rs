//! Plan Serializer (C10): converts a Plan to/from the stable on-disk form
//! documented in spec §6.2. Unknown fields are preserved verbatim across a
//! re-serialize via a catch-all `extra` map (spec §6.2 "forward
//! compatibility"), the same pattern the teacher's API layer leans on
//! `serde_json::Value` for wherever a payload shape might grow.

use crate::config::{CoreConfig, Profile, Strategy};
use crate::db::{Disk, MoveRowDetail, PlanRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema version of the plan file. Bump when a field's meaning changes in
/// a way that is not backward compatible; additive fields do not require a
/// bump since unknown fields round-trip through `extra`.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSnapshot {
    pub name: String,
    pub size: u64,
    pub used: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveEntry {
    pub share: String,
    pub rel_path: String,
    pub src_disk: String,
    pub dest_disk: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOptions {
    pub target_percent: f64,
    pub headroom_percent: f64,
    pub strategy: Strategy,
    pub profile: Profile,
}

/// The on-disk plan file (spec §6.2). `extra` absorbs any field this
/// binary does not recognize so a round-trip through an older or newer
/// version never silently drops data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFile {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub disks: Vec<DiskSnapshot>,
    pub moves: Vec<MoveEntry>,
    pub options: PlanOptions,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Build a `PlanFile` from a plan row, its moves, and a disk snapshot, the
/// way the daemon's `/plans/:id/save` handler and the CLI's `--save-plan`
/// both do it.
pub fn build_plan_file(plan: &PlanRow, moves: &[MoveRowDetail], disks: &[Disk]) -> PlanFile {
    let strategy = if plan.strategy == Strategy::LowSpaceFirst.as_str() {
        Strategy::LowSpaceFirst
    } else {
        Strategy::Size
    };
    let profile = match plan.profile.as_str() {
        "fast" => Profile::Fast,
        "integrity" => Profile::Integrity,
        _ => Profile::Balanced,
    };

    PlanFile {
        schema_version: SCHEMA_VERSION,
        created_at: Utc::now(),
        disks: disks
            .iter()
            .map(|d| DiskSnapshot { name: d.disk_name.clone(), size: d.size_bytes, used: d.used_bytes })
            .collect(),
        moves: moves
            .iter()
            .map(|m| MoveEntry {
                share: m.move_info.share.clone(),
                rel_path: m.move_info.relative_path.clone(),
                src_disk: m.src_disk_name.clone(),
                dest_disk: m.dest_disk_name.clone(),
                size: m.move_info.size_bytes,
            })
            .collect(),
        options: PlanOptions {
            target_percent: plan.target_percent,
            headroom_percent: plan.headroom_percent,
            strategy,
            profile,
        },
        extra: Map::new(),
    }
}

/// Derive the options a freshly-loaded plan file implies for a `CoreConfig`,
/// used by `--load-plan` to reproduce the planning options a saved plan was
/// generated with (spec §6.1 `--load-plan`).
pub fn apply_options(config: &mut CoreConfig, options: &PlanOptions) {
    config.target_percent = options.target_percent;
    config.headroom_percent = options.headroom_percent;
    config.strategy = options.strategy;
    config.profile = options.profile;
}

/// Serialize a plan file to pretty JSON, the stable form spec §6.2 names.
pub fn serialize(plan: &PlanFile) -> serde_json::Result<String> {
    serde_json::to_string_pretty(plan)
}

/// Parse a plan file, preserving any field this version does not recognize.
pub fn deserialize(text: &str) -> serde_json::Result<PlanFile> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MoveRow, MoveStatus, PlanStatus};

    fn sample_plan_file() -> PlanFile {
        let plan = PlanRow {
            id: 1,
            created_at: Some("2026-01-01T00:00:00Z".to_string()),
            target_percent: 80.0,
            headroom_percent: 5.0,
            strategy: Strategy::Size.as_str().to_string(),
            profile: Profile::Balanced.as_str().to_string(),
            initial_imbalance: Some(0.12),
            total_moves: 1,
            total_bytes_to_move: 1024,
            status: PlanStatus::Planned,
            diagnostic: Some("complete".to_string()),
        };
        let moves = vec![MoveRowDetail {
            move_info: MoveRow {
                id: 1,
                plan_id: 1,
                unit_id: 1,
                src_disk_id: 1,
                dest_disk_id: 2,
                share: "movies".to_string(),
                relative_path: "Foo (2020)".to_string(),
                size_bytes: 1024,
                move_order: 0,
                status: MoveStatus::Planned,
                error_message: None,
            },
            src_disk_name: "disk1".to_string(),
            dest_disk_name: "disk2".to_string(),
        }];
        let disks = vec![
            Disk {
                id: 1,
                disk_name: "disk1".to_string(),
                mount_path: "/mnt/disk1".to_string(),
                size_bytes: 4_000_000_000,
                used_bytes: 3_600_000_000,
                free_bytes: 400_000_000,
                included: true,
                updated_at: None,
            },
            Disk {
                id: 2,
                disk_name: "disk2".to_string(),
                mount_path: "/mnt/disk2".to_string(),
                size_bytes: 4_000_000_000,
                used_bytes: 1_000_000_000,
                free_bytes: 3_000_000_000,
                included: true,
                updated_at: None,
            },
        ];
        build_plan_file(&plan, &moves, &disks)
    }

    #[test]
    fn round_trips_through_json() {
        let plan = sample_plan_file();
        let json = serialize(&plan).unwrap();
        let reloaded = deserialize(&json).unwrap();
        assert_eq!(plan, reloaded);
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let plan = sample_plan_file();
        let mut json: Value = serde_json::from_str(&serialize(&plan).unwrap()).unwrap();
        json.as_object_mut()
            .unwrap()
            .insert("future_field".to_string(), Value::String("unknown-to-us".to_string()));

        let reloaded: PlanFile = serde_json::from_value(json).unwrap();
        assert_eq!(reloaded.extra.get("future_field").and_then(Value::as_str), Some("unknown-to-us"));

        let reserialized = serde_json::to_value(&reloaded).unwrap();
        assert_eq!(
            reserialized.get("future_field").and_then(Value::as_str),
            Some("unknown-to-us")
        );
    }

    #[test]
    fn schema_version_is_written() {
        let plan = sample_plan_file();
        let json = serialize(&plan).unwrap();
        assert!(json.contains("\"schema_version\": 1"));
    }
}
