pub mod serde_plan;

pub use serde_plan::{
    apply_options, build_plan_file, deserialize, serialize, DiskSnapshot, MoveEntry, PlanFile,
    PlanOptions, SCHEMA_VERSION,
};
