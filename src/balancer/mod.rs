mod planner;
pub mod types;

pub use planner::generate_plan;
pub use types::PlanOutcome;
