//! Core library for the array rebalancer: disk/unit discovery, the
//! capacity-constrained planner, the external-tool transfer engine, and the
//! transfer-state journal. `rebalancer-daemon` wraps this core in an axum
//! API; `rebalance` drives it directly from the command line.

pub mod api;
pub mod balancer;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod executor;
pub mod plan;
pub mod scanner;
pub mod state;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use state::{AppState, DaemonState, DaemonStatus};
