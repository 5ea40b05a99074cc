//! Execution engine for stratum
//!
//! The engine orchestrates:
//! 1. Planning - Compare the manifest with the state file
//! 2. Diffing - Show what the run will change
//! 3. Executing - Walk the dependency graph and persist state

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{RunOptions, ensure_success, execute};
pub use planner::{plan_apply, plan_destroy, plan_refresh};
