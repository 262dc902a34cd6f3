//! Execution engine for azstate
//!
//! The engine orchestrates:
//! 1. Planning - Build resources from a state file
//! 2. Executing - Preview, confirm, apply
//! 3. Output - Result blocks or JSON

pub mod executor;
pub mod output;
pub mod planner;

pub use executor::{RunOptions, run};
pub use planner::build_plan;
