//! Use cases (application services)
//!
//! Use cases orchestrate the domain logic and interact with
//! external systems through ports.

pub mod dispatch;
pub mod gather_evidence;
pub mod run_consensus;
