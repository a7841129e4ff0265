//! Port definitions (interfaces for external systems)
//!
//! Ports define the boundaries between the application and the outside
//! world. Adapters in the infrastructure layer implement them.

pub mod audit_logger;
pub mod cache;
pub mod progress;
pub mod provider;
pub mod web_evidence;
