//! Progress notification port
//!
//! Defines the interface for reporting progress through the consensus pipeline.

use verity_domain::ProviderId;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dispatch,
    Extraction,
    Validation,
    Integration,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Dispatch => "dispatch",
            Stage::Extraction => "extraction",
            Stage::Validation => "validation",
            Stage::Integration => "integration",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Callback for progress updates during a consensus run
///
/// Implementations live in the presentation layer.
pub trait ProgressNotifier: Send + Sync {
    /// Called when a stage starts; `total_tasks` is the number of units of work
    fn on_stage_start(&self, stage: Stage, total_tasks: usize);

    /// Called when one provider call finishes during dispatch
    fn on_provider_complete(&self, _provider: &ProviderId, _success: bool) {}

    fn on_stage_complete(&self, stage: Stage);
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_stage_start(&self, _stage: Stage, _total_tasks: usize) {}
    fn on_stage_complete(&self, _stage: Stage) {}
}
