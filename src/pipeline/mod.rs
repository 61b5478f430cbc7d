//! Run orchestration and resource ownership

pub mod history;
pub mod orchestrator;
pub mod report;
pub mod tracker;

pub use history::{ContentHistory, JsonContentHistory};
pub use orchestrator::{Collaborators, PipelineOrchestrator};
pub use report::{
    FailureReason, PartOutcome, RunError, RunReport, RunState, SegmentSpan, SkipReason,
};
pub use tracker::{ReleaseSummary, ResourceTracker};
