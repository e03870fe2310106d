pub mod pipeline;
pub mod scheduler;

pub use pipeline::{AttemptLease, AttemptRunner, CapturePipeline, CaptureReport};
pub use scheduler::Orchestrator;
