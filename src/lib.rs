// src/lib.rs
pub mod capture;
pub mod config;
pub mod core;
pub mod io;
pub mod monitoring;
pub mod recorder;
pub mod testing;

pub use capture::{AttemptLease, AttemptRunner, CapturePipeline, CaptureReport, Orchestrator};
pub use config::StreamConfig;
pub use core::{CaptureError, ComponentLogger, ConfigError, LogContext, Stage, StageError};
pub use monitoring::Metrics;
