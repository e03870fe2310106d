pub mod error;
pub mod logging;
pub mod timestamp;

pub use error::{CaptureError, CaptureResult, ConfigError, Stage, StageContext, StageError};
pub use logging::{ComponentLogger, LogContext};
pub use timestamp::*;
