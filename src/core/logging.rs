// src/core/logging.rs
use super::timestamp::utc_ns_now;

/// Context attached to every log line emitted on behalf of one stream.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub stream_id: String,
    pub cycle: Option<u64>,
    pub started_ns: u64,
}

impl LogContext {
    pub fn new(component: &str, stream_id: &str) -> Self {
        Self {
            component: component.to_string(),
            stream_id: stream_id.to_string(),
            cycle: None,
            started_ns: utc_ns_now(),
        }
    }

    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = Some(cycle);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        utc_ns_now().saturating_sub(self.started_ns) / 1_000_000
    }

    pub fn format(&self, message: &str) -> String {
        let cycle_info = match self.cycle {
            Some(cycle) => format!(" cycle={}", cycle),
            None => String::new(),
        };

        format!(
            "[{}:{}{}] {}",
            self.component, self.stream_id, cycle_info, message
        )
    }
}

pub trait ComponentLogger {
    fn log_context(&self) -> &LogContext;

    fn debug(&self, message: &str) {
        log::debug!("{}", self.log_context().format(message));
    }

    fn info(&self, message: &str) {
        log::info!("{}", self.log_context().format(message));
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", self.log_context().format(message));
    }

    fn error(&self, message: &str) {
        log::error!("{}", self.log_context().format(message));
    }
}

impl ComponentLogger for LogContext {
    fn log_context(&self) -> &LogContext {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_creation() {
        let ctx = LogContext::new("capture", "cam1");

        assert_eq!(ctx.component, "capture");
        assert_eq!(ctx.stream_id, "cam1");
        assert!(ctx.cycle.is_none());
        assert!(ctx.started_ns > 0);
    }

    #[test]
    fn test_log_formatting() {
        let ctx = LogContext::new("capture", "cam1");
        assert_eq!(ctx.format("starting"), "[capture:cam1] starting");

        let ctx = ctx.with_cycle(7);
        assert_eq!(ctx.format("fetch failed"), "[capture:cam1 cycle=7] fetch failed");
    }

    #[test]
    fn test_component_logger_trait() {
        struct MockComponent {
            ctx: LogContext,
        }

        impl ComponentLogger for MockComponent {
            fn log_context(&self) -> &LogContext {
                &self.ctx
            }
        }

        let component = MockComponent {
            ctx: LogContext::new("retention", "cam2"),
        };

        assert_eq!(component.log_context().stream_id, "cam2");
        component.info("no-op without a logger installed");
        component.error("worker task failed");
    }
}
