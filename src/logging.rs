use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub fn utc_ns_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Identifies the component and instance emitting a log line, the way every
/// long-lived object in the graph (engine, group, handler) tags its output.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub instance_id: String,
    pub group: Option<String>,
    pub sequence: u64,
    pub timestamp_ns: u64,
}

impl LogContext {
    pub fn new(component: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            instance_id: instance_id.into(),
            group: None,
            sequence: LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            timestamp_ns: utc_ns_now(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn format(&self, level: &str, message: &str) -> String {
        let group_info = self
            .group
            .as_ref()
            .map(|g| format!(":{g}"))
            .unwrap_or_default();
        format!(
            "[{level}][seq={seq:06}][{component}:{instance}{group_info}] {message}",
            level = level,
            seq = self.sequence,
            component = self.component,
            instance = self.instance_id,
            group_info = group_info,
            message = message,
        )
    }
}

/// Default-method logging trait implemented by every stateful graph object
/// (engine, processing group, handler node) so each can log with a stable
/// `component:instance[:group]` tag via the `log` crate.
pub trait ComponentLogger {
    fn log_context(&self) -> LogContext;

    fn debug(&self, message: &str) {
        let ctx = self.log_context();
        log::debug!("{}", ctx.format("DEBUG", message));
    }

    fn info(&self, message: &str) {
        let ctx = self.log_context();
        log::info!("{}", ctx.format("INFO", message));
    }

    fn warn(&self, message: &str) {
        let ctx = self.log_context();
        log::warn!("{}", ctx.format("WARN", message));
    }

    fn error(&self, message: &str) {
        let ctx = self.log_context();
        log::error!("{}", ctx.format("ERROR", message));
    }
}
