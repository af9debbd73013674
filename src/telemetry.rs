//! Telemetry utilities for command timing and log setup.

use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Guard for timing command execution and recording metrics.
///
/// Records command latency when dropped.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(&self.command, duration);
    }
}

/// Environment variable selecting JSON log output.
pub const LOG_JSON_ENV: &str = "SLCHATD_LOG_JSON";

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG` (default `info`). Set `SLCHATD_LOG_JSON=1`
/// for one JSON object per line.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_JSON_ENV)
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for one dispatched command.
    pub fn command(name: &str, issuer: &str) -> Span {
        info_span!("command", name = %name, issuer = %issuer)
    }
}
