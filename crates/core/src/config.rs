use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_TIMEOUT_MS: u64 = 250;

/// Resolved run configuration, as produced by flag parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectOptions {
    pub pretty: bool,
    pub include_clipboard: bool,
    pub include_frontmost_window: bool,
    pub include_apps: bool,
    pub include_battery: bool,
    pub include_network: bool,
    pub include_calendar: bool,
    pub include_reminders: bool,
    pub redact: bool,
    pub debug: bool,
    pub timeout_ms: u64,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            include_clipboard: false,
            include_frontmost_window: false,
            include_apps: false,
            include_battery: false,
            include_network: false,
            include_calendar: false,
            include_reminders: false,
            redact: false,
            debug: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl CollectOptions {
    /// Per-collector deadline. A zero value falls back to the default.
    pub fn timeout(&self) -> Duration {
        let ms = if self.timeout_ms == 0 {
            DEFAULT_TIMEOUT_MS
        } else {
            self.timeout_ms
        };
        Duration::from_millis(ms)
    }
}

pub fn resolve_timeout_ms(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return DEFAULT_TIMEOUT_MS;
    };
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => value as u64,
        _ => {
            warn!(
                "invalid --timeout-ms value {:?}; using {} ms",
                raw, DEFAULT_TIMEOUT_MS
            );
            DEFAULT_TIMEOUT_MS
        }
    }
}
