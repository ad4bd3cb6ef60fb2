//! Collectors gather one category of context each.
//!
//! Every collector returns a [`CollectorResult`]: failures are reported as
//! values, never raised. Platform dispatch happens inside the collector.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::Instant as TokioInstant;

use crate::config::CollectOptions;
use crate::exec::{CommandRunner, ExecOutput, SystemRunner};
use crate::model::{Category, ErrorCode, PermissionState, StructuredError};
use crate::platform::Platform;

pub mod apps;
pub mod battery;
pub mod calendar;
pub mod clipboard;
pub mod frontmost;
pub mod host;
pub mod network;
pub mod reminders;

pub use apps::AppsCollector;
pub use battery::BatteryCollector;
pub use calendar::CalendarCollector;
pub use clipboard::ClipboardCollector;
pub use frontmost::FrontmostCollector;
pub use host::HostCollector;
pub use network::NetworkCollector;
pub use reminders::RemindersCollector;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorResult<T> {
    pub data: Option<T>,
    pub warnings: Vec<String>,
    pub error: Option<StructuredError>,
    pub permission: Option<PermissionState>,
    pub elapsed_ms: Option<u64>,
}

impl<T> Default for CollectorResult<T> {
    fn default() -> Self {
        Self {
            data: None,
            warnings: Vec::new(),
            error: None,
            permission: None,
            elapsed_ms: None,
        }
    }
}

impl<T> CollectorResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn failed(category: Category, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: Some(StructuredError::new(category, code, message)),
            ..Self::default()
        }
    }

    pub fn timed_out(category: Category) -> Self {
        Self::failed(category, ErrorCode::Timeout, "Timeout")
    }

    /// Result for a platform where the category is not gathered.
    pub fn unsupported(category: Category, platform: &Platform, empty: Option<T>) -> Self {
        Self {
            data: empty,
            warnings: vec![format!("{category}: unsupported platform {platform}")],
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_permission(mut self, permission: PermissionState) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn with_elapsed(mut self, started: Instant) -> Self {
        self.elapsed_ms = Some(started.elapsed().as_millis() as u64);
        self
    }
}

/// Everything a collector may consult. Immutable; each concurrently running
/// collector works on its own clone.
#[derive(Clone)]
pub struct CollectContext {
    pub options: CollectOptions,
    pub platform: Platform,
    pub runner: Arc<dyn CommandRunner>,
    deadline: Option<TokioInstant>,
}

impl CollectContext {
    pub fn new(options: CollectOptions, platform: Platform, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            options,
            platform,
            runner,
            deadline: None,
        }
    }

    pub fn system(options: CollectOptions) -> Self {
        Self::new(options, Platform::detect(), Arc::new(SystemRunner))
    }

    /// Bounds every command issued through this context by one instant, so a
    /// collector running several commands still finishes by `deadline`.
    pub fn with_deadline(mut self, deadline: TokioInstant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<TokioInstant> {
        self.deadline
    }

    /// Time left for the next command: what remains until the deadline, or
    /// the configured per-module timeout when no deadline is set.
    pub fn timeout(&self) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(TokioInstant::now()),
            None => self.options.timeout(),
        }
    }
}

#[async_trait]
pub trait Collector: Send + Sync {
    type Output: Send + 'static;

    fn category(&self) -> Category;

    async fn collect(&self, ctx: &CollectContext) -> CollectorResult<Self::Output>;
}

/// Matches a failing command's diagnostics against known denial phrases.
/// Phrases vary across OS versions and locales; an unrecognized denial is
/// reported as a generic error.
pub(crate) fn is_permission_denied(stderr: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|pattern| pattern.is_match(stderr))
}

pub(crate) fn compile_patterns(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

/// Denials of AppleScript automation (Calendar, Reminders).
pub(crate) static AUTOMATION_DENIED: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_patterns(&[
        r"(?i)not authori[sz]ed",
        r"(?i)not allowed",
        r"-1743",
        r"(?i)access (is |was )?denied",
    ])
});

/// Maps a failed osascript call of a permission-gated collector. A denial
/// sets the permission to `denied`; timeouts and other failures leave it
/// `unknown`.
pub(crate) fn gated_failure<T>(
    category: Category,
    output: &ExecOutput,
    fallback: &str,
) -> CollectorResult<T> {
    if output.timed_out {
        return CollectorResult::timed_out(category).with_permission(PermissionState::Unknown);
    }
    if is_permission_denied(&output.stderr, &AUTOMATION_DENIED) {
        return CollectorResult::failed(
            category,
            ErrorCode::PermissionDenied,
            format!("{category} permission denied"),
        )
        .with_permission(PermissionState::Denied);
    }
    CollectorResult::failed(
        category,
        ErrorCode::Error,
        failure_message(&output.stderr, fallback),
    )
    .with_permission(PermissionState::Unknown)
}

/// Resolves a whole-second offset reported relative to `now`.
pub(crate) fn offset_timestamp(now: DateTime<Utc>, offset_secs: i64) -> String {
    (now + ChronoDuration::seconds(offset_secs)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn malformed_record(category: Category, record: &str) -> String {
    format!("{category}: skipped malformed record: {}", record.trim())
}

pub(crate) fn failure_message(stderr: &str, fallback: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Splits subprocess output into non-empty lines, accepting `\r` line ends
/// as produced by AppleScript.
pub(crate) fn output_lines(stdout: &str) -> impl Iterator<Item = &str> {
    stdout
        .split(['\n', '\r'])
        .filter(|line| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use chrono::{TimeZone, Utc};
    use tokio::time::Instant as TokioInstant;

    use super::{
        compile_patterns, gated_failure, is_permission_denied, malformed_record,
        offset_timestamp, output_lines, CollectContext, CollectorResult,
    };
    use crate::config::CollectOptions;
    use crate::exec::{ExecOutput, SystemRunner};
    use crate::model::{Category, ErrorCode, PermissionState};
    use crate::platform::Platform;

    #[test]
    fn unsupported_result_warns_without_error() {
        let result: CollectorResult<Vec<u32>> = CollectorResult::unsupported(
            Category::Apps,
            &Platform::Unsupported("windows".to_string()),
            Some(Vec::new()),
        );
        assert!(result.error.is_none());
        assert_eq!(result.data, Some(Vec::new()));
        assert_eq!(result.warnings, vec!["apps: unsupported platform windows"]);
    }

    #[test]
    fn builders_compose() {
        let result = CollectorResult::<u8>::timed_out(Category::Network)
            .with_warnings(vec!["w".to_string()])
            .with_elapsed(Instant::now());
        let error = result.error.expect("timeout error present");
        assert_eq!(error.code, Some(ErrorCode::Timeout));
        assert_eq!(error.module, "network");
        assert!(result.elapsed_ms.is_some());
        assert!(result.data.is_none());
    }

    #[test]
    fn denial_patterns_are_case_insensitive() {
        let patterns = compile_patterns(&[r"(?i)not authori[sz]ed"]);
        assert!(is_permission_denied("Error: Not Authorized to send", &patterns));
        assert!(!is_permission_denied("syntax error", &patterns));
    }

    #[test]
    fn output_lines_handles_carriage_returns() {
        let lines = output_lines("a\rb\r\n\nc\n").collect::<Vec<_>>();
        assert_eq!(lines, vec!["a", "b", "c"]);
        assert_eq!(
            malformed_record(Category::Apps, " x\tabc "),
            "apps: skipped malformed record: x\tabc"
        );
    }

    #[test]
    fn gated_failure_distinguishes_denial_timeout_and_error() {
        let denied: CollectorResult<()> = gated_failure(
            Category::Calendar,
            &ExecOutput::failure("Calendar got an error: Not authorized to send Apple events"),
            "failed",
        );
        assert_eq!(denied.permission, Some(PermissionState::Denied));
        assert_eq!(
            denied.error.and_then(|error| error.code),
            Some(ErrorCode::PermissionDenied)
        );

        let timed_out: CollectorResult<()> =
            gated_failure(Category::Reminders, &ExecOutput::timeout(), "failed");
        assert_eq!(timed_out.permission, Some(PermissionState::Unknown));
        assert_eq!(
            timed_out.error.and_then(|error| error.code),
            Some(ErrorCode::Timeout)
        );

        let other: CollectorResult<()> =
            gated_failure(Category::Reminders, &ExecOutput::failure(""), "failed");
        let error = other.error.expect("error present");
        assert_eq!(error.code, Some(ErrorCode::Error));
        assert_eq!(error.message, "failed");
    }

    #[test]
    fn offsets_resolve_against_the_given_clock() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(offset_timestamp(now, 5400), "2026-03-01T13:30:00Z");
        assert_eq!(offset_timestamp(now, -60), "2026-03-01T11:59:00Z");
    }

    #[test]
    fn command_budget_shrinks_towards_the_deadline() {
        let options = CollectOptions {
            timeout_ms: 400,
            ..CollectOptions::default()
        };
        let ctx = CollectContext::new(options, Platform::Linux, Arc::new(SystemRunner));
        assert_eq!(ctx.timeout(), Duration::from_millis(400));
        assert!(ctx.deadline().is_none());

        let expired = ctx.clone().with_deadline(TokioInstant::now());
        assert_eq!(expired.timeout(), Duration::ZERO);

        let later = ctx.with_deadline(TokioInstant::now() + Duration::from_millis(150));
        assert!(later.timeout() <= Duration::from_millis(150));
        assert!(later.timeout() > Duration::from_millis(100));
    }
}
