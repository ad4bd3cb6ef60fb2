//! Runs the collectors for one snapshot and merges their results.
//!
//! Host and frontmost run first, one after the other. Enabled optional
//! collectors are then started together and joined; none of them can cancel
//! or delay another beyond its own deadline. Every result is merged in
//! [`Category::ALL`] order by a single [`RunAccumulator`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant as TokioInstant};
use tracing::{debug, info, warn};

use crate::collector::{
    AppsCollector, BatteryCollector, CalendarCollector, ClipboardCollector, CollectContext,
    Collector, CollectorResult, FrontmostCollector, HostCollector, NetworkCollector,
    RemindersCollector,
};
use crate::config::CollectOptions;
use crate::exit::ExitCode;
use crate::model::{
    AppEntry, Battery, CalendarEvent, Category, Clipboard, DebugInfo, ErrorCode, Frontmost, Host,
    Network, PermissionState, Reminder, Report, StructuredError,
};
use crate::permissions::PermissionTracker;
use crate::platform::Platform;

/// Slack past a collector's deadline before it is dropped, so a command that
/// used up the remaining budget can still report its own timeout.
const DEADLINE_GRACE: Duration = Duration::from_millis(25);

/// One collector per category. Tests swap individual entries for fakes.
#[derive(Clone)]
pub struct Collectors {
    pub host: Arc<dyn Collector<Output = Host>>,
    pub frontmost: Arc<dyn Collector<Output = Frontmost>>,
    pub apps: Arc<dyn Collector<Output = Vec<AppEntry>>>,
    pub clipboard: Arc<dyn Collector<Output = Clipboard>>,
    pub battery: Arc<dyn Collector<Output = Battery>>,
    pub network: Arc<dyn Collector<Output = Network>>,
    pub calendar: Arc<dyn Collector<Output = Vec<CalendarEvent>>>,
    pub reminders: Arc<dyn Collector<Output = Vec<Reminder>>>,
}

impl Collectors {
    pub fn system() -> Self {
        Self {
            host: Arc::new(HostCollector),
            frontmost: Arc::new(FrontmostCollector),
            apps: Arc::new(AppsCollector),
            clipboard: Arc::new(ClipboardCollector),
            battery: Arc::new(BatteryCollector),
            network: Arc::new(NetworkCollector),
            calendar: Arc::new(CalendarCollector),
            reminders: Arc::new(RemindersCollector),
        }
    }
}

impl Default for Collectors {
    fn default() -> Self {
        Self::system()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub report: Report,
    pub exit_code: ExitCode,
}

/// Run-scoped aggregate of everything merged from collector results.
#[derive(Debug, Default)]
pub struct RunAccumulator {
    debug: bool,
    warnings: Vec<String>,
    errors: Vec<StructuredError>,
    timings: BTreeMap<String, u64>,
    permissions: PermissionTracker,
    outcomes: Vec<ExitCode>,
}

impl RunAccumulator {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    /// Merges one result and hands back its data for the report field.
    pub fn absorb<T>(&mut self, category: Category, result: CollectorResult<T>) -> Option<T> {
        let CollectorResult {
            data,
            warnings,
            error,
            permission,
            elapsed_ms,
        } = result;

        self.warnings.extend(warnings);

        if let (Some(state), Some(capability)) = (permission, category.capability()) {
            self.permissions.set(capability, state);
        }

        self.outcomes
            .push(ExitCode::from_outcome(error.as_ref(), permission));
        if let Some(mut error) = error {
            debug!(%category, message = %error.message, "collector reported error");
            error.module = category.as_str().to_string();
            self.errors.push(error);
        }

        if self.debug {
            if let Some(elapsed_ms) = elapsed_ms {
                self.timings.insert(category.as_str().to_string(), elapsed_ms);
            }
        }

        data
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::fold(self.outcomes.iter().copied())
    }

    /// Moves the accumulated state into `report`.
    pub fn finish(self, mut report: Report) -> Snapshot {
        let exit_code = self.exit_code();
        report.warnings = self.warnings;
        report.errors = self.errors;
        report.permissions = self.permissions.into_permissions();
        if self.debug {
            report.debug = Some(DebugInfo {
                timings_ms: self.timings,
            });
        }
        Snapshot { report, exit_code }
    }
}

/// Collects a snapshot using the real system commands.
pub async fn collect(options: CollectOptions) -> Snapshot {
    let ctx = CollectContext::system(options);
    collect_snapshot(&ctx, &Collectors::system()).await
}

pub async fn collect_snapshot(ctx: &CollectContext, collectors: &Collectors) -> Snapshot {
    let options = &ctx.options;
    info!(
        platform = %ctx.platform,
        timeout_ms = options.timeout().as_millis() as u64,
        "collecting snapshot"
    );

    let mut acc = RunAccumulator::new(options.debug);

    let host = join(Category::Host, Some(spawn(&collectors.host, ctx))).await;
    let host = acc.absorb(Category::Host, host);
    let frontmost = join(Category::Frontmost, Some(spawn(&collectors.frontmost, ctx))).await;
    let frontmost = acc.absorb(Category::Frontmost, frontmost);

    let apps = options
        .include_apps
        .then(|| spawn(&collectors.apps, ctx));
    let clipboard = options
        .include_clipboard
        .then(|| spawn(&collectors.clipboard, ctx));
    let battery = options
        .include_battery
        .then(|| spawn(&collectors.battery, ctx));
    let network = options
        .include_network
        .then(|| spawn(&collectors.network, ctx));
    let calendar = options
        .include_calendar
        .then(|| spawn(&collectors.calendar, ctx));
    let reminders = options
        .include_reminders
        .then(|| spawn(&collectors.reminders, ctx));

    let apps = join(Category::Apps, apps).await;
    let clipboard = join(Category::Clipboard, clipboard).await;
    let battery = join(Category::Battery, battery).await;
    let network = join(Category::Network, network).await;
    let calendar = join(Category::Calendar, calendar).await;
    let reminders = join(Category::Reminders, reminders).await;

    let mut report = Report::empty(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    report.host = host;
    report.frontmost = frontmost;
    report.apps = acc.absorb(Category::Apps, apps);
    report.clipboard = acc.absorb(Category::Clipboard, clipboard);
    report.battery = acc.absorb(Category::Battery, battery);
    report.network = acc.absorb(Category::Network, network);
    report.calendar = acc.absorb(Category::Calendar, calendar);
    report.reminders = acc.absorb(Category::Reminders, reminders);

    let snapshot = acc.finish(report);
    info!(
        exit_code = snapshot.exit_code.as_i32(),
        errors = snapshot.report.errors.len(),
        warnings = snapshot.report.warnings.len(),
        "snapshot complete"
    );
    snapshot
}

/// Starts a collector under its own deadline. Commands it issues share the
/// remaining budget; a collector still running shortly after the deadline is
/// dropped, which kills its child processes, and reported as timed out.
fn spawn<T: Send + 'static>(
    collector: &Arc<dyn Collector<Output = T>>,
    ctx: &CollectContext,
) -> JoinHandle<CollectorResult<T>> {
    let collector = Arc::clone(collector);
    let started = TokioInstant::now();
    let deadline = started + ctx.options.timeout();
    let ctx = ctx.clone().with_deadline(deadline);
    tokio::spawn(async move {
        match timeout_at(deadline + DEADLINE_GRACE, collector.collect(&ctx)).await {
            Ok(result) => result,
            Err(_) => {
                let category = collector.category();
                warn!(%category, "collector exceeded its deadline");
                overdue(category, &ctx.platform).with_elapsed(started.into_std())
            }
        }
    })
}

/// Result for a collector cut off at its deadline. A gated macOS collector
/// never learned its permission state.
fn overdue<T>(category: Category, platform: &Platform) -> CollectorResult<T> {
    let result = CollectorResult::timed_out(category);
    match (platform, category.capability()) {
        (Platform::MacOs, Some(_)) => result.with_permission(PermissionState::Unknown),
        _ => result,
    }
}

/// Awaits a spawned collector. A disabled collector contributes an empty
/// result; a panicked or cancelled task becomes a generic error.
async fn join<T>(
    category: Category,
    handle: Option<JoinHandle<CollectorResult<T>>>,
) -> CollectorResult<T> {
    let Some(handle) = handle else {
        return CollectorResult::default();
    };
    match handle.await {
        Ok(result) => {
            debug!(%category, elapsed_ms = ?result.elapsed_ms, "collector finished");
            result
        }
        Err(err) => {
            warn!(%category, "collector task failed: {}", err);
            CollectorResult::failed(
                category,
                ErrorCode::Error,
                format!("collector task failed: {err}"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{overdue, RunAccumulator};
    use crate::collector::CollectorResult;
    use crate::exit::ExitCode;
    use crate::model::{Category, ErrorCode, PermissionState, Report};
    use crate::platform::Platform;

    #[test]
    fn accumulator_merges_in_call_order() {
        let mut acc = RunAccumulator::new(false);
        let host = acc.absorb(
            Category::Host,
            CollectorResult::ok(1u8).with_warnings(vec!["first".to_string()]),
        );
        let apps: Option<u8> = acc.absorb(
            Category::Apps,
            CollectorResult::timed_out(Category::Apps).with_warnings(vec!["second".to_string()]),
        );
        assert_eq!(host, Some(1));
        assert_eq!(apps, None);

        let snapshot = acc.finish(Report::empty("now"));
        assert_eq!(snapshot.report.warnings, vec!["first", "second"]);
        assert_eq!(snapshot.report.errors.len(), 1);
        assert_eq!(snapshot.report.errors[0].module, "apps");
        assert_eq!(snapshot.exit_code, ExitCode::Timeout);
        assert!(snapshot.report.debug.is_none());
    }

    #[test]
    fn permissions_only_recorded_for_gated_categories() {
        let mut acc = RunAccumulator::new(false);
        acc.absorb(
            Category::Battery,
            CollectorResult::ok(()).with_permission(PermissionState::Denied),
        );
        acc.absorb(
            Category::Reminders,
            CollectorResult::<()>::failed(
                Category::Reminders,
                ErrorCode::PermissionDenied,
                "reminders permission denied",
            )
            .with_permission(PermissionState::Denied),
        );

        let snapshot = acc.finish(Report::empty("now"));
        assert_eq!(snapshot.report.permissions.reminders, PermissionState::Denied);
        assert_eq!(
            snapshot.report.permissions.calendar,
            PermissionState::NotRequested
        );
        assert_eq!(snapshot.exit_code.as_i32(), 2);
    }

    #[test]
    fn timings_recorded_only_in_debug_mode() {
        let mut result = CollectorResult::ok(());
        result.elapsed_ms = Some(12);

        let mut debug = RunAccumulator::new(true);
        debug.absorb(Category::Network, result.clone());
        let debug = debug.finish(Report::empty("now"));
        let timings = debug.report.debug.expect("debug info present").timings_ms;
        assert_eq!(timings.get("network"), Some(&12));

        let mut quiet = RunAccumulator::new(false);
        quiet.absorb(Category::Network, result);
        assert!(quiet.finish(Report::empty("now")).report.debug.is_none());
    }

    #[test]
    fn overdue_gated_collector_leaves_permission_unknown() {
        let calendar: CollectorResult<()> = overdue(Category::Calendar, &Platform::MacOs);
        assert_eq!(calendar.permission, Some(PermissionState::Unknown));
        assert_eq!(
            calendar.error.and_then(|error| error.code),
            Some(ErrorCode::Timeout)
        );

        let on_linux: CollectorResult<()> = overdue(Category::Calendar, &Platform::Linux);
        assert!(on_linux.permission.is_none());
        let battery: CollectorResult<()> = overdue(Category::Battery, &Platform::MacOs);
        assert!(battery.permission.is_none());
    }
}
