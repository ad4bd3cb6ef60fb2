use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    gated_failure, malformed_record, offset_timestamp, output_lines, CollectContext, Collector,
    CollectorResult,
};
use crate::model::{CalendarEvent, Category, PermissionState};
use crate::platform::Platform;
use crate::redact::SensitiveText;

pub const MAX_EVENTS: usize = 3;

/// Emits `title<TAB>start<TAB>end<TAB>location` for events starting in the
/// next 24 hours. Times are second offsets from "now", which keeps the output
/// independent of the user's date format.
const EVENTS_SCRIPT: &str = r#"
set nowDate to current date
set horizon to nowDate + (24 * hours)
set out to ""
tell application "Calendar"
  repeat with cal in calendars
    set evs to (every event of cal whose start date is greater than or equal to nowDate and start date is less than or equal to horizon)
    repeat with e in evs
      set loc to ""
      try
        set loc to location of e
      end try
      if loc is missing value then set loc to ""
      set out to out & (summary of e) & tab & (((start date of e) - nowDate) as integer) & tab & (((end date of e) - nowDate) as integer) & tab & loc & linefeed
    end repeat
  end repeat
end tell
return out
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarCollector;

#[async_trait]
impl Collector for CalendarCollector {
    type Output = Vec<CalendarEvent>;

    fn category(&self) -> Category {
        Category::Calendar
    }

    async fn collect(&self, ctx: &CollectContext) -> CollectorResult<Vec<CalendarEvent>> {
        let started = Instant::now();
        let result = match &ctx.platform {
            Platform::MacOs => collect_macos(ctx).await,
            Platform::Linux => CollectorResult::ok(Vec::new())
                .with_warnings(vec!["calendar: not available on linux".to_string()]),
            other => CollectorResult::unsupported(Category::Calendar, other, Some(Vec::new())),
        };
        result.with_elapsed(started)
    }
}

async fn collect_macos(ctx: &CollectContext) -> CollectorResult<Vec<CalendarEvent>> {
    let output = ctx
        .runner
        .run("osascript", &["-e", EVENTS_SCRIPT], ctx.timeout())
        .await;
    if output.timed_out || !output.succeeded {
        return gated_failure(Category::Calendar, &output, "Failed to read calendar events");
    }
    let (events, warnings) = parse_events(&output.stdout, Utc::now(), ctx.options.redact);
    CollectorResult::ok(events)
        .with_permission(PermissionState::Granted)
        .with_warnings(warnings)
}

pub fn parse_events(
    stdout: &str,
    now: DateTime<Utc>,
    redact: bool,
) -> (Vec<CalendarEvent>, Vec<String>) {
    let mut parsed = Vec::new();
    let mut warnings = Vec::new();

    for line in output_lines(stdout) {
        let fields = line.split('\t').collect::<Vec<_>>();
        let offsets = match fields.as_slice() {
            [_, start, end, ..] => start
                .trim()
                .parse::<i64>()
                .ok()
                .zip(end.trim().parse::<i64>().ok()),
            _ => None,
        };
        let Some((start, end)) = offsets else {
            warnings.push(malformed_record(Category::Calendar, line));
            continue;
        };

        let title = SensitiveText::from_raw(fields[0].trim(), redact);
        let location = fields
            .get(3)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(|value| SensitiveText::from_raw(value, redact))
            .unwrap_or_default();

        parsed.push((
            start,
            CalendarEvent {
                start: offset_timestamp(now, start),
                end: offset_timestamp(now, end),
                title: title.text,
                title_sha256: title.sha256,
                title_length: title.length,
                location: location.text,
                location_sha256: location.sha256,
                location_length: location.length,
            },
        ));
    }

    parsed.sort_by_key(|(start, _)| *start);
    let events = parsed
        .into_iter()
        .take(MAX_EVENTS)
        .map(|(_, event)| event)
        .collect();
    (events, warnings)
}
