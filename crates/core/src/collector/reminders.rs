use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    gated_failure, malformed_record, offset_timestamp, output_lines, CollectContext, Collector,
    CollectorResult,
};
use crate::model::{Category, PermissionState, Reminder};
use crate::platform::Platform;
use crate::redact::SensitiveText;

pub const MAX_REMINDERS: usize = 10;

/// Emits `title<TAB>due<TAB>list` for incomplete reminders; `due` is a second
/// offset from "now" or empty.
const REMINDERS_SCRIPT: &str = r#"
set nowDate to current date
set out to ""
tell application "Reminders"
  repeat with r in (reminders whose completed is false)
    set d to ""
    try
      set dd to due date of r
      if dd is not missing value then set d to ((dd - nowDate) as integer) as string
    end try
    set out to out & (name of r) & tab & d & tab & (name of container of r) & linefeed
  end repeat
end tell
return out
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct RemindersCollector;

#[async_trait]
impl Collector for RemindersCollector {
    type Output = Vec<Reminder>;

    fn category(&self) -> Category {
        Category::Reminders
    }

    async fn collect(&self, ctx: &CollectContext) -> CollectorResult<Vec<Reminder>> {
        let started = Instant::now();
        let result = match &ctx.platform {
            Platform::MacOs => collect_macos(ctx).await,
            Platform::Linux => CollectorResult::ok(Vec::new())
                .with_warnings(vec!["reminders: not available on linux".to_string()]),
            other => CollectorResult::unsupported(Category::Reminders, other, Some(Vec::new())),
        };
        result.with_elapsed(started)
    }
}

async fn collect_macos(ctx: &CollectContext) -> CollectorResult<Vec<Reminder>> {
    let output = ctx
        .runner
        .run("osascript", &["-e", REMINDERS_SCRIPT], ctx.timeout())
        .await;
    if output.timed_out || !output.succeeded {
        return gated_failure(Category::Reminders, &output, "Failed to read reminders");
    }
    let (reminders, warnings) = parse_reminders(&output.stdout, Utc::now(), ctx.options.redact);
    CollectorResult::ok(reminders)
        .with_permission(PermissionState::Granted)
        .with_warnings(warnings)
}

pub fn parse_reminders(
    stdout: &str,
    now: DateTime<Utc>,
    redact: bool,
) -> (Vec<Reminder>, Vec<String>) {
    let mut reminders = Vec::new();
    let mut warnings = Vec::new();

    for line in output_lines(stdout) {
        if reminders.len() == MAX_REMINDERS {
            break;
        }
        let mut fields = line.split('\t');
        let title = fields.next().unwrap_or_default().trim();
        let due = fields.next().unwrap_or_default().trim();
        let list = fields.next().unwrap_or_default().trim();

        let due = if due.is_empty() {
            None
        } else {
            match due.parse::<i64>() {
                Ok(offset) => Some(offset_timestamp(now, offset)),
                Err(_) => {
                    warnings.push(malformed_record(Category::Reminders, line));
                    continue;
                }
            }
        };

        let title = SensitiveText::from_raw(title, redact);
        reminders.push(Reminder {
            title: title.text,
            title_sha256: title.sha256,
            title_length: title.length,
            due,
            list: (!list.is_empty()).then(|| list.to_string()),
        });
    }

    (reminders, warnings)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{parse_reminders, MAX_REMINDERS};

    #[test]
    fn parses_due_offsets_and_lists() {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        let (reminders, warnings) =
            parse_reminders("Pay rent\t86400\tHome\nCall Sam\t\tWork\n", now, false);

        assert!(warnings.is_empty());
        assert_eq!(reminders.len(), 2);
        assert_eq!(reminders[0].due.as_deref(), Some("2026-05-05T09:00:00Z"));
        assert_eq!(reminders[0].list.as_deref(), Some("Home"));
        assert!(reminders[1].due.is_none());
    }

    #[test]
    fn unparsable_due_is_dropped_and_list_is_capped() {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        let mut stdout = String::from("Bad\ttomorrow\tHome\n");
        for index in 0..15 {
            stdout.push_str(&format!("Task {index}\t\tInbox\n"));
        }
        let (reminders, warnings) = parse_reminders(&stdout, now, true);

        assert_eq!(warnings.len(), 1);
        assert_eq!(reminders.len(), MAX_REMINDERS);
        assert!(reminders.iter().all(|reminder| reminder.title.is_none()));
        assert!(reminders.iter().all(|reminder| reminder.title_sha256.is_some()));
    }
}
