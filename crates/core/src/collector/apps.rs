use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    failure_message, malformed_record, output_lines, CollectContext, Collector, CollectorResult,
};
use crate::model::{AppEntry, Category, ErrorCode};
use crate::platform::Platform;

pub const MAX_APPS: usize = 50;

static PS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\S+)\s+(.+)$").expect("ps line regex should compile"));

/// Emits `name<TAB>pid<TAB>bundle` per foreground process.
const APPS_SCRIPT: &str = r#"
tell application "System Events"
  set out to ""
  set procs to (every process whose background only is false)
  set n to (count of procs)
  if n > 50 then set n to 50
  repeat with i from 1 to n
    set p to item i of procs
    set pname to name of p
    set pid to unix id of p
    set bid to ""
    try
      set bid to bundle identifier of p
    end try
    if bid is missing value then set bid to ""
    set out to out & pname & tab & (pid as string) & tab & bid & return
  end repeat
  return out
end tell
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct AppsCollector;

#[async_trait]
impl Collector for AppsCollector {
    type Output = Vec<AppEntry>;

    fn category(&self) -> Category {
        Category::Apps
    }

    async fn collect(&self, ctx: &CollectContext) -> CollectorResult<Vec<AppEntry>> {
        let started = Instant::now();
        let result = match &ctx.platform {
            Platform::MacOs => {
                list_with(ctx, "osascript", &["-e", APPS_SCRIPT], parse_osascript_apps).await
            }
            Platform::Linux => {
                list_with(ctx, "ps", &["-e", "-o", "pid=", "-o", "comm="], parse_ps_output).await
            }
            other => CollectorResult::unsupported(Category::Apps, other, Some(Vec::new())),
        };
        result.with_elapsed(started)
    }
}

async fn list_with(
    ctx: &CollectContext,
    program: &str,
    args: &[&str],
    parse: fn(&str) -> (Vec<AppEntry>, Vec<String>),
) -> CollectorResult<Vec<AppEntry>> {
    let output = ctx.runner.run(program, args, ctx.timeout()).await;
    if output.timed_out {
        return CollectorResult::timed_out(Category::Apps);
    }
    if !output.succeeded {
        return CollectorResult::failed(
            Category::Apps,
            ErrorCode::Error,
            failure_message(&output.stderr, "Failed to list apps"),
        );
    }
    let (apps, warnings) = parse(&output.stdout);
    CollectorResult::ok(apps).with_warnings(warnings)
}

/// Parses `name<TAB>pid<TAB>bundle` lines. The bundle id defaults to the name.
pub fn parse_osascript_apps(stdout: &str) -> (Vec<AppEntry>, Vec<String>) {
    let mut apps = Vec::new();
    let mut warnings = Vec::new();

    for line in output_lines(stdout) {
        let mut parts = line.split('\t');
        let name = parts.next().unwrap_or_default().trim();
        let pid = parts.next().unwrap_or_default().trim();
        let bundle = parts.next().unwrap_or_default().trim();

        match parse_pid(pid) {
            Some(pid) => {
                let name = if name.is_empty() { "unknown" } else { name };
                let bundle_id = if bundle.is_empty() { name } else { bundle };
                apps.push(AppEntry {
                    name: name.to_string(),
                    bundle_id: bundle_id.to_string(),
                    pid,
                });
            }
            None => warnings.push(malformed_record(Category::Apps, line)),
        }
        if apps.len() == MAX_APPS {
            break;
        }
    }

    (apps, warnings)
}

/// Parses `ps -o pid= -o comm=` output, newest pids first.
pub fn parse_ps_output(stdout: &str) -> (Vec<AppEntry>, Vec<String>) {
    let mut apps = Vec::new();
    let mut warnings = Vec::new();

    for line in output_lines(stdout) {
        let parsed = PS_LINE.captures(line).and_then(|captures| {
            let pid = parse_pid(captures.get(1)?.as_str())?;
            let name = captures.get(2)?.as_str().trim();
            Some((pid, name))
        });
        match parsed {
            Some((pid, name)) => apps.push(AppEntry {
                name: name.to_string(),
                bundle_id: name.to_string(),
                pid,
            }),
            None => warnings.push(malformed_record(Category::Apps, line)),
        }
    }

    apps.sort_by(|a, b| b.pid.cmp(&a.pid));
    apps.truncate(MAX_APPS);
    (apps, warnings)
}

fn parse_pid(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|pid| *pid > 0)
}

#[cfg(test)]
mod tests {
    use super::{parse_osascript_apps, parse_ps_output, MAX_APPS};

    #[test]
    fn ps_output_drops_non_numeric_pid_with_one_warning() {
        let stdout = "  412 firefox\n  abc broken\n";
        let (apps, warnings) = parse_ps_output(stdout);

        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].pid, 412);
        assert_eq!(apps[0].name, "firefox");
        assert_eq!(apps[0].bundle_id, "firefox");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("abc broken"));
    }

    #[test]
    fn ps_output_is_sorted_by_pid_descending_and_capped() {
        let stdout = (1..=60)
            .map(|pid| format!("{pid} proc{pid}"))
            .collect::<Vec<_>>()
            .join("\n");
        let (apps, warnings) = parse_ps_output(&stdout);

        assert!(warnings.is_empty());
        assert_eq!(apps.len(), MAX_APPS);
        assert_eq!(apps[0].pid, 60);
        assert_eq!(apps.last().map(|app| app.pid), Some(11));
    }

    #[test]
    fn osascript_output_handles_carriage_returns_and_missing_bundle() {
        let stdout = "Finder\t301\tcom.apple.finder\rTerminal\t455\t\rGhost\tnope\tx\r";
        let (apps, warnings) = parse_osascript_apps(stdout);

        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].bundle_id, "com.apple.finder");
        assert_eq!(apps[1].name, "Terminal");
        assert_eq!(apps[1].bundle_id, "Terminal");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Ghost"));
    }

    #[test]
    fn zero_pid_is_treated_as_malformed() {
        let (apps, warnings) = parse_ps_output("0 kernel\n");
        assert!(apps.is_empty());
        assert_eq!(warnings.len(), 1);
    }
}
