use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    compile_patterns, failure_message, is_permission_denied, CollectContext, Collector,
    CollectorResult,
};
use crate::model::{Category, ErrorCode, Frontmost, PermissionState};
use crate::platform::Platform;
use crate::redact::SensitiveText;

static ACCESSIBILITY_DENIED: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_patterns(&[
        r"(?i)not authori[sz]ed to send apple events",
        r"(?i)accessibility",
        r"(?i)not allowed to send",
        r"(?i)assistive access",
    ])
});

const FRONT_APP_SCRIPT: &str =
    r#"tell application "System Events" to get name of first application process whose frontmost is true"#;
const FRONT_WINDOW_SCRIPT: &str = r#"tell application "System Events" to tell (first application process whose frontmost is true) to get name of front window"#;

/// Foreground application and, when requested, its window title.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontmostCollector;

#[async_trait]
impl Collector for FrontmostCollector {
    type Output = Frontmost;

    fn category(&self) -> Category {
        Category::Frontmost
    }

    async fn collect(&self, ctx: &CollectContext) -> CollectorResult<Frontmost> {
        let started = Instant::now();
        let result = match &ctx.platform {
            Platform::MacOs => collect_macos(ctx).await,
            Platform::Linux => collect_linux(ctx).await,
            other => {
                CollectorResult::unsupported(Category::Frontmost, other, Some(Frontmost::unknown()))
            }
        };
        result.with_elapsed(started)
    }
}

async fn collect_macos(ctx: &CollectContext) -> CollectorResult<Frontmost> {
    let name = ctx
        .runner
        .run("osascript", &["-e", FRONT_APP_SCRIPT], ctx.timeout())
        .await;

    if name.timed_out {
        return CollectorResult::timed_out(Category::Frontmost);
    }
    if !name.succeeded {
        if is_permission_denied(&name.stderr, &ACCESSIBILITY_DENIED) {
            return CollectorResult::failed(
                Category::Frontmost,
                ErrorCode::PermissionDenied,
                "Accessibility permission required for frontmost app",
            )
            .with_permission(PermissionState::Denied);
        }
        return CollectorResult::failed(
            Category::Frontmost,
            ErrorCode::Error,
            failure_message(&name.stderr, "Failed to get frontmost app"),
        );
    }

    let Some(app_name) = name.trimmed_stdout().map(str::to_string) else {
        return CollectorResult::ok(Frontmost::unknown()).with_permission(PermissionState::Granted);
    };

    let id_script = format!(r#"id of application "{}""#, app_name.replace('"', "\\\""));
    let bundle = ctx
        .runner
        .run("osascript", &["-e", id_script.as_str()], ctx.timeout())
        .await;
    let mut frontmost = Frontmost {
        bundle_id: bundle.trimmed_stdout().unwrap_or("unknown").to_string(),
        app_name,
        ..Frontmost::unknown()
    };

    let mut warnings = Vec::new();
    if ctx.options.include_frontmost_window {
        let window = ctx
            .runner
            .run("osascript", &["-e", FRONT_WINDOW_SCRIPT], ctx.timeout())
            .await;
        if window.timed_out {
            warnings.push("frontmost window: timeout".to_string());
        } else if !window.succeeded {
            if is_permission_denied(&window.stderr, &ACCESSIBILITY_DENIED) {
                return CollectorResult::failed(
                    Category::Frontmost,
                    ErrorCode::PermissionDenied,
                    "Accessibility permission required for window title",
                )
                .with_data(frontmost)
                .with_permission(PermissionState::Denied)
                .with_warnings(warnings);
            }
            warnings.push(format!(
                "frontmost window: {}",
                failure_message(&window.stderr, "unknown")
            ));
        } else {
            apply_window_title(&mut frontmost, window.stdout.trim(), ctx.options.redact);
        }
    }

    CollectorResult::ok(frontmost)
        .with_permission(PermissionState::Granted)
        .with_warnings(warnings)
}

async fn collect_linux(ctx: &CollectContext) -> CollectorResult<Frontmost> {
    // xdotool needs X11; under Wayland it fails and the app stays unknown.
    let pid = ctx
        .runner
        .run("xdotool", &["getactivewindow", "getwindowpid"], ctx.timeout())
        .await;
    if pid.timed_out {
        return CollectorResult::timed_out(Category::Frontmost);
    }

    let mut warnings = Vec::new();
    let mut frontmost = Frontmost::unknown();

    if let Some(raw_pid) = pid.trimmed_stdout() {
        match raw_pid.parse::<u32>() {
            Ok(pid) => {
                let comm = ctx.runner.read_file(&format!("/proc/{pid}/comm")).await;
                if let Some(name) = comm.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                    frontmost.app_name = name.to_string();
                    frontmost.bundle_id = name.to_string();
                }
            }
            Err(_) => warnings.push(format!("frontmost: unexpected window pid {raw_pid:?}")),
        }
    }

    if ctx.options.include_frontmost_window {
        if !pid.succeeded {
            warnings.push(
                "frontmost: xdotool not available or no X11 (e.g. Wayland); install xdotool for X11"
                    .to_string(),
            );
        } else {
            let title = ctx
                .runner
                .run("xdotool", &["getactivewindow", "getwindowname"], ctx.timeout())
                .await;
            if title.timed_out {
                warnings.push("frontmost window: timeout".to_string());
            } else if title.succeeded {
                apply_window_title(&mut frontmost, title.stdout.trim(), ctx.options.redact);
            }
        }
    }

    CollectorResult::ok(frontmost).with_warnings(warnings)
}

fn apply_window_title(frontmost: &mut Frontmost, raw: &str, redact: bool) {
    let title = SensitiveText::from_raw(raw, redact);
    frontmost.window_title = title.text;
    frontmost.window_title_sha256 = title.sha256;
    frontmost.window_title_length = title.length;
}

#[cfg(test)]
mod tests {
    use super::{apply_window_title, ACCESSIBILITY_DENIED};
    use crate::collector::is_permission_denied;
    use crate::model::Frontmost;

    #[test]
    fn recognizes_accessibility_denials() {
        assert!(is_permission_denied(
            "execution error: Not authorised to send Apple events to System Events. (-1743)",
            &ACCESSIBILITY_DENIED
        ));
        assert!(is_permission_denied(
            "osascript is not allowed assistive access.",
            &ACCESSIBILITY_DENIED
        ));
        assert!(!is_permission_denied(
            "syntax error: Expected end of line",
            &ACCESSIBILITY_DENIED
        ));
    }

    #[test]
    fn redacted_window_title_keeps_only_digest_and_length() {
        let mut frontmost = Frontmost::unknown();
        apply_window_title(&mut frontmost, "Inbox - private@example.com", true);
        assert!(frontmost.window_title.is_none());
        assert_eq!(frontmost.window_title_length, Some(27));
        assert_eq!(
            frontmost.window_title_sha256.as_deref().map(str::len),
            Some(64)
        );
    }
}
