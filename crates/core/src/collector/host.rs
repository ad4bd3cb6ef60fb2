use std::env;
use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{CollectContext, Collector, CollectorResult};
use crate::model::{Category, Host, HostOs};

const UNKNOWN: &str = "unknown";
const DEFAULT_LOCALE: &str = "en-US";
const DEFAULT_TIMEZONE: &str = "UTC";

static VERSION_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^VERSION_ID="?([^"\n]+)"?"#).expect("VERSION_ID regex should compile")
});

static PRETTY_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^PRETTY_NAME="?([^"\n]+)"?"#).expect("PRETTY_NAME regex should compile")
});

/// OS identity, architecture, locale and timezone. Always runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCollector;

#[async_trait]
impl Collector for HostCollector {
    type Output = Host;

    fn category(&self) -> Category {
        Category::Host
    }

    async fn collect(&self, ctx: &CollectContext) -> CollectorResult<Host> {
        let started = Instant::now();
        let result = match ctx.platform.host_os() {
            Some(os @ HostOs::Macos) => collect_macos(ctx, os).await,
            Some(os @ HostOs::Linux) => collect_linux(ctx, os).await,
            None => CollectorResult::unsupported(Category::Host, &ctx.platform, None),
        };
        result.with_elapsed(started)
    }
}

async fn collect_macos(ctx: &CollectContext, os: HostOs) -> CollectorResult<Host> {
    let timeout = ctx.timeout();
    let (version, machine) = tokio::join!(
        ctx.runner.run("sw_vers", &["-productVersion"], timeout),
        ctx.runner.run("uname", &["-m"], timeout),
    );
    if version.timed_out || machine.timed_out {
        return CollectorResult::timed_out(Category::Host);
    }

    let locale = match env_locale() {
        Some(locale) => locale,
        None => {
            let apple = ctx
                .runner
                .run("defaults", &["read", "-g", "AppleLocale"], ctx.timeout())
                .await;
            normalize_locale(apple.trimmed_stdout())
        }
    };

    CollectorResult::ok(Host {
        os,
        os_version: version.trimmed_stdout().unwrap_or(UNKNOWN).to_string(),
        machine: machine.trimmed_stdout().unwrap_or(UNKNOWN).to_string(),
        locale,
        timezone: resolve_timezone(ctx).await,
    })
}

async fn collect_linux(ctx: &CollectContext, os: HostOs) -> CollectorResult<Host> {
    let (os_release, machine) = tokio::join!(
        ctx.runner.read_file("/etc/os-release"),
        ctx.runner.run("uname", &["-m"], ctx.timeout()),
    );
    if machine.timed_out {
        return CollectorResult::timed_out(Category::Host);
    }

    let mut warnings = Vec::new();
    let os_version = match os_release {
        Some(content) => parse_os_release(&content),
        None => {
            warnings.push("host: /etc/os-release not readable".to_string());
            UNKNOWN.to_string()
        }
    };

    CollectorResult::ok(Host {
        os,
        os_version,
        machine: machine.trimmed_stdout().unwrap_or(UNKNOWN).to_string(),
        locale: env_locale().unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        timezone: resolve_timezone(ctx).await,
    })
    .with_warnings(warnings)
}

pub fn parse_os_release(content: &str) -> String {
    VERSION_ID
        .captures(content)
        .or_else(|| PRETTY_NAME.captures(content))
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn env_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
        .map(|value| normalize_locale(Some(&value)))
}

/// `en_US.UTF-8` becomes `en-US`; `C`, `POSIX` and empty fall back to `en-US`.
pub fn normalize_locale(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return DEFAULT_LOCALE.to_string();
    };
    let base = raw.split(['.', '@']).next().unwrap_or(raw);
    if base.is_empty() || base == "C" || base == "POSIX" {
        return DEFAULT_LOCALE.to_string();
    }
    base.replace('_', "-")
}

async fn resolve_timezone(ctx: &CollectContext) -> String {
    if let Some(tz) = env::var("TZ")
        .ok()
        .map(|value| value.trim_start_matches(':').trim().to_string())
        .filter(|value| !value.is_empty())
    {
        return tz;
    }
    let link = ctx
        .runner
        .run("readlink", &["/etc/localtime"], ctx.timeout())
        .await;
    link.trimmed_stdout()
        .and_then(timezone_from_link)
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string())
}

pub fn timezone_from_link(target: &str) -> Option<String> {
    let (_, zone) = target.split_once("zoneinfo/")?;
    let zone = zone.trim().trim_matches('/');
    (!zone.is_empty()).then(|| zone.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_locale, parse_os_release, timezone_from_link};

    #[test]
    fn os_release_prefers_version_id() {
        let content = "NAME=\"Ubuntu\"\nPRETTY_NAME=\"Ubuntu 24.04 LTS\"\nVERSION_ID=\"24.04\"\n";
        assert_eq!(parse_os_release(content), "24.04");
    }

    #[test]
    fn os_release_falls_back_to_pretty_name_then_unknown() {
        assert_eq!(
            parse_os_release("PRETTY_NAME=\"Arch Linux\"\n"),
            "Arch Linux"
        );
        assert_eq!(parse_os_release("NAME=foo\n"), "unknown");
    }

    #[test]
    fn locale_is_normalized_to_bcp47() {
        assert_eq!(normalize_locale(Some("en_US.UTF-8")), "en-US");
        assert_eq!(normalize_locale(Some("de_DE@euro")), "de-DE");
        assert_eq!(normalize_locale(Some("C")), "en-US");
        assert_eq!(normalize_locale(Some("POSIX")), "en-US");
        assert_eq!(normalize_locale(None), "en-US");
    }

    #[test]
    fn timezone_is_taken_from_zoneinfo_suffix() {
        assert_eq!(
            timezone_from_link("/usr/share/zoneinfo/Europe/Berlin").as_deref(),
            Some("Europe/Berlin")
        );
        assert_eq!(
            timezone_from_link("/var/db/timezone/zoneinfo/America/New_York").as_deref(),
            Some("America/New_York")
        );
        assert_eq!(timezone_from_link("/etc/localtime"), None);
    }
}
