use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{failure_message, CollectContext, Collector, CollectorResult};
use crate::model::{Battery, Category, ErrorCode, PowerSource};
use crate::platform::Platform;

const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";
const BATTERY_DIRS: &[&str] = &["BAT0", "BAT1"];

static PMSET_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)%;\s*([^;]+);").expect("pmset battery regex should compile")
});

static PMSET_SOURCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"drawing from '([^']+)'").expect("pmset source regex should compile")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct BatteryCollector;

#[async_trait]
impl Collector for BatteryCollector {
    type Output = Battery;

    fn category(&self) -> Category {
        Category::Battery
    }

    async fn collect(&self, ctx: &CollectContext) -> CollectorResult<Battery> {
        let started = Instant::now();
        let result = match &ctx.platform {
            Platform::MacOs => collect_macos(ctx).await,
            Platform::Linux => collect_linux(ctx).await,
            other => {
                CollectorResult::unsupported(Category::Battery, other, Some(Battery::default()))
            }
        };
        result.with_elapsed(started)
    }
}

async fn collect_macos(ctx: &CollectContext) -> CollectorResult<Battery> {
    let output = ctx
        .runner
        .run("pmset", &["-g", "batt"], ctx.timeout())
        .await;
    if output.timed_out {
        return CollectorResult::timed_out(Category::Battery);
    }
    if !output.succeeded {
        return CollectorResult::failed(
            Category::Battery,
            ErrorCode::Error,
            failure_message(&output.stderr, "Failed to read battery state"),
        );
    }
    match parse_pmset(&output.stdout) {
        Some(battery) => CollectorResult::ok(battery),
        None => CollectorResult::default()
            .with_warnings(vec!["battery: no battery reported by pmset".to_string()]),
    }
}

async fn collect_linux(ctx: &CollectContext) -> CollectorResult<Battery> {
    for dir in BATTERY_DIRS {
        let capacity = ctx
            .runner
            .read_file(&format!("{POWER_SUPPLY_ROOT}/{dir}/capacity"))
            .await;
        let Some(capacity) = capacity else {
            continue;
        };
        let status = ctx
            .runner
            .read_file(&format!("{POWER_SUPPLY_ROOT}/{dir}/status"))
            .await
            .unwrap_or_default();

        return match linux_battery(&capacity, &status) {
            Some(battery) => CollectorResult::ok(battery),
            None => CollectorResult::default().with_warnings(vec![format!(
                "battery: skipped malformed record: capacity {:?}",
                capacity.trim()
            )]),
        };
    }
    CollectorResult::default().with_warnings(vec!["battery: no battery detected".to_string()])
}

pub fn linux_battery(capacity: &str, status: &str) -> Option<Battery> {
    let capacity = capacity
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())?;
    let status = status.trim().to_lowercase();
    let is_charging = status == "charging" || status == "full";
    let power_source = match status.as_str() {
        "charging" | "full" => PowerSource::Ac,
        "discharging" => PowerSource::Battery,
        _ => PowerSource::Unknown,
    };
    Some(Battery {
        percentage: (capacity / 100.0).clamp(0.0, 1.0),
        is_charging,
        power_source,
    })
}

/// Parses `pmset -g batt`, e.g.
/// `Now drawing from 'AC Power'` / `-InternalBattery-0 (id=1)	85%; charging; 1:02 remaining`.
pub fn parse_pmset(stdout: &str) -> Option<Battery> {
    let captures = PMSET_LEVEL.captures(stdout)?;
    let percent = captures.get(1)?.as_str().parse::<f64>().ok()?;
    let state = captures.get(2)?.as_str().trim().to_lowercase();

    let power_source = match PMSET_SOURCE
        .captures(stdout)
        .and_then(|source| source.get(1))
        .map(|source| source.as_str())
    {
        Some("AC Power") => PowerSource::Ac,
        Some("Battery Power") => PowerSource::Battery,
        _ => PowerSource::Unknown,
    };
    let is_charging = matches!(state.as_str(), "charging" | "charged" | "finishing charge");

    Some(Battery {
        percentage: (percent / 100.0).clamp(0.0, 1.0),
        is_charging,
        power_source,
    })
}
