use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{failure_message, CollectContext, Collector, CollectorResult};
use crate::model::{Category, ErrorCode, Network};
use crate::platform::Platform;

static ROUTE_DEV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"dev\s+(\S+)").expect("route dev regex should compile"));

static ROUTE_INTERFACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*interface:\s*(\S+)").expect("route interface regex should compile")
});

static INET_V4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"inet\s+\d+\.\d+\.\d+\.\d+").expect("inet regex should compile")
});

static AIRPORT_NETWORK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Current Wi-Fi Network:\s*(.+)").expect("airport regex should compile")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkCollector;

#[async_trait]
impl Collector for NetworkCollector {
    type Output = Network;

    fn category(&self) -> Category {
        Category::Network
    }

    async fn collect(&self, ctx: &CollectContext) -> CollectorResult<Network> {
        let started = Instant::now();
        let result = match &ctx.platform {
            Platform::MacOs => collect_macos(ctx).await,
            Platform::Linux => collect_linux(ctx).await,
            other => {
                CollectorResult::unsupported(Category::Network, other, Some(Network::default()))
            }
        };
        result.with_elapsed(started)
    }
}

async fn collect_linux(ctx: &CollectContext) -> CollectorResult<Network> {
    let route = ctx
        .runner
        .run("ip", &["route", "show", "default"], ctx.timeout())
        .await;
    if route.timed_out {
        return CollectorResult::timed_out(Category::Network);
    }
    if !route.succeeded {
        return CollectorResult::failed(
            Category::Network,
            ErrorCode::Error,
            failure_message(&route.stderr, "Failed to read default route"),
        );
    }

    let Some(interface) = parse_default_dev(&route.stdout) else {
        return CollectorResult::ok(Network::default());
    };

    let mut warnings = Vec::new();
    let iwgetid = ctx
        .runner
        .run("iwgetid", &["-r", interface.as_str()], ctx.timeout())
        .await;
    if iwgetid.timed_out {
        warnings.push(step_timed_out("ssid lookup"));
    }
    let ssid = iwgetid.trimmed_stdout().map(str::to_string);

    let operstate = ctx
        .runner
        .read_file(&format!("/sys/class/net/{interface}/operstate"))
        .await
        .unwrap_or_default();
    let has_internet = if operstate.trim() == "up" {
        let addr = ctx
            .runner
            .run("ip", &["-4", "addr", "show", interface.as_str()], ctx.timeout())
            .await;
        if addr.timed_out {
            warnings.push(step_timed_out("address lookup"));
        }
        addr.succeeded && INET_V4.is_match(&addr.stdout)
    } else {
        false
    };

    CollectorResult::ok(Network {
        primary_interface: interface,
        ssid,
        has_internet,
    })
    .with_warnings(warnings)
}

async fn collect_macos(ctx: &CollectContext) -> CollectorResult<Network> {
    let route = ctx
        .runner
        .run("route", &["-n", "get", "default"], ctx.timeout())
        .await;
    if route.timed_out {
        return CollectorResult::timed_out(Category::Network);
    }
    // No default route means offline, not a failure.
    let Some(interface) = route
        .succeeded
        .then(|| parse_route_interface(&route.stdout))
        .flatten()
    else {
        return CollectorResult::ok(Network::default());
    };

    let timeout = ctx.timeout();
    let airport_args = ["-getairportnetwork", interface.as_str()];
    let ifconfig_args = [interface.as_str()];
    let (airport, ifconfig) = tokio::join!(
        ctx.runner.run("networksetup", &airport_args, timeout),
        ctx.runner.run("ifconfig", &ifconfig_args, timeout),
    );

    let mut warnings = Vec::new();
    if airport.timed_out {
        warnings.push(step_timed_out("ssid lookup"));
    }
    if ifconfig.timed_out {
        warnings.push(step_timed_out("address lookup"));
    }
    let ssid = airport.trimmed_stdout().and_then(parse_airport_network);
    let has_internet = ifconfig.succeeded && ifconfig_is_active(&ifconfig.stdout);

    CollectorResult::ok(Network {
        primary_interface: interface,
        ssid,
        has_internet,
    })
    .with_warnings(warnings)
}

fn step_timed_out(step: &str) -> String {
    format!("{}: {step} timed out", Category::Network)
}

pub fn parse_default_dev(stdout: &str) -> Option<String> {
    let first = stdout.lines().find(|line| !line.trim().is_empty())?;
    ROUTE_DEV
        .captures(first)
        .and_then(|captures| captures.get(1))
        .map(|dev| dev.as_str().to_string())
}

pub fn parse_route_interface(stdout: &str) -> Option<String> {
    ROUTE_INTERFACE
        .captures(stdout)
        .and_then(|captures| captures.get(1))
        .map(|interface| interface.as_str().to_string())
}

pub fn parse_airport_network(stdout: &str) -> Option<String> {
    AIRPORT_NETWORK
        .captures(stdout)
        .and_then(|captures| captures.get(1))
        .map(|ssid| ssid.as_str().trim().to_string())
        .filter(|ssid| !ssid.is_empty())
}

pub fn ifconfig_is_active(stdout: &str) -> bool {
    stdout.contains("status: active") && INET_V4.is_match(stdout)
}
