use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use context_snapshot_core::{collect, resolve_timeout_ms, serialize_report, CollectOptions};
use tracing_subscriber::EnvFilter;

const PRIVACY_NOTE: &str = "\
Privacy:
  Only host and frontmost app identity are collected by default. Clipboard,
  window titles, calendar and reminders are opt-in; --redact replaces their
  text with a SHA-256 digest and length. No screenshots, keystrokes or
  recordings are ever taken.

Permissions (macOS):
  --frontmost-window needs Accessibility; --calendar and --reminders need
  Automation access to Calendar and Reminders.

Exit codes:
  0 success, 2 permission denied, 3 timeout, 4 other error";

#[derive(Debug, Parser)]
#[command(
    name = "context",
    version,
    about = "Print a JSON snapshot of the local machine context.",
    after_help = PRIVACY_NOTE
)]
struct Cli {
    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,

    /// Include clipboard text.
    #[arg(long)]
    clipboard: bool,

    /// Include the frontmost window title.
    #[arg(long = "frontmost-window")]
    frontmost_window: bool,

    /// Include running applications.
    #[arg(long)]
    apps: bool,

    /// Include battery state.
    #[arg(long)]
    battery: bool,

    /// Include primary network interface.
    #[arg(long)]
    network: bool,

    /// Include upcoming calendar events.
    #[arg(long)]
    calendar: bool,

    /// Include incomplete reminders.
    #[arg(long)]
    reminders: bool,

    /// Replace sensitive text with a digest and length.
    #[arg(long)]
    redact: bool,

    /// Per-collector timeout in milliseconds.
    #[arg(long = "timeout-ms", value_name = "N", allow_hyphen_values = true)]
    timeout_ms: Option<String>,

    /// Add per-collector timings under `_debug`.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_options(self) -> CollectOptions {
        CollectOptions {
            pretty: self.pretty,
            include_clipboard: self.clipboard,
            include_frontmost_window: self.frontmost_window,
            include_apps: self.apps,
            include_battery: self.battery,
            include_network: self.network,
            include_calendar: self.calendar,
            include_reminders: self.reminders,
            redact: self.redact,
            debug: self.debug,
            timeout_ms: resolve_timeout_ms(self.timeout_ms.as_deref()),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let options = Cli::parse().into_options();
    let pretty = options.pretty;

    let snapshot = collect(options).await;
    let json = serialize_report(&snapshot.report, pretty).context("failed to serialize report")?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{json}").context("failed to write report")?;
    stdout.flush().context("failed to flush stdout")?;

    std::process::exit(snapshot.exit_code.as_i32());
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
