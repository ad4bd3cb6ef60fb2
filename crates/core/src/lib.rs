pub mod collector;
pub mod config;
pub mod error;
pub mod exec;
pub mod exit;
pub mod json;
pub mod model;
pub mod orchestrator;
pub mod permissions;
pub mod platform;
pub mod redact;

pub use collector::{CollectContext, Collector, CollectorResult};
pub use config::{resolve_timeout_ms, CollectOptions, DEFAULT_TIMEOUT_MS};
pub use error::{Result, SnapshotError};
pub use exec::{CommandRunner, ExecOutput, SystemRunner};
pub use exit::ExitCode;
pub use json::{serialize_report, to_stable_json, to_stable_string};
pub use model::{
    AppEntry, Battery, CalendarEvent, Capability, Category, Clipboard, DebugInfo, ErrorCode,
    Frontmost, Host, HostOs, Network, PermissionState, Permissions, PowerSource, Reminder, Report,
    StructuredError, SCHEMA_VERSION,
};
pub use orchestrator::{collect, collect_snapshot, Collectors, RunAccumulator, Snapshot};
pub use permissions::PermissionTracker;
pub use platform::Platform;
pub use redact::{redact, sha256_hex, utf16_len, Redacted, SensitiveText};
