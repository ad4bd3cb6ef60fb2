use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: &str = "0.1.0";

/// One data category gathered by a collector, in merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Host,
    Frontmost,
    Apps,
    Clipboard,
    Battery,
    Network,
    Calendar,
    Reminders,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Host,
        Category::Frontmost,
        Category::Apps,
        Category::Clipboard,
        Category::Battery,
        Category::Network,
        Category::Calendar,
        Category::Reminders,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Host => "host",
            Category::Frontmost => "frontmost",
            Category::Apps => "apps",
            Category::Clipboard => "clipboard",
            Category::Battery => "battery",
            Category::Network => "network",
            Category::Calendar => "calendar",
            Category::Reminders => "reminders",
        }
    }

    /// The permission-gated capability this category exercises, if any.
    pub fn capability(self) -> Option<Capability> {
        match self {
            Category::Frontmost => Some(Capability::Accessibility),
            Category::Calendar => Some(Capability::Calendar),
            Category::Reminders => Some(Capability::Reminders),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Accessibility,
    Calendar,
    Reminders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    #[default]
    NotRequested,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Permissions {
    pub accessibility: PermissionState,
    pub calendar: PermissionState,
    pub reminders: PermissionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Timeout,
    PermissionDenied,
    Error,
    Unsupported,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Timeout => "timeout",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::Error => "error",
            ErrorCode::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredError {
    pub module: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl StructuredError {
    pub fn new(category: Category, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            module: category.as_str().to_string(),
            message: message.into(),
            code: Some(code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostOs {
    Macos,
    Linux,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub os: HostOs,
    pub os_version: String,
    pub machine: String,
    pub locale: String,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontmost {
    pub app_name: String,
    pub bundle_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title_length: Option<usize>,
}

impl Frontmost {
    pub fn unknown() -> Self {
        Self {
            app_name: "Unknown".to_string(),
            bundle_id: "unknown".to_string(),
            window_title: None,
            window_title_sha256: None,
            window_title_length: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,
    pub bundle_id: String,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Clipboard {
    pub available: bool,
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PowerSource {
    Ac,
    Battery,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Battery {
    /// Charge level in `0.0..=1.0`.
    pub percentage: f64,
    pub is_charging: bool,
    pub power_source: PowerSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Network {
    pub primary_interface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    pub has_internet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DebugInfo {
    pub timings_ms: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: String,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<Host>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontmost: Option<Frontmost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps: Option<Vec<AppEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clipboard: Option<Clipboard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<Battery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar: Option<Vec<CalendarEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Vec<Reminder>>,
    pub permissions: Permissions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<StructuredError>,
    #[serde(rename = "_debug", default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl Report {
    pub fn empty(generated_at: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: generated_at.into(),
            host: None,
            frontmost: None,
            apps: None,
            clipboard: None,
            battery: None,
            network: None,
            calendar: None,
            reminders: None,
            permissions: Permissions::default(),
            warnings: Vec::new(),
            errors: Vec::new(),
            debug: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, ErrorCode, PermissionState, Report, StructuredError};

    #[test]
    fn empty_report_omits_optional_sections() {
        let value = serde_json::to_value(Report::empty("2026-01-01T00:00:00.000Z"))
            .expect("report serializes");
        let object = value.as_object().expect("report is an object");

        let mut keys = object.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec!["generated_at", "permissions", "schema_version"]);
        assert_eq!(object["permissions"]["calendar"], "not_requested");
    }

    #[test]
    fn structured_error_uses_category_name_and_snake_case_code() {
        let error = StructuredError::new(Category::Calendar, ErrorCode::PermissionDenied, "nope");
        let value = serde_json::to_value(&error).expect("error serializes");
        assert_eq!(value["module"], "calendar");
        assert_eq!(value["code"], "permission_denied");
        assert_eq!(ErrorCode::PermissionDenied.as_str(), "permission_denied");
    }

    #[test]
    fn only_gated_categories_expose_a_capability() {
        let gated = Category::ALL
            .iter()
            .filter(|category| category.capability().is_some())
            .count();
        assert_eq!(gated, 3);
        assert_eq!(PermissionState::default(), PermissionState::NotRequested);
    }
}
