use std::env;
use std::fmt;

use crate::model::HostOs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Unsupported(String),
}

impl Platform {
    pub fn detect() -> Self {
        Self::from_os_name(env::consts::OS)
    }

    pub fn from_os_name(name: &str) -> Self {
        match name {
            "macos" | "darwin" => Platform::MacOs,
            "linux" => Platform::Linux,
            other => Platform::Unsupported(other.to_string()),
        }
    }

    pub fn host_os(&self) -> Option<HostOs> {
        match self {
            Platform::MacOs => Some(HostOs::Macos),
            Platform::Linux => Some(HostOs::Linux),
            Platform::Unsupported(_) => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::MacOs => f.write_str("macos"),
            Platform::Linux => f.write_str("linux"),
            Platform::Unsupported(name) => f.write_str(name),
        }
    }
}
