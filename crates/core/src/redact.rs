use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redacted {
    pub sha256: String,
    /// Length in UTF-16 code units.
    pub length: usize,
}

pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

pub fn redact(text: &str) -> Redacted {
    Redacted {
        sha256: sha256_hex(text),
        length: utf16_len(text),
    }
}

/// A sensitive string as it may appear in a report: either the raw text or
/// its digest, always with the length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SensitiveText {
    pub text: Option<String>,
    pub sha256: Option<String>,
    pub length: Option<usize>,
}

impl SensitiveText {
    pub fn from_raw(raw: &str, redact_enabled: bool) -> Self {
        if redact_enabled {
            let redacted = redact(raw);
            Self {
                text: None,
                sha256: Some(redacted.sha256),
                length: Some(redacted.length),
            }
        } else {
            Self {
                text: Some(raw.to_string()),
                sha256: None,
                length: Some(utf16_len(raw)),
            }
        }
    }
}
