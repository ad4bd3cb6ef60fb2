use serde::Serialize;

use crate::model::{ErrorCode, PermissionState, StructuredError};

/// Process exit status, ordered by priority: a higher variant always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExitCode {
    #[default]
    Success,
    Error,
    Timeout,
    PermissionDenied,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::PermissionDenied => 2,
            ExitCode::Timeout => 3,
            ExitCode::Error => 4,
        }
    }

    /// Outcome contributed by a single collector result.
    pub fn from_outcome(
        error: Option<&StructuredError>,
        permission: Option<PermissionState>,
    ) -> Self {
        let Some(error) = error else {
            return ExitCode::Success;
        };
        if permission == Some(PermissionState::Denied)
            || error.code == Some(ErrorCode::PermissionDenied)
        {
            return ExitCode::PermissionDenied;
        }
        match error.code {
            Some(ErrorCode::Timeout) => ExitCode::Timeout,
            _ => ExitCode::Error,
        }
    }

    /// Combines outcomes; independent of the order they arrive in.
    pub fn fold(outcomes: impl IntoIterator<Item = ExitCode>) -> Self {
        outcomes.into_iter().fold(ExitCode::Success, Ord::max)
    }
}
