use crate::model::{Capability, PermissionState, Permissions};

/// Latest known state of each gated capability for one run. Written only by
/// the orchestrator; read once when the report is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionTracker {
    state: Permissions,
}

impl PermissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observation and returns the previous state.
    pub fn set(&mut self, capability: Capability, value: PermissionState) -> PermissionState {
        let slot = match capability {
            Capability::Accessibility => &mut self.state.accessibility,
            Capability::Calendar => &mut self.state.calendar,
            Capability::Reminders => &mut self.state.reminders,
        };
        std::mem::replace(slot, value)
    }

    pub fn get(&self, capability: Capability) -> PermissionState {
        match capability {
            Capability::Accessibility => self.state.accessibility,
            Capability::Calendar => self.state.calendar,
            Capability::Reminders => self.state.reminders,
        }
    }

    pub fn into_permissions(self) -> Permissions {
        self.state
    }
}
