use aibridge_types::{BridgeError, Result};

use crate::types::{ChatMessage, Role};

/// How a vendor's closed role set absorbs the logical chat roles.
#[derive(Debug, Clone, Copy)]
pub struct RoleMapping {
    pub provider: &'static str,
    /// Role used for system instructions when the vendor has no system role.
    pub system: &'static str,
    /// Role used for assistant turns.
    pub assistant: &'static str,
    /// Roles the vendor accepts as-is.
    pub native: &'static [&'static str],
}

impl RoleMapping {
    pub fn map(&self, role: &Role) -> Result<&'static str> {
        let candidate = match role {
            Role::System => self.system,
            Role::Assistant => self.assistant,
            other => other.as_str(),
        };
        self.native
            .iter()
            .copied()
            .find(|native| *native == candidate)
            .ok_or_else(|| BridgeError::UnsupportedRole {
                provider: self.provider.to_string(),
                role: role.to_string(),
            })
    }

    /// Map every message up front so a bad role fails the call before any I/O.
    pub fn map_all(&self, messages: &[ChatMessage]) -> Result<Vec<&'static str>> {
        messages.iter().map(|m| self.map(&m.role)).collect()
    }
}
