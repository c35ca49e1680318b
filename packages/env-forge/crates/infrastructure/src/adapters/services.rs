use domain::ports::{PortError, ServiceInspector};
use std::process::Command;

/// Queries systemd for unit state.
pub struct SystemctlInspector;

impl SystemctlInspector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemctlInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceInspector for SystemctlInspector {
    fn is_service_active(&self, unit: &str) -> Result<bool, PortError> {
        // systemctl is-active exits 0 iff the unit is active
        let output = Command::new("systemctl")
            .arg("is-active")
            .arg("--quiet")
            .arg(unit)
            .output()
            .map_err(|err| PortError::ServiceQuery(err.to_string()))?;

        Ok(output.status.success())
    }
}
