//! Ports the engine consumes. Implementations live in `infrastructure`;
//! tests substitute in-memory fakes.

use crate::entities::app::AppDescriptor;
use crate::entities::plugin::PluginInfo;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortError {
    #[error("state I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt state file: {0}")]
    Corrupt(String),

    #[error("service manager query failed: {0}")]
    ServiceQuery(String),
}

/// Reports which plugins are currently present on the machine.
pub trait PluginRegistry: Send + Sync {
    /// All installed plugins, keyed by name. O(1) presence checks are done
    /// against this map.
    fn list_plugins(&self) -> Result<HashMap<String, PluginInfo>, PortError>;
}

/// CRUD over installed application records.
pub trait AppRepository: Send + Sync {
    fn get_app(&self, name: &str) -> Result<Option<AppDescriptor>, PortError>;
    fn list_apps(&self) -> Result<Vec<AppDescriptor>, PortError>;
    fn upsert_app(&self, app: &AppDescriptor) -> Result<(), PortError>;
    fn remove_app(&self, name: &str) -> Result<(), PortError>;
}

/// Queries the OS service manager for unit state.
pub trait ServiceInspector: Send + Sync {
    fn is_service_active(&self, unit: &str) -> Result<bool, PortError>;
}
