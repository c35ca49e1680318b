use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An installed application as tracked by the app repository.
///
/// Dependencies are flat name lists; there is no version solving at this
/// layer. `config_files` are the destinations the app writes on install,
/// `services` the service units it owns, `plugins` the plugins it needs
/// validated before it can be provisioned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppDescriptor {
    pub name: String,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub config_files: Vec<PathBuf>,

    #[serde(default)]
    pub services: Vec<String>,

    #[serde(default)]
    pub plugins: Vec<String>,
}

impl AppDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            config_files: Vec::new(),
            services: Vec::new(),
            plugins: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_config_files(mut self, files: Vec<PathBuf>) -> Self {
        self.config_files = files;
        self
    }

    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }
}
