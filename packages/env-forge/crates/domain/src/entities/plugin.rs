use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata the plugin registry reports for one installed plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginInfo {
    pub name: String,
    pub version: Version,

    /// Path to the plugin artifact on disk, when materialized.
    #[serde(default)]
    pub artifact: Option<PathBuf>,

    /// Expected SHA-256 of the artifact, hex-encoded.
    #[serde(default)]
    pub sha256: Option<String>,

    /// Detached ed25519 signature over the artifact, base64-encoded.
    #[serde(default)]
    pub signature: Option<String>,

    /// Publisher verifying key, base64-encoded.
    #[serde(default)]
    pub public_key: Option<String>,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            artifact: None,
            sha256: None,
            signature: None,
            public_key: None,
        }
    }
}

/// Presence and criticality of one plugin within a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub name: String,
    pub installed: bool,
    pub critical: bool,
}
