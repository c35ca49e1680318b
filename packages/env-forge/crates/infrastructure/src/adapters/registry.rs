use crate::state::StateRoot;
use domain::entities::plugin::PluginInfo;
use domain::ports::{PluginRegistry, PortError};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Plugin registry backed by `<state root>/plugins/<name>/plugin.json`.
/// Relative artifact paths in a record resolve against its plugin
/// directory.
pub struct DirectoryPluginRegistry {
    dir: PathBuf,
}

impl DirectoryPluginRegistry {
    pub fn new(root: &StateRoot) -> Self {
        Self {
            dir: root.plugins_dir(),
        }
    }
}

impl PluginRegistry for DirectoryPluginRegistry {
    fn list_plugins(&self) -> Result<HashMap<String, PluginInfo>, PortError> {
        let mut plugins = HashMap::new();
        if !self.dir.exists() {
            return Ok(plugins);
        }

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let manifest = entry.path().join("plugin.json");
            if !manifest.is_file() {
                continue;
            }

            let raw = fs::read_to_string(&manifest)?;
            let mut info: PluginInfo = serde_json::from_str(&raw)
                .map_err(|err| PortError::Corrupt(format!("{}: {err}", manifest.display())))?;

            if let Some(artifact) = info.artifact.take() {
                info.artifact = Some(if artifact.is_absolute() {
                    artifact
                } else {
                    entry.path().join(artifact)
                });
            }
            plugins.insert(info.name.clone(), info);
        }

        Ok(plugins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;
    use tempfile::tempdir;

    fn write_plugin(root: &StateRoot, name: &str, artifact: Option<&str>) {
        let dir = root.plugins_dir().join(name);
        fs::create_dir_all(&dir).unwrap();

        let mut info = PluginInfo::new(name, Version::new(1, 2, 3));
        info.artifact = artifact.map(PathBuf::from);
        if let Some(rel) = artifact {
            fs::write(dir.join(rel), b"artifact").unwrap();
        }
        fs::write(dir.join("plugin.json"), serde_json::to_vec_pretty(&info).unwrap()).unwrap();
    }

    #[test]
    fn test_scans_records_and_resolves_artifacts() {
        let dir = tempdir().unwrap();
        let root = StateRoot::at(dir.path()).unwrap();

        write_plugin(&root, "tool-shell", Some("tool-shell.bin"));
        write_plugin(&root, "pkg-core", None);

        let registry = DirectoryPluginRegistry::new(&root);
        let plugins = registry.list_plugins().unwrap();
        assert_eq!(plugins.len(), 2);

        let shell = &plugins["tool-shell"];
        let artifact = shell.artifact.as_ref().unwrap();
        assert!(artifact.is_absolute());
        assert!(artifact.ends_with("tool-shell/tool-shell.bin"));
        assert!(plugins["pkg-core"].artifact.is_none());
    }

    #[test]
    fn test_missing_plugins_dir_is_empty_not_an_error() {
        let dir = tempdir().unwrap();
        let root = StateRoot::at(dir.path()).unwrap();
        let registry = DirectoryPluginRegistry::new(&root);
        assert!(registry.list_plugins().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let dir = tempdir().unwrap();
        let root = StateRoot::at(dir.path()).unwrap();

        let plugin_dir = root.plugins_dir().join("broken");
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join("plugin.json"), b"{not json").unwrap();

        let registry = DirectoryPluginRegistry::new(&root);
        assert!(matches!(
            registry.list_plugins(),
            Err(PortError::Corrupt(_))
        ));
    }
}
