use super::{Conflict, ConflictKind, Severity};
use crate::entities::app::AppDescriptor;
use crate::ports::{AppRepository, PortError, ServiceInspector};
use crate::system::{is_protected_package, is_shared_path};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Computes, before any removal, which installed components would break
/// and at what severity. Read-only over the app repository; the four
/// per-app checks run in a fixed order so conflict lists are
/// deterministic for display.
pub struct ConflictDetector {
    apps: Arc<dyn AppRepository>,
    services: Arc<dyn ServiceInspector>,
}

impl ConflictDetector {
    pub fn new(apps: Arc<dyn AppRepository>, services: Arc<dyn ServiceInspector>) -> Self {
        Self { apps, services }
    }

    pub fn detect_conflicts(
        &self,
        targets: &[AppDescriptor],
        cascade: bool,
    ) -> Result<Vec<Conflict>, PortError> {
        let installed = self.apps.list_apps()?;

        // Adjacency map built once per invocation rather than rescanning
        // the flat list for every target.
        let mut dependents: HashMap<&str, Vec<&AppDescriptor>> = HashMap::new();
        for app in &installed {
            for dep in &app.dependencies {
                dependents.entry(dep.as_str()).or_default().push(app);
            }
        }

        let mut conflicts = Vec::new();
        for target in targets {
            self.check_dependents(target, &dependents, cascade, &mut conflicts);
            self.check_system_package(target, &mut conflicts);
            self.check_active_services(target, &mut conflicts)?;
            self.check_config_files(target, &mut conflicts);
        }

        debug!(
            targets = targets.len(),
            conflicts = conflicts.len(),
            "conflict detection finished"
        );
        Ok(conflicts)
    }

    /// Installed apps whose dependency list names the target.
    fn check_dependents(
        &self,
        target: &AppDescriptor,
        dependents: &HashMap<&str, Vec<&AppDescriptor>>,
        cascade: bool,
        out: &mut Vec<Conflict>,
    ) {
        let Some(deps) = dependents.get(target.name.as_str()) else {
            return;
        };

        for dependent in deps {
            if dependent.name == target.name {
                continue;
            }

            let conflict = if is_protected_package(&dependent.name) {
                Conflict {
                    kind: ConflictKind::Dependency,
                    app: target.name.clone(),
                    conflicting_app: Some(dependent.name.clone()),
                    description: format!(
                        "{} is required by protected system component {}",
                        target.name, dependent.name
                    ),
                    severity: Severity::Critical,
                    resolution: "cannot proceed without breaking the system".to_string(),
                }
            } else if cascade {
                Conflict {
                    kind: ConflictKind::Dependency,
                    app: target.name.clone(),
                    conflicting_app: Some(dependent.name.clone()),
                    description: format!("{} depends on {}", dependent.name, target.name),
                    severity: Severity::Info,
                    resolution: format!(
                        "{} will be removed automatically before {}",
                        dependent.name, target.name
                    ),
                }
            } else {
                Conflict {
                    kind: ConflictKind::Dependency,
                    app: target.name.clone(),
                    conflicting_app: Some(dependent.name.clone()),
                    description: format!("{} depends on {}", dependent.name, target.name),
                    severity: Severity::Warning,
                    resolution: format!(
                        "remove {} first, or re-run with --cascade",
                        dependent.name
                    ),
                }
            };
            out.push(conflict);
        }
    }

    /// The target itself is part of the protected base system.
    fn check_system_package(&self, target: &AppDescriptor, out: &mut Vec<Conflict>) {
        if !is_protected_package(&target.name) {
            return;
        }
        out.push(Conflict {
            kind: ConflictKind::SystemPackage,
            app: target.name.clone(),
            conflicting_app: None,
            description: format!("{} is a protected system package", target.name),
            severity: Severity::Critical,
            resolution: "removal requires an explicit --force override".to_string(),
        });
    }

    /// Service units owned by the target that are currently running.
    fn check_active_services(
        &self,
        target: &AppDescriptor,
        out: &mut Vec<Conflict>,
    ) -> Result<(), PortError> {
        for unit in &target.services {
            if self.services.is_service_active(unit)? {
                out.push(Conflict {
                    kind: ConflictKind::ActiveService,
                    app: target.name.clone(),
                    conflicting_app: None,
                    description: format!("service {} is currently active", unit),
                    severity: Severity::Warning,
                    resolution: "stop it first, or re-run with --stop-services".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Config destinations under shared locations other apps may own.
    fn check_config_files(&self, target: &AppDescriptor, out: &mut Vec<Conflict>) {
        for path in &target.config_files {
            if is_shared_path(path) {
                out.push(Conflict {
                    kind: ConflictKind::FileConflict,
                    app: target.name.clone(),
                    conflicting_app: None,
                    description: format!("{} lives under a shared location", path.display()),
                    severity: Severity::Warning,
                    resolution: "re-run with --keep-config to preserve it".to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflicts::{resolve, summarize, RemovalPolicy};
    use std::collections::HashSet;
    use std::path::PathBuf;

    struct MemoryApps(Vec<AppDescriptor>);

    impl AppRepository for MemoryApps {
        fn get_app(&self, name: &str) -> Result<Option<AppDescriptor>, PortError> {
            Ok(self.0.iter().find(|a| a.name == name).cloned())
        }

        fn list_apps(&self) -> Result<Vec<AppDescriptor>, PortError> {
            Ok(self.0.clone())
        }

        fn upsert_app(&self, _app: &AppDescriptor) -> Result<(), PortError> {
            Ok(())
        }

        fn remove_app(&self, _name: &str) -> Result<(), PortError> {
            Ok(())
        }
    }

    struct StaticServices(HashSet<String>);

    impl ServiceInspector for StaticServices {
        fn is_service_active(&self, unit: &str) -> Result<bool, PortError> {
            Ok(self.0.contains(unit))
        }
    }

    fn detector(apps: Vec<AppDescriptor>, active: &[&str]) -> ConflictDetector {
        ConflictDetector::new(
            Arc::new(MemoryApps(apps)),
            Arc::new(StaticServices(active.iter().map(|s| s.to_string()).collect())),
        )
    }

    #[test]
    fn test_dependent_raises_warning_without_cascade() {
        // docker (installed) depends on git; removing git must warn.
        let git = AppDescriptor::new("git");
        let docker = AppDescriptor::new("docker").with_dependencies(vec!["git".to_string()]);
        let det = detector(vec![git.clone(), docker], &[]);

        let conflicts = det.detect_conflicts(&[git], false).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::Dependency);
        assert_eq!(conflicts[0].severity, Severity::Warning);
        assert_eq!(conflicts[0].conflicting_app.as_deref(), Some("docker"));
        assert!(summarize(&conflicts).can_proceed);
    }

    #[test]
    fn test_cascade_reclassifies_dependents_as_auto_resolvable() {
        let git = AppDescriptor::new("git");
        let docker = AppDescriptor::new("docker").with_dependencies(vec!["git".to_string()]);
        let det = detector(vec![git.clone(), docker], &[]);

        let conflicts = det.detect_conflicts(&[git], true).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, Severity::Info);

        // An auto-resolvable dependency must not survive policy resolution.
        let remaining = resolve(
            conflicts,
            RemovalPolicy {
                cascade: true,
                ..Default::default()
            },
        );
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_protected_package_is_always_critical() {
        let systemd = AppDescriptor::new("systemd");
        let det = detector(vec![systemd.clone()], &[]);

        let conflicts = det.detect_conflicts(&[systemd], false).unwrap();
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::SystemPackage && c.severity == Severity::Critical));
        assert!(!summarize(&conflicts).can_proceed);
    }

    #[test]
    fn test_protected_dependent_is_critical() {
        let glib = AppDescriptor::new("libfoo");
        let bash = AppDescriptor::new("bash").with_dependencies(vec!["libfoo".to_string()]);
        let det = detector(vec![glib.clone(), bash], &[]);

        let conflicts = det.detect_conflicts(&[glib], true).unwrap();
        assert_eq!(conflicts[0].severity, Severity::Critical);
        assert_eq!(
            conflicts[0].resolution,
            "cannot proceed without breaking the system"
        );
    }

    #[test]
    fn test_active_service_raises_warning() {
        let nginx = AppDescriptor::new("nginx")
            .with_services(vec!["nginx.service".to_string(), "nginx-proxy.service".to_string()]);
        let det = detector(vec![nginx.clone()], &["nginx.service"]);

        let conflicts = det.detect_conflicts(&[nginx], false).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::ActiveService);
        assert!(conflicts[0].description.contains("nginx.service"));
    }

    #[test]
    fn test_shared_config_destination_raises_warning() {
        let app = AppDescriptor::new("nginx")
            .with_config_files(vec![
                PathBuf::from("/etc/nginx/nginx.conf"),
                PathBuf::from("/opt/nginx/private.conf"),
            ]);
        let det = detector(vec![app.clone()], &[]);

        let conflicts = det.detect_conflicts(&[app], false).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::FileConflict);
    }

    #[test]
    fn test_clean_app_has_no_conflicts() {
        let app = AppDescriptor::new("ripgrep");
        let det = detector(vec![app.clone()], &[]);
        assert!(det.detect_conflicts(&[app], false).unwrap().is_empty());
    }
}
