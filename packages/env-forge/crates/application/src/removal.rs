use domain::conflicts::{self, Conflict, ConflictDetector, RemovalPolicy, Severity};
use domain::dependency::{GraphError, RemovalDag};
use domain::entities::app::AppDescriptor;
use domain::ports::{AppRepository, PortError};
use infrastructure::journal::{MutationJournal, OperationKind};
use infrastructure::VersionStore;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RemovalError {
    #[error("app '{0}' is not installed")]
    NotInstalled(String),

    #[error("removal of '{app}' is blocked by {} unresolved conflict(s)", .conflicts.len())]
    Blocked { app: String, conflicts: Vec<Conflict> },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("state mutation failed: {0}")]
    Mutation(#[from] anyhow::Error),
}

/// What a removal actually did.
#[derive(Debug, Default)]
pub struct RemovalOutcome {
    /// Apps removed, in removal order (dependents first).
    pub removed: Vec<String>,
    /// Critical conflicts a force override pushed past.
    pub forced_conflicts: Vec<Conflict>,
    /// Non-blocking conflicts the run proceeded over.
    pub warnings: Vec<String>,
}

/// Drives the remove flow: conflict detection, policy resolution, the
/// proceed/abort gate, cascade planning, and journal bookkeeping around
/// the repository mutation.
pub struct RemovalService {
    apps: Arc<dyn AppRepository>,
    detector: ConflictDetector,
    journal: Arc<MutationJournal>,
    versions: Arc<VersionStore>,
}

impl RemovalService {
    pub fn new(
        apps: Arc<dyn AppRepository>,
        detector: ConflictDetector,
        journal: Arc<MutationJournal>,
        versions: Arc<VersionStore>,
    ) -> Self {
        Self {
            apps,
            detector,
            journal,
            versions,
        }
    }

    /// Remove `name` under `policy`.
    ///
    /// With cascade, dependents are removed before the target in reverse
    /// dependency order, and each dependent's own removal runs with
    /// `force = true` so its stale dependency edge back to the target
    /// cannot block it. That force also overrides a dependent's unrelated
    /// critical conflicts; anything overridden is surfaced in
    /// [`RemovalOutcome::forced_conflicts`].
    pub fn remove(&self, name: &str, policy: RemovalPolicy) -> Result<RemovalOutcome, RemovalError> {
        let target = self
            .apps
            .get_app(name)?
            .ok_or_else(|| RemovalError::NotInstalled(name.to_string()))?;

        let plan = if policy.cascade {
            self.cascade_plan(&target)?
        } else {
            vec![target]
        };

        let mut outcome = RemovalOutcome::default();
        let last = plan.len() - 1;
        for (index, app) in plan.iter().enumerate() {
            let step_policy = if index == last {
                policy
            } else {
                RemovalPolicy {
                    force: true,
                    ..policy
                }
            };
            self.remove_one(app, step_policy, &mut outcome)?;
        }

        Ok(outcome)
    }

    /// The target plus its transitive dependents, ordered so every app
    /// precedes everything it depends on.
    fn cascade_plan(&self, target: &AppDescriptor) -> Result<Vec<AppDescriptor>, RemovalError> {
        let installed = self.apps.list_apps()?;

        let mut in_scope: HashSet<String> = HashSet::from([target.name.clone()]);
        let mut grew = true;
        while grew {
            grew = false;
            for app in &installed {
                if in_scope.contains(&app.name) {
                    continue;
                }
                if app.dependencies.iter().any(|dep| in_scope.contains(dep)) {
                    in_scope.insert(app.name.clone());
                    grew = true;
                }
            }
        }

        let mut dag = RemovalDag::new();
        dag.add_app(target.name.clone());
        for app in installed.iter().filter(|a| in_scope.contains(&a.name)) {
            dag.add_app(app.name.clone());
            for dep in app.dependencies.iter().filter(|d| in_scope.contains(*d)) {
                dag.add_dependency(&app.name, dep);
            }
        }

        let order = dag.removal_order()?;
        Ok(order
            .into_iter()
            .filter_map(|name| installed.iter().find(|a| a.name == name).cloned())
            .collect())
    }

    fn remove_one(
        &self,
        app: &AppDescriptor,
        policy: RemovalPolicy,
        outcome: &mut RemovalOutcome,
    ) -> Result<(), RemovalError> {
        let conflicts = self
            .detector
            .detect_conflicts(std::slice::from_ref(app), policy.cascade)?;
        let summary = conflicts::summarize(&conflicts);

        if !(summary.can_proceed || policy.force) {
            return Err(RemovalError::Blocked {
                app: app.name.clone(),
                conflicts: conflicts::resolve(conflicts, policy),
            });
        }

        if policy.force && !summary.can_proceed {
            for conflict in conflicts.iter().filter(|c| c.severity == Severity::Critical) {
                warn!(app = %app.name, conflict = %conflict.description, "force-overriding critical conflict");
                outcome.forced_conflicts.push(conflict.clone());
            }
        }

        for conflict in conflicts::resolve(conflicts, policy) {
            outcome.warnings.push(format!(
                "{}: {} ({})",
                conflict.app, conflict.description, conflict.resolution
            ));
        }

        // Journal before mutating; recording failures never block the
        // removal itself.
        let mut metadata = BTreeMap::new();
        metadata.insert("app".to_string(), json!(app.name));
        metadata.insert("dependencies".to_string(), json!(app.dependencies));
        metadata.insert("cascade".to_string(), json!(policy.cascade));
        let operation = self.journal.record_operation(
            OperationKind::Remove,
            format!("remove {}", app.name),
            &app.name,
            metadata,
            &app.config_files,
        );

        self.apps.remove_app(&app.name)?;

        if let Some(op) = &operation {
            self.journal.update_operation(&op.id);
        }
        if let Err(err) = self.versions.append(
            format!("remove {}", app.name),
            vec![format!("removed app {}", app.name)],
        ) {
            warn!(app = %app.name, error = %err, "could not append version history");
        }

        info!(app = %app.name, "removed");
        outcome.removed.push(app.name.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ports::ServiceInspector;
    use infrastructure::StateRoot;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// In-memory repository; the journal and versions still hit a real
    /// temp state root.
    struct MemoryApps(Mutex<Vec<AppDescriptor>>);

    impl MemoryApps {
        fn with(apps: Vec<AppDescriptor>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(apps)))
        }
    }

    impl AppRepository for MemoryApps {
        fn get_app(&self, name: &str) -> Result<Option<AppDescriptor>, PortError> {
            Ok(self.0.lock().unwrap().iter().find(|a| a.name == name).cloned())
        }

        fn list_apps(&self) -> Result<Vec<AppDescriptor>, PortError> {
            Ok(self.0.lock().unwrap().clone())
        }

        fn upsert_app(&self, app: &AppDescriptor) -> Result<(), PortError> {
            self.0.lock().unwrap().push(app.clone());
            Ok(())
        }

        fn remove_app(&self, name: &str) -> Result<(), PortError> {
            self.0.lock().unwrap().retain(|a| a.name != name);
            Ok(())
        }
    }

    struct NoServices;

    impl ServiceInspector for NoServices {
        fn is_service_active(&self, _unit: &str) -> Result<bool, PortError> {
            Ok(false)
        }
    }

    fn service_over(
        apps: Arc<MemoryApps>,
        dir: &tempfile::TempDir,
    ) -> (RemovalService, Arc<VersionStore>) {
        let root = StateRoot::at(dir.path().join("state")).unwrap();
        let journal = Arc::new(MutationJournal::open(&root).unwrap());
        let versions = Arc::new(VersionStore::new(root.versions_file()));
        let detector = ConflictDetector::new(
            Arc::clone(&apps) as Arc<dyn AppRepository>,
            Arc::new(NoServices),
        );
        (
            RemovalService::new(apps, detector, journal, Arc::clone(&versions)),
            versions,
        )
    }

    fn workstation() -> Vec<AppDescriptor> {
        vec![
            AppDescriptor::new("git"),
            AppDescriptor::new("docker").with_dependencies(vec!["git".to_string()]),
            AppDescriptor::new("compose").with_dependencies(vec!["docker".to_string()]),
            AppDescriptor::new("ripgrep"),
        ]
    }

    #[test]
    fn test_plain_removal_of_a_leaf() {
        let dir = tempdir().unwrap();
        let apps = MemoryApps::with(workstation());
        let (service, versions) = service_over(Arc::clone(&apps), &dir);

        let outcome = service.remove("ripgrep", RemovalPolicy::default()).unwrap();
        assert_eq!(outcome.removed, vec!["ripgrep"]);
        assert!(outcome.forced_conflicts.is_empty());
        assert!(apps.get_app("ripgrep").unwrap().is_none());
        assert_eq!(versions.list().unwrap().len(), 1);
    }

    #[test]
    fn test_cascade_removes_dependents_first() {
        let dir = tempdir().unwrap();
        let apps = MemoryApps::with(workstation());
        let (service, _versions) = service_over(Arc::clone(&apps), &dir);

        let outcome = service
            .remove(
                "git",
                RemovalPolicy {
                    cascade: true,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(outcome.removed, vec!["compose", "docker", "git"]);
        assert!(apps.list_apps().unwrap().iter().all(|a| a.name == "ripgrep"));
    }

    #[test]
    fn test_protected_target_is_blocked_without_force() {
        let dir = tempdir().unwrap();
        let mut installed = workstation();
        installed.push(AppDescriptor::new("systemd"));
        let apps = MemoryApps::with(installed);
        let (service, _versions) = service_over(Arc::clone(&apps), &dir);

        let err = service.remove("systemd", RemovalPolicy::default()).unwrap_err();
        match err {
            RemovalError::Blocked { app, conflicts } => {
                assert_eq!(app, "systemd");
                assert!(!conflicts.is_empty());
            }
            other => panic!("expected Blocked, got {other}"),
        }
        assert!(apps.get_app("systemd").unwrap().is_some());

        let outcome = service
            .remove(
                "systemd",
                RemovalPolicy {
                    force: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(outcome.removed, vec!["systemd"]);
        assert!(!outcome.forced_conflicts.is_empty());
    }

    #[test]
    fn test_unresolved_warnings_surface_but_do_not_block() {
        let dir = tempdir().unwrap();
        let apps = MemoryApps::with(workstation());
        let (service, _versions) = service_over(Arc::clone(&apps), &dir);

        // docker depends on git; without cascade this is a warning, and
        // the gate only blocks on criticals.
        let outcome = service.remove("git", RemovalPolicy::default()).unwrap();
        assert_eq!(outcome.removed, vec!["git"]);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("docker"));
    }

    #[test]
    fn test_unknown_app_errors() {
        let dir = tempdir().unwrap();
        let apps = MemoryApps::with(Vec::new());
        let (service, _versions) = service_over(apps, &dir);

        assert!(matches!(
            service.remove("ghost", RemovalPolicy::default()),
            Err(RemovalError::NotInstalled(_))
        ));
    }
}
