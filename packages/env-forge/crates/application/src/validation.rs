use crate::collector::BoundedErrorCollector;
use crate::pool;
use anyhow::Result;
use domain::entities::plugin::{PluginDescriptor, PluginInfo};
use domain::ports::PluginRegistry;
use domain::security::ArtifactVerifier;
use domain::validation::{
    enhance_error, ValidationConfig, ValidationError, ValidationResult, ValidationSummary,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Capacity of the per-run error list; past this the report truncates.
const MAX_COLLECTED_ERRORS: usize = 32;

/// Verifies that required plugins are present and trustworthy before
/// anything depends on them.
///
/// Two phases: critical plugins run sequentially in input order with
/// fail-fast semantics under `fail_on_critical`; everything else runs on
/// a bounded worker pool. The final report lists results in input order
/// regardless of completion order.
pub struct PluginValidationService {
    registry: Arc<dyn PluginRegistry>,
    config: ValidationConfig,
}

impl PluginValidationService {
    pub fn new(registry: Arc<dyn PluginRegistry>, config: ValidationConfig) -> Self {
        Self { registry, config }
    }

    /// Validate `plugin_names` under the caller's cancellation scope.
    ///
    /// Every worker is joined before this returns; cancellation shortens
    /// the run but never leaks tasks. Fails only if the registry itself
    /// cannot be read: per-plugin failures are data, not errors.
    pub async fn validate_plugins(
        &self,
        plugin_names: &[String],
        cancel: &CancellationToken,
    ) -> Result<ValidationSummary> {
        let started = Instant::now();
        let installed = Arc::new(self.registry.list_plugins()?);
        let errors = BoundedErrorCollector::new(MAX_COLLECTED_ERRORS);

        let ctx = CheckContext {
            installed,
            config: Arc::new(self.config.clone()),
        };

        let mut slots: Vec<Option<ValidationResult>> = vec![None; plugin_names.len()];
        let mut critical_failures = 0;

        // Presence and criticality for every requested plugin, in input
        // order, before any checking starts.
        let descriptors: Vec<PluginDescriptor> = plugin_names
            .iter()
            .map(|name| PluginDescriptor {
                name: name.clone(),
                installed: ctx.installed.contains_key(name),
                critical: self.config.critical_plugins.contains(name),
            })
            .collect();

        // Phase 1: critical plugins, one at a time, in input order, with
        // immediate logging. This bounds worst-case latency when an
        // essential component is broken.
        for (index, descriptor) in descriptors.iter().enumerate().filter(|(_, d)| d.critical) {
            let name = descriptor.name.as_str();
            let result = ctx.validate(name, cancel.child_token()).await;
            match &result.error {
                None => info!(plugin = %name, "critical plugin ok"),
                Some(err) => warn!(plugin = %name, error = %err, "critical plugin failed"),
            }

            let failed = !result.is_valid;
            if let Some(err) = &result.error {
                errors.push(err.clone());
            }
            slots[index] = Some(result);

            if failed {
                critical_failures += 1;
                if self.config.fail_on_critical {
                    warn!(plugin = %name, "aborting validation run: critical plugin failed");
                    return Ok(finish(slots, critical_failures, errors, started));
                }
            }
        }

        // Phase 2: the rest on a bounded pool. The single drain loop in
        // `fan_out` re-assembles results here, keyed by input index.
        let remaining: Vec<(usize, String)> = descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.critical)
            .map(|(i, d)| (i, d.name.clone()))
            .collect();

        let outputs = pool::fan_out(
            self.config.concurrency,
            cancel,
            remaining,
            |(index, name), child| {
                let ctx = ctx.clone();
                async move { (index, ctx.validate(&name, child).await) }
            },
        )
        .await;

        for (index, result) in outputs {
            if let Some(err) = &result.error {
                errors.push(err.clone());
            }
            slots[index] = Some(result);
        }

        Ok(finish(slots, critical_failures, errors, started))
    }
}

fn finish(
    slots: Vec<Option<ValidationResult>>,
    critical_failures: usize,
    errors: BoundedErrorCollector,
    started: Instant,
) -> ValidationSummary {
    let results: Vec<ValidationResult> = slots.into_iter().flatten().collect();
    ValidationSummary {
        total_plugins: results.len(),
        valid_plugins: results.iter().filter(|r| r.is_valid).count(),
        invalid_plugins: results.iter().filter(|r| !r.is_valid).count(),
        critical_failures,
        results,
        errors: errors.into_errors(),
        elapsed: started.elapsed(),
    }
}

/// Everything one worker needs; cheap to clone into spawned tasks.
#[derive(Clone)]
struct CheckContext {
    installed: Arc<HashMap<String, PluginInfo>>,
    config: Arc<ValidationConfig>,
}

/// Integrity flags for one plugin after checking.
struct Checks {
    checksum_valid: bool,
    signature_valid: bool,
}

impl CheckContext {
    /// Validate one plugin under its own deadline, scoped under but
    /// independent of the parent's cancellation.
    async fn validate(&self, name: &str, cancel: CancellationToken) -> ValidationResult {
        let started = Instant::now();

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(ValidationError::Cancelled(name.to_string())),
            checked = tokio::time::timeout(self.config.per_plugin_timeout, self.check(name)) => {
                match checked {
                    Ok(inner) => inner,
                    Err(_) => Err(ValidationError::Timeout(name.to_string())),
                }
            }
        };

        let elapsed = started.elapsed();
        match outcome {
            Ok(checks) => ValidationResult {
                plugin: name.to_string(),
                is_valid: true,
                checksum_valid: checks.checksum_valid,
                signature_valid: checks.signature_valid,
                error: None,
                elapsed,
            },
            Err(err) => {
                ValidationResult::invalid(name, enhance_error(name, &err.to_string()), elapsed)
            }
        }
    }

    /// Presence, then checksum, then signature. Integrity failures are
    /// fatal unless `allow_insecure_plugins` downgrades them to logged
    /// warnings (the plugin still counts valid, flags record the miss).
    async fn check(&self, name: &str) -> Result<Checks, ValidationError> {
        let Some(info) = self.installed.get(name) else {
            return Err(ValidationError::NotInstalled(name.to_string()));
        };

        let mut checks = Checks {
            checksum_valid: true,
            signature_valid: true,
        };

        let wants_checksum = self.config.verify_checksums && info.sha256.is_some();
        let wants_signature = self.config.verify_signatures
            && info.signature.is_some()
            && info.public_key.is_some();
        if !wants_checksum && !wants_signature {
            return Ok(checks);
        }

        let Some(artifact) = info.artifact.as_ref() else {
            return Err(ValidationError::Artifact {
                plugin: name.to_string(),
                reason: "registry record carries no artifact path".to_string(),
            });
        };
        let bytes = tokio::fs::read(artifact)
            .await
            .map_err(|e| ValidationError::Artifact {
                plugin: name.to_string(),
                reason: e.to_string(),
            })?;

        if wants_checksum {
            let expected = info.sha256.as_deref().unwrap_or_default();
            if !ArtifactVerifier::checksum_matches(&bytes, expected) {
                checks.checksum_valid = false;
                if !self.config.allow_insecure_plugins {
                    return Err(ValidationError::ChecksumMismatch {
                        plugin: name.to_string(),
                    });
                }
                warn!(plugin = %name, "checksum mismatch allowed (allow_insecure_plugins)");
            }
        }

        if wants_signature {
            let sig = info.signature.as_deref().unwrap_or_default();
            let key = info.public_key.as_deref().unwrap_or_default();
            let verdict = ArtifactVerifier::signature_valid(&bytes, sig, key);
            let ok = match verdict {
                Ok(ok) => ok,
                Err(err) => {
                    if !self.config.allow_insecure_plugins {
                        return Err(ValidationError::SignatureInvalid {
                            plugin: name.to_string(),
                            reason: err.to_string(),
                        });
                    }
                    false
                }
            };
            if !ok {
                checks.signature_valid = false;
                if !self.config.allow_insecure_plugins {
                    return Err(ValidationError::SignatureInvalid {
                        plugin: name.to_string(),
                        reason: "signature does not match artifact".to_string(),
                    });
                }
                warn!(plugin = %name, "signature failure allowed (allow_insecure_plugins)");
            }
        }

        Ok(checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ports::PortError;
    use domain::validation::resolve_critical_plugins;
    use semver::Version;
    use std::collections::BTreeSet;
    use std::io::Write;
    use std::time::Duration;

    struct FakeRegistry {
        plugins: Vec<PluginInfo>,
    }

    impl PluginRegistry for FakeRegistry {
        fn list_plugins(&self) -> Result<HashMap<String, PluginInfo>, PortError> {
            Ok(self
                .plugins
                .iter()
                .map(|p| (p.name.clone(), p.clone()))
                .collect())
        }
    }

    fn plugin(name: &str) -> PluginInfo {
        PluginInfo::new(name, Version::new(1, 0, 0))
    }

    fn service(installed: &[&str], config: ValidationConfig) -> PluginValidationService {
        let registry = FakeRegistry {
            plugins: installed.iter().map(|n| plugin(n)).collect(),
        };
        PluginValidationService::new(Arc::new(registry), config)
    }

    fn criticals(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_counts_always_add_up() {
        let svc = service(
            &["a", "c"],
            ValidationConfig {
                concurrency: 2,
                ..Default::default()
            },
        );

        let summary = svc
            .validate_plugins(&names(&["a", "b", "c", "d"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.total_plugins, 4);
        assert_eq!(summary.valid_plugins + summary.invalid_plugins, summary.total_plugins);
        assert_eq!(summary.valid_plugins, 2);
        assert_eq!(summary.critical_failures, 0);
    }

    #[tokio::test]
    async fn test_report_order_matches_input_order() {
        let svc = service(
            &["a", "b", "d", "f"],
            ValidationConfig {
                concurrency: 4,
                ..Default::default()
            },
        );

        let input = names(&["f", "a", "e", "d", "c", "b"]);
        let summary = svc
            .validate_plugins(&input, &CancellationToken::new())
            .await
            .unwrap();

        let reported: Vec<&str> = summary.results.iter().map(|r| r.plugin.as_str()).collect();
        assert_eq!(reported, vec!["f", "a", "e", "d", "c", "b"]);
    }

    #[tokio::test]
    async fn test_missing_plugin_error_names_a_next_step() {
        let svc = service(&[], ValidationConfig::default());
        let summary = svc
            .validate_plugins(&names(&["pkg-x"]), &CancellationToken::new())
            .await
            .unwrap();

        let err = summary.results[0].error.as_deref().unwrap();
        assert!(err.contains("not installed"));
        assert!(err.contains("next step:"));
        assert_eq!(summary.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_critical_failure_aborts_run_when_fail_on_critical() {
        // tool-shell: critical, installed. desktop-gnome: critical,
        // missing. pkg-x: non-critical, must never be reached.
        let svc = service(
            &["tool-shell"],
            ValidationConfig {
                fail_on_critical: true,
                critical_plugins: criticals(&["tool-shell", "desktop-gnome"]),
                ..Default::default()
            },
        );

        let summary = svc
            .validate_plugins(
                &names(&["tool-shell", "desktop-gnome", "pkg-x"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.critical_failures, 1);
        assert_eq!(summary.valid_plugins, 1);
        assert!(summary.results.iter().all(|r| r.plugin != "pkg-x"));
        assert_eq!(summary.total_plugins, 2);
    }

    #[tokio::test]
    async fn test_critical_failure_without_fail_fast_continues() {
        let svc = service(
            &["pkg-x"],
            ValidationConfig {
                fail_on_critical: false,
                critical_plugins: criticals(&["desktop-gnome"]),
                ..Default::default()
            },
        );

        let summary = svc
            .validate_plugins(&names(&["desktop-gnome", "pkg-x"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.critical_failures, 1);
        assert_eq!(summary.total_plugins, 2);
        assert!(summary.results.iter().any(|r| r.plugin == "pkg-x" && r.is_valid));
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_quickly_with_no_stragglers() {
        let svc = service(
            &["a", "b", "c", "d", "e", "f"],
            ValidationConfig {
                concurrency: 2,
                per_plugin_timeout: Duration::from_secs(30),
                ..Default::default()
            },
        );

        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = Instant::now();
        let summary = svc
            .validate_plugins(&names(&["a", "b", "c", "d", "e", "f"]), &cancel)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(summary.results.len(), 6);
        assert!(summary
            .results
            .iter()
            .all(|r| r.error.as_deref().map(|e| e.contains("cancelled")).unwrap_or(false)));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_is_fatal_unless_insecure_allowed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"artifact body").unwrap();

        let mut info = plugin("pkg-signed");
        info.artifact = Some(file.path().to_path_buf());
        info.sha256 = Some("00".repeat(32));

        let registry = Arc::new(FakeRegistry {
            plugins: vec![info],
        });

        let strict = PluginValidationService::new(
            Arc::clone(&registry) as Arc<dyn PluginRegistry>,
            ValidationConfig::default(),
        );
        let summary = strict
            .validate_plugins(&names(&["pkg-signed"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.invalid_plugins, 1);
        assert!(summary.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("checksum mismatch"));

        let lenient = PluginValidationService::new(
            registry,
            ValidationConfig {
                allow_insecure_plugins: true,
                ..Default::default()
            },
        );
        let summary = lenient
            .validate_plugins(&names(&["pkg-signed"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.valid_plugins, 1);
        assert!(!summary.results[0].checksum_valid);
    }

    #[tokio::test]
    async fn test_critical_set_resolution_feeds_the_run() {
        let set = resolve_critical_plugins(Some("tool-shell"), None, &[]);
        let svc = service(
            &["tool-shell", "pkg-x"],
            ValidationConfig {
                critical_plugins: set,
                fail_on_critical: true,
                ..Default::default()
            },
        );

        let summary = svc
            .validate_plugins(&names(&["tool-shell", "pkg-x"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.critical_failures, 0);
        assert_eq!(summary.valid_plugins, 2);
    }
}
