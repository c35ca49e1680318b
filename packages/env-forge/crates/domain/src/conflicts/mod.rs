//! Conflict detection for removals. Conflicts are first-class data, not
//! errors: the detector only fails on I/O while reading the repository.

mod detector;

pub use detector::ConflictDetector;

use serde::{Deserialize, Serialize};

/// What kind of breakage the removal would cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Dependency,
    SystemPackage,
    ActiveService,
    FileConflict,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConflictKind::Dependency => "dependency",
            ConflictKind::SystemPackage => "system package",
            ConflictKind::ActiveService => "active service",
            ConflictKind::FileConflict => "file conflict",
        };
        f.write_str(s)
    }
}

/// Critical conflicts block the removal outright; warnings need a policy
/// flag; info conflicts are auto-resolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// The app whose removal raised this conflict.
    pub app: String,
    /// The other installed app involved, if any.
    pub conflicting_app: Option<String>,
    pub description: String,
    pub severity: Severity,
    /// Human-readable remediation, one per conflict.
    pub resolution: String,
}

/// Caller policy applied when resolving conflicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalPolicy {
    pub cascade: bool,
    pub stop_services: bool,
    pub keep_config: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictSummary {
    pub critical: usize,
    pub warnings: usize,
    pub info: usize,
    pub can_proceed: bool,
}

/// Count conflicts per severity. `can_proceed` ignores force; the caller
/// applies its force override on top.
pub fn summarize(conflicts: &[Conflict]) -> ConflictSummary {
    let critical = conflicts.iter().filter(|c| c.severity == Severity::Critical).count();
    let warnings = conflicts.iter().filter(|c| c.severity == Severity::Warning).count();
    let info = conflicts.iter().filter(|c| c.severity == Severity::Info).count();

    ConflictSummary {
        critical,
        warnings,
        info,
        can_proceed: critical == 0,
    }
}

/// Apply caller policy, auto-clearing every conflict the policy covers.
/// Returns only what still needs a human decision.
pub fn resolve(conflicts: Vec<Conflict>, policy: RemovalPolicy) -> Vec<Conflict> {
    conflicts
        .into_iter()
        .filter(|c| !policy_clears(c, policy))
        .collect()
}

fn policy_clears(conflict: &Conflict, policy: RemovalPolicy) -> bool {
    if policy.force {
        return true;
    }
    match conflict.kind {
        ConflictKind::Dependency => policy.cascade && conflict.severity != Severity::Critical,
        ConflictKind::ActiveService => policy.stop_services,
        ConflictKind::FileConflict => policy.keep_config,
        ConflictKind::SystemPackage => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict(kind: ConflictKind, severity: Severity) -> Conflict {
        Conflict {
            kind,
            app: "target".to_string(),
            conflicting_app: None,
            description: String::new(),
            severity,
            resolution: String::new(),
        }
    }

    #[test]
    fn test_summary_gates_on_critical_only() {
        let conflicts = vec![
            conflict(ConflictKind::ActiveService, Severity::Warning),
            conflict(ConflictKind::FileConflict, Severity::Warning),
        ];
        let summary = summarize(&conflicts);
        assert_eq!(summary.warnings, 2);
        assert!(summary.can_proceed);

        let with_critical = vec![conflict(ConflictKind::SystemPackage, Severity::Critical)];
        assert!(!summarize(&with_critical).can_proceed);
    }

    #[test]
    fn test_policy_flags_clear_matching_conflicts() {
        let conflicts = vec![
            conflict(ConflictKind::ActiveService, Severity::Warning),
            conflict(ConflictKind::FileConflict, Severity::Warning),
            conflict(ConflictKind::Dependency, Severity::Info),
        ];

        let remaining = resolve(
            conflicts,
            RemovalPolicy {
                cascade: true,
                stop_services: true,
                keep_config: false,
                force: false,
            },
        );

        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].kind, ConflictKind::FileConflict);
    }

    #[test]
    fn test_force_clears_everything() {
        let conflicts = vec![
            conflict(ConflictKind::SystemPackage, Severity::Critical),
            conflict(ConflictKind::Dependency, Severity::Warning),
        ];
        let remaining = resolve(
            conflicts,
            RemovalPolicy {
                force: true,
                ..Default::default()
            },
        );
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_cascade_never_clears_critical_dependency() {
        let conflicts = vec![conflict(ConflictKind::Dependency, Severity::Critical)];
        let remaining = resolve(
            conflicts,
            RemovalPolicy {
                cascade: true,
                ..Default::default()
            },
        );
        assert_eq!(remaining.len(), 1);
    }
}
