/// Root-cause classification attached to every validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    Network,
    Permission,
    DiskSpace,
    Unknown,
}

impl FailureCause {
    /// Classify a raw failure message. String matching is deliberate: the
    /// underlying errors cross several collaborator boundaries and arrive
    /// already stringified.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("permission denied") || lower.contains("access denied") {
            FailureCause::Permission
        } else if lower.contains("no space left")
            || lower.contains("disk full")
            || lower.contains("quota exceeded")
        {
            FailureCause::DiskSpace
        } else if lower.contains("connection")
            || lower.contains("network")
            || lower.contains("timed out")
            || lower.contains("unreachable")
            || lower.contains("dns")
        {
            FailureCause::Network
        } else {
            FailureCause::Unknown
        }
    }

    /// A concrete next step for the user.
    pub fn remediation(&self) -> &'static str {
        match self {
            FailureCause::Network => "check connectivity to the plugin registry and retry",
            FailureCause::Permission => {
                "fix ownership of the state directory or re-run with sufficient privileges"
            }
            FailureCause::DiskSpace => "free up disk space and retry",
            FailureCause::Unknown => "re-run with RUST_LOG=debug for more detail",
        }
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureCause::Network => "network",
            FailureCause::Permission => "permission",
            FailureCause::DiskSpace => "disk space",
            FailureCause::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Wrap a raw failure with its classified cause and a remediation hint.
/// Every error surfaced in a validation report goes through here.
pub fn enhance_error(plugin: &str, message: &str) -> String {
    let cause = FailureCause::classify(message);
    format!(
        "{}: {} (cause: {}; next step: {})",
        plugin,
        message,
        cause,
        cause.remediation()
    )
}
