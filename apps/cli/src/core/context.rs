use anyhow::{Context, Result};
use application::{ProvisionService, PluginValidationService, RemovalService};
use domain::conflicts::ConflictDetector;
use domain::ports::{AppRepository, PluginRegistry, ServiceInspector};
use domain::validation::{
    resolve_critical_plugins, ValidationConfig, DEFAULT_CRITICAL_PLUGINS,
};
use infrastructure::adapters::{
    DirectoryPluginRegistry, StateFileAppRepository, SystemctlInspector,
};
use infrastructure::{MutationJournal, StateRoot, VersionStore};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Environment variable overriding the critical plugin set,
/// comma-separated. Read once at startup.
pub const CRITICAL_PLUGINS_ENV: &str = "ENV_FORGE_CRITICAL_PLUGINS";

/// Optional settings from `<state root>/config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgeConfig {
    #[serde(default)]
    pub critical_plugins: Vec<String>,

    #[serde(default)]
    pub allow_insecure_plugins: bool,

    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl ForgeConfig {
    fn load(root: &StateRoot) -> Result<Self> {
        let path = root.config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }
}

/// Everything the commands need, wired once per invocation.
pub struct CliContext {
    pub apps: Arc<dyn AppRepository>,
    pub registry: Arc<dyn PluginRegistry>,
    pub services: Arc<dyn ServiceInspector>,
    pub journal: Arc<MutationJournal>,
    pub versions: Arc<VersionStore>,
    pub config: ForgeConfig,
    cancel: CancellationToken,
}

impl CliContext {
    pub fn open(state_dir: Option<PathBuf>) -> Result<Self> {
        let root = match state_dir {
            Some(dir) => StateRoot::at(dir)?,
            None => StateRoot::default_location()?,
        };
        debug!(root = %root.path().display(), "state root resolved");

        let config = ForgeConfig::load(&root)?;
        let journal = Arc::new(MutationJournal::open(&root)?);
        let versions = Arc::new(VersionStore::new(root.versions_file()));

        let ctx = Self {
            apps: Arc::new(StateFileAppRepository::new(&root)),
            registry: Arc::new(DirectoryPluginRegistry::new(&root)),
            services: Arc::new(SystemctlInspector::new()),
            journal,
            versions,
            config,
            cancel: CancellationToken::new(),
        };

        // Ctrl-C cancels in-flight validation work instead of killing the
        // process mid-write.
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        Ok(ctx)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Validation settings resolved once: environment beats the config
    /// file, which beats built-in defaults.
    pub fn validation_config(&self) -> ValidationConfig {
        let env_value = std::env::var(CRITICAL_PLUGINS_ENV).ok();
        let critical_plugins = resolve_critical_plugins(
            env_value.as_deref(),
            Some(self.config.critical_plugins.as_slice()),
            DEFAULT_CRITICAL_PLUGINS,
        );

        let mut config = ValidationConfig {
            critical_plugins,
            allow_insecure_plugins: self.config.allow_insecure_plugins,
            ..Default::default()
        };
        if let Some(concurrency) = self.config.concurrency {
            config.concurrency = concurrency.max(1);
        }
        config
    }

    pub fn validation_service(&self, config: ValidationConfig) -> PluginValidationService {
        PluginValidationService::new(Arc::clone(&self.registry), config)
    }

    pub fn provision_service(&self, config: ValidationConfig) -> ProvisionService {
        ProvisionService::new(
            Arc::clone(&self.apps),
            self.validation_service(config),
            Arc::clone(&self.journal),
            Arc::clone(&self.versions),
        )
    }

    pub fn removal_service(&self) -> RemovalService {
        let detector = ConflictDetector::new(Arc::clone(&self.apps), Arc::clone(&self.services));
        RemovalService::new(
            Arc::clone(&self.apps),
            detector,
            Arc::clone(&self.journal),
            Arc::clone(&self.versions),
        )
    }
}
