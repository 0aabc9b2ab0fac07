//! Orchestrator configuration.

use modspec_core::{CustomModuleType, ModuleCatalog, ModuleError, Result};
use modspec_execution::{ExecutorConfig, DEFAULT_MAX_CONCURRENCY};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_TTL;

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorConfig {
    /// Directory holding one sub-directory per feature
    pub feature_base_path: PathBuf,

    /// Max module generations in flight
    pub max_concurrency: usize,

    /// Module cache entry lifetime in milliseconds
    pub cache_ttl_ms: u64,

    /// Generate through the parallel executor by default
    pub parallel: bool,

    /// Give existing related modules to the generator as context
    pub include_sibling_context: bool,

    /// Caller-defined module types
    pub custom_module_types: Vec<CustomModuleType>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            feature_base_path: PathBuf::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cache_ttl_ms: DEFAULT_CACHE_TTL.as_millis() as u64,
            parallel: true,
            include_sibling_context: true,
            custom_module_types: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Default settings rooted at `feature_base_path`.
    pub fn new(feature_base_path: impl Into<PathBuf>) -> Self {
        Self {
            feature_base_path: feature_base_path.into(),
            ..Default::default()
        }
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ModuleError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ModuleError::Configuration(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Set the concurrency cap.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Set whether generation runs in parallel by default.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set whether related modules are given as context.
    pub fn with_sibling_context(mut self, include: bool) -> Self {
        self.include_sibling_context = include;
        self
    }

    /// Register a custom module type.
    pub fn with_custom_module_type(mut self, custom: CustomModuleType) -> Self {
        self.custom_module_types.push(custom);
        self
    }

    /// Check the settings.
    pub fn validate(&self) -> Result<()> {
        if self.feature_base_path.as_os_str().is_empty() {
            return Err(ModuleError::Configuration(
                "feature base path is not set".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ModuleError::Configuration(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        self.catalog().map(|_| ())
    }

    /// Catalog of built-in and custom module types.
    pub fn catalog(&self) -> Result<ModuleCatalog> {
        ModuleCatalog::with_custom_types(self.custom_module_types.iter().cloned())
    }

    /// Cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Executor settings for parallel generation.
    pub fn executor_config(&self) -> ExecutorConfig {
        let max = NonZeroUsize::new(self.max_concurrency).unwrap_or(NonZeroUsize::MIN);
        ExecutorConfig::default().with_max_concurrency(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::new("/ws/.specs");
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.cache_ttl_ms, 300_000);
        assert!(config.parallel);
        assert!(config.validate().is_ok());
        assert_eq!(config.executor_config().max_concurrency.get(), 4);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            OrchestratorConfig::default().validate(),
            Err(ModuleError::Configuration(_))
        ));
        assert!(matches!(
            OrchestratorConfig::new("/ws").with_max_concurrency(0).validate(),
            Err(ModuleError::Configuration(_))
        ));
        let clash = OrchestratorConfig::new("/ws")
            .with_custom_module_type(CustomModuleType::new("frontend", "Dup"));
        assert!(matches!(clash.validate(), Err(ModuleError::Validation(_))));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"featureBasePath": "/ws/.specs", "maxConcurrency": 2,
                "customModuleTypes": [{{"id": "security", "label": "Security"}}]}}"#
        )
        .unwrap();

        let config = OrchestratorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.feature_base_path, PathBuf::from("/ws/.specs"));
        assert_eq!(config.max_concurrency, 2);
        assert!(config.include_sibling_context);
        assert_eq!(config.custom_module_types[0].file_pattern, "design-{type}.md");
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = OrchestratorConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(err, Err(ModuleError::Configuration(_))));
    }
}
