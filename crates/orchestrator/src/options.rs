//! Generation requests and results.

use modspec_core::{FailedModule, ModuleType};
use modspec_execution::ExecutionStats;
use serde::{Deserialize, Serialize};

/// What to generate and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    /// Explicit module types; detected from the requirements when `None`
    pub module_types: Option<Vec<ModuleType>>,

    /// Overwrite modules that already exist
    pub force_regenerate: bool,

    /// Run through the parallel executor
    pub parallel: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            module_types: None,
            force_regenerate: false,
            parallel: true,
        }
    }
}

impl GenerationOptions {
    /// Generate these module types only.
    pub fn with_module_types(mut self, types: impl IntoIterator<Item = ModuleType>) -> Self {
        self.module_types = Some(types.into_iter().collect());
        self
    }

    /// Overwrite existing modules.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force_regenerate = force;
        self
    }

    /// One module at a time.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// Outcome of a generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// True when no module failed
    pub success: bool,

    /// Modules written
    pub generated_modules: Vec<ModuleType>,

    /// Modules whose generation or write failed
    pub failed_modules: Vec<FailedModule>,

    /// Modules left alone because they already exist
    pub skipped_modules: Vec<ModuleType>,

    /// Executor statistics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ExecutionStats>,
}
