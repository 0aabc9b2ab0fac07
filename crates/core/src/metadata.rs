//! Persisted per-feature module metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ModuleType, Time, WorkflowState};

/// Current metadata document version.
pub const METADATA_VERSION: &str = "1.0";

/// Workflow record of a single module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetadata {
    /// Review state
    pub workflow_state: WorkflowState,

    /// Last successful generation or migration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<Time>,

    /// Approval time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<Time>,

    /// Approver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,

    /// SHA-256 of the last content written through the system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// The single metadata document stored per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetadataFile {
    /// Format version
    pub version: String,

    /// Per-module records
    pub modules: BTreeMap<ModuleType, ModuleMetadata>,

    /// Cached result of the progression gate
    pub can_progress_to_tasks: bool,
}

impl Default for ModuleMetadataFile {
    fn default() -> Self {
        Self {
            version: METADATA_VERSION.to_string(),
            modules: BTreeMap::new(),
            can_progress_to_tasks: false,
        }
    }
}

impl ModuleMetadataFile {
    /// State of a module; absent modules are `NotGenerated`.
    pub fn state(&self, module_type: &ModuleType) -> WorkflowState {
        self.modules
            .get(module_type)
            .map(|m| m.workflow_state)
            .unwrap_or_default()
    }

    /// Evaluate the progression gate over the current records.
    ///
    /// False until some module has been generated; afterwards true only when
    /// every generated module is approved.
    pub fn compute_can_progress(&self) -> bool {
        let mut generated = self
            .modules
            .values()
            .filter(|m| m.workflow_state.is_generated())
            .peekable();

        if generated.peek().is_none() {
            return false;
        }
        generated.all(|m| m.workflow_state == WorkflowState::Approved)
    }
}
