//! Module projections combining store facts with metadata facts.

use serde::{Deserialize, Serialize};

use crate::{ModuleType, Time, WorkflowState};

/// Read-mostly view of a single module of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
    /// Module type
    pub module_type: ModuleType,

    /// Document file name
    pub file_name: String,

    /// Whether the document exists on the store
    pub exists: bool,

    /// Review state (authoritative in the metadata store)
    pub workflow_state: WorkflowState,

    /// Last modification time of the document
    pub last_modified: Option<Time>,

    /// Document size in bytes
    pub file_size: Option<u64>,

    /// Stored content checksum
    pub checksum: Option<String>,
}

impl ModuleInfo {
    /// A module with no document on the store.
    pub fn missing(module_type: ModuleType, file_name: impl Into<String>) -> Self {
        Self {
            module_type,
            file_name: file_name.into(),
            exists: false,
            workflow_state: WorkflowState::NotGenerated,
            last_modified: None,
            file_size: None,
            checksum: None,
        }
    }
}

/// Snapshot of a feature's modules held by the module cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedModuleInfo {
    /// One entry per known module type
    pub modules: Vec<ModuleInfo>,

    /// When the snapshot was taken
    pub last_updated: Time,

    /// Whether a legacy single-file design exists
    pub has_legacy_design: bool,
}

impl CachedModuleInfo {
    /// Modules whose document exists.
    pub fn existing(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.iter().filter(|m| m.exists)
    }

    /// Look up a module by type.
    pub fn module(&self, module_type: &ModuleType) -> Option<&ModuleInfo> {
        self.modules.iter().find(|m| &m.module_type == module_type)
    }
}
