//! Legacy design migration model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ModuleType;

/// A titled section extracted from a legacy design document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Heading text (unique within an analysis)
    pub title: String,

    /// Heading level (2 or 3)
    pub level: usize,

    /// Trimmed body text, heading excluded
    pub content: String,

    /// Line of the heading (0-based)
    pub start_line: usize,

    /// Last line covered by the section (inclusive)
    pub end_line: usize,

    /// Module the section is classified into
    pub suggested_module: ModuleType,

    /// Classification confidence in [0, 1]
    pub confidence: f32,
}

impl Section {
    /// Number of lines covered, heading included.
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    /// The heading as it appeared in the source document.
    pub fn heading(&self) -> String {
        format!("{} {}", "#".repeat(self.level), self.title)
    }
}

/// Result of analyzing a legacy design document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysis {
    /// Sections in document order
    pub sections: Vec<Section>,

    /// Section titles grouped by suggested module, in document order
    pub suggested_module_mapping: BTreeMap<ModuleType, Vec<String>>,
}

impl ContentAnalysis {
    /// Look up a section by title.
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Sections mapped to a module, in document order.
    pub fn sections_for(&self, module_type: &ModuleType) -> Vec<&Section> {
        self.suggested_module_mapping
            .get(module_type)
            .map(|titles| titles.iter().filter_map(|t| self.section(t)).collect())
            .unwrap_or_default()
    }
}

/// A module that could not be written during migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedModule {
    /// Module type
    pub module_type: ModuleType,

    /// Error message
    pub error: String,
}

/// Outcome of migrating a legacy document into modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    /// True when every module was written
    pub success: bool,

    /// Modules written successfully
    pub migrated_modules: Vec<ModuleType>,

    /// Modules that failed
    pub failed_modules: Vec<FailedModule>,
}
