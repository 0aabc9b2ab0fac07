//! Cross-module references and inconsistencies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ModuleType;

/// Kind of entity a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceType {
    /// HTTP call to an API endpoint
    ApiCall,
    /// Persistent data model
    DataModel,
    /// UI component
    Component,
    /// Backend service
    Service,
    /// Subject of a test
    TestTarget,
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReferenceType::ApiCall => "api-call",
            ReferenceType::DataModel => "data-model",
            ReferenceType::Component => "component",
            ReferenceType::Service => "service",
            ReferenceType::TestTarget => "test-target",
        };
        f.write_str(s)
    }
}

/// Where a reference was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    /// Line (0-based)
    pub line: usize,

    /// Column of the match start (0-based, in characters)
    pub column: usize,

    /// Module document file name
    pub file_name: String,
}

/// A textual pointer from one module to an entity expected in another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Where it was found
    pub source_location: SourceLocation,

    /// Module expected to define the entity
    pub target_module: ModuleType,

    /// Referenced text (`GET /api/users`, `UserService`, ...)
    pub reference_text: String,

    /// Reference kind
    pub reference_type: ReferenceType,
}

/// source module → target module → references.
pub type ReferenceMap = BTreeMap<ModuleType, BTreeMap<ModuleType, Vec<Reference>>>;

/// Inconsistency severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InconsistencySeverity {
    /// Breaks integration
    Error,
    /// Looser coupling, worth a look
    Warning,
}

/// An unresolved or mismatched cross-module reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inconsistency {
    /// Referencing module
    pub module1: ModuleType,

    /// Module expected to resolve the reference
    pub module2: ModuleType,

    /// What is wrong
    pub description: String,

    /// Severity
    pub severity: InconsistencySeverity,

    /// How to fix it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Navigation suggestion between related modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossLink {
    /// Related module
    pub target: ModuleType,

    /// Link label
    pub label: String,

    /// Whether the related module has content
    pub exists: bool,
}

/// References and inconsistencies across a feature's modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceAnalysis {
    /// Extracted references
    pub references: ReferenceMap,

    /// Detected problems
    pub inconsistencies: Vec<Inconsistency>,
}

impl ReferenceAnalysis {
    /// Number of error-severity findings.
    pub fn error_count(&self) -> usize {
        self.inconsistencies
            .iter()
            .filter(|i| i.severity == InconsistencySeverity::Error)
            .count()
    }
}
