//! modspec core data models.
//!
//! This crate defines the data structures shared by the module detector,
//! migrator, metadata store and orchestrator: module types, workflow states,
//! metadata documents, migration sections and cross-module references.

#![warn(missing_docs)]

mod error;
mod metadata;
mod migration;
mod module;
mod module_type;
mod reference;
mod workflow;

pub use error::{ErrorKind, ErrorReport, ModuleError, Result};
pub use metadata::{ModuleMetadata, ModuleMetadataFile, METADATA_VERSION};
pub use migration::{ContentAnalysis, FailedModule, MigrationResult, Section};
pub use module::{CachedModuleInfo, ModuleInfo};
pub use module_type::{
    CustomModuleType, DetectionRuleSpec, ModuleCatalog, ModuleType, DEFAULT_FILE_PATTERN,
};
pub use reference::{
    CrossLink, Inconsistency, InconsistencySeverity, Reference, ReferenceAnalysis, ReferenceMap,
    ReferenceType, SourceLocation,
};
pub use workflow::WorkflowState;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
