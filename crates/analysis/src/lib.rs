//! Text analysis for modular designs.
//!
//! - [`detector`]: which module types a feature needs
//! - [`migration`]: splitting a legacy design into modules
//! - [`references`]: cross-module references and inconsistencies

#![warn(missing_docs)]

pub mod detector;
pub mod migration;
pub mod references;

pub use detector::{DetectionEvidence, DetectionRule, ModuleDetector};
pub use migration::{analyze_legacy_design, render_module, LegacyMigrator, SectionClassifier};
pub use references::{related_modules, CrossReferenceAnalyzer, ModuleTexts};
