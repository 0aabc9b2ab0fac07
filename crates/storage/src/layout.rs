//! Path composition for feature artifacts.
//!
//! Every artifact lives at `{base}/{feature}/{artifact}`.

use modspec_core::{ModuleCatalog, ModuleError, ModuleType};
use std::path::{Path, PathBuf};

/// Requirements document name.
pub const REQUIREMENTS_FILE: &str = "requirements.md";
/// Legacy single-file design document name.
pub const LEGACY_DESIGN_FILE: &str = "design.md";
/// Backup name of a migrated legacy design.
pub const LEGACY_BACKUP_FILE: &str = "design.md.backup";
/// Module metadata document name.
pub const METADATA_FILE: &str = ".module-metadata.json";

/// Resolves artifact paths under a feature base directory.
#[derive(Debug, Clone)]
pub struct FeatureLayout {
    base: PathBuf,
}

impl FeatureLayout {
    /// Create a layout rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base directory holding all features.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory of a feature. Feature names must be a single path component.
    pub fn feature_dir(&self, feature: &str) -> Result<PathBuf, ModuleError> {
        validate_feature_name(feature)?;
        Ok(self.base.join(feature))
    }

    /// `requirements.md`
    pub fn requirements(&self, feature: &str) -> Result<PathBuf, ModuleError> {
        Ok(self.feature_dir(feature)?.join(REQUIREMENTS_FILE))
    }

    /// `design.md`
    pub fn legacy_design(&self, feature: &str) -> Result<PathBuf, ModuleError> {
        Ok(self.feature_dir(feature)?.join(LEGACY_DESIGN_FILE))
    }

    /// `design.md.backup`
    pub fn legacy_backup(&self, feature: &str) -> Result<PathBuf, ModuleError> {
        Ok(self.feature_dir(feature)?.join(LEGACY_BACKUP_FILE))
    }

    /// `design.md.backup.{n}`, used once `design.md.backup` is taken.
    pub fn numbered_backup(&self, feature: &str, n: usize) -> Result<PathBuf, ModuleError> {
        Ok(self
            .feature_dir(feature)?
            .join(format!("{}.{}", LEGACY_BACKUP_FILE, n)))
    }

    /// `.module-metadata.json`
    pub fn metadata(&self, feature: &str) -> Result<PathBuf, ModuleError> {
        Ok(self.feature_dir(feature)?.join(METADATA_FILE))
    }

    /// Module document, named by the catalog.
    pub fn module(
        &self,
        feature: &str,
        catalog: &ModuleCatalog,
        module_type: &ModuleType,
    ) -> Result<PathBuf, ModuleError> {
        Ok(self.feature_dir(feature)?.join(catalog.file_name(module_type)))
    }
}

fn validate_feature_name(feature: &str) -> Result<(), ModuleError> {
    let trimmed = feature.trim();
    if trimmed.is_empty() {
        return Err(ModuleError::Validation("feature name is empty".into()));
    }
    if trimmed != feature
        || feature.contains(['/', '\\'])
        || feature == "."
        || feature == ".."
    {
        return Err(ModuleError::Validation(format!(
            "feature name '{}' must be a single path component",
            feature
        )));
    }
    Ok(())
}
