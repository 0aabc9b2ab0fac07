//! Per-feature metadata store.

use chrono::Utc;
use modspec_core::{
    ModuleError, ModuleMetadata, ModuleMetadataFile, ModuleType, Result, WorkflowState,
    METADATA_VERSION,
};
use modspec_storage::{DocumentStore, FeatureLayout};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::content_checksum;

/// Durable record of each module's workflow state and checksum.
///
/// All modules of a feature share one `.module-metadata.json` document.
/// Mutations are read-modify-write and are serialized per feature, so
/// concurrent updates to different modules of the same feature never lose
/// each other's changes within one process.
pub struct ModuleMetadataStore<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    layout: FeatureLayout,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: DocumentStore + ?Sized> ModuleMetadataStore<S> {
    /// Create a metadata store.
    pub fn new(store: Arc<S>, layout: FeatureLayout) -> Self {
        Self {
            store,
            layout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn feature_lock(&self, feature: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(feature.to_string()).or_default().clone()
    }

    /// Load a feature's metadata. A missing document is an empty one.
    pub async fn load(&self, feature: &str) -> Result<ModuleMetadataFile> {
        let path = self.layout.metadata(feature)?;
        let raw = match self.store.read_file(&path).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => return Ok(ModuleMetadataFile::default()),
            Err(e) => return Err(e.into()),
        };

        let file: ModuleMetadataFile = serde_json::from_str(&raw).map_err(|e| {
            ModuleError::Validation(format!("malformed metadata at {}: {}", path.display(), e))
        })?;
        if file.version != METADATA_VERSION {
            return Err(ModuleError::Validation(format!(
                "unsupported metadata version '{}' at {}",
                file.version,
                path.display()
            )));
        }
        Ok(file)
    }

    /// Persist a feature's metadata, recomputing the progression gate.
    pub async fn save(&self, feature: &str, file: &mut ModuleMetadataFile) -> Result<()> {
        file.can_progress_to_tasks = file.compute_can_progress();

        let path = self.layout.metadata(feature)?;
        let mut json = serde_json::to_string_pretty(file)
            .map_err(|e| ModuleError::Validation(format!("cannot serialize metadata: {}", e)))?;
        json.push('\n');

        self.store.create_directory(&self.layout.feature_dir(feature)?).await?;
        self.store.write_file(&path, &json).await?;
        debug!(
            "Saved metadata for {} ({} modules, gate {})",
            feature,
            file.modules.len(),
            file.can_progress_to_tasks
        );
        Ok(())
    }

    /// Load, apply `f`, and save while holding the feature's lock.
    async fn mutate<R>(
        &self,
        feature: &str,
        f: impl FnOnce(&mut ModuleMetadataFile) -> Result<R>,
    ) -> Result<R> {
        let lock = self.feature_lock(feature).await;
        let _guard = lock.lock().await;

        let mut file = self.load(feature).await?;
        let out = f(&mut file)?;
        self.save(feature, &mut file).await?;
        Ok(out)
    }

    /// Metadata record of a module, if any.
    pub async fn get_metadata(
        &self,
        feature: &str,
        module_type: &ModuleType,
    ) -> Result<Option<ModuleMetadata>> {
        Ok(self.load(feature).await?.modules.remove(module_type))
    }

    /// Workflow state of a module; unknown modules are `NotGenerated`.
    pub async fn get_state(&self, feature: &str, module_type: &ModuleType) -> Result<WorkflowState> {
        Ok(self.load(feature).await?.state(module_type))
    }

    /// Record a successful generation or migration.
    ///
    /// Puts the module in `PendingReview` whatever its previous state and
    /// clears any earlier approval.
    pub async fn mark_generated(
        &self,
        feature: &str,
        module_type: &ModuleType,
        checksum: impl Into<String>,
    ) -> Result<ModuleMetadata> {
        let checksum = checksum.into();
        self.mutate(feature, |file| {
            let meta = file.modules.entry(module_type.clone()).or_default();
            meta.workflow_state = WorkflowState::PendingReview;
            meta.generated_at = Some(Utc::now());
            meta.approved_at = None;
            meta.approved_by = None;
            meta.checksum = Some(checksum);
            Ok(meta.clone())
        })
        .await
    }

    /// Apply a workflow transition.
    ///
    /// `Approved` and `Rejected` follow reviewer rules; `PendingReview`
    /// reopens a generated module; nothing moves a module to `NotGenerated`.
    pub async fn set_state(
        &self,
        feature: &str,
        module_type: &ModuleType,
        state: WorkflowState,
        approver: Option<&str>,
    ) -> Result<ModuleMetadata> {
        self.mutate(feature, |file| {
            let current = file.state(module_type);
            let allowed = match state {
                WorkflowState::Approved | WorkflowState::Rejected => current.can_review_to(state),
                WorkflowState::PendingReview => current.is_generated(),
                WorkflowState::NotGenerated => false,
            };
            if !allowed {
                return Err(ModuleError::Validation(format!(
                    "cannot move {} from {} to {}",
                    module_type, current, state
                )));
            }

            let meta = file.modules.entry(module_type.clone()).or_default();
            meta.workflow_state = state;
            if state == WorkflowState::Approved {
                meta.approved_at = Some(Utc::now());
                meta.approved_by = approver.map(str::to_string);
            } else {
                meta.approved_at = None;
                meta.approved_by = None;
            }
            info!("{} {}: {} -> {}", feature, module_type, current, state);
            Ok(meta.clone())
        })
        .await
    }

    /// Approve a module.
    pub async fn approve(
        &self,
        feature: &str,
        module_type: &ModuleType,
        approver: Option<&str>,
    ) -> Result<ModuleMetadata> {
        self.set_state(feature, module_type, WorkflowState::Approved, approver)
            .await
    }

    /// Reject a module.
    pub async fn reject(&self, feature: &str, module_type: &ModuleType) -> Result<ModuleMetadata> {
        self.set_state(feature, module_type, WorkflowState::Rejected, None)
            .await
    }

    /// Store the checksum of manually edited content.
    ///
    /// A module without a record gets one in `PendingReview`, since its
    /// document now exists.
    pub async fn update_checksum(
        &self,
        feature: &str,
        module_type: &ModuleType,
        checksum: impl Into<String>,
    ) -> Result<ModuleMetadata> {
        let checksum = checksum.into();
        self.mutate(feature, |file| {
            let meta = file.modules.entry(module_type.clone()).or_default();
            if !meta.workflow_state.is_generated() {
                meta.workflow_state = WorkflowState::PendingReview;
            }
            meta.checksum = Some(checksum);
            Ok(meta.clone())
        })
        .await
    }

    /// Whether `content` differs from the last content written through the
    /// system. No stored checksum means not modified.
    pub async fn is_module_modified(
        &self,
        feature: &str,
        module_type: &ModuleType,
        content: &str,
    ) -> Result<bool> {
        let stored = self
            .get_metadata(feature, module_type)
            .await?
            .and_then(|m| m.checksum);
        Ok(stored.is_some_and(|c| c != content_checksum(content)))
    }

    /// Delete a module's record. Returns whether one existed.
    pub async fn remove_module(&self, feature: &str, module_type: &ModuleType) -> Result<bool> {
        self.mutate(feature, |file| Ok(file.modules.remove(module_type).is_some()))
            .await
    }

    /// Whether every generated module is approved.
    pub async fn can_progress_to_tasks(&self, feature: &str) -> Result<bool> {
        Ok(self.load(feature).await?.compute_can_progress())
    }
}
