//! Module orchestrator.
//!
//! Composes detection, generation, migration, metadata, cache and the
//! parallel executor into the operations exposed to callers.

use futures::future::join_all;
use modspec_analysis::{
    render_module, CrossReferenceAnalyzer, LegacyMigrator, ModuleDetector, ModuleTexts,
};
use modspec_core::{
    ContentAnalysis, CrossLink, FailedModule, MigrationResult, ModuleCatalog, ModuleError,
    ModuleInfo, ModuleMetadata, ModuleType, ReferenceAnalysis, Result, WorkflowState,
};
use modspec_execution::{ExecutorConfig, ExecutorTask, ParallelExecutor, TaskOutcome};
use modspec_generation::{ContentGenerator, ModuleGenerator, PromptBuilder};
use modspec_storage::{DocumentStore, FeatureLayout};
use modspec_workflow::{content_checksum, ModuleMetadataStore};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{surface_error, Clock, GenerationOptions, GenerationResult, ModuleCache, OrchestratorConfig};

/// Top-level coordinator of a workspace's modular designs.
pub struct ModuleOrchestrator<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    layout: FeatureLayout,
    catalog: ModuleCatalog,
    config: OrchestratorConfig,
    detector: ModuleDetector,
    generator: ModuleGenerator,
    migrator: LegacyMigrator<S>,
    analyzer: CrossReferenceAnalyzer,
    metadata: ModuleMetadataStore<S>,
    cache: ModuleCache<S>,
    executor: ParallelExecutor,
}

impl<S: DocumentStore + ?Sized> ModuleOrchestrator<S> {
    /// Create an orchestrator. Fails on an invalid configuration.
    pub fn new(
        store: Arc<S>,
        generator: Arc<dyn ContentGenerator>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| surfaced("configure orchestrator", e))?;
        let catalog = config.catalog()?;
        let layout = FeatureLayout::new(&config.feature_base_path);

        Ok(Self {
            detector: ModuleDetector::with_catalog(&catalog)?,
            generator: ModuleGenerator::new(generator, PromptBuilder::new(catalog.clone())),
            migrator: LegacyMigrator::new(store.clone(), layout.clone(), catalog.clone()),
            analyzer: CrossReferenceAnalyzer::new(catalog.clone()),
            metadata: ModuleMetadataStore::new(store.clone(), layout.clone()),
            cache: ModuleCache::new(store.clone(), layout.clone(), catalog.clone())
                .with_ttl(config.cache_ttl()),
            executor: ParallelExecutor::new(config.executor_config()),
            store,
            layout,
            catalog,
            config,
        })
    }

    /// Use another clock for cache expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = self.cache.with_clock(clock);
        self
    }

    /// Known module types.
    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    /// Active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Module cache.
    pub fn cache(&self) -> &ModuleCache<S> {
        &self.cache
    }

    // ==================== Generation ====================

    /// Generate a feature's modules.
    ///
    /// Reading the requirements is fatal; each module's generation is
    /// isolated, so some modules may succeed while others fail.
    pub async fn generate_modules(
        &self,
        feature: &str,
        options: GenerationOptions,
    ) -> Result<GenerationResult> {
        self.run_generation(feature, options)
            .await
            .map_err(|e| surfaced("generate modules", e))
    }

    async fn run_generation(
        &self,
        feature: &str,
        options: GenerationOptions,
    ) -> Result<GenerationResult> {
        let requirements = self.read_requirements(feature).await?;

        let targets = match &options.module_types {
            Some(types) => self.resolve_types(types)?,
            None => self.detector.detect(&requirements),
        };

        let mut result = GenerationResult::default();
        let mut pending = Vec::new();
        for module_type in targets {
            let path = self.layout.module(feature, &self.catalog, &module_type)?;
            let exists = self.store.exists(&path).await?;
            if exists && !options.force_regenerate {
                debug!("Skipping existing module {}", module_type);
                result.skipped_modules.push(module_type);
            } else {
                pending.push(module_type);
            }
        }

        if !pending.is_empty() {
            self.store
                .create_directory(&self.layout.feature_dir(feature)?)
                .await?;
        }

        let siblings = if self.config.include_sibling_context {
            self.read_existing_modules(feature).await?
        } else {
            ModuleTexts::new()
        };

        let mut by_id = BTreeMap::new();
        let tasks: Vec<_> = pending
            .iter()
            .map(|module_type| {
                by_id.insert(module_type.as_str().to_string(), module_type.clone());
                ExecutorTask::new(
                    module_type.as_str(),
                    self.generate_one(feature, module_type, &requirements, &siblings),
                )
            })
            .collect();

        let executor = if options.parallel && self.config.parallel {
            self.executor.clone()
        } else {
            ParallelExecutor::new(ExecutorConfig::sequential())
        };
        let report = executor
            .execute(tasks)
            .await
            .map_err(|e| ModuleError::Validation(e.to_string()))?;

        for (id, outcome) in report.outcomes {
            let Some(module_type) = by_id.remove(&id) else { continue };
            match outcome {
                TaskOutcome::Succeeded { .. } => result.generated_modules.push(module_type),
                TaskOutcome::Failed { error, .. } => result.failed_modules.push(FailedModule {
                    module_type,
                    error: error.to_string(),
                }),
                TaskOutcome::Skipped => result.skipped_modules.push(module_type),
            }
        }
        result.success = result.failed_modules.is_empty();
        result.stats = Some(report.stats);

        self.refresh_cache(feature).await;
        info!(
            "Generated modules for {}: {} generated, {} failed, {} skipped",
            feature,
            result.generated_modules.len(),
            result.failed_modules.len(),
            result.skipped_modules.len()
        );
        Ok(result)
    }

    /// Generate one module, overwriting any existing document.
    pub async fn generate_specific_module(
        &self,
        feature: &str,
        module_type: &ModuleType,
    ) -> Result<ModuleMetadata> {
        let outcome: Result<ModuleMetadata> = async {
            self.ensure_known(module_type)?;
            let requirements = self.read_requirements(feature).await?;
            let siblings = if self.config.include_sibling_context {
                let mut siblings = self.read_existing_modules(feature).await?;
                siblings.remove(module_type);
                siblings
            } else {
                ModuleTexts::new()
            };
            self.store
                .create_directory(&self.layout.feature_dir(feature)?)
                .await?;
            self.generate_one(feature, module_type, &requirements, &siblings)
                .await
        }
        .await;

        self.refresh_cache(feature).await;
        outcome.map_err(|e| surfaced("generate module", e))
    }

    /// Regenerate a module; it goes back to `PendingReview`.
    pub async fn regenerate_module(
        &self,
        feature: &str,
        module_type: &ModuleType,
    ) -> Result<ModuleMetadata> {
        self.generate_specific_module(feature, module_type).await
    }

    async fn generate_one(
        &self,
        feature: &str,
        module_type: &ModuleType,
        requirements: &str,
        siblings: &ModuleTexts,
    ) -> Result<ModuleMetadata> {
        let content = self
            .generator
            .generate_with_context(feature, module_type, requirements, siblings)
            .await?;
        let path = self.layout.module(feature, &self.catalog, module_type)?;
        self.store.write_file(&path, &content).await?;
        let meta = self
            .metadata
            .mark_generated(feature, module_type, content_checksum(&content))
            .await?;
        debug!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(meta)
    }

    // ==================== Listing and CRUD ====================

    /// Every known module of a feature with live workflow state.
    pub async fn get_module_list(&self, feature: &str) -> Result<Vec<ModuleInfo>> {
        let snapshot = match self.cache.get(feature).await {
            Some(snapshot) => snapshot,
            None => self.cache.refresh(feature).await?,
        };
        let metadata = self.metadata.load(feature).await?;

        Ok(snapshot
            .modules
            .into_iter()
            .map(|mut info| {
                if let Some(meta) = metadata.modules.get(&info.module_type) {
                    info.workflow_state = meta.workflow_state;
                    info.checksum = meta.checksum.clone();
                }
                info
            })
            .collect())
    }

    /// Content of a module document.
    pub async fn get_module_content(&self, feature: &str, module_type: &ModuleType) -> Result<String> {
        self.ensure_known(module_type)?;
        let path = self.layout.module(feature, &self.catalog, module_type)?;
        Ok(self.store.read_file(&path).await?)
    }

    /// Replace a module's content and record its checksum.
    pub async fn update_module(
        &self,
        feature: &str,
        module_type: &ModuleType,
        content: &str,
    ) -> Result<ModuleMetadata> {
        self.ensure_known(module_type)?;
        let path = self.layout.module(feature, &self.catalog, module_type)?;
        self.store.write_file(&path, content).await?;
        let meta = self
            .metadata
            .update_checksum(feature, module_type, content_checksum(content))
            .await?;
        self.cache.invalidate(feature).await;
        info!("Updated {} for {}", module_type, feature);
        Ok(meta)
    }

    /// Delete a module's document and metadata.
    pub async fn delete_module(&self, feature: &str, module_type: &ModuleType) -> Result<()> {
        self.ensure_known(module_type)?;
        let path = self.layout.module(feature, &self.catalog, module_type)?;
        match self.store.delete(&path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("{} already absent", path.display()),
            Err(e) => return Err(e.into()),
        }
        self.metadata.remove_module(feature, module_type).await?;
        self.cache.invalidate(feature).await;
        info!("Deleted {} for {}", module_type, feature);
        Ok(())
    }

    /// Whether the module's document differs from what was last written
    /// through the system.
    pub async fn is_module_modified(&self, feature: &str, module_type: &ModuleType) -> Result<bool> {
        let content = self.get_module_content(feature, module_type).await?;
        self.metadata
            .is_module_modified(feature, module_type, &content)
            .await
    }

    // ==================== Legacy migration ====================

    /// Whether the feature still has only a single-file design.
    pub async fn is_legacy_design(&self, feature: &str) -> Result<bool> {
        let legacy = self.layout.legacy_design(feature)?;
        if !self.store.exists(&legacy).await? {
            return Ok(false);
        }
        for module_type in self.catalog.all_types() {
            let path = self.layout.module(feature, &self.catalog, &module_type)?;
            if self.store.exists(&path).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Classify the legacy design without writing anything.
    pub async fn analyze_legacy_design(&self, feature: &str) -> Result<ContentAnalysis> {
        let legacy = self.layout.legacy_design(feature)?;
        let text = self.store.read_file(&legacy).await?;
        self.migrator.analyze(&text)
    }

    /// Split the legacy design into modules.
    ///
    /// Refused once any module document exists, so reviewed modules are
    /// never overwritten. Migrated modules start in `PendingReview`. The
    /// legacy document is renamed to a free backup name only when every
    /// module was written.
    pub async fn migrate_legacy_design(&self, feature: &str) -> Result<MigrationResult> {
        self.run_migration(feature)
            .await
            .map_err(|e| surfaced("migrate legacy design", e))
    }

    async fn run_migration(&self, feature: &str) -> Result<MigrationResult> {
        let legacy = self.layout.legacy_design(feature)?;
        if !self.store.exists(&legacy).await? {
            return Err(ModuleError::NotFound {
                path: legacy.display().to_string(),
            });
        }
        if !self.is_legacy_design(feature).await? {
            return Err(ModuleError::Validation(format!(
                "{} already has module documents; migrating would overwrite them",
                feature
            )));
        }

        let analysis = self.analyze_legacy_design(feature).await?;
        let mut result = self.migrator.migrate_to_modules(feature, &analysis).await?;

        let mut recorded = Vec::new();
        for module_type in result.migrated_modules.drain(..) {
            let content = render_module(&self.catalog.label(&module_type), &module_type, &analysis);
            match self
                .metadata
                .mark_generated(feature, &module_type, content_checksum(&content))
                .await
            {
                Ok(_) => recorded.push(module_type),
                Err(e) => {
                    warn!("Failed to record metadata for {}: {}", module_type, e);
                    result.failed_modules.push(FailedModule {
                        module_type,
                        error: e.to_string(),
                    });
                }
            }
        }
        result.migrated_modules = recorded;
        result.success = result.failed_modules.is_empty();

        if result.success {
            let backup = self.free_backup_path(feature).await?;
            self.store.rename(&legacy, &backup).await?;
            info!("Backed up legacy design to {}", backup.display());
        }

        self.refresh_cache(feature).await;
        Ok(result)
    }

    // ==================== Workflow ====================

    /// Review state of a module.
    pub async fn get_module_workflow_state(
        &self,
        feature: &str,
        module_type: &ModuleType,
    ) -> Result<WorkflowState> {
        self.metadata.get_state(feature, module_type).await
    }

    /// Move a module to another review state.
    pub async fn update_module_workflow_state(
        &self,
        feature: &str,
        module_type: &ModuleType,
        state: WorkflowState,
        approver: Option<&str>,
    ) -> Result<ModuleMetadata> {
        self.ensure_known(module_type)?;
        let meta = self
            .metadata
            .set_state(feature, module_type, state, approver)
            .await?;
        self.cache.invalidate(feature).await;
        Ok(meta)
    }

    /// Approve a module.
    pub async fn approve_module(
        &self,
        feature: &str,
        module_type: &ModuleType,
        approver: Option<&str>,
    ) -> Result<ModuleMetadata> {
        self.update_module_workflow_state(feature, module_type, WorkflowState::Approved, approver)
            .await
    }

    /// Reject a module.
    pub async fn reject_module(&self, feature: &str, module_type: &ModuleType) -> Result<ModuleMetadata> {
        self.update_module_workflow_state(feature, module_type, WorkflowState::Rejected, None)
            .await
    }

    /// Whether the feature can move on to task planning.
    pub async fn can_progress_to_tasks(&self, feature: &str) -> Result<bool> {
        self.metadata.can_progress_to_tasks(feature).await
    }

    // ==================== References ====================

    /// References and inconsistencies across the feature's modules.
    pub async fn analyze_references(&self, feature: &str) -> Result<ReferenceAnalysis> {
        let modules = self.read_existing_modules(feature).await?;
        let analysis = self.analyzer.analyze(&modules);
        info!(
            "Analyzed {} modules of {}: {} inconsistencies ({} errors)",
            modules.len(),
            feature,
            analysis.inconsistencies.len(),
            analysis.error_count()
        );
        Ok(analysis)
    }

    /// Navigation links from a module to related modules.
    pub async fn cross_links(&self, feature: &str, module_type: &ModuleType) -> Result<Vec<CrossLink>> {
        self.ensure_known(module_type)?;
        let modules = self.read_existing_modules(feature).await?;
        Ok(self.analyzer.generate_cross_links(module_type, &modules))
    }

    // ==================== Helpers ====================

    async fn read_requirements(&self, feature: &str) -> Result<String> {
        let path = self.layout.requirements(feature)?;
        Ok(self.store.read_file(&path).await?)
    }

    /// Texts of every module whose document exists.
    async fn read_existing_modules(&self, feature: &str) -> Result<ModuleTexts> {
        let types = self.catalog.all_types();
        let mut paths = Vec::with_capacity(types.len());
        for module_type in &types {
            paths.push(self.layout.module(feature, &self.catalog, module_type)?);
        }

        let reads = join_all(paths.iter().map(|p| self.store.read_file(p))).await;
        let mut texts = ModuleTexts::new();
        for (module_type, read) in types.into_iter().zip(reads) {
            match read {
                Ok(text) => {
                    texts.insert(module_type, text);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("Skipping unreadable module {}: {}", module_type, e),
            }
        }
        Ok(texts)
    }

    /// `design.md.backup`, or the first numbered backup not yet taken.
    async fn free_backup_path(&self, feature: &str) -> Result<PathBuf> {
        let mut backup = self.layout.legacy_backup(feature)?;
        let mut n = 2;
        while self.store.exists(&backup).await? {
            backup = self.layout.numbered_backup(feature, n)?;
            n += 1;
        }
        Ok(backup)
    }

    fn resolve_types(&self, types: &[ModuleType]) -> Result<BTreeSet<ModuleType>> {
        types
            .iter()
            .map(|t| self.ensure_known(t).map(|_| t.clone()))
            .collect()
    }

    fn ensure_known(&self, module_type: &ModuleType) -> Result<()> {
        if self.catalog.contains(module_type) {
            Ok(())
        } else {
            Err(ModuleError::Validation(format!(
                "unknown module type '{}'",
                module_type
            )))
        }
    }

    async fn refresh_cache(&self, feature: &str) {
        self.cache.invalidate(feature).await;
        if let Err(e) = self.cache.refresh(feature).await {
            warn!("Cache refresh for {} failed: {}", feature, e);
        }
    }
}

fn surfaced(operation: &str, err: ModuleError) -> ModuleError {
    surface_error(operation, &err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use async_trait::async_trait;
    use modspec_core::InconsistencySeverity;
    use modspec_storage::{FsDocumentStore, InMemoryDocumentStore};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Replies with a module heading; fails for prompts naming `fail_on`.
    struct ScriptedGenerator {
        fail_on: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                fail_on: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing_on(label: &'static str) -> Arc<Self> {
            Arc::new(Self {
                fail_on: Some(label),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ContentGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            if let Some(label) = self.fail_on {
                if prompt.contains(&format!("the {} design module", label)) {
                    anyhow::bail!("model overloaded");
                }
            }
            let first = prompt.lines().next().unwrap_or_default();
            Ok(format!("# Generated\n\n{}\n", first))
        }
    }

    const BASE: &str = "/ws/.specs";

    /// Captures formatted log output for the current thread.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            let writer = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    async fn setup(
        generator: Arc<ScriptedGenerator>,
    ) -> (Arc<InMemoryDocumentStore>, ModuleOrchestrator<InMemoryDocumentStore>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .write_file(
                Path::new("/ws/.specs/login/requirements.md"),
                "Implement REST API endpoints with PostgreSQL storage",
            )
            .await
            .unwrap();
        let orchestrator =
            ModuleOrchestrator::new(store.clone(), generator, OrchestratorConfig::new(BASE)).unwrap();
        (store, orchestrator)
    }

    fn module_path(t: &ModuleType) -> PathBuf {
        PathBuf::from(format!("{}/login/design-{}.md", BASE, t))
    }

    #[tokio::test]
    async fn test_generate_detected_modules() {
        let (store, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let result = orchestrator
            .generate_modules("login", GenerationOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        let expected = [
            ModuleType::ServerApi,
            ModuleType::ServerLogic,
            ModuleType::ServerDatabase,
            ModuleType::Testing,
        ];
        for t in &expected {
            assert!(result.generated_modules.contains(t));
            assert!(store.exists(&module_path(t)).await.unwrap());
            assert_eq!(
                orchestrator.get_module_workflow_state("login", t).await.unwrap(),
                WorkflowState::PendingReview
            );
        }
        assert!(!result.generated_modules.contains(&ModuleType::Mobile));
        assert_eq!(result.stats.unwrap().total, expected.len());
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let (store, orchestrator) = setup(ScriptedGenerator::failing_on("Server Logic")).await;
        let options = GenerationOptions::default().with_module_types([
            ModuleType::ServerApi,
            ModuleType::ServerLogic,
            ModuleType::ServerDatabase,
        ]);

        let result = orchestrator.generate_modules("login", options).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.generated_modules.len(), 2);
        assert_eq!(result.failed_modules.len(), 1);
        assert_eq!(result.failed_modules[0].module_type, ModuleType::ServerLogic);
        assert!(result.failed_modules[0].error.contains("model overloaded"));
        assert!(store.exists(&module_path(&ModuleType::ServerApi)).await.unwrap());
        assert!(store.exists(&module_path(&ModuleType::ServerDatabase)).await.unwrap());
        assert!(!store.exists(&module_path(&ModuleType::ServerLogic)).await.unwrap());
        assert_eq!(
            orchestrator
                .get_module_workflow_state("login", &ModuleType::ServerLogic)
                .await
                .unwrap(),
            WorkflowState::NotGenerated
        );
    }

    #[tokio::test]
    async fn test_existing_modules_are_skipped_unless_forced() {
        let generator = ScriptedGenerator::ok();
        let (_, orchestrator) = setup(generator.clone()).await;
        let options = GenerationOptions::default().with_module_types([ModuleType::Testing]);

        orchestrator.generate_modules("login", options.clone()).await.unwrap();
        let again = orchestrator.generate_modules("login", options.clone()).await.unwrap();
        assert_eq!(again.skipped_modules, vec![ModuleType::Testing]);
        assert!(again.generated_modules.is_empty());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        let forced = orchestrator
            .generate_modules("login", options.with_force(true).sequential())
            .await
            .unwrap();
        assert_eq!(forced.generated_modules, vec![ModuleType::Testing]);
    }

    #[tokio::test]
    async fn test_missing_requirements_is_fatal() {
        let (_, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let err = orchestrator
            .generate_modules("signup", GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_module_type_is_rejected() {
        let (_, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let logs = LogBuffer::default();
        let _guard = logs.install();

        let options = GenerationOptions::default()
            .with_module_types([ModuleType::Custom("security".into())]);
        assert!(matches!(
            orchestrator.generate_modules("login", options).await,
            Err(ModuleError::Validation(_))
        ));

        let logs = logs.contents();
        assert!(logs.contains("ERROR"), "{logs}");
        assert!(logs.contains("generate modules failed"), "{logs}");
        assert!(logs.contains("unknown module type 'security'"), "{logs}");
    }

    #[tokio::test]
    async fn test_module_list_overlays_workflow_state() {
        let (_, orchestrator) = setup(ScriptedGenerator::ok()).await;
        orchestrator
            .generate_modules(
                "login",
                GenerationOptions::default().with_module_types([ModuleType::Frontend]),
            )
            .await
            .unwrap();
        orchestrator
            .approve_module("login", &ModuleType::Frontend, Some("ana"))
            .await
            .unwrap();

        let list = orchestrator.get_module_list("login").await.unwrap();
        assert_eq!(list.len(), ModuleType::BUILTIN.len());
        let frontend = list
            .iter()
            .find(|m| m.module_type == ModuleType::Frontend)
            .unwrap();
        assert!(frontend.exists);
        assert_eq!(frontend.workflow_state, WorkflowState::Approved);
        assert!(frontend.checksum.is_some());
        assert!(orchestrator.can_progress_to_tasks("login").await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_is_fresh_after_generation() {
        let (_, orchestrator) = setup(ScriptedGenerator::ok()).await;
        assert!(!orchestrator.get_module_list("login").await.unwrap().iter().any(|m| m.exists));

        orchestrator
            .generate_modules(
                "login",
                GenerationOptions::default().with_module_types([ModuleType::Mobile]),
            )
            .await
            .unwrap();

        let cached = orchestrator.cache().get("login").await.unwrap();
        assert!(cached.module(&ModuleType::Mobile).unwrap().exists);
    }

    #[tokio::test]
    async fn test_update_and_checksums() {
        let (_, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let t = ModuleType::Frontend;

        let a = orchestrator.update_module("login", &t, "A").await.unwrap().checksum;
        let b = orchestrator.update_module("login", &t, "B").await.unwrap().checksum;
        let a_again = orchestrator.update_module("login", &t, "A").await.unwrap().checksum;
        assert_ne!(a, b);
        assert_eq!(a, a_again);

        assert_eq!(orchestrator.get_module_content("login", &t).await.unwrap(), "A");
        assert!(!orchestrator.is_module_modified("login", &t).await.unwrap());
        assert_eq!(
            orchestrator.get_module_workflow_state("login", &t).await.unwrap(),
            WorkflowState::PendingReview
        );
    }

    #[tokio::test]
    async fn test_out_of_band_edit_is_detected() {
        let (store, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let t = ModuleType::Testing;
        orchestrator.generate_specific_module("login", &t).await.unwrap();
        assert!(!orchestrator.is_module_modified("login", &t).await.unwrap());

        store.write_file(&module_path(&t), "edited by hand").await.unwrap();
        assert!(orchestrator.is_module_modified("login", &t).await.unwrap());
    }

    #[tokio::test]
    async fn test_regenerate_returns_to_pending_review() {
        let (_, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let t = ModuleType::ServerApi;
        orchestrator.generate_specific_module("login", &t).await.unwrap();
        orchestrator.approve_module("login", &t, None).await.unwrap();

        let meta = orchestrator.regenerate_module("login", &t).await.unwrap();
        assert_eq!(meta.workflow_state, WorkflowState::PendingReview);
        assert!(meta.approved_at.is_none());
        assert!(!orchestrator.can_progress_to_tasks("login").await.unwrap());
    }

    #[tokio::test]
    async fn test_generation_failure_of_single_module_propagates() {
        let (_, orchestrator) = setup(ScriptedGenerator::failing_on("Testing")).await;
        let err = orchestrator
            .generate_specific_module("login", &ModuleType::Testing)
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::Generation { .. }));
    }

    #[tokio::test]
    async fn test_delete_module() {
        let (store, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let t = ModuleType::ServerDatabase;
        orchestrator.generate_specific_module("login", &t).await.unwrap();
        orchestrator.get_module_list("login").await.unwrap();

        orchestrator.delete_module("login", &t).await.unwrap();
        assert!(!store.exists(&module_path(&t)).await.unwrap());
        assert_eq!(
            orchestrator.get_module_workflow_state("login", &t).await.unwrap(),
            WorkflowState::NotGenerated
        );
        assert!(orchestrator.cache().get("login").await.is_none());

        // Already absent is fine.
        orchestrator.delete_module("login", &t).await.unwrap();
        assert!(orchestrator
            .get_module_content("login", &t)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_workflow_transitions() {
        let (_, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let t = ModuleType::Frontend;
        assert!(orchestrator.approve_module("login", &t, None).await.is_err());

        orchestrator.generate_specific_module("login", &t).await.unwrap();
        orchestrator.reject_module("login", &t).await.unwrap();
        assert!(!orchestrator.can_progress_to_tasks("login").await.unwrap());

        let meta = orchestrator
            .update_module_workflow_state("login", &t, WorkflowState::Approved, Some("ana"))
            .await
            .unwrap();
        assert_eq!(meta.approved_by.as_deref(), Some("ana"));
        assert!(orchestrator.can_progress_to_tasks("login").await.unwrap());
    }

    const LEGACY: &str = "# Login Design

## Frontend Components

Login form.

## API Endpoints

POST /api/login

## Database Schema

Table users.
";

    #[tokio::test]
    async fn test_migrate_legacy_design() {
        let (store, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let legacy = PathBuf::from(format!("{}/login/design.md", BASE));
        store.write_file(&legacy, LEGACY).await.unwrap();
        assert!(orchestrator.is_legacy_design("login").await.unwrap());

        let result = orchestrator.migrate_legacy_design("login").await.unwrap();

        assert!(result.success);
        assert_eq!(result.migrated_modules.len(), 3);
        assert!(!store.exists(&legacy).await.unwrap());
        assert!(store
            .exists(Path::new("/ws/.specs/login/design.md.backup"))
            .await
            .unwrap());
        for t in &result.migrated_modules {
            assert_eq!(
                orchestrator.get_module_workflow_state("login", t).await.unwrap(),
                WorkflowState::PendingReview
            );
            assert!(!orchestrator.is_module_modified("login", t).await.unwrap());
        }
        assert!(!orchestrator.is_legacy_design("login").await.unwrap());
    }

    #[tokio::test]
    async fn test_partial_migration_keeps_legacy_document() {
        let (store, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let legacy = PathBuf::from(format!("{}/login/design.md", BASE));
        store.write_file(&legacy, LEGACY).await.unwrap();
        store.fail_writes_to(module_path(&ModuleType::ServerApi)).await;

        let result = orchestrator.migrate_legacy_design("login").await.unwrap();

        assert!(!result.success);
        assert_eq!(result.migrated_modules.len(), 2);
        assert!(store.exists(&legacy).await.unwrap());
        assert!(!store
            .exists(Path::new("/ws/.specs/login/design.md.backup"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_migration_never_overwrites_existing_modules() {
        let (store, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let t = ModuleType::Frontend;
        orchestrator
            .update_module("login", &t, "Hand-written frontend design")
            .await
            .unwrap();
        orchestrator.approve_module("login", &t, Some("ana")).await.unwrap();
        let legacy = PathBuf::from(format!("{}/login/design.md", BASE));
        store.write_file(&legacy, LEGACY).await.unwrap();
        assert!(!orchestrator.is_legacy_design("login").await.unwrap());

        let logs = LogBuffer::default();
        let _guard = logs.install();
        let err = orchestrator.migrate_legacy_design("login").await.unwrap_err();

        assert!(matches!(err, ModuleError::Validation(_)));
        assert!(logs.contents().contains("migrate legacy design failed"));
        assert_eq!(
            orchestrator.get_module_content("login", &t).await.unwrap(),
            "Hand-written frontend design"
        );
        assert_eq!(
            orchestrator.get_module_workflow_state("login", &t).await.unwrap(),
            WorkflowState::Approved
        );
        assert!(!store.exists(&module_path(&ModuleType::ServerApi)).await.unwrap());
        assert!(store.exists(&legacy).await.unwrap());
    }

    #[tokio::test]
    async fn test_migration_without_legacy_document_is_not_found() {
        let (_, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let err = orchestrator.migrate_legacy_design("login").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_existing_backup_is_kept() {
        let (store, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let backup = Path::new("/ws/.specs/login/design.md.backup");
        store.write_file(backup, "earlier backup").await.unwrap();
        store
            .write_file(Path::new("/ws/.specs/login/design.md"), LEGACY)
            .await
            .unwrap();

        let result = orchestrator.migrate_legacy_design("login").await.unwrap();

        assert!(result.success);
        assert_eq!(store.read_file(backup).await.unwrap(), "earlier backup");
        assert_eq!(
            store
                .read_file(Path::new("/ws/.specs/login/design.md.backup.2"))
                .await
                .unwrap(),
            LEGACY
        );
    }

    #[tokio::test]
    async fn test_malformed_legacy_design_is_fatal() {
        let (store, orchestrator) = setup(ScriptedGenerator::ok()).await;
        store
            .write_file(Path::new("/ws/.specs/login/design.md"), "no headings here")
            .await
            .unwrap();
        assert!(matches!(
            orchestrator.migrate_legacy_design("login").await,
            Err(ModuleError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_analyze_references() {
        let (_, orchestrator) = setup(ScriptedGenerator::ok()).await;
        orchestrator
            .update_module("login", &ModuleType::Frontend, "Submits POST /api/login")
            .await
            .unwrap();
        orchestrator
            .update_module("login", &ModuleType::ServerApi, "## POST /api/session")
            .await
            .unwrap();

        let analysis = orchestrator.analyze_references("login").await.unwrap();
        assert_eq!(analysis.error_count(), 1);
        assert_eq!(analysis.inconsistencies[0].severity, InconsistencySeverity::Error);

        let links = orchestrator
            .cross_links("login", &ModuleType::Frontend)
            .await
            .unwrap();
        assert!(links.iter().any(|l| l.target == ModuleType::ServerApi && l.exists));
        assert!(links.iter().any(|l| l.target == ModuleType::Testing && !l.exists));
    }

    #[tokio::test]
    async fn test_cache_expiry_with_injected_clock() {
        let (_, orchestrator) = setup(ScriptedGenerator::ok()).await;
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let orchestrator = orchestrator.with_clock(clock.clone());

        orchestrator.get_module_list("login").await.unwrap();
        assert!(orchestrator.cache().get("login").await.is_some());

        clock.advance(Duration::from_millis(300_001));
        assert!(orchestrator.cache().get("login").await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_configuration() {
        let result = ModuleOrchestrator::new(
            Arc::new(InMemoryDocumentStore::new()),
            ScriptedGenerator::ok(),
            OrchestratorConfig::default(),
        );
        assert!(matches!(result, Err(ModuleError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_on_filesystem_with_dyn_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("login")).unwrap();
        std::fs::write(dir.path().join("login/requirements.md"), "A React dashboard").unwrap();

        let store: Arc<dyn DocumentStore> = Arc::new(FsDocumentStore::new());
        let orchestrator =
            ModuleOrchestrator::new(store, ScriptedGenerator::ok(), OrchestratorConfig::new(dir.path()))
                .unwrap();

        let result = orchestrator
            .generate_modules("login", GenerationOptions::default())
            .await
            .unwrap();
        assert!(result.generated_modules.contains(&ModuleType::Frontend));
        assert!(dir.path().join("login/design-frontend.md").exists());
        assert!(dir.path().join("login/.module-metadata.json").exists());
    }
}
