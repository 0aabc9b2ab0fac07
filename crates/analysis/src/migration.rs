//! Legacy content migrator.
//!
//! Splits a single-file design document into level 2-3 heading sections,
//! classifies each section into a module type and writes one document per
//! module.

use modspec_core::{
    ContentAnalysis, FailedModule, MigrationResult, ModuleCatalog, ModuleError, ModuleType,
    Result, Section,
};
use modspec_storage::{DocumentStore, FeatureLayout, LEGACY_DESIGN_FILE};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confidence of a strong title keyword.
pub const STRONG_CONFIDENCE: f32 = 0.9;
/// Confidence of a weak title keyword.
pub const WEAK_CONFIDENCE: f32 = 0.7;
/// Confidence of any other bucket keyword in the title.
pub const KEYWORD_CONFIDENCE: f32 = 0.6;
/// Confidence of the catch-all assignment.
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Module type every unmatched section falls back to.
const FALLBACK_MODULE: ModuleType = ModuleType::ServerLogic;

/// Title keywords of a built-in type: strong, weak and other.
fn bucket_keywords(module_type: &ModuleType) -> [&'static [&'static str]; 3] {
    match module_type {
        ModuleType::Frontend => [
            &["frontend", "front-end", "ui", "user interface", "components?", "pages?", "views?", "screens?"],
            &["layout", "styling", "styles?", "forms?", "navigation", "client", "ux", "state management"],
            &["react", "vue", "angular", "css", "design system", "accessibility", "browser"],
        ],
        ModuleType::Mobile => [
            &["mobile", "ios", "android", "react native"],
            &["apps?", "devices?", "offline", "push notifications?"],
            &["flutter", "swift", "kotlin", "tablets?", "app store"],
        ],
        ModuleType::ServerApi => [
            &["apis?", "endpoints?", "rest", "graphql"],
            &["routes?", "requests?", "responses?", "http", "contracts?", "integrations?"],
            &["webhooks?", "payloads?", "status codes", "rate limiting", "versioning"],
        ],
        ModuleType::ServerDatabase => [
            &["database", "db", "schemas?", "data models?", "tables?", "persistence"],
            &["data", "storage", "migrations?", "indexes", "models?", "entities", "repository"],
            &["sql", "postgres(?:ql)?", "mysql", "mongodb", "redis", "caching", "queries"],
        ],
        ModuleType::Testing => [
            &["testing", "tests?", "test plan", "qa"],
            &["coverage", "verification", "quality", "scenarios?"],
            &["e2e", "end-to-end", "acceptance", "fixtures?", "mocks?", "benchmarks?"],
        ],
        ModuleType::ServerLogic => [
            &["business logic", "logic", "services?", "backend", "server"],
            &["workflows?", "processing", "rules", "jobs?", "architecture", "security", "error handling"],
            &["validation", "notifications?", "scheduling", "algorithms?", "authorization"],
        ],
        ModuleType::Custom(_) => [&[], &[], &[]],
    }
}

/// Bucket order; the first match wins and the last entry is the catch-all.
const BUCKET_ORDER: [ModuleType; 6] = [
    ModuleType::Frontend,
    ModuleType::Mobile,
    ModuleType::ServerApi,
    ModuleType::ServerDatabase,
    ModuleType::Testing,
    ModuleType::ServerLogic,
];

#[derive(Debug, Clone)]
struct Bucket {
    module_type: ModuleType,
    strong: Option<Regex>,
    weak: Option<Regex>,
    other: Option<Regex>,
}

fn word_alternation(words: &[&str]) -> Option<Regex> {
    if words.is_empty() {
        return None;
    }
    // Entries are fixed regex fragments (`pages?`), not user input.
    Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|"))).ok()
}

/// Title classifier over ordered keyword buckets.
#[derive(Debug, Clone)]
pub struct SectionClassifier {
    buckets: Vec<Bucket>,
}

impl Default for SectionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionClassifier {
    /// Classifier over the built-in buckets.
    pub fn new() -> Self {
        let buckets = BUCKET_ORDER
            .iter()
            .map(|t| {
                let [strong, weak, other] = bucket_keywords(t);
                Bucket {
                    module_type: t.clone(),
                    strong: word_alternation(strong),
                    weak: word_alternation(weak),
                    other: word_alternation(other),
                }
            })
            .collect();
        Self { buckets }
    }

    /// Module type and confidence for a section title.
    ///
    /// Only the title is classified; a title without any bucket keyword
    /// falls back to server logic.
    pub fn classify(&self, title: &str) -> (ModuleType, f32) {
        let tiers: [(f32, fn(&Bucket) -> Option<&Regex>); 3] = [
            (STRONG_CONFIDENCE, |b| b.strong.as_ref()),
            (WEAK_CONFIDENCE, |b| b.weak.as_ref()),
            (KEYWORD_CONFIDENCE, |b| b.other.as_ref()),
        ];
        for (confidence, tier) in tiers {
            for bucket in &self.buckets {
                if tier(bucket).is_some_and(|r| r.is_match(title)) {
                    return (bucket.module_type.clone(), confidence);
                }
            }
        }
        (FALLBACK_MODULE, FALLBACK_CONFIDENCE)
    }
}

struct OpenSection {
    title: String,
    level: usize,
    start_line: usize,
}

/// Parse a legacy design document into classified sections.
///
/// Text before the first level 2-3 heading belongs to no section. Headings
/// inside fenced code blocks are ignored. A document without any level 2-3
/// heading is rejected.
pub fn analyze_legacy_design(text: &str, classifier: &SectionClassifier) -> Result<ContentAnalysis> {
    let heading = Regex::new(r"^(#{2,3})\s+(.+?)(?:\s+#+)?\s*$")
        .map_err(|e| ModuleError::Validation(e.to_string()))?;
    let lines: Vec<&str> = text.lines().collect();

    let mut analysis = ContentAnalysis::default();
    let mut taken: BTreeSet<String> = BTreeSet::new();
    let mut open: Option<OpenSection> = None;
    let mut in_fence = false;

    let mut close = |open: OpenSection, end_line: usize, analysis: &mut ContentAnalysis| {
        let body = lines[open.start_line + 1..=end_line].join("\n").trim().to_string();
        let mut title = open.title.clone();
        let mut n = 2;
        while taken.contains(&title) {
            title = format!("{} ({})", open.title, n);
            n += 1;
        }
        taken.insert(title.clone());
        let (module_type, confidence) = classifier.classify(&open.title);
        debug!("Section '{}' -> {} ({:.1})", title, module_type, confidence);

        analysis
            .suggested_module_mapping
            .entry(module_type.clone())
            .or_default()
            .push(title.clone());
        analysis.sections.push(Section {
            title,
            level: open.level,
            content: body,
            start_line: open.start_line,
            end_line,
            suggested_module: module_type,
            confidence,
        });
    };

    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(caps) = heading.captures(line) {
            if let Some(prev) = open.take() {
                close(prev, i - 1, &mut analysis);
            }
            open = Some(OpenSection {
                title: caps[2].to_string(),
                level: caps[1].len(),
                start_line: i,
            });
        }
    }

    match open {
        Some(last) => close(last, lines.len() - 1, &mut analysis),
        None => {
            return Err(ModuleError::Validation(format!(
                "{} has no level 2 or 3 sections",
                LEGACY_DESIGN_FILE
            )))
        }
    }

    Ok(analysis)
}

/// Render the module document for every section mapped to `module_type`.
pub fn render_module(label: &str, module_type: &ModuleType, analysis: &ContentAnalysis) -> String {
    let mut out = format!(
        "# {} Design\n\n> Migrated from {}. Review before approving.\n",
        label, LEGACY_DESIGN_FILE
    );
    for section in analysis.sections_for(module_type) {
        out.push('\n');
        out.push_str(&section.heading());
        out.push('\n');
        if !section.content.is_empty() {
            out.push('\n');
            out.push_str(&section.content);
            out.push('\n');
        }
    }
    out
}

/// Migrates legacy design documents into module documents.
pub struct LegacyMigrator<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    layout: FeatureLayout,
    catalog: ModuleCatalog,
    classifier: SectionClassifier,
}

impl<S: DocumentStore + ?Sized> LegacyMigrator<S> {
    /// Create a migrator writing through `store`.
    pub fn new(store: Arc<S>, layout: FeatureLayout, catalog: ModuleCatalog) -> Self {
        Self {
            store,
            layout,
            catalog,
            classifier: SectionClassifier::new(),
        }
    }

    /// Parse and classify a legacy document.
    pub fn analyze(&self, legacy_text: &str) -> Result<ContentAnalysis> {
        analyze_legacy_design(legacy_text, &self.classifier)
    }

    /// Write one module document per mapped module type.
    ///
    /// Write failures are collected per module; the remaining modules are
    /// still written. The legacy document is not touched.
    pub async fn migrate_to_modules(
        &self,
        feature: &str,
        analysis: &ContentAnalysis,
    ) -> Result<MigrationResult> {
        let dir = self.layout.feature_dir(feature)?;
        self.store.create_directory(&dir).await?;

        let mut result = MigrationResult::default();
        for (module_type, titles) in &analysis.suggested_module_mapping {
            if titles.is_empty() {
                continue;
            }
            let label = self.catalog.label(module_type);
            let content = render_module(&label, module_type, analysis);
            let path = self.layout.module(feature, &self.catalog, module_type)?;

            match self.store.write_file(&path, &content).await {
                Ok(()) => {
                    debug!("Migrated {} sections into {}", titles.len(), path.display());
                    result.migrated_modules.push(module_type.clone());
                }
                Err(e) => {
                    warn!("Failed to write migrated module {}: {}", module_type, e);
                    result.failed_modules.push(FailedModule {
                        module_type: module_type.clone(),
                        error: ModuleError::from(e).to_string(),
                    });
                }
            }
        }

        result.success = result.failed_modules.is_empty();
        info!(
            "Migrated {} for {}: {} modules written, {} failed",
            LEGACY_DESIGN_FILE,
            feature,
            result.migrated_modules.len(),
            result.failed_modules.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modspec_storage::InMemoryDocumentStore;
    use std::path::PathBuf;

    const LEGACY: &str = "# Login Design

Intro paragraph that belongs to no section.

## Frontend Components

Login form with email and password.

## API Endpoints

POST /api/login returns a session token.

## Database Schema

Table users with email and password_hash.
";

    fn analyze(text: &str) -> ContentAnalysis {
        analyze_legacy_design(text, &SectionClassifier::new()).unwrap()
    }

    #[test]
    fn test_mapping_scenario() {
        let analysis = analyze(LEGACY);
        let expect = [
            ("Frontend Components", ModuleType::Frontend),
            ("API Endpoints", ModuleType::ServerApi),
            ("Database Schema", ModuleType::ServerDatabase),
        ];
        for (title, module_type) in expect {
            let section = analysis.section(title).unwrap();
            assert_eq!(section.suggested_module, module_type);
            assert!(section.confidence >= 0.7, "{title}: {}", section.confidence);
        }
        assert_eq!(analysis.suggested_module_mapping.len(), 3);
    }

    #[test]
    fn test_line_coverage_equals_heading_span() {
        let analysis = analyze(LEGACY);
        let total_lines = LEGACY.lines().count();
        let first_heading = analysis.sections[0].start_line;

        let covered: usize = analysis.sections.iter().map(Section::line_count).sum();
        assert_eq!(covered, total_lines - first_heading);

        for pair in analysis.sections.windows(2) {
            assert_eq!(pair[0].end_line + 1, pair[1].start_line);
        }
    }

    #[test]
    fn test_rendered_modules_preserve_body_text() {
        let analysis = analyze(LEGACY);
        let rendered: String = analysis
            .suggested_module_mapping
            .keys()
            .map(|t| render_module(t.as_str(), t, &analysis))
            .collect();

        let first_heading = analysis.sections[0].start_line;
        for line in LEGACY.lines().skip(first_heading) {
            let line = line.trim();
            if line.is_empty() || line.starts_with("##") {
                continue;
            }
            assert!(rendered.contains(line), "lost line: {line}");
        }
        assert!(rendered.contains("## API Endpoints"));
        assert!(!rendered.contains("Intro paragraph"));
    }

    #[test]
    fn test_confidence_levels() {
        let classifier = SectionClassifier::new();
        assert_eq!(classifier.classify("Frontend"), (ModuleType::Frontend, STRONG_CONFIDENCE));
        assert_eq!(classifier.classify("Navigation"), (ModuleType::Frontend, WEAK_CONFIDENCE));
        assert_eq!(
            classifier.classify("Redis Caching"),
            (ModuleType::ServerDatabase, KEYWORD_CONFIDENCE)
        );
        assert_eq!(classifier.classify("Overview"), (ModuleType::ServerLogic, FALLBACK_CONFIDENCE));
        // `ui` must not match inside `build`
        assert_eq!(classifier.classify("Build Notes").0, ModuleType::ServerLogic);
    }

    #[test]
    fn test_body_does_not_drive_classification() {
        let analysis = analyze("## Overview\nThe client loads data from the server.\n");
        let section = analysis.section("Overview").unwrap();
        assert_eq!(section.suggested_module, ModuleType::ServerLogic);
        assert_eq!(section.confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_suffixed_titles_never_collide() {
        let text = "## Notes\nalpha\n## Notes (2)\nbeta\n## Notes\ngamma\n";
        let analysis = analyze(text);
        let titles: Vec<_> = analysis.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Notes", "Notes (2)", "Notes (3)"]);

        let rendered = render_module("Server Logic", &ModuleType::ServerLogic, &analysis);
        for body in ["alpha", "beta", "gamma"] {
            assert_eq!(rendered.matches(body).count(), 1, "{body}");
        }
    }

    #[test]
    fn test_duplicate_titles_and_fences() {
        let text = "## Notes\none\n```\n## not a heading\n```\n## Notes\ntwo\n### Test Plan\nthree";
        let analysis = analyze(text);
        let titles: Vec<_> = analysis.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Notes", "Notes (2)", "Test Plan"]);
        assert!(analysis.sections[0].content.contains("## not a heading"));
        assert_eq!(analysis.sections[2].level, 3);
        assert_eq!(analysis.sections[2].suggested_module, ModuleType::Testing);
    }

    #[test]
    fn test_document_without_sections_is_rejected() {
        let err = analyze_legacy_design("# Title\n\nJust prose.", &SectionClassifier::new());
        assert!(matches!(err, Err(ModuleError::Validation(_))));
    }

    #[tokio::test]
    async fn test_partial_write_failure_is_collected() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .fail_writes_to(PathBuf::from("/specs/login/design-server-api.md"))
            .await;
        let migrator = LegacyMigrator::new(
            store.clone(),
            FeatureLayout::new("/specs"),
            ModuleCatalog::new(),
        );

        let analysis = migrator.analyze(LEGACY).unwrap();
        let result = migrator.migrate_to_modules("login", &analysis).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.migrated_modules.len(), 2);
        assert_eq!(result.failed_modules.len(), 1);
        assert_eq!(result.failed_modules[0].module_type, ModuleType::ServerApi);

        let frontend = store
            .read_file(&PathBuf::from("/specs/login/design-frontend.md"))
            .await
            .unwrap();
        assert!(frontend.starts_with("# Frontend Design"));
        assert!(frontend.contains("## Frontend Components"));
    }
}
