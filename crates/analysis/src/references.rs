//! Cross-reference analyzer.
//!
//! Extracts typed references from module text line by line, groups them into
//! a reference graph and checks each one against the definitions found in the
//! module expected to own it.

use modspec_core::{
    CrossLink, Inconsistency, InconsistencySeverity, ModuleCatalog, ModuleType, Reference,
    ReferenceAnalysis, ReferenceMap, ReferenceType, SourceLocation,
};
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Module texts keyed by type.
pub type ModuleTexts = BTreeMap<ModuleType, String>;

/// A named extraction pattern.
#[derive(Debug, Clone)]
struct ReferencePattern {
    reference_type: ReferenceType,
    target: ModuleType,
    regex: Option<Regex>,
}

impl ReferencePattern {
    fn new(name: &'static str, reference_type: ReferenceType, target: ModuleType, pattern: &str) -> Self {
        let regex = match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Reference pattern {} disabled: {}", name, e);
                None
            }
        };
        Self {
            reference_type,
            target,
            regex,
        }
    }
}

fn pattern_library() -> Vec<ReferencePattern> {
    use ReferenceType::*;
    vec![
        ReferencePattern::new(
            "http-verb-path",
            ApiCall,
            ModuleType::ServerApi,
            r"\b(?:GET|POST|PUT|PATCH|DELETE)\s+/[A-Za-z0-9_\-/{}:.]*",
        ),
        ReferencePattern::new(
            "jsx-usage",
            Component,
            ModuleType::Frontend,
            r"<([A-Z][A-Za-z0-9]+)[\s/>]",
        ),
        ReferencePattern::new(
            "component-import",
            Component,
            ModuleType::Frontend,
            r"\bimport\s+\{?\s*([A-Z][A-Za-z0-9]+)",
        ),
        ReferencePattern::new(
            "labelled-model",
            DataModel,
            ModuleType::ServerDatabase,
            r"\b(?i:model|entity|table|schema)\s*:\s*`?([A-Za-z_][A-Za-z0-9_]*)",
        ),
        ReferencePattern::new(
            "labelled-service",
            Service,
            ModuleType::ServerLogic,
            r"\b(?i:service)\s*:\s*`?([A-Za-z_][A-Za-z0-9_]*)",
        ),
        ReferencePattern::new(
            "service-name",
            Service,
            ModuleType::ServerLogic,
            r"\b([A-Z][A-Za-z0-9]*Service)\b",
        ),
        ReferencePattern::new(
            "labelled-test-target",
            TestTarget,
            ModuleType::Testing,
            r"\b(?i:tests?|covers)\s*:\s*`?([A-Za-z_][A-Za-z0-9_/]*)",
        ),
    ]
}

/// Navigation neighbours of a module type.
pub fn related_modules(module_type: &ModuleType) -> Vec<ModuleType> {
    use ModuleType::*;
    match module_type {
        Frontend => vec![ServerApi, Testing],
        Mobile => vec![ServerApi, Testing],
        ServerApi => vec![Frontend, Mobile, ServerLogic, ServerDatabase, Testing],
        ServerLogic => vec![ServerApi, ServerDatabase, Testing],
        ServerDatabase => vec![ServerApi, ServerLogic, Testing],
        Testing => vec![Frontend, Mobile, ServerApi, ServerLogic, ServerDatabase],
        Custom(_) => vec![Testing],
    }
}

fn severity(reference_type: ReferenceType) -> InconsistencySeverity {
    match reference_type {
        ReferenceType::ApiCall => InconsistencySeverity::Error,
        ReferenceType::DataModel
        | ReferenceType::Component
        | ReferenceType::Service
        | ReferenceType::TestTarget => InconsistencySeverity::Warning,
    }
}

/// `GET /users/:id/` and `get /users/{userId}` both become `GET /users/{}`.
fn normalize_endpoint(text: &str) -> String {
    let mut parts = text.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_uppercase();
    let path = parts.next().unwrap_or_default();
    let path = path.trim_end_matches(['.', ',', ';', ')']).trim_end_matches('/');
    let segments: Vec<&str> = path
        .split('/')
        .map(|seg| {
            if seg.starts_with(':') || (seg.starts_with('{') && seg.ends_with('}')) {
                "{}"
            } else {
                seg
            }
        })
        .collect();
    let path = segments.join("/");
    format!("{} {}", verb, if path.is_empty() { "/" } else { &path })
}

fn endpoint_path(normalized: &str) -> &str {
    normalized.split_once(' ').map(|(_, p)| p).unwrap_or(normalized)
}

fn is_blank(text: Option<&String>) -> bool {
    text.map_or(true, |t| t.trim().is_empty())
}

/// Extracts references and detects cross-module inconsistencies.
#[derive(Debug, Clone)]
pub struct CrossReferenceAnalyzer {
    patterns: Vec<ReferencePattern>,
    catalog: ModuleCatalog,
}

impl Default for CrossReferenceAnalyzer {
    fn default() -> Self {
        Self::new(ModuleCatalog::new())
    }
}

impl CrossReferenceAnalyzer {
    /// Create an analyzer; the catalog names module files.
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self {
            patterns: pattern_library(),
            catalog,
        }
    }

    /// References found in one module's text.
    pub fn extract(&self, source: &ModuleType, text: &str) -> Vec<Reference> {
        let file_name = self.catalog.file_name(source);
        let mut found = Vec::new();
        let mut seen = BTreeSet::new();

        for (line_no, line) in text.lines().enumerate() {
            for pattern in &self.patterns {
                let Some(regex) = &pattern.regex else { continue };
                // Endpoints and models are defined, not referenced, in their own module.
                if pattern.target == *source
                    && matches!(
                        pattern.reference_type,
                        ReferenceType::ApiCall | ReferenceType::DataModel
                    )
                {
                    continue;
                }

                for caps in regex.captures_iter(line) {
                    let Some(whole) = caps.get(0) else { continue };
                    let matched = caps.get(1).unwrap_or(whole);
                    let reference_text = match pattern.reference_type {
                        ReferenceType::ApiCall => normalize_endpoint(whole.as_str()),
                        _ => matched.as_str().to_string(),
                    };
                    if !seen.insert((line_no, pattern.reference_type, reference_text.clone())) {
                        continue;
                    }
                    found.push(Reference {
                        source_location: SourceLocation {
                            line: line_no,
                            column: line[..whole.start()].chars().count(),
                            file_name: file_name.clone(),
                        },
                        target_module: pattern.target.clone(),
                        reference_text,
                        reference_type: pattern.reference_type,
                    });
                }
            }
        }

        debug!("Extracted {} references from {}", found.len(), file_name);
        found
    }

    /// Reference graph over every module.
    pub fn analyze_references(&self, modules: &ModuleTexts) -> ReferenceMap {
        let mut map = ReferenceMap::new();
        for (source, text) in modules {
            let mut by_target: BTreeMap<ModuleType, Vec<Reference>> = BTreeMap::new();
            for reference in self.extract(source, text) {
                by_target
                    .entry(reference.target_module.clone())
                    .or_default()
                    .push(reference);
            }
            if !by_target.is_empty() {
                map.insert(source.clone(), by_target);
            }
        }
        map
    }

    /// Unresolved or mismatched references.
    pub fn detect_inconsistencies(&self, modules: &ModuleTexts) -> Vec<Inconsistency> {
        self.inconsistencies_in(modules, &self.analyze_references(modules))
    }

    /// References and inconsistencies in one pass.
    pub fn analyze(&self, modules: &ModuleTexts) -> ReferenceAnalysis {
        let references = self.analyze_references(modules);
        let inconsistencies = self.inconsistencies_in(modules, &references);
        ReferenceAnalysis {
            references,
            inconsistencies,
        }
    }

    /// Navigation suggestions for a module.
    pub fn generate_cross_links(&self, module_type: &ModuleType, modules: &ModuleTexts) -> Vec<CrossLink> {
        related_modules(module_type)
            .into_iter()
            .map(|target| CrossLink {
                label: format!("{} Design", self.catalog.label(&target)),
                exists: !is_blank(modules.get(&target)),
                target,
            })
            .collect()
    }

    fn inconsistencies_in(&self, modules: &ModuleTexts, references: &ReferenceMap) -> Vec<Inconsistency> {
        let endpoints = Definitions::endpoints(modules.get(&ModuleType::ServerApi));
        let mut reported = BTreeSet::new();
        let mut out = Vec::new();

        for (source, by_target) in references {
            for (target, refs) in by_target {
                for reference in refs {
                    if reference.reference_type == ReferenceType::TestTarget {
                        continue;
                    }
                    let key = (source.clone(), target.clone(), reference.reference_text.clone());
                    if reported.contains(&key) {
                        continue;
                    }

                    let target_text = modules.get(target);
                    let finding = if is_blank(target_text) {
                        Some(self.missing_module(source, target, reference))
                    } else {
                        let text = target_text.map(String::as_str).unwrap_or_default();
                        self.check_definition(source, target, reference, text, &endpoints)
                    };

                    if let Some(finding) = finding {
                        reported.insert(key);
                        out.push(finding);
                    }
                }
            }
        }

        debug!("Found {} inconsistencies", out.len());
        out
    }

    fn missing_module(&self, source: &ModuleType, target: &ModuleType, reference: &Reference) -> Inconsistency {
        Inconsistency {
            module1: source.clone(),
            module2: target.clone(),
            description: format!(
                "{} references {} `{}` (line {}) but the {} module does not exist",
                self.catalog.label(source),
                reference.reference_type,
                reference.reference_text,
                reference.source_location.line + 1,
                self.catalog.label(target)
            ),
            severity: severity(reference.reference_type),
            suggestion: Some(format!("Generate the {} module", self.catalog.label(target))),
        }
    }

    fn check_definition(
        &self,
        source: &ModuleType,
        target: &ModuleType,
        reference: &Reference,
        target_text: &str,
        endpoints: &Definitions,
    ) -> Option<Inconsistency> {
        let target_label = self.catalog.label(target);
        let unresolved = |description: String, suggestion: String| Inconsistency {
            module1: source.clone(),
            module2: target.clone(),
            description,
            severity: severity(reference.reference_type),
            suggestion: Some(suggestion),
        };

        match reference.reference_type {
            ReferenceType::ApiCall => {
                if endpoints.contains(&reference.reference_text) {
                    return None;
                }
                let path = endpoint_path(&reference.reference_text);
                let other_verbs: Vec<_> = endpoints
                    .items
                    .iter()
                    .filter(|e| endpoint_path(e) == path)
                    .map(|e| e.split_whitespace().next().unwrap_or_default().to_string())
                    .collect();
                if other_verbs.is_empty() {
                    Some(unresolved(
                        format!(
                            "Endpoint `{}` used by {} is not defined in {}",
                            reference.reference_text,
                            self.catalog.label(source),
                            target_label
                        ),
                        format!("Define `{}` in the {} module", reference.reference_text, target_label),
                    ))
                } else {
                    Some(unresolved(
                        format!(
                            "Endpoint `{}` used by {} is defined in {} only as {}",
                            reference.reference_text,
                            self.catalog.label(source),
                            target_label,
                            other_verbs.join(", ")
                        ),
                        "Align the HTTP method with the API definition".to_string(),
                    ))
                }
            }
            ReferenceType::DataModel | ReferenceType::Service | ReferenceType::Component => {
                if is_defined(&reference.reference_text, reference.reference_type, target_text) {
                    return None;
                }
                Some(unresolved(
                    format!(
                        "{} `{}` used by {} is not defined in {}",
                        reference.reference_type,
                        reference.reference_text,
                        self.catalog.label(source),
                        target_label
                    ),
                    format!("Describe `{}` in the {} module", reference.reference_text, target_label),
                ))
            }
            ReferenceType::TestTarget => None,
        }
    }
}

/// Normalized endpoints defined in the API module.
#[derive(Debug, Default)]
struct Definitions {
    items: BTreeSet<String>,
}

impl Definitions {
    fn endpoints(api_text: Option<&String>) -> Self {
        let mut items = BTreeSet::new();
        let Some(text) = api_text else {
            return Self { items };
        };
        if let Ok(re) = Regex::new(r"(?i)\b(?:GET|POST|PUT|PATCH|DELETE)\s+/[A-Za-z0-9_\-/{}:.]*") {
            for m in re.find_iter(text) {
                items.insert(normalize_endpoint(m.as_str()));
            }
        }
        Self { items }
    }

    fn contains(&self, endpoint: &str) -> bool {
        self.items.contains(endpoint)
    }
}

/// Whether `name` is defined by a heading or a declaration in `text`.
fn is_defined(name: &str, reference_type: ReferenceType, text: &str) -> bool {
    let name = regex::escape(name);
    let declaration = match reference_type {
        ReferenceType::DataModel => {
            r"(?:class|interface|type|struct|enum|model|entity|table|schema|create\s+table)"
        }
        ReferenceType::Service => r"(?:class|interface|struct|trait|service)",
        _ => r"(?:class|function|const|component|export\s+default|export\s+function)",
    };
    let patterns = [
        format!(r"^\s*#+\s+.*\b{}\b", name),
        format!(r"\b{}\s*:?\s*[`'\x22]?{}\b", declaration, name),
    ];
    patterns.iter().any(|p| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(entries: &[(ModuleType, &str)]) -> ModuleTexts {
        entries.iter().map(|(t, s)| (t.clone(), s.to_string())).collect()
    }

    #[test]
    fn test_extracts_typed_references_with_location() {
        let analyzer = CrossReferenceAnalyzer::default();
        let refs = analyzer.extract(
            &ModuleType::Frontend,
            "# Frontend\n\nThe form calls POST /api/login.\nRenders <LoginForm /> via AuthService",
        );

        let api = refs.iter().find(|r| r.reference_type == ReferenceType::ApiCall).unwrap();
        assert_eq!(api.reference_text, "POST /api/login");
        assert_eq!(api.target_module, ModuleType::ServerApi);
        assert_eq!(api.source_location.line, 2);
        assert_eq!(api.source_location.column, 15);
        assert_eq!(api.source_location.file_name, "design-frontend.md");

        assert!(refs
            .iter()
            .any(|r| r.reference_type == ReferenceType::Component && r.reference_text == "LoginForm"));
        assert!(refs
            .iter()
            .any(|r| r.reference_type == ReferenceType::Service && r.reference_text == "AuthService"));
    }

    #[test]
    fn test_definitions_are_not_references_in_their_own_module() {
        let analyzer = CrossReferenceAnalyzer::default();
        let refs = analyzer.extract(&ModuleType::ServerApi, "### POST /api/login\nTable: users");
        assert!(refs.iter().all(|r| r.reference_type != ReferenceType::ApiCall));
        assert!(refs.iter().any(|r| r.reference_type == ReferenceType::DataModel));
    }

    #[test]
    fn test_reference_map_shape() {
        let analyzer = CrossReferenceAnalyzer::default();
        let map = analyzer.analyze_references(&texts(&[
            (ModuleType::Frontend, "GET /api/users\nGET /api/users/:id"),
            (ModuleType::ServerApi, "model: User"),
        ]));
        assert_eq!(map[&ModuleType::Frontend][&ModuleType::ServerApi].len(), 2);
        assert_eq!(map[&ModuleType::ServerApi][&ModuleType::ServerDatabase].len(), 1);
    }

    #[test]
    fn test_unresolved_api_call_is_error() {
        let analyzer = CrossReferenceAnalyzer::default();
        let found = analyzer.detect_inconsistencies(&texts(&[
            (ModuleType::Frontend, "Loads GET /api/users/:id and POST /api/orders"),
            (ModuleType::ServerApi, "## GET /api/users/{userId}\nReturns a user."),
        ]));

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, InconsistencySeverity::Error);
        assert!(found[0].description.contains("POST /api/orders"));
        assert_eq!(found[0].module1, ModuleType::Frontend);
        assert_eq!(found[0].module2, ModuleType::ServerApi);
    }

    #[test]
    fn test_method_mismatch_is_reported() {
        let analyzer = CrossReferenceAnalyzer::default();
        let found = analyzer.detect_inconsistencies(&texts(&[
            (ModuleType::Mobile, "PUT /api/profile"),
            (ModuleType::ServerApi, "PATCH /api/profile updates the profile"),
        ]));
        assert_eq!(found.len(), 1);
        assert!(found[0].description.contains("only as PATCH"));
    }

    #[test]
    fn test_unresolved_model_and_service_are_warnings() {
        let analyzer = CrossReferenceAnalyzer::default();
        let found = analyzer.detect_inconsistencies(&texts(&[
            (ModuleType::ServerApi, "Entity: Order\nEntity: User\nDelegates to PaymentService"),
            (ModuleType::ServerDatabase, "## User\nCREATE TABLE user (...)"),
            (ModuleType::ServerLogic, "## Checkout\nNothing about payments."),
        ]));

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|i| i.severity == InconsistencySeverity::Warning));
        assert!(found.iter().any(|i| i.description.contains("Order")));
        assert!(found.iter().any(|i| i.description.contains("PaymentService")));
    }

    #[test]
    fn test_missing_target_module_and_duplicates() {
        let analyzer = CrossReferenceAnalyzer::default();
        let found = analyzer.detect_inconsistencies(&texts(&[(
            ModuleType::Frontend,
            "GET /api/items\nAgain: GET /api/items",
        )]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].suggestion.as_deref(), Some("Generate the Server API module"));
    }

    #[test]
    fn test_test_targets_are_recorded_only() {
        let analyzer = CrossReferenceAnalyzer::default();
        let analysis = analyzer.analyze(&texts(&[(ModuleType::Frontend, "covers: LoginFlow")]));
        assert_eq!(
            analysis.references[&ModuleType::Frontend][&ModuleType::Testing][0].reference_text,
            "LoginFlow"
        );
        assert!(analysis.inconsistencies.is_empty());
    }

    #[test]
    fn test_cross_links() {
        let analyzer = CrossReferenceAnalyzer::default();
        let links = analyzer.generate_cross_links(
            &ModuleType::Frontend,
            &texts(&[(ModuleType::ServerApi, "content")]),
        );
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, ModuleType::ServerApi);
        assert_eq!(links[0].label, "Server API Design");
        assert!(links[0].exists);
        assert!(!links[1].exists);
    }

    #[test]
    fn test_every_builtin_has_links() {
        for module_type in ModuleType::BUILTIN {
            let related = related_modules(&module_type);
            assert!(!related.is_empty());
            assert!(!related.contains(&module_type));
        }
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("get /users/:id/"), "GET /users/{}");
        assert_eq!(normalize_endpoint("GET /users/{userId}."), "GET /users/{}");
        assert_eq!(normalize_endpoint("DELETE /"), "DELETE /");
    }
}
