//! Module detector - decides which module types a feature needs.
//!
//! Detection is keyword and pattern based. Short or ambiguous tokens
//! (`api`, `ios`, `ui`) are word-bounded patterns rather than keywords so
//! they do not fire inside unrelated words.

use modspec_core::{DetectionRuleSpec, ModuleCatalog, ModuleError, ModuleType, Result};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Compiled detection rule of one module type.
#[derive(Debug, Clone)]
pub struct DetectionRule {
    keywords: Vec<String>,
    patterns: Vec<Regex>,
    default_applicable: bool,
}

impl DetectionRule {
    /// Compile a rule. Keywords match as case-insensitive substrings,
    /// patterns as case-insensitive regexes.
    pub fn new<K, P>(keywords: K, patterns: P, default_applicable: bool) -> Result<Self>
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            patterns,
            default_applicable,
        })
    }

    /// Compile a serialized rule.
    pub fn from_spec(spec: &DetectionRuleSpec) -> Result<Self> {
        Self::new(&spec.keywords, &spec.patterns, spec.default_applicable)
    }

    /// A rule that never matches and is not applicable by default.
    pub fn never() -> Self {
        Self {
            keywords: Vec::new(),
            patterns: Vec::new(),
            default_applicable: false,
        }
    }

    /// Whether the type is included without evidence.
    pub fn default_applicable(&self) -> bool {
        self.default_applicable
    }

    /// Keywords and patterns that match `text`.
    fn evidence(&self, text: &str, lowered: &str) -> Vec<String> {
        let keywords = self
            .keywords
            .iter()
            .filter(|k| lowered.contains(k.as_str()))
            .cloned();
        let patterns = self
            .patterns
            .iter()
            .filter(|p| p.is_match(text))
            .map(|p| format!("/{}/", p.as_str()));
        keywords.chain(patterns).collect()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ModuleError::Validation(format!("invalid detection pattern '{}': {}", pattern, e)))
}

/// Built-in keywords, patterns and default applicability.
fn builtin_rule(
    module_type: &ModuleType,
) -> Option<(&'static [&'static str], &'static [&'static str], bool)> {
    let rule: (&[&str], &[&str], bool) = match module_type {
        ModuleType::Frontend => (
            &[
                "frontend",
                "front-end",
                "user interface",
                "web page",
                "webpage",
                "browser",
                "react",
                "vue",
                "angular",
                "dashboard",
                "button",
                "stylesheet",
            ],
            &[r"\bui\b", r"\bux\b", r"\bforms?\b", r"\bscreens?\b", r"\bweb app", r"\bcss\b", r"\bhtml\b"],
            false,
        ),
        ModuleType::Mobile => (
            &[
                "mobile",
                "android",
                "iphone",
                "ipad",
                "react native",
                "flutter",
                "push notification",
                "app store",
                "play store",
            ],
            &[r"\bios\b", r"\btablets?\b", r"\bswift\b", r"\bkotlin\b"],
            false,
        ),
        ModuleType::ServerApi => (
            &["endpoint", "graphql", "grpc", "webhook", "openapi", "swagger", "http"],
            &[r"\bapis?\b", r"\brest(ful)?\b", r"\b(get|post|put|patch|delete)\s+/"],
            false,
        ),
        ModuleType::ServerLogic => (
            &[
                "business logic",
                "business rule",
                "service",
                "workflow",
                "background job",
                "queue",
                "scheduler",
                "authentication",
                "authorization",
            ],
            &[r"\bbackend\b", r"\bvalidat(e|ion)\b"],
            true,
        ),
        ModuleType::ServerDatabase => (
            &[
                "database",
                "postgres",
                "mysql",
                "sqlite",
                "mongodb",
                "redis",
                "schema",
                "persistence",
                "storage",
                "repository",
            ],
            &[r"\bsql\b", r"\bdb\b", r"\btables?\b", r"\bdata model", r"\bmigrations?\b"],
            false,
        ),
        ModuleType::Testing => (
            &["test", "coverage", "acceptance criteria"],
            &[r"\bqa\b"],
            true,
        ),
        ModuleType::Custom(_) => return None,
    };
    Some(rule)
}

/// Why a type was or was not detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvidence {
    /// Module type
    pub module_type: ModuleType,
    /// Whether `detect` includes it
    pub included: bool,
    /// Matched keywords and patterns
    pub matched: Vec<String>,
    /// Included without evidence
    pub default_applicable: bool,
    /// Included by policy regardless of rules
    pub always: bool,
}

/// Classifies requirements text into applicable module types.
#[derive(Debug, Clone)]
pub struct ModuleDetector {
    rules: BTreeMap<ModuleType, DetectionRule>,
}

impl Default for ModuleDetector {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModuleDetector {
    /// The type every feature needs, whatever the rules say.
    pub const ALWAYS_APPLICABLE: ModuleType = ModuleType::Testing;

    /// Detector over the built-in types.
    pub fn builtin() -> Self {
        let mut rules = BTreeMap::new();
        for module_type in ModuleType::BUILTIN {
            if let Some((keywords, patterns, default_applicable)) = builtin_rule(&module_type) {
                // Built-in patterns are fixed; an invalid one is dropped, not fatal.
                let patterns = patterns.iter().filter_map(|p| compile(p).ok()).collect();
                rules.insert(
                    module_type,
                    DetectionRule {
                        keywords: keywords.iter().map(|k| k.to_string()).collect(),
                        patterns,
                        default_applicable,
                    },
                );
            }
        }
        Self { rules }
    }

    /// Detector over the built-in types plus the catalog's custom types.
    ///
    /// Custom types without a rule are never detected automatically.
    pub fn with_catalog(catalog: &ModuleCatalog) -> Result<Self> {
        let mut detector = Self::builtin();
        for custom in catalog.custom_types() {
            let rule = match &custom.detection {
                Some(spec) => DetectionRule::from_spec(spec)?,
                None => DetectionRule::never(),
            };
            detector.rules.insert(custom.module_type(), rule);
        }
        Ok(detector)
    }

    /// Replace the rule of a module type.
    pub fn with_rule(mut self, module_type: ModuleType, rule: DetectionRule) -> Self {
        self.rules.insert(module_type, rule);
        self
    }

    /// Module types applicable to `requirements`.
    pub fn detect(&self, requirements: &str) -> BTreeSet<ModuleType> {
        let detected: BTreeSet<_> = self
            .explain(requirements)
            .into_iter()
            .filter(|e| e.included)
            .map(|e| e.module_type)
            .collect();
        debug!("Detected modules: {:?}", detected);
        detected
    }

    /// Per-type evidence behind [`ModuleDetector::detect`].
    pub fn explain(&self, requirements: &str) -> Vec<DetectionEvidence> {
        let lowered = requirements.to_lowercase();
        let mut evidence: Vec<_> = self
            .rules
            .iter()
            .map(|(module_type, rule)| {
                let matched = rule.evidence(requirements, &lowered);
                let always = *module_type == Self::ALWAYS_APPLICABLE;
                DetectionEvidence {
                    module_type: module_type.clone(),
                    included: always || rule.default_applicable || !matched.is_empty(),
                    matched,
                    default_applicable: rule.default_applicable,
                    always,
                }
            })
            .collect();

        if !self.rules.contains_key(&Self::ALWAYS_APPLICABLE) {
            evidence.push(DetectionEvidence {
                module_type: Self::ALWAYS_APPLICABLE,
                included: true,
                matched: Vec::new(),
                default_applicable: false,
                always: true,
            });
        }
        evidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modspec_core::CustomModuleType;

    #[test]
    fn test_every_builtin_has_a_rule() {
        for module_type in ModuleType::BUILTIN {
            let (_, patterns, _) = builtin_rule(&module_type).unwrap();
            for p in patterns {
                assert!(compile(p).is_ok(), "pattern {p} should compile");
            }
        }
    }

    #[test]
    fn test_rest_api_with_postgres() {
        let detector = ModuleDetector::builtin();
        let detected = detector.detect("Implement REST API endpoints with PostgreSQL storage");

        assert!(detected.contains(&ModuleType::ServerApi));
        assert!(detected.contains(&ModuleType::ServerLogic));
        assert!(detected.contains(&ModuleType::ServerDatabase));
        assert!(detected.contains(&ModuleType::Testing));
        assert!(!detected.contains(&ModuleType::Mobile));
        assert!(!detected.contains(&ModuleType::Frontend));
    }

    #[test]
    fn test_empty_text_yields_defaults_only() {
        let detected = ModuleDetector::builtin().detect("");
        let expected: BTreeSet<_> = [ModuleType::ServerLogic, ModuleType::Testing].into();
        assert_eq!(detected, expected);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = ModuleDetector::builtin();
        let text = "A React dashboard and an iOS app backed by a GraphQL API";
        let first = detector.detect(text);
        for _ in 0..5 {
            assert_eq!(detector.detect(text), first);
        }
        assert!(first.contains(&ModuleType::Frontend));
        assert!(first.contains(&ModuleType::Mobile));
    }

    #[test]
    fn test_short_tokens_are_word_bounded() {
        let detected = ModuleDetector::builtin().detect("Build a guide for capital budgets");
        assert!(!detected.contains(&ModuleType::Frontend));
        assert!(!detected.contains(&ModuleType::ServerApi));
    }

    #[test]
    fn test_testing_always_present_even_when_overridden() {
        let detector = ModuleDetector::builtin().with_rule(ModuleType::Testing, DetectionRule::never());
        assert!(detector.detect("nothing relevant").contains(&ModuleType::Testing));
    }

    #[test]
    fn test_custom_types() {
        let catalog = ModuleCatalog::with_custom_types([
            CustomModuleType::new("security", "Security").with_detection(DetectionRuleSpec {
                keywords: vec!["encryption".into()],
                patterns: vec![r"\boauth\b".into()],
                default_applicable: false,
            }),
            CustomModuleType::new("ops", "Operations"),
        ])
        .unwrap();
        let detector = ModuleDetector::with_catalog(&catalog).unwrap();

        let detected = detector.detect("Use OAuth for login");
        assert!(detected.contains(&ModuleType::Custom("security".into())));
        assert!(!detected.contains(&ModuleType::Custom("ops".into())));
    }

    #[test]
    fn test_invalid_custom_pattern_is_rejected() {
        let catalog = ModuleCatalog::with_custom_types([CustomModuleType::new("bad", "Bad")
            .with_detection(DetectionRuleSpec {
                patterns: vec!["(unclosed".into()],
                ..Default::default()
            })])
        .unwrap();
        assert!(matches!(
            ModuleDetector::with_catalog(&catalog),
            Err(ModuleError::Validation(_))
        ));
    }

    #[test]
    fn test_explain_reports_matches() {
        let evidence = ModuleDetector::builtin().explain("Store sessions in Redis");
        let db = evidence
            .iter()
            .find(|e| e.module_type == ModuleType::ServerDatabase)
            .unwrap();
        assert!(db.included);
        assert!(db.matched.contains(&"redis".to_string()));
    }
}
