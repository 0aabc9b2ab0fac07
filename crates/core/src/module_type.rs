//! Module types - the categories a design document is split into.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ModuleError;

/// Default file naming pattern for module documents.
pub const DEFAULT_FILE_PATTERN: &str = "design-{type}.md";

/// A typed design module.
///
/// Built-in variants cover the usual layers of a feature. `Custom` carries the
/// id of a caller-defined type registered in a [`ModuleCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModuleType {
    /// Web frontend (pages, components, state)
    Frontend,
    /// Mobile clients
    Mobile,
    /// Server API surface (endpoints, contracts)
    ServerApi,
    /// Server business logic (services, workflows)
    ServerLogic,
    /// Persistence (schemas, migrations)
    ServerDatabase,
    /// Test plan
    Testing,
    /// Caller-defined module type
    Custom(String),
}

impl ModuleType {
    /// Built-in module types in canonical order.
    pub const BUILTIN: [ModuleType; 6] = [
        ModuleType::Frontend,
        ModuleType::Mobile,
        ModuleType::ServerApi,
        ModuleType::ServerLogic,
        ModuleType::ServerDatabase,
        ModuleType::Testing,
    ];

    /// Wire identifier (`server-api`, `testing`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            ModuleType::Frontend => "frontend",
            ModuleType::Mobile => "mobile",
            ModuleType::ServerApi => "server-api",
            ModuleType::ServerLogic => "server-logic",
            ModuleType::ServerDatabase => "server-database",
            ModuleType::Testing => "testing",
            ModuleType::Custom(id) => id,
        }
    }

    /// Parse a built-in id. Returns `None` for anything else.
    pub fn builtin(id: &str) -> Option<Self> {
        match id {
            "frontend" => Some(ModuleType::Frontend),
            "mobile" => Some(ModuleType::Mobile),
            "server-api" => Some(ModuleType::ServerApi),
            "server-logic" => Some(ModuleType::ServerLogic),
            "server-database" => Some(ModuleType::ServerDatabase),
            "testing" => Some(ModuleType::Testing),
            _ => None,
        }
    }

    /// Whether this is a caller-defined type.
    pub fn is_custom(&self) -> bool {
        matches!(self, ModuleType::Custom(_))
    }

    /// Human readable label for built-in types.
    pub fn builtin_label(&self) -> Option<&'static str> {
        match self {
            ModuleType::Frontend => Some("Frontend"),
            ModuleType::Mobile => Some("Mobile"),
            ModuleType::ServerApi => Some("Server API"),
            ModuleType::ServerLogic => Some("Server Logic"),
            ModuleType::ServerDatabase => Some("Server Database"),
            ModuleType::Testing => Some("Testing"),
            ModuleType::Custom(_) => None,
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ModuleType {
    fn from(s: String) -> Self {
        ModuleType::builtin(&s).unwrap_or(ModuleType::Custom(s))
    }
}

impl From<&str> for ModuleType {
    fn from(s: &str) -> Self {
        ModuleType::from(s.to_string())
    }
}

impl From<ModuleType> for String {
    fn from(t: ModuleType) -> Self {
        t.as_str().to_string()
    }
}

/// Serializable detection rule, compiled by the module detector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRuleSpec {
    /// Case-insensitive substring keywords
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Regex patterns (matched case-insensitively)
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Included even without evidence
    #[serde(default)]
    pub default_applicable: bool,
}

/// A caller-defined module type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomModuleType {
    /// Identifier, used in file names and metadata keys
    pub id: String,

    /// Display label
    pub label: String,

    /// File naming pattern; `{type}` is replaced by the id
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Detection rule (not applicable by default when absent)
    #[serde(default)]
    pub detection: Option<DetectionRuleSpec>,

    /// Prompt template used for generation
    #[serde(default)]
    pub prompt_template: Option<String>,
}

fn default_file_pattern() -> String {
    DEFAULT_FILE_PATTERN.to_string()
}

impl CustomModuleType {
    /// Create a custom type with the default file pattern.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            file_pattern: default_file_pattern(),
            detection: None,
            prompt_template: None,
        }
    }

    /// Set the detection rule.
    pub fn with_detection(mut self, rule: DetectionRuleSpec) -> Self {
        self.detection = Some(rule);
        self
    }

    /// Set the file naming pattern.
    pub fn with_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = pattern.into();
        self
    }

    /// Set the prompt template.
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    /// The module type this definition registers.
    pub fn module_type(&self) -> ModuleType {
        ModuleType::Custom(self.id.clone())
    }

    fn validate(&self) -> Result<(), ModuleError> {
        if self.id.trim().is_empty() {
            return Err(ModuleError::Validation("custom module id is empty".into()));
        }
        if ModuleType::builtin(&self.id).is_some() {
            return Err(ModuleError::Validation(format!(
                "custom module id '{}' collides with a built-in type",
                self.id
            )));
        }
        if self.id.contains(['/', '\\']) || self.id.contains("..") {
            return Err(ModuleError::Validation(format!(
                "custom module id '{}' must be a plain name",
                self.id
            )));
        }
        if self.file_pattern.trim().is_empty() || self.file_pattern.contains(['/', '\\']) {
            return Err(ModuleError::Validation(format!(
                "file pattern '{}' must be a file name",
                self.file_pattern
            )));
        }
        Ok(())
    }
}

/// Every module type known to an orchestrator: built-ins plus custom types.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    custom: BTreeMap<String, CustomModuleType>,
}

impl ModuleCatalog {
    /// Catalog with only the built-in types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with custom types registered.
    pub fn with_custom_types(
        types: impl IntoIterator<Item = CustomModuleType>,
    ) -> Result<Self, ModuleError> {
        let mut catalog = Self::new();
        for t in types {
            catalog.register(t)?;
        }
        Ok(catalog)
    }

    /// Register a custom module type.
    pub fn register(&mut self, custom: CustomModuleType) -> Result<(), ModuleError> {
        custom.validate()?;
        if self.custom.contains_key(&custom.id) {
            return Err(ModuleError::Validation(format!(
                "custom module '{}' registered twice",
                custom.id
            )));
        }
        self.custom.insert(custom.id.clone(), custom);
        Ok(())
    }

    /// All known types: built-ins first, then custom types by id.
    pub fn all_types(&self) -> Vec<ModuleType> {
        ModuleType::BUILTIN
            .iter()
            .cloned()
            .chain(self.custom.keys().map(|id| ModuleType::Custom(id.clone())))
            .collect()
    }

    /// Custom type definitions.
    pub fn custom_types(&self) -> impl Iterator<Item = &CustomModuleType> {
        self.custom.values()
    }

    /// Look up a custom definition.
    pub fn custom(&self, module_type: &ModuleType) -> Option<&CustomModuleType> {
        match module_type {
            ModuleType::Custom(id) => self.custom.get(id),
            _ => None,
        }
    }

    /// Whether the type is built-in or registered.
    pub fn contains(&self, module_type: &ModuleType) -> bool {
        match module_type {
            ModuleType::Custom(id) => self.custom.contains_key(id),
            _ => true,
        }
    }

    /// Parse an id into a known module type.
    pub fn parse(&self, id: &str) -> Result<ModuleType, ModuleError> {
        let module_type = ModuleType::from(id.trim());
        if self.contains(&module_type) {
            Ok(module_type)
        } else {
            Err(ModuleError::Validation(format!("unknown module type '{}'", id)))
        }
    }

    /// Document file name for a module type.
    pub fn file_name(&self, module_type: &ModuleType) -> String {
        let pattern = self
            .custom(module_type)
            .map(|c| c.file_pattern.as_str())
            .unwrap_or(DEFAULT_FILE_PATTERN);
        pattern.replace("{type}", module_type.as_str())
    }

    /// Display label for a module type.
    pub fn label(&self, module_type: &ModuleType) -> String {
        if let Some(label) = module_type.builtin_label() {
            return label.to_string();
        }
        self.custom(module_type)
            .map(|c| c.label.clone())
            .unwrap_or_else(|| module_type.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_round_trip() {
        for t in ModuleType::BUILTIN {
            assert_eq!(ModuleType::from(t.as_str()), t);
            assert!(t.builtin_label().is_some());
        }
    }

    #[test]
    fn test_unknown_id_is_custom() {
        assert_eq!(
            ModuleType::from("security"),
            ModuleType::Custom("security".to_string())
        );
    }

    #[test]
    fn test_serializes_as_plain_id() {
        let json = serde_json::to_string(&ModuleType::ServerApi).unwrap();
        assert_eq!(json, "\"server-api\"");
        let back: ModuleType = serde_json::from_str("\"server-database\"").unwrap();
        assert_eq!(back, ModuleType::ServerDatabase);
    }

    #[test]
    fn test_catalog_file_names() {
        let catalog = ModuleCatalog::with_custom_types([
            CustomModuleType::new("security", "Security").with_file_pattern("{type}-design.md"),
        ])
        .unwrap();

        assert_eq!(catalog.file_name(&ModuleType::Frontend), "design-frontend.md");
        assert_eq!(
            catalog.file_name(&ModuleType::Custom("security".into())),
            "security-design.md"
        );
        assert_eq!(catalog.all_types().len(), 7);
        assert_eq!(catalog.label(&ModuleType::Custom("security".into())), "Security");
    }

    #[test]
    fn test_catalog_rejects_builtin_collision() {
        let err = ModuleCatalog::with_custom_types([CustomModuleType::new("testing", "Tests")]);
        assert!(matches!(err, Err(ModuleError::Validation(_))));
    }

    #[test]
    fn test_catalog_parse_unknown() {
        let catalog = ModuleCatalog::new();
        assert_eq!(catalog.parse("mobile").unwrap(), ModuleType::Mobile);
        assert!(catalog.parse("security").is_err());
    }
}
