//! Prompt templates.
//!
//! Templates use four placeholders: `{feature}`, `{module}`,
//! `{requirements}` and `{context}`. Substitution is single pass, so
//! placeholder-like text inside the requirements is left alone.

use modspec_analysis::{related_modules, ModuleTexts};
use modspec_core::{ModuleCatalog, ModuleType};
use regex::{Captures, Regex};

/// Characters of each sibling module included as context.
pub const DEFAULT_CONTEXT_BUDGET: usize = 4_000;

const BASE_TEMPLATE: &str = "You are writing the {module} design module for the feature \"{feature}\".

{focus}

## Requirements

{requirements}
{context}
Respond with markdown only. Start with the heading `# {module} Design` and use level 2 and 3 headings for sections.
";

/// What the module must cover.
fn focus(module_type: &ModuleType) -> &'static str {
    match module_type {
        ModuleType::Frontend => {
            "Cover pages and views, the component hierarchy, client state, form validation \
             and every API endpoint the UI calls, written as `METHOD /path`."
        }
        ModuleType::Mobile => {
            "Cover screens and navigation, offline behavior, push notifications, platform \
             differences between iOS and Android and every API endpoint the app calls, \
             written as `METHOD /path`."
        }
        ModuleType::ServerApi => {
            "Define every endpoint as a heading `METHOD /path` with request and response \
             bodies, status codes, authentication and the services (`service: Name`) and \
             models (`model: Name`) each endpoint relies on."
        }
        ModuleType::ServerLogic => {
            "Describe the services as `XxxService` with their responsibilities, business \
             rules, workflows, validation, error handling and the models (`model: Name`) \
             they read and write."
        }
        ModuleType::ServerDatabase => {
            "Define every table or entity under its own heading with columns, types, keys, \
             indexes, relationships and migrations."
        }
        ModuleType::Testing => {
            "Write the test plan: unit, integration and end-to-end scenarios, with each \
             scenario naming its subject as `covers: Name`, plus test data and acceptance \
             criteria."
        }
        ModuleType::Custom(_) => {
            "Cover every aspect of the feature that belongs to this module, with one section \
             per concern."
        }
    }
}

/// Builds module prompts from templates.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    catalog: ModuleCatalog,
    context_budget: usize,
    placeholder: Option<Regex>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(ModuleCatalog::new())
    }
}

impl PromptBuilder {
    /// Create a builder; custom types take their template from the catalog.
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self {
            catalog,
            context_budget: DEFAULT_CONTEXT_BUDGET,
            placeholder: Regex::new(r"\{(feature|module|requirements|context)\}").ok(),
        }
    }

    /// Set the per-sibling context budget in characters.
    pub fn with_context_budget(mut self, chars: usize) -> Self {
        self.context_budget = chars;
        self
    }

    /// Template of a module type, placeholders unfilled.
    pub fn template(&self, module_type: &ModuleType) -> String {
        if let Some(custom) = self
            .catalog
            .custom(module_type)
            .and_then(|c| c.prompt_template.as_ref())
        {
            return custom.clone();
        }
        BASE_TEMPLATE.replace("{focus}", focus(module_type))
    }

    /// Sibling context block for `module_type`, empty when no related module
    /// has content.
    pub fn context(&self, module_type: &ModuleType, siblings: &ModuleTexts) -> String {
        let mut blocks = String::new();
        for related in related_modules(module_type) {
            let Some(text) = siblings.get(&related) else { continue };
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            blocks.push_str(&format!(
                "\n### {} Design\n\n{}\n",
                self.catalog.label(&related),
                truncate_chars(text, self.context_budget)
            ));
        }
        if blocks.is_empty() {
            return blocks;
        }
        format!(
            "\n## Related modules\n\nKeep names, endpoints and models consistent with these modules.\n{}",
            blocks
        )
    }

    /// Full prompt for one module.
    pub fn build(
        &self,
        feature: &str,
        module_type: &ModuleType,
        requirements: &str,
        siblings: &ModuleTexts,
    ) -> String {
        let template = self.template(module_type);
        let label = self.catalog.label(module_type);
        let context = self.context(module_type, siblings);
        let requirements = requirements.trim();

        match &self.placeholder {
            Some(re) => re
                .replace_all(&template, |caps: &Captures| match &caps[1] {
                    "feature" => feature.to_string(),
                    "module" => label.clone(),
                    "requirements" => requirements.to_string(),
                    _ => context.clone(),
                })
                .into_owned(),
            None => template,
        }
    }
}

fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}\n\n[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}
