//! Content generator seam and the module generator built on it.

use async_trait::async_trait;
use modspec_analysis::ModuleTexts;
use modspec_core::{ModuleError, ModuleType, Result};
use std::sync::Arc;
use tracing::debug;

use crate::PromptBuilder;

/// Turns a prompt into document text.
///
/// Implement this to plug in a text generation backend.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate text for `prompt`.
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Generates one module's content.
///
/// No retry happens here; a generator failure is returned as
/// [`ModuleError::Generation`] tagged with the module type.
#[derive(Clone)]
pub struct ModuleGenerator {
    generator: Arc<dyn ContentGenerator>,
    prompts: PromptBuilder,
}

impl ModuleGenerator {
    /// Create a module generator.
    pub fn new(generator: Arc<dyn ContentGenerator>, prompts: PromptBuilder) -> Self {
        Self { generator, prompts }
    }

    /// Prompt builder in use.
    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Generate a module from the requirements alone.
    pub async fn generate(
        &self,
        feature: &str,
        module_type: &ModuleType,
        requirements: &str,
    ) -> Result<String> {
        self.generate_with_context(feature, module_type, requirements, &ModuleTexts::new())
            .await
    }

    /// Generate a module, giving related sibling modules as context.
    pub async fn generate_with_context(
        &self,
        feature: &str,
        module_type: &ModuleType,
        requirements: &str,
        siblings: &ModuleTexts,
    ) -> Result<String> {
        let prompt = self.prompts.build(feature, module_type, requirements, siblings);
        debug!(
            "Generating {} for {} (prompt {} chars)",
            module_type,
            feature,
            prompt.len()
        );

        let content = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| ModuleError::Generation {
                module_type: module_type.clone(),
                message: format!("{:#}", e),
            })?;

        if content.trim().is_empty() {
            return Err(ModuleError::Generation {
                module_type: module_type.clone(),
                message: "generator returned empty content".to_string(),
            });
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        prompts: Mutex<Vec<String>>,
        reply: anyhow::Result<String>,
    }

    impl Recording {
        fn replying(reply: anyhow::Result<String>) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait]
    impl ContentGenerator for Recording {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    #[tokio::test]
    async fn test_generate_passes_prompt_through() {
        let backend = Recording::replying(Ok("# Testing Design\n".into()));
        let generator = ModuleGenerator::new(backend.clone(), PromptBuilder::default());

        let content = generator
            .generate("login", &ModuleType::Testing, "Users log in")
            .await
            .unwrap();

        assert_eq!(content, "# Testing Design\n");
        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Users log in"));
    }

    #[tokio::test]
    async fn test_failure_is_tagged_with_module_type() {
        let backend = Recording::replying(Err(anyhow::anyhow!("connection refused")));
        let generator = ModuleGenerator::new(backend, PromptBuilder::default());

        let err = generator
            .generate("login", &ModuleType::Mobile, "r")
            .await
            .unwrap_err();

        match &err {
            ModuleError::Generation { module_type, message } => {
                assert_eq!(*module_type, ModuleType::Mobile);
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_output_is_an_error() {
        let generator = ModuleGenerator::new(Recording::replying(Ok("  \n".into())), PromptBuilder::default());
        assert!(matches!(
            generator.generate("f", &ModuleType::Frontend, "r").await,
            Err(ModuleError::Generation { .. })
        ));
    }
}
