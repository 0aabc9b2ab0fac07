//! Module content generation.
//!
//! Builds module-specific prompts and hands them to a [`ContentGenerator`].

#![warn(missing_docs)]

pub mod generator;
pub mod ollama;
pub mod prompt;

pub use generator::{ContentGenerator, ModuleGenerator};
pub use ollama::{OllamaContentGenerator, DEFAULT_OLLAMA_URL};
pub use prompt::{PromptBuilder, DEFAULT_CONTEXT_BUDGET};
