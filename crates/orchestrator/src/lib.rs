//! Coordination of modular feature designs.
//!
//! [`ModuleOrchestrator`] ties together module detection, generation,
//! legacy migration, review workflow and cross-reference analysis over a
//! [`DocumentStore`](modspec_storage::DocumentStore).

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod errors;
pub mod options;
pub mod orchestrator;

pub use cache::{Clock, ManualClock, ModuleCache, SystemClock, DEFAULT_CACHE_TTL};
pub use config::OrchestratorConfig;
pub use errors::surface_error;
pub use options::{GenerationOptions, GenerationResult};
pub use orchestrator::ModuleOrchestrator;
