//! Module review workflow.
//!
//! Persists each feature's module metadata, enforces review transitions and
//! evaluates the gate that decides whether a feature can move on to tasks.

#![warn(missing_docs)]

pub mod checksum;
pub mod store;

pub use checksum::content_checksum;
pub use store::ModuleMetadataStore;
