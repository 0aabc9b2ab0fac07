//! Document storage abstraction and implementations for modspec.
//!
//! This crate provides a trait-based document store interface with a
//! filesystem implementation and an in-memory implementation, plus the
//! path layout of a feature's artifacts.

#![warn(missing_docs)]

pub mod trait_;
pub mod fs_store;
pub mod memory_store;
pub mod layout;

pub use trait_::{DocumentStore, FileStat, Result, StorageError};
pub use fs_store::FsDocumentStore;
pub use memory_store::InMemoryDocumentStore;
pub use layout::{
    FeatureLayout, LEGACY_BACKUP_FILE, LEGACY_DESIGN_FILE, METADATA_FILE, REQUIREMENTS_FILE,
};
