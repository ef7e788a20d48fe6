//! Live catalog of installed Steam games.
//!
//! Builds an in-memory index of every game across all Steam library folders
//! and keeps it current as manifests and the library index change on disk.
//!
//! # Operations
//!
//! - **Discover** - locate Steam and scan every library folder
//! - **Scan** - ingest the manifests of a single directory
//! - **Apply** - fold a created or modified file into the catalog
//! - **Subscribe** - receive `GameAdded` / `GameChanged` notifications
//!
//! Mutations are serialized; readers get cloned snapshots and never block
//! on I/O. A malformed manifest is reported and skipped without affecting
//! the rest of a scan.

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod service;
pub mod watcher;

// Re-export primary types for convenience.
pub use catalog::{Catalog, InstallPathResolver, ScanReport, ScanWarning};
pub use config::CatalogConfig;
pub use error::CatalogError;
pub use events::{CatalogEvent, ChangeEvent, ChangeKind, Entity};
pub use service::CatalogService;
pub use watcher::LibraryWatcher;
