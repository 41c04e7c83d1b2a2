//! Catalog Cache Library
//!
//! This library mirrors the catalog of a remote database (tables, views, indexes and
//! stored source) into a local SQLite cache, with incremental, resumable refresh cycles
//! and one bounded worker per object kind.

pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;

pub use config::{CatalogFilter, Config, SyncOptions};
pub use error::{CacheError, CacheResult};
pub use store::CacheStore;
pub use sync::{RefreshCoordinator, RefreshMode, RefreshOutcome, RefreshSummary};
