//! Data models for the catalog cache.
//!
//! This module re-exports all model types used throughout the application.

pub mod cache;
pub mod kind;
pub mod object;

// Re-export commonly used types
pub use cache::{
    CacheColumn, CacheCounts, CacheDatabase, CacheIndex, CacheIndexColumn, CacheObject,
    CacheSource, CacheTableLike, IndexSnapshot, TableSnapshot, version_major,
};
pub use kind::{DetailFamily, ObjectKind};
pub use object::CatalogObjectRef;
