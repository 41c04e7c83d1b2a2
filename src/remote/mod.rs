//! Remote catalog access.
//!
//! This module provides the querying capability the sync engine consumes:
//! - Parameterized statements and placeholder generation
//! - Name-keyed result rows with typed accessors
//! - Catalog statements for each query shape
//! - A sqlx-backed catalog source over a bounded connection pool
//!
//! The engine only depends on the [`CatalogSource`] and [`CatalogSession`] traits.

pub mod decode;
pub mod pool;
pub mod queries;
pub mod row;
pub mod sqlx_source;
pub mod statement;

pub use pool::{DatabaseType, DbPool};
pub use row::{RemoteRow, RemoteValue, parse_timestamp};
pub use sqlx_source::SqlxCatalogSource;
pub use statement::{PlaceholderStyle, QueryParam, QueryShape, Statement, StatementBuilder};

use crate::error::CacheResult;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use std::sync::Arc;

/// Something that can open sessions against a remote catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Acquire a session. Failure here aborts the refresh cycle.
    async fn connect(&self) -> CacheResult<Arc<dyn CatalogSession>>;
}

/// An open remote session shared by the lister and every kind worker.
///
/// Implementations check a pooled connection out per statement, so concurrent callers
/// block on pool exhaustion individually.
#[async_trait]
pub trait CatalogSession: Send + Sync {
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Stream the rows of a statement.
    fn fetch<'a>(&'a self, statement: &'a Statement) -> BoxStream<'a, CacheResult<RemoteRow>>;

    /// Collect every row of a statement.
    async fn fetch_all(&self, statement: &Statement) -> CacheResult<Vec<RemoteRow>> {
        self.fetch(statement).try_collect().await
    }

    /// Release the session's connections.
    async fn close(&self);
}
