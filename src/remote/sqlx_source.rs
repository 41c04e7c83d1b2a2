//! Catalog source backed by a sqlx connection pool.
//!
//! # Architecture
//!
//! Statement execution uses database-specific implementations organized in submodules,
//! each with the same `fetch` and `bind_param` pair adapted to its type system.

use crate::config::RemoteConfig;
use crate::error::{CacheError, CacheResult};
use crate::remote::decode::IntoRemoteRow;
use crate::remote::{
    CatalogSession, CatalogSource, DbPool, PlaceholderStyle, QueryParam, RemoteRow, Statement,
};
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Opens one pool per refresh cycle against a remote described by a [`RemoteConfig`].
#[derive(Debug, Clone)]
pub struct SqlxCatalogSource {
    config: RemoteConfig,
    query_timeout: Option<Duration>,
}

impl SqlxCatalogSource {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            query_timeout: None,
        }
    }

    /// Fail any statement that runs longer than `limit`.
    pub fn with_query_timeout(mut self, limit: Option<Duration>) -> Self {
        self.query_timeout = limit;
        self
    }

    pub fn alias(&self) -> &str {
        &self.config.alias
    }
}

#[async_trait]
impl CatalogSource for SqlxCatalogSource {
    async fn connect(&self) -> CacheResult<Arc<dyn CatalogSession>> {
        let pool = DbPool::connect(&self.config).await?;
        Ok(Arc::new(SqlxSession {
            pool,
            query_timeout: self.query_timeout,
        }))
    }
}

/// A session over an open pool. Each statement checks a connection out for its duration.
#[derive(Debug)]
pub struct SqlxSession {
    pool: DbPool,
    query_timeout: Option<Duration>,
}

#[async_trait]
impl CatalogSession for SqlxSession {
    fn placeholder_style(&self) -> PlaceholderStyle {
        self.pool.db_type().placeholder_style()
    }

    fn fetch<'a>(&'a self, statement: &'a Statement) -> BoxStream<'a, CacheResult<RemoteRow>> {
        let shape = statement.shape;
        debug!(
            shape = %shape,
            params = statement.params.len(),
            // logged only; sqlx has no per-query fetch size
            prefetch = ?statement.prefetch,
            component = "remote",
            "Executing catalog query"
        );

        let rows = match &self.pool {
            DbPool::MySql(p) => mysql::fetch(p, statement),
            DbPool::Postgres(p) => postgres::fetch(p, statement),
            DbPool::SQLite(p) => sqlite::fetch(p, statement),
        }
        .map_err(move |e| CacheError::from(e).with_shape(shape));

        let Some(limit) = self.query_timeout else {
            return rows.boxed();
        };

        // A deadline covers the whole statement, so the rows are collected under it.
        let collected = async move {
            match timeout(limit, rows.try_collect::<Vec<_>>()).await {
                Ok(result) => result,
                Err(_) => Err(CacheError::timeout(
                    format!("{shape} query"),
                    limit.as_secs(),
                )),
            }
        };
        stream::once(collected)
            .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<_, CacheError>)))
            .try_flatten()
            .boxed()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod mysql {
    use super::*;
    use sqlx::MySqlPool;
    use sqlx::mysql::MySqlArguments;

    pub fn fetch<'a>(
        pool: &'a MySqlPool,
        statement: &'a Statement,
    ) -> BoxStream<'a, Result<RemoteRow, sqlx::Error>> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = bind_param(query, param);
        }
        query.fetch(pool).map_ok(|row| row.to_remote_row()).boxed()
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, sqlx::MySql, MySqlArguments>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, sqlx::MySql, MySqlArguments> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Timestamp(v) => query.bind(*v),
        }
    }
}

mod postgres {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::PgArguments;

    pub fn fetch<'a>(
        pool: &'a PgPool,
        statement: &'a Statement,
    ) -> BoxStream<'a, Result<RemoteRow, sqlx::Error>> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = bind_param(query, param);
        }
        query.fetch(pool).map_ok(|row| row.to_remote_row()).boxed()
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Timestamp(v) => query.bind(*v),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqliteArguments;

    pub fn fetch<'a>(
        pool: &'a SqlitePool,
        statement: &'a Statement,
    ) -> BoxStream<'a, Result<RemoteRow, sqlx::Error>> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = bind_param(query, param);
        }
        query.fetch(pool).map_ok(|row| row.to_remote_row()).boxed()
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            // Stored as text, which compares correctly against dictionary timestamps
            QueryParam::Timestamp(v) => query.bind(*v),
        }
    }
}
