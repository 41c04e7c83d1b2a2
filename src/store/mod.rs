//! Local cache store.
//!
//! One SQLite file per remote alias. Every write goes through a [`UnitOfWork`]: a single
//! transaction that holds the store-wide write gate until it commits or is dropped, so
//! concurrent kind workers never race on a natural key.

pub mod schema;

use crate::error::{CacheError, CacheResult};
use crate::models::{
    CacheColumn, CacheCounts, CacheDatabase, CacheIndex, CacheIndexColumn, CacheObject,
    CacheSource, CacheTableLike, CatalogObjectRef, IndexSnapshot, ObjectKind, TableSnapshot,
};
use chrono::{DateTime, Utc};
use schema::{database, indexes, objects, sources, tables};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// How long a writer waits for the cache file before giving up.
const BUSY_TIMEOUT_SECS: u64 = 30;

/// Identifiers removed per entity by [`CacheStore::purge_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub objects: Vec<i64>,
    pub tables: Vec<i64>,
    pub columns: Vec<i64>,
    pub indexes: Vec<i64>,
    pub index_columns: Vec<i64>,
    pub sources: Vec<i64>,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.objects.len()
            + self.tables.len()
            + self.columns.len()
            + self.indexes.len()
            + self.index_columns.len()
            + self.sources.len()
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
    path: PathBuf,
}

impl CacheStore {
    /// Open (creating if needed) the cache file at `path` and ensure its schema.
    pub async fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CacheError::save(format!("Cannot create {}: {}", parent.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(CacheError::from_store)?;

        let store = Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
            path,
        };
        store.create_schema().await?;

        info!(path = %store.path.display(), component = "store", "Cache store opened");
        Ok(store)
    }

    async fn create_schema(&self) -> CacheResult<()> {
        for statement in schema::CREATE_SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(CacheError::from_store)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the cache file in bytes, excluding the write-ahead log.
    pub async fn file_size(&self) -> u64 {
        tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Database identity and watermark
    // =========================================================================

    pub async fn find_database(&self, alias: &str) -> CacheResult<Option<CacheDatabase>> {
        sqlx::query_as::<_, CacheDatabase>(database::FIND)
            .bind(alias)
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::from_store)
    }

    pub async fn insert_database(&self, db: &CacheDatabase) -> CacheResult<()> {
        let _gate = self.write_gate.lock().await;
        sqlx::query(database::INSERT)
            .bind(&db.alias)
            .bind(db.dbid)
            .bind(&db.version)
            .bind(db.version_major)
            .bind(db.last_refresh)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from_store)?;
        Ok(())
    }

    /// Record a new identifier and version for an alias.
    pub async fn update_identity(&self, alias: &str, dbid: i64, version: &str) -> CacheResult<()> {
        let _gate = self.write_gate.lock().await;
        sqlx::query(database::UPDATE_IDENTITY)
            .bind(dbid)
            .bind(version)
            .bind(crate::models::version_major(version))
            .bind(alias)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from_store)?;
        Ok(())
    }

    pub async fn set_watermark(
        &self,
        alias: &str,
        watermark: Option<DateTime<Utc>>,
    ) -> CacheResult<()> {
        let _gate = self.write_gate.lock().await;
        sqlx::query(database::SET_WATERMARK)
            .bind(watermark)
            .bind(alias)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from_store)?;
        debug!(alias, watermark = ?watermark, component = "store", "Watermark stored");
        Ok(())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Start a unit of work. Waits for any other writer to finish.
    pub async fn begin(&self) -> CacheResult<UnitOfWork> {
        let gate = Arc::clone(&self.write_gate).lock_owned().await;
        let tx = self.pool.begin().await.map_err(CacheError::from_store)?;
        Ok(UnitOfWork { tx, _gate: gate })
    }

    /// Delete every cached entity row. `cache_database` rows survive.
    pub async fn purge_all(&self) -> CacheResult<PurgeReport> {
        let mut uow = self.begin().await?;
        let mut report = PurgeReport::default();
        for table in schema::ENTITY_TABLES {
            let ids = uow.delete_all_returning_ids(table).await?;
            match table {
                "cache_columns" => report.columns = ids,
                "cache_index_columns" => report.index_columns = ids,
                "cache_tables" => report.tables = ids,
                "cache_indexes" => report.indexes = ids,
                "cache_sources" => report.sources = ids,
                _ => report.objects = ids,
            }
        }
        uow.commit().await?;

        info!(rows = report.total(), component = "store", "Cache purged");
        Ok(report)
    }

    /// Reclaim free pages. Runs outside any transaction.
    pub async fn vacuum(&self) -> CacheResult<()> {
        let _gate = self.write_gate.lock().await;
        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(CacheError::from_store)?;
        info!(component = "store", "Cache vacuumed");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    async fn count(&self, table: &str) -> CacheResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let n: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(CacheError::from_store)?;
        Ok(n.max(0) as u64)
    }

    /// Count cached objects, optionally of one kind.
    pub async fn count_objects(&self, kind: Option<ObjectKind>) -> CacheResult<u64> {
        let kind = kind.map(|k| k.as_str());
        let n: i64 = sqlx::query_scalar(objects::COUNT)
            .bind(kind)
            .bind(kind)
            .fetch_one(&self.pool)
            .await
            .map_err(CacheError::from_store)?;
        Ok(n.max(0) as u64)
    }

    pub async fn counts(&self) -> CacheResult<CacheCounts> {
        Ok(CacheCounts {
            objects: self.count_objects(None).await?,
            tables_and_views: self.count("cache_tables").await?,
            table_columns: self.count("cache_columns").await?,
            sources: self.count("cache_sources").await?,
            indexes: self.count("cache_indexes").await?,
            index_columns: self.count("cache_index_columns").await?,
        })
    }

    pub async fn objects(&self, kind: Option<ObjectKind>) -> CacheResult<Vec<CacheObject>> {
        let kind = kind.map(|k| k.as_str());
        sqlx::query_as::<_, CacheObject>(objects::LIST)
            .bind(kind)
            .bind(kind)
            .fetch_all(&self.pool)
            .await
            .map_err(CacheError::from_store)
    }

    pub async fn find_table(&self, owner: &str, name: &str) -> CacheResult<Option<CacheTableLike>> {
        sqlx::query_as::<_, CacheTableLike>(tables::FIND)
            .bind(owner)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::from_store)
    }

    /// Columns of a table or view, in column order.
    pub async fn columns(&self, owner: &str, table: &str) -> CacheResult<Vec<CacheColumn>> {
        sqlx::query_as::<_, CacheColumn>(tables::COLUMNS)
            .bind(owner)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(CacheError::from_store)
    }

    pub async fn find_index(&self, owner: &str, name: &str) -> CacheResult<Option<CacheIndex>> {
        sqlx::query_as::<_, CacheIndex>(indexes::FIND)
            .bind(owner)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::from_store)
    }

    pub async fn index_columns(
        &self,
        owner: &str,
        index: &str,
    ) -> CacheResult<Vec<CacheIndexColumn>> {
        sqlx::query_as::<_, CacheIndexColumn>(indexes::COLUMNS)
            .bind(owner)
            .bind(index)
            .fetch_all(&self.pool)
            .await
            .map_err(CacheError::from_store)
    }

    pub async fn find_source(
        &self,
        owner: &str,
        name: &str,
        kind: ObjectKind,
    ) -> CacheResult<Option<CacheSource>> {
        sqlx::query_as::<_, CacheSource>(sources::FIND)
            .bind(owner)
            .bind(name)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::from_store)
    }
}

/// One flush worth of writes. Dropping it without [`commit`](Self::commit) rolls back.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

impl UnitOfWork {
    /// Find-or-create the row for a listed object. Returns its identifier.
    pub async fn upsert_object(&mut self, object: &CatalogObjectRef) -> CacheResult<i64> {
        let kind = object.kind.as_str();
        let existing: Option<i64> = sqlx::query_scalar(objects::FIND_ID)
            .bind(&object.owner)
            .bind(&object.name)
            .bind(kind)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(CacheError::from_store)?;

        match existing {
            Some(id) => {
                sqlx::query(objects::UPDATE)
                    .bind(object.last_modified)
                    .bind(id)
                    .execute(&mut *self.tx)
                    .await
                    .map_err(CacheError::from_store)?;
                Ok(id)
            }
            None => {
                let result = sqlx::query(objects::INSERT)
                    .bind(&object.owner)
                    .bind(&object.name)
                    .bind(kind)
                    .bind(object.last_modified)
                    .execute(&mut *self.tx)
                    .await
                    .map_err(CacheError::from_store)?;
                Ok(result.last_insert_rowid())
            }
        }
    }

    /// Find-or-create a table or view, then replace its column set.
    pub async fn upsert_table(&mut self, snapshot: &TableSnapshot) -> CacheResult<i64> {
        let t = &snapshot.table;
        let existing: Option<i64> = sqlx::query_scalar(tables::FIND_ID)
            .bind(&t.owner)
            .bind(&t.name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(CacheError::from_store)?;

        let id = match existing {
            Some(id) => {
                sqlx::query(tables::UPDATE)
                    .bind(t.is_view)
                    .bind(t.num_rows)
                    .bind(t.last_analyzed)
                    .bind(t.partitioned)
                    .bind(t.is_editioning)
                    .bind(t.is_read_only)
                    .bind(&t.sql_text)
                    .bind(id)
                    .execute(&mut *self.tx)
                    .await
                    .map_err(CacheError::from_store)?;
                id
            }
            None => sqlx::query(tables::INSERT)
                .bind(&t.owner)
                .bind(&t.name)
                .bind(t.is_view)
                .bind(t.num_rows)
                .bind(t.last_analyzed)
                .bind(t.partitioned)
                .bind(t.is_editioning)
                .bind(t.is_read_only)
                .bind(&t.sql_text)
                .execute(&mut *self.tx)
                .await
                .map_err(CacheError::from_store)?
                .last_insert_rowid(),
        };

        sqlx::query(tables::DELETE_COLUMNS)
            .bind(&t.owner)
            .bind(&t.name)
            .execute(&mut *self.tx)
            .await
            .map_err(CacheError::from_store)?;

        for c in &snapshot.columns {
            sqlx::query(tables::INSERT_COLUMN)
                .bind(&t.owner)
                .bind(&t.name)
                .bind(&c.column_name)
                .bind(c.column_id)
                .bind(&c.data_type)
                .bind(c.data_length)
                .bind(c.data_precision)
                .bind(c.data_scale)
                .bind(c.nullable)
                .bind(&c.data_default)
                .execute(&mut *self.tx)
                .await
                .map_err(CacheError::from_store)?;
        }
        Ok(id)
    }

    /// Find-or-create an index, then replace its key columns.
    pub async fn upsert_index(&mut self, snapshot: &IndexSnapshot) -> CacheResult<i64> {
        let i = &snapshot.index;
        let existing: Option<i64> = sqlx::query_scalar(indexes::FIND_ID)
            .bind(&i.owner)
            .bind(&i.name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(CacheError::from_store)?;

        let id = match existing {
            Some(id) => {
                sqlx::query(indexes::UPDATE)
                    .bind(&i.table_owner)
                    .bind(&i.table_name)
                    .bind(&i.index_type)
                    .bind(&i.uniqueness)
                    .bind(i.leaf_blocks)
                    .bind(i.distinct_keys)
                    .bind(i.clustering_factor)
                    .bind(i.sample_size)
                    .bind(i.last_analyzed)
                    .bind(&i.status)
                    .bind(&i.visibility)
                    .bind(&i.degree)
                    .bind(&i.tablespace_name)
                    .bind(id)
                    .execute(&mut *self.tx)
                    .await
                    .map_err(CacheError::from_store)?;
                id
            }
            None => sqlx::query(indexes::INSERT)
                .bind(&i.owner)
                .bind(&i.name)
                .bind(&i.table_owner)
                .bind(&i.table_name)
                .bind(&i.index_type)
                .bind(&i.uniqueness)
                .bind(i.leaf_blocks)
                .bind(i.distinct_keys)
                .bind(i.clustering_factor)
                .bind(i.sample_size)
                .bind(i.last_analyzed)
                .bind(&i.status)
                .bind(&i.visibility)
                .bind(&i.degree)
                .bind(&i.tablespace_name)
                .execute(&mut *self.tx)
                .await
                .map_err(CacheError::from_store)?
                .last_insert_rowid(),
        };

        sqlx::query(indexes::DELETE_COLUMNS)
            .bind(&i.owner)
            .bind(&i.name)
            .execute(&mut *self.tx)
            .await
            .map_err(CacheError::from_store)?;

        for c in &snapshot.columns {
            sqlx::query(indexes::INSERT_COLUMN)
                .bind(&i.owner)
                .bind(&i.name)
                .bind(&c.table_owner)
                .bind(&c.table_name)
                .bind(&c.column_name)
                .bind(c.position)
                .bind(&c.descend)
                .execute(&mut *self.tx)
                .await
                .map_err(CacheError::from_store)?;
        }
        Ok(id)
    }

    /// Find-or-create a source object. Both text fields are overwritten.
    pub async fn upsert_source(&mut self, source: &CacheSource) -> CacheResult<i64> {
        let kind = source.kind.as_str();
        let existing: Option<i64> = sqlx::query_scalar(sources::FIND_ID)
            .bind(&source.owner)
            .bind(&source.name)
            .bind(kind)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(CacheError::from_store)?;

        match existing {
            Some(id) => {
                sqlx::query(sources::UPDATE)
                    .bind(&source.spec_text)
                    .bind(&source.body_text)
                    .bind(id)
                    .execute(&mut *self.tx)
                    .await
                    .map_err(CacheError::from_store)?;
                Ok(id)
            }
            None => Ok(sqlx::query(sources::INSERT)
                .bind(&source.owner)
                .bind(&source.name)
                .bind(kind)
                .bind(&source.spec_text)
                .bind(&source.body_text)
                .execute(&mut *self.tx)
                .await
                .map_err(CacheError::from_store)?
                .last_insert_rowid()),
        }
    }

    async fn delete_all_returning_ids(&mut self, table: &str) -> CacheResult<Vec<i64>> {
        let sql = format!("DELETE FROM {table} RETURNING id");
        sqlx::query_scalar(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(CacheError::from_store)
    }

    pub async fn commit(self) -> CacheResult<()> {
        self.tx.commit().await.map_err(CacheError::from_store)
    }
}
