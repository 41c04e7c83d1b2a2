//! Cached catalog entities.
//!
//! Every entity is addressed by its natural key (owner, name[, kind]); the local
//! store's row identifiers never leave the store module.

use crate::models::ObjectKind;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// One row per remote-database alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CacheDatabase {
    pub alias: String,
    pub dbid: i64,
    pub version: String,
    pub version_major: i64,
    /// Watermark of the last successful refresh. `None` means never.
    pub last_refresh: Option<DateTime<Utc>>,
}

impl CacheDatabase {
    pub fn new(alias: impl Into<String>, dbid: i64, version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            alias: alias.into(),
            dbid,
            version_major: version_major(&version),
            version,
            last_refresh: None,
        }
    }
}

/// Leading integer of a dotted version string, e.g. `19` for `19.0.0.0.0`.
pub fn version_major(version: &str) -> i64 {
    version
        .trim()
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheObject {
    pub owner: String,
    pub name: String,
    pub kind: ObjectKind,
    pub last_ddl_time: Option<NaiveDateTime>,
}

impl<'r> FromRow<'r, SqliteRow> for CacheObject {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        Ok(Self {
            owner: row.try_get("owner")?,
            name: row.try_get("name")?,
            kind: ObjectKind::parse(&kind),
            last_ddl_time: row.try_get("last_ddl_time")?,
        })
    }
}

/// Tables and views share one shape; view-only fields stay at their defaults for tables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, FromRow)]
pub struct CacheTableLike {
    pub owner: String,
    pub name: String,
    pub is_view: bool,
    pub num_rows: Option<i64>,
    pub last_analyzed: Option<NaiveDateTime>,
    pub partitioned: bool,
    pub is_editioning: bool,
    pub is_read_only: bool,
    /// Defining query (views only)
    pub sql_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, FromRow)]
pub struct CacheColumn {
    pub owner: String,
    pub table_name: String,
    pub column_name: String,
    pub column_id: Option<i64>,
    pub data_type: Option<String>,
    pub data_length: Option<i64>,
    pub data_precision: Option<i64>,
    pub data_scale: Option<i64>,
    pub nullable: bool,
    pub data_default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, FromRow)]
pub struct CacheIndex {
    pub owner: String,
    pub name: String,
    pub table_owner: Option<String>,
    pub table_name: Option<String>,
    pub index_type: Option<String>,
    pub uniqueness: Option<String>,
    pub leaf_blocks: Option<i64>,
    pub distinct_keys: Option<i64>,
    pub clustering_factor: Option<i64>,
    pub sample_size: Option<i64>,
    pub last_analyzed: Option<NaiveDateTime>,
    /// `VALID`, `UNUSABLE`, `N/A`
    pub status: Option<String>,
    pub visibility: Option<String>,
    pub degree: Option<String>,
    pub tablespace_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, FromRow)]
pub struct CacheIndexColumn {
    pub owner: String,
    pub index_name: String,
    pub table_owner: Option<String>,
    pub table_name: Option<String>,
    pub column_name: String,
    pub position: i64,
    pub descend: Option<String>,
}

/// Package, type and standalone program source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSource {
    pub owner: String,
    pub name: String,
    pub kind: ObjectKind,
    pub spec_text: Option<String>,
    pub body_text: Option<String>,
}

impl<'r> FromRow<'r, SqliteRow> for CacheSource {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        Ok(Self {
            owner: row.try_get("owner")?,
            name: row.try_get("name")?,
            kind: ObjectKind::parse(&kind),
            spec_text: row.try_get("spec_text")?,
            body_text: row.try_get("body_text")?,
        })
    }
}

/// A table-like parent together with its complete column set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSnapshot {
    pub table: CacheTableLike,
    pub columns: Vec<CacheColumn>,
}

/// An index together with its complete column set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexSnapshot {
    pub index: CacheIndex,
    pub columns: Vec<CacheIndexColumn>,
}

/// Row counts shown in the cache report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheCounts {
    pub objects: u64,
    pub tables_and_views: u64,
    pub table_columns: u64,
    pub sources: u64,
    pub indexes: u64,
    pub index_columns: u64,
}

impl std::fmt::Display for CacheCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Objects:         {}", self.objects)?;
        writeln!(f, "Tables & views:  {}", self.tables_and_views)?;
        writeln!(f, "Table columns:   {}", self.table_columns)?;
        writeln!(f, "Source objects:  {}", self.sources)?;
        writeln!(f, "Indexes:         {}", self.indexes)?;
        write!(f, "Index columns:   {}", self.index_columns)
    }
}
