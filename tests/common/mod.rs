//! A SQLite file holding the `ALL_*` dictionary views, served through the real
//! `SqlxCatalogSource`.

#![allow(dead_code)]

use catalog_cache::config::RemoteConfig;
use catalog_cache::remote::SqlxCatalogSource;
use catalog_cache::{CacheStore, RefreshCoordinator, SyncOptions};
use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const DICTIONARY: &[&str] = &[
    r#"CREATE TABLE "V$DATABASE" (DBID INTEGER NOT NULL)"#,
    r#"CREATE TABLE "V$INSTANCE" (VERSION TEXT NOT NULL)"#,
    "CREATE TABLE ALL_OBJECTS (OWNER TEXT, OBJECT_NAME TEXT, OBJECT_TYPE TEXT, LAST_DDL_TIME TEXT)",
    "CREATE TABLE ALL_TABLES (OWNER TEXT, TABLE_NAME TEXT, NUM_ROWS INTEGER, LAST_ANALYZED TEXT, \
     PARTITIONED TEXT)",
    "CREATE TABLE ALL_VIEWS (OWNER TEXT, VIEW_NAME TEXT, TEXT TEXT, EDITIONING_VIEW TEXT, \
     READ_ONLY TEXT)",
    "CREATE TABLE ALL_TAB_COLUMNS (OWNER TEXT, TABLE_NAME TEXT, COLUMN_NAME TEXT, \
     COLUMN_ID INTEGER, DATA_TYPE TEXT, DATA_LENGTH INTEGER, DATA_PRECISION INTEGER, \
     DATA_SCALE INTEGER, NULLABLE TEXT, DATA_DEFAULT TEXT)",
    "CREATE TABLE ALL_INDEXES (OWNER TEXT, INDEX_NAME TEXT, TABLE_OWNER TEXT, TABLE_NAME TEXT, \
     INDEX_TYPE TEXT, UNIQUENESS TEXT, LEAF_BLOCKS INTEGER, DISTINCT_KEYS INTEGER, \
     CLUSTERING_FACTOR INTEGER, SAMPLE_SIZE INTEGER, LAST_ANALYZED TEXT, STATUS TEXT, \
     VISIBILITY TEXT, DEGREE TEXT, TABLESPACE_NAME TEXT)",
    "CREATE TABLE ALL_IND_COLUMNS (INDEX_OWNER TEXT, INDEX_NAME TEXT, TABLE_OWNER TEXT, \
     TABLE_NAME TEXT, COLUMN_NAME TEXT, COLUMN_POSITION INTEGER, DESCEND TEXT)",
    "CREATE TABLE ALL_SOURCE (OWNER TEXT, NAME TEXT, TYPE TEXT, LINE INTEGER, TEXT TEXT)",
];

/// Dictionary timestamp `offset` away from now.
pub fn ddl_time(offset: Duration) -> String {
    (Utc::now().naive_utc() + offset)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// A timestamp well before any cycle of the test.
pub fn long_ago() -> String {
    ddl_time(-Duration::days(30))
}

/// A timestamp after any watermark the test can produce.
pub fn later() -> String {
    ddl_time(Duration::hours(1))
}

pub struct RemoteCatalog {
    pub pool: SqlitePool,
    pub path: PathBuf,
}

impl RemoteCatalog {
    pub async fn create(dir: &TempDir, dbid: i64, version: &str) -> Self {
        let path = dir.path().join("dictionary.db");
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        for ddl in DICTIONARY {
            sqlx::query(ddl).execute(&pool).await.unwrap();
        }
        sqlx::query(r#"INSERT INTO "V$DATABASE" VALUES (?)"#)
            .bind(dbid)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(r#"INSERT INTO "V$INSTANCE" VALUES (?)"#)
            .bind(version)
            .execute(&pool)
            .await
            .unwrap();
        Self { pool, path }
    }

    pub fn remote_config(&self, alias: &str) -> RemoteConfig {
        RemoteConfig::parse(&format!("{alias}=sqlite:{}", self.path.display())).unwrap()
    }

    async fn exec(&self, sql: &str, params: &[&str]) {
        let mut query = sqlx::query(sql);
        for p in params {
            query = query.bind(*p);
        }
        query.execute(&self.pool).await.unwrap();
    }

    pub async fn set_dbid(&self, dbid: i64) {
        sqlx::query(r#"UPDATE "V$DATABASE" SET DBID = ?"#)
            .bind(dbid)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn add_object(&self, owner: &str, name: &str, kind: &str, ddl: &str) {
        self.exec(
            "INSERT INTO ALL_OBJECTS VALUES (?, ?, ?, ?)",
            &[owner, name, kind, ddl],
        )
        .await;
    }

    /// Move an object's `LAST_DDL_TIME`.
    pub async fn touch(&self, owner: &str, name: &str, kind: &str, ddl: &str) {
        self.exec(
            "UPDATE ALL_OBJECTS SET LAST_DDL_TIME = ? \
             WHERE OWNER = ? AND OBJECT_NAME = ? AND OBJECT_TYPE = ?",
            &[ddl, owner, name, kind],
        )
        .await;
    }

    pub async fn add_table(&self, owner: &str, name: &str, columns: &[&str], ddl: &str) {
        self.add_object(owner, name, "TABLE", ddl).await;
        sqlx::query("INSERT INTO ALL_TABLES VALUES (?, ?, ?, ?, 'NO')")
            .bind(owner)
            .bind(name)
            .bind(100_i64)
            .bind(long_ago())
            .execute(&self.pool)
            .await
            .unwrap();
        self.set_columns(owner, name, columns).await;
    }

    /// Replace the column set of a table or view.
    pub async fn set_columns(&self, owner: &str, table: &str, columns: &[&str]) {
        self.exec(
            "DELETE FROM ALL_TAB_COLUMNS WHERE OWNER = ? AND TABLE_NAME = ?",
            &[owner, table],
        )
        .await;
        for (i, column) in columns.iter().enumerate() {
            sqlx::query(
                "INSERT INTO ALL_TAB_COLUMNS VALUES (?, ?, ?, ?, 'VARCHAR2', 40, NULL, NULL, 'Y', NULL)",
            )
            .bind(owner)
            .bind(table)
            .bind(*column)
            .bind(i as i64 + 1)
            .execute(&self.pool)
            .await
            .unwrap();
        }
    }

    pub async fn add_view(&self, owner: &str, name: &str, text: &str, columns: &[&str], ddl: &str) {
        self.add_object(owner, name, "VIEW", ddl).await;
        self.exec(
            "INSERT INTO ALL_VIEWS VALUES (?, ?, ?, 'N', 'N')",
            &[owner, name, text],
        )
        .await;
        self.set_columns(owner, name, columns).await;
    }

    pub async fn add_index(
        &self,
        owner: &str,
        name: &str,
        table: &str,
        columns: &[&str],
        ddl: &str,
    ) {
        self.add_object(owner, name, "INDEX", ddl).await;
        sqlx::query(
            "INSERT INTO ALL_INDEXES VALUES (?, ?, ?, ?, 'NORMAL', 'UNIQUE', 1, 100, 2, 100, ?, \
             'VALID', 'VISIBLE', '1', 'USERS')",
        )
        .bind(owner)
        .bind(name)
        .bind(owner)
        .bind(table)
        .bind(long_ago())
        .execute(&self.pool)
        .await
        .unwrap();
        for (i, column) in columns.iter().enumerate() {
            sqlx::query("INSERT INTO ALL_IND_COLUMNS VALUES (?, ?, ?, ?, ?, ?, 'ASC')")
                .bind(owner)
                .bind(name)
                .bind(owner)
                .bind(table)
                .bind(*column)
                .bind(i as i64 + 1)
                .execute(&self.pool)
                .await
                .unwrap();
        }
    }

    /// Replace the stored source of one object part (`PACKAGE`, `PACKAGE BODY`, ...).
    pub async fn set_source(&self, owner: &str, name: &str, type_name: &str, lines: &[&str]) {
        self.exec(
            "DELETE FROM ALL_SOURCE WHERE OWNER = ? AND NAME = ? AND TYPE = ?",
            &[owner, name, type_name],
        )
        .await;
        for (i, line) in lines.iter().enumerate() {
            sqlx::query("INSERT INTO ALL_SOURCE VALUES (?, ?, ?, ?, ?)")
                .bind(owner)
                .bind(name)
                .bind(type_name)
                .bind(i as i64 + 1)
                .bind(*line)
                .execute(&self.pool)
                .await
                .unwrap();
        }
    }

    /// A package with its body, both last changed at `ddl`.
    pub async fn add_package(
        &self,
        owner: &str,
        name: &str,
        spec: &[&str],
        body: &[&str],
        ddl: &str,
    ) {
        self.add_object(owner, name, "PACKAGE", ddl).await;
        self.add_object(owner, name, "PACKAGE BODY", ddl).await;
        self.set_source(owner, name, "PACKAGE", spec).await;
        self.set_source(owner, name, "PACKAGE BODY", body).await;
    }
}

pub fn fast_options() -> SyncOptions {
    SyncOptions {
        poll_interval_ms: 20,
        ..Default::default()
    }
}

/// A coordinator caching `remote` under `alias` in a file inside `dir`.
pub async fn coordinator(
    dir: &TempDir,
    remote: &RemoteCatalog,
    alias: &str,
    options: SyncOptions,
) -> RefreshCoordinator {
    let store = CacheStore::open(dir.path().join("cache").join(format!("{alias}.sqlite")))
        .await
        .unwrap();
    let source = SqlxCatalogSource::new(remote.remote_config(alias));
    RefreshCoordinator::new(alias, Arc::new(source), store, options)
}
