//! Cache file schema and the SQL the store issues.

/// Executed one statement at a time when a cache file is opened.
pub const CREATE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS cache_database (
        alias TEXT PRIMARY KEY NOT NULL,
        dbid INTEGER NOT NULL,
        version TEXT NOT NULL,
        version_major INTEGER NOT NULL,
        last_refresh TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cache_objects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        last_ddl_time TEXT,
        UNIQUE (owner, name, kind)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cache_tables (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        is_view INTEGER NOT NULL DEFAULT 0,
        num_rows INTEGER,
        last_analyzed TEXT,
        partitioned INTEGER NOT NULL DEFAULT 0,
        is_editioning INTEGER NOT NULL DEFAULT 0,
        is_read_only INTEGER NOT NULL DEFAULT 0,
        sql_text TEXT,
        UNIQUE (owner, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cache_columns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        table_name TEXT NOT NULL,
        column_name TEXT NOT NULL,
        column_id INTEGER,
        data_type TEXT,
        data_length INTEGER,
        data_precision INTEGER,
        data_scale INTEGER,
        nullable INTEGER NOT NULL DEFAULT 1,
        data_default TEXT,
        UNIQUE (owner, table_name, column_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cache_indexes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        table_owner TEXT,
        table_name TEXT,
        index_type TEXT,
        uniqueness TEXT,
        leaf_blocks INTEGER,
        distinct_keys INTEGER,
        clustering_factor INTEGER,
        sample_size INTEGER,
        last_analyzed TEXT,
        status TEXT,
        visibility TEXT,
        degree TEXT,
        tablespace_name TEXT,
        UNIQUE (owner, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cache_index_columns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        index_name TEXT NOT NULL,
        table_owner TEXT,
        table_name TEXT,
        column_name TEXT NOT NULL,
        position INTEGER NOT NULL,
        descend TEXT,
        UNIQUE (owner, index_name, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cache_sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        spec_text TEXT,
        body_text TEXT,
        UNIQUE (owner, name, kind)
    )
    "#,
];

/// Entity tables in purge order (children before parents).
pub const ENTITY_TABLES: [&str; 6] = [
    "cache_columns",
    "cache_index_columns",
    "cache_tables",
    "cache_indexes",
    "cache_sources",
    "cache_objects",
];

pub mod database {
    pub const FIND: &str = r#"
        SELECT alias, dbid, version, version_major, last_refresh
        FROM cache_database
        WHERE alias = ?
        "#;

    pub const INSERT: &str = r#"
        INSERT INTO cache_database (alias, dbid, version, version_major, last_refresh)
        VALUES (?, ?, ?, ?, ?)
        "#;

    pub const UPDATE_IDENTITY: &str = r#"
        UPDATE cache_database SET dbid = ?, version = ?, version_major = ?
        WHERE alias = ?
        "#;

    pub const SET_WATERMARK: &str = "UPDATE cache_database SET last_refresh = ? WHERE alias = ?";
}

pub mod objects {
    pub const FIND_ID: &str =
        "SELECT id FROM cache_objects WHERE owner = ? AND name = ? AND kind = ?";

    pub const INSERT: &str =
        "INSERT INTO cache_objects (owner, name, kind, last_ddl_time) VALUES (?, ?, ?, ?)";

    pub const UPDATE: &str = "UPDATE cache_objects SET last_ddl_time = ? WHERE id = ?";

    pub const LIST: &str = r#"
        SELECT owner, name, kind, last_ddl_time FROM cache_objects
        WHERE (? IS NULL OR kind = ?)
        ORDER BY owner, name, kind
        "#;

    pub const COUNT: &str = "SELECT COUNT(*) FROM cache_objects WHERE (? IS NULL OR kind = ?)";
}

pub mod tables {
    pub const FIND_ID: &str = "SELECT id FROM cache_tables WHERE owner = ? AND name = ?";

    pub const FIND: &str = r#"
        SELECT owner, name, is_view, num_rows, last_analyzed, partitioned,
               is_editioning, is_read_only, sql_text
        FROM cache_tables
        WHERE owner = ? AND name = ?
        "#;

    pub const INSERT: &str = r#"
        INSERT INTO cache_tables (owner, name, is_view, num_rows, last_analyzed, partitioned,
                                  is_editioning, is_read_only, sql_text)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

    pub const UPDATE: &str = r#"
        UPDATE cache_tables
        SET is_view = ?, num_rows = ?, last_analyzed = ?, partitioned = ?,
            is_editioning = ?, is_read_only = ?, sql_text = ?
        WHERE id = ?
        "#;

    pub const DELETE_COLUMNS: &str =
        "DELETE FROM cache_columns WHERE owner = ? AND table_name = ?";

    pub const INSERT_COLUMN: &str = r#"
        INSERT INTO cache_columns (owner, table_name, column_name, column_id, data_type,
                                   data_length, data_precision, data_scale, nullable, data_default)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

    pub const COLUMNS: &str = r#"
        SELECT owner, table_name, column_name, column_id, data_type, data_length,
               data_precision, data_scale, nullable, data_default
        FROM cache_columns
        WHERE owner = ? AND table_name = ?
        ORDER BY column_id, column_name
        "#;
}

pub mod indexes {
    pub const FIND_ID: &str = "SELECT id FROM cache_indexes WHERE owner = ? AND name = ?";

    pub const FIND: &str = r#"
        SELECT owner, name, table_owner, table_name, index_type, uniqueness, leaf_blocks,
               distinct_keys, clustering_factor, sample_size, last_analyzed, status,
               visibility, degree, tablespace_name
        FROM cache_indexes
        WHERE owner = ? AND name = ?
        "#;

    pub const INSERT: &str = r#"
        INSERT INTO cache_indexes (owner, name, table_owner, table_name, index_type, uniqueness,
                                   leaf_blocks, distinct_keys, clustering_factor, sample_size,
                                   last_analyzed, status, visibility, degree, tablespace_name)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

    pub const UPDATE: &str = r#"
        UPDATE cache_indexes
        SET table_owner = ?, table_name = ?, index_type = ?, uniqueness = ?, leaf_blocks = ?,
            distinct_keys = ?, clustering_factor = ?, sample_size = ?, last_analyzed = ?,
            status = ?, visibility = ?, degree = ?, tablespace_name = ?
        WHERE id = ?
        "#;

    pub const DELETE_COLUMNS: &str =
        "DELETE FROM cache_index_columns WHERE owner = ? AND index_name = ?";

    pub const INSERT_COLUMN: &str = r#"
        INSERT INTO cache_index_columns (owner, index_name, table_owner, table_name,
                                         column_name, position, descend)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#;

    pub const COLUMNS: &str = r#"
        SELECT owner, index_name, table_owner, table_name, column_name, position, descend
        FROM cache_index_columns
        WHERE owner = ? AND index_name = ?
        ORDER BY position
        "#;
}

pub mod sources {
    pub const FIND_ID: &str =
        "SELECT id FROM cache_sources WHERE owner = ? AND name = ? AND kind = ?";

    pub const FIND: &str = r#"
        SELECT owner, name, kind, spec_text, body_text
        FROM cache_sources
        WHERE owner = ? AND name = ? AND kind = ?
        "#;

    pub const INSERT: &str = r#"
        INSERT INTO cache_sources (owner, name, kind, spec_text, body_text)
        VALUES (?, ?, ?, ?, ?)
        "#;

    pub const UPDATE: &str = "UPDATE cache_sources SET spec_text = ?, body_text = ? WHERE id = ?";
}
