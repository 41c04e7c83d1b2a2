//! Error types for the catalog cache.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Variants are grouped by how far a failure propagates: connection-level errors abort
//! the refresh cycle, query and save errors stay contained at the batch that raised them.

use crate::remote::QueryShape;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Not connected: {message}")]
    NotConnected { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Remote query failed{}: {message}", shape_suffix(.shape))]
    RemoteQuery {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        shape: Option<QueryShape>,
    },

    #[error("Cache save failed: {message}")]
    Save { message: String },

    #[error("Unrecognized object kind: {type_name}")]
    UnrecognizedKind { type_name: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CacheError {
    /// Create a not-connected error.
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::NotConnected {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a remote query error with optional SQL state.
    pub fn remote_query(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::RemoteQuery {
            message: message.into(),
            sql_state,
            shape: None,
        }
    }

    /// Create a save error.
    pub fn save(message: impl Into<String>) -> Self {
        Self::Save {
            message: message.into(),
        }
    }

    /// Create an unrecognized kind error.
    pub fn unrecognized_kind(type_name: impl Into<String>) -> Self {
        Self::UnrecognizedKind {
            type_name: type_name.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Tag a remote query error with the shape of the statement that raised it.
    pub fn with_shape(self, shape: QueryShape) -> Self {
        match self {
            Self::RemoteQuery {
                message, sql_state, ..
            } => Self::RemoteQuery {
                message,
                sql_state,
                shape: Some(shape),
            },
            other => other,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Errors that abort the whole refresh cycle rather than a single batch.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, Self::NotConnected { .. } | Self::Connection { .. })
    }
}

fn shape_suffix(shape: &Option<QueryShape>) -> String {
    shape.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Convert sqlx errors to CacheError.
///
/// Errors raised by the local store are converted with [`CacheError::from_store`] instead,
/// so a failed commit never masquerades as a remote failure.
impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => CacheError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                CacheError::remote_query(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => CacheError::remote_query("No rows returned", None),
            sqlx::Error::PoolTimedOut => CacheError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => CacheError::not_connected("Connection pool is closed"),
            sqlx::Error::Io(io_err) => CacheError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => CacheError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => CacheError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                CacheError::remote_query(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => CacheError::remote_query(
                format!("Failed to decode column {}: {}", index, source),
                None,
            ),
            sqlx::Error::Decode(source) => {
                CacheError::remote_query(format!("Decode error: {}", source), None)
            }
            sqlx::Error::WorkerCrashed => CacheError::internal("Database worker crashed"),
            _ => CacheError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl CacheError {
    /// Convert an error raised while writing to the local cache store.
    pub fn from_store(err: sqlx::Error) -> Self {
        CacheError::save(err.to_string())
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
