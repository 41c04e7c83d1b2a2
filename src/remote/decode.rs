//! Decoding of driver rows into [`RemoteRow`].
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! SQLite reports the storage class of each value, so its decoder classifies the
//! value rather than the declared column type.

use crate::remote::{RemoteRow, RemoteValue};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Temporal,
    Binary,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Temporal first: "interval" and "datetime" would otherwise hit the checks below
    if lower.contains("timestamp") || lower.contains("date") || lower == "time" {
        return TypeCategory::Temporal;
    }

    // Decimal/Numeric - check before float as it overlaps with "numeric"
    if lower.contains("decimal") || lower.contains("numeric") || lower == "number" {
        return TypeCategory::Decimal;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if (lower.contains("int") && lower != "interval" && lower != "point")
        || lower.contains("serial")
    {
        return TypeCategory::Integer;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" || lower == "clob" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl RawDecimal {
    /// Integers stay integers; anything with a fraction becomes a double.
    fn into_value(self) -> RemoteValue {
        let s = self.0.trim();
        if let Ok(v) = s.parse::<i64>() {
            return RemoteValue::Int(v);
        }
        match s.parse::<f64>() {
            Ok(v) => RemoteValue::Double(v),
            Err(_) => RemoteValue::Text(self.0),
        }
    }
}

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary payloads are carried as text: UTF-8 when valid, base64 otherwise.
fn binary_value(bytes: &[u8]) -> RemoteValue {
    match std::str::from_utf8(bytes) {
        Ok(s) => RemoteValue::Text(s.to_string()),
        Err(_) => RemoteValue::Text(STANDARD.encode(bytes)),
    }
}

// =============================================================================
// Row Conversion
// =============================================================================

/// Trait for converting driver rows into name-keyed remote rows.
pub trait IntoRemoteRow {
    fn to_remote_row(&self) -> RemoteRow;
}

impl IntoRemoteRow for MySqlRow {
    fn to_remote_row(&self) -> RemoteRow {
        let mut out = RemoteRow::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            let category = categorize_type(col.type_info().name());
            out.push(col.name(), mysql::decode_column(self, idx, category));
        }
        out
    }
}

impl IntoRemoteRow for PgRow {
    fn to_remote_row(&self) -> RemoteRow {
        let mut out = RemoteRow::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            let category = categorize_type(col.type_info().name());
            out.push(col.name(), postgres::decode_column(self, idx, category));
        }
        out
    }
}

impl IntoRemoteRow for SqliteRow {
    fn to_remote_row(&self) -> RemoteRow {
        let mut out = RemoteRow::with_capacity(self.columns().len());
        for (idx, col) in self.columns().iter().enumerate() {
            out.push(col.name(), sqlite::decode_column(self, idx));
        }
        out
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> RemoteValue {
        if let Ok(raw) = row.try_get_raw(idx) {
            if raw.is_null() {
                return RemoteValue::Null;
            }
        }
        match category {
            TypeCategory::Decimal => row
                .try_get::<RawDecimal, _>(idx)
                .map(RawDecimal::into_value)
                .unwrap_or(RemoteValue::Null),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row
                .try_get::<bool, _>(idx)
                .map(|v| RemoteValue::Int(v as i64))
                .unwrap_or(RemoteValue::Null),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Binary => row
                .try_get::<Vec<u8>, _>(idx)
                .map(|v| binary_value(&v))
                .unwrap_or(RemoteValue::Null),
            _ => row
                .try_get::<String, _>(idx)
                .map(RemoteValue::Text)
                .unwrap_or(RemoteValue::Null),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> RemoteValue {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return RemoteValue::Int(v);
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return RemoteValue::Int(v.into());
        }
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            return RemoteValue::Int(v as i64);
        }
        if let Ok(v) = row.try_get::<u32, _>(idx) {
            return RemoteValue::Int(v.into());
        }
        RemoteValue::Null
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> RemoteValue {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return RemoteValue::Double(v);
        }
        if let Ok(v) = row.try_get::<f32, _>(idx) {
            return RemoteValue::Double(v as f64);
        }
        RemoteValue::Null
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> RemoteValue {
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return RemoteValue::Timestamp(v);
        }
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return RemoteValue::Timestamp(v.naive_utc());
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return v
                .and_hms_opt(0, 0, 0)
                .map(RemoteValue::Timestamp)
                .unwrap_or(RemoteValue::Null);
        }
        row.try_get::<String, _>(idx)
            .map(RemoteValue::Text)
            .unwrap_or(RemoteValue::Null)
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> RemoteValue {
        if let Ok(raw) = row.try_get_raw(idx) {
            if raw.is_null() {
                return RemoteValue::Null;
            }
        }
        match category {
            TypeCategory::Decimal => row
                .try_get::<RawDecimal, _>(idx)
                .map(RawDecimal::into_value)
                .unwrap_or(RemoteValue::Null),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row
                .try_get::<bool, _>(idx)
                .map(|v| RemoteValue::Int(v as i64))
                .unwrap_or(RemoteValue::Null),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Binary => row
                .try_get::<Vec<u8>, _>(idx)
                .map(|v| binary_value(&v))
                .unwrap_or(RemoteValue::Null),
            _ => row
                .try_get::<String, _>(idx)
                .map(RemoteValue::Text)
                .unwrap_or(RemoteValue::Null),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> RemoteValue {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return RemoteValue::Int(v);
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return RemoteValue::Int(v.into());
        }
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return RemoteValue::Int(v.into());
        }
        RemoteValue::Null
    }

    fn decode_float(row: &PgRow, idx: usize) -> RemoteValue {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return RemoteValue::Double(v);
        }
        if let Ok(v) = row.try_get::<f32, _>(idx) {
            return RemoteValue::Double(v as f64);
        }
        RemoteValue::Null
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> RemoteValue {
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return RemoteValue::Timestamp(v);
        }
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return RemoteValue::Timestamp(v.naive_utc());
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return v
                .and_hms_opt(0, 0, 0)
                .map(RemoteValue::Timestamp)
                .unwrap_or(RemoteValue::Null);
        }
        RemoteValue::Null
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize) -> RemoteValue {
        let storage_class = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return RemoteValue::Null,
            Ok(raw) => raw.type_info().name().to_string(),
            Err(_) => return RemoteValue::Null,
        };
        match categorize_type(&storage_class) {
            TypeCategory::Integer | TypeCategory::Boolean => row
                .try_get::<i64, _>(idx)
                .map(RemoteValue::Int)
                .unwrap_or(RemoteValue::Null),
            TypeCategory::Float | TypeCategory::Decimal => row
                .try_get::<f64, _>(idx)
                .map(RemoteValue::Double)
                .unwrap_or(RemoteValue::Null),
            TypeCategory::Binary => row
                .try_get::<Vec<u8>, _>(idx)
                .map(|v| binary_value(&v))
                .unwrap_or(RemoteValue::Null),
            _ => row
                .try_get::<String, _>(idx)
                .map(RemoteValue::Text)
                .unwrap_or(RemoteValue::Null),
        }
    }
}
