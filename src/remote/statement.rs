//! Parameterized statements sent to the remote catalog.
//!
//! Values are never spliced into SQL text. `StatementBuilder` emits one bind
//! placeholder per bound value in the placeholder style of the target session.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A positional parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Bool(bool),
    /// Stored as i64 for maximum range
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(NaiveDateTime),
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<NaiveDateTime> for QueryParam {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

/// Names each query the engine issues. Selects the prefetch hint and tags errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryShape {
    Identity,
    ListObjects,
    TableDetail,
    ViewDetail,
    ColumnDetail,
    IndexDetail,
    IndexColumnDetail,
    SourceText,
}

impl QueryShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::ListObjects => "list_objects",
            Self::TableDetail => "table_detail",
            Self::ViewDetail => "view_detail",
            Self::ColumnDetail => "column_detail",
            Self::IndexDetail => "index_detail",
            Self::IndexColumnDetail => "index_column_detail",
            Self::SourceText => "source_text",
        }
    }
}

impl std::fmt::Display for QueryShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bind placeholder syntax of a remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    /// `?` (MySQL, SQLite)
    #[default]
    Question,
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
    /// `:1`, `:2`, ... (Oracle)
    Colon,
}

impl PlaceholderStyle {
    /// Placeholder for the 1-based parameter position `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Question => "?".to_string(),
            Self::Dollar => format!("${n}"),
            Self::Colon => format!(":{n}"),
        }
    }
}

/// A statement ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub shape: QueryShape,
    pub sql: String,
    pub params: Vec<QueryParam>,
    /// Requested rows per round trip. `None` means no preference.
    ///
    /// Advisory only: the sqlx drivers stream rows with their own buffering, so
    /// `SqlxCatalogSource` records the hint in its query log and fetches the same
    /// way regardless.
    pub prefetch: Option<u32>,
}

impl Statement {
    pub fn with_prefetch(mut self, prefetch: Option<u32>) -> Self {
        self.prefetch = prefetch;
        self
    }
}

/// Incremental SQL builder that tracks bind positions.
#[derive(Debug)]
pub struct StatementBuilder {
    shape: QueryShape,
    style: PlaceholderStyle,
    sql: String,
    params: Vec<QueryParam>,
}

impl StatementBuilder {
    pub fn new(shape: QueryShape, style: PlaceholderStyle) -> Self {
        Self {
            shape,
            style,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Bind a value and append its placeholder.
    pub fn bind(&mut self, param: impl Into<QueryParam>) -> &mut Self {
        self.params.push(param.into());
        let placeholder = self.style.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Bind every value and append `(p1, p2, ...)`.
    ///
    /// An empty list renders `(NULL)`, which matches nothing in an `IN` predicate.
    pub fn bind_list<I, P>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<QueryParam>,
    {
        self.sql.push('(');
        let mut first = true;
        for value in values {
            if !first {
                self.sql.push_str(", ");
            }
            first = false;
            self.bind(value);
        }
        if first {
            self.sql.push_str("NULL");
        }
        self.sql.push(')');
        self
    }

    pub fn build(self) -> Statement {
        Statement {
            shape: self.shape,
            sql: self.sql,
            params: self.params,
            prefetch: None,
        }
    }
}
