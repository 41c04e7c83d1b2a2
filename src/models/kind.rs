//! Type registry for trackable catalog object kinds.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Catalog object kinds tracked by the cache.
///
/// The mapping from a remote `OBJECT_TYPE` string is total: anything that is not a
/// tracked kind resolves to [`ObjectKind::Unknown`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    View,
    Index,
    Package,
    Type,
    Procedure,
    Function,
    Trigger,
    #[value(skip)]
    Unknown,
}

/// Which detail fetcher handles a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailFamily {
    /// Tables and views: attributes plus a column set.
    TableLike,
    /// Indexes: optimizer statistics plus an index column set.
    Index,
    /// Stored source: specification text and optional body text.
    Source,
}

impl ObjectKind {
    /// Every kind that gets a worker, in listing order.
    pub const TRACKED: [ObjectKind; 8] = [
        ObjectKind::Table,
        ObjectKind::View,
        ObjectKind::Index,
        ObjectKind::Package,
        ObjectKind::Type,
        ObjectKind::Procedure,
        ObjectKind::Function,
        ObjectKind::Trigger,
    ];

    /// Resolve a remote `OBJECT_TYPE` string.
    pub fn from_remote(type_name: &str) -> Self {
        match type_name.trim().to_ascii_uppercase().as_str() {
            "TABLE" => Self::Table,
            "VIEW" => Self::View,
            "INDEX" => Self::Index,
            "PACKAGE" => Self::Package,
            "TYPE" => Self::Type,
            "PROCEDURE" => Self::Procedure,
            "FUNCTION" => Self::Function,
            "TRIGGER" => Self::Trigger,
            _ => Self::Unknown,
        }
    }

    /// Dictionary spelling of this kind.
    pub fn remote_name(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::Index => "INDEX",
            Self::Package => "PACKAGE",
            Self::Type => "TYPE",
            Self::Procedure => "PROCEDURE",
            Self::Function => "FUNCTION",
            Self::Trigger => "TRIGGER",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Dictionary spelling of the paired body object, for kinds that have one.
    pub fn body_name(&self) -> Option<&'static str> {
        match self {
            Self::Package => Some("PACKAGE BODY"),
            Self::Type => Some("TYPE BODY"),
            _ => None,
        }
    }

    pub fn family(&self) -> Option<DetailFamily> {
        match self {
            Self::Table | Self::View => Some(DetailFamily::TableLike),
            Self::Index => Some(DetailFamily::Index),
            Self::Package | Self::Type | Self::Procedure | Self::Function | Self::Trigger => {
                Some(DetailFamily::Source)
            }
            Self::Unknown => None,
        }
    }

    pub fn is_tracked(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Lower-case name used in logs, the cache store and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::View => "view",
            Self::Index => "index",
            Self::Package => "package",
            Self::Type => "type",
            Self::Procedure => "procedure",
            Self::Function => "function",
            Self::Trigger => "trigger",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the lower-case store spelling back into a kind.
    pub fn parse(s: &str) -> Self {
        Self::from_remote(s)
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
