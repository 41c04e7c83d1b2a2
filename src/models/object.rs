//! Catalog object descriptors passed from the lister to the kind workers.

use crate::models::ObjectKind;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A listed catalog object awaiting its detail fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogObjectRef {
    pub owner: String,
    pub name: String,
    pub kind: ObjectKind,
    /// Remote `LAST_DDL_TIME`.
    pub last_modified: Option<NaiveDateTime>,
}

impl CatalogObjectRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        kind: ObjectKind,
        last_modified: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            kind,
            last_modified,
        }
    }

    /// `OWNER.NAME`, as shown in logs.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}

impl std::fmt::Display for CatalogObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}.{}", self.kind, self.owner, self.name)
    }
}
