//! Catalog statements, one builder per query shape.
//!
//! Every statement reads the `ALL_*` dictionary views. Identifiers are quoted only
//! where the dictionary name contains `$`.

use crate::config::CatalogFilter;
use crate::models::CatalogObjectRef;
use crate::remote::{PlaceholderStyle, QueryShape, Statement, StatementBuilder};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Name patterns of system-internal objects that are never listed.
pub const EXCLUDED_NAME_PATTERNS: [&str; 3] = ["BIN$%", "SYS_PLSQL_%", "SYS_IL%"];

/// Escape character for name-prefix patterns. Not a backslash, which MySQL reads as a
/// string-literal escape.
const LIKE_ESCAPE: char = '!';

/// Remote database identifier, version and current time. `NOW` is on the remote's
/// clock, the one `LAST_DDL_TIME` is recorded in.
pub fn identity(style: PlaceholderStyle) -> Statement {
    let mut b = StatementBuilder::new(QueryShape::Identity, style);
    b.push(
        r#"SELECT d.DBID, i.VERSION, CURRENT_TIMESTAMP AS NOW FROM "V$DATABASE" d, "V$INSTANCE" i"#,
    );
    b.build()
}

/// `prefix%` with the pattern characters of `prefix` escaped by [`LIKE_ESCAPE`].
pub fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 2);
    for c in prefix.to_uppercase().chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// The single listing query issued by the lister.
///
/// With a watermark, an object is listed when it or its `BODY` companion changed at
/// or after the watermark, so a body-only change re-lists the specification too.
/// The comparison is inclusive because `LAST_DDL_TIME` only has whole seconds.
pub fn list_objects(
    filter: &CatalogFilter,
    watermark: Option<NaiveDateTime>,
    style: PlaceholderStyle,
) -> Statement {
    let mut b = StatementBuilder::new(QueryShape::ListObjects, style);
    b.push(
        "SELECT o.OWNER, o.OBJECT_NAME, o.OBJECT_TYPE, o.LAST_DDL_TIME \
         FROM ALL_OBJECTS o WHERE o.OBJECT_TYPE IN ",
    );
    b.bind_list(filter.included_kinds().iter().map(|k| k.remote_name()));

    for pattern in EXCLUDED_NAME_PATTERNS {
        b.push(" AND o.OBJECT_NAME NOT LIKE ").bind(pattern);
    }

    if !filter.owners.is_empty() {
        b.push(" AND o.OWNER IN ");
        b.bind_list(filter.owners.iter().map(|o| o.to_uppercase()));
    }

    if !filter.name_prefixes.is_empty() {
        b.push(" AND (");
        for (i, prefix) in filter.name_prefixes.iter().enumerate() {
            if i > 0 {
                b.push(" OR ");
            }
            b.push("o.OBJECT_NAME LIKE ")
                .bind(prefix_pattern(prefix))
                .push(&format!(" ESCAPE '{LIKE_ESCAPE}'"));
        }
        b.push(")");
    }

    if let Some(watermark) = watermark {
        b.push(" AND (o.LAST_DDL_TIME >= ").bind(watermark);

        // Spec/body pairs are bound rather than concatenated in SQL, since `||` is
        // logical OR in MySQL.
        let pairs: Vec<(&str, &str)> = filter
            .included_kinds()
            .iter()
            .filter_map(|k| k.body_name().map(|body| (k.remote_name(), body)))
            .collect();
        if !pairs.is_empty() {
            b.push(
                " OR EXISTS (SELECT 1 FROM ALL_OBJECTS b \
                 WHERE b.OWNER = o.OWNER AND b.OBJECT_NAME = o.OBJECT_NAME AND (",
            );
            for (i, (spec, body)) in pairs.into_iter().enumerate() {
                if i > 0 {
                    b.push(" OR ");
                }
                b.push("(o.OBJECT_TYPE = ")
                    .bind(spec)
                    .push(" AND b.OBJECT_TYPE = ")
                    .bind(body)
                    .push(")");
            }
            b.push(") AND b.LAST_DDL_TIME >= ").bind(watermark).push(")");
        }
        b.push(")");
    }

    b.push(" ORDER BY o.OWNER, o.OBJECT_TYPE, o.OBJECT_NAME");
    b.build()
}

/// Append `(OWNER = ? AND NAME IN (...)) OR (...)`, one group per owner.
fn push_owner_groups(
    b: &mut StatementBuilder,
    owner_col: &str,
    name_col: &str,
    refs: &[CatalogObjectRef],
) {
    let mut by_owner: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for r in refs {
        by_owner.entry(r.owner.as_str()).or_default().push(r.name.as_str());
    }

    if by_owner.is_empty() {
        b.push("1 = 0");
        return;
    }

    for (i, (owner, names)) in by_owner.into_iter().enumerate() {
        if i > 0 {
            b.push(" OR ");
        }
        b.push("(")
            .push(owner_col)
            .push(" = ")
            .bind(owner)
            .push(" AND ")
            .push(name_col)
            .push(" IN ");
        b.bind_list(names);
        b.push(")");
    }
}

/// Bulk table attributes for a batch.
pub fn table_detail(refs: &[CatalogObjectRef], style: PlaceholderStyle) -> Statement {
    let mut b = StatementBuilder::new(QueryShape::TableDetail, style);
    b.push(
        "SELECT t.OWNER, t.TABLE_NAME, t.NUM_ROWS, t.LAST_ANALYZED, t.PARTITIONED \
         FROM ALL_TABLES t WHERE ",
    );
    push_owner_groups(&mut b, "t.OWNER", "t.TABLE_NAME", refs);
    b.build()
}

/// Bulk view attributes, including the defining query, for a batch.
pub fn view_detail(refs: &[CatalogObjectRef], style: PlaceholderStyle) -> Statement {
    let mut b = StatementBuilder::new(QueryShape::ViewDetail, style);
    b.push(
        "SELECT v.OWNER, v.VIEW_NAME, v.TEXT, v.EDITIONING_VIEW, v.READ_ONLY \
         FROM ALL_VIEWS v WHERE ",
    );
    push_owner_groups(&mut b, "v.OWNER", "v.VIEW_NAME", refs);
    b.build()
}

/// Columns of one table or view.
pub fn column_detail(owner: &str, table: &str, style: PlaceholderStyle) -> Statement {
    let mut b = StatementBuilder::new(QueryShape::ColumnDetail, style);
    b.push(
        "SELECT COLUMN_NAME, COLUMN_ID, DATA_TYPE, DATA_LENGTH, DATA_PRECISION, DATA_SCALE, \
         NULLABLE, DATA_DEFAULT FROM ALL_TAB_COLUMNS WHERE OWNER = ",
    )
    .bind(owner)
    .push(" AND TABLE_NAME = ")
    .bind(table)
    .push(" ORDER BY COLUMN_ID");
    b.build()
}

/// Bulk index attributes and optimizer statistics for a batch.
pub fn index_detail(refs: &[CatalogObjectRef], style: PlaceholderStyle) -> Statement {
    let mut b = StatementBuilder::new(QueryShape::IndexDetail, style);
    b.push(
        "SELECT i.OWNER, i.INDEX_NAME, i.TABLE_OWNER, i.TABLE_NAME, i.INDEX_TYPE, i.UNIQUENESS, \
         i.LEAF_BLOCKS, i.DISTINCT_KEYS, i.CLUSTERING_FACTOR, i.SAMPLE_SIZE, i.LAST_ANALYZED, \
         i.STATUS, i.VISIBILITY, i.DEGREE, i.TABLESPACE_NAME FROM ALL_INDEXES i WHERE ",
    );
    push_owner_groups(&mut b, "i.OWNER", "i.INDEX_NAME", refs);
    b.build()
}

/// Key columns of one index, in key order.
pub fn index_column_detail(owner: &str, index: &str, style: PlaceholderStyle) -> Statement {
    let mut b = StatementBuilder::new(QueryShape::IndexColumnDetail, style);
    b.push(
        "SELECT TABLE_OWNER, TABLE_NAME, COLUMN_NAME, COLUMN_POSITION, DESCEND \
         FROM ALL_IND_COLUMNS WHERE INDEX_OWNER = ",
    )
    .bind(owner)
    .push(" AND INDEX_NAME = ")
    .bind(index)
    .push(" ORDER BY COLUMN_POSITION");
    b.build()
}

/// Source lines of one object part. `type_name` is the dictionary type, such as
/// `PACKAGE` or `PACKAGE BODY`.
pub fn source_text(owner: &str, name: &str, type_name: &str, style: PlaceholderStyle) -> Statement {
    let mut b = StatementBuilder::new(QueryShape::SourceText, style);
    b.push("SELECT TEXT FROM ALL_SOURCE WHERE OWNER = ")
        .bind(owner)
        .push(" AND NAME = ")
        .bind(name)
        .push(" AND TYPE = ")
        .bind(type_name)
        .push(" ORDER BY LINE");
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObjectKind;
    use crate::remote::QueryParam;

    fn table_ref(owner: &str, name: &str) -> CatalogObjectRef {
        CatalogObjectRef::new(owner, name, ObjectKind::Table, None)
    }

    #[test]
    fn test_list_objects_without_filters() {
        let filter = CatalogFilter::default();
        let stmt = list_objects(&filter, None, PlaceholderStyle::Question);

        assert_eq!(stmt.shape, QueryShape::ListObjects);
        assert!(!stmt.sql.contains("o.OWNER IN"));
        assert!(!stmt.sql.contains("EXISTS"));
        assert!(stmt.sql.ends_with("ORDER BY o.OWNER, o.OBJECT_TYPE, o.OBJECT_NAME"));
        // tracked kinds + exclusion patterns
        assert_eq!(stmt.params.len(), ObjectKind::TRACKED.len() + 3);
        assert!(stmt.params.contains(&QueryParam::from("BIN$%")));
    }

    #[test]
    fn test_list_objects_with_filters_and_watermark() {
        let filter = CatalogFilter {
            owners: vec!["hr".into(), "Sales".into()],
            name_prefixes: vec!["EMP".into(), "DEPT".into()],
            kinds: vec![ObjectKind::Table, ObjectKind::Package],
        };
        let wm = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let stmt = list_objects(&filter, Some(wm), PlaceholderStyle::Colon);

        assert!(stmt.sql.contains("o.OBJECT_TYPE IN (:1, :2)"));
        assert!(stmt.sql.contains("o.OWNER IN (:6, :7)"));
        assert!(stmt.sql.contains(
            "(o.OBJECT_NAME LIKE :8 ESCAPE '!' OR o.OBJECT_NAME LIKE :9 ESCAPE '!')"
        ));
        assert!(stmt.sql.contains("o.LAST_DDL_TIME >= :10"));
        assert!(stmt.sql.contains("(o.OBJECT_TYPE = :11 AND b.OBJECT_TYPE = :12)"));
        assert!(stmt.sql.contains("b.LAST_DDL_TIME >= :13"));

        assert_eq!(stmt.params[5], QueryParam::from("HR"));
        assert_eq!(stmt.params[6], QueryParam::from("SALES"));
        assert_eq!(stmt.params[7], QueryParam::from("EMP%"));
        assert_eq!(stmt.params[9], QueryParam::Timestamp(wm));
        assert_eq!(stmt.params[10], QueryParam::from("PACKAGE"));
        assert_eq!(stmt.params[11], QueryParam::from("PACKAGE BODY"));
        assert_eq!(stmt.params[12], QueryParam::Timestamp(wm));
        assert_eq!(stmt.params.len(), 13);
    }

    #[test]
    fn test_body_pairing_avoids_string_concatenation() {
        // MySQL treats `||` as logical OR.
        let wm = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let stmt = list_objects(&CatalogFilter::default(), Some(wm), PlaceholderStyle::Question);

        assert!(!stmt.sql.contains("||"));
        assert!(stmt.sql.contains(
            "AND ((o.OBJECT_TYPE = ? AND b.OBJECT_TYPE = ?) OR (o.OBJECT_TYPE = ? AND b.OBJECT_TYPE = ?))"
        ));
        assert!(stmt.params.contains(&QueryParam::from("PACKAGE BODY")));
        assert!(stmt.params.contains(&QueryParam::from("TYPE BODY")));
    }

    #[test]
    fn test_body_pairing_skipped_without_body_kinds() {
        let filter = CatalogFilter {
            kinds: vec![ObjectKind::Table, ObjectKind::Index],
            ..Default::default()
        };
        let wm = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let stmt = list_objects(&filter, Some(wm), PlaceholderStyle::Dollar);

        assert!(!stmt.sql.contains("EXISTS"));
        assert!(stmt.sql.contains("AND (o.LAST_DDL_TIME >= $6)"));
    }

    #[test]
    fn test_prefix_pattern_escapes_wildcards() {
        assert_eq!(prefix_pattern("emp"), "EMP%");
        assert_eq!(prefix_pattern("HR_"), "HR!_%");
        assert_eq!(prefix_pattern("a%b!"), "A!%B!!%");
    }

    #[test]
    fn test_detail_groups_by_owner() {
        let refs = vec![
            table_ref("HR", "EMPLOYEES"),
            table_ref("SALES", "ORDERS"),
            table_ref("HR", "DEPARTMENTS"),
        ];
        let stmt = table_detail(&refs, PlaceholderStyle::Question);

        assert!(stmt.sql.contains(
            "(t.OWNER = ? AND t.TABLE_NAME IN (?, ?)) OR (t.OWNER = ? AND t.TABLE_NAME IN (?))"
        ));
        assert_eq!(
            stmt.params,
            vec![
                QueryParam::from("HR"),
                QueryParam::from("EMPLOYEES"),
                QueryParam::from("DEPARTMENTS"),
                QueryParam::from("SALES"),
                QueryParam::from("ORDERS"),
            ]
        );
    }

    #[test]
    fn test_detail_with_empty_batch_matches_nothing() {
        let stmt = index_detail(&[], PlaceholderStyle::Dollar);
        assert!(stmt.sql.ends_with("WHERE 1 = 0"));
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_per_object_statements() {
        let stmt = column_detail("HR", "EMPLOYEES", PlaceholderStyle::Dollar);
        assert!(stmt.sql.contains("OWNER = $1 AND TABLE_NAME = $2"));
        assert!(stmt.sql.ends_with("ORDER BY COLUMN_ID"));

        let stmt = source_text("HR", "PKG", "PACKAGE BODY", PlaceholderStyle::Question);
        assert_eq!(stmt.shape, QueryShape::SourceText);
        assert_eq!(stmt.params[2], QueryParam::from("PACKAGE BODY"));
        assert!(stmt.sql.ends_with("ORDER BY LINE"));

        let stmt = index_column_detail("HR", "EMP_PK", PlaceholderStyle::Question);
        assert!(stmt.sql.contains("INDEX_OWNER = ?"));
    }

    #[test]
    fn test_identity_quotes_dollar_views() {
        let stmt = identity(PlaceholderStyle::Question);
        assert!(stmt.sql.contains(r#""V$DATABASE""#));
        assert!(stmt.sql.contains("CURRENT_TIMESTAMP AS NOW"));
        assert!(stmt.params.is_empty());
    }
}
