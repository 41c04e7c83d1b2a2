//! Indexes and their key columns.

use super::DetailFetcher;
use crate::error::{CacheError, CacheResult};
use crate::models::{CacheIndex, CacheIndexColumn, CatalogObjectRef, IndexSnapshot};
use crate::remote::{RemoteRow, queries};
use tracing::debug;

pub fn index_from_row(row: &RemoteRow) -> CacheResult<CacheIndex> {
    Ok(CacheIndex {
        owner: row.required_str("OWNER")?.to_string(),
        name: row.required_str("INDEX_NAME")?.to_string(),
        table_owner: row.string("TABLE_OWNER"),
        table_name: row.string("TABLE_NAME"),
        index_type: row.string("INDEX_TYPE"),
        uniqueness: row.string("UNIQUENESS"),
        leaf_blocks: row.int("LEAF_BLOCKS"),
        distinct_keys: row.int("DISTINCT_KEYS"),
        clustering_factor: row.int("CLUSTERING_FACTOR"),
        sample_size: row.int("SAMPLE_SIZE"),
        last_analyzed: row.date("LAST_ANALYZED"),
        status: row.string("STATUS"),
        visibility: row.string("VISIBILITY"),
        // VARCHAR2 in the dictionary: a number or DEFAULT
        degree: row.string("DEGREE").map(|d| d.trim().to_string()),
        tablespace_name: row.string("TABLESPACE_NAME"),
    })
}

pub fn index_column_from_row(
    owner: &str,
    index: &str,
    row: &RemoteRow,
) -> CacheResult<CacheIndexColumn> {
    let position = row.int("COLUMN_POSITION").ok_or_else(|| {
        CacheError::remote_query(format!("Index {owner}.{index} has a column without position"), None)
    })?;
    Ok(CacheIndexColumn {
        owner: owner.to_string(),
        index_name: index.to_string(),
        table_owner: row.string("TABLE_OWNER"),
        table_name: row.string("TABLE_NAME"),
        column_name: row.required_str("COLUMN_NAME")?.to_string(),
        position,
        descend: row.string("DESCEND"),
    })
}

impl DetailFetcher {
    pub(super) async fn sync_indexes(&self, batch: &[CatalogObjectRef]) -> CacheResult<()> {
        let style = self.session.placeholder_style();
        let rows = self.fetch_all(queries::index_detail(batch, style)).await?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            let index = index_from_row(row)?;

            let statement = queries::index_column_detail(&index.owner, &index.name, style);
            let qualified = format!("{}.{}", index.owner, index.name);
            let Some(column_rows) = self.fetch_for_object(statement, &qualified).await? else {
                continue;
            };
            let columns = column_rows
                .iter()
                .map(|r| index_column_from_row(&index.owner, &index.name, r))
                .collect::<CacheResult<Vec<_>>>()?;

            snapshots.push(IndexSnapshot { index, columns });
        }

        let mut uow = self.store.begin().await?;
        for object in batch {
            uow.upsert_object(object).await?;
        }
        for snapshot in &snapshots {
            uow.upsert_index(snapshot).await?;
        }
        uow.commit().await?;

        debug!(
            listed = batch.len(),
            stored = snapshots.len(),
            component = "fetcher",
            "Index batch stored"
        );
        Ok(())
    }
}
