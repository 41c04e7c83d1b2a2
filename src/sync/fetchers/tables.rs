//! Tables and views.

use super::DetailFetcher;
use crate::error::CacheResult;
use crate::models::{CacheColumn, CacheTableLike, CatalogObjectRef, ObjectKind, TableSnapshot};
use crate::remote::{RemoteRow, queries};
use tracing::debug;

pub fn table_from_row(row: &RemoteRow) -> CacheResult<CacheTableLike> {
    Ok(CacheTableLike {
        owner: row.required_str("OWNER")?.to_string(),
        name: row.required_str("TABLE_NAME")?.to_string(),
        is_view: false,
        num_rows: row.int("NUM_ROWS"),
        last_analyzed: row.date("LAST_ANALYZED"),
        partitioned: row.flag("PARTITIONED"),
        ..Default::default()
    })
}

pub fn view_from_row(row: &RemoteRow) -> CacheResult<CacheTableLike> {
    Ok(CacheTableLike {
        owner: row.required_str("OWNER")?.to_string(),
        name: row.required_str("VIEW_NAME")?.to_string(),
        is_view: true,
        is_editioning: row.flag("EDITIONING_VIEW"),
        is_read_only: row.flag("READ_ONLY"),
        sql_text: row.string("TEXT"),
        ..Default::default()
    })
}

pub fn column_from_row(owner: &str, table: &str, row: &RemoteRow) -> CacheResult<CacheColumn> {
    Ok(CacheColumn {
        owner: owner.to_string(),
        table_name: table.to_string(),
        column_name: row.required_str("COLUMN_NAME")?.to_string(),
        column_id: row.int("COLUMN_ID"),
        data_type: row.string("DATA_TYPE"),
        data_length: row.int("DATA_LENGTH"),
        data_precision: row.int("DATA_PRECISION"),
        data_scale: row.int("DATA_SCALE"),
        nullable: row.flag("NULLABLE"),
        data_default: row.string("DATA_DEFAULT").map(|d| d.trim().to_string()),
    })
}

impl DetailFetcher {
    pub(super) async fn sync_tables(
        &self,
        kind: ObjectKind,
        batch: &[CatalogObjectRef],
    ) -> CacheResult<()> {
        let style = self.session.placeholder_style();
        let is_view = kind == ObjectKind::View;
        let statement = if is_view {
            queries::view_detail(batch, style)
        } else {
            queries::table_detail(batch, style)
        };

        let rows = self.fetch_all(statement).await?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            let table = if is_view {
                view_from_row(row)?
            } else {
                table_from_row(row)?
            };

            let statement = queries::column_detail(&table.owner, &table.name, style);
            let qualified = format!("{}.{}", table.owner, table.name);
            let Some(column_rows) = self.fetch_for_object(statement, &qualified).await? else {
                continue;
            };
            let columns = column_rows
                .iter()
                .map(|r| column_from_row(&table.owner, &table.name, r))
                .collect::<CacheResult<Vec<_>>>()?;

            snapshots.push(TableSnapshot { table, columns });
        }

        let mut uow = self.store.begin().await?;
        for object in batch {
            uow.upsert_object(object).await?;
        }
        for snapshot in &snapshots {
            uow.upsert_table(snapshot).await?;
        }
        uow.commit().await?;

        debug!(
            kind = %kind,
            listed = batch.len(),
            stored = snapshots.len(),
            component = "fetcher",
            "Table-like batch stored"
        );
        Ok(())
    }
}
