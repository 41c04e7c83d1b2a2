//! Stored program source: packages, types, procedures, functions and triggers.

use super::DetailFetcher;
use crate::error::CacheResult;
use crate::models::{CacheSource, CatalogObjectRef, ObjectKind};
use crate::remote::{RemoteRow, queries};
use tracing::debug;

const HEADER: &str = "CREATE OR REPLACE ";

/// Prefix non-empty source with a `CREATE OR REPLACE` header.
///
/// Dictionary text starts at the unit keyword (`PACKAGE X AS ...`). Text that already
/// carries a header, in any letter case, gets the canonical spelling instead of a
/// second one. Blank text is treated as absent.
pub fn normalize_source(text: String) -> Option<String> {
    let body = text.trim_start();
    if body.trim_end().is_empty() {
        return None;
    }
    let body = match body.get(..HEADER.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(HEADER) => body[HEADER.len()..].trim_start(),
        _ => body,
    };
    Some(format!("{HEADER}{body}"))
}

/// Concatenate `ALL_SOURCE` line fragments. Lines keep their own terminators.
fn join_lines(rows: &[RemoteRow]) -> String {
    rows.iter()
        .filter_map(|row| row.string("TEXT"))
        .collect::<String>()
}

impl DetailFetcher {
    pub(super) async fn sync_sources(
        &self,
        kind: ObjectKind,
        batch: &[CatalogObjectRef],
    ) -> CacheResult<()> {
        let style = self.session.placeholder_style();

        let mut sources = Vec::with_capacity(batch.len());
        for object in batch {
            let qualified = object.qualified_name();

            let statement =
                queries::source_text(&object.owner, &object.name, kind.remote_name(), style);
            let Some(spec_rows) = self.fetch_for_object(statement, &qualified).await? else {
                continue;
            };

            let body_text = match kind.body_name() {
                Some(body_name) => {
                    let statement =
                        queries::source_text(&object.owner, &object.name, body_name, style);
                    match self.fetch_for_object(statement, &qualified).await? {
                        Some(rows) => normalize_source(join_lines(&rows)),
                        None => continue,
                    }
                }
                None => None,
            };

            sources.push(CacheSource {
                owner: object.owner.clone(),
                name: object.name.clone(),
                kind,
                spec_text: normalize_source(join_lines(&spec_rows)),
                body_text,
            });
        }

        let mut uow = self.store.begin().await?;
        for object in batch {
            uow.upsert_object(object).await?;
        }
        for source in &sources {
            uow.upsert_source(source).await?;
        }
        uow.commit().await?;

        debug!(
            kind = %kind,
            listed = batch.len(),
            stored = sources.len(),
            component = "fetcher",
            "Source batch stored"
        );
        Ok(())
    }
}
