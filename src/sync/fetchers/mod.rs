//! Detail fetchers, dispatched by [`DetailFamily`].
//!
//! Every flush runs in two phases: remote queries build complete snapshots first, then
//! a single [`UnitOfWork`](crate::store::UnitOfWork) upserts the listed objects and
//! their snapshots. The store transaction never waits on the remote.

mod indexes;
mod sources;
mod tables;

pub use indexes::{index_column_from_row, index_from_row};
pub use sources::normalize_source;
pub use tables::{column_from_row, table_from_row, view_from_row};

use crate::config::SyncOptions;
use crate::error::{CacheError, CacheResult};
use crate::models::{CatalogObjectRef, DetailFamily, ObjectKind};
use crate::remote::{CatalogSession, RemoteRow, Statement};
use crate::store::CacheStore;
use crate::sync::BatchHandler;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

pub struct DetailFetcher {
    session: Arc<dyn CatalogSession>,
    store: CacheStore,
    options: Arc<SyncOptions>,
}

impl DetailFetcher {
    pub fn new(
        session: Arc<dyn CatalogSession>,
        store: CacheStore,
        options: Arc<SyncOptions>,
    ) -> Self {
        Self {
            session,
            store,
            options,
        }
    }

    /// Run a statement with the prefetch hint configured for its shape.
    async fn fetch_all(&self, statement: Statement) -> CacheResult<Vec<RemoteRow>> {
        let prefetch = self.options.prefetch_for(statement.shape);
        let statement = statement.with_prefetch(prefetch);
        self.session.fetch_all(&statement).await
    }

    /// Run a per-object query. A remote failure skips that object only;
    /// connection-level failures still abort the batch.
    async fn fetch_for_object(
        &self,
        statement: Statement,
        object: &str,
    ) -> CacheResult<Option<Vec<RemoteRow>>> {
        let shape = statement.shape;
        match self.fetch_all(statement).await {
            Ok(rows) => Ok(Some(rows)),
            Err(e) if e.is_connection_level() => Err(e),
            Err(e) => {
                error!(
                    object,
                    shape = %shape,
                    error = %e,
                    component = "fetcher",
                    "Detail query failed, object skipped"
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl BatchHandler for DetailFetcher {
    async fn handle(&self, kind: ObjectKind, batch: &[CatalogObjectRef]) -> CacheResult<()> {
        match kind.family() {
            Some(DetailFamily::TableLike) => self.sync_tables(kind, batch).await,
            Some(DetailFamily::Index) => self.sync_indexes(batch).await,
            Some(DetailFamily::Source) => self.sync_sources(kind, batch).await,
            None => Err(CacheError::unrecognized_kind(kind.remote_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::ScriptedSession;

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path().join("c.sqlite")).await.unwrap();
        let session = Arc::new(ScriptedSession::new(|_| Ok(Vec::new())));
        let fetcher = DetailFetcher::new(session.clone(), store, Arc::new(SyncOptions::default()));

        let result = fetcher.handle(ObjectKind::Unknown, &[]).await;
        assert!(matches!(result, Err(CacheError::UnrecognizedKind { .. })));
        assert!(session.statements().is_empty());
    }
}
