//! Catalog lister: the single producer of a refresh cycle.

use crate::config::CatalogFilter;
use crate::error::{CacheError, CacheResult};
use crate::models::{CatalogObjectRef, ObjectKind};
use crate::remote::{CatalogSession, RemoteRow, queries};
use crate::sync::{KindQueue, SyncState};
use chrono::NaiveDateTime;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Rows seen by the listing query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingReport {
    pub listed: usize,
    pub enqueued: BTreeMap<ObjectKind, usize>,
    /// Rows whose type matched no tracked kind.
    pub unknown: usize,
    /// Rows of a kind that has no queue this cycle.
    pub skipped: usize,
}

impl ListingReport {
    pub fn total_enqueued(&self) -> usize {
        self.enqueued.values().sum()
    }
}

/// Resolve a listing row into an object reference.
pub fn object_from_row(row: &RemoteRow) -> CacheResult<CatalogObjectRef> {
    let type_name = row.required_str("OBJECT_TYPE")?;
    let kind = ObjectKind::from_remote(type_name);
    if !kind.is_tracked() {
        return Err(CacheError::unrecognized_kind(type_name));
    }
    Ok(CatalogObjectRef::new(
        row.required_str("OWNER")?,
        row.required_str("OBJECT_NAME")?,
        kind,
        row.date("LAST_DDL_TIME"),
    ))
}

pub struct CatalogLister {
    session: Arc<dyn CatalogSession>,
    filter: CatalogFilter,
    watermark: Option<NaiveDateTime>,
    prefetch: Option<u32>,
    queues: HashMap<ObjectKind, Arc<KindQueue>>,
    state: Arc<SyncState>,
    cancel: CancellationToken,
}

impl CatalogLister {
    pub fn new(
        session: Arc<dyn CatalogSession>,
        filter: CatalogFilter,
        watermark: Option<NaiveDateTime>,
        queues: HashMap<ObjectKind, Arc<KindQueue>>,
        state: Arc<SyncState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            filter,
            watermark,
            prefetch: None,
            queues,
            state,
            cancel,
        }
    }

    pub fn with_prefetch(mut self, prefetch: Option<u32>) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// List and enqueue. The producer flag is cleared however listing ends.
    pub async fn run(self) -> CacheResult<ListingReport> {
        let result = self.list().await;
        self.state.stop_producing();
        result
    }

    async fn list(&self) -> CacheResult<ListingReport> {
        let statement = queries::list_objects(
            &self.filter,
            self.watermark,
            self.session.placeholder_style(),
        )
        .with_prefetch(self.prefetch);

        info!(
            watermark = ?self.watermark,
            owners = self.filter.owners.len(),
            prefixes = self.filter.name_prefixes.len(),
            component = "lister",
            "Listing catalog objects"
        );

        let mut report = ListingReport::default();
        let mut rows = self.session.fetch(&statement);

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(listed = report.listed, component = "lister", "Listing stopped");
                    break;
                }
                next = rows.next() => next,
            };
            let Some(row) = next else { break };
            let row = row?;
            report.listed += 1;

            let object = match object_from_row(&row) {
                Ok(object) => object,
                Err(CacheError::UnrecognizedKind { type_name }) => {
                    warn!(
                        type_name = %type_name,
                        owner = row.str("OWNER").unwrap_or_default(),
                        name = row.str("OBJECT_NAME").unwrap_or_default(),
                        component = "lister",
                        "Unrecognized object kind, skipped"
                    );
                    report.unknown += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.queues.get(&object.kind) {
                Some(queue) => {
                    *report.enqueued.entry(object.kind).or_default() += 1;
                    queue.enqueue(object);
                }
                None => {
                    debug!(object = %object, component = "lister", "No worker for kind");
                    report.skipped += 1;
                }
            }
        }

        info!(
            listed = report.listed,
            enqueued = report.total_enqueued(),
            unknown = report.unknown,
            component = "lister",
            "Listing complete"
        );
        Ok(report)
    }
}
