//! Cache synchronization engine.
//!
//! One refresh cycle runs a single [`CatalogLister`] and one [`KindWorker`] per included
//! kind as a task group:
//!
//! ```text
//! RefreshCoordinator -> CatalogLister -> KindQueue (per kind) -> KindWorker
//!                                                               -> DetailFetcher -> CacheStore
//! ```

pub mod coordinator;
pub mod fetchers;
pub mod lister;
pub mod queue;
pub mod state;
pub mod worker;

pub use coordinator::{
    RefreshCoordinator, RefreshMode, RefreshOutcome, RefreshPhase, RefreshStatus, RefreshSummary,
};
pub use fetchers::DetailFetcher;
pub use lister::{CatalogLister, ListingReport};
pub use queue::KindQueue;
pub use state::SyncState;
pub use worker::{BatchHandler, KindWorker, WorkerConfig, WorkerReport};
