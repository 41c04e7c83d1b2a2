//! Per-kind FIFO of listed objects awaiting their detail fetch.

use crate::models::{CatalogObjectRef, ObjectKind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Unbounded channel with a non-blocking receive side.
///
/// The lister enqueues while the kind worker dequeues; neither needs to coordinate
/// with the other.
#[derive(Debug)]
pub struct KindQueue {
    kind: ObjectKind,
    tx: UnboundedSender<CatalogObjectRef>,
    rx: Mutex<UnboundedReceiver<CatalogObjectRef>>,
    len: AtomicUsize,
}

impl KindQueue {
    pub fn new(kind: ObjectKind) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            kind,
            tx,
            rx: Mutex::new(rx),
            len: AtomicUsize::new(0),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn enqueue(&self, item: CatalogObjectRef) {
        self.len.fetch_add(1, Ordering::AcqRel);
        // The receiver lives as long as the queue, so this cannot fail in practice.
        if self.tx.send(item).is_err() {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
    }

    pub fn enqueue_many(&self, items: impl IntoIterator<Item = CatalogObjectRef>) {
        for item in items {
            self.enqueue(item);
        }
    }

    /// Next item in arrival order, or `None` when the queue is currently empty.
    pub fn dequeue(&self) -> Option<CatalogObjectRef> {
        let mut rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
        let item = rx.try_recv().ok()?;
        self.len.fetch_sub(1, Ordering::AcqRel);
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
