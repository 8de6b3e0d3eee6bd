//! Deduplication of extracted records across the whole run.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{BusinessRecord, Identifier};

/// Set of identifiers seen so far. First occurrence wins.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<Identifier>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and registers the record's identifier if it is new.
    pub fn should_keep(&mut self, record: &BusinessRecord) -> bool {
        self.seen.insert(record.identifier())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    dedup: Deduplicator,
    records: Vec<BusinessRecord>,
}

/// Result collection shared by every worker of a run.
///
/// The identifier check and the append happen under one lock, so concurrent
/// workers can never both insert the same business.
#[derive(Debug, Clone, Default)]
pub struct ResultCollection {
    inner: Arc<Mutex<Inner>>,
}

impl ResultCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` unless its identifier was already collected.
    pub async fn offer(&self, record: BusinessRecord) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.dedup.should_keep(&record) {
            return false;
        }
        inner.records.push(record);
        true
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.records.is_empty()
    }

    /// Records in insertion order.
    pub async fn snapshot(&self) -> Vec<BusinessRecord> {
        self.inner.lock().await.records.clone()
    }
}
