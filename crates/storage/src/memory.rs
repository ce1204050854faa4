//! In-process report store for demo runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::record::{ReportRecord, ReportUpdate};
use crate::traits::ReportStore;

/// A `ReportStore` backed by a `HashMap`.
///
/// Mirrors the remote backend's rules: updates against a missing id fail with
/// `NotFound`, and each update is applied all-or-nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ReportRecord>>,
    unavailable: AtomicBool,
    update_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a `pending` record, as the upstream collaborator would.
    pub fn insert_pending(&self, report_id: &str) {
        self.insert(ReportRecord::pending(report_id));
    }

    pub fn insert(&self, record: ReportRecord) {
        self.lock().insert(record.report_id.clone(), record);
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `update` calls received, including failed ones.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ReportRecord>> {
        // A poisoned map still holds whole records: every mutation below
        // completes before the guard is released.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn update(&self, report_id: &str, update: ReportUpdate) -> Result<(), StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut records = self.lock();
        let current = records
            .get(report_id)
            .ok_or_else(|| StoreError::NotFound {
                report_id: report_id.to_string(),
            })?;

        let mut next = current.clone();
        next.apply(&update, OffsetDateTime::now_utc())?;
        records.insert(report_id.to_string(), next);
        Ok(())
    }

    async fn get(&self, report_id: &str) -> Result<ReportRecord, StoreError> {
        self.check_available()?;
        self.lock()
            .get(report_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                report_id: report_id.to_string(),
            })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
