//! Failure ledger: last known failure per request key
//!
//! The original request is kept next to each record so the client can
//! re-attempt it when connectivity returns.

use std::collections::HashMap;

use parking_lot::Mutex;
use tether_domain::{FailureRecord, Request, RequestKey};

use crate::classifier::Classification;

#[derive(Debug, Clone)]
struct LedgerEntry {
    record: FailureRecord,
    request: Request,
}

/// At most one live [`FailureRecord`] per `(method, url)`.
#[derive(Debug, Default)]
pub struct FailureLedger {
    entries: Mutex<HashMap<RequestKey, LedgerEntry>>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure, creating the record (`retry_count = 0`) or
    /// bumping the existing one and refreshing its details.
    pub fn record_failure(
        &self,
        request: &Request,
        classification: Classification,
        message: &str,
        status_code: Option<u16>,
        now_ms: u64,
    ) -> FailureRecord {
        let key = request.key();
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(key)
            .and_modify(|existing| {
                let record = &mut existing.record;
                record.retry_count = record.retry_count.saturating_add(1);
                record.message = message.to_string();
                record.status_code = status_code;
                record.timestamp_ms = now_ms;
                record.category = classification.category;
                record.retryable = classification.retryable;
                existing.request = request.clone();
            })
            .or_insert_with(|| LedgerEntry {
                record: FailureRecord {
                    url: request.url.clone(),
                    method: request.method,
                    message: message.to_string(),
                    status_code,
                    timestamp_ms: now_ms,
                    retry_count: 0,
                    category: classification.category,
                    retryable: classification.retryable,
                },
                request: request.clone(),
            });
        entry.record.clone()
    }

    /// Remove the record for `key`; returns whether one existed.
    pub fn clear(&self, key: &RequestKey) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn get(&self, key: &RequestKey) -> Option<FailureRecord> {
        self.entries.lock().get(key).map(|e| e.record.clone())
    }

    /// All records, oldest failure first.
    pub fn records(&self) -> Vec<FailureRecord> {
        let mut records: Vec<_> = self.entries.lock().values().map(|e| e.record.clone()).collect();
        records.sort_by(|a, b| {
            a.timestamp_ms.cmp(&b.timestamp_ms).then_with(|| a.key().cmp(&b.key()))
        });
        records
    }

    /// Requests worth re-attempting: retryable and `retry_count <= max_retries`.
    ///
    /// Returned with their current `retry_count` so the re-attempt spends
    /// only the remaining budget.
    pub fn reattempt_candidates(&self, max_retries: u32) -> Vec<(Request, u32)> {
        let entries = self.entries.lock();
        let mut candidates: Vec<_> = entries
            .values()
            .filter(|e| e.record.retryable && e.record.retry_count <= max_retries)
            .map(|e| (e.request.clone(), e.record.retry_count, e.record.timestamp_ms))
            .collect();
        candidates.sort_by_key(|(_, _, ts)| *ts);
        candidates.into_iter().map(|(request, count, _)| (request, count)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear_all(&self) {
        self.entries.lock().clear();
    }
}
