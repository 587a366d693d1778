//! Submission tracking
//!
//! Every ledger attempt made by this process, indexed by subject and by
//! content hash. Records move PENDING -> terminal once and are never reused;
//! a caller resubmitting a nonce gets a new record for the new attempt.
//! Settled records are pruned after a retention period; PENDING ones stay
//! until the ledger call settles them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use super::record::{SubmissionRecord, SubmissionStatus};
use super::replay::ContentHash;
use crate::error::{SubmissionFailure, TrackerError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub timed_out: usize,
}

#[derive(Debug, Default)]
pub struct SubmissionTracker {
    /// Records by submission id
    records: HashMap<Uuid, SubmissionRecord>,

    /// Index: subject_id -> submission ids, oldest first
    subject_index: HashMap<String, Vec<Uuid>>,

    /// Index: content_hash -> submission ids
    hash_index: HashMap<ContentHash, Vec<Uuid>>,
}

impl SubmissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new PENDING record
    pub fn record_pending(&mut self, record: SubmissionRecord) -> Uuid {
        let id = record.id;
        let subject_id = record.attestation.subject_id.clone();

        if self.hash_index.contains_key(&record.content_hash) {
            debug!(
                subject_id = %subject_id,
                content_hash = %record.content_hash,
                "Content hash seen before in this process, ledger will decide"
            );
        }

        self.subject_index
            .entry(subject_id)
            .or_default()
            .push(id);
        self.hash_index
            .entry(record.content_hash)
            .or_default()
            .push(id);
        self.records.insert(id, record);
        id
    }

    pub fn confirm(&mut self, id: &Uuid, tx_id: String) -> Result<SubmissionRecord, TrackerError> {
        let record = self.get_mut(id)?;
        record.confirm(tx_id)?;
        Ok(record.clone())
    }

    pub fn fail(
        &mut self,
        id: &Uuid,
        failure: SubmissionFailure,
    ) -> Result<SubmissionRecord, TrackerError> {
        let record = self.get_mut(id)?;
        if let Err(e) = record.fail(failure) {
            warn!(submission = %id, error = %e, "Ignoring second settlement");
            return Err(e);
        }
        Ok(record.clone())
    }

    pub fn get(&self, id: &Uuid) -> Option<&SubmissionRecord> {
        self.records.get(id)
    }

    /// All attempts for a subject, oldest first
    pub fn for_subject(&self, subject_id: &str) -> Vec<&SubmissionRecord> {
        self.subject_index
            .get(subject_id)
            .map(|ids| ids.iter().filter_map(|id| self.records.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn latest_confirmed(&self, subject_id: &str) -> Option<&SubmissionRecord> {
        self.for_subject(subject_id)
            .into_iter()
            .rev()
            .find(|r| r.status == SubmissionStatus::Confirmed)
    }

    pub fn stats(&self) -> TrackerStats {
        let mut stats = TrackerStats {
            total: self.records.len(),
            ..Default::default()
        };
        for record in self.records.values() {
            match record.status {
                SubmissionStatus::Pending => stats.pending += 1,
                SubmissionStatus::Confirmed => stats.confirmed += 1,
                SubmissionStatus::Rejected => stats.rejected += 1,
                SubmissionStatus::TimedOut => stats.timed_out += 1,
            }
        }
        stats
    }

    /// Drop settled records older than `max_age`
    pub fn cleanup_old_records(&mut self, max_age: chrono::Duration) -> usize {
        match Utc::now().checked_sub_signed(max_age) {
            Some(cutoff) => self.cleanup_settled_before(cutoff),
            None => 0,
        }
    }

    /// Drop records settled at or before `cutoff`. PENDING records are never
    /// removed.
    pub fn cleanup_settled_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let to_remove: Vec<Uuid> = self
            .records
            .values()
            .filter(|r| r.settled_at.is_some_and(|settled| settled <= cutoff))
            .map(|r| r.id)
            .collect();

        for id in &to_remove {
            let Some(record) = self.records.remove(id) else {
                continue;
            };
            let subject_id = &record.attestation.subject_id;
            if let Some(ids) = self.subject_index.get_mut(subject_id) {
                ids.retain(|i| i != id);
                if ids.is_empty() {
                    self.subject_index.remove(subject_id);
                }
            }
            if let Some(ids) = self.hash_index.get_mut(&record.content_hash) {
                ids.retain(|i| i != id);
                if ids.is_empty() {
                    self.hash_index.remove(&record.content_hash);
                }
            }
        }

        let count = to_remove.len();
        if count > 0 {
            debug!("Cleaned up {} settled submission records", count);
        }
        count
    }

    fn get_mut(&mut self, id: &Uuid) -> Result<&mut SubmissionRecord, TrackerError> {
        self.records
            .get_mut(id)
            .ok_or_else(|| TrackerError::UnknownSubmission(id.to_string()))
    }
}
