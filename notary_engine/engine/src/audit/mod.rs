use std::collections::VecDeque;
use std::sync::Mutex;

use uuid::Uuid;

use crate::types::now_rfc3339;

/// Type of notary event being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventType {
    Keygen,
    Rotation,
    Signing,
    Verification,
    Citation,
    Erasure,
    Error,
}

/// Record of a notary-related event
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: Uuid,
    pub event_type: AuditEventType,
    /// Lineage the event concerns (certificate, credential or document tag).
    pub tag: String,
    pub version: Option<u32>,
    pub message: String,
    pub timestamp: String, // RFC3339
}

impl AuditRecord {
    pub fn new(event_type: AuditEventType, tag: impl Into<String>, version: Option<u32>, message: impl Into<String>) -> Self {
        AuditRecord {
            id: Uuid::new_v4(),
            event_type,
            tag: tag.into(),
            version,
            message: message.into(),
            timestamp: now_rfc3339(),
        }
    }

    pub fn event_type_label(&self) -> &'static str {
        match self.event_type {
            AuditEventType::Keygen => "KEYGEN",
            AuditEventType::Rotation => "ROTATE",
            AuditEventType::Signing => "SIGNING",
            AuditEventType::Verification => "VERIFY",
            AuditEventType::Citation => "CITE",
            AuditEventType::Erasure => "ERASE",
            AuditEventType::Error => "ERROR",
        }
    }
}

/// In-memory audit tracker; oldest entries are evicted past `max_entries`.
pub struct AuditTracker {
    records: Mutex<VecDeque<AuditRecord>>,
    max_entries: usize,
}

impl AuditTracker {
    pub fn new(max_entries: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_entries)),
            max_entries: max_entries.max(1),
        }
    }

    /// Record a new event in the audit log
    pub fn log(&self, record: AuditRecord) {
        tracing::info!(
            target: "notary::audit",
            event = record.event_type_label(),
            tag = %record.tag,
            version = record.version,
            "{}",
            record.message
        );

        // A poisoned lock still holds a usable queue.
        let mut records = self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if records.len() == self.max_entries {
            records.pop_front(); // evict oldest
        }
        records.push_back(record);
    }

    /// Most recent events, newest first.
    pub fn recent(&self, count: usize) -> Vec<AuditRecord> {
        let records = self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        records.iter().rev().take(count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditTracker {
    fn default() -> Self {
        AuditTracker::new(500)
    }
}
