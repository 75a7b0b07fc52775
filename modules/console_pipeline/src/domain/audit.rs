use chrono::Utc;
use parking_lot::RwLock;
use tracing::info;

use crate::contract::model::AuditLogEntry;

/// Append-only record of administrative actions.
///
/// Entries are stored in insertion order and never mutated or removed.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Ids are monotonic starting at 1.
    pub fn record(&self, actor_name: impl Into<String>, action: impl Into<String>) -> AuditLogEntry {
        let mut entries = self.entries.write();
        // Entries are never removed, so the length doubles as the id sequence.
        let entry = AuditLogEntry {
            id: entries.len() as u64 + 1,
            actor_name: actor_name.into(),
            action: action.into(),
            timestamp: Utc::now(),
        };
        entries.push(entry.clone());
        drop(entries);

        info!(
            target: "console_pipeline::audit",
            entry_id = entry.id,
            actor = %entry.actor_name,
            action = %entry.action,
            "audit entry recorded"
        );
        entry
    }

    /// Display order: most recent first.
    pub fn newest_first(&self) -> Vec<AuditLogEntry> {
        self.entries.read().iter().rev().cloned().collect()
    }

    /// Storage order: oldest first.
    pub fn snapshot(&self) -> Vec<AuditLogEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
