use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::contract::model::{ResourceName, UserId};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    Logout,
    /// The remote API rejected the credential (401/403/token).
    CredentialRejected,
}

/// Transport-agnostic state change; subscribers re-render on these.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    CollectionReplaced {
        resource: ResourceName,
        sequence: u64,
        len: usize,
    },
    AuditRecorded {
        entry_id: u64,
    },
    NotificationCreated {
        id: Uuid,
    },
    /// Effective identity changed (login, impersonation start/stop, refresh).
    IdentityChanged {
        effective: Option<UserId>,
        at: DateTime<Utc>,
    },
    SessionEnded {
        reason: SessionEndReason,
        at: DateTime<Utc>,
    },
}
