use thiserror::Error;

use crate::contract::model::{Action, ResourceName};

/// Failure reported by a Mutation Service adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Malformed response: {message}")]
    Decode { message: String },
}

impl ServiceError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Expired or rejected credential: 401/403, or a server message mentioning a token.
    ///
    /// Transport and decode diagnostics carry request URLs and entity ids, so they never count.
    pub fn is_session_failure(&self) -> bool {
        match self {
            Self::Status {
                status: 401 | 403, ..
            } => true,
            Self::Status { message, .. } => message.to_ascii_lowercase().contains("token"),
            Self::Transport { .. } | Self::Decode { .. } => false,
        }
    }
}

/// Rejected identity transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("No authenticated user")]
    NotAuthenticated,

    #[error("Only administrators may impersonate ('{name}' is not an Admin)")]
    NotAdmin { name: String },

    #[error("Cannot impersonate yourself")]
    SelfImpersonation,

    #[error("Already impersonating '{name}'")]
    AlreadyImpersonating { name: String },

    #[error("Not impersonating anyone")]
    NotImpersonating,
}

/// Errors surfaced by the mutation pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Permission denied: {action} on {resource}")]
    Denied {
        resource: ResourceName,
        action: Action,
    },

    #[error("No authenticated user")]
    Unauthenticated,

    /// The session ended; the identity was already logged out.
    #[error("Session expired: {source}")]
    SessionExpired {
        #[source]
        source: ServiceError,
    },

    #[error(transparent)]
    Service(ServiceError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Invalid payload: {message}")]
    Payload { message: String },
}

impl PipelineError {
    pub fn denied(resource: ResourceName, action: Action) -> Self {
        Self::Denied { resource, action }
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }
}
