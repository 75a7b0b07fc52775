use thiserror::Error;

use crate::contract::model::{Action, ResourceName};

/// Errors that are safe to expose to other modules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Permission denied: {action} on {resource}")]
    Denied {
        resource: ResourceName,
        action: Action,
    },

    /// The session is gone; the caller should route to the login screen.
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Session expired")]
    SessionExpired,

    #[error("Rejected: {message}")]
    Rejected { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal error")]
    Internal,
}

impl ConsoleError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// True when the caller must return to the unauthenticated state.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::SessionExpired)
    }
}

impl From<crate::domain::error::PipelineError> for ConsoleError {
    fn from(error: crate::domain::error::PipelineError) -> Self {
        use crate::domain::error::{IdentityError, PipelineError::*, ServiceError};
        match error {
            Denied { resource, action } => Self::Denied { resource, action },
            Unauthenticated | Identity(IdentityError::NotAuthenticated) => Self::Unauthenticated,
            SessionExpired { .. } => Self::SessionExpired,
            Identity(e) => Self::validation(e.to_string()),
            Service(ServiceError::Status { message, .. }) => Self::rejected(message),
            Service(ServiceError::Transport { .. } | ServiceError::Decode { .. }) => Self::Internal,
            Payload { message } => Self::validation(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{IdentityError, PipelineError, ServiceError};

    #[test]
    fn pipeline_errors_map_to_public_errors() {
        assert_eq!(
            ConsoleError::from(PipelineError::denied(ResourceName::Crm, Action::Create)),
            ConsoleError::Denied {
                resource: ResourceName::Crm,
                action: Action::Create
            }
        );
        assert!(ConsoleError::from(PipelineError::SessionExpired {
            source: ServiceError::status(401, "expired"),
        })
        .requires_login());
        assert!(ConsoleError::from(PipelineError::Unauthenticated).requires_login());
        assert_eq!(
            ConsoleError::from(PipelineError::Service(ServiceError::status(422, "name required"))),
            ConsoleError::rejected("name required")
        );
        assert_eq!(
            ConsoleError::from(PipelineError::Service(ServiceError::transport("reset"))),
            ConsoleError::Internal
        );
        assert_eq!(
            ConsoleError::from(PipelineError::Identity(IdentityError::SelfImpersonation)),
            ConsoleError::validation("Cannot impersonate yourself")
        );
    }
}
