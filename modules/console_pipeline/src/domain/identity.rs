//! Effective-identity resolution and the impersonation state machine.
//!
//! ```text
//! Unauthenticated --login--> Authenticated(real)
//! Authenticated(real) --start_impersonation(target)--> Impersonating(real, target)
//! Impersonating(real, target) --stop_impersonation--> Authenticated(real)
//! any --logout / force_logout--> Unauthenticated
//! ```
//!
//! Permission checks use the effective identity; audit attribution uses the real one.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::contract::model::{Role, User};
use crate::domain::audit::AuditLog;
use crate::domain::error::IdentityError;
use crate::domain::events::{PipelineEvent, SessionEndReason};
use crate::domain::ports::EventPublisher;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated {
        user: User,
    },
    Impersonating {
        real: User,
        target: User,
    },
}

impl SessionState {
    /// Impersonated user when impersonating, else the authenticated user.
    pub fn effective(&self) -> Option<&User> {
        match self {
            SessionState::Unauthenticated => None,
            SessionState::Authenticated { user } => Some(user),
            SessionState::Impersonating { target, .. } => Some(target),
        }
    }

    /// The identity actions are attributed to in the audit log.
    pub fn real(&self) -> Option<&User> {
        match self {
            SessionState::Unauthenticated => None,
            SessionState::Authenticated { user } => Some(user),
            SessionState::Impersonating { real, .. } => Some(real),
        }
    }

    pub fn is_impersonating(&self) -> bool {
        matches!(self, SessionState::Impersonating { .. })
    }

    pub fn start_impersonation(&self, target: User) -> Result<SessionState, IdentityError> {
        match self {
            SessionState::Unauthenticated => Err(IdentityError::NotAuthenticated),
            SessionState::Impersonating { target: current, .. } => {
                Err(IdentityError::AlreadyImpersonating {
                    name: current.name.clone(),
                })
            }
            SessionState::Authenticated { user } if user.role != Role::Admin => {
                Err(IdentityError::NotAdmin {
                    name: user.name.clone(),
                })
            }
            SessionState::Authenticated { user } if user.id == target.id => {
                Err(IdentityError::SelfImpersonation)
            }
            SessionState::Authenticated { user } => Ok(SessionState::Impersonating {
                real: user.clone(),
                target,
            }),
        }
    }

    pub fn stop_impersonation(&self) -> Result<SessionState, IdentityError> {
        match self {
            SessionState::Impersonating { real, .. } => Ok(SessionState::Authenticated {
                user: real.clone(),
            }),
            _ => Err(IdentityError::NotImpersonating),
        }
    }

    /// Swap in a newer record of a user held by this session; `None` if unaffected.
    fn refreshed(&self, updated: &User) -> Option<SessionState> {
        match self {
            SessionState::Authenticated { user } if user.id == updated.id => {
                Some(SessionState::Authenticated {
                    user: updated.clone(),
                })
            }
            SessionState::Impersonating { real, target } => {
                if real.id != updated.id && target.id != updated.id {
                    return None;
                }
                let pick = |u: &User| {
                    if u.id == updated.id {
                        updated.clone()
                    } else {
                        u.clone()
                    }
                };
                Some(SessionState::Impersonating {
                    real: pick(real),
                    target: pick(target),
                })
            }
            _ => None,
        }
    }
}

/// Holds the session state; reads are lock-free, transitions are serialized.
pub struct IdentityResolver {
    state: ArcSwap<SessionState>,
    transitions: Mutex<()>,
    audit: Arc<AuditLog>,
    events: Arc<dyn EventPublisher<PipelineEvent>>,
}

impl IdentityResolver {
    pub fn new(audit: Arc<AuditLog>, events: Arc<dyn EventPublisher<PipelineEvent>>) -> Self {
        Self {
            state: ArcSwap::from_pointee(SessionState::Unauthenticated),
            transitions: Mutex::new(()),
            audit,
            events,
        }
    }

    pub fn snapshot(&self) -> Arc<SessionState> {
        self.state.load_full()
    }

    pub fn effective_identity(&self) -> Option<User> {
        self.state.load().effective().cloned()
    }

    pub fn real_identity(&self) -> Option<User> {
        self.state.load().real().cloned()
    }

    pub fn is_impersonating(&self) -> bool {
        self.state.load().is_impersonating()
    }

    /// Entry point after a successful external login; replaces any previous session.
    #[instrument(name = "console_pipeline.identity.login", skip_all, fields(user_id = %user.id))]
    pub fn login(&self, user: User) {
        let _guard = self.transitions.lock();
        info!(role = %user.role, "session started");
        self.install(SessionState::Authenticated { user });
    }

    #[instrument(name = "console_pipeline.identity.logout", skip_all)]
    pub fn logout(&self) {
        self.end_session(SessionEndReason::Logout);
    }

    /// Clears identity after the remote API rejected the credential.
    #[instrument(name = "console_pipeline.identity.force_logout", skip_all)]
    pub fn force_logout(&self) {
        warn!("credential rejected, forcing logout");
        self.end_session(SessionEndReason::CredentialRejected);
    }

    #[instrument(
        name = "console_pipeline.identity.start_impersonation",
        skip_all,
        fields(target_id = %target.id)
    )]
    pub fn start_impersonation(&self, target: User) -> Result<User, IdentityError> {
        let _guard = self.transitions.lock();
        let next = self.state.load().start_impersonation(target.clone())?;
        let actor = next.real().map(|u| u.name.clone()).unwrap_or_default();

        self.install(next);
        self.audit_as(&actor, format!("Started impersonating {}.", target.name));
        info!(actor = %actor, target = %target.name, "impersonation started");
        Ok(target)
    }

    /// Returns the restored real identity, unchanged.
    #[instrument(name = "console_pipeline.identity.stop_impersonation", skip_all)]
    pub fn stop_impersonation(&self) -> Result<User, IdentityError> {
        let _guard = self.transitions.lock();
        let current = self.state.load_full();
        let next = current.stop_impersonation()?;
        let (real, target_name) = match current.as_ref() {
            SessionState::Impersonating { real, target } => (real.clone(), target.name.clone()),
            _ => return Err(IdentityError::NotImpersonating),
        };

        self.install(next);
        self.audit_as(&real.name, format!("Stopped impersonating {target_name}."));
        info!(actor = %real.name, target = %target_name, "impersonation stopped");
        Ok(real)
    }

    /// Replace the stored record of `user` if this session holds it. Returns true if replaced.
    pub fn refresh_user(&self, user: &User) -> bool {
        let _guard = self.transitions.lock();
        match self.state.load().refreshed(user) {
            Some(next) => {
                debug!(user_id = %user.id, "session identity refreshed");
                self.install(next);
                true
            }
            None => false,
        }
    }

    fn end_session(&self, reason: SessionEndReason) {
        let _guard = self.transitions.lock();
        self.state.store(Arc::new(SessionState::Unauthenticated));
        self.events.publish(&PipelineEvent::SessionEnded {
            reason,
            at: Utc::now(),
        });
    }

    fn install(&self, next: SessionState) {
        let effective = next.effective().map(|u| u.id);
        self.state.store(Arc::new(next));
        self.events.publish(&PipelineEvent::IdentityChanged {
            effective,
            at: Utc::now(),
        });
    }

    fn audit_as(&self, actor: &str, action: String) {
        let entry = self.audit.record(actor, action);
        self.events
            .publish(&PipelineEvent::AuditRecorded { entry_id: entry.id });
    }
}
