use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::contract::model::{
    Action, AuditLogEntry, Collection, MutationCommand, MutationKind, MutationOutcome,
    NewNotification, NewStaff, Notification, PermissionMatrix, ResourceName, Role, User,
};
use crate::domain::audit::AuditLog;
use crate::domain::error::{PipelineError, ServiceError};
use crate::domain::events::PipelineEvent;
use crate::domain::identity::IdentityResolver;
use crate::domain::notifications::{MarkReadScope, NotificationCenter};
use crate::domain::permissions::{
    default_matrix_for, has_permission, set_full_access, set_permission,
};
use crate::domain::ports::{EventPublisher, MutationService};
use crate::domain::repo::CollectionStore;

/// How a permission denial is reported to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenialPolicy {
    /// `Ok(MutationOutcome::Denied)`; callers that want silence ignore it.
    #[default]
    Outcome,
    /// `Err(PipelineError::Denied)`.
    Error,
}

/// Configuration for the pipeline service
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub denial_policy: DenialPolicy,
    pub mark_read_scope: MarkReadScope,
    /// Drop responses older than the one already applied (per-resource sequence tokens).
    pub discard_stale_responses: bool,
}

/// Permission-gated mutation pipeline.
///
/// gate → remote call → full collection replacement → optional audit → optional notification.
/// Cheap to clone; concurrent calls are allowed and not serialized.
#[derive(Clone)]
pub struct Service {
    mutations: Arc<dyn MutationService>,
    events: Arc<dyn EventPublisher<PipelineEvent>>,
    identity: Arc<IdentityResolver>,
    audit: Arc<AuditLog>,
    notifications: Arc<NotificationCenter>,
    collections: Arc<CollectionStore>,
    config: ServiceConfig,
}

impl Service {
    pub fn new(
        mutations: Arc<dyn MutationService>,
        events: Arc<dyn EventPublisher<PipelineEvent>>,
        config: ServiceConfig,
    ) -> Self {
        let audit = Arc::new(AuditLog::new());
        let identity = Arc::new(IdentityResolver::new(audit.clone(), events.clone()));
        Self {
            mutations,
            events,
            identity,
            audit,
            notifications: Arc::new(NotificationCenter::new()),
            collections: Arc::new(CollectionStore::new()),
            config,
        }
    }

    pub fn identity(&self) -> &Arc<IdentityResolver> {
        &self.identity
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn notification_center(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    pub fn collections(&self) -> &Arc<CollectionStore> {
        &self.collections
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn current_user(&self) -> Result<User, PipelineError> {
        self.identity
            .effective_identity()
            .ok_or(PipelineError::Unauthenticated)
    }

    // --- pipeline ---

    /// Run `command` as the current effective identity.
    ///
    /// Both identities are read once, before dispatch: a session that ends or changes while the
    /// call is in flight does not change who the audit entry names.
    #[instrument(
        name = "console_pipeline.service.execute",
        skip(self, command),
        fields(resource = %command.resource, action = %command.action())
    )]
    pub async fn execute(&self, command: MutationCommand) -> Result<MutationOutcome, PipelineError> {
        let session = self.identity.snapshot();
        let (Some(effective), Some(real)) = (session.effective(), session.real()) else {
            return Err(PipelineError::Unauthenticated);
        };
        self.execute_as(effective, &real.name, command).await
    }

    /// Run `command` gated on `user`'s matrix; audit entries name `actor`.
    #[instrument(
        name = "console_pipeline.service.execute_as",
        skip(self, user, actor, command),
        fields(user_id = %user.id, resource = %command.resource, action = %command.action())
    )]
    pub async fn execute_as(
        &self,
        user: &User,
        actor: &str,
        command: MutationCommand,
    ) -> Result<MutationOutcome, PipelineError> {
        let MutationCommand {
            resource,
            kind,
            audit,
            notify,
        } = command;
        let action = kind.action();

        if !has_permission(user, resource, action) {
            return self.deny(user, resource, action);
        }

        let sequence = self.collections.next_sequence(resource);
        debug!(sequence, "dispatching mutation");

        let response = match kind {
            MutationKind::Create { payload } => self.mutations.create(resource, payload).await,
            MutationKind::Update { id, payload } => {
                self.mutations.update(resource, &id, payload).await
            }
            MutationKind::Delete { id } => self.mutations.delete(resource, &id).await,
        };
        let collection = response.map_err(|e| self.service_failure(e))?;

        let outcome = self.synchronize(resource, collection, sequence);

        if let Some(action_text) = audit {
            self.record_audit(actor, action_text);
        }
        if let Some(spec) = notify {
            self.fan_out(spec);
        }

        info!(sequence, applied = outcome.is_applied(), "mutation completed");
        Ok(outcome)
    }

    /// Initial load of a resource, gated on `read`.
    #[instrument(name = "console_pipeline.service.load", skip(self), fields(resource = %resource))]
    pub async fn load(&self, resource: ResourceName) -> Result<MutationOutcome, PipelineError> {
        let user = self.current_user()?;
        if !has_permission(&user, resource, Action::Read) {
            return self.deny(&user, resource, Action::Read);
        }

        let sequence = self.collections.next_sequence(resource);
        let collection = self
            .mutations
            .list(resource)
            .await
            .map_err(|e| self.service_failure(e))?;

        debug!(sequence, len = collection.len(), "collection loaded");
        Ok(self.synchronize(resource, collection, sequence))
    }

    fn deny(
        &self,
        user: &User,
        resource: ResourceName,
        action: Action,
    ) -> Result<MutationOutcome, PipelineError> {
        info!(
            user_id = %user.id,
            resource = %resource,
            action = %action,
            "permission denied, nothing dispatched"
        );
        match self.config.denial_policy {
            DenialPolicy::Outcome => Ok(MutationOutcome::Denied { resource, action }),
            DenialPolicy::Error => Err(PipelineError::denied(resource, action)),
        }
    }

    /// Session failures end the session before the error reaches the caller.
    fn service_failure(&self, error: ServiceError) -> PipelineError {
        if error.is_session_failure() {
            self.identity.force_logout();
            return PipelineError::SessionExpired { source: error };
        }
        warn!(error = %error, "mutation service rejected the call");
        PipelineError::Service(error)
    }

    fn synchronize(
        &self,
        resource: ResourceName,
        collection: Collection,
        sequence: u64,
    ) -> MutationOutcome {
        let installed = if self.config.discard_stale_responses {
            self.collections
                .replace_if_newer(resource, collection, sequence)
        } else {
            Some(self.collections.replace(resource, collection, sequence))
        };

        match installed {
            Some(collection) => {
                self.events.publish(&PipelineEvent::CollectionReplaced {
                    resource,
                    sequence,
                    len: collection.len(),
                });
                MutationOutcome::Applied {
                    resource,
                    collection,
                    sequence,
                }
            }
            None => {
                debug!(
                    sequence,
                    applied = self.collections.applied_sequence(resource),
                    "stale response discarded"
                );
                MutationOutcome::Superseded { resource, sequence }
            }
        }
    }

    fn record_audit(&self, actor: &str, action: String) -> AuditLogEntry {
        let entry = self.audit.record(actor, action);
        self.events
            .publish(&PipelineEvent::AuditRecorded { entry_id: entry.id });
        entry
    }

    fn fan_out(&self, spec: NewNotification) -> Notification {
        let notification = self.notifications.create(spec);
        self.events.publish(&PipelineEvent::NotificationCreated {
            id: notification.id,
        });
        notification
    }

    // --- identity ---

    pub fn start_impersonation(&self, target: User) -> Result<User, PipelineError> {
        Ok(self.identity.start_impersonation(target)?)
    }

    pub fn stop_impersonation(&self) -> Result<User, PipelineError> {
        Ok(self.identity.stop_impersonation()?)
    }

    // --- notifications for the effective identity ---

    pub fn visible_notifications(&self) -> Result<Vec<Notification>, PipelineError> {
        Ok(self.notifications.list_for(&self.current_user()?))
    }

    pub fn unread_count(&self) -> Result<usize, PipelineError> {
        Ok(self.notifications.unread_count(&self.current_user()?))
    }

    pub fn mark_all_read(&self) -> Result<usize, PipelineError> {
        let viewer = self.current_user()?;
        Ok(self
            .notifications
            .mark_all_read(&viewer, self.config.mark_read_scope))
    }

    // --- administrative commands (resource: Access Control) ---

    /// Creates an account seeded with the role's default matrix.
    #[instrument(
        name = "console_pipeline.service.create_staff",
        skip(self, new_staff),
        fields(role = %new_staff.role)
    )]
    pub async fn create_staff(
        &self,
        new_staff: NewStaff,
    ) -> Result<(User, MutationOutcome), PipelineError> {
        let user = User {
            id: Uuid::new_v4(),
            permissions: default_matrix_for(new_staff.role),
            name: new_staff.name,
            email: new_staff.email,
            role: new_staff.role,
            must_reset_password: true,
        };

        let command = MutationCommand::create(ResourceName::AccessControl, to_payload(&user)?)
            .audited(format!("Created staff member {}.", user.name))
            .notifying(
                NewNotification::broadcast(
                    "New staff member",
                    format!("{} joined as {}.", user.name, user.role),
                )
                .to_roles([Role::Admin])
                .linked(ResourceName::AccessControl, user.id.to_string()),
            );

        let outcome = self.execute(command).await?;
        Ok((user, outcome))
    }

    /// Replaces `target`'s matrix; the session is refreshed if it holds `target`.
    #[instrument(
        name = "console_pipeline.service.set_user_permissions",
        skip(self, target, permissions),
        fields(target_id = %target.id)
    )]
    pub async fn set_user_permissions(
        &self,
        target: &User,
        permissions: PermissionMatrix,
    ) -> Result<MutationOutcome, PipelineError> {
        let updated = User {
            permissions,
            ..target.clone()
        };
        let audit = format!("Updated permissions for {}.", target.name);
        self.update_user(updated, audit).await
    }

    pub async fn set_permission_for(
        &self,
        target: &User,
        resource: ResourceName,
        action: Action,
        value: bool,
    ) -> Result<MutationOutcome, PipelineError> {
        let matrix = set_permission(&target.permissions, resource, action, value);
        self.set_user_permissions(target, matrix).await
    }

    pub async fn set_full_access_for(
        &self,
        target: &User,
        resource: ResourceName,
        value: bool,
    ) -> Result<MutationOutcome, PipelineError> {
        let matrix = set_full_access(&target.permissions, resource, value);
        self.set_user_permissions(target, matrix).await
    }

    /// Changes the role and re-seeds the matrix with the new role's defaults.
    #[instrument(
        name = "console_pipeline.service.change_role",
        skip(self, target),
        fields(target_id = %target.id, role = %role)
    )]
    pub async fn change_role(
        &self,
        target: &User,
        role: Role,
    ) -> Result<MutationOutcome, PipelineError> {
        let updated = User {
            role,
            permissions: default_matrix_for(role),
            ..target.clone()
        };
        let audit = format!("Changed role of {} to {}.", target.name, role);
        self.update_user(updated, audit).await
    }

    async fn update_user(
        &self,
        updated: User,
        audit: String,
    ) -> Result<MutationOutcome, PipelineError> {
        let command = MutationCommand::update(
            ResourceName::AccessControl,
            updated.id.to_string(),
            to_payload(&updated)?,
        )
        .audited(audit);

        let outcome = self.execute(command).await?;
        if !outcome.is_denied() {
            self.identity.refresh_user(&updated);
        }
        Ok(outcome)
    }
}

fn to_payload(user: &User) -> Result<serde_json::Value, PipelineError> {
    serde_json::to_value(user).map_err(|e| PipelineError::payload(e.to_string()))
}
