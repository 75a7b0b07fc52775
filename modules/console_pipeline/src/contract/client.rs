use async_trait::async_trait;
use std::sync::Arc;

use crate::contract::{
    error::ConsoleError,
    model::{
        AuditLogEntry, Collection, MutationCommand, MutationOutcome, NewStaff, Notification,
        ResourceName, User,
    },
};

/// Public API of the console pipeline for frontends and other modules
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    /// Start a session for a user authenticated elsewhere
    async fn login(&self, user: User) -> Result<(), ConsoleError>;

    async fn logout(&self) -> Result<(), ConsoleError>;

    /// Identity that permission checks run against
    async fn current_user(&self) -> Result<User, ConsoleError>;

    async fn load(&self, resource: ResourceName) -> Result<MutationOutcome, ConsoleError>;

    async fn execute(&self, command: MutationCommand) -> Result<MutationOutcome, ConsoleError>;

    /// Last applied canonical collection (no remote call)
    async fn collection(&self, resource: ResourceName) -> Result<Arc<Collection>, ConsoleError>;

    async fn start_impersonation(&self, target: User) -> Result<User, ConsoleError>;

    async fn stop_impersonation(&self) -> Result<User, ConsoleError>;

    async fn create_staff(&self, new_staff: NewStaff) -> Result<User, ConsoleError>;

    /// Audit entries, most recent first
    async fn audit_log(&self) -> Result<Vec<AuditLogEntry>, ConsoleError>;

    /// Notifications visible to the current user, most recent first
    async fn notifications(&self) -> Result<Vec<Notification>, ConsoleError>;

    async fn mark_all_read(&self) -> Result<usize, ConsoleError>;
}
