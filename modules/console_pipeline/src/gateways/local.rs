use async_trait::async_trait;
use std::sync::Arc;

use crate::contract::{
    client::ConsoleApi,
    error::ConsoleError,
    model::{
        AuditLogEntry, Collection, MutationCommand, MutationOutcome, NewStaff, Notification,
        ResourceName, User,
    },
};
use crate::domain::service::Service;

/// Local implementation of the ConsoleApi trait that delegates to the domain service
pub struct ConsoleLocalClient {
    service: Arc<Service>,
}

impl ConsoleLocalClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ConsoleApi for ConsoleLocalClient {
    async fn login(&self, user: User) -> Result<(), ConsoleError> {
        self.service.identity().login(user);
        Ok(())
    }

    async fn logout(&self) -> Result<(), ConsoleError> {
        self.service.identity().logout();
        Ok(())
    }

    async fn current_user(&self) -> Result<User, ConsoleError> {
        self.service
            .identity()
            .effective_identity()
            .ok_or(ConsoleError::Unauthenticated)
    }

    async fn load(&self, resource: ResourceName) -> Result<MutationOutcome, ConsoleError> {
        self.service.load(resource).await.map_err(Into::into)
    }

    async fn execute(&self, command: MutationCommand) -> Result<MutationOutcome, ConsoleError> {
        self.service.execute(command).await.map_err(Into::into)
    }

    async fn collection(&self, resource: ResourceName) -> Result<Arc<Collection>, ConsoleError> {
        Ok(self.service.collections().get(resource))
    }

    async fn start_impersonation(&self, target: User) -> Result<User, ConsoleError> {
        self.service.start_impersonation(target).map_err(Into::into)
    }

    async fn stop_impersonation(&self) -> Result<User, ConsoleError> {
        self.service.stop_impersonation().map_err(Into::into)
    }

    async fn create_staff(&self, new_staff: NewStaff) -> Result<User, ConsoleError> {
        let (user, outcome) = self.service.create_staff(new_staff).await?;
        match outcome {
            MutationOutcome::Denied { resource, action } => {
                Err(ConsoleError::Denied { resource, action })
            }
            _ => Ok(user),
        }
    }

    async fn audit_log(&self) -> Result<Vec<AuditLogEntry>, ConsoleError> {
        Ok(self.service.audit_log().newest_first())
    }

    async fn notifications(&self) -> Result<Vec<Notification>, ConsoleError> {
        self.service.visible_notifications().map_err(Into::into)
    }

    async fn mark_all_read(&self) -> Result<usize, ConsoleError> {
        self.service.mark_all_read().map_err(Into::into)
    }
}
