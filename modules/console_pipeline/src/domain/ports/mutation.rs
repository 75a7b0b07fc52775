use async_trait::async_trait;

use crate::contract::model::{Collection, Entity, ResourceName};
use crate::domain::error::ServiceError;

/// Remote data API for one console deployment.
///
/// Every call returns the complete post-mutation collection of `resource`, never a delta.
/// The adapter attaches the bearer credential itself.
#[async_trait]
pub trait MutationService: Send + Sync {
    async fn list(&self, resource: ResourceName) -> Result<Collection, ServiceError>;

    async fn create(
        &self,
        resource: ResourceName,
        payload: Entity,
    ) -> Result<Collection, ServiceError>;

    async fn update(
        &self,
        resource: ResourceName,
        id: &str,
        payload: Entity,
    ) -> Result<Collection, ServiceError>;

    async fn delete(&self, resource: ResourceName, id: &str) -> Result<Collection, ServiceError>;
}
