//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use console_pipeline::contract::model::{
    Collection, Entity, PermissionMatrix, ResourceName, Role, User,
};
use console_pipeline::domain::error::ServiceError;
use console_pipeline::domain::events::PipelineEvent;
use console_pipeline::domain::permissions::default_matrix_for;
use console_pipeline::domain::ports::{EventPublisher, MutationService};
use console_pipeline::domain::service::{Service, ServiceConfig};
use console_pipeline::infra::InMemoryMutationService;

pub fn user(name: &str, role: Role) -> User {
    user_with(name, role, default_matrix_for(role))
}

pub fn user_with(name: &str, role: Role, permissions: PermissionMatrix) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        role,
        permissions,
        must_reset_password: false,
    }
}

/// Publisher that remembers everything it was given
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }
}

impl EventPublisher<PipelineEvent> for RecordingPublisher {
    fn publish(&self, event: &PipelineEvent) {
        self.events.lock().push(event.clone());
    }
}

/// In-memory service that counts calls and can be told to fail the next ones
#[derive(Default)]
pub struct CountingService {
    pub inner: InMemoryMutationService,
    calls: AtomicUsize,
    failure: Mutex<Option<ServiceError>>,
}

impl CountingService {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, error: ServiceError) {
        *self.failure.lock() = Some(error);
    }

    fn enter(&self) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MutationService for CountingService {
    async fn list(&self, resource: ResourceName) -> Result<Collection, ServiceError> {
        self.enter()?;
        self.inner.list(resource).await
    }

    async fn create(
        &self,
        resource: ResourceName,
        payload: Entity,
    ) -> Result<Collection, ServiceError> {
        self.enter()?;
        self.inner.create(resource, payload).await
    }

    async fn update(
        &self,
        resource: ResourceName,
        id: &str,
        payload: Entity,
    ) -> Result<Collection, ServiceError> {
        self.enter()?;
        self.inner.update(resource, id, payload).await
    }

    async fn delete(&self, resource: ResourceName, id: &str) -> Result<Collection, ServiceError> {
        self.enter()?;
        self.inner.delete(resource, id).await
    }
}

/// Service whose responses are released by the test, in whatever order it likes.
///
/// Each call takes the next gate in call order and reports on `entered` once it holds it.
pub struct GatedService {
    gates: Mutex<VecDeque<oneshot::Receiver<Collection>>>,
    entered: mpsc::UnboundedSender<usize>,
    calls: AtomicUsize,
}

impl GatedService {
    pub fn new(
        gates: usize,
    ) -> (
        Self,
        Vec<oneshot::Sender<Collection>>,
        mpsc::UnboundedReceiver<usize>,
    ) {
        let (senders, receivers): (Vec<_>, VecDeque<_>) =
            (0..gates).map(|_| oneshot::channel()).unzip();
        let (entered, entered_rx) = mpsc::unbounded_channel();
        let svc = Self {
            gates: Mutex::new(receivers),
            entered,
            calls: AtomicUsize::new(0),
        };
        (svc, senders, entered_rx)
    }

    async fn respond(&self) -> Result<Collection, ServiceError> {
        let gate = self
            .gates
            .lock()
            .pop_front()
            .ok_or_else(|| ServiceError::transport("no gate left"))?;
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.entered.send(call);
        gate.await
            .map_err(|_| ServiceError::transport("gate dropped"))
    }
}

#[async_trait]
impl MutationService for GatedService {
    async fn list(&self, _resource: ResourceName) -> Result<Collection, ServiceError> {
        self.respond().await
    }

    async fn create(
        &self,
        _resource: ResourceName,
        _payload: Entity,
    ) -> Result<Collection, ServiceError> {
        self.respond().await
    }

    async fn update(
        &self,
        _resource: ResourceName,
        _id: &str,
        _payload: Entity,
    ) -> Result<Collection, ServiceError> {
        self.respond().await
    }

    async fn delete(&self, _resource: ResourceName, _id: &str) -> Result<Collection, ServiceError> {
        self.respond().await
    }
}

pub struct Harness {
    pub service: Service,
    pub backend: Arc<CountingService>,
    pub events: Arc<RecordingPublisher>,
}

pub fn harness(config: ServiceConfig) -> Harness {
    let backend = Arc::new(CountingService::default());
    let events = Arc::new(RecordingPublisher::default());
    let service = Service::new(backend.clone(), events.clone(), config);
    Harness {
        service,
        backend,
        events,
    }
}
