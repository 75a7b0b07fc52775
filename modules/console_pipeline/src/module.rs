use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{debug, info};
use url::Url;

use crate::config::ConsolePipelineConfig;
use crate::contract::client::ConsoleApi;
use crate::domain::events::PipelineEvent;
use crate::domain::ports::MutationService;
use crate::domain::service::Service;
use crate::gateways::local::ConsoleLocalClient;
use crate::infra::{BroadcastPublisher, HttpMutationClient};

/// Wired pipeline: domain service, event fanout and the local API client.
#[derive(Clone)]
pub struct ConsolePipeline {
    service: Arc<Service>,
    events: Arc<BroadcastPublisher>,
    client: Arc<dyn ConsoleApi>,
}

impl ConsolePipeline {
    /// Wire the pipeline over any Mutation Service implementation.
    pub fn with_mutation_service(
        cfg: &ConsolePipelineConfig,
        mutations: Arc<dyn MutationService>,
    ) -> Self {
        debug!(
            denial_policy = ?cfg.denial_policy,
            mark_read_scope = ?cfg.mark_read_scope,
            discard_stale_responses = cfg.discard_stale_responses,
            "wiring console pipeline"
        );

        let events = Arc::new(BroadcastPublisher::new(cfg.event_buffer));
        let service = Arc::new(Service::new(
            mutations,
            events.clone(),
            cfg.service_config(),
        ));
        let client: Arc<dyn ConsoleApi> = Arc::new(ConsoleLocalClient::new(service.clone()));

        Self {
            service,
            events,
            client,
        }
    }

    /// Wire the pipeline over the remote data API at `cfg.api_base_url`.
    pub fn http(
        cfg: &ConsolePipelineConfig,
        credential: Option<String>,
    ) -> anyhow::Result<(Self, Arc<HttpMutationClient>)> {
        let base = Url::parse(&cfg.api_base_url)
            .with_context(|| format!("invalid api_base_url '{}'", cfg.api_base_url))?;
        let http = Arc::new(HttpMutationClient::new(
            base,
            Duration::from_millis(cfg.request_timeout_ms),
        )?);
        if let Some(token) = credential {
            http.set_credential(token);
        }

        info!(api_base_url = %cfg.api_base_url, "using remote mutation service");
        Ok((Self::with_mutation_service(cfg, http.clone()), http))
    }

    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    pub fn client(&self) -> Arc<dyn ConsoleApi> {
        self.client.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }
}
