use std::time::Duration;

use anyhow::Context;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use tracing::{debug, instrument};
use url::Url;

use crate::contract::model::{Collection, Entity, ResourceName};
use crate::domain::error::ServiceError;
use crate::domain::ports::MutationService;

/// HTTP adapter for the remote data API.
///
/// Routes, relative to `base`:
///  - `GET    /api/{slug}`      list
///  - `POST   /api/{slug}`      create
///  - `PUT    /api/{slug}/{id}` update
///  - `DELETE /api/{slug}/{id}` delete
///
/// Every route answers with the full JSON array of the resource.
pub struct HttpMutationClient {
    client: reqwest::Client,
    base: Url,
    credential: ArcSwapOption<String>,
}

impl HttpMutationClient {
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_client(client, base))
    }

    pub fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self {
            client,
            base,
            credential: ArcSwapOption::empty(),
        }
    }

    /// Bearer credential attached to every subsequent request.
    pub fn set_credential(&self, token: impl Into<String>) {
        self.credential.store(Some(std::sync::Arc::new(token.into())));
    }

    pub fn clear_credential(&self) {
        self.credential.store(None);
    }

    fn url(&self, resource: ResourceName, id: Option<&str>) -> Result<Url, ServiceError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ServiceError::transport("invalid API base URL"))?;
            segments.pop_if_empty().extend(["api", resource.slug()]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Entity>,
    ) -> Result<Collection, ServiceError> {
        let mut request: RequestBuilder = self.client.request(method.clone(), url.clone());
        if let Some(token) = self.credential.load_full() {
            request = request.bearer_auth(token.as_str());
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::transport(format!("{method} {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(ServiceError::status(status.as_u16(), message));
        }

        let collection = response
            .json::<Collection>()
            .await
            .map_err(|e| ServiceError::decode(e.to_string()))?;
        debug!(status = status.as_u16(), len = collection.len(), "collection received");
        Ok(collection)
    }
}

#[async_trait]
impl MutationService for HttpMutationClient {
    #[instrument(
        name = "console_pipeline.http.list",
        skip_all,
        fields(base = %self.base, resource = %resource)
    )]
    async fn list(&self, resource: ResourceName) -> Result<Collection, ServiceError> {
        let url = self.url(resource, None)?;
        self.send(Method::GET, url, None).await
    }

    #[instrument(
        name = "console_pipeline.http.create",
        skip_all,
        fields(base = %self.base, resource = %resource)
    )]
    async fn create(
        &self,
        resource: ResourceName,
        payload: Entity,
    ) -> Result<Collection, ServiceError> {
        let url = self.url(resource, None)?;
        self.send(Method::POST, url, Some(payload)).await
    }

    #[instrument(
        name = "console_pipeline.http.update",
        skip_all,
        fields(base = %self.base, resource = %resource, entity_id = %id)
    )]
    async fn update(
        &self,
        resource: ResourceName,
        id: &str,
        payload: Entity,
    ) -> Result<Collection, ServiceError> {
        let url = self.url(resource, Some(id))?;
        self.send(Method::PUT, url, Some(payload)).await
    }

    #[instrument(
        name = "console_pipeline.http.delete",
        skip_all,
        fields(base = %self.base, resource = %resource, entity_id = %id)
    )]
    async fn delete(&self, resource: ResourceName, id: &str) -> Result<Collection, ServiceError> {
        let url = self.url(resource, Some(id))?;
        self.send(Method::DELETE, url, None).await
    }
}
