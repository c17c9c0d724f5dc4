//! Dashboard HTTP client.
//!
//! Every response is a JSON object whose `status` must be `"OK"`; any other
//! status is reported as [`DomainError::Dashboard`] with the status text.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::models::{BuildRequestsResponse, Credentials, ManifestResponse, StatusResponse, UpdateBuildRequests, UpdateTriggerable};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BuildRequestBatch, BuildRequestId, BuildRequestUpdate, DashboardConfig, ReferenceSnapshot, SlaveAuth,
};
use crate::domain::ports::{Dashboard, TriggerableReport};

/// [`Dashboard`] backed by the performance dashboard's JSON API.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: Client,
    base: Url,
    /// Credentials used when a write does not carry its own.
    auth: Option<SlaveAuth>,
}

impl DashboardClient {
    pub fn new(config: &DashboardConfig) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::HttpClient(format!("failed to build dashboard client: {e}")))?;
        let base = Url::parse(&config.url)
            .map_err(|e| DomainError::Dashboard(format!("invalid dashboard URL {}: {e}", config.url)))?;
        let auth = match (&config.slave_name, &config.slave_password) {
            (Some(name), Some(password)) => Some(SlaveAuth {
                name: name.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        Ok(Self { http, base, auth })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn credentials<'a>(&'a self, auth: Option<&'a SlaveAuth>) -> Option<Credentials<'a>> {
        auth.or(self.auth.as_ref()).map(Credentials::from)
    }

    async fn parse<T: DeserializeOwned>(url: &Url, resp: Response) -> DomainResult<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::Dashboard(format!("{url} returned {status}: {body}")));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| DomainError::UnexpectedResponse(format!("{url} returned invalid JSON: {e}")))?;
        let envelope: StatusResponse = serde_json::from_value(body.clone())
            .map_err(|e| DomainError::UnexpectedResponse(format!("{url} returned no status: {e}")))?;
        if envelope.status != "OK" {
            return Err(DomainError::Dashboard(format!("{url} returned status {}", envelope.status)));
        }
        serde_json::from_value(body)
            .map_err(|e| DomainError::UnexpectedResponse(format!("{url} returned an unexpected payload: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> DomainResult<T> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DomainError::Dashboard(format!("GET {url} failed: {e}")))?;
        Self::parse(&url, resp).await
    }

    async fn post<B: Serialize + Sync>(&self, url: Url, body: &B) -> DomainResult<()> {
        let resp = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::Dashboard(format!("POST {url} failed: {e}")))?;
        Self::parse::<StatusResponse>(&url, resp).await.map(|_| ())
    }
}

#[async_trait]
impl Dashboard for DashboardClient {
    async fn fetch_manifest(&self) -> DomainResult<ReferenceSnapshot> {
        let manifest: ManifestResponse = self.get(self.endpoint(&["api", "manifest"])).await?;
        manifest.into_snapshot()
    }

    async fn fetch_build_requests(
        &self,
        triggerable: &str,
        reference: &ReferenceSnapshot,
    ) -> DomainResult<BuildRequestBatch> {
        let response: BuildRequestsResponse = self
            .get(self.endpoint(&["api", "build-requests", triggerable]))
            .await?;
        let batch = response.into_batch(reference, self.base.as_str())?;
        debug!(triggerable = %triggerable, requests = batch.requests.len(), "fetched build requests");
        Ok(batch)
    }

    async fn update_build_requests(
        &self,
        triggerable: &str,
        updates: &BTreeMap<BuildRequestId, BuildRequestUpdate>,
        auth: Option<&SlaveAuth>,
    ) -> DomainResult<()> {
        let body = UpdateBuildRequests {
            credentials: self.credentials(auth),
            build_request_updates: updates,
        };
        self.post(self.endpoint(&["api", "build-requests", triggerable]), &body)
            .await
    }

    async fn update_triggerable(&self, report: &TriggerableReport, auth: Option<&SlaveAuth>) -> DomainResult<()> {
        let body = UpdateTriggerable {
            credentials: self.credentials(auth),
            report,
        };
        self.post(self.endpoint(&["api", "update-triggerable", ""]), &body)
            .await
    }
}
