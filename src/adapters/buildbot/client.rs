//! Buildbot master HTTP client.
//!
//! Reads the JSON status API and posts force-build forms. Reads are retried
//! with exponential backoff; force-build posts are sent exactly once since a
//! duplicate post would queue a second build.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use reqwest::{redirect, Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BuildbotConfig, BuildbotUrls, RawBuildSlot, RawPendingBuild, RecentBuilds};
use crate::domain::ports::BuildFarm;

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// [`BuildFarm`] backed by a buildbot master.
#[derive(Debug, Clone)]
pub struct BuildbotClient {
    http: Client,
    urls: BuildbotUrls,
    max_retries: u32,
    initial_backoff: Duration,
}

impl BuildbotClient {
    pub fn new(config: &BuildbotConfig) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| DomainError::HttpClient(format!("failed to build buildbot client: {e}")))?;
        Ok(Self {
            http,
            urls: BuildbotUrls::parse(&config.url)?,
            max_retries: config.max_retries,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        })
    }

    /// Override the first retry delay.
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    fn transport_error(builder: &str, message: String) -> DomainError {
        DomainError::Transport {
            builder: builder.to_string(),
            message,
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, builder: &str, url: &Url) -> Result<T, backoff::Error<DomainError>> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| backoff::Error::transient(Self::transport_error(builder, format!("GET {url} failed: {e}"))))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = Self::transport_error(builder, format!("GET {url} returned {status}: {body}"));
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            });
        }

        resp.json::<T>().await.map_err(|e| {
            backoff::Error::permanent(Self::transport_error(builder, format!("GET {url} returned invalid JSON: {e}")))
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, builder: &str, url: Url) -> DomainResult<T> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(MAX_BACKOFF)
            .with_max_elapsed_time(None)
            .build();
        let attempts = AtomicU32::new(0);
        let (attempts, url) = (&attempts, &url);

        retry(policy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed);
            self.get_once(builder, url).await.map_err(|err| match err {
                backoff::Error::Transient { err, .. } if attempt >= self.max_retries => backoff::Error::Permanent(err),
                backoff::Error::Transient { err, retry_after } => {
                    warn!(builder = %builder, attempt = attempt + 1, error = %err, "retrying buildbot request");
                    backoff::Error::Transient { err, retry_after }
                }
                permanent => permanent,
            })
        })
        .await
    }
}

#[async_trait]
impl BuildFarm for BuildbotClient {
    fn urls(&self) -> &BuildbotUrls {
        &self.urls
    }

    async fn pending_builds(&self, builder: &str) -> DomainResult<Vec<RawPendingBuild>> {
        self.get_json(builder, self.urls.pending_builds(builder)).await
    }

    async fn recent_builds(&self, builder: &str, lookback_count: usize) -> DomainResult<RecentBuilds> {
        let raw: BTreeMap<String, serde_json::Value> = self
            .get_json(builder, self.urls.recent_builds(builder, lookback_count))
            .await?;
        Ok(raw
            .into_iter()
            .filter_map(|(offset, build)| match offset.parse::<i64>() {
                Ok(offset) => Some((offset, build)),
                Err(_) => {
                    debug!(builder = %builder, offset = %offset, "skipping non-numeric build offset");
                    None
                }
            })
            .filter_map(|(offset, build)| match serde_json::from_value::<RawBuildSlot>(build) {
                Ok(slot) => Some((offset, slot)),
                Err(e) => {
                    debug!(builder = %builder, offset, error = %e, "dropping build offset without data");
                    None
                }
            })
            .collect())
    }

    async fn force_build(&self, builder: &str, properties: &BTreeMap<String, String>) -> DomainResult<()> {
        let url = self.urls.force_build(builder);
        let resp = self
            .http
            .post(url.clone())
            .form(properties)
            .send()
            .await
            .map_err(|e| Self::transport_error(builder, format!("POST {url} failed: {e}")))?;

        // Buildbot answers a successful force with a redirect to the builder page.
        let status = resp.status();
        if !status.is_success() && !status.is_redirection() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::transport_error(builder, format!("POST {url} returned {status}: {body}")));
        }
        debug!(builder = %builder, status = %status, "forced build");
        Ok(())
    }
}
