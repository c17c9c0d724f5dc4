//! Build farm port - the remote buildbot surface.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BuildbotUrls, RawPendingBuild, RecentBuilds};

/// Remote build farm that queues and runs builds for named builders.
///
/// Implementations own transport concerns (timeouts, retries of reads).
/// Builder names are passed unescaped.
#[async_trait]
pub trait BuildFarm: Send + Sync {
    /// URL layout used to derive canonical build URLs.
    fn urls(&self) -> &BuildbotUrls;

    /// Builds queued on `builder` that have not started.
    async fn pending_builds(&self, builder: &str) -> DomainResult<Vec<RawPendingBuild>>;

    /// The latest `lookback_count` builds of `builder`, keyed by negative offset.
    async fn recent_builds(&self, builder: &str, lookback_count: usize) -> DomainResult<RecentBuilds>;

    /// Queue a build on `builder` with the given form properties.
    async fn force_build(&self, builder: &str, properties: &BTreeMap<String, String>) -> DomainResult<()>;
}
