//! Dashboard port - the persistence collaborator holding build requests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    BuildRequestBatch, BuildRequestId, BuildRequestUpdate, PlatformId, ReferenceSnapshot,
    RepositoryGroupMember, SlaveAuth, TestId,
};

/// A (test, platform) pair a triggerable can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TestPlatformPair {
    pub test: TestId,
    pub platform: PlatformId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryGroupReport {
    pub name: String,
    pub description: Option<String>,
    pub accepts_roots: bool,
    pub repositories: Vec<RepositoryGroupMember>,
}

/// What a triggerable can do, registered with the dashboard before syncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerableReport {
    #[serde(rename = "triggerable")]
    pub name: String,
    pub configurations: Vec<TestPlatformPair>,
    pub repository_groups: Vec<RepositoryGroupReport>,
}

/// Stores build requests, commit sets and test groups.
///
/// `auth` overrides the credentials the implementation was configured with.
#[async_trait]
pub trait Dashboard: Send + Sync {
    async fn fetch_manifest(&self) -> DomainResult<ReferenceSnapshot>;

    /// Open build requests of `triggerable` with their commit sets and groups.
    ///
    /// Repository ids in commit sets are resolved through `reference`.
    async fn fetch_build_requests(
        &self,
        triggerable: &str,
        reference: &ReferenceSnapshot,
    ) -> DomainResult<BuildRequestBatch>;

    /// Persist a batch of status changes atomically.
    async fn update_build_requests(
        &self,
        triggerable: &str,
        updates: &BTreeMap<BuildRequestId, BuildRequestUpdate>,
        auth: Option<&SlaveAuth>,
    ) -> DomainResult<()>;

    async fn update_triggerable(&self, report: &TriggerableReport, auth: Option<&SlaveAuth>) -> DomainResult<()>;
}
