//! The scheduling coordinator of one triggerable.
//!
//! A pass reads the open build requests, polls every builder, reconciles what
//! it saw, then submits at most one request per free slot. Every decision is
//! made after all polls have joined, and every change of a pass is persisted
//! in a single dashboard call.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BuildRequest, BuildRequestBatch, BuildRequestId, BuildRequestStatus, BuildRequestUpdate,
    ReferenceSnapshot, TestGroupId, TriggerableConfig,
};
use crate::domain::ports::{BuildFarm, Dashboard, RepositoryGroupReport, TestPlatformPair, TriggerableReport};
use crate::services::builder_syncer::{BuilderSyncer, PlannedSubmission};
use crate::services::config_validator::ConfigValidator;

/// Outcome of one [`Triggerable::sync_once`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Every status change persisted by the pass.
    pub updates: BTreeMap<BuildRequestId, BuildRequestUpdate>,
    /// Requests whose force-build was accepted, in submission order.
    pub submitted: Vec<BuildRequestId>,
    /// Builders whose poll failed and were left out of scheduling.
    pub failed_builders: Vec<String>,
}

impl SyncReport {
    pub fn status_of(&self, id: BuildRequestId) -> Option<BuildRequestStatus> {
        self.updates.get(&id).map(|update| update.status)
    }
}

pub struct Triggerable {
    document: Value,
    farm: Arc<dyn BuildFarm>,
    dashboard: Arc<dyn Dashboard>,
    reference: ReferenceSnapshot,
    config: Option<TriggerableConfig>,
    syncers: Vec<BuilderSyncer>,
}

impl Triggerable {
    /// Create a triggerable from its raw configuration document.
    ///
    /// Nothing is validated until [`Self::init_syncers`] runs.
    pub fn new(document: Value, farm: Arc<dyn BuildFarm>, dashboard: Arc<dyn Dashboard>) -> Self {
        Self {
            document,
            farm,
            dashboard,
            reference: ReferenceSnapshot::default(),
            config: None,
            syncers: Vec::new(),
        }
    }

    pub fn config(&self) -> Option<&TriggerableConfig> {
        self.config.as_ref()
    }

    pub fn syncers(&self) -> &[BuilderSyncer] {
        &self.syncers
    }

    /// Fetch the manifest, validate the configuration against it and rebuild
    /// one syncer per builder.
    ///
    /// A configuration error leaves the previous configuration in place.
    #[instrument(skip(self))]
    pub async fn init_syncers(&mut self) -> DomainResult<&TriggerableConfig> {
        let reference = self.dashboard.fetch_manifest().await?;
        let config = ConfigValidator::new(&reference)
            .validate(&self.document)
            .inspect_err(|err| error!(error = %err, "invalid triggerable configuration"))?;

        self.syncers = config
            .builders
            .iter()
            .map(|definition| BuilderSyncer::new(Arc::clone(&self.farm), definition.clone()))
            .collect();
        info!(
            triggerable = %config.name,
            builders = self.syncers.len(),
            repository_groups = config.repository_groups.len(),
            "initialized syncers"
        );
        self.reference = reference;
        Ok(self.config.insert(config))
    }

    /// Register the triggerable's test configurations and repository groups.
    #[instrument(skip(self))]
    pub async fn update_triggerable(&self) -> DomainResult<()> {
        let config = self.config.as_ref().ok_or(DomainError::Uninitialized)?;
        let report = TriggerableReport {
            name: config.name.clone(),
            configurations: config
                .test_platform_pairs()
                .into_iter()
                .map(|(test, platform)| TestPlatformPair { test, platform })
                .collect(),
            repository_groups: config
                .repository_groups
                .iter()
                .map(|group| RepositoryGroupReport {
                    name: group.name.clone(),
                    description: group.description.clone(),
                    accepts_roots: group.accepts_roots,
                    repositories: group.repositories.clone(),
                })
                .collect(),
        };
        self.dashboard
            .update_triggerable(&report, config.slave_auth.as_ref())
            .await?;
        info!(
            triggerable = %config.name,
            configurations = report.configurations.len(),
            "updated triggerable"
        );
        Ok(())
    }

    /// Run one synchronization pass.
    #[instrument(skip(self), fields(triggerable = tracing::field::Empty))]
    pub async fn sync_once(&mut self) -> DomainResult<SyncReport> {
        let config = self.config.as_ref().ok_or(DomainError::Uninitialized)?;
        tracing::Span::current().record("triggerable", config.name.as_str());

        let batch = self
            .dashboard
            .fetch_build_requests(&config.name, &self.reference)
            .await?;

        let polls = join_all(self.syncers.iter_mut().map(|syncer| syncer.pull(config))).await;
        let mut report = SyncReport::default();
        for (syncer, result) in self.syncers.iter().zip(polls) {
            if let Err(err) = result {
                warn!(builder = %syncer.builder_name(), error = %err, "failed to poll builder");
                report.failed_builders.push(syncer.builder_name().to_string());
            }
        }

        let mut pass = Pass::new(batch);
        let observed = pass.reconcile(&self.syncers);
        if report.failed_builders.is_empty() {
            pass.fail_missing_builds(&observed);
        }
        pass.cascade_failures();

        let planned = pass.plan_submissions(config, &mut self.syncers);
        let outcomes = join_all(
            planned
                .iter()
                .map(|(index, submission)| self.syncers[*index].submit(submission)),
        )
        .await;
        for ((_, submission), outcome) in planned.iter().zip(outcomes) {
            if outcome.is_ok() {
                info!(
                    builder = %submission.builder,
                    build_request_id = submission.request_id,
                    slave = submission.slave.as_deref().unwrap_or(""),
                    "scheduled build request"
                );
                pass.record(
                    submission.request_id,
                    BuildRequestStatus::Scheduled,
                    Some(submission.url.clone()),
                    None,
                );
                report.submitted.push(submission.request_id);
            }
        }

        if !pass.updates.is_empty() {
            self.dashboard
                .update_build_requests(&config.name, &pass.updates, config.slave_auth.as_ref())
                .await?;
        }
        info!(
            updates = pass.updates.len(),
            submitted = report.submitted.len(),
            failed_builders = report.failed_builders.len(),
            "sync pass finished"
        );
        report.updates = pass.updates;
        Ok(report)
    }
}

/// Working state of one pass: the requests with this pass's changes applied.
struct Pass {
    requests: Vec<BuildRequest>,
    positions: HashMap<BuildRequestId, usize>,
    groups_by_request: HashMap<BuildRequestId, TestGroupId>,
    group_order: Vec<TestGroupId>,
    updates: BTreeMap<BuildRequestId, BuildRequestUpdate>,
}

impl Pass {
    fn new(mut batch: BuildRequestBatch) -> Self {
        batch
            .requests
            .sort_by_key(|request| (request.test_group, request.order, request.id));

        let positions = batch
            .requests
            .iter()
            .enumerate()
            .map(|(position, request)| (request.id, position))
            .collect();
        let groups_by_request = batch
            .requests
            .iter()
            .map(|request| (request.id, request.test_group))
            .collect();

        // User-authored groups first, then by creation.
        let mut group_keys: BTreeMap<TestGroupId, (bool, DateTime<Utc>)> = BTreeMap::new();
        for request in &batch.requests {
            let key = batch.test_group(request.test_group).map_or(
                (true, request.created_at),
                |group| (group.author.is_none(), group.created_at),
            );
            group_keys
                .entry(request.test_group)
                .and_modify(|existing| *existing = (*existing).min(key))
                .or_insert(key);
        }
        let mut group_order: Vec<_> = group_keys.into_iter().collect();
        group_order.sort_by_key(|(id, key)| (*key, *id));

        Self {
            requests: batch.requests,
            positions,
            groups_by_request,
            group_order: group_order.into_iter().map(|(id, _)| id).collect(),
            updates: BTreeMap::new(),
        }
    }

    fn record(
        &mut self,
        id: BuildRequestId,
        status: BuildRequestStatus,
        url: Option<String>,
        build_number: Option<u64>,
    ) {
        let Some(&position) = self.positions.get(&id) else {
            return;
        };
        let request = &mut self.requests[position];
        if request.status != status {
            info!(build_request_id = id, from = %request.status, to = %status, "build request status changed");
        }
        request.status = status;
        if url.is_some() {
            request.status_url.clone_from(&url);
        }
        self.updates.insert(
            id,
            BuildRequestUpdate {
                status,
                url: request.status_url.clone(),
                build_number,
            },
        );
    }

    /// Apply every observation with a known request id; returns the ids seen.
    fn reconcile(&mut self, syncers: &[BuilderSyncer]) -> HashSet<BuildRequestId> {
        let mut observed = HashSet::new();
        for entry in syncers.iter().flat_map(BuilderSyncer::entries) {
            let Some(id) = entry.build_request_id else {
                continue;
            };
            let Some(&position) = self.positions.get(&id) else {
                debug!(builder = %entry.builder, build_request_id = id, "ignoring foreign build");
                continue;
            };
            observed.insert(id);

            let current = self.requests[position].status;
            let has_url = self.requests[position].status_url.is_some();
            if let Some(status) = entry.status_update_for(current) {
                self.record(id, status, Some(entry.url.clone()), entry.build_number);
            } else if !has_url {
                self.record(id, current, Some(entry.url.clone()), entry.build_number);
            }
        }
        observed
    }

    fn fail_missing_builds(&mut self, observed: &HashSet<BuildRequestId>) {
        let missing: Vec<_> = self
            .requests
            .iter()
            .filter(|request| {
                matches!(request.status, BuildRequestStatus::Scheduled | BuildRequestStatus::Running)
                    && !observed.contains(&request.id)
            })
            .map(|request| request.id)
            .collect();
        for id in missing {
            warn!(build_request_id = id, "scheduled build request is missing from every builder");
            self.record(id, BuildRequestStatus::Failed, None, None);
        }
    }

    fn cascade_failures(&mut self) {
        let failed_groups: HashSet<TestGroupId> = self
            .requests
            .iter()
            .filter(|request| request.is_build() && request.status == BuildRequestStatus::Failed)
            .map(|request| request.test_group)
            .collect();
        let doomed: Vec<_> = self
            .requests
            .iter()
            .filter(|request| {
                failed_groups.contains(&request.test_group) && request.status == BuildRequestStatus::Pending
            })
            .map(|request| request.id)
            .collect();
        for id in doomed {
            self.record(id, BuildRequestStatus::Failed, None, None);
        }
    }

    fn group_requests(&self, group: TestGroupId) -> impl Iterator<Item = &BuildRequest> {
        self.requests.iter().filter(move |request| request.test_group == group)
    }

    /// The request a group wants submitted next, if any.
    fn next_request(&self, group: TestGroupId) -> Option<&BuildRequest> {
        if self
            .group_requests(group)
            .any(|request| request.status == BuildRequestStatus::Scheduled)
        {
            return None;
        }
        for request in self.group_requests(group) {
            if request.status == BuildRequestStatus::Pending {
                return Some(request);
            }
            if request.is_build() && request.status != BuildRequestStatus::Completed {
                return None;
            }
        }
        None
    }

    /// Where earlier requests of the same kind as `request` were observed.
    fn placement(&self, request: &BuildRequest, syncers: &[BuilderSyncer]) -> Option<(usize, Option<String>)> {
        let mut same_kind = self
            .group_requests(request.test_group)
            .filter(|sibling| sibling.is_build() == request.is_build());
        if same_kind.next().is_some_and(|first| first.id == request.id) {
            return None;
        }
        self.group_requests(request.test_group)
            .filter(|sibling| sibling.is_build() == request.is_build() && sibling.id != request.id)
            .find_map(|sibling| {
                syncers.iter().enumerate().find_map(|(index, syncer)| {
                    syncer
                        .entries()
                        .iter()
                        .find(|entry| entry.build_request_id == Some(sibling.id))
                        .map(|entry| (index, entry.slave_name.clone()))
                })
            })
    }

    fn plan_submissions(
        &self,
        config: &TriggerableConfig,
        syncers: &mut [BuilderSyncer],
    ) -> Vec<(usize, PlannedSubmission)> {
        let mut planned = Vec::new();
        for &group in &self.group_order {
            let Some(request) = self.next_request(group) else {
                continue;
            };
            let placement = self.placement(request, syncers);
            let candidates: Vec<usize> = match &placement {
                Some((index, _)) => vec![*index],
                None => (0..syncers.len()).collect(),
            };
            let required_slave = placement.as_ref().and_then(|(_, slave)| slave.as_deref());

            for index in candidates {
                match syncers[index].schedule_if_available(
                    config,
                    request,
                    &self.requests,
                    required_slave,
                    &self.groups_by_request,
                ) {
                    Ok(Some(submission)) => {
                        planned.push((index, submission));
                        break;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(build_request_id = request.id, error = %err, "cannot schedule build request");
                        break;
                    }
                }
            }
        }
        planned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{samples, MockBuildFarm, MockDashboard};
    use crate::domain::errors::ConfigurationError;
    use crate::domain::models::TestGroup;
    use crate::services::test_support::{reference, request, timestamp, webkit_commit_set, webkit_config_json};
    use serde_json::json;

    fn triggerable(farm: &MockBuildFarm, dashboard: &MockDashboard) -> Triggerable {
        Triggerable::new(webkit_config_json(), Arc::new(farm.clone()), Arc::new(dashboard.clone()))
    }

    #[tokio::test]
    async fn test_sync_before_init_is_rejected() {
        let farm = MockBuildFarm::new("http://build.webkit.org");
        let dashboard = MockDashboard::new(reference());
        let mut triggerable = triggerable(&farm, &dashboard);

        assert!(matches!(triggerable.sync_once().await, Err(DomainError::Uninitialized)));
        assert!(matches!(triggerable.update_triggerable().await, Err(DomainError::Uninitialized)));
    }

    #[tokio::test]
    async fn test_init_syncers_creates_one_syncer_per_builder() {
        let farm = MockBuildFarm::new("http://build.webkit.org");
        let dashboard = MockDashboard::new(reference());
        let mut triggerable = triggerable(&farm, &dashboard);

        let config = triggerable.init_syncers().await.unwrap();
        assert_eq!(config.name, "build-webkit");
        let names: Vec<_> = triggerable.syncers().iter().map(BuilderSyncer::builder_name).collect();
        assert_eq!(names, vec!["some tester", "some builder", "other builder"]);
    }

    #[tokio::test]
    async fn test_init_syncers_rejects_config_unknown_to_manifest() {
        let farm = MockBuildFarm::new("http://build.webkit.org");
        let dashboard = MockDashboard::new(reference());
        let mut document = webkit_config_json();
        document["testConfigurations"][0]["platforms"] = json!(["Unknown platform"]);
        let mut triggerable = Triggerable::new(document, Arc::new(farm), Arc::new(dashboard));

        let err = triggerable.init_syncers().await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Configuration(ConfigurationError::InvalidPlatform(name)) if name == "Unknown platform"
        ));
        assert!(triggerable.config().is_none());
    }

    #[tokio::test]
    async fn test_update_triggerable_reports_configurations_and_groups() {
        let farm = MockBuildFarm::new("http://build.webkit.org");
        let dashboard = MockDashboard::new(reference());
        let mut triggerable = triggerable(&farm, &dashboard);
        triggerable.init_syncers().await.unwrap();

        triggerable.update_triggerable().await.unwrap();

        let reports = dashboard.reports();
        assert_eq!(reports.len(), 1);
        let report = serde_json::to_value(&reports[0]).unwrap();
        assert_eq!(report["triggerable"], "build-webkit");
        assert_eq!(report["configurations"], json!([{ "test": 5, "platform": 65 }]));
        assert_eq!(report["repositoryGroups"][0]["name"], "webkit");
        assert_eq!(report["repositoryGroups"][0]["acceptsRoots"], true);
        assert_eq!(
            dashboard.auths()[0].as_ref().map(|auth| auth.name.as_str()),
            Some("sync-slave")
        );
    }

    #[tokio::test]
    async fn test_reconcile_records_url_without_status_change() {
        let commit_set = Arc::new(webkit_commit_set(1));
        let farm = MockBuildFarm::new("http://build.webkit.org").with_recent(
            "some tester",
            [(-1, serde_json::from_value(samples::in_progress_build_json(701, 12, "slave-1")).unwrap())]
                .into_iter()
                .collect(),
        );
        let dashboard = MockDashboard::new(reference())
            .with_requests(vec![request(701, 1, 0, BuildRequestStatus::Running, &commit_set)])
            .with_test_group(TestGroup { id: 1, author: None, created_at: timestamp(0) });
        let mut triggerable = triggerable(&farm, &dashboard);
        triggerable.init_syncers().await.unwrap();

        let report = triggerable.sync_once().await.unwrap();

        let update = &report.updates[&701];
        assert_eq!(update.status, BuildRequestStatus::Running);
        assert_eq!(update.url.as_deref(), Some("http://build.webkit.org/builders/some%20tester/builds/12"));
        assert_eq!(update.build_number, Some(12));
        assert!(report.submitted.is_empty());
    }

    #[tokio::test]
    async fn test_failed_persist_fails_the_pass() {
        let commit_set = Arc::new(webkit_commit_set(1));
        let farm = MockBuildFarm::new("http://build.webkit.org");
        let dashboard = MockDashboard::new(reference())
            .with_requests(vec![request(701, 1, 0, BuildRequestStatus::Pending, &commit_set)])
            .failing_updates();
        let mut triggerable = triggerable(&farm, &dashboard);
        triggerable.init_syncers().await.unwrap();

        assert!(matches!(triggerable.sync_once().await, Err(DomainError::Dashboard(_))));
        assert_eq!(dashboard.request(701).unwrap().status, BuildRequestStatus::Pending);
    }
}
