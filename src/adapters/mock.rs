//! Mock build farm and dashboard for testing.
//!
//! Both keep their state behind a shared lock so a test can reshape the
//! remote world between synchronization passes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BuildRequest, BuildRequestBatch, BuildRequestId, BuildRequestUpdate, BuildbotUrls, RawPendingBuild,
    RecentBuilds, ReferenceSnapshot, SlaveAuth, TestGroup,
};
use crate::domain::ports::{BuildFarm, Dashboard, TriggerableReport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A force-build call the mock farm accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedBuild {
    pub builder: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct FarmState {
    pending: HashMap<String, Vec<RawPendingBuild>>,
    recent: HashMap<String, RecentBuilds>,
    failing: HashSet<String>,
    rejecting: HashSet<String>,
    forced: Vec<ForcedBuild>,
    recent_lookbacks: HashMap<String, Vec<usize>>,
    submitted_at: f64,
}

/// Build farm that queues forced builds as pending builds.
#[derive(Debug, Clone)]
pub struct MockBuildFarm {
    urls: BuildbotUrls,
    state: Arc<Mutex<FarmState>>,
}

impl MockBuildFarm {
    /// Create an empty farm. `base_url` must be an absolute URL.
    pub fn new(base_url: &str) -> Self {
        let urls = BuildbotUrls::parse(base_url)
            .or_else(|_| BuildbotUrls::parse("http://localhost/"))
            .unwrap_or_else(|_| unreachable!("static URL parses"));
        Self {
            urls,
            state: Arc::new(Mutex::new(FarmState::default())),
        }
    }

    pub fn with_pending(self, builder: &str, pending: Vec<RawPendingBuild>) -> Self {
        self.set_pending(builder, pending);
        self
    }

    pub fn with_recent(self, builder: &str, recent: RecentBuilds) -> Self {
        self.set_recent(builder, recent);
        self
    }

    /// Make every fetch and submission for `builder` fail.
    pub fn failing(self, builder: &str) -> Self {
        lock(&self.state).failing.insert(builder.to_string());
        self
    }

    /// Accept polls but fail force-build calls for `builder`.
    pub fn rejecting_submissions(self, builder: &str) -> Self {
        lock(&self.state).rejecting.insert(builder.to_string());
        self
    }

    pub fn set_pending(&self, builder: &str, pending: Vec<RawPendingBuild>) {
        lock(&self.state).pending.insert(builder.to_string(), pending);
    }

    pub fn set_recent(&self, builder: &str, recent: RecentBuilds) {
        lock(&self.state).recent.insert(builder.to_string(), recent);
    }

    pub fn forced_builds(&self) -> Vec<ForcedBuild> {
        lock(&self.state).forced.clone()
    }

    pub fn recent_lookbacks(&self, builder: &str) -> Vec<usize> {
        lock(&self.state)
            .recent_lookbacks
            .get(builder)
            .cloned()
            .unwrap_or_default()
    }

    fn check_available(state: &FarmState, builder: &str) -> DomainResult<()> {
        if state.failing.contains(builder) {
            return Err(DomainError::Transport {
                builder: builder.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BuildFarm for MockBuildFarm {
    fn urls(&self) -> &BuildbotUrls {
        &self.urls
    }

    async fn pending_builds(&self, builder: &str) -> DomainResult<Vec<RawPendingBuild>> {
        let state = lock(&self.state);
        Self::check_available(&state, builder)?;
        Ok(state.pending.get(builder).cloned().unwrap_or_default())
    }

    async fn recent_builds(&self, builder: &str, lookback_count: usize) -> DomainResult<RecentBuilds> {
        let mut state = lock(&self.state);
        Self::check_available(&state, builder)?;
        state
            .recent_lookbacks
            .entry(builder.to_string())
            .or_default()
            .push(lookback_count);
        let lookback = i64::try_from(lookback_count).unwrap_or(i64::MAX);
        Ok(state
            .recent
            .get(builder)
            .map(|recent| {
                recent
                    .iter()
                    .filter(|(offset, _)| **offset >= -lookback)
                    .map(|(offset, slot)| (*offset, slot.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn force_build(&self, builder: &str, properties: &BTreeMap<String, String>) -> DomainResult<()> {
        let mut state = lock(&self.state);
        Self::check_available(&state, builder)?;
        if state.rejecting.contains(builder) {
            return Err(DomainError::Transport {
                builder: builder.to_string(),
                message: "force build rejected".to_string(),
            });
        }

        state.submitted_at += 1.0;
        let pending = RawPendingBuild {
            properties: properties
                .iter()
                .map(|(name, value)| vec![json!(name), json!(value), json!("Force Build Form")])
                .collect(),
            submitted_at: Some(state.submitted_at),
        };
        state.pending.entry(builder.to_string()).or_default().push(pending);
        state.forced.push(ForcedBuild {
            builder: builder.to_string(),
            properties: properties.clone(),
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DashboardState {
    manifest: ReferenceSnapshot,
    requests: Vec<BuildRequest>,
    test_groups: Vec<TestGroup>,
    updates: Vec<BTreeMap<BuildRequestId, BuildRequestUpdate>>,
    reports: Vec<TriggerableReport>,
    auths: Vec<Option<SlaveAuth>>,
    fail_updates: bool,
}

/// Dashboard holding requests in memory and applying updates to them.
#[derive(Debug, Clone, Default)]
pub struct MockDashboard {
    state: Arc<Mutex<DashboardState>>,
}

impl MockDashboard {
    pub fn new(manifest: ReferenceSnapshot) -> Self {
        let dashboard = Self::default();
        lock(&dashboard.state).manifest = manifest;
        dashboard
    }

    pub fn with_requests(self, requests: Vec<BuildRequest>) -> Self {
        lock(&self.state).requests.extend(requests);
        self
    }

    pub fn with_test_group(self, group: TestGroup) -> Self {
        lock(&self.state).test_groups.push(group);
        self
    }

    pub fn failing_updates(self) -> Self {
        lock(&self.state).fail_updates = true;
        self
    }

    pub fn request(&self, id: BuildRequestId) -> Option<BuildRequest> {
        lock(&self.state).requests.iter().find(|request| request.id == id).cloned()
    }

    pub fn update_batches(&self) -> Vec<BTreeMap<BuildRequestId, BuildRequestUpdate>> {
        lock(&self.state).updates.clone()
    }

    pub fn reports(&self) -> Vec<TriggerableReport> {
        lock(&self.state).reports.clone()
    }

    pub fn auths(&self) -> Vec<Option<SlaveAuth>> {
        lock(&self.state).auths.clone()
    }
}

#[async_trait]
impl Dashboard for MockDashboard {
    async fn fetch_manifest(&self) -> DomainResult<ReferenceSnapshot> {
        Ok(lock(&self.state).manifest.clone())
    }

    async fn fetch_build_requests(
        &self,
        triggerable: &str,
        _reference: &ReferenceSnapshot,
    ) -> DomainResult<BuildRequestBatch> {
        let state = lock(&self.state);
        Ok(BuildRequestBatch {
            requests: state
                .requests
                .iter()
                .filter(|request| request.triggerable == triggerable)
                .cloned()
                .collect(),
            test_groups: state.test_groups.clone(),
        })
    }

    async fn update_build_requests(
        &self,
        _triggerable: &str,
        updates: &BTreeMap<BuildRequestId, BuildRequestUpdate>,
        auth: Option<&SlaveAuth>,
    ) -> DomainResult<()> {
        let mut state = lock(&self.state);
        if state.fail_updates {
            return Err(DomainError::Dashboard("update rejected".to_string()));
        }
        for request in &mut state.requests {
            if let Some(update) = updates.get(&request.id) {
                request.status = update.status;
                request.status_url.clone_from(&update.url);
            }
        }
        state.updates.push(updates.clone());
        state.auths.push(auth.cloned());
        Ok(())
    }

    async fn update_triggerable(&self, report: &TriggerableReport, auth: Option<&SlaveAuth>) -> DomainResult<()> {
        let mut state = lock(&self.state);
        state.reports.push(report.clone());
        state.auths.push(auth.cloned());
        Ok(())
    }
}

/// Raw buildbot payloads shaped like the ones a real master returns.
///
/// Requests are identified through the `build_request_id` property and slaves
/// through `slavename`.
pub mod samples {
    use super::{json, RawPendingBuild, Value};

    pub const REQUEST_PROPERTY: &str = "build_request_id";
    pub const SLAVE_PROPERTY: &str = "slavename";

    pub fn pending_build(request_id: u64, slave: Option<&str>, submitted_at: f64) -> RawPendingBuild {
        let mut properties = vec![vec![
            json!(REQUEST_PROPERTY),
            json!(request_id.to_string()),
            json!("Force Build Form"),
        ]];
        if let Some(slave) = slave {
            properties.push(vec![json!(SLAVE_PROPERTY), json!(slave), json!("Force Build Form")]);
        }
        RawPendingBuild {
            properties,
            submitted_at: Some(submitted_at),
        }
    }

    pub fn in_progress_build_json(request_id: u64, number: u64, slave: &str) -> Value {
        json!({
            "builderName": "ABTest-iPad-RunBenchmark-Tests",
            "currentStep": { "name": "Some step", "isStarted": true },
            "number": number,
            "properties": [
                [REQUEST_PROPERTY, request_id.to_string(), "Force Build Form"],
                ["buildnumber", number, "Build"],
                [SLAVE_PROPERTY, slave, "BuildSlave"]
            ],
            "slave": slave,
            "times": [1_458_718_657.581_628, null]
        })
    }

    /// A finished build; `results` of `None` leaves the field out.
    pub fn finished_build_json(request_id: u64, number: u64, results: Option<i64>) -> Value {
        let mut build = json!({
            "builderName": "ABTest-iPad-RunBenchmark-Tests",
            "currentStep": null,
            "number": number,
            "properties": [
                [REQUEST_PROPERTY, request_id.to_string(), "Force Build Form"],
                ["buildnumber", number, "Build"]
            ],
            "times": [1_458_718_657.581_628, 1_458_719_100.723_541]
        });
        if let Some(results) = results {
            build["results"] = json!(results);
        }
        build
    }
}
