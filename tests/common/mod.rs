//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use buildbot_sync::adapters::mock::{MockBuildFarm, MockDashboard};
use buildbot_sync::domain::models::{
    BuildRequest, BuildRequestStatus, CommitSet, CommitSetItem, RawBuildSlot, RecentBuilds, ReferenceSnapshot,
    TestGroup,
};
use buildbot_sync::Triggerable;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

pub const BUILDBOT_URL: &str = "http://build.webkit.org";
pub const TESTER: &str = "some tester";
pub const BUILDER: &str = "some builder";
pub const OTHER_BUILDER: &str = "other builder";
pub const SOME_PLATFORM: u64 = 65;
pub const SOME_TEST: u64 = 5;

pub fn reference() -> ReferenceSnapshot {
    ReferenceSnapshot::default()
        .with_repository(11, "WebKit", None)
        .with_repository(16, "Shared", None)
        .with_platform(SOME_PLATFORM, "Some platform")
        .with_test(SOME_TEST, "Some test", None)
}

/// One tester and two interchangeable builders.
pub fn webkit_config() -> Value {
    json!({
        "triggerableName": "build-webkit",
        "buildRequestArgument": "build_request_id",
        "slaveName": "sync-slave",
        "slavePassword": "password",
        "repositoryGroups": {
            "webkit": {
                "repositories": { "WebKit": { "acceptsPatch": true }, "Shared": {} },
                "testProperties": {
                    "wk": { "revision": "WebKit" },
                    "shared": { "revision": "Shared" },
                    "roots": { "roots": {} }
                },
                "buildProperties": {
                    "wk": { "revision": "WebKit" },
                    "webkit-patch": { "patch": "WebKit" },
                    "checkbox": { "ifRepositorySet": ["WebKit"], "value": "build-webkit" }
                },
                "acceptsRoots": true
            }
        },
        "types": { "some-test": { "test": ["Some test"] } },
        "builders": {
            "builder-1": { "builder": TESTER, "properties": { "forcescheduler": "force-ab-tests" } },
            "builder-2": { "builder": BUILDER, "properties": { "forcescheduler": "force-ab-builds" } },
            "builder-3": { "builder": OTHER_BUILDER, "properties": { "forcescheduler": "force-ab-builds" } }
        },
        "testConfigurations": [
            { "builders": ["builder-1"], "types": ["some-test"], "platforms": ["Some platform"] }
        ],
        "buildConfigurations": [
            { "builders": ["builder-2", "builder-3"], "platforms": ["Some platform"] }
        ]
    })
}

/// The same triggerable with the tester split into two slaves.
pub fn slave_list_config() -> Value {
    let mut config = webkit_config();
    config["slaveArgument"] = json!("slavename");
    config["builders"]["builder-1"]["slaveList"] = json!(["tester-0", "tester-1"]);
    config
}

pub fn commit_set(id: u64) -> Arc<CommitSet> {
    Arc::new(
        CommitSet::new(id)
            .with_item(CommitSetItem::new("WebKit", "191622").requiring_build())
            .with_item(CommitSetItem::new("Shared", "80229")),
    )
}

pub fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_458_700_000 + seconds, 0).single().unwrap_or_default()
}

/// A `webkit` request on "Some platform"; a build step when `order < 0`.
pub fn request(id: u64, group: u64, order: i32, status: BuildRequestStatus) -> BuildRequest {
    BuildRequest {
        id,
        triggerable: "build-webkit".to_string(),
        repository_group: "webkit".to_string(),
        platform: SOME_PLATFORM,
        test: (order >= 0).then_some(SOME_TEST),
        order,
        commit_set: commit_set(group),
        status,
        status_url: None,
        build_id: None,
        test_group: group,
        created_at: timestamp(i64::try_from(id).unwrap()),
    }
}

pub fn group(id: u64, author: Option<&str>, created: i64) -> TestGroup {
    TestGroup {
        id,
        author: author.map(str::to_string),
        created_at: timestamp(created),
    }
}

/// Recent builds keyed by their negative offsets, newest first.
pub fn recent(builds: Vec<Value>) -> RecentBuilds {
    builds
        .into_iter()
        .zip(1_i64..)
        .map(|(build, offset)| {
            let slot: RawBuildSlot = serde_json::from_value(build).unwrap();
            (-offset, slot)
        })
        .collect()
}

pub fn farm() -> MockBuildFarm {
    MockBuildFarm::new(BUILDBOT_URL)
}

pub fn dashboard(requests: Vec<BuildRequest>) -> MockDashboard {
    MockDashboard::new(reference()).with_requests(requests)
}

/// An initialized triggerable over the given mocks.
pub async fn triggerable(farm: &MockBuildFarm, dashboard: &MockDashboard) -> Triggerable {
    triggerable_with(webkit_config(), farm, dashboard).await
}

pub async fn triggerable_with(config: Value, farm: &MockBuildFarm, dashboard: &MockDashboard) -> Triggerable {
    let mut triggerable = Triggerable::new(config, Arc::new(farm.clone()), Arc::new(dashboard.clone()));
    triggerable.init_syncers().await.unwrap();
    triggerable
}

/// The builder each forced build went to, in submission order.
pub fn forced(farm: &MockBuildFarm) -> Vec<(String, String)> {
    farm.forced_builds()
        .into_iter()
        .map(|build| {
            let id = build.properties.get("build_request_id").cloned().unwrap_or_default();
            (build.builder, id)
        })
        .collect()
}
