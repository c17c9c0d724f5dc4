//! Shared fixtures for service unit tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::domain::models::{
    BuildRequest, BuildRequestId, BuildRequestStatus, CommitSet, CommitSetItem, ReferenceSnapshot,
    TestGroupId, TriggerableConfig, UploadedFile,
};
use crate::services::config_validator::ConfigValidator;

pub const DASHBOARD_URL: &str = "http://build.webkit.org";
pub const SOME_PLATFORM: u64 = 65;
pub const SOME_TEST: u64 = 5;
pub const IPHONE: u64 = 31;
pub const IPAD: u64 = 32;

pub fn reference() -> ReferenceSnapshot {
    ReferenceSnapshot::default()
        .with_repository(11, "WebKit", None)
        .with_repository(12, "Owned Repository", Some(13))
        .with_repository(13, "Owner Repository", None)
        .with_repository(16, "Shared", None)
        .with_repository(22, "iOS", None)
        .with_platform(IPHONE, "iPhone")
        .with_platform(IPAD, "iPad")
        .with_platform(SOME_PLATFORM, "Some platform")
        .with_test(1, "Speedometer", None)
        .with_test(2, "Dromaeo", None)
        .with_test(3, "DOM Core Tests", Some(2))
        .with_test(4, "JetStream", None)
        .with_test(SOME_TEST, "Some test", None)
}

/// Two benchmark testers with slave lists and one builder.
pub fn ios_config_json() -> Value {
    json!({
        "triggerableName": "build-webkit-ios",
        "buildRequestArgument": "build_request_id",
        "slaveArgument": "slavename",
        "slaveName": "sync-slave",
        "slavePassword": "password",
        "repositoryGroups": {
            "ios-svn-webkit": {
                "repositories": { "WebKit": {}, "iOS": {} },
                "testProperties": {
                    "desired_image": { "revision": "iOS" },
                    "opensource": { "revision": "WebKit" }
                }
            }
        },
        "types": {
            "speedometer": { "test": ["Speedometer"], "properties": { "test_name": "speedometer" } },
            "jetstream": { "test": ["JetStream"], "properties": { "test_name": "jetstream" } },
            "dromaeo-dom": { "test": ["Dromaeo", "DOM Core Tests"], "properties": { "tests": "dromaeo-dom" } }
        },
        "builders": {
            "iPhone-bench": {
                "builder": "ABTest-iPhone-RunBenchmark-Tests",
                "properties": { "forcescheduler": "ABTest-iPhone-RunBenchmark-Tests-ForceScheduler" },
                "slaveList": ["ABTest-iPhone-0"]
            },
            "iPad-bench": {
                "builder": "ABTest-iPad-RunBenchmark-Tests",
                "properties": { "forcescheduler": "ABTest-iPad-RunBenchmark-Tests-ForceScheduler" },
                "slaveList": ["ABTest-iPad-0", "ABTest-iPad-1"]
            },
            "iOS-builder": {
                "builder": "ABTest-iOS-Builder",
                "properties": { "forcescheduler": "ABTest-Builder-ForceScheduler" }
            }
        },
        "testConfigurations": [
            { "builders": ["iPhone-bench"], "types": ["speedometer", "jetstream", "dromaeo-dom"], "platforms": ["iPhone"] },
            { "builders": ["iPad-bench"], "types": ["speedometer", "jetstream"], "platforms": ["iPad"] }
        ],
        "buildConfigurations": [
            { "builders": ["iOS-builder"], "platforms": ["iPhone", "iPad"] }
        ]
    })
}

/// One tester and two builders sharing a patch-and-roots repository group.
pub fn webkit_config_json() -> Value {
    json!({
        "triggerableName": "build-webkit",
        "buildRequestArgument": "build_request_id",
        "slaveArgument": "slavename",
        "slaveName": "sync-slave",
        "slavePassword": "password",
        "repositoryGroups": {
            "webkit": {
                "repositories": {
                    "WebKit": { "acceptsPatch": true },
                    "Shared": {},
                    "Owner Repository": {}
                },
                "testProperties": {
                    "wk": { "revision": "WebKit" },
                    "shared": { "revision": "Shared" },
                    "owner-repo": { "revision": "Owner Repository" },
                    "roots": { "roots": {} },
                    "test-custom-build": { "ifBuilt": "" },
                    "has-built-patch": { "ifBuilt": "true" }
                },
                "buildProperties": {
                    "wk": { "revision": "WebKit" },
                    "webkit-patch": { "patch": "WebKit" },
                    "checkbox": { "ifRepositorySet": ["WebKit"], "value": "build-webkit" },
                    "shared": { "revision": "Shared" },
                    "owner-repo": { "revision": "Owner Repository" },
                    "owned-commits": { "ownedRevisions": "Owner Repository" }
                },
                "acceptsRoots": true
            }
        },
        "types": {
            "some-test": { "test": ["Some test"] }
        },
        "builders": {
            "builder-1": { "builder": "some tester", "properties": { "forcescheduler": "force-ab-tests" } },
            "builder-2": { "builder": "some builder", "properties": { "forcescheduler": "force-ab-builds" } },
            "builder-3": { "builder": "other builder", "properties": { "forcescheduler": "force-ab-builds" } }
        },
        "testConfigurations": [
            { "builders": ["builder-1"], "types": ["some-test"], "platforms": ["Some platform"] }
        ],
        "buildConfigurations": [
            { "builders": ["builder-2", "builder-3"], "platforms": ["Some platform"] }
        ]
    })
}

pub fn validated(raw: &Value) -> TriggerableConfig {
    ConfigValidator::new(&reference())
        .validate(raw)
        .expect("fixture configuration should be valid")
}

pub fn uploaded_file(id: u64, extension: &str) -> UploadedFile {
    UploadedFile::new(DASHBOARD_URL, id, &format!("file-{id}{extension}"), extension)
}

pub fn webkit_commit_set(id: u64) -> CommitSet {
    CommitSet::new(id)
        .with_item(CommitSetItem::new("WebKit", "191622"))
        .with_item(CommitSetItem::new("Shared", "80229"))
        .with_item(CommitSetItem::new("Owner Repository", "owner-001"))
}

pub fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_458_700_000 + seconds, 0).single().unwrap_or_default()
}

/// A request of the `webkit` group on "Some platform"; build step when `order < 0`.
pub fn request(
    id: BuildRequestId,
    group: TestGroupId,
    order: i32,
    status: BuildRequestStatus,
    commit_set: &Arc<CommitSet>,
) -> BuildRequest {
    BuildRequest {
        id,
        triggerable: "build-webkit".to_string(),
        repository_group: "webkit".to_string(),
        platform: SOME_PLATFORM,
        test: (order >= 0).then_some(SOME_TEST),
        order,
        commit_set: Arc::clone(commit_set),
        status,
        status_url: None,
        build_id: None,
        test_group: group,
        created_at: timestamp(i64::try_from(id).unwrap_or_default()),
    }
}
