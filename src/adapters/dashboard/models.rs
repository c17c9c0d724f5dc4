//! Wire types of the dashboard's JSON API and their mapping into the domain.
//!
//! The dashboard serializes database ids as strings in some responses and as
//! numbers in others, so every id field accepts both.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BuildRequest, BuildRequestBatch, BuildRequestId, BuildRequestStatus, BuildRequestUpdate, CommitSet,
    CommitSetItem, ReferenceSnapshot, SlaveAuth, TestGroup, UploadedFile,
};
use crate::domain::ports::TriggerableReport;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

fn parse_raw_id<E: serde::de::Error>(raw: RawId) -> Result<u64, E> {
    match raw {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .parse()
            .map_err(|_| E::custom(format!("invalid id \"{text}\""))),
    }
}

fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    parse_raw_id(RawId::deserialize(deserializer)?)
}

fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<RawId>::deserialize(deserializer)?
        .map(parse_raw_id)
        .transpose()
}

fn order<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawOrder {
        Number(i32),
        Text(String),
    }
    match RawOrder::deserialize(deserializer)? {
        RawOrder::Number(order) => Ok(order),
        RawOrder::Text(text) => text
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid order \"{text}\""))),
    }
}

/// Milliseconds since the epoch, as the dashboard reports times.
fn timestamp(millis: Option<f64>) -> DateTime<Utc> {
    #[allow(clippy::cast_possible_truncation)]
    let millis = millis.unwrap_or_default() as i64;
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// Envelope every dashboard response carries.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ManifestRepository {
    pub name: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub owner: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestPlatform {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ManifestTest {
    pub name: String,
    #[serde(default, rename = "parentId", deserialize_with = "optional_id")]
    pub parent_id: Option<u64>,
}

/// `GET /api/manifest`; platforms are listed under `all`.
#[derive(Debug, Deserialize)]
pub struct ManifestResponse {
    #[serde(default)]
    pub repositories: BTreeMap<String, ManifestRepository>,
    #[serde(default, rename = "all")]
    pub platforms: BTreeMap<String, ManifestPlatform>,
    #[serde(default)]
    pub tests: BTreeMap<String, ManifestTest>,
}

fn key_id(key: &str, kind: &str) -> DomainResult<u64> {
    key.parse()
        .map_err(|_| DomainError::UnexpectedResponse(format!("manifest lists a {kind} with id \"{key}\"")))
}

impl ManifestResponse {
    pub fn into_snapshot(self) -> DomainResult<ReferenceSnapshot> {
        let mut snapshot = ReferenceSnapshot::default();
        for (key, repository) in &self.repositories {
            snapshot = snapshot.with_repository(key_id(key, "repository")?, &repository.name, repository.owner);
        }
        for (key, platform) in &self.platforms {
            snapshot = snapshot.with_platform(key_id(key, "platform")?, &platform.name);
        }
        for (key, test) in &self.tests {
            snapshot = snapshot.with_test(key_id(key, "test")?, &test.name, test.parent_id);
        }
        Ok(snapshot)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequestData {
    #[serde(deserialize_with = "id")]
    pub id: u64,
    pub triggerable: String,
    pub repository_group: String,
    #[serde(deserialize_with = "id")]
    pub platform: u64,
    #[serde(default, deserialize_with = "optional_id")]
    pub test: Option<u64>,
    #[serde(deserialize_with = "order")]
    pub order: i32,
    #[serde(deserialize_with = "id")]
    pub commit_set: u64,
    pub status: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub build: Option<u64>,
    #[serde(deserialize_with = "id")]
    pub test_group: u64,
    #[serde(default)]
    pub created_at: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionItemData {
    #[serde(deserialize_with = "id")]
    pub commit: u64,
    #[serde(default, deserialize_with = "optional_id")]
    pub patch: Option<u64>,
    #[serde(default, deserialize_with = "optional_id")]
    pub root_file: Option<u64>,
    #[serde(default)]
    pub requires_build: bool,
    #[serde(default, deserialize_with = "optional_id")]
    pub commit_owner: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSetData {
    #[serde(deserialize_with = "id")]
    pub id: u64,
    #[serde(default)]
    pub revision_items: Vec<RevisionItemData>,
    #[serde(default)]
    pub custom_roots: Vec<FileRef>,
}

/// An uploaded file id inside a list.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct FileRef(#[serde(deserialize_with = "id")] pub u64);

#[derive(Debug, Deserialize)]
pub struct CommitData {
    #[serde(deserialize_with = "id")]
    pub id: u64,
    #[serde(deserialize_with = "id")]
    pub repository: u64,
    pub revision: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadedFileData {
    #[serde(deserialize_with = "id")]
    pub id: u64,
    pub filename: String,
    #[serde(default)]
    pub extension: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestGroupData {
    #[serde(deserialize_with = "id")]
    pub id: u64,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<f64>,
}

/// `GET /api/build-requests/{triggerable}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequestsResponse {
    #[serde(default)]
    pub build_requests: Vec<BuildRequestData>,
    #[serde(default)]
    pub commit_sets: Vec<CommitSetData>,
    #[serde(default)]
    pub commits: Vec<CommitData>,
    #[serde(default)]
    pub uploaded_files: Vec<UploadedFileData>,
    #[serde(default)]
    pub test_groups: Vec<TestGroupData>,
}

impl BuildRequestsResponse {
    /// Resolve every cross reference of the payload into a batch.
    ///
    /// Uploaded file URLs are rooted at `dashboard_url`.
    pub fn into_batch(self, reference: &ReferenceSnapshot, dashboard_url: &str) -> DomainResult<BuildRequestBatch> {
        let unexpected = |message: String| DomainError::UnexpectedResponse(message);

        let files: HashMap<u64, UploadedFile> = self
            .uploaded_files
            .iter()
            .map(|file| (file.id, UploadedFile::new(dashboard_url, file.id, &file.filename, &file.extension)))
            .collect();
        let file = |id: u64| {
            files
                .get(&id)
                .cloned()
                .ok_or_else(|| unexpected(format!("unknown uploaded file {id}")))
        };

        let mut commits: HashMap<u64, (String, String)> = HashMap::new();
        for commit in &self.commits {
            let repository = reference
                .repository(commit.repository)
                .ok_or_else(|| unexpected(format!("commit {} uses unknown repository {}", commit.id, commit.repository)))?;
            commits.insert(commit.id, (repository.name.clone(), commit.revision.clone()));
        }
        let commit = |id: u64| {
            commits
                .get(&id)
                .ok_or_else(|| unexpected(format!("unknown commit {id}")))
        };

        let mut commit_sets: HashMap<u64, Arc<CommitSet>> = HashMap::new();
        for data in &self.commit_sets {
            let mut commit_set = CommitSet::new(data.id);
            for item in &data.revision_items {
                let (repository, revision) = commit(item.commit)?;
                let mut resolved = CommitSetItem::new(repository, revision);
                if let Some(patch) = item.patch {
                    resolved = resolved.with_patch(file(patch)?);
                }
                if let Some(root) = item.root_file {
                    resolved = resolved.with_root_file(file(root)?);
                }
                if item.requires_build {
                    resolved = resolved.requiring_build();
                }
                if let Some(owner) = item.commit_owner {
                    let (owner_repository, owner_revision) = commit(owner)?;
                    resolved = resolved.owned_by(owner_repository, owner_revision);
                }
                commit_set = commit_set.with_item(resolved);
            }
            for root in &data.custom_roots {
                commit_set = commit_set.with_custom_root(file(root.0)?);
            }
            commit_sets.insert(data.id, Arc::new(commit_set));
        }

        let requests = self
            .build_requests
            .into_iter()
            .map(|data| {
                let commit_set = commit_sets
                    .get(&data.commit_set)
                    .cloned()
                    .ok_or_else(|| unexpected(format!("build request {} uses unknown commit set {}", data.id, data.commit_set)))?;
                let status = BuildRequestStatus::parse(&data.status)
                    .ok_or_else(|| unexpected(format!("build request {} has status \"{}\"", data.id, data.status)))?;
                Ok(BuildRequest {
                    id: data.id,
                    triggerable: data.triggerable,
                    repository_group: data.repository_group,
                    platform: data.platform,
                    test: data.test,
                    order: data.order,
                    commit_set,
                    status,
                    status_url: data.url,
                    build_id: data.build,
                    test_group: data.test_group,
                    created_at: timestamp(data.created_at),
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let test_groups = self
            .test_groups
            .into_iter()
            .map(|group| TestGroup {
                id: group.id,
                author: group.author.filter(|author| !author.is_empty()),
                created_at: timestamp(group.created_at),
            })
            .collect();

        Ok(BuildRequestBatch { requests, test_groups })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials<'a> {
    pub slave_name: &'a str,
    pub slave_password: &'a str,
}

impl<'a> From<&'a SlaveAuth> for Credentials<'a> {
    fn from(auth: &'a SlaveAuth) -> Self {
        Self {
            slave_name: &auth.name,
            slave_password: &auth.password,
        }
    }
}

/// `POST /api/build-requests/{triggerable}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBuildRequests<'a> {
    #[serde(flatten)]
    pub credentials: Option<Credentials<'a>>,
    pub build_request_updates: &'a BTreeMap<BuildRequestId, BuildRequestUpdate>,
}

/// `POST /api/update-triggerable/`.
#[derive(Debug, Serialize)]
pub struct UpdateTriggerable<'a> {
    #[serde(flatten)]
    pub credentials: Option<Credentials<'a>>,
    #[serde(flatten)]
    pub report: &'a TriggerableReport,
}
