//! Build requests, their lifecycle, and the test groups that own them.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commit_set::CommitSet;
use super::reference::{PlatformId, TestId};

pub type BuildRequestId = u64;
pub type TestGroupId = u64;

/// Lifecycle of a build request.
///
/// `pending -> scheduled -> running -> completed | failed`, with `canceled`
/// set externally before a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildRequestStatus {
    Pending,
    Scheduled,
    Running,
    Failed,
    Completed,
    Canceled,
}

impl BuildRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "scheduled" => Some(Self::Scheduled),
            "running" => Some(Self::Running),
            "failed" => Some(Self::Failed),
            "completed" => Some(Self::Completed),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn has_started(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn has_finished(&self) -> bool {
        matches!(self, Self::Failed | Self::Completed | Self::Canceled)
    }
}

impl fmt::Display for BuildRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One build step (negative order) or test step (non-negative order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub id: BuildRequestId,
    pub triggerable: String,
    pub repository_group: String,
    pub platform: PlatformId,
    /// Absent for build steps.
    pub test: Option<TestId>,
    pub order: i32,
    pub commit_set: Arc<CommitSet>,
    pub status: BuildRequestStatus,
    pub status_url: Option<String>,
    pub build_id: Option<u64>,
    pub test_group: TestGroupId,
    pub created_at: DateTime<Utc>,
}

impl BuildRequest {
    pub fn is_build(&self) -> bool {
        self.order < 0
    }

    pub fn is_test(&self) -> bool {
        self.order >= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestGroup {
    pub id: TestGroupId,
    /// `None` for groups created automatically.
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A status change computed during a pass and persisted through the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequestUpdate {
    pub status: BuildRequestStatus,
    pub url: Option<String>,
    #[serde(rename = "buildNumber", skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,
}

/// Everything the dashboard knows about one triggerable's open requests.
#[derive(Debug, Clone, Default)]
pub struct BuildRequestBatch {
    pub requests: Vec<BuildRequest>,
    pub test_groups: Vec<TestGroup>,
}

impl BuildRequestBatch {
    pub fn test_group(&self, id: TestGroupId) -> Option<&TestGroup> {
        self.test_groups.iter().find(|group| group.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            BuildRequestStatus::Pending,
            BuildRequestStatus::Scheduled,
            BuildRequestStatus::Running,
            BuildRequestStatus::Failed,
            BuildRequestStatus::Completed,
            BuildRequestStatus::Canceled,
        ] {
            assert_eq!(BuildRequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BuildRequestStatus::parse("bogus"), None);
    }

    #[test]
    fn test_status_lifecycle_predicates() {
        assert!(!BuildRequestStatus::Pending.has_started());
        assert!(BuildRequestStatus::Scheduled.has_started());
        assert!(!BuildRequestStatus::Running.has_finished());
        assert!(BuildRequestStatus::Canceled.has_finished());
    }
}
