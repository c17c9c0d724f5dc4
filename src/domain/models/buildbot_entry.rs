//! Observed remote builds and the raw payloads they are parsed from.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::build_request::{BuildRequestId, BuildRequestStatus};
use crate::domain::errors::{DomainError, DomainResult};

/// Buildbot result codes that count as success (`SUCCESS`, `WARNINGS`).
const SUCCESSFUL_RESULTS: [i64; 2] = [0, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Pending,
    InProgress,
    Finished { succeeded: bool },
}

/// One pending, in-progress or finished build seen on a builder.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildbotEntry {
    pub builder: String,
    pub build_request_id: Option<BuildRequestId>,
    pub build_number: Option<u64>,
    pub slave_name: Option<String>,
    pub phase: BuildPhase,
    pub url: String,
    pub submitted_at: Option<f64>,
}

impl BuildbotEntry {
    pub fn is_pending(&self) -> bool {
        self.phase == BuildPhase::Pending
    }

    pub fn is_in_progress(&self) -> bool {
        self.phase == BuildPhase::InProgress
    }

    pub fn has_finished(&self) -> bool {
        matches!(self.phase, BuildPhase::Finished { .. })
    }

    pub fn has_failed(&self) -> bool {
        self.phase == BuildPhase::Finished { succeeded: false }
    }

    /// The status a request in `current` should move to given this observation.
    pub fn status_update_for(&self, current: BuildRequestStatus) -> Option<BuildRequestStatus> {
        match self.phase {
            BuildPhase::Pending if current == BuildRequestStatus::Pending => Some(BuildRequestStatus::Scheduled),
            BuildPhase::InProgress if !current.has_started() || current == BuildRequestStatus::Scheduled => {
                Some(BuildRequestStatus::Running)
            }
            BuildPhase::Finished { succeeded } if !current.has_finished() => Some(if succeeded {
                BuildRequestStatus::Completed
            } else {
                BuildRequestStatus::Failed
            }),
            _ => None,
        }
    }
}

/// An item of the `pendingBuilds` listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPendingBuild {
    #[serde(default)]
    pub properties: Vec<Vec<Value>>,
    #[serde(default, rename = "submittedAt")]
    pub submitted_at: Option<f64>,
}

/// A build object from the `builds/?select=` listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBuild {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default, rename = "currentStep")]
    pub current_step: Option<Value>,
    #[serde(default)]
    pub times: Vec<Option<f64>>,
    #[serde(default)]
    pub results: Option<i64>,
    #[serde(default)]
    pub slave: Option<String>,
    #[serde(default)]
    pub properties: Vec<Vec<Value>>,
}

impl RawBuild {
    pub fn is_finished(&self) -> bool {
        self.current_step.is_none() && matches!(self.times.get(1), Some(Some(_)))
    }

    pub fn succeeded(&self) -> bool {
        self.results.is_some_and(|code| SUCCESSFUL_RESULTS.contains(&code))
    }
}

/// The value at one negative offset of the recent-builds listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawBuildSlot {
    Missing { error: String },
    Build(RawBuild),
}

/// Recent builds keyed by their negative offset from the latest build.
pub type RecentBuilds = BTreeMap<i64, RawBuildSlot>;

/// Look up a property in buildbot's `[name, value, source]` triples as a string.
pub fn property_value(properties: &[Vec<Value>], name: &str) -> Option<String> {
    properties
        .iter()
        .find(|triple| triple.first().and_then(Value::as_str) == Some(name))
        .and_then(|triple| match triple.get(1)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        })
}

/// URL layout of a buildbot master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildbotUrls {
    base: Url,
}

impl BuildbotUrls {
    pub fn parse(base: &str) -> DomainResult<Self> {
        let base = Url::parse(base)
            .map_err(|e| DomainError::UnexpectedResponse(format!("invalid buildbot URL {base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(DomainError::UnexpectedResponse(format!(
                "buildbot URL {base} cannot have paths"
            )));
        }
        Ok(Self { base })
    }

    fn with_segments(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn pending_builds(&self, builder: &str) -> Url {
        self.with_segments(&["json", "builders", builder, "pendingBuilds"])
    }

    pub fn recent_builds(&self, builder: &str, lookback_count: usize) -> Url {
        let mut url = self.with_segments(&["json", "builders", builder, "builds", ""]);
        {
            let mut query = url.query_pairs_mut();
            for offset in 1..=lookback_count {
                query.append_pair("select", &format!("-{offset}"));
            }
        }
        url
    }

    pub fn force_build(&self, builder: &str) -> Url {
        self.with_segments(&["builders", builder, "force"])
    }

    /// Page shown for a build that has not started yet.
    pub fn builder_page(&self, builder: &str) -> String {
        self.with_segments(&["builders", builder, ""]).to_string()
    }

    pub fn build_page(&self, builder: &str, number: u64) -> String {
        self.with_segments(&["builders", builder, "builds", &number.to_string()])
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_urls_escape_builder_names() {
        let urls = BuildbotUrls::parse("http://build.webkit.org").unwrap();
        assert_eq!(
            urls.pending_builds("some builder").as_str(),
            "http://build.webkit.org/json/builders/some%20builder/pendingBuilds"
        );
        assert_eq!(
            urls.recent_builds("some builder", 2).as_str(),
            "http://build.webkit.org/json/builders/some%20builder/builds/?select=-1&select=-2"
        );
        assert_eq!(
            urls.force_build("some-builder-1").as_str(),
            "http://build.webkit.org/builders/some-builder-1/force"
        );
        assert_eq!(urls.builder_page("some-builder-1"), "http://build.webkit.org/builders/some-builder-1/");
        assert_eq!(
            urls.build_page("ABTest-iPad-RunBenchmark-Tests", 614),
            "http://build.webkit.org/builders/ABTest-iPad-RunBenchmark-Tests/builds/614"
        );
    }

    #[test]
    fn test_property_value_accepts_strings_and_numbers() {
        let properties = vec![
            vec![json!("build_request_id"), json!("16733"), json!("Force Build Form")],
            vec![json!("buildnumber"), json!(614), json!("Build")],
            vec![json!("roots"), json!([]), json!("Force Build Form")],
        ];
        assert_eq!(property_value(&properties, "build_request_id").as_deref(), Some("16733"));
        assert_eq!(property_value(&properties, "buildnumber").as_deref(), Some("614"));
        assert_eq!(property_value(&properties, "roots"), None);
        assert_eq!(property_value(&properties, "missing"), None);
    }

    #[test]
    fn test_raw_build_slot_distinguishes_errors() {
        let slot: RawBuildSlot = serde_json::from_value(json!({"error": "Not available"})).unwrap();
        assert!(matches!(slot, RawBuildSlot::Missing { .. }));

        let slot: RawBuildSlot = serde_json::from_value(json!({
            "number": 1755, "currentStep": null, "times": [1458718657.581628, 1458719100.7], "results": 2
        }))
        .unwrap();
        let RawBuildSlot::Build(build) = slot else {
            panic!("expected a build");
        };
        assert!(build.is_finished());
        assert!(!build.succeeded());
    }

    #[test]
    fn test_status_update_for_each_phase() {
        let entry = |phase| BuildbotEntry {
            builder: "b".to_string(),
            build_request_id: Some(1),
            build_number: None,
            slave_name: None,
            phase,
            url: String::new(),
            submitted_at: None,
        };

        let pending = entry(BuildPhase::Pending);
        assert_eq!(pending.status_update_for(BuildRequestStatus::Pending), Some(BuildRequestStatus::Scheduled));
        assert_eq!(pending.status_update_for(BuildRequestStatus::Scheduled), None);

        let running = entry(BuildPhase::InProgress);
        assert_eq!(running.status_update_for(BuildRequestStatus::Scheduled), Some(BuildRequestStatus::Running));
        assert_eq!(running.status_update_for(BuildRequestStatus::Running), None);

        let failed = entry(BuildPhase::Finished { succeeded: false });
        assert_eq!(failed.status_update_for(BuildRequestStatus::Running), Some(BuildRequestStatus::Failed));
        assert_eq!(failed.status_update_for(BuildRequestStatus::Completed), None);

        let passed = entry(BuildPhase::Finished { succeeded: true });
        assert_eq!(passed.status_update_for(BuildRequestStatus::Pending), Some(BuildRequestStatus::Completed));
    }
}
