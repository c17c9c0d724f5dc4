//! Validated triggerable configuration.
//!
//! Produced once by the configuration validator from the raw JSON document;
//! everything downstream works on these types only.

use std::collections::BTreeMap;

use serde::Serialize;

use super::build_request::BuildRequest;
use super::reference::{PlatformId, RepositoryId, TestId};

/// How a repository-group property obtains its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyTemplate {
    /// The commit set's revision of the named repository.
    Revision(String),
    /// URL of the patch for the named repository, when it must be built.
    Patch(String),
    /// JSON list of root file URLs.
    Roots,
    /// A literal emitted when one of the repositories is set and must be built.
    IfRepositorySet {
        repositories: Vec<String>,
        value: String,
    },
    /// A literal emitted when a build step shares the request's commit set.
    IfBuilt(String),
    /// JSON map of owned commits pinned by the named repository.
    OwnedRevisions(String),
}

impl PropertyTemplate {
    pub fn repository(&self) -> Option<&str> {
        match self {
            Self::Revision(repository) | Self::Patch(repository) | Self::OwnedRevisions(repository) => {
                Some(repository)
            }
            Self::Roots | Self::IfRepositorySet { .. } | Self::IfBuilt(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryGroupMember {
    pub name: String,
    #[serde(rename = "repository")]
    pub id: RepositoryId,
    #[serde(rename = "acceptsPatch")]
    pub accepts_patch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryGroupDefinition {
    pub name: String,
    pub description: Option<String>,
    pub repositories: Vec<RepositoryGroupMember>,
    pub test_properties: BTreeMap<String, PropertyTemplate>,
    /// Present only for groups whose requests may need building first.
    pub build_properties: Option<BTreeMap<String, PropertyTemplate>>,
    pub accepts_roots: bool,
}

impl RepositoryGroupDefinition {
    /// The property templates applied to `request`.
    pub fn templates_for(&self, request: &BuildRequest) -> Option<&BTreeMap<String, PropertyTemplate>> {
        if request.is_build() {
            self.build_properties.as_ref()
        } else {
            Some(&self.test_properties)
        }
    }
}

/// One (platform, test) pair a tester accepts, carrying its type's properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfiguration {
    pub type_name: String,
    pub platform: PlatformId,
    pub test: TestId,
    pub properties: BTreeMap<String, String>,
}

/// Static description of one remote builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderDefinition {
    /// Key used in the configuration's `builders` dictionary.
    pub key: String,
    /// Name of the builder on the build farm.
    pub name: String,
    pub properties: BTreeMap<String, String>,
    pub slave_list: Option<Vec<String>>,
    pub test_configurations: Vec<TestConfiguration>,
    pub build_configurations: Vec<PlatformId>,
}

impl BuilderDefinition {
    pub fn is_tester(&self) -> bool {
        !self.test_configurations.is_empty()
    }

    pub fn is_builder(&self) -> bool {
        !self.build_configurations.is_empty()
    }

    pub fn test_configuration_for(&self, platform: PlatformId, test: TestId) -> Option<&TestConfiguration> {
        self.test_configurations
            .iter()
            .find(|configuration| configuration.platform == platform && configuration.test == test)
    }

    /// Whether this builder can take `request` at all.
    pub fn matches_configuration(&self, request: &BuildRequest) -> bool {
        match request.test {
            Some(test) if request.is_test() => self.test_configuration_for(request.platform, test).is_some(),
            _ => request.is_build() && self.build_configurations.contains(&request.platform),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveAuth {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerableConfig {
    pub name: String,
    /// Property carrying the build request id in force-build submissions.
    pub build_request_argument: String,
    /// Property carrying the requested slave, when slaves are pinned.
    pub slave_argument: Option<String>,
    pub lookback_count: usize,
    pub slave_auth: Option<SlaveAuth>,
    pub repository_groups: Vec<RepositoryGroupDefinition>,
    /// Builders in the order they are offered new requests.
    pub builders: Vec<BuilderDefinition>,
}

impl TriggerableConfig {
    pub const DEFAULT_LOOKBACK_COUNT: usize = 2;

    pub fn repository_group(&self, name: &str) -> Option<&RepositoryGroupDefinition> {
        self.repository_groups.iter().find(|group| group.name == name)
    }

    /// Distinct (test, platform) pairs across every tester, in builder order.
    pub fn test_platform_pairs(&self) -> Vec<(TestId, PlatformId)> {
        let mut pairs = Vec::new();
        for configuration in self.builders.iter().flat_map(|builder| &builder.test_configurations) {
            let pair = (configuration.test, configuration.platform);
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
        pairs
    }
}
