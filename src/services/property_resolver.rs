//! Resolution of force-build properties for a build request.
//!
//! Pure: the same request, siblings and configuration always produce the same
//! property map, and nothing here touches the network.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BuildRequest, BuilderDefinition, CommitSet, PropertyTemplate, TriggerableConfig,
};

#[derive(Serialize)]
struct RootUrl<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct OwnedRevision<'a> {
    revision: &'a str,
    repository: &'a str,
    #[serde(rename = "ownerRevision")]
    owner_revision: &'a str,
}

/// Resolves properties for requests submitted to one builder.
pub struct PropertyResolver<'a> {
    config: &'a TriggerableConfig,
    builder: &'a BuilderDefinition,
}

impl<'a> PropertyResolver<'a> {
    pub fn new(config: &'a TriggerableConfig, builder: &'a BuilderDefinition) -> Self {
        Self { config, builder }
    }

    /// Resolve the properties for `request`.
    ///
    /// `siblings` are the requests of the same pass; build steps among them
    /// sharing the request's group and commit set enable `ifBuilt` properties.
    pub fn resolve(&self, request: &BuildRequest, siblings: &[BuildRequest]) -> DomainResult<BTreeMap<String, String>> {
        let unschedulable = |reason: String| DomainError::UnschedulableRequest { id: request.id, reason };

        let mut properties = self.builder.properties.clone();
        if let Some(test) = request.test.filter(|_| request.is_test()) {
            let configuration = self
                .builder
                .test_configuration_for(request.platform, test)
                .ok_or_else(|| unschedulable(format!("{} does not run test {test} on platform {}", self.builder.name, request.platform)))?;
            properties.extend(configuration.properties.clone());
        }

        let group = self
            .config
            .repository_group(&request.repository_group)
            .ok_or_else(|| unschedulable(format!("unknown repository group \"{}\"", request.repository_group)))?;

        if let Some(templates) = group.templates_for(request) {
            for (name, template) in templates {
                if let Some(value) = resolve_template(template, request, siblings)? {
                    properties.insert(name.clone(), value);
                }
            }
        }

        properties.insert(self.config.build_request_argument.clone(), request.id.to_string());
        Ok(properties)
    }
}

fn resolve_template(
    template: &PropertyTemplate,
    request: &BuildRequest,
    siblings: &[BuildRequest],
) -> DomainResult<Option<String>> {
    let commit_set: &CommitSet = &request.commit_set;
    let value = match template {
        PropertyTemplate::Revision(repository) => commit_set.revision_for(repository).map(str::to_string),
        PropertyTemplate::Patch(repository) => commit_set
            .patch_for(repository)
            .filter(|_| commit_set.requires_build_for(repository))
            .map(|patch| patch.url.clone()),
        PropertyTemplate::Roots => {
            let roots: Vec<_> = commit_set
                .all_root_files()
                .into_iter()
                .map(|root| RootUrl { url: &root.url })
                .collect();
            if roots.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&roots)?)
            }
        }
        PropertyTemplate::IfRepositorySet { repositories, value } => repositories
            .iter()
            .any(|repository| commit_set.requires_build_for(repository))
            .then(|| value.clone()),
        PropertyTemplate::IfBuilt(value) => siblings
            .iter()
            .any(|sibling| {
                sibling.is_build()
                    && sibling.test_group == request.test_group
                    && sibling.commit_set.id == commit_set.id
            })
            .then(|| value.clone()),
        PropertyTemplate::OwnedRevisions(owner) => {
            let owned: Vec<_> = commit_set
                .owned_commits_requiring_build(owner)
                .filter_map(|item| {
                    item.commit_owner.as_ref().map(|commit_owner| OwnedRevision {
                        revision: &item.revision,
                        repository: &item.repository,
                        owner_revision: &commit_owner.revision,
                    })
                })
                .collect();
            if owned.is_empty() {
                None
            } else {
                let map = BTreeMap::from([(owner.as_str(), owned)]);
                Some(serde_json::to_string(&map)?)
            }
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::models::{BuildRequestStatus, CommitSetItem};
    use crate::services::test_support::{
        ios_config_json, request, uploaded_file, validated, webkit_commit_set, webkit_config_json, IPHONE,
    };
    use serde_json::{json, Value};

    fn resolve(config: &TriggerableConfig, builder: usize, request: &BuildRequest, siblings: &[BuildRequest]) -> BTreeMap<String, String> {
        PropertyResolver::new(config, &config.builders[builder])
            .resolve(request, siblings)
            .unwrap()
    }

    fn ios_request(id: u64, test: u64) -> BuildRequest {
        let commit_set = Arc::new(
            webkit_commit_set(1).with_item(CommitSetItem::new("iOS", "13A452")),
        );
        BuildRequest {
            repository_group: "ios-svn-webkit".to_string(),
            platform: IPHONE,
            test: Some(test),
            ..request(id, 1, 0, BuildRequestStatus::Pending, &commit_set)
        }
    }

    #[test]
    fn test_resolves_static_and_revision_properties() {
        let config = validated(&ios_config_json());
        let properties = resolve(&config, 0, &ios_request(16733, 1), &[]);

        assert_eq!(properties["desired_image"], "13A452");
        assert_eq!(properties["opensource"], "191622");
        assert_eq!(properties["test_name"], "speedometer");
        assert_eq!(properties["forcescheduler"], "ABTest-iPhone-RunBenchmark-Tests-ForceScheduler");
        assert_eq!(properties["build_request_id"], "16733");
        assert_eq!(properties.len(), 5);
    }

    #[test]
    fn test_type_properties_overlay_builder_properties() {
        let mut raw = ios_config_json();
        raw["types"]["speedometer"]["properties"] = json!({ "forcescheduler": "speedometer-scheduler" });
        let config = validated(&raw);

        let properties = resolve(&config, 0, &ios_request(1, 1), &[]);
        assert_eq!(properties["forcescheduler"], "speedometer-scheduler");
    }

    #[test]
    fn test_rejects_request_outside_builder_configurations() {
        let config = validated(&ios_config_json());
        let result = PropertyResolver::new(&config, &config.builders[1]).resolve(&ios_request(1, 1), &[]);
        assert!(matches!(result, Err(DomainError::UnschedulableRequest { id: 1, .. })));
    }

    #[test]
    fn test_build_step_gets_patch_but_not_roots() {
        let config = validated(&webkit_config_json());
        let commit_set = Arc::new(
            CommitSet::new(1)
                .with_item(
                    CommitSetItem::new("WebKit", "191622")
                        .with_patch(uploaded_file(453, ".dat"))
                        .requiring_build(),
                )
                .with_item(CommitSetItem::new("Shared", "80229")),
        );
        let build = request(704, 1, -1, BuildRequestStatus::Pending, &commit_set);

        let properties = resolve(&config, 1, &build, &[]);
        assert_eq!(properties["webkit-patch"], "http://build.webkit.org/api/uploaded-file/453.dat");
        assert_eq!(properties["wk"], "191622");
        assert_eq!(properties["checkbox"], "build-webkit");
        assert_eq!(properties["build_request_id"], "704");
        assert_eq!(properties["forcescheduler"], "force-ab-builds");
        assert!(!properties.contains_key("roots"));
        assert!(!properties.contains_key("owner-repo"));
        assert!(!properties.contains_key("owned-commits"));
    }

    #[test]
    fn test_patch_omitted_when_build_not_required() {
        let config = validated(&webkit_config_json());
        let commit_set = Arc::new(
            CommitSet::new(1)
                .with_item(CommitSetItem::new("WebKit", "191622").with_patch(uploaded_file(453, ".dat"))),
        );
        let build = request(704, 1, -1, BuildRequestStatus::Pending, &commit_set);

        let properties = resolve(&config, 1, &build, &[]);
        assert!(!properties.contains_key("webkit-patch"));
        assert!(!properties.contains_key("checkbox"));
    }

    #[test]
    fn test_test_step_gets_roots_and_if_built_once_root_is_produced() {
        let config = validated(&webkit_config_json());
        let commit_set = Arc::new(
            CommitSet::new(1)
                .with_item(
                    CommitSetItem::new("WebKit", "191622")
                        .with_patch(uploaded_file(453, ".dat"))
                        .with_root_file(uploaded_file(456, ".tgz"))
                        .requiring_build(),
                )
                .with_item(CommitSetItem::new("Shared", "80229"))
                .with_item(CommitSetItem::new("Owner Repository", "owner-001"))
                .with_custom_root(uploaded_file(101, ".tgz")),
        );
        let build = request(700, 1, -1, BuildRequestStatus::Completed, &commit_set);
        let test = request(701, 1, 0, BuildRequestStatus::Pending, &commit_set);

        let properties = resolve(&config, 0, &test, &[build.clone(), test.clone()]);
        let roots: Value = serde_json::from_str(&properties["roots"]).unwrap();
        assert_eq!(
            roots,
            json!([
                { "url": "http://build.webkit.org/api/uploaded-file/101.tgz" },
                { "url": "http://build.webkit.org/api/uploaded-file/456.tgz" }
            ])
        );
        assert_eq!(properties["test-custom-build"], "");
        assert_eq!(properties["has-built-patch"], "true");
        assert_eq!(properties["owner-repo"], "owner-001");
        assert!(!properties.contains_key("webkit-patch"));
        assert_eq!(properties["build_request_id"], "701");
    }

    #[test]
    fn test_if_built_requires_build_sibling_with_same_commit_set() {
        let config = validated(&webkit_config_json());
        let first = Arc::new(webkit_commit_set(1));
        let second = Arc::new(webkit_commit_set(2));
        let test = request(701, 1, 0, BuildRequestStatus::Pending, &first);
        let other_build = request(702, 1, -1, BuildRequestStatus::Completed, &second);

        let properties = resolve(&config, 0, &test, &[other_build, test.clone()]);
        assert!(!properties.contains_key("test-custom-build"));
        assert!(!properties.contains_key("has-built-patch"));
        assert!(!properties.contains_key("roots"));
    }

    #[test]
    fn test_owned_revisions_lists_owned_commits_requiring_build() {
        let config = validated(&webkit_config_json());
        let commit_set = Arc::new(
            webkit_commit_set(1).with_item(
                CommitSetItem::new("Owned Repository", "owned-002")
                    .owned_by("Owner Repository", "owner-001")
                    .requiring_build(),
            ),
        );
        let build = request(704, 1, -1, BuildRequestStatus::Pending, &commit_set);

        let properties = resolve(&config, 1, &build, &[]);
        assert_eq!(
            properties["owned-commits"],
            r#"{"Owner Repository":[{"revision":"owned-002","repository":"Owned Repository","ownerRevision":"owner-001"}]}"#
        );
        assert!(!properties.contains_key("checkbox"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let config = validated(&webkit_config_json());
        let commit_set = Arc::new(webkit_commit_set(1).with_custom_root(uploaded_file(101, ".tgz")));
        let test = request(701, 1, 0, BuildRequestStatus::Pending, &commit_set);

        assert_eq!(resolve(&config, 0, &test, &[]), resolve(&config, 0, &test, &[]));
    }
}
