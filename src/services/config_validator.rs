//! Triggerable configuration validation.
//!
//! Turns the declarative JSON document describing builders, test types,
//! repository groups and the test/build configuration matrices into a
//! [`TriggerableConfig`]. Every check is fatal: the first problem found is
//! returned and nothing is partially loaded.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::domain::errors::ConfigurationError;
use crate::domain::models::{
    BuilderDefinition, PlatformId, PropertyTemplate, ReferenceSnapshot, RepositoryGroupDefinition,
    RepositoryGroupMember, SlaveAuth, TestConfiguration, TestId, TriggerableConfig,
};

type ValidationResult<T> = Result<T, ConfigurationError>;

#[derive(Debug)]
struct TypeEntry {
    test: TestId,
    properties: BTreeMap<String, String>,
}

#[derive(Debug)]
struct BuilderEntry {
    name: String,
    properties: BTreeMap<String, String>,
    slave_list: Option<Vec<String>>,
}

/// Validates triggerable configurations against a reference snapshot.
pub struct ConfigValidator<'a> {
    reference: &'a ReferenceSnapshot,
}

impl<'a> ConfigValidator<'a> {
    pub fn new(reference: &'a ReferenceSnapshot) -> Self {
        Self { reference }
    }

    pub fn validate(&self, raw: &Value) -> ValidationResult<TriggerableConfig> {
        let root = raw.as_object().ok_or(ConfigurationError::NotADictionary)?;

        let build_request_argument = match root.get("buildRequestArgument") {
            Some(Value::String(argument)) if !argument.is_empty() => argument.clone(),
            _ => return Err(ConfigurationError::MissingBuildRequestArgument),
        };
        let name = optional_string(root, "triggerableName")?.ok_or_else(|| invalid_field("triggerableName", "a string"))?;
        let slave_argument = optional_string(root, "slaveArgument")?;
        let lookback_count = match root.get("lookbackCount") {
            None | Some(Value::Null) => TriggerableConfig::DEFAULT_LOOKBACK_COUNT,
            Some(value) => value
                .as_u64()
                .filter(|count| *count > 0)
                .and_then(|count| usize::try_from(count).ok())
                .ok_or_else(|| invalid_field("lookbackCount", "a positive integer"))?,
        };
        let slave_auth = match (
            optional_string(root, "slaveName")?,
            optional_string(root, "slavePassword")?,
        ) {
            (Some(name), Some(password)) => Some(SlaveAuth { name, password }),
            _ => None,
        };

        let repository_groups = self.parse_repository_groups(root.get("repositoryGroups"))?;
        let types = self.parse_types(root.get("types"))?;
        let builder_entries = parse_builders(root.get("builders"))?;
        let builders = self.expand_configurations(root, &types, &builder_entries)?;

        Ok(TriggerableConfig {
            name,
            build_request_argument,
            slave_argument,
            lookback_count,
            slave_auth,
            repository_groups,
            builders,
        })
    }

    fn parse_types(&self, value: Option<&Value>) -> ValidationResult<BTreeMap<String, TypeEntry>> {
        let Some(value) = value else {
            return Ok(BTreeMap::new());
        };
        let types = value.as_object().ok_or_else(|| invalid_field("types", "a dictionary"))?;

        let mut parsed = BTreeMap::new();
        for (name, definition) in types {
            let definition = definition
                .as_object()
                .ok_or_else(|| invalid_field(&format!("types.{name}"), "a dictionary"))?;

            let mut test = None;
            let mut properties = BTreeMap::new();
            for (key, value) in definition {
                match key.as_str() {
                    "test" => test = Some(self.resolve_test(name, value)?),
                    "properties" => properties = parse_properties(value)?,
                    _ => return Err(ConfigurationError::UnrecognizedParameter(key.clone())),
                }
            }
            let test = test.ok_or_else(|| ConfigurationError::InvalidTest(name.clone()))?;
            parsed.insert(name.clone(), TypeEntry { test, properties });
        }
        Ok(parsed)
    }

    fn resolve_test(&self, type_name: &str, value: &Value) -> ValidationResult<TestId> {
        let path = value
            .as_array()
            .filter(|path| !path.is_empty())
            .and_then(|path| path.iter().map(Value::as_str).collect::<Option<Vec<_>>>())
            .ok_or_else(|| ConfigurationError::InvalidTest(type_name.to_string()))?;
        self.reference
            .find_test_by_path(&path)
            .map(|test| test.id)
            .ok_or_else(|| ConfigurationError::InvalidTest(path.join("/")))
    }

    fn resolve_platform(&self, value: &Value) -> ValidationResult<PlatformId> {
        value
            .as_str()
            .and_then(|name| self.reference.find_platform(name))
            .map(|platform| platform.id)
            .ok_or_else(|| ConfigurationError::InvalidPlatform(display_value(value)))
    }

    /// Expand the configuration matrices into per-builder definitions, ordered
    /// by first appearance (test configurations before build configurations).
    fn expand_configurations(
        &self,
        root: &Map<String, Value>,
        types: &BTreeMap<String, TypeEntry>,
        builder_entries: &BTreeMap<String, BuilderEntry>,
    ) -> ValidationResult<Vec<BuilderDefinition>> {
        let mut builders: Vec<BuilderDefinition> = Vec::new();
        let mut testers = BTreeSet::new();

        for (index, row) in configuration_rows(root, "testConfigurations")?.iter().enumerate() {
            let row_builders = row_list(row, "test", index, "builders")?;
            let platforms = row_list(row, "test", index, "platforms")?;
            let row_types = row_list(row, "test", index, "types")?;

            let platforms = platforms
                .iter()
                .map(|platform| self.resolve_platform(platform))
                .collect::<ValidationResult<Vec<_>>>()?;
            let row_types = row_types
                .iter()
                .map(|value| {
                    value
                        .as_str()
                        .and_then(|name| types.get_key_value(name))
                        .ok_or_else(|| ConfigurationError::InvalidType(display_value(value)))
                })
                .collect::<ValidationResult<Vec<_>>>()?;

            for key in row_builders {
                let builder = builder_slot(&mut builders, builder_entries, key)?;
                testers.insert(builder.key.clone());
                for platform in &platforms {
                    for (type_name, entry) in &row_types {
                        builder.test_configurations.push(TestConfiguration {
                            type_name: (*type_name).clone(),
                            platform: *platform,
                            test: entry.test,
                            properties: entry.properties.clone(),
                        });
                    }
                }
            }
        }

        for (index, row) in configuration_rows(root, "buildConfigurations")?.iter().enumerate() {
            let row_builders = row_list(row, "build", index, "builders")?;
            let platforms = row_list(row, "build", index, "platforms")?
                .iter()
                .map(|platform| self.resolve_platform(platform))
                .collect::<ValidationResult<Vec<_>>>()?;

            for key in row_builders {
                let builder = builder_slot(&mut builders, builder_entries, key)?;
                if testers.contains(&builder.key) {
                    return Err(ConfigurationError::BuilderInBothConfigurations(builder.key.clone()));
                }
                for platform in &platforms {
                    if !builder.build_configurations.contains(platform) {
                        builder.build_configurations.push(*platform);
                    }
                }
            }
        }

        Ok(builders)
    }

    fn parse_repository_groups(&self, value: Option<&Value>) -> ValidationResult<Vec<RepositoryGroupDefinition>> {
        let Some(value) = value else {
            return Ok(Vec::new());
        };
        let groups = value
            .as_object()
            .ok_or(ConfigurationError::RepositoryGroupsNotDictionary)?;
        groups
            .iter()
            .map(|(name, group)| self.parse_repository_group(name, group))
            .collect()
    }

    fn parse_repository_group(&self, name: &str, group: &Value) -> ValidationResult<RepositoryGroupDefinition> {
        let group_error = || ConfigurationError::RepositoriesNotDictionary(name.to_string());
        let group = group.as_object().ok_or_else(group_error)?;
        let repositories = group
            .get("repositories")
            .and_then(Value::as_object)
            .ok_or_else(group_error)?;

        let description = match group.get("description") {
            None => None,
            Some(Value::String(description)) => Some(description.clone()),
            Some(_) => return Err(ConfigurationError::InvalidDescription(name.to_string())),
        };
        let accepts_roots = optional_bool(group.get("acceptsRoots")).ok_or_else(|| {
            ConfigurationError::InvalidAcceptsRoots {
                group: name.to_string(),
                value: display_value(group.get("acceptsRoots").unwrap_or(&Value::Null)),
            }
        })?;

        let mut members = Vec::new();
        for (repository_name, options) in repositories {
            let repository = self
                .reference
                .find_top_level_repository(repository_name)
                .ok_or_else(|| ConfigurationError::InvalidRepositoryName(repository_name.clone()))?;
            let options = options
                .as_object()
                .ok_or_else(|| ConfigurationError::RepositoryOptionsNotDictionary(repository_name.clone()))?;
            let accepts_patch = optional_bool(options.get("acceptsPatch")).ok_or_else(|| {
                ConfigurationError::InvalidAcceptsPatch {
                    repository: repository_name.clone(),
                    value: display_value(options.get("acceptsPatch").unwrap_or(&Value::Null)),
                }
            })?;
            members.push(RepositoryGroupMember {
                name: repository_name.clone(),
                id: repository.id,
                accepts_patch,
            });
        }
        if members.is_empty() {
            return Err(ConfigurationError::NoRepositories(name.to_string()));
        }

        let parser = GroupPropertyParser { group: name, members: &members };
        let test_properties = parser.parse_test_properties(group.get("testProperties"), accepts_roots)?;
        let build_properties = match group.get("buildProperties") {
            Some(value) => Some(parser.parse_build_properties(value, accepts_roots)?),
            None => None,
        };

        Ok(RepositoryGroupDefinition {
            name: name.to_string(),
            description,
            repositories: members,
            test_properties,
            build_properties,
            accepts_roots,
        })
    }
}

/// Parses the property maps of one repository group against its members.
struct GroupPropertyParser<'a> {
    group: &'a str,
    members: &'a [RepositoryGroupMember],
}

impl GroupPropertyParser<'_> {
    fn member(&self, repository: &str) -> ValidationResult<&RepositoryGroupMember> {
        self.members
            .iter()
            .find(|member| member.name == repository)
            .ok_or_else(|| ConfigurationError::InvalidRepositoryReference {
                group: self.group.to_string(),
                repository: repository.to_string(),
            })
    }

    fn check_references(&self, template: &PropertyTemplate) -> ValidationResult<()> {
        if let Some(repository) = template.repository() {
            self.member(repository)?;
        }
        if let PropertyTemplate::IfRepositorySet { repositories, .. } = template {
            for repository in repositories {
                self.member(repository)?;
            }
        }
        Ok(())
    }

    fn parse_test_properties(
        &self,
        value: Option<&Value>,
        accepts_roots: bool,
    ) -> ValidationResult<BTreeMap<String, PropertyTemplate>> {
        let properties = value
            .and_then(Value::as_object)
            .ok_or_else(|| ConfigurationError::InvalidTestProperties(self.group.to_string()))?;

        let mut templates = BTreeMap::new();
        let mut used = BTreeSet::new();
        let mut specifies_roots = false;
        for (property, value) in properties {
            let template = parse_template(self.group, property, value)?;
            self.check_references(&template)?;
            match &template {
                PropertyTemplate::Revision(repository) => {
                    used.insert(repository.clone());
                }
                PropertyTemplate::Patch(repository) => {
                    return Err(ConfigurationError::PatchInTestProperties {
                        group: self.group.to_string(),
                        repository: repository.clone(),
                    });
                }
                PropertyTemplate::Roots => {
                    if !accepts_roots {
                        return Err(ConfigurationError::RootsNotAccepted(self.group.to_string()));
                    }
                    specifies_roots = true;
                }
                PropertyTemplate::IfRepositorySet { .. }
                | PropertyTemplate::IfBuilt(_)
                | PropertyTemplate::OwnedRevisions(_) => {}
            }
            templates.insert(property.clone(), template);
        }

        if accepts_roots && !specifies_roots {
            return Err(ConfigurationError::RootsNotInTestProperties(self.group.to_string()));
        }
        if used.len() != self.members.len() {
            return Err(ConfigurationError::UnusedRepositories {
                group: self.group.to_string(),
                context: "testing",
            });
        }
        Ok(templates)
    }

    fn parse_build_properties(
        &self,
        value: &Value,
        accepts_roots: bool,
    ) -> ValidationResult<BTreeMap<String, PropertyTemplate>> {
        let group = || self.group.to_string();
        if !accepts_roots {
            return Err(ConfigurationError::BuildPropertiesWithoutRoots(group()));
        }
        let properties = value
            .as_object()
            .ok_or_else(|| invalid_field(&format!("repositoryGroups.{}.buildProperties", self.group), "a dictionary"))?;
        let patch_accepting: BTreeSet<&str> = self
            .members
            .iter()
            .filter(|member| member.accepts_patch)
            .map(|member| member.name.as_str())
            .collect();
        if patch_accepting.is_empty() {
            return Err(ConfigurationError::BuildPropertiesWithoutPatch(group()));
        }

        let mut templates = BTreeMap::new();
        let mut revisions = BTreeSet::new();
        let mut patches = BTreeSet::new();
        for (property, value) in properties {
            let template = parse_template(self.group, property, value)?;
            if template == PropertyTemplate::Roots {
                return Err(ConfigurationError::RootsInBuildProperties(group()));
            }
            self.check_references(&template)?;
            match &template {
                PropertyTemplate::Revision(repository) => {
                    revisions.insert(repository.clone());
                }
                PropertyTemplate::Patch(repository) => {
                    if !patch_accepting.contains(repository.as_str()) {
                        return Err(ConfigurationError::PatchNotAccepted {
                            group: group(),
                            repository: repository.clone(),
                        });
                    }
                    patches.insert(repository.clone());
                }
                _ => {}
            }
            templates.insert(property.clone(), template);
        }

        if let Some(repository) = patches.iter().find(|repository| !revisions.contains(*repository)) {
            return Err(ConfigurationError::PatchWithoutRevision {
                group: group(),
                repository: repository.clone(),
            });
        }
        if patches.len() != patch_accepting.len() {
            return Err(ConfigurationError::UnusedRepositories {
                group: group(),
                context: "building a patch",
            });
        }
        Ok(templates)
    }
}

fn parse_template(group: &str, property: &str, value: &Value) -> ValidationResult<PropertyTemplate> {
    let invalid = || ConfigurationError::InvalidPropertyTemplate {
        group: group.to_string(),
        property: property.to_string(),
    };
    let object = value.as_object().ok_or_else(invalid)?;
    let string = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);

    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    let template = match keys.as_slice() {
        ["revision"] => string("revision").map(PropertyTemplate::Revision),
        ["patch"] => string("patch").map(PropertyTemplate::Patch),
        ["roots"] => Some(PropertyTemplate::Roots),
        ["ifBuilt"] => string("ifBuilt").map(PropertyTemplate::IfBuilt),
        ["ownedRevisions"] => string("ownedRevisions").map(PropertyTemplate::OwnedRevisions),
        ["ifRepositorySet", "value"] => {
            let repositories = object
                .get("ifRepositorySet")
                .and_then(Value::as_array)
                .filter(|repositories| !repositories.is_empty())
                .and_then(|repositories| {
                    repositories
                        .iter()
                        .map(|repository| repository.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                });
            repositories
                .zip(string("value"))
                .map(|(repositories, value)| PropertyTemplate::IfRepositorySet { repositories, value })
        }
        _ => None,
    };
    template.ok_or_else(invalid)
}

fn parse_builders(value: Option<&Value>) -> ValidationResult<BTreeMap<String, BuilderEntry>> {
    let Some(value) = value else {
        return Ok(BTreeMap::new());
    };
    let builders = value.as_object().ok_or_else(|| invalid_field("builders", "a dictionary"))?;

    let mut parsed = BTreeMap::new();
    for (key, definition) in builders {
        let definition = definition
            .as_object()
            .ok_or_else(|| invalid_field(&format!("builders.{key}"), "a dictionary"))?;

        let mut name = None;
        let mut properties = BTreeMap::new();
        let mut slave_list = None;
        for (parameter, value) in definition {
            match parameter.as_str() {
                "builder" => name = value.as_str().map(str::to_string),
                "properties" => properties = parse_properties(value)?,
                "slaveList" => {
                    let slaves = value
                        .as_array()
                        .and_then(|slaves| {
                            slaves
                                .iter()
                                .map(|slave| slave.as_str().map(str::to_string))
                                .collect::<Option<Vec<_>>>()
                        })
                        .ok_or_else(|| ConfigurationError::InvalidSlaveList(key.clone()))?;
                    slave_list = Some(slaves);
                }
                _ => return Err(ConfigurationError::UnrecognizedParameter(parameter.clone())),
            }
        }
        let name = name.ok_or_else(|| ConfigurationError::MissingBuilderName(key.clone()))?;
        parsed.insert(
            key.clone(),
            BuilderEntry {
                name,
                properties,
                slave_list,
            },
        );
    }
    Ok(parsed)
}

/// A builder's definition in `builders`, creating it on first reference.
fn builder_slot<'b>(
    builders: &'b mut Vec<BuilderDefinition>,
    entries: &BTreeMap<String, BuilderEntry>,
    key: &Value,
) -> ValidationResult<&'b mut BuilderDefinition> {
    let (key, entry) = key
        .as_str()
        .and_then(|key| entries.get_key_value(key))
        .ok_or_else(|| ConfigurationError::InvalidBuilder(display_value(key)))?;

    let index = match builders.iter().position(|builder| &builder.key == key) {
        Some(index) => index,
        None => {
            builders.push(BuilderDefinition {
                key: key.clone(),
                name: entry.name.clone(),
                properties: entry.properties.clone(),
                slave_list: entry.slave_list.clone(),
                test_configurations: Vec::new(),
                build_configurations: Vec::new(),
            });
            builders.len() - 1
        }
    };
    Ok(&mut builders[index])
}

fn parse_properties(value: &Value) -> ValidationResult<BTreeMap<String, String>> {
    let properties = value.as_object().ok_or(ConfigurationError::PropertiesNotDictionary)?;
    properties
        .iter()
        .map(|(name, value)| match value {
            Value::String(value) => Ok((name.clone(), value.clone())),
            other => Err(ConfigurationError::NonStringProperty {
                name: name.clone(),
                value_type: json_type_name(other).to_string(),
            }),
        })
        .collect()
}

fn configuration_rows<'v>(root: &'v Map<String, Value>, field: &str) -> ValidationResult<&'v [Value]> {
    match root.get(field) {
        None => Ok(&[]),
        Some(Value::Array(rows)) => Ok(rows),
        Some(_) => Err(invalid_field(field, "an array")),
    }
}

fn row_list<'v>(row: &'v Value, kind: &'static str, index: usize, field: &'static str) -> ValidationResult<&'v [Value]> {
    row.get(field)
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty())
        .map(Vec::as_slice)
        .ok_or(ConfigurationError::NotAnArray { kind, index, field })
}

fn optional_string(root: &Map<String, Value>, field: &str) -> ValidationResult<Option<String>> {
    match root.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(invalid_field(field, "a string")),
    }
}

/// `Some(false)` when absent, `None` when present but not a boolean.
fn optional_bool(value: Option<&Value>) -> Option<bool> {
    match value {
        None => Some(false),
        Some(value) => value.as_bool(),
    }
}

fn invalid_field(field: &str, expected: &str) -> ConfigurationError {
    ConfigurationError::InvalidField {
        field: field.to_string(),
        expected: expected.to_string(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
