//! Domain errors for the build request synchronizer.

use thiserror::Error;

/// Fatal problems found while validating a triggerable configuration.
///
/// Every variant names the offending builder, type, group or repository so the
/// message alone is enough to fix the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("The configuration must be a dictionary")]
    NotADictionary,

    #[error("buildRequestArgument must specify the name of the property used to store the build request ID")]
    MissingBuildRequestArgument,

    #[error("\"{field}\" must be {expected}")]
    InvalidField { field: String, expected: String },

    #[error("The {kind} configuration {index} does not specify \"{field}\" as an array")]
    NotAnArray {
        kind: &'static str,
        index: usize,
        field: &'static str,
    },

    #[error("\"{0}\" is not a valid builder in the configuration")]
    InvalidBuilder(String),

    #[error("\"{0}\" is not a valid type in the configuration")]
    InvalidType(String),

    #[error("\"{0}\" is not a valid platform name")]
    InvalidPlatform(String),

    #[error("\"{0}\" does not specify a valid test path")]
    InvalidTest(String),

    #[error("\"{0}\" must specify the builder name")]
    MissingBuilderName(String),

    #[error("\"{0}\" specifies an invalid slave list")]
    InvalidSlaveList(String),

    #[error("\"{0}\" is used in both a build configuration and a test configuration")]
    BuilderInBothConfigurations(String),

    #[error("Build properties should be a dictionary")]
    PropertiesNotDictionary,

    #[error("Build properties \"{name}\" specifies a non-string value of type \"{value_type}\"")]
    NonStringProperty { name: String, value_type: String },

    #[error("Unrecognized parameter \"{0}\"")]
    UnrecognizedParameter(String),

    #[error("repositoryGroups must specify a dictionary from the name to its definition")]
    RepositoryGroupsNotDictionary,

    #[error("Repository group \"{0}\" does not specify a dictionary of repositories")]
    RepositoriesNotDictionary(String),

    #[error("Repository group \"{0}\" have an invalid description")]
    InvalidDescription(String),

    #[error("Repository group \"{group}\" contains invalid acceptsRoots value: {value}")]
    InvalidAcceptsRoots { group: String, value: String },

    #[error("\"{0}\" is not a valid repository name")]
    InvalidRepositoryName(String),

    #[error("\"{0}\" specifies a non-dictionary value")]
    RepositoryOptionsNotDictionary(String),

    #[error("\"{repository}\" contains invalid acceptsPatch value: {value}")]
    InvalidAcceptsPatch { repository: String, value: String },

    #[error("Repository group \"{0}\" does not specify any repository")]
    NoRepositories(String),

    #[error("Repository group \"{0}\" specifies the test configurations with an invalid type")]
    InvalidTestProperties(String),

    #[error("Repository group \"{group}\" specifies an invalid property template for \"{property}\"")]
    InvalidPropertyTemplate { group: String, property: String },

    #[error("Repository group \"{group}\" an invalid repository \"{repository}\"")]
    InvalidRepositoryReference { group: String, repository: String },

    #[error("Repository group \"{group}\" specifies a patch for \"{repository}\" in the properties for testing")]
    PatchInTestProperties { group: String, repository: String },

    #[error("Repository group \"{0}\" specifies roots in a property but it does not accept roots")]
    RootsNotAccepted(String),

    #[error("Repository group \"{0}\" accepts roots but does not specify roots in testProperties")]
    RootsNotInTestProperties(String),

    #[error("Repository group \"{group}\" does not use some of the repositories listed in {context}")]
    UnusedRepositories {
        group: String,
        context: &'static str,
    },

    #[error("Repository group \"{0}\" specifies the properties for building but does not accept roots in testing")]
    BuildPropertiesWithoutRoots(String),

    #[error("Repository group \"{0}\" specifies the properties for building but does not accept any patches")]
    BuildPropertiesWithoutPatch(String),

    #[error("Repository group \"{0}\" specifies roots in the properties for building")]
    RootsInBuildProperties(String),

    #[error("Repository group \"{group}\" specifies a patch for \"{repository}\" but it does not accept a patch")]
    PatchNotAccepted { group: String, repository: String },

    #[error("Repository group \"{group}\" specifies a patch for \"{repository}\" but does not specify a revision")]
    PatchWithoutRevision { group: String, repository: String },
}

/// Domain-level errors raised by the synchronizer and its collaborators.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Request to builder {builder} failed: {message}")]
    Transport { builder: String, message: String },

    #[error("Build request {id} cannot be submitted: {reason}")]
    UnschedulableRequest { id: u64, reason: String },

    #[error("Triggerable has not been initialized")]
    Uninitialized,

    #[error("Dashboard request failed: {0}")]
    Dashboard(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
