pub mod build_request;
pub mod buildbot_entry;
pub mod commit_set;
pub mod config;
pub mod reference;
pub mod triggerable_config;

pub use build_request::{
    BuildRequest, BuildRequestBatch, BuildRequestId, BuildRequestStatus, BuildRequestUpdate, TestGroup,
    TestGroupId,
};
pub use buildbot_entry::{
    property_value, BuildPhase, BuildbotEntry, BuildbotUrls, RawBuild, RawBuildSlot, RawPendingBuild,
    RecentBuilds,
};
pub use commit_set::{CommitOwner, CommitSet, CommitSetId, CommitSetItem, UploadedFile};
pub use config::{BuildbotConfig, Config, DashboardConfig, LoggingConfig, SyncConfig};
pub use reference::{Platform, PlatformId, ReferenceSnapshot, Repository, RepositoryId, Test, TestId};
pub use triggerable_config::{
    BuilderDefinition, PropertyTemplate, RepositoryGroupDefinition, RepositoryGroupMember, SlaveAuth,
    TestConfiguration, TriggerableConfig,
};
