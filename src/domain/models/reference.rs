//! Read-only reference data shared by the validator and the adapters.

use serde::{Deserialize, Serialize};

pub type RepositoryId = u64;
pub type PlatformId = u64;
pub type TestId = u64;

/// A source repository known to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub name: String,
    /// Set for owned repositories, whose revisions are pinned by their owner.
    #[serde(default)]
    pub owner: Option<RepositoryId>,
}

impl Repository {
    pub fn is_top_level(&self) -> bool {
        self.owner.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: PlatformId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    pub id: TestId,
    pub name: String,
    #[serde(default, rename = "parentId")]
    pub parent: Option<TestId>,
}

/// Snapshot of repositories, platforms and tests.
///
/// Passed explicitly to the configuration validator and the dashboard adapter
/// instead of living in process-wide lookup tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    #[serde(default)]
    pub repositories: Vec<Repository>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub tests: Vec<Test>,
}

impl ReferenceSnapshot {
    pub fn with_repository(mut self, id: RepositoryId, name: &str, owner: Option<RepositoryId>) -> Self {
        self.repositories.push(Repository {
            id,
            name: name.to_string(),
            owner,
        });
        self
    }

    pub fn with_platform(mut self, id: PlatformId, name: &str) -> Self {
        self.platforms.push(Platform {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn with_test(mut self, id: TestId, name: &str, parent: Option<TestId>) -> Self {
        self.tests.push(Test {
            id,
            name: name.to_string(),
            parent,
        });
        self
    }

    pub fn repository(&self, id: RepositoryId) -> Option<&Repository> {
        self.repositories.iter().find(|repository| repository.id == id)
    }

    pub fn find_top_level_repository(&self, name: &str) -> Option<&Repository> {
        self.repositories
            .iter()
            .find(|repository| repository.is_top_level() && repository.name == name)
    }

    pub fn platform(&self, id: PlatformId) -> Option<&Platform> {
        self.platforms.iter().find(|platform| platform.id == id)
    }

    pub fn find_platform(&self, name: &str) -> Option<&Platform> {
        self.platforms.iter().find(|platform| platform.name == name)
    }

    pub fn test(&self, id: TestId) -> Option<&Test> {
        self.tests.iter().find(|test| test.id == id)
    }

    /// Resolve a test by its path of names from the root suite down.
    pub fn find_test_by_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Test> {
        let mut parent: Option<TestId> = None;
        let mut found = None;
        for name in path {
            let test = self
                .tests
                .iter()
                .find(|test| test.parent == parent && test.name == name.as_ref())?;
            parent = Some(test.id);
            found = Some(test);
        }
        found
    }

    /// Full path of a test with its components joined by `/`.
    pub fn test_full_name(&self, id: TestId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.test(id);
        while let Some(test) = current {
            names.push(test.name.as_str());
            current = test.parent.and_then(|parent| self.test(parent));
        }
        if names.is_empty() {
            return None;
        }
        names.reverse();
        Some(names.join("/"))
    }
}
