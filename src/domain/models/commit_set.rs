//! Immutable pinnings of revisions, patches and root files.

use serde::{Deserialize, Serialize};

pub type CommitSetId = u64;
pub type UploadedFileId = u64;

/// A file uploaded to the dashboard: a patch or a build product ("root").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: UploadedFileId,
    pub filename: String,
    pub extension: String,
    /// Absolute URL builders use to fetch the file.
    pub url: String,
}

impl UploadedFile {
    /// Build the file record served from `{dashboard}/api/uploaded-file/{id}{extension}`.
    pub fn new(dashboard_url: &str, id: UploadedFileId, filename: &str, extension: &str) -> Self {
        Self {
            id,
            filename: filename.to_string(),
            extension: extension.to_string(),
            url: format!(
                "{}/api/uploaded-file/{id}{extension}",
                dashboard_url.trim_end_matches('/')
            ),
        }
    }
}

/// The revision of the repository that pins an owned commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOwner {
    pub repository: String,
    pub revision: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSetItem {
    pub repository: String,
    pub revision: String,
    #[serde(default)]
    pub patch: Option<UploadedFile>,
    #[serde(default)]
    pub root_file: Option<UploadedFile>,
    #[serde(default)]
    pub requires_build: bool,
    #[serde(default)]
    pub commit_owner: Option<CommitOwner>,
}

impl CommitSetItem {
    pub fn new(repository: &str, revision: &str) -> Self {
        Self {
            repository: repository.to_string(),
            revision: revision.to_string(),
            patch: None,
            root_file: None,
            requires_build: false,
            commit_owner: None,
        }
    }

    pub fn with_patch(mut self, patch: UploadedFile) -> Self {
        self.patch = Some(patch);
        self
    }

    pub fn with_root_file(mut self, root: UploadedFile) -> Self {
        self.root_file = Some(root);
        self
    }

    pub fn requiring_build(mut self) -> Self {
        self.requires_build = true;
        self
    }

    pub fn owned_by(mut self, repository: &str, revision: &str) -> Self {
        self.commit_owner = Some(CommitOwner {
            repository: repository.to_string(),
            revision: revision.to_string(),
        });
        self
    }
}

/// One revision per repository, plus optional patches and root files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSet {
    pub id: CommitSetId,
    pub items: Vec<CommitSetItem>,
    #[serde(default)]
    pub custom_roots: Vec<UploadedFile>,
}

impl CommitSet {
    pub fn new(id: CommitSetId) -> Self {
        Self {
            id,
            items: Vec::new(),
            custom_roots: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: CommitSetItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_custom_root(mut self, root: UploadedFile) -> Self {
        self.custom_roots.push(root);
        self
    }

    /// The top-level item for `repository`. Owned commits are never returned here.
    pub fn item(&self, repository: &str) -> Option<&CommitSetItem> {
        self.items
            .iter()
            .find(|item| item.repository == repository && item.commit_owner.is_none())
    }

    pub fn revision_for(&self, repository: &str) -> Option<&str> {
        self.item(repository).map(|item| item.revision.as_str())
    }

    pub fn patch_for(&self, repository: &str) -> Option<&UploadedFile> {
        self.item(repository).and_then(|item| item.patch.as_ref())
    }

    pub fn requires_build_for(&self, repository: &str) -> bool {
        self.item(repository).is_some_and(|item| item.requires_build)
    }

    /// Custom roots first, then roots produced by building this commit set.
    pub fn all_root_files(&self) -> Vec<&UploadedFile> {
        self.custom_roots
            .iter()
            .chain(self.items.iter().filter_map(|item| item.root_file.as_ref()))
            .collect()
    }

    /// Owned commits that must be built, pinned by a revision of `owner`.
    pub fn owned_commits_requiring_build<'a>(
        &'a self,
        owner: &'a str,
    ) -> impl Iterator<Item = &'a CommitSetItem> + 'a {
        self.items.iter().filter(move |item| {
            item.requires_build
                && item
                    .commit_owner
                    .as_ref()
                    .is_some_and(|commit_owner| commit_owner.repository == owner)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploaded_file_url() {
        let file = UploadedFile::new("http://build.webkit.org/", 453, "patch.dat", ".dat");
        assert_eq!(file.url, "http://build.webkit.org/api/uploaded-file/453.dat");
    }

    #[test]
    fn test_item_lookup_skips_owned_commits() {
        let set = CommitSet::new(1)
            .with_item(CommitSetItem::new("Owner Repository", "owner-001"))
            .with_item(
                CommitSetItem::new("Owned Repository", "owned-002")
                    .owned_by("Owner Repository", "owner-001")
                    .requiring_build(),
            );

        assert_eq!(set.revision_for("Owner Repository"), Some("owner-001"));
        assert_eq!(set.revision_for("Owned Repository"), None);
        assert_eq!(set.owned_commits_requiring_build("Owner Repository").count(), 1);
        assert_eq!(set.owned_commits_requiring_build("WebKit").count(), 0);
    }

    #[test]
    fn test_all_root_files_puts_custom_roots_first() {
        let base = "http://dashboard";
        let set = CommitSet::new(1)
            .with_item(CommitSetItem::new("WebKit", "191622").with_root_file(UploadedFile::new(base, 2, "root.tgz", ".tgz")))
            .with_custom_root(UploadedFile::new(base, 1, "custom.tgz", ".tgz"));

        let ids: Vec<_> = set.all_root_files().iter().map(|file| file.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
