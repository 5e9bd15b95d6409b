//! Stages that provide the working tree and its version-control metadata.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::pipeline::{
    AsyncProcessor, AttrKey, AttrValue, AttributeUpdates, Container, Processor, ProcessorSchema,
    StageError,
};
use crate::vcs::GitRepository;

/// Uses an existing local working tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRepository;

impl LocalRepository {
    pub const SCHEMA: ProcessorSchema =
        ProcessorSchema::new("LocalRepository", &[], &[AttrKey::IsDownloaded]);
}

impl Processor for LocalRepository {
    fn schema(&self) -> ProcessorSchema {
        Self::SCHEMA
    }

    fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError> {
        let path = container.repo_path();
        if !path.is_dir() {
            return Err(StageError::Invalid(format!(
                "repository path {} is not a directory",
                path.display()
            )));
        }
        Ok(AttributeUpdates::new().set(AttrKey::IsDownloaded, AttrValue::Flag(false)))
    }
}

/// Clones the repository's remote URL into its working tree path.
///
/// An existing clone at that path is reused.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloneRepository;

impl CloneRepository {
    pub const SCHEMA: ProcessorSchema =
        ProcessorSchema::new("CloneRepository", &[], &[AttrKey::IsDownloaded]);
}

#[async_trait]
impl AsyncProcessor for CloneRepository {
    fn schema(&self) -> ProcessorSchema {
        Self::SCHEMA
    }

    async fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError> {
        let repo = container.repo();
        let url = repo.url.as_deref().ok_or_else(|| {
            StageError::Invalid(format!("repository {} has no remote URL", repo.name))
        })?;

        let downloaded = if GitRepository::is_repository(&repo.path) {
            info!("Reusing existing clone at {}", repo.path.display());
            false
        } else {
            GitRepository::clone_into(url, &repo.path).await?;
            true
        };

        Ok(AttributeUpdates::new().set(AttrKey::IsDownloaded, AttrValue::Flag(downloaded)))
    }
}

/// Reads HEAD commit and author. Both are unset outside a git working tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitMetadata;

impl GitMetadata {
    pub const SCHEMA: ProcessorSchema = ProcessorSchema::new(
        "GitMetadata",
        &[],
        &[AttrKey::CommitHash, AttrKey::Author],
    );
}

impl Processor for GitMetadata {
    fn schema(&self) -> ProcessorSchema {
        Self::SCHEMA
    }

    fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError> {
        let path = container.repo_path();
        let (commit, author) = if GitRepository::is_repository(path) {
            let repo = GitRepository::open(path)?;
            (repo.head_commit()?, repo.head_author()?)
        } else {
            debug!("{} is not a git repository", path.display());
            (None, None)
        };

        Ok(AttributeUpdates::new()
            .set(AttrKey::CommitHash, AttrValue::OptionalText(commit))
            .set(AttrKey::Author, AttrValue::OptionalText(author)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Compose, RepoIdentity};

    #[test]
    fn test_local_repository_requires_directory() {
        let temp = tempfile::tempdir().unwrap();
        let ok = Container::new(RepoIdentity::local(temp.path(), temp.path().join("g.json")));
        assert!(LocalRepository.apply(&ok).is_ok());

        let missing = Container::new(RepoIdentity::local(
            temp.path().join("nope"),
            temp.path().join("g.json"),
        ));
        assert!(LocalRepository.apply(&missing).is_err());
    }

    #[test]
    fn test_git_metadata_outside_git() {
        let temp = tempfile::tempdir().unwrap();
        let container = Container::new(RepoIdentity::local(temp.path(), temp.path().join("g.json")));
        let out = Compose::new()
            .then(GitMetadata)
            .run_blocking(container)
            .unwrap();
        assert_eq!(out.optional_text(AttrKey::CommitHash), Ok(None));
        assert_eq!(out.optional_text(AttrKey::Author), Ok(None));
    }

    #[tokio::test]
    async fn test_clone_requires_url() {
        let temp = tempfile::tempdir().unwrap();
        let container = Container::new(RepoIdentity::local(temp.path(), temp.path().join("g.json")));
        assert!(matches!(
            CloneRepository.apply(&container).await,
            Err(StageError::Invalid(_))
        ));
    }
}
