//! Version Control and Change Detection
//!
//! Change sets describe which repository files were modified, added or
//! deleted since the graph was last built. They come from one of two sources:
//!
//! - a git diff between the previously recorded commit and the working tree
//!   (plus untracked files)
//! - a snapshot comparison of the current working tree against the file ids
//!   stored in the previous graph
//!
//! Git access shells out to the `git` binary.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::builder::{BuilderError, GraphBuilder};
use crate::extractor::normalize_source;
use crate::model::{File, FileId};

/// Errors that can occur during change detection.
#[derive(Error, Debug)]
pub enum VcsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("`{command}` failed: {stderr}")]
    GitCommand { command: String, stderr: String },

    #[error("Failed to clone {url}: {reason}")]
    CloneFailed { url: String, reason: String },

    #[error("Builder error: {0}")]
    Builder(#[from] BuilderError),
}

/// Result type for change detection.
pub type Result<T> = std::result::Result<T, VcsError>;

// ============================================================================
// Change Set
// ============================================================================

/// Status of one changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Modified,
    Added,
    Deleted,
}

/// One changed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub status: ChangeStatus,
}

/// Represents detected changes between two states of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Files that were modified (content changed).
    pub modified: Vec<String>,
    /// Files that were added.
    pub added: Vec<String>,
    /// Files that were deleted.
    pub deleted: Vec<String>,
}

impl ChangeSet {
    /// Create a new empty ChangeSet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Group individual changes by status. Paths are sorted and deduplicated.
    pub fn from_changes(changes: impl IntoIterator<Item = FileChange>) -> Self {
        let mut modified = BTreeSet::new();
        let mut added = BTreeSet::new();
        let mut deleted = BTreeSet::new();
        for change in changes {
            match change.status {
                ChangeStatus::Modified => modified.insert(change.path),
                ChangeStatus::Added => added.insert(change.path),
                ChangeStatus::Deleted => deleted.insert(change.path),
            };
        }
        Self {
            modified: modified.into_iter().collect(),
            added: added.into_iter().collect(),
            deleted: deleted.into_iter().collect(),
        }
    }

    /// Check if any changes were detected.
    pub fn has_changes(&self) -> bool {
        !self.modified.is_empty() || !self.added.is_empty() || !self.deleted.is_empty()
    }

    /// Total number of changed files.
    pub fn total_changes(&self) -> usize {
        self.modified.len() + self.added.len() + self.deleted.len()
    }

    /// Get all files that need to be re-processed (modified + added).
    pub fn files_to_process(&self) -> Vec<&str> {
        self.modified
            .iter()
            .chain(self.added.iter())
            .map(|s| s.as_str())
            .collect()
    }

    /// Keep only paths accepted by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.modified.retain(|p| keep(p));
        self.added.retain(|p| keep(p));
        self.deleted.retain(|p| keep(p));
    }

    /// Combine two change sets. A path listed by both takes its status
    /// from `other`.
    pub fn union(self, other: ChangeSet) -> ChangeSet {
        let overridden: BTreeSet<String> = other
            .changes()
            .into_iter()
            .map(|change| change.path)
            .collect();
        let kept = self
            .changes()
            .into_iter()
            .filter(|change| !overridden.contains(&change.path));
        ChangeSet::from_changes(kept.chain(other.changes()))
    }

    /// Flatten into individual changes.
    pub fn changes(&self) -> Vec<FileChange> {
        let tagged = |paths: &[String], status: ChangeStatus| -> Vec<FileChange> {
            paths
                .iter()
                .map(|path| FileChange {
                    path: path.clone(),
                    status,
                })
                .collect()
        };
        let mut changes = tagged(&self.modified, ChangeStatus::Modified);
        changes.extend(tagged(&self.added, ChangeStatus::Added));
        changes.extend(tagged(&self.deleted, ChangeStatus::Deleted));
        changes
    }
}

// ============================================================================
// Snapshot comparison
// ============================================================================

/// Compare the working tree against the files of a previous graph.
///
/// A file is modified when its content-addressed id (path plus formatted
/// text) differs from the stored one.
pub fn detect_snapshot_changes(
    builder: &GraphBuilder,
    directory: &Path,
    previous_files: &[File],
) -> Result<ChangeSet> {
    info!("Detecting changes against stored snapshot");
    let start = std::time::Instant::now();

    let current = builder.collect_files(directory)?;
    let previous: HashMap<&str, &FileId> = previous_files
        .iter()
        .map(|f| (f.relative_path.as_str(), &f.id))
        .collect();

    let changes: Vec<FileChange> = current
        .par_iter()
        .filter_map(|path| {
            let Some(old_id) = previous.get(path.as_str()) else {
                return Some(FileChange {
                    path: path.clone(),
                    status: ChangeStatus::Added,
                });
            };
            match current_file_id(directory, path) {
                Some(id) if &id == *old_id => None,
                _ => Some(FileChange {
                    path: path.clone(),
                    status: ChangeStatus::Modified,
                }),
            }
        })
        .collect();

    let current_paths: BTreeSet<&str> = current.iter().map(String::as_str).collect();
    let deleted = previous
        .keys()
        .filter(|path| !current_paths.contains(*path))
        .map(|path| FileChange {
            path: path.to_string(),
            status: ChangeStatus::Deleted,
        });

    let changeset = ChangeSet::from_changes(changes.into_iter().chain(deleted));

    info!(
        "Change detection completed in {:.3}s: {} modified, {} added, {} deleted",
        start.elapsed().as_secs_f64(),
        changeset.modified.len(),
        changeset.added.len(),
        changeset.deleted.len()
    );

    Ok(changeset)
}

fn current_file_id(directory: &Path, relative_path: &str) -> Option<FileId> {
    match std::fs::read_to_string(directory.join(relative_path)) {
        Ok(source) => Some(FileId::from_content(
            relative_path,
            &normalize_source(&source),
        )),
        Err(e) => {
            debug!("Cannot read {}: {}", relative_path, e);
            None
        }
    }
}

// ============================================================================
// Git
// ============================================================================

/// A git working tree.
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    /// Whether `path` is the root of a git working tree.
    pub fn is_repository(path: &Path) -> bool {
        path.join(".git").exists()
    }

    /// Open the working tree at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !Self::is_repository(&path) {
            return Err(VcsError::NotARepository(path));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clone `url` into `destination`.
    pub async fn clone_into(url: &str, destination: &Path) -> Result<Self> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        info!("Cloning {} into {}", url, destination.display());

        let output = tokio::process::Command::new("git")
            .arg("clone")
            .arg("--quiet")
            .arg(url)
            .arg(destination)
            .output()
            .await?;

        if !output.status.success() {
            return Err(VcsError::CloneFailed {
                url: url.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Self::open(destination)
    }

    /// Commit hash of HEAD, or `None` for a repository without commits.
    pub fn head_commit(&self) -> Result<Option<String>> {
        Ok(self
            .git(&["rev-parse", "--verify", "HEAD"])
            .ok()
            .map(|out| out.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    /// Author of HEAD as `name <email>`.
    pub fn head_author(&self) -> Result<Option<String>> {
        Ok(self
            .git(&["log", "-1", "--format=%an <%ae>"])
            .ok()
            .map(|out| out.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    /// Changes between commit `from` and the working tree, including
    /// untracked files.
    ///
    /// Paths are read NUL-separated so git never quotes them.
    pub fn changes_since(&self, from: &str) -> Result<ChangeSet> {
        let diff = self.git(&["diff", "--name-status", "--no-renames", "-z", from])?;
        let mut changes = parse_name_status(&diff);

        let untracked = self.git(&["ls-files", "--others", "--exclude-standard", "-z"])?;
        changes.extend(
            untracked
                .split('\0')
                .filter(|path| !path.is_empty())
                .map(|path| FileChange {
                    path: path.to_string(),
                    status: ChangeStatus::Added,
                }),
        );

        let changeset = ChangeSet::from_changes(changes);
        info!(
            "git diff {}: {} modified, {} added, {} deleted",
            from,
            changeset.modified.len(),
            changeset.added.len(),
            changeset.deleted.len()
        );
        Ok(changeset)
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()?;
        if !output.status.success() {
            return Err(VcsError::GitCommand {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Parse `git diff --name-status -z` output: status and path fields, each
/// terminated by NUL.
///
/// Type changes and unknown statuses count as modifications.
pub fn parse_name_status(output: &str) -> Vec<FileChange> {
    let mut fields = output.split('\0');
    let mut changes = Vec::new();
    while let (Some(status), Some(path)) = (fields.next(), fields.next()) {
        let Some(code) = status.trim().chars().next() else {
            continue;
        };
        if path.is_empty() {
            continue;
        }
        let status = match code {
            'A' => ChangeStatus::Added,
            'D' => ChangeStatus::Deleted,
            _ => ChangeStatus::Modified,
        };
        changes.push(FileChange {
            path: path.to_string(),
            status,
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn temp_dir() -> tempfile::TempDir {
        tempfile::Builder::new()
            .prefix("depgraph_test_")
            .tempdir()
            .unwrap()
    }

    #[test]
    fn test_changeset_accessors() {
        let changes = ChangeSet {
            modified: vec!["a.py".into()],
            added: vec!["b.py".into()],
            deleted: vec!["c.py".into()],
        };
        assert!(changes.has_changes());
        assert_eq!(changes.total_changes(), 3);
        assert_eq!(changes.files_to_process(), vec!["a.py", "b.py"]);
        assert!(!ChangeSet::new().has_changes());
    }

    #[test]
    fn test_from_changes_sorts_and_dedups() {
        let changes = ChangeSet::from_changes(vec![
            FileChange {
                path: "z.py".into(),
                status: ChangeStatus::Modified,
            },
            FileChange {
                path: "a.py".into(),
                status: ChangeStatus::Modified,
            },
            FileChange {
                path: "a.py".into(),
                status: ChangeStatus::Modified,
            },
        ]);
        assert_eq!(changes.modified, vec!["a.py".to_string(), "z.py".to_string()]);
        assert_eq!(changes.changes().len(), 2);
    }

    #[test]
    fn test_parse_name_status() {
        let output = "M\0src/a.py\0A\0src/b.py\0D\0old.py\0T\0link.py\0";
        let changes = parse_name_status(output);
        assert_eq!(
            changes,
            vec![
                FileChange {
                    path: "src/a.py".into(),
                    status: ChangeStatus::Modified
                },
                FileChange {
                    path: "src/b.py".into(),
                    status: ChangeStatus::Added
                },
                FileChange {
                    path: "old.py".into(),
                    status: ChangeStatus::Deleted
                },
                FileChange {
                    path: "link.py".into(),
                    status: ChangeStatus::Modified
                },
            ]
        );
    }

    #[test]
    fn test_snapshot_changes() {
        let temp = temp_dir();
        fs::write(temp.path().join("same.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("changed.py"), "y = 2\n").unwrap();
        fs::write(temp.path().join("new.py"), "z = 3\n").unwrap();

        let previous = vec![
            File::new("same.py", "x = 1\n", vec![], vec![], vec![]),
            File::new("changed.py", "y = 1\n", vec![], vec![], vec![]),
            File::new("gone.py", "w = 0\n", vec![], vec![], vec![]),
        ];

        let changes =
            detect_snapshot_changes(&GraphBuilder::new(), temp.path(), &previous).unwrap();
        assert_eq!(changes.modified, vec!["changed.py".to_string()]);
        assert_eq!(changes.added, vec!["new.py".to_string()]);
        assert_eq!(changes.deleted, vec!["gone.py".to_string()]);
    }

    #[test]
    fn test_snapshot_ignores_line_ending_only_changes() {
        let temp = temp_dir();
        fs::write(temp.path().join("a.py"), "x = 1\r\n").unwrap();
        let previous = vec![File::new("a.py", "x = 1\n", vec![], vec![], vec![])];

        let changes =
            detect_snapshot_changes(&GraphBuilder::new(), temp.path(), &previous).unwrap();
        assert!(!changes.has_changes());
    }

    #[test]
    fn test_open_non_repository() {
        let temp = temp_dir();
        assert!(matches!(
            GitRepository::open(temp.path()),
            Err(VcsError::NotARepository(_))
        ));
    }

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run_git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(status.status.success(), "git {:?} failed", args);
    }

    #[test]
    fn test_git_changes_since_commit() {
        if !git_available() {
            return;
        }
        let temp = temp_dir();
        let dir = temp.path();
        fs::write(dir.join("keep.py"), "a = 1\n").unwrap();
        fs::write(dir.join("edit.py"), "b = 1\n").unwrap();
        fs::write(dir.join("drop.py"), "c = 1\n").unwrap();
        run_git(dir, &["init", "--quiet"]);
        run_git(dir, &["add", "."]);
        run_git(dir, &["commit", "--quiet", "-m", "initial"]);

        let repo = GitRepository::open(dir).unwrap();
        let head = repo.head_commit().unwrap().unwrap();
        assert_eq!(head.len(), 40);
        assert_eq!(
            repo.head_author().unwrap().as_deref(),
            Some("Test <test@example.com>")
        );

        fs::write(dir.join("edit.py"), "b = 2\n").unwrap();
        fs::remove_file(dir.join("drop.py")).unwrap();
        fs::write(dir.join("fresh.py"), "d = 1\n").unwrap();

        let changes = repo.changes_since(&head).unwrap();
        assert_eq!(changes.modified, vec!["edit.py".to_string()]);
        assert_eq!(changes.added, vec!["fresh.py".to_string()]);
        assert_eq!(changes.deleted, vec!["drop.py".to_string()]);
    }

    #[test]
    fn test_git_changes_keep_non_ascii_paths() {
        if !git_available() {
            return;
        }
        let temp = temp_dir();
        let dir = temp.path();
        fs::write(dir.join("café.py"), "a = 1\n").unwrap();
        run_git(dir, &["init", "--quiet"]);
        run_git(dir, &["add", "."]);
        run_git(dir, &["commit", "--quiet", "-m", "initial"]);

        let repo = GitRepository::open(dir).unwrap();
        let head = repo.head_commit().unwrap().unwrap();
        fs::write(dir.join("café.py"), "a = 2\n").unwrap();
        fs::write(dir.join("naïve.py"), "b = 1\n").unwrap();

        let changes = repo.changes_since(&head).unwrap();
        assert_eq!(changes.modified, vec!["café.py".to_string()]);
        assert_eq!(changes.added, vec!["naïve.py".to_string()]);
    }

    #[test]
    fn test_union_prefers_other_status() {
        let git = ChangeSet {
            modified: vec!["a.py".into()],
            added: vec!["c.py".into()],
            deleted: vec![],
        };
        let snapshot = ChangeSet {
            modified: vec!["c.py".into()],
            added: vec![],
            deleted: vec!["d.py".into()],
        };

        let merged = git.union(snapshot);
        assert_eq!(merged.modified, vec!["a.py".to_string(), "c.py".to_string()]);
        assert!(merged.added.is_empty());
        assert_eq!(merged.deleted, vec!["d.py".to_string()]);
    }

    #[test]
    fn test_retain_filters_every_status() {
        let mut changes = ChangeSet {
            modified: vec!["a.py".into(), "notes.md".into()],
            added: vec!["b.md".into()],
            deleted: vec!["c.py".into()],
        };
        changes.retain(|path| path.ends_with(".py"));
        assert_eq!(changes.modified, vec!["a.py".to_string()]);
        assert!(changes.added.is_empty());
        assert_eq!(changes.deleted, vec!["c.py".to_string()]);
    }
}
