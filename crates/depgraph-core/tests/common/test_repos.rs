//! Scratch repositories and the checked-in fixture repository.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Path to the checked-in polyglot fixture repository.
pub fn polyglot_fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("polyglot")
}

/// A throwaway working tree.
///
/// The directory name carries no leading dot so the builder's walker,
/// which skips hidden entries, still visits it.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("depgraph_test_")
            .tempdir()
            .expect("create temp dir");
        Self { dir }
    }

    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let repo = Self::new();
        for (path, content) in files {
            repo.write(path, content);
        }
        repo
    }

    /// Copy of the polyglot fixture, safe to modify.
    pub fn polyglot() -> Self {
        let repo = Self::new();
        copy_tree(&polyglot_fixture(), repo.path());
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, content).expect("write file");
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.dir.path().join(relative)).expect("remove file");
    }

    /// Initialize git and commit everything, or `false` when git is unavailable.
    pub fn git_init(&self) -> bool {
        self.git(&["init", "-q"])
            && self.git(&["config", "user.email", "tests@depgraph.dev"])
            && self.git(&["config", "user.name", "Depgraph Tests"])
            && self.git(&["config", "commit.gpgsign", "false"])
            && self.commit_all("initial")
    }

    pub fn commit_all(&self, message: &str) -> bool {
        self.git(&["add", "-A"]) && self.git(&["commit", "-q", "-m", message])
    }

    fn git(&self, args: &[&str]) -> bool {
        Command::new("git")
            .args(args)
            .current_dir(self.dir.path())
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

fn copy_tree(from: &Path, to: &Path) {
    for entry in fs::read_dir(from).expect("read fixture dir") {
        let entry = entry.expect("fixture entry");
        let target = to.join(entry.file_name());
        if entry.file_type().expect("file type").is_dir() {
            fs::create_dir_all(&target).expect("create fixture dir");
            copy_tree(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).expect("copy fixture file");
        }
    }
}

/// File A defines `foo()` calling `bar()` from file B; `bar()` calls `print()`.
pub fn two_file_repo() -> TestRepo {
    TestRepo::with_files(&[
        ("a.py", "from b import bar\n\n\ndef foo():\n    return bar()\n"),
        ("b.py", "def bar():\n    print(\"bar\")\n"),
    ])
}
