//! Integration tests for the depgraph CLI
//!
//! These tests run full generate/update/query workflows against small
//! repositories written to temporary directories.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the depgraph binary
#[allow(deprecated)]
fn depgraph() -> Command {
    Command::cargo_bin("depgraph").expect("Failed to find depgraph binary")
}

/// A repository in a temp dir plus an isolated home directory.
struct Workspace {
    repo: TempDir,
    home: TempDir,
}

impl Workspace {
    fn new(files: &[(&str, &str)]) -> Self {
        let repo = tempfile::Builder::new()
            .prefix("depgraph_cli_")
            .tempdir()
            .expect("Failed to create temp dir");
        let home = TempDir::new().expect("Failed to create home dir");
        let workspace = Self { repo, home };
        for (path, content) in files {
            workspace.write(path, content);
        }
        workspace
    }

    fn two_files() -> Self {
        Self::new(&[
            ("a.py", "from b import bar\n\n\ndef foo():\n    return bar()\n"),
            ("b.py", "def bar():\n    print(\"bar\")\n"),
        ])
    }

    fn path(&self) -> &Path {
        self.repo.path()
    }

    fn write(&self, path: &str, content: &str) {
        let full = self.repo.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = depgraph();
        cmd.env("HOME", self.home.path())
            .env_remove("DEPGRAPH_CONFIG")
            .env_remove("RUST_LOG")
            .env("DEPGRAPH_REPO", self.path());
        cmd
    }

    fn stats_json(&self) -> serde_json::Value {
        let output = self
            .cmd()
            .args(["stats", "--json"])
            .output()
            .expect("Failed to run stats");
        assert!(output.status.success(), "stats failed: {:?}", output);
        serde_json::from_slice(&output.stdout).expect("stats output is JSON")
    }
}

// ============================================================================
// Generate
// ============================================================================

#[test]
fn test_generate_writes_json_graph() {
    let ws = Workspace::two_files();

    ws.cmd().arg("generate").assert().success();

    assert!(ws.path().join(".depgraph/graph.json").exists());
    let stats = ws.stats_json();
    assert_eq!(stats["stats"]["files"], 2);
    assert_eq!(stats["stats"]["components_by_kind"]["function"], 2);
    assert_eq!(stats["stats"]["components_by_kind"]["residual"], 2);
}

#[test]
fn test_generate_sqlite_format() {
    let ws = Workspace::two_files();

    ws.cmd()
        .args(["generate", "--format", "sqlite"])
        .assert()
        .success();
    assert!(ws.path().join(".depgraph/graph.db").exists());

    ws.cmd()
        .args(["stats", "--graph"])
        .arg(ws.path().join(".depgraph/graph.db"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Files:"));
}

#[test]
fn test_generate_with_output_and_filter() {
    let ws = Workspace::two_files();
    let out = ws.path().join("out/graph.json");

    ws.cmd()
        .args(["generate", "--filter", r"^b\b", "--output"])
        .arg(&out)
        .assert()
        .success();

    assert!(out.exists());
    ws.cmd()
        .args(["stats", "--json", "--graph"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"components\": 2"));
}

#[test]
fn test_generate_empty_repository_fails() {
    let ws = Workspace::new(&[("README.md", "# nothing to parse\n")]);

    ws.cmd().arg("generate").assert().failure();
}

#[test]
fn test_generate_missing_repository_fails() {
    let ws = Workspace::two_files();

    ws.cmd()
        .args(["--repo", "/definitely/not/a/repo", "generate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

// ============================================================================
// Query
// ============================================================================

#[test]
fn test_stats_without_graph_fails() {
    let ws = Workspace::two_files();

    ws.cmd()
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("depgraph generate"));
}

#[test]
fn test_stats_validate_passes_for_fresh_graph() {
    let ws = Workspace::two_files();
    ws.cmd().arg("generate").assert().success();

    ws.cmd()
        .args(["stats", "--validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No invariant violations"));
}

#[test]
fn test_deps_forward_reverse_and_external() {
    let ws = Workspace::two_files();
    ws.cmd().arg("generate").assert().success();

    ws.cmd()
        .args(["deps", "a.foo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("b.bar [function]"));

    ws.cmd()
        .args(["deps", "bar", "--reverse"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a.foo [function]"));

    ws.cmd()
        .args(["deps", "b.bar"])
        .assert()
        .success()
        .stdout(predicate::str::contains("print [external]"));
}

#[test]
fn test_deps_transitive_json() {
    let ws = Workspace::two_files();
    ws.cmd().arg("generate").assert().success();

    let output = ws
        .cmd()
        .args(["deps", "a.foo", "--transitive", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["component"], "a.foo");
    let names: Vec<&str> = report["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"b.bar"));
    assert!(names.contains(&"print"));
}

#[test]
fn test_deps_unknown_component_fails() {
    let ws = Workspace::two_files();
    ws.cmd().arg("generate").assert().success();

    ws.cmd()
        .args(["deps", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No component named"));
}

// ============================================================================
// Update
// ============================================================================

#[test]
fn test_update_requires_graph() {
    let ws = Workspace::two_files();

    ws.cmd()
        .arg("update")
        .assert()
        .failure()
        .stderr(predicate::str::contains("depgraph generate"));
}

#[test]
fn test_update_snapshot_applies_changes() {
    let ws = Workspace::two_files();
    ws.cmd().arg("generate").assert().success();

    ws.write("c.py", "def baz():\n    return 1\n");
    std::fs::remove_file(ws.path().join("a.py")).unwrap();

    ws.cmd().args(["update", "--snapshot"]).assert().success();

    let stats = ws.stats_json();
    assert_eq!(stats["stats"]["files"], 2);
    ws.cmd()
        .args(["deps", "baz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("c.baz has no dependencies"));
    ws.cmd().args(["deps", "a.foo"]).assert().failure();
}

#[test]
fn test_update_without_changes_keeps_graph() {
    let ws = Workspace::two_files();
    ws.cmd().arg("generate").assert().success();
    let before = std::fs::read_to_string(ws.path().join(".depgraph/graph.json")).unwrap();

    ws.cmd().arg("update").assert().success();

    let after = std::fs::read_to_string(ws.path().join(".depgraph/graph.json")).unwrap();
    let before: serde_json::Value = serde_json::from_str(&before).unwrap();
    let after: serde_json::Value = serde_json::from_str(&after).unwrap();
    assert_eq!(before["components"], after["components"]);
    assert_eq!(before["files"], after["files"]);
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_init_and_show() {
    let ws = Workspace::two_files();

    ws.cmd().args(["config", "init"]).assert().success();
    assert!(ws.path().join(".depgraph/config.toml").exists());

    ws.cmd()
        .args(["config", "init"])
        .assert()
        .success()
        .stderr(predicate::str::contains("--force"));

    ws.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[storage]"))
        .stdout(predicate::str::contains("[analysis]"));
}

#[test]
fn test_local_config_selects_format() {
    let ws = Workspace::two_files();
    ws.write(".depgraph/config.toml", "[storage]\nformat = \"sqlite\"\n");

    ws.cmd().arg("generate").assert().success();

    assert!(ws.path().join(".depgraph/graph.db").exists());
    assert!(!ws.path().join(".depgraph/graph.json").exists());
}

#[test]
fn test_explicit_config_file() {
    let ws = Workspace::two_files();
    let config = ws.home.path().join("custom.toml");
    std::fs::write(&config, "[analysis]\nexclude_patterns = [\"b.py\"]\n").unwrap();

    ws.cmd()
        .arg("--config")
        .arg(&config)
        .arg("generate")
        .assert()
        .success();

    let stats = ws.stats_json();
    assert_eq!(stats["stats"]["files"], 1);
}
