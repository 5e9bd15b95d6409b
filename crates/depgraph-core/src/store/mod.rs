//! Graph Persistence
//!
//! Saves and loads a [`CodeGraph`] together with the repository metadata it
//! was built from. Two formats are supported:
//!
//! - **JSON**: a single pretty-printed [`GraphDocument`].
//! - **SQLite**: `nodes` (files, components, external symbols), `edges`
//!   (`USES`, `INSIDE`) and `metadata` tables, keyed by file and component ids.
//!
//! ## Usage
//!
//! ```ignore
//! use depgraph_core::store::{GraphDocument, GraphStore};
//!
//! let store = GraphStore::from_path(".depgraph/graph.db");
//! store.save(&GraphDocument::new(graph).with_commit_hash(commit))?;
//! let document = store.load()?;
//! ```

pub mod json;
pub mod sqlite;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::{CodeGraph, Component, ExternalSymbolTable, File, GRAPH_SCHEMA_VERSION};

/// Errors that can occur while saving or loading graphs.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Graph not found: {0}")]
    NotFound(PathBuf),

    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: String, found: String },

    #[error("Corrupt graph store: {0}")]
    Corrupt(String),

    #[error("Unknown graph format: {0}")]
    UnknownFormat(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Format
// ============================================================================

/// On-disk representation of a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    #[default]
    Json,
    Sqlite,
}

impl GraphFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphFormat::Json => "json",
            GraphFormat::Sqlite => "sqlite",
        }
    }

    /// Default file name inside the graph directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            GraphFormat::Json => "graph.json",
            GraphFormat::Sqlite => "graph.db",
        }
    }

    /// Guess the format from a path's extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("db" | "sqlite" | "sqlite3") => GraphFormat::Sqlite,
            _ => GraphFormat::Json,
        }
    }
}

impl fmt::Display for GraphFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(GraphFormat::Json),
            "sqlite" | "db" => Ok(GraphFormat::Sqlite),
            other => Err(StoreError::UnknownFormat(other.to_string())),
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// A persisted graph plus the repository state it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub schema_version: String,
    /// Repository name or source URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Commit the graph was built at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    pub components: Vec<Component>,
    pub files: Vec<File>,
    pub external_symbols: ExternalSymbolTable,
}

impl GraphDocument {
    pub fn new(graph: CodeGraph) -> Self {
        Self {
            schema_version: GRAPH_SCHEMA_VERSION.to_string(),
            repository: None,
            commit_hash: None,
            components: graph.components,
            files: graph.files,
            external_symbols: graph.external_symbols,
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_commit_hash(mut self, commit_hash: Option<String>) -> Self {
        self.commit_hash = commit_hash;
        self
    }

    pub fn graph(&self) -> CodeGraph {
        CodeGraph::new(
            self.components.clone(),
            self.files.clone(),
            self.external_symbols.clone(),
        )
    }

    pub fn into_graph(self) -> CodeGraph {
        CodeGraph::new(self.components, self.files, self.external_symbols)
    }

    pub(crate) fn check_version(found: &str) -> Result<()> {
        if found != GRAPH_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersionMismatch {
                expected: GRAPH_SCHEMA_VERSION.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Store
// ============================================================================

/// A graph location plus the format used to read and write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStore {
    path: PathBuf,
    format: GraphFormat,
}

impl GraphStore {
    pub fn new(path: impl Into<PathBuf>, format: GraphFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Store whose format is inferred from the file extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = GraphFormat::from_path(&path);
        Self { path, format }
    }

    /// Store at the default file name inside `graph_dir`.
    pub fn in_directory(graph_dir: &Path, format: GraphFormat) -> Self {
        Self::new(graph_dir.join(format.file_name()), format)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> GraphFormat {
        self.format
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write `document`, replacing any previous graph at this location.
    ///
    /// The graph is written to a sibling staging file and renamed into
    /// place, so a failed save leaves the previous graph readable.
    pub fn save(&self, document: &GraphDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let staging = self.staging_path();
        let written = match self.format {
            GraphFormat::Json => json::save(&staging, document),
            GraphFormat::Sqlite => sqlite::save(&staging, document),
        };
        if let Err(e) = written {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }
        if self.format == GraphFormat::Sqlite {
            // A leftover journal of the old database must not be replayed
            // against the new one.
            for suffix in ["-wal", "-shm"] {
                let mut sidecar = self.path.clone().into_os_string();
                sidecar.push(suffix);
                let sidecar = PathBuf::from(sidecar);
                if sidecar.exists() {
                    std::fs::remove_file(&sidecar)?;
                }
            }
        }
        std::fs::rename(&staging, &self.path)?;
        info!(
            "Saved graph ({} components, {} files) to {}",
            document.components.len(),
            document.files.len(),
            self.path.display()
        );
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub fn load(&self) -> Result<GraphDocument> {
        if !self.exists() {
            return Err(StoreError::NotFound(self.path.clone()));
        }
        match self.format {
            GraphFormat::Json => json::load(&self.path),
            GraphFormat::Sqlite => sqlite::load(&self.path),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::model::{Component, ComponentId, ComponentKind, ExternalSymbolTable, File, Span};

    use super::GraphDocument;
    use crate::model::CodeGraph;

    /// Two files, a class with a method, one internal and one external link.
    pub fn sample_document() -> GraphDocument {
        let a = File::new(
            "a.py",
            "from b import bar\nclass C:\n    def run(self):\n        bar()\n",
            vec!["b.bar".into()],
            vec!["bar".into()],
            vec!["C".into()],
        );
        let b = File::new("b.py", "def bar():\n    print(1)\n", vec![], vec!["print".into()], vec!["bar".into()]);

        let mut externals = ExternalSymbolTable::new();
        let print = externals.get_or_mint("print");

        let bar = Component {
            id: ComponentId::from_content("b.bar", "def bar():\n    print(1)\n"),
            qualified_name: "b.bar".into(),
            code_text: "def bar():\n    print(1)\n".into(),
            kind: ComponentKind::Function,
            file_id: b.id.clone(),
            parent_id: None,
            spans: vec![Span::new(0, 24)],
            linked_component_ids: vec![],
            external_component_ids: vec![print],
            referenced_symbols: vec!["print".into()],
        };
        let class = Component {
            id: ComponentId::from_content("a.C", "class C:\n"),
            qualified_name: "a.C".into(),
            code_text: "class C:\n".into(),
            kind: ComponentKind::Class,
            file_id: a.id.clone(),
            parent_id: None,
            spans: vec![Span::new(18, 27)],
            linked_component_ids: vec![],
            external_component_ids: vec![],
            referenced_symbols: vec![],
        };
        let run = Component {
            id: ComponentId::from_content("a.C.run", "    def run(self):\n        bar()\n"),
            qualified_name: "a.C.run".into(),
            code_text: "    def run(self):\n        bar()\n".into(),
            kind: ComponentKind::Method,
            file_id: a.id.clone(),
            parent_id: Some(class.id.clone()),
            spans: vec![Span::new(27, 59)],
            linked_component_ids: vec![bar.id.clone()],
            external_component_ids: vec![],
            referenced_symbols: vec!["b.bar".into()],
        };

        GraphDocument::new(CodeGraph::new(vec![class, run, bar], vec![a, b], externals))
            .with_repository("sample")
            .with_commit_hash(Some("abc123".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::sample_document;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_from_path_and_str() {
        assert_eq!(GraphFormat::from_path(Path::new("g/graph.db")), GraphFormat::Sqlite);
        assert_eq!(GraphFormat::from_path(Path::new("graph.json")), GraphFormat::Json);
        assert_eq!("SQLite".parse::<GraphFormat>().unwrap(), GraphFormat::Sqlite);
        assert!("xml".parse::<GraphFormat>().is_err());
    }

    #[test]
    fn test_round_trip_both_formats() {
        let temp = tempfile::tempdir().unwrap();
        let document = sample_document();

        for format in [GraphFormat::Json, GraphFormat::Sqlite] {
            let store = GraphStore::in_directory(&temp.path().join("nested"), format);
            store.save(&document).unwrap();
            assert_eq!(store.load().unwrap(), document);
        }
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let store = GraphStore::from_path(temp.path().join("missing.json"));
        assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_save_overwrites_previous_graph() {
        let temp = tempfile::tempdir().unwrap();
        let store = GraphStore::in_directory(temp.path(), GraphFormat::Sqlite);

        store.save(&sample_document()).unwrap();
        let empty = GraphDocument::new(CodeGraph::default());
        store.save(&empty).unwrap();

        assert_eq!(store.load().unwrap(), empty);
    }

    #[test]
    fn test_save_leaves_no_staging_file() {
        let temp = tempfile::tempdir().unwrap();

        for format in [GraphFormat::Json, GraphFormat::Sqlite] {
            let store = GraphStore::in_directory(temp.path(), format);
            store.save(&sample_document()).unwrap();
            store.save(&sample_document()).unwrap();
            assert!(store.exists());
            assert!(!store.staging_path().exists());
        }
    }

    #[test]
    fn test_failed_save_keeps_previous_graph() {
        let temp = tempfile::tempdir().unwrap();
        let document = sample_document();

        for format in [GraphFormat::Json, GraphFormat::Sqlite] {
            let store = GraphStore::in_directory(temp.path(), format);
            store.save(&document).unwrap();

            // A directory in the staging slot makes the write fail.
            std::fs::create_dir(store.staging_path()).unwrap();
            let result = store.save(&GraphDocument::new(CodeGraph::default()));
            assert!(matches!(result, Err(StoreError::Io(_))), "{:?}", result);

            assert_eq!(store.load().unwrap(), document);
        }
    }
}
