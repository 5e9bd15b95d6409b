//! SQLite Graph Storage
//!
//! A graph is stored as one self-contained database:
//!
//! - `nodes`: one row per file, component and external symbol. Rows keep
//!   their insertion order (`seq`) so a loaded graph compares equal to the
//!   saved one.
//! - `edges`: `USES` edges from a component to an internal component or an
//!   external symbol, and `INSIDE` edges from a component to its file.
//! - `graph_metadata`: schema version, repository and commit hash.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GraphDocument, Result, StoreError};
use crate::model::{
    Component, ComponentId, ComponentKind, ExternalId, ExternalSymbolTable, File, FileId, Span,
};

/// SQL to create the nodes table
pub const SCHEMA_CREATE_NODES: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    -- Insertion order
    seq INTEGER NOT NULL,

    -- File id, component id or external symbol id
    id TEXT NOT NULL,

    -- file, component or external
    node_type TEXT NOT NULL,

    -- Relative path, qualified name or external symbol name
    name TEXT NOT NULL,

    -- Component kind (components only)
    kind TEXT,

    -- Owning file and enclosing component (components only)
    file_id TEXT,
    parent_id TEXT,

    -- Formatted file text or component code text
    text TEXT,

    -- Type-specific lists (JSON blob)
    metadata_json TEXT,

    PRIMARY KEY (node_type, id)
)
"#;

/// SQL to create the edges table
pub const SCHEMA_CREATE_EDGES: &str = r#"
CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    target TEXT NOT NULL,

    -- node_type of the target row
    target_type TEXT NOT NULL,

    -- USES or INSIDE
    edge_type TEXT NOT NULL
)
"#;

/// SQL to create indexes for efficient queries
pub const SCHEMA_CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_nodes_type_seq ON nodes(node_type, seq);
CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);
CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(file_id);
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);
CREATE INDEX IF NOT EXISTS idx_edges_type ON edges(edge_type);
"#;

/// SQL to create the metadata table
pub const SCHEMA_CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS graph_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

const NODE_FILE: &str = "file";
const NODE_COMPONENT: &str = "component";
const NODE_EXTERNAL: &str = "external";

/// Edge from a component to something it references.
pub const EDGE_USES: &str = "USES";
/// Edge from a component to the file that contains it.
pub const EDGE_INSIDE: &str = "INSIDE";

#[derive(Serialize, Deserialize)]
struct FileMetadata {
    imports: Vec<String>,
    called_symbols: Vec<String>,
    callable_symbols: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct ComponentMetadata {
    spans: Vec<Span>,
    referenced_symbols: Vec<String>,
}

/// Write `document` to a fresh database at `path`.
pub fn save(path: &Path, document: &GraphDocument) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let mut conn = Connection::open(path)?;
    configure_connection(&conn)?;
    create_schema(&conn)?;
    write_document(&mut conn, document)?;
    // Closing the last connection checkpoints the WAL into the main file.
    conn.close().map_err(|(_, e)| e)?;
    Ok(())
}

/// Read a graph document from the database at `path`.
pub fn load(path: &Path) -> Result<GraphDocument> {
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    read_document(&conn)
}

fn configure_connection(conn: &Connection) -> SqliteResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", -16000)?; // 16MB cache
    Ok(())
}

pub(crate) fn create_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute(SCHEMA_CREATE_NODES, [])?;
    conn.execute(SCHEMA_CREATE_EDGES, [])?;
    conn.execute(SCHEMA_CREATE_METADATA, [])?;
    conn.execute_batch(SCHEMA_CREATE_INDEXES)?;
    Ok(())
}

// =========================================================================
// Writing
// =========================================================================

pub(crate) fn write_document(conn: &mut Connection, document: &GraphDocument) -> Result<()> {
    let tx = conn.transaction()?;

    {
        let mut meta = tx.prepare(
            "INSERT OR REPLACE INTO graph_metadata (key, value) VALUES (?1, ?2)",
        )?;
        meta.execute(params!["schema_version", document.schema_version])?;
        if let Some(repository) = &document.repository {
            meta.execute(params!["repository", repository])?;
        }
        if let Some(commit) = &document.commit_hash {
            meta.execute(params!["commit_hash", commit])?;
        }

        let mut node = tx.prepare(
            r#"
            INSERT OR REPLACE INTO nodes
                (seq, id, node_type, name, kind, file_id, parent_id, text, metadata_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )?;
        let mut edge = tx.prepare(
            "INSERT INTO edges (source, target, target_type, edge_type) VALUES (?1, ?2, ?3, ?4)",
        )?;

        for (seq, file) in document.files.iter().enumerate() {
            let metadata = serde_json::to_string(&FileMetadata {
                imports: file.imports.clone(),
                called_symbols: file.called_symbols.clone(),
                callable_symbols: file.callable_symbols.clone(),
            })?;
            node.execute(params![
                seq as i64,
                file.id.as_str(),
                NODE_FILE,
                file.relative_path,
                Option::<&str>::None,
                Option::<&str>::None,
                Option::<&str>::None,
                file.formatted_text,
                metadata,
            ])?;
        }

        for (seq, (name, id)) in document.external_symbols.iter().enumerate() {
            node.execute(params![
                seq as i64,
                id.as_str(),
                NODE_EXTERNAL,
                name,
                Option::<&str>::None,
                Option::<&str>::None,
                Option::<&str>::None,
                Option::<&str>::None,
                Option::<&str>::None,
            ])?;
        }

        for (seq, component) in document.components.iter().enumerate() {
            let metadata = serde_json::to_string(&ComponentMetadata {
                spans: component.spans.clone(),
                referenced_symbols: component.referenced_symbols.clone(),
            })?;
            node.execute(params![
                seq as i64,
                component.id.as_str(),
                NODE_COMPONENT,
                component.qualified_name,
                component.kind.as_str(),
                component.file_id.as_str(),
                component.parent_id.as_ref().map(ComponentId::as_str),
                component.code_text,
                metadata,
            ])?;

            let source = component.id.as_str();
            edge.execute(params![source, component.file_id.as_str(), NODE_FILE, EDGE_INSIDE])?;
            for target in &component.linked_component_ids {
                edge.execute(params![source, target.as_str(), NODE_COMPONENT, EDGE_USES])?;
            }
            for target in &component.external_component_ids {
                edge.execute(params![source, target.as_str(), NODE_EXTERNAL, EDGE_USES])?;
            }
        }
    }

    tx.commit()?;
    debug!(
        "Wrote {} components, {} files, {} external symbols",
        document.components.len(),
        document.files.len(),
        document.external_symbols.len()
    );
    Ok(())
}

// =========================================================================
// Reading
// =========================================================================

fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM graph_metadata WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

struct NodeRow {
    id: String,
    name: String,
    kind: Option<String>,
    file_id: Option<String>,
    parent_id: Option<String>,
    text: Option<String>,
    metadata_json: Option<String>,
}

fn query_nodes(conn: &Connection, node_type: &str) -> Result<Vec<NodeRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, name, kind, file_id, parent_id, text, metadata_json
        FROM nodes WHERE node_type = ?1 ORDER BY seq
        "#,
    )?;
    let rows = stmt
        .query_map([node_type], |row| {
            Ok(NodeRow {
                id: row.get(0)?,
                name: row.get(1)?,
                kind: row.get(2)?,
                file_id: row.get(3)?,
                parent_id: row.get(4)?,
                text: row.get(5)?,
                metadata_json: row.get(6)?,
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn read_document(conn: &Connection) -> Result<GraphDocument> {
    let schema_version = get_metadata(conn, "schema_version")?
        .ok_or_else(|| StoreError::Corrupt("missing schema_version".to_string()))?;
    GraphDocument::check_version(&schema_version)?;

    let mut files = Vec::new();
    for row in query_nodes(conn, NODE_FILE)? {
        let metadata: FileMetadata = parse_metadata(&row)?;
        files.push(File {
            id: FileId::new(row.id),
            relative_path: row.name,
            imports: metadata.imports,
            called_symbols: metadata.called_symbols,
            callable_symbols: metadata.callable_symbols,
            formatted_text: row.text.unwrap_or_default(),
        });
    }

    let mut external_symbols = ExternalSymbolTable::new();
    for row in query_nodes(conn, NODE_EXTERNAL)? {
        external_symbols.insert(row.name, ExternalId::new(row.id));
    }

    let mut uses: HashMap<String, (Vec<ComponentId>, Vec<ExternalId>)> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT source, target, target_type FROM edges WHERE edge_type = ?1 ORDER BY id",
        )?;
        let edges = stmt
            .query_map([EDGE_USES], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        for (source, target, target_type) in edges {
            let entry = uses.entry(source).or_default();
            match target_type.as_str() {
                NODE_COMPONENT => entry.0.push(ComponentId::new(target)),
                NODE_EXTERNAL => entry.1.push(ExternalId::new(target)),
                other => {
                    return Err(StoreError::Corrupt(format!(
                        "USES edge to unexpected node type {}",
                        other
                    )))
                }
            }
        }
    }

    let mut components = Vec::new();
    for row in query_nodes(conn, NODE_COMPONENT)? {
        let metadata: ComponentMetadata = parse_metadata(&row)?;
        let kind = row
            .kind
            .as_deref()
            .and_then(ComponentKind::parse)
            .ok_or_else(|| StoreError::Corrupt(format!("component {} has no kind", row.id)))?;
        let file_id = row
            .file_id
            .ok_or_else(|| StoreError::Corrupt(format!("component {} has no file", row.id)))?;
        let (linked, external) = uses.remove(&row.id).unwrap_or_default();

        components.push(Component {
            id: ComponentId::new(row.id),
            qualified_name: row.name,
            code_text: row.text.unwrap_or_default(),
            kind,
            file_id: FileId::new(file_id),
            parent_id: row.parent_id.map(ComponentId::new),
            spans: metadata.spans,
            linked_component_ids: linked,
            external_component_ids: external,
            referenced_symbols: metadata.referenced_symbols,
        });
    }

    Ok(GraphDocument {
        schema_version,
        repository: get_metadata(conn, "repository")?,
        commit_hash: get_metadata(conn, "commit_hash")?,
        components,
        files,
        external_symbols,
    })
}

fn parse_metadata<T: for<'de> Deserialize<'de>>(row: &NodeRow) -> Result<T> {
    let json = row
        .metadata_json
        .as_deref()
        .ok_or_else(|| StoreError::Corrupt(format!("node {} has no metadata", row.id)))?;
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::sample_document;
    use pretty_assertions::assert_eq;

    fn in_memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_schema_creates_tables() {
        let conn = in_memory();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<SqliteResult<Vec<_>>>()
            .unwrap();

        assert!(tables.contains(&"nodes".to_string()));
        assert!(tables.contains(&"edges".to_string()));
        assert!(tables.contains(&"graph_metadata".to_string()));
    }

    #[test]
    fn test_edges_are_typed() {
        let mut conn = in_memory();
        write_document(&mut conn, &sample_document()).unwrap();

        let count = |edge_type: &str| -> i64 {
            conn.query_row(
                "SELECT COUNT(*) FROM edges WHERE edge_type = ?1",
                [edge_type],
                |row| row.get(0),
            )
            .unwrap()
        };
        // One INSIDE edge per component, run -> bar and bar -> print
        assert_eq!(count(EDGE_INSIDE), 3);
        assert_eq!(count(EDGE_USES), 2);
    }

    #[test]
    fn test_read_back_in_memory() {
        let mut conn = in_memory();
        let document = sample_document();
        write_document(&mut conn, &document).unwrap();
        assert_eq!(read_document(&conn).unwrap(), document);
    }

    #[test]
    fn test_missing_schema_version_is_corrupt() {
        let conn = in_memory();
        assert!(matches!(read_document(&conn), Err(StoreError::Corrupt(_))));
    }
}
