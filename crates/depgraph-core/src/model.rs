//! Dependency Graph Data Model
//!
//! Components, files and the external symbol table that make up a repository
//! dependency graph, plus the content-addressed identifiers that tie them together.
//!
//! ## Identity
//!
//! Component ids are SHA-256 digests over the qualified name and the code text,
//! so two components with identical name and code always receive the same id.
//! File ids use the same digest over the relative path and the formatted text.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Schema version written into persisted graph documents.
pub const GRAPH_SCHEMA_VERSION: &str = "1.0";

/// Compute the hex-encoded SHA-256 digest of `name`, a NUL separator and `text`.
pub fn content_hash(name: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a component.
///
/// Final ids are content-addressed; provisional ids (random UUIDs) only exist
/// while a build pass is assembling component code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a random provisional id.
    pub fn provisional() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Content-addressed id for a component.
    pub fn from_content(qualified_name: &str, code_text: &str) -> Self {
        Self(content_hash(qualified_name, code_text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a source file (content-addressed over path and text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Content-addressed id for a file.
    pub fn from_content(relative_path: &str, formatted_text: &str) -> Self {
        Self(content_hash(relative_path, formatted_text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of an external (unresolved) symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh external id.
    pub fn mint() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Component
// ============================================================================

/// Kinds of extracted components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Function,
    Method,
    /// Classes, structs, interfaces, enums and other type definitions
    Class,
    Field,
    Variable,
    /// The part of a file not captured by any other component
    Residual,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Function => "function",
            ComponentKind::Method => "method",
            ComponentKind::Class => "class",
            ComponentKind::Field => "field",
            ComponentKind::Variable => "variable",
            ComponentKind::Residual => "residual",
        }
    }

    /// Whether a component of this kind can appear as a call target.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            ComponentKind::Function | ComponentKind::Method | ComponentKind::Class
        )
    }

    /// Parse from the lowercase name used in persisted graphs.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(ComponentKind::Function),
            "method" => Some(ComponentKind::Method),
            "class" => Some(ComponentKind::Class),
            "field" => Some(ComponentKind::Field),
            "variable" => Some(ComponentKind::Variable),
            "residual" => Some(ComponentKind::Residual),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open byte range `[start, end)` into a file's formatted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subtract a set of sorted, non-overlapping holes from this span.
    pub fn subtract(&self, holes: &[Span]) -> Vec<Span> {
        let mut segments = Vec::new();
        let mut cursor = self.start;
        for hole in holes {
            let start = hole.start.max(self.start);
            let end = hole.end.min(self.end);
            if start >= end {
                continue;
            }
            if start > cursor {
                segments.push(Span::new(cursor, start));
            }
            cursor = cursor.max(end);
        }
        if cursor < self.end {
            segments.push(Span::new(cursor, self.end));
        }
        segments
    }
}

/// An addressable unit of code: function, method, class, field, variable or
/// the residual remainder of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub qualified_name: String,
    pub code_text: String,
    pub kind: ComponentKind,
    pub file_id: FileId,
    /// Enclosing component (class or struct), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ComponentId>,
    /// Byte ranges of the file text owned by this component
    #[serde(default)]
    pub spans: Vec<Span>,
    /// Resolved edges to components of this repository
    #[serde(default)]
    pub linked_component_ids: Vec<ComponentId>,
    /// Edges into the external symbol table
    #[serde(default)]
    pub external_component_ids: Vec<ExternalId>,
    /// Symbol names referenced by this component's code
    #[serde(default)]
    pub referenced_symbols: Vec<String>,
}

impl Component {
    pub fn is_residual(&self) -> bool {
        self.kind == ComponentKind::Residual
    }

    /// Check whether this component links to `id`.
    pub fn links_to(&self, id: &ComponentId) -> bool {
        self.linked_component_ids.contains(id)
    }

    /// Last segment of the qualified name.
    pub fn short_name(&self) -> &str {
        self.qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.qualified_name)
    }
}

// ============================================================================
// File
// ============================================================================

/// One analyzed source file. Owns components through `Component::file_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub relative_path: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub called_symbols: Vec<String>,
    #[serde(default)]
    pub callable_symbols: Vec<String>,
    pub formatted_text: String,
}

impl File {
    /// Create a file record, deriving its content-addressed id.
    pub fn new(
        relative_path: impl Into<String>,
        formatted_text: impl Into<String>,
        imports: Vec<String>,
        called_symbols: Vec<String>,
        callable_symbols: Vec<String>,
    ) -> Self {
        let relative_path = relative_path.into();
        let formatted_text = formatted_text.into();
        Self {
            id: FileId::from_content(&relative_path, &formatted_text),
            relative_path,
            imports,
            called_symbols,
            callable_symbols,
            formatted_text,
        }
    }
}

// ============================================================================
// External Symbol Table
// ============================================================================

/// Append-only mapping from unresolved symbol names to opaque ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalSymbolTable {
    symbols: BTreeMap<String, ExternalId>,
}

impl ExternalSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the id previously assigned to `name`.
    pub fn get(&self, name: &str) -> Option<&ExternalId> {
        self.symbols.get(name)
    }

    /// Return the id for `name`, minting one if the name is new.
    pub fn get_or_mint(&mut self, name: &str) -> ExternalId {
        if let Some(id) = self.symbols.get(name) {
            return id.clone();
        }
        let id = ExternalId::mint();
        self.symbols.insert(name.to_string(), id.clone());
        id
    }

    /// Insert a known mapping. Existing names keep their id.
    pub fn insert(&mut self, name: impl Into<String>, id: ExternalId) -> &ExternalId {
        self.symbols.entry(name.into()).or_insert(id)
    }

    /// Reverse lookup: name of an external id.
    pub fn name_of(&self, id: &ExternalId) -> Option<&str> {
        self.symbols
            .iter()
            .find(|(_, v)| *v == id)
            .map(|(k, _)| k.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExternalId)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge another table in; names already present keep their id.
    pub fn extend_from(&mut self, other: &ExternalSymbolTable) {
        for (name, id) in other.iter() {
            self.insert(name, id.clone());
        }
    }
}

// ============================================================================
// Code Graph
// ============================================================================

/// The full dependency graph of one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeGraph {
    pub components: Vec<Component>,
    pub files: Vec<File>,
    pub external_symbols: ExternalSymbolTable,
}

impl CodeGraph {
    pub fn new(
        components: Vec<Component>,
        files: Vec<File>,
        external_symbols: ExternalSymbolTable,
    ) -> Self {
        Self {
            components,
            files,
            external_symbols,
        }
    }

    pub fn component(&self, id: &ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| &c.id == id)
    }

    /// Find a component by qualified name (last definition wins).
    pub fn component_by_name(&self, qualified_name: &str) -> Option<&Component> {
        self.components
            .iter()
            .rev()
            .find(|c| c.qualified_name == qualified_name)
    }

    pub fn file(&self, id: &FileId) -> Option<&File> {
        self.files.iter().find(|f| &f.id == id)
    }

    pub fn file_by_path(&self, relative_path: &str) -> Option<&File> {
        self.files.iter().find(|f| f.relative_path == relative_path)
    }

    pub fn components_in_file<'a>(
        &'a self,
        file_id: &'a FileId,
    ) -> impl Iterator<Item = &'a Component> + 'a {
        self.components.iter().filter(move |c| &c.file_id == file_id)
    }

    /// Map of qualified name to component id over all components.
    pub fn name_table(&self) -> HashMap<String, ComponentId> {
        self.components
            .iter()
            .map(|c| (c.qualified_name.clone(), c.id.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_is_stable() {
        let a = ComponentId::from_content("pkg.mod.foo", "def foo():\n    pass\n");
        let b = ComponentId::from_content("pkg.mod.foo", "def foo():\n    pass\n");
        let c = ComponentId::from_content("pkg.mod.foo", "def foo():\n    return 1\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_content_hash_separates_name_and_text() {
        assert_ne!(content_hash("ab", "c"), content_hash("a", "bc"));
    }

    #[test]
    fn test_provisional_ids_are_unique() {
        assert_ne!(ComponentId::provisional(), ComponentId::provisional());
    }

    #[test]
    fn test_span_subtract() {
        let span = Span::new(0, 20);
        let holes = [Span::new(2, 5), Span::new(10, 20)];
        assert_eq!(
            span.subtract(&holes),
            vec![Span::new(0, 2), Span::new(5, 10)]
        );
        assert_eq!(span.subtract(&[]), vec![Span::new(0, 20)]);
        assert!(Span::new(3, 3).subtract(&[]).is_empty());
    }

    #[test]
    fn test_external_table_reuses_ids() {
        let mut table = ExternalSymbolTable::new();
        let first = table.get_or_mint("print");
        let second = table.get_or_mint("print");
        let other = table.get_or_mint("len");
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(table.len(), 2);
        assert_eq!(table.name_of(&first), Some("print"));
    }

    #[test]
    fn test_external_table_extend_keeps_existing() {
        let mut base = ExternalSymbolTable::new();
        let print_id = base.get_or_mint("print");

        let mut other = ExternalSymbolTable::new();
        other.insert("print", ExternalId::new("different"));
        other.insert("open", ExternalId::new("open-id"));

        base.extend_from(&other);
        assert_eq!(base.get("print"), Some(&print_id));
        assert_eq!(base.get("open"), Some(&ExternalId::new("open-id")));
    }

    #[test]
    fn test_file_id_tracks_content() {
        let a = File::new("a.py", "x = 1\n", vec![], vec![], vec![]);
        let b = File::new("a.py", "x = 2\n", vec![], vec![], vec![]);
        assert_ne!(a.id, b.id);
        assert_eq!(a.id, FileId::from_content("a.py", "x = 1\n"));
    }

    #[test]
    fn test_component_kind_roundtrip_names() {
        for kind in [
            ComponentKind::Function,
            ComponentKind::Method,
            ComponentKind::Class,
            ComponentKind::Field,
            ComponentKind::Variable,
            ComponentKind::Residual,
        ] {
            assert_eq!(ComponentKind::parse(kind.as_str()), Some(kind));
        }
        assert!(ComponentKind::Class.is_callable());
        assert!(!ComponentKind::Field.is_callable());
    }
}
