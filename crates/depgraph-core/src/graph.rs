//! Dependency Graph Query View
//!
//! [`CodeGraph`] is the persisted, list-based form of a repository graph.
//! This module provides [`PetDependencyGraph`], a petgraph-backed view of the
//! same data for traversal queries, plus [`validate`], which checks the
//! structural properties every built or updated graph must satisfy.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::model::{CodeGraph, ComponentId, ComponentKind, ExternalId, FileId, Span};

// ============================================================================
// Edge and Node Types
// ============================================================================

/// Types of relationships in the query view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Component references another component or an external symbol
    Uses,
    /// Component lies inside a file or an enclosing component
    Inside,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Uses => "USES",
            EdgeType::Inside => "INSIDE",
        }
    }
}

/// Typed node key; ids of different node types never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    File(FileId),
    Component(ComponentId),
    External(ExternalId),
}

/// Node weight of the query view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphNode {
    File {
        id: FileId,
        path: String,
    },
    Component {
        id: ComponentId,
        name: String,
        kind: ComponentKind,
    },
    External {
        id: ExternalId,
        name: String,
    },
}

impl GraphNode {
    pub fn key(&self) -> NodeKey {
        match self {
            GraphNode::File { id, .. } => NodeKey::File(id.clone()),
            GraphNode::Component { id, .. } => NodeKey::Component(id.clone()),
            GraphNode::External { id, .. } => NodeKey::External(id.clone()),
        }
    }

    /// Path, qualified name or external symbol name.
    pub fn name(&self) -> &str {
        match self {
            GraphNode::File { path, .. } => path,
            GraphNode::Component { name, .. } => name,
            GraphNode::External { name, .. } => name,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, GraphNode::External { .. })
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphNode::File { path, .. } => write!(f, "file {}", path),
            GraphNode::Component { name, kind, .. } => write!(f, "{} {}", kind.as_str(), name),
            GraphNode::External { name, .. } => write!(f, "external {}", name),
        }
    }
}

/// Summary counts of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub files: usize,
    pub components: usize,
    pub external_symbols: usize,
    pub internal_edges: usize,
    pub external_edges: usize,
    pub components_by_kind: BTreeMap<String, usize>,
}

// ============================================================================
// Query View
// ============================================================================

/// A petgraph-based view of a [`CodeGraph`] for traversal queries.
///
/// Built once from a code graph; it does not track later changes.
#[derive(Debug, Clone, Default)]
pub struct PetDependencyGraph {
    graph: StableGraph<GraphNode, EdgeType, petgraph::Directed>,
    index: HashMap<NodeKey, NodeIndex>,
}

impl PetDependencyGraph {
    pub fn from_code_graph(code_graph: &CodeGraph) -> Self {
        let mut view = Self::default();

        for file in &code_graph.files {
            view.add_node(GraphNode::File {
                id: file.id.clone(),
                path: file.relative_path.clone(),
            });
        }
        for (name, id) in code_graph.external_symbols.iter() {
            view.add_node(GraphNode::External {
                id: id.clone(),
                name: name.to_string(),
            });
        }
        for component in &code_graph.components {
            view.add_node(GraphNode::Component {
                id: component.id.clone(),
                name: component.qualified_name.clone(),
                kind: component.kind,
            });
        }

        for component in &code_graph.components {
            let source = NodeKey::Component(component.id.clone());
            view.add_edge(&source, &NodeKey::File(component.file_id.clone()), EdgeType::Inside);
            if let Some(parent) = &component.parent_id {
                view.add_edge(&source, &NodeKey::Component(parent.clone()), EdgeType::Inside);
            }
            for target in &component.linked_component_ids {
                view.add_edge(&source, &NodeKey::Component(target.clone()), EdgeType::Uses);
            }
            for target in &component.external_component_ids {
                view.add_edge(&source, &NodeKey::External(target.clone()), EdgeType::Uses);
            }
        }

        view
    }

    fn add_node(&mut self, node: GraphNode) {
        let key = node.key();
        if self.index.contains_key(&key) {
            return;
        }
        let idx = self.graph.add_node(node);
        self.index.insert(key, idx);
    }

    /// Edges to unknown nodes are skipped.
    fn add_edge(&mut self, source: &NodeKey, target: &NodeKey, edge_type: EdgeType) {
        if let (Some(&s), Some(&t)) = (self.index.get(source), self.index.get(target)) {
            self.graph.add_edge(s, t, edge_type);
        }
    }

    pub fn node(&self, key: &NodeKey) -> Option<&GraphNode> {
        self.index
            .get(key)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn neighbors(
        &self,
        id: &ComponentId,
        direction: Direction,
        edge_type: EdgeType,
    ) -> Vec<&GraphNode> {
        let Some(&idx) = self.index.get(&NodeKey::Component(id.clone())) else {
            return Vec::new();
        };
        let mut nodes: Vec<&GraphNode> = self
            .graph
            .edges_directed(idx, direction)
            .filter(|edge| *edge.weight() == edge_type)
            .filter_map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                self.graph.node_weight(other)
            })
            .collect();
        nodes.sort_by(|a, b| a.name().cmp(b.name()));
        nodes
    }

    /// Components and external symbols used by `id`, sorted by name.
    pub fn dependencies(&self, id: &ComponentId) -> Vec<&GraphNode> {
        self.neighbors(id, Direction::Outgoing, EdgeType::Uses)
    }

    /// Components that use `id`, sorted by name.
    pub fn dependents(&self, id: &ComponentId) -> Vec<&GraphNode> {
        self.neighbors(id, Direction::Incoming, EdgeType::Uses)
    }

    /// Components whose qualified name equals `name` or ends with `.name`.
    pub fn find_by_name(&self, name: &str) -> Vec<&GraphNode> {
        let suffix = format!(".{}", name);
        let mut found: Vec<&GraphNode> = self
            .graph
            .node_weights()
            .filter(|node| match node {
                GraphNode::Component { name: qn, .. } => qn == name || qn.ends_with(&suffix),
                _ => false,
            })
            .collect();
        found.sort_by(|a, b| a.name().cmp(b.name()));
        found
    }

    /// Components reachable from `id` over `USES` edges, excluding `id`.
    pub fn transitive_dependencies(&self, id: &ComponentId) -> Vec<&GraphNode> {
        let Some(&start) = self.index.get(&NodeKey::Component(id.clone())) else {
            return Vec::new();
        };
        let mut seen = HashSet::from([start]);
        let mut stack = vec![start];
        let mut reached = Vec::new();
        while let Some(idx) = stack.pop() {
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                if *edge.weight() != EdgeType::Uses || !seen.insert(edge.target()) {
                    continue;
                }
                if let Some(node) = self.graph.node_weight(edge.target()) {
                    reached.push(node);
                    stack.push(edge.target());
                }
            }
        }
        reached.sort_by(|a, b| a.name().cmp(b.name()));
        reached
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();
        for node in self.graph.node_weights() {
            match node {
                GraphNode::File { .. } => stats.files += 1,
                GraphNode::External { .. } => stats.external_symbols += 1,
                GraphNode::Component { kind, .. } => {
                    stats.components += 1;
                    *stats
                        .components_by_kind
                        .entry(kind.as_str().to_string())
                        .or_default() += 1;
                }
            }
        }
        for edge in self.graph.edge_references() {
            if *edge.weight() != EdgeType::Uses {
                continue;
            }
            match self.graph.node_weight(edge.target()) {
                Some(GraphNode::External { .. }) => stats.external_edges += 1,
                Some(_) => stats.internal_edges += 1,
                None => {}
            }
        }
        stats
    }

    /// Get a reference to the underlying petgraph
    pub fn inner(&self) -> &StableGraph<GraphNode, EdgeType, petgraph::Directed> {
        &self.graph
    }
}

// ============================================================================
// Validation
// ============================================================================

/// A violated structural property of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Internal link to a component that is not in the graph
    DanglingLink {
        component: String,
        target: ComponentId,
    },
    /// Internal link whose target name is not referenced by the source
    UnreferencedLink { component: String, target: String },
    /// External link to an id missing from the external symbol table
    UnknownExternal {
        component: String,
        external: ExternalId,
    },
    /// One external id mapped to several names
    DuplicateExternalId { id: ExternalId, names: Vec<String> },
    /// Component owned by a file that is not in the graph
    UnknownFile { component: String, file: FileId },
    /// Bytes of a file not owned by any component
    CoverageGap { file: String, start: usize, end: usize },
    /// Bytes of a file owned by more than one component
    CoverageOverlap { file: String, start: usize, end: usize },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DanglingLink { component, target } => {
                write!(f, "{} links to missing component {}", component, target)
            }
            ValidationIssue::UnreferencedLink { component, target } => {
                write!(f, "{} links to {} without referencing it", component, target)
            }
            ValidationIssue::UnknownExternal {
                component,
                external,
            } => write!(f, "{} uses unknown external id {}", component, external),
            ValidationIssue::DuplicateExternalId { id, names } => {
                write!(f, "external id {} is shared by {}", id, names.join(", "))
            }
            ValidationIssue::UnknownFile { component, file } => {
                write!(f, "{} belongs to missing file {}", component, file)
            }
            ValidationIssue::CoverageGap { file, start, end } => {
                write!(f, "{}: bytes {}..{} not covered", file, start, end)
            }
            ValidationIssue::CoverageOverlap { file, start, end } => {
                write!(f, "{}: bytes {}..{} covered twice", file, start, end)
            }
        }
    }
}

/// Check link soundness, external dedup and byte coverage of `graph`.
pub fn validate(graph: &CodeGraph) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let components: HashMap<&ComponentId, &str> = graph
        .components
        .iter()
        .map(|c| (&c.id, c.qualified_name.as_str()))
        .collect();

    let mut names_by_external: BTreeMap<&ExternalId, Vec<String>> = BTreeMap::new();
    for (name, id) in graph.external_symbols.iter() {
        names_by_external.entry(id).or_default().push(name.to_string());
    }
    for (id, names) in &names_by_external {
        if names.len() > 1 {
            issues.push(ValidationIssue::DuplicateExternalId {
                id: (*id).clone(),
                names: names.clone(),
            });
        }
    }

    let file_ids: HashSet<&FileId> = graph.files.iter().map(|f| &f.id).collect();

    for component in &graph.components {
        let name = &component.qualified_name;
        if !file_ids.contains(&component.file_id) {
            issues.push(ValidationIssue::UnknownFile {
                component: name.clone(),
                file: component.file_id.clone(),
            });
        }
        for target in &component.linked_component_ids {
            match components.get(target) {
                None => issues.push(ValidationIssue::DanglingLink {
                    component: name.clone(),
                    target: target.clone(),
                }),
                Some(target_name) => {
                    if !component.referenced_symbols.iter().any(|s| s == target_name) {
                        issues.push(ValidationIssue::UnreferencedLink {
                            component: name.clone(),
                            target: target_name.to_string(),
                        });
                    }
                }
            }
        }
        for external in &component.external_component_ids {
            if !names_by_external.contains_key(external) {
                issues.push(ValidationIssue::UnknownExternal {
                    component: name.clone(),
                    external: external.clone(),
                });
            }
        }
    }

    for file in &graph.files {
        let mut spans: Vec<Span> = graph
            .components_in_file(&file.id)
            .flat_map(|c| c.spans.iter().copied())
            .filter(|s| !s.is_empty())
            .collect();
        spans.sort();

        let mut cursor = 0;
        for span in spans {
            if span.start > cursor {
                issues.push(ValidationIssue::CoverageGap {
                    file: file.relative_path.clone(),
                    start: cursor,
                    end: span.start,
                });
            } else if span.start < cursor {
                issues.push(ValidationIssue::CoverageOverlap {
                    file: file.relative_path.clone(),
                    start: span.start,
                    end: cursor.min(span.end),
                });
            }
            cursor = cursor.max(span.end);
        }
        let len = file.formatted_text.len();
        if cursor < len {
            issues.push(ValidationIssue::CoverageGap {
                file: file.relative_path.clone(),
                start: cursor,
                end: len,
            });
        }
    }

    issues
}
