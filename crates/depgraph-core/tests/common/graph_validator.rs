//! Graph assertions shared by the integration tests.

use depgraph_core::{validate, CodeGraph, Component, ComponentId};

/// Panic with every structural issue found in `graph`.
pub fn assert_valid(graph: &CodeGraph) {
    let issues = validate(graph);
    if !issues.is_empty() {
        let report: Vec<String> = issues.iter().map(ToString::to_string).collect();
        panic!("graph has {} issues:\n  {}", issues.len(), report.join("\n  "));
    }
}

pub fn component<'a>(graph: &'a CodeGraph, qualified_name: &str) -> &'a Component {
    graph
        .component_by_name(qualified_name)
        .unwrap_or_else(|| panic!("no component named {}", qualified_name))
}

pub fn id_of(graph: &CodeGraph, qualified_name: &str) -> ComponentId {
    component(graph, qualified_name).id.clone()
}

/// `from` links to the internal component `to`.
pub fn assert_links(graph: &CodeGraph, from: &str, to: &str) {
    let target = id_of(graph, to);
    assert!(
        component(graph, from).links_to(&target),
        "{} should link to {}",
        from,
        to
    );
}

/// `from` references the external symbol `name`.
pub fn assert_external(graph: &CodeGraph, from: &str, name: &str) {
    let id = graph
        .external_symbols
        .get(name)
        .unwrap_or_else(|| panic!("no external symbol named {}", name));
    assert!(
        component(graph, from).external_component_ids.contains(id),
        "{} should reference external {}",
        from,
        name
    );
}

pub fn names(graph: &CodeGraph) -> Vec<&str> {
    let mut names: Vec<&str> = graph
        .components
        .iter()
        .map(|c| c.qualified_name.as_str())
        .collect();
    names.sort_unstable();
    names
}
