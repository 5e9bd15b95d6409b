//! Builds the checked-in polyglot fixture and checks cross-file links in
//! every supported language.

mod common;

use common::*;
use depgraph_core::{CodeGraph, ComponentKind, GraphBuilder, PetDependencyGraph};
use pretty_assertions::assert_eq;

fn fixture_graph() -> CodeGraph {
    GraphBuilder::new()
        .build_from_directory(&polyglot_fixture())
        .expect("build polyglot fixture")
        .graph
}

#[test]
fn test_fixture_graph_is_consistent() {
    let graph = fixture_graph();

    let mut paths: Vec<&str> = graph.files.iter().map(|f| f.relative_path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(
        paths,
        vec![
            "app/models.py",
            "app/utils.py",
            "native/Worker.cs",
            "native/engine.cpp",
            "native/math.c",
            "pkg/util/helpers.go",
            "pkg/util/server.go",
            "src/cache.rs",
            "src/store.rs",
            "web/service.js",
            "web/shapes.ts",
            "web/util.js",
        ]
    );
    assert_valid(&graph);
}

#[test]
fn test_python_links() {
    let graph = fixture_graph();
    assert_links(&graph, "app.models.User.greet", "app.utils.format_name");
    assert_eq!(
        component(&graph, "app.models.User.kind").kind,
        ComponentKind::Field
    );
    assert_eq!(
        component(&graph, "app.models.User.greet").parent_id,
        Some(id_of(&graph, "app.models.User"))
    );
}

#[test]
fn test_rust_links() {
    let graph = fixture_graph();
    assert_links(&graph, "cache.Cache.new", "cache.Cache.empty");
    assert_links(&graph, "cache.Cache.empty", "store.save");
}

#[test]
fn test_go_package_scope() {
    let graph = fixture_graph();
    assert_links(&graph, "pkg.util.Server.Start", "pkg.util.helper");
    assert_external(&graph, "pkg.util.Server.Start", "fmt.Println");
    assert_eq!(
        component(&graph, "pkg.util.Server.Start").kind,
        ComponentKind::Method
    );
}

#[test]
fn test_javascript_and_typescript() {
    let graph = fixture_graph();
    assert_links(&graph, "web.service.Service.run", "web.util.helper");
    assert_links(&graph, "web.service.Service.run", "web.service.Service.stop");
    assert!(graph.component_by_name("web.shapes.total").is_some());
}

#[test]
fn test_c_family() {
    let graph = fixture_graph();
    assert_external(&graph, "native.math.add", "printf");
    assert_eq!(
        component(&graph, "native.engine.app.Engine.run").kind,
        ComponentKind::Method
    );
    assert_links(
        &graph,
        "native.Worker.App.Worker.Run",
        "native.Worker.App.Worker.Helper",
    );
    assert_external(&graph, "native.Worker.App.Worker.Run", "Console.WriteLine");
}

#[test]
fn test_query_view() {
    let graph = fixture_graph();
    let view = PetDependencyGraph::from_code_graph(&graph);

    let stats = view.stats();
    assert_eq!(stats.files, graph.files.len());
    assert_eq!(stats.components, graph.components.len());
    assert_eq!(stats.external_symbols, graph.external_symbols.len());
    assert_eq!(stats.components_by_kind.get("residual"), Some(&12));

    let reached: Vec<&str> = view
        .transitive_dependencies(&id_of(&graph, "cache.Cache.new"))
        .into_iter()
        .map(|node| node.name())
        .collect();
    assert!(reached.contains(&"cache.Cache.empty"));
    assert!(reached.contains(&"store.save"));

    let callers: Vec<&str> = view
        .dependents(&id_of(&graph, "pkg.util.helper"))
        .into_iter()
        .map(|node| node.name())
        .collect();
    assert_eq!(callers, vec!["pkg.util.Server.Start"]);
}
