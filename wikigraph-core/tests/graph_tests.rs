// Tests for depth computation, export and split

use tempfile::TempDir;
use wikigraph_core::graph::{
    GraphLink, GraphNode, GraphSnapshot, INNER_GRAPH_FILE, OUTER_GRAPH_FILE, categorize,
    compute_depths, export, read_snapshot, reduce, split_snapshot, write_split,
};
use wikigraph_core::model::NodeCategory;
use wikigraph_core::state::CrawlState;

fn state_with(edges: &[(&str, &str, u32)]) -> CrawlState {
    let mut state = CrawlState::new();
    for (a, b, depth) in edges {
        state.add_edge(a, b, None, Some(*depth));
    }
    state
}

fn node(id: &str, depth: u32, category: NodeCategory) -> GraphNode {
    GraphNode {
        id: id.to_string(),
        depth,
        category,
    }
}

fn graph_link(source: &str, target: &str, depth: u32) -> GraphLink {
    GraphLink {
        source: source.to_string(),
        target: target.to_string(),
        depth,
    }
}

// ============================================================================
// Depth Tests
// ============================================================================

#[test]
fn test_depths_are_shortest_paths() {
    let state = state_with(&[
        ("Root", "A", 0),
        ("A", "B", 1),
        ("B", "C", 2),
        ("Root", "C", 0),
    ]);

    let depths = compute_depths(state.edges(), "Root");
    assert_eq!(depths["Root"], 0);
    assert_eq!(depths["A"], 1);
    assert_eq!(depths["C"], 1);
    assert_eq!(depths["B"], 2);
}

#[test]
fn test_depths_independent_of_insertion_order() {
    let edges = [
        ("Root", "A", 0),
        ("A", "B", 1),
        ("B", "C", 2),
        ("C", "D", 3),
        ("Root", "D", 0),
        ("B", "E", 2),
    ];
    let forward = state_with(&edges);
    let mut reversed_edges = edges;
    reversed_edges.reverse();
    let reversed = state_with(&reversed_edges);

    assert_eq!(
        compute_depths(forward.edges(), "Root"),
        compute_depths(reversed.edges(), "Root")
    );
}

#[test]
fn test_depths_ignore_edge_direction() {
    // Edges stored pointing at the root still count
    let state = state_with(&[("A", "Root", 3), ("B", "A", 3)]);
    let depths = compute_depths(state.edges(), "Root");
    assert_eq!(depths["A"], 1);
    assert_eq!(depths["B"], 2);
}

#[test]
fn test_depths_unreachable_titles_are_absent() {
    let state = state_with(&[("Root", "A", 0), ("X", "Y", 1)]);
    let depths = compute_depths(state.edges(), "Root");
    assert_eq!(depths.len(), 2);
    assert!(!depths.contains_key("X"));
}

#[test]
fn test_depths_root_without_edges() {
    let depths = compute_depths(CrawlState::new().edges(), "Root");
    assert_eq!(depths.len(), 1);
    assert_eq!(depths["Root"], 0);
}

// ============================================================================
// Reduce Tests
// ============================================================================

#[test]
fn test_reduce_end_to_end_example() {
    let state = state_with(&[
        ("Architecture", "Building", 1),
        ("Building", "Concrete", 2),
        ("Concrete", "Chemistry", 3),
    ]);

    let snapshot = reduce(state.edges(), "Architecture", 2);

    assert_eq!(
        snapshot.nodes,
        vec![
            node("Architecture", 0, NodeCategory::Root),
            node("Building", 1, NodeCategory::Architecture),
            node("Concrete", 2, NodeCategory::Related),
        ]
    );
    assert_eq!(
        snapshot.links,
        vec![
            graph_link("Architecture", "Building", 1),
            graph_link("Building", "Concrete", 2),
        ]
    );
    assert!(snapshot.node("Chemistry").is_none());
    assert!(!snapshot.has_link("Concrete", "Chemistry"));
}

#[test]
fn test_reduce_link_depth_is_deeper_endpoint() {
    let state = state_with(&[("Root", "A", 0), ("Root", "B", 0), ("B", "A", 1)]);
    let snapshot = reduce(state.edges(), "Root", 2);

    let between = snapshot
        .links
        .iter()
        .find(|l| l.source == "B" && l.target == "A")
        .expect("link between siblings");
    assert_eq!(between.depth, 1);
}

#[test]
fn test_reduce_depth_zero_is_root_only() {
    let state = state_with(&[("Root", "A", 0)]);
    let snapshot = reduce(state.edges(), "Root", 0);
    assert_eq!(snapshot.nodes, vec![node("Root", 0, NodeCategory::Root)]);
    assert!(snapshot.links.is_empty());
}

#[test]
fn test_reduce_output_is_sorted() {
    let state = state_with(&[
        ("Root", "Zeta", 0),
        ("Root", "Alpha", 0),
        ("Alpha", "Beta", 1),
    ]);
    let snapshot = reduce(state.edges(), "Root", 2);

    let ids: Vec<_> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["Root", "Alpha", "Zeta", "Beta"]);
    let targets: Vec<_> = snapshot.links.iter().map(|l| l.target.as_str()).collect();
    assert_eq!(targets, vec!["Alpha", "Zeta", "Beta"]);
}

#[test]
fn test_categorize() {
    assert_eq!(categorize("Architecture", "Architecture"), NodeCategory::Root);
    assert_eq!(categorize("Gothic architecture", "Architecture"), NodeCategory::Architecture);
    assert_eq!(categorize("Paris", "Architecture"), NodeCategory::Related);
}

// ============================================================================
// Export Tests
// ============================================================================

#[test]
fn test_export_writes_graph_json() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("public").join("graph.json");
    let state = state_with(&[("Architecture", "Building", 1)]);

    let summary = export(state.edges(), "Architecture", 2, &path).expect("export");
    assert_eq!(summary.nodes, 2);
    assert_eq!(summary.links, 1);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["nodes"][0]["id"], "Architecture");
    assert_eq!(raw["nodes"][0]["category"], "root");
    assert_eq!(raw["links"][0]["depth"], 1);

    assert_eq!(read_snapshot(&path).expect("read"), reduce(state.edges(), "Architecture", 2));
}

#[test]
fn test_export_overwrites_previous_snapshot() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("graph.json");

    export(state_with(&[("Root", "A", 0), ("Root", "B", 0)]).edges(), "Root", 2, &path)
        .expect("first export");
    export(state_with(&[("Root", "A", 0)]).edges(), "Root", 2, &path).expect("second export");

    let snapshot = read_snapshot(&path).expect("read");
    assert_eq!(snapshot.nodes.len(), 2);
    assert!(snapshot.node("B").is_none());
}

// ============================================================================
// Split Tests
// ============================================================================

fn sample_snapshot() -> GraphSnapshot {
    GraphSnapshot {
        nodes: vec![
            node("Root", 0, NodeCategory::Root),
            node("A", 1, NodeCategory::Related),
            node("B", 1, NodeCategory::Related),
            node("C", 2, NodeCategory::Related),
        ],
        links: vec![
            graph_link("Root", "A", 1),
            graph_link("Root", "B", 1),
            graph_link("A", "B", 1),
            graph_link("B", "C", 2),
        ],
    }
}

#[test]
fn test_split_snapshot() {
    let (inner, outer) = split_snapshot(&sample_snapshot(), 2);

    let inner_ids: Vec<_> = inner.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(inner_ids, vec!["Root", "A", "B"]);
    assert_eq!(inner.links.len(), 3);

    let outer_ids: Vec<_> = outer.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(outer_ids, vec!["C", "Root", "A", "B"]);
    assert_eq!(outer.links, vec![graph_link("B", "C", 2)]);
}

#[test]
fn test_write_split() {
    let dir = TempDir::new().expect("temp dir");
    let (inner, outer) = split_snapshot(&sample_snapshot(), 1);

    let (inner_path, outer_path) = write_split(dir.path(), &inner, &outer).expect("write");
    assert_eq!(inner_path, dir.path().join(INNER_GRAPH_FILE));
    assert_eq!(outer_path, dir.path().join(OUTER_GRAPH_FILE));

    assert_eq!(read_snapshot(&inner_path).expect("inner"), inner);
    let outer_read = read_snapshot(&outer_path).expect("outer");
    assert_eq!(outer_read.nodes.len(), 4);
    assert_eq!(outer_read.links.len(), 4);
}
