// Reduce the accumulated edge set to the depth-bounded graph artifact

use crate::error::Result;
use crate::model::{EdgeKey, EdgeRecord, NodeCategory, Title};
use crate::persist::{read_json, write_json_atomic};
use crate::title::is_topic_related;
use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

pub const GRAPH_FILE: &str = "graph.json";
pub const INNER_GRAPH_FILE: &str = "graph_inner.json";
pub const OUTER_GRAPH_FILE: &str = "graph_outer.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: Title,
    pub depth: u32,
    pub category: NodeCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: Title,
    pub target: Title,
    pub depth: u32,
}

/// Contents of `graph.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl GraphSnapshot {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Whether a link joins `a` and `b` in either direction.
    pub fn has_link(&self, a: &str, b: &str) -> bool {
        self.links
            .iter()
            .any(|l| (l.source == a && l.target == b) || (l.source == b && l.target == a))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub nodes: usize,
    pub links: usize,
    pub max_depth: u32,
}

/// Shortest undirected hop count from `root` to every reachable title.
/// The root is always present at depth 0.
pub fn compute_depths(edges: &BTreeMap<EdgeKey, EdgeRecord>, root: &str) -> HashMap<Title, u32> {
    let mut graph: UnGraphMap<&str, ()> = UnGraphMap::new();
    graph.add_node(root);
    for key in edges.keys() {
        graph.add_edge(key.a(), key.b(), ());
    }

    let mut depths: HashMap<&str, u32> = HashMap::from([(root, 0)]);
    let mut bfs = Bfs::new(&graph, root);
    while let Some(node) = bfs.next(&graph) {
        let Some(&depth) = depths.get(node) else {
            continue;
        };
        for neighbor in graph.neighbors(node) {
            depths.entry(neighbor).or_insert(depth + 1);
        }
    }

    depths
        .into_iter()
        .map(|(title, depth)| (title.to_string(), depth))
        .collect()
}

pub fn categorize(title: &str, root: &str) -> NodeCategory {
    if title == root {
        NodeCategory::Root
    } else if is_topic_related(title) {
        NodeCategory::Architecture
    } else {
        NodeCategory::Related
    }
}

/// Keep nodes within `max_depth` hops of `root` and the links between them.
pub fn reduce(edges: &BTreeMap<EdgeKey, EdgeRecord>, root: &str, max_depth: u32) -> GraphSnapshot {
    let depths = compute_depths(edges, root);

    let mut nodes: Vec<GraphNode> = depths
        .iter()
        .filter(|&(_, &depth)| depth <= max_depth)
        .map(|(id, &depth)| GraphNode {
            id: id.clone(),
            depth,
            category: categorize(id, root),
        })
        .collect();
    nodes.sort_by(|x, y| x.depth.cmp(&y.depth).then_with(|| x.id.cmp(&y.id)));

    let mut links: Vec<GraphLink> = edges
        .iter()
        .filter(|(key, _)| key.a() != key.b())
        .filter_map(|(key, record)| {
            let a = *depths.get(key.a())?;
            let b = *depths.get(key.b())?;
            (a <= max_depth && b <= max_depth).then(|| GraphLink {
                source: record.source.clone(),
                target: record.target.clone(),
                depth: a.max(b),
            })
        })
        .collect();
    links.sort_by(|x, y| {
        x.depth
            .cmp(&y.depth)
            .then_with(|| x.source.cmp(&y.source))
            .then_with(|| x.target.cmp(&y.target))
    });

    GraphSnapshot { nodes, links }
}

pub fn write_snapshot(path: &Path, snapshot: &GraphSnapshot) -> Result<()> {
    write_json_atomic(path, snapshot)
}

pub fn read_snapshot(path: &Path) -> Result<GraphSnapshot> {
    read_json(path)
}

/// Reduce `edges` and overwrite the snapshot at `path`.
pub fn export(
    edges: &BTreeMap<EdgeKey, EdgeRecord>,
    root: &str,
    max_depth: u32,
    path: &Path,
) -> Result<ExportSummary> {
    let snapshot = reduce(edges, root, max_depth);
    write_snapshot(path, &snapshot)?;

    info!(
        "Exported {} nodes and {} links (max depth {}) to {}",
        snapshot.nodes.len(),
        snapshot.links.len(),
        max_depth,
        path.display()
    );

    Ok(ExportSummary {
        path: path.to_path_buf(),
        nodes: snapshot.nodes.len(),
        links: snapshot.links.len(),
        max_depth,
    })
}

/// Split a snapshot at a depth boundary.
///
/// The inner graph holds nodes shallower than `boundary` and the links among
/// them. The outer graph holds the deeper nodes, repeats the inner nodes so
/// its links can attach, and keeps every link touching a deeper node.
pub fn split_snapshot(snapshot: &GraphSnapshot, boundary: u32) -> (GraphSnapshot, GraphSnapshot) {
    let (inner_nodes, outer_nodes): (Vec<GraphNode>, Vec<GraphNode>) = snapshot
        .nodes
        .iter()
        .cloned()
        .partition(|node| node.depth < boundary);

    let inner_ids: HashSet<&str> = inner_nodes.iter().map(|n| n.id.as_str()).collect();
    let outer_ids: HashSet<&str> = outer_nodes.iter().map(|n| n.id.as_str()).collect();

    let mut inner_links = Vec::new();
    let mut outer_links = Vec::new();
    for link in &snapshot.links {
        let (source, target) = (link.source.as_str(), link.target.as_str());
        if inner_ids.contains(source) && inner_ids.contains(target) {
            inner_links.push(link.clone());
        } else if outer_ids.contains(source) || outer_ids.contains(target) {
            outer_links.push(link.clone());
        }
    }

    let outer = GraphSnapshot {
        nodes: outer_nodes.into_iter().chain(inner_nodes.iter().cloned()).collect(),
        links: outer_links,
    };
    let inner = GraphSnapshot {
        nodes: inner_nodes,
        links: inner_links,
    };
    (inner, outer)
}

/// Write the split halves next to each other in `dir`.
pub fn write_split(
    dir: &Path,
    inner: &GraphSnapshot,
    outer: &GraphSnapshot,
) -> Result<(PathBuf, PathBuf)> {
    let inner_path = dir.join(INNER_GRAPH_FILE);
    let outer_path = dir.join(OUTER_GRAPH_FILE);
    write_snapshot(&inner_path, inner)?;
    write_snapshot(&outer_path, outer)?;
    Ok((inner_path, outer_path))
}
