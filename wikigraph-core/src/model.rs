use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use wikigraph_scanner::LinkContext;

/// Canonical page identifier (see `title::normalize`).
pub type Title = String;

/// Unordered pair of titles, stored with `a <= b` so one relation has
/// exactly one key whichever direction it was crawled in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    a: Title,
    b: Title,
}

impl EdgeKey {
    pub fn new(x: impl Into<Title>, y: impl Into<Title>) -> Self {
        let (x, y) = (x.into(), y.into());
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    pub fn a(&self) -> &str {
        &self.a
    }

    pub fn b(&self) -> &str {
        &self.b
    }

    pub fn contains(&self, title: &str) -> bool {
        self.a == title || self.b == title
    }
}

/// On disk a key is the JSON array `["a","b"]`.
impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_json::to_string(&[&self.a, &self.b]).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl FromStr for EdgeKey {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<String> =
            serde_json::from_str(s).map_err(|_| GraphError::MalformedEdgeKey(s.to_string()))?;
        match <[String; 2]>::try_from(parts) {
            Ok([x, y]) if !x.trim().is_empty() && !y.trim().is_empty() => Ok(EdgeKey::new(x, y)),
            _ => Err(GraphError::MalformedEdgeKey(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Direction as first observed.
    pub source: Title,
    pub target: Title,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<LinkContext>,
    /// Crawl depth of the page the edge was first seen on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

impl EdgeRecord {
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.source.clone(), self.target.clone())
    }
}

/// A `(title, depth)` pair waiting for expansion. Serialized as a two
/// element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(Title, u32)", into = "(Title, u32)")]
pub struct FrontierEntry {
    pub title: Title,
    pub depth: u32,
}

impl FrontierEntry {
    pub fn new(title: impl Into<Title>, depth: u32) -> Self {
        Self {
            title: title.into(),
            depth,
        }
    }
}

impl From<(Title, u32)> for FrontierEntry {
    fn from((title, depth): (Title, u32)) -> Self {
        Self { title, depth }
    }
}

impl From<FrontierEntry> for (Title, u32) {
    fn from(entry: FrontierEntry) -> Self {
        (entry.title, entry.depth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    Root,
    Architecture,
    Related,
}

impl NodeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeCategory::Root => "root",
            NodeCategory::Architecture => "architecture",
            NodeCategory::Related => "related",
        }
    }
}
