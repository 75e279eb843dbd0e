// Crawl state: frontier, visited set and accumulated edges, plus the
// on-disk snapshot store that makes them survive restarts.

use crate::error::{GraphError, Result};
use crate::model::{EdgeKey, EdgeRecord, FrontierEntry, Title};
use crate::persist::{read_optional, write_json_atomic};
use crate::title::validate_title;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use wikigraph_scanner::LinkContext;

pub const EDGES_FILE: &str = "edges.json";
pub const PROGRESS_FILE: &str = "progress.json";

/// A link discovered on a page, already normalized and filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    pub title: Title,
    pub context: Option<LinkContext>,
    /// Enqueue the title for expansion at `depth + 1`.
    pub expand: bool,
}

/// Everything learned from one fetched page. Applied in one step by
/// `CrawlState::commit_page`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCommit {
    pub title: Title,
    pub depth: u32,
    pub links: Vec<DiscoveredLink>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub new_edges: usize,
    pub enqueued: usize,
}

/// In-memory crawl state. Owned by a single writer (the crawl driver).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlState {
    edges: BTreeMap<EdgeKey, EdgeRecord>,
    frontier: VecDeque<FrontierEntry>,
    /// Titles queued in the frontier or popped and still in flight.
    claimed: HashSet<Title>,
    visited: BTreeSet<Title>,
    failed: Vec<FrontierEntry>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty state with `(root, 0)` queued.
    pub fn seeded(root: &str) -> Self {
        let mut state = Self::new();
        state.enqueue(root, 0);
        state
    }

    /// Queue the root if there is nothing left to do and it has never been
    /// expanded. Returns whether the root was queued.
    pub fn seed_root(&mut self, root: &str) -> bool {
        if !self.frontier.is_empty() {
            return false;
        }
        self.enqueue(root, 0)
    }

    /// Insert the unordered edge `a`-`b`. Returns `true` if it is new.
    ///
    /// Re-adding an existing pair keeps the first observed direction and
    /// depth; a supplied context replaces the stored one.
    pub fn add_edge(
        &mut self,
        a: &str,
        b: &str,
        context: Option<LinkContext>,
        depth: Option<u32>,
    ) -> bool {
        if let Err(e) = validate_title(a).and_then(|_| validate_title(b)) {
            warn!("Attempted to add edge {:?} -> {:?}: {}", a, b, e);
            return false;
        }

        match self.edges.entry(EdgeKey::new(a, b)) {
            Entry::Occupied(mut existing) => {
                if context.is_some() {
                    existing.get_mut().context = context;
                }
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(EdgeRecord {
                    source: a.to_string(),
                    target: b.to_string(),
                    context,
                    depth,
                });
                true
            }
        }
    }

    /// Append to the frontier tail unless the title was already expanded or
    /// is already queued. The first enqueued depth wins.
    pub fn enqueue(&mut self, title: &str, depth: u32) -> bool {
        if let Err(e) = validate_title(title) {
            warn!("Attempted to enqueue {:?}: {}", title, e);
            return false;
        }
        if self.visited.contains(title) || self.claimed.contains(title) {
            return false;
        }

        self.claimed.insert(title.to_string());
        self.frontier.push_back(FrontierEntry::new(title, depth));
        true
    }

    /// Only call once every edge of the page is committed.
    pub fn mark_visited(&mut self, title: &str) {
        self.claimed.remove(title);
        self.failed.retain(|entry| entry.title != title);
        self.visited.insert(title.to_string());
    }

    /// Take up to `n` entries from the frontier head. They stay claimed
    /// until marked visited, recorded as failed or dropped.
    pub fn pop_batch(&mut self, n: usize) -> Vec<FrontierEntry> {
        let take = n.min(self.frontier.len());
        self.frontier.drain(..take).collect()
    }

    /// Drop the claim on a popped entry without expanding it.
    pub fn drop_in_flight(&mut self, title: &str) {
        self.claimed.remove(title);
    }

    /// Remember a page whose fetch failed so a later run retries it.
    pub fn record_failure(&mut self, entry: FrontierEntry) {
        self.claimed.remove(&entry.title);
        if !self.failed.iter().any(|f| f.title == entry.title) {
            self.failed.push(entry);
        }
    }

    /// Move failed entries back to the frontier tail.
    pub fn retry_failed(&mut self) -> usize {
        let failed = std::mem::take(&mut self.failed);
        failed
            .into_iter()
            .filter(|entry| self.enqueue(&entry.title, entry.depth))
            .count()
    }

    /// Commit a page's edges and expansions, then mark it visited.
    pub fn commit_page(&mut self, commit: PageCommit) -> CommitSummary {
        let mut summary = CommitSummary::default();
        let next_depth = commit.depth + 1;

        for link in commit.links {
            if self.add_edge(&commit.title, &link.title, link.context, Some(commit.depth)) {
                summary.new_edges += 1;
            }
            if link.expand && self.enqueue(&link.title, next_depth) {
                summary.enqueued += 1;
            }
        }

        self.mark_visited(&commit.title);
        summary
    }

    pub fn is_visited(&self, title: &str) -> bool {
        self.visited.contains(title)
    }

    pub fn is_claimed(&self, title: &str) -> bool {
        self.claimed.contains(title)
    }

    pub fn edge(&self, a: &str, b: &str) -> Option<&EdgeRecord> {
        self.edges.get(&EdgeKey::new(a, b))
    }

    pub fn edges(&self) -> &BTreeMap<EdgeKey, EdgeRecord> {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Distinct titles appearing in any edge.
    pub fn node_count(&self) -> usize {
        self.edges
            .keys()
            .flat_map(|key| [key.a(), key.b()])
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn frontier(&self) -> impl Iterator<Item = &FrontierEntry> {
        self.frontier.iter()
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn visited(&self) -> impl Iterator<Item = &Title> {
        self.visited.iter()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn failed(&self) -> &[FrontierEntry] {
        &self.failed
    }

    /// Keep an already-stored record for the same pair.
    fn insert_record(&mut self, key: EdgeKey, record: EdgeRecord) {
        self.edges.entry(key).or_insert(record);
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressSnapshot {
    to_visit: Vec<FrontierEntry>,
    visited: Vec<Title>,
    #[serde(default)]
    failed: Vec<FrontierEntry>,
}

/// Snapshot files for a crawl, kept in one data directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    data_dir: PathBuf,
}

impl StateStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn edges_path(&self) -> PathBuf {
        self.data_dir.join(EDGES_FILE)
    }

    pub fn progress_path(&self) -> PathBuf {
        self.data_dir.join(PROGRESS_FILE)
    }

    pub fn exists(&self) -> bool {
        self.edges_path().exists() || self.progress_path().exists()
    }

    /// Load the persisted state, falling back to a fresh one on any error.
    ///
    /// Failed pages from the previous run are re-queued, and the root is
    /// seeded when the frontier is empty and the root was never expanded.
    pub fn load(&self, root: &str) -> CrawlState {
        let mut state = match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                warn!("Could not load crawl state ({}), starting fresh", e);
                CrawlState::new()
            }
        };

        let retried = state.retry_failed();
        if retried > 0 {
            info!("Re-queued {} previously failed pages", retried);
        }
        if state.seed_root(root) {
            debug!("Seeded frontier with root {}", root);
        }

        info!(
            "Loaded crawl state: {} edges, {} visited, {} queued",
            state.edge_count(),
            state.visited_count(),
            state.frontier_len()
        );
        state
    }

    /// Load the persisted state exactly as stored. Malformed individual edge
    /// entries are skipped; a malformed file is an error.
    pub fn try_load(&self) -> Result<CrawlState> {
        let mut state = CrawlState::new();

        let edges_path = self.edges_path();
        if let Some(raw) = read_optional(&edges_path)? {
            let entries: BTreeMap<String, serde_json::Value> =
                serde_json::from_str(&raw).map_err(|e| GraphError::MalformedSnapshot {
                    path: edges_path.clone(),
                    reason: e.to_string(),
                })?;

            for (encoded, value) in entries {
                let key: EdgeKey = match encoded.parse() {
                    Ok(key) => key,
                    Err(e) => {
                        warn!("Skipping invalid edge data: {}", e);
                        continue;
                    }
                };
                let record: EdgeRecord = match serde_json::from_value(value) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("Skipping invalid edge data for {}: {}", key, e);
                        continue;
                    }
                };
                if validate_title(&record.source).is_err() || validate_title(&record.target).is_err() {
                    warn!("Skipping edge {} with an empty endpoint", key);
                    continue;
                }

                let record_key = record.key();
                if record_key != key {
                    warn!("Edge key {} does not match its record, using {}", key, record_key);
                }
                state.insert_record(record_key, record);
            }
        }

        let progress_path = self.progress_path();
        if let Some(raw) = read_optional(&progress_path)? {
            let progress: ProgressSnapshot =
                serde_json::from_str(&raw).map_err(|e| GraphError::MalformedSnapshot {
                    path: progress_path.clone(),
                    reason: e.to_string(),
                })?;

            // Visited first so stale frontier entries are rejected by enqueue
            for title in progress.visited {
                if validate_title(&title).is_ok() {
                    state.visited.insert(title);
                }
            }
            for entry in progress.to_visit {
                state.enqueue(&entry.title, entry.depth);
            }
            for entry in progress.failed {
                if validate_title(&entry.title).is_ok()
                    && !state.visited.contains(&entry.title)
                    && !state.claimed.contains(&entry.title)
                {
                    state.record_failure(entry);
                }
            }
        }

        Ok(state)
    }

    /// Persist both snapshots atomically. Edges are written first: if the
    /// process dies in between, the older progress file only causes pages
    /// to be fetched again, and re-adding their edges is idempotent.
    pub fn save(&self, state: &CrawlState) -> Result<()> {
        let edges: BTreeMap<String, &EdgeRecord> = state
            .edges
            .iter()
            .map(|(key, record)| (key.to_string(), record))
            .collect();
        write_json_atomic(&self.edges_path(), &edges)?;

        let progress = ProgressSnapshot {
            to_visit: state.frontier.iter().cloned().collect(),
            visited: state.visited.iter().cloned().collect(),
            failed: state.failed.clone(),
        };
        write_json_atomic(&self.progress_path(), &progress)?;

        debug!(
            "Saved crawl state to {}: {} edges, {} queued, {} visited",
            self.data_dir.display(),
            state.edge_count(),
            state.frontier_len(),
            state.visited_count()
        );
        Ok(())
    }
}
