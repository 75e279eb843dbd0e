// Tests for the crawl state and its on-disk store

use std::fs;
use tempfile::TempDir;
use wikigraph_core::model::{EdgeKey, FrontierEntry};
use wikigraph_core::state::{
    CrawlState, DiscoveredLink, EDGES_FILE, PROGRESS_FILE, PageCommit, StateStore,
};
use wikigraph_scanner::LinkContext;

fn context(section: &str) -> Option<LinkContext> {
    Some(LinkContext {
        section: Some(section.to_string()),
        sentence: None,
    })
}

fn link(title: &str, expand: bool) -> DiscoveredLink {
    DiscoveredLink {
        title: title.to_string(),
        context: None,
        expand,
    }
}

// ============================================================================
// Edge Tests
// ============================================================================

#[test]
fn test_add_edge_is_idempotent() {
    let mut state = CrawlState::new();
    assert!(state.add_edge("Arch", "Vault", None, Some(1)));
    assert!(!state.add_edge("Arch", "Vault", None, Some(1)));
    assert!(!state.add_edge("Vault", "Arch", None, Some(2)));
    assert_eq!(state.edge_count(), 1);
}

#[test]
fn test_add_edge_canonical_order() {
    let mut state = CrawlState::new();
    state.add_edge("Vault", "Arch", None, Some(0));

    let (key, record) = state.edges().iter().next().expect("one edge");
    assert_eq!(key, &EdgeKey::new("Arch", "Vault"));
    assert_eq!(key.a(), "Arch");
    assert_eq!(key.b(), "Vault");
    // Direction as first observed
    assert_eq!(record.source, "Vault");
    assert_eq!(record.target, "Arch");
}

#[test]
fn test_add_edge_keeps_first_depth_and_replaces_context() {
    let mut state = CrawlState::new();
    state.add_edge("Arch", "Dome", context("History"), Some(0));
    state.add_edge("Dome", "Arch", None, Some(1));

    let record = state.edge("Arch", "Dome").expect("edge");
    assert_eq!(record.depth, Some(0));
    assert_eq!(record.context, context("History"));

    state.add_edge("Dome", "Arch", context("Types"), Some(1));
    let record = state.edge("Arch", "Dome").expect("edge");
    assert_eq!(record.context, context("Types"));
    assert_eq!(record.source, "Arch");
    assert_eq!(record.depth, Some(0));
}

#[test]
fn test_add_edge_rejects_empty_title() {
    let mut state = CrawlState::new();
    assert!(!state.add_edge("", "Arch", None, None));
    assert!(!state.add_edge("Arch", "  ", None, None));
    assert_eq!(state.edge_count(), 0);
}

#[test]
fn test_node_count_counts_distinct_endpoints() {
    let mut state = CrawlState::new();
    state.add_edge("A", "B", None, None);
    state.add_edge("B", "C", None, None);
    state.add_edge("C", "A", None, None);
    assert_eq!(state.node_count(), 3);
}

// ============================================================================
// Frontier Tests
// ============================================================================

#[test]
fn test_enqueue_deduplicates_and_keeps_first_depth() {
    let mut state = CrawlState::new();
    assert!(state.enqueue("Arch", 1));
    assert!(!state.enqueue("Arch", 2));
    assert_eq!(state.frontier_len(), 1);
    assert_eq!(state.frontier().next(), Some(&FrontierEntry::new("Arch", 1)));
}

#[test]
fn test_enqueue_skips_visited_and_in_flight() {
    let mut state = CrawlState::seeded("Architecture");
    let batch = state.pop_batch(10);
    assert_eq!(batch, vec![FrontierEntry::new("Architecture", 0)]);

    // Popped but not yet committed
    assert!(state.is_claimed("Architecture"));
    assert!(!state.enqueue("Architecture", 1));

    state.mark_visited("Architecture");
    assert!(!state.is_claimed("Architecture"));
    assert!(!state.enqueue("Architecture", 1));
    assert_eq!(state.frontier_len(), 0);
}

#[test]
fn test_pop_batch_is_fifo() {
    let mut state = CrawlState::new();
    for (i, title) in ["A", "B", "C", "D"].iter().enumerate() {
        state.enqueue(title, i as u32);
    }

    let first: Vec<_> = state.pop_batch(3).into_iter().map(|e| e.title).collect();
    assert_eq!(first, vec!["A", "B", "C"]);
    let rest: Vec<_> = state.pop_batch(3).into_iter().map(|e| e.title).collect();
    assert_eq!(rest, vec!["D"]);
    assert!(state.pop_batch(3).is_empty());
}

#[test]
fn test_drop_in_flight_allows_requeue() {
    let mut state = CrawlState::seeded("Arch");
    state.pop_batch(1);
    state.drop_in_flight("Arch");
    assert!(!state.is_visited("Arch"));
    assert!(state.enqueue("Arch", 0));
}

#[test]
fn test_seed_root_only_when_needed() {
    let mut state = CrawlState::new();
    assert!(state.seed_root("Architecture"));
    assert!(!state.seed_root("Architecture"));

    state.pop_batch(1);
    state.mark_visited("Architecture");
    assert!(!state.seed_root("Architecture"));
}

// ============================================================================
// Commit Tests
// ============================================================================

#[test]
fn test_commit_page_adds_edges_enqueues_and_marks_visited() {
    let mut state = CrawlState::seeded("Architecture");
    state.pop_batch(1);

    let summary = state.commit_page(PageCommit {
        title: "Architecture".to_string(),
        depth: 0,
        links: vec![link("Gothic architecture", true), link("Le Corbusier", false)],
    });

    assert_eq!(summary.new_edges, 2);
    assert_eq!(summary.enqueued, 1);
    assert!(state.is_visited("Architecture"));
    assert_eq!(
        state.frontier().cloned().collect::<Vec<_>>(),
        vec![FrontierEntry::new("Gothic architecture", 1)]
    );
    assert_eq!(state.edge("Le Corbusier", "Architecture").and_then(|e| e.depth), Some(0));
}

#[test]
fn test_record_failure_and_retry() {
    let mut state = CrawlState::seeded("Arch");
    let entry = state.pop_batch(1).remove(0);
    state.record_failure(entry.clone());
    state.record_failure(entry.clone());

    assert_eq!(state.failed(), &[entry.clone()]);
    assert!(!state.is_visited("Arch"));
    assert!(!state.is_claimed("Arch"));

    assert_eq!(state.retry_failed(), 1);
    assert!(state.failed().is_empty());
    assert_eq!(state.frontier().next(), Some(&entry));
}

#[test]
fn test_mark_visited_clears_earlier_failure() {
    let mut state = CrawlState::seeded("Arch");
    let entry = state.pop_batch(1).remove(0);
    state.record_failure(entry.clone());
    assert_eq!(state.failed().len(), 1);

    // A later success in the same run
    assert!(state.enqueue("Arch", entry.depth));
    state.pop_batch(1);
    state.mark_visited("Arch");

    assert!(state.failed().is_empty());
    assert!(state.is_visited("Arch"));
    assert_eq!(state.retry_failed(), 0);
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[test]
fn test_save_load_round_trip() {
    let dir = TempDir::new().expect("temp dir");
    let store = StateStore::new(dir.path());

    let mut state = CrawlState::seeded("Architecture");
    state.pop_batch(1);
    state.commit_page(PageCommit {
        title: "Architecture".to_string(),
        depth: 0,
        links: vec![
            DiscoveredLink {
                title: "Vault".to_string(),
                context: Some(LinkContext {
                    section: Some("Elements".to_string()),
                    sentence: Some("A vault is an arched ceiling.".to_string()),
                }),
                expand: true,
            },
            link("Dome", true),
        ],
    });

    store.save(&state).expect("save");
    assert!(store.exists());

    let loaded = store.try_load().expect("load");
    assert_eq!(loaded, state);
}

#[test]
fn test_save_writes_documented_layout() {
    let dir = TempDir::new().expect("temp dir");
    let store = StateStore::new(dir.path());

    let mut state = CrawlState::new();
    state.add_edge("Vault", "Arch", None, Some(1));
    state.enqueue("Dome", 2);
    state.mark_visited("Arch");
    store.save(&state).expect("save");

    let edges: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(EDGES_FILE)).unwrap()).unwrap();
    let record = &edges[r#"["Arch","Vault"]"#];
    assert_eq!(record["source"], "Vault");
    assert_eq!(record["target"], "Arch");
    assert_eq!(record["depth"], 1);
    assert!(record.get("context").is_none());

    let progress: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(PROGRESS_FILE)).unwrap())
            .unwrap();
    assert_eq!(progress["to_visit"], serde_json::json!([["Dome", 2]]));
    assert_eq!(progress["visited"], serde_json::json!(["Arch"]));
}

#[test]
fn test_save_leaves_no_temp_files() {
    let dir = TempDir::new().expect("temp dir");
    let store = StateStore::new(dir.path().join("nested"));
    store.save(&CrawlState::seeded("Arch")).expect("save");

    let mut names: Vec<_> = fs::read_dir(dir.path().join("nested"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec![EDGES_FILE, PROGRESS_FILE]);
}

#[test]
fn test_load_missing_files_seeds_root() {
    let dir = TempDir::new().expect("temp dir");
    let store = StateStore::new(dir.path());

    assert!(!store.exists());
    let state = store.load("Architecture");
    assert_eq!(state, CrawlState::seeded("Architecture"));
}

#[test]
fn test_load_corrupt_progress_starts_fresh() {
    let dir = TempDir::new().expect("temp dir");
    let store = StateStore::new(dir.path());
    fs::write(dir.path().join(PROGRESS_FILE), "{ not json").unwrap();

    assert!(store.try_load().is_err());
    let state = store.load("Architecture");
    assert_eq!(state.edge_count(), 0);
    assert_eq!(state.frontier().cloned().collect::<Vec<_>>(), vec![
        FrontierEntry::new("Architecture", 0)
    ]);
}

#[test]
fn test_load_skips_malformed_edge_entries() {
    let dir = TempDir::new().expect("temp dir");
    let store = StateStore::new(dir.path());
    fs::write(
        dir.path().join(EDGES_FILE),
        r#"{
            "[\"Arch\",\"Vault\"]": {"source": "Arch", "target": "Vault"},
            "not a key": {"source": "X", "target": "Y"},
            "[\"A\",\"B\"]": {"source": 5},
            "[\"\",\"B\"]": {"source": "", "target": "B"}
        }"#,
    )
    .unwrap();

    let state = store.try_load().expect("load");
    assert_eq!(state.edge_count(), 1);
    assert!(state.edge("Vault", "Arch").is_some());
}

#[test]
fn test_load_rekeys_mismatched_record() {
    let dir = TempDir::new().expect("temp dir");
    let store = StateStore::new(dir.path());
    fs::write(
        dir.path().join(EDGES_FILE),
        r#"{"[\"Vault\",\"Arch\"]": {"source": "Dome", "target": "Arch"}}"#,
    )
    .unwrap();

    let state = store.try_load().expect("load");
    assert!(state.edge("Arch", "Dome").is_some());
    assert!(state.edge("Arch", "Vault").is_none());
}

#[test]
fn test_load_requeues_failed_pages() {
    let dir = TempDir::new().expect("temp dir");
    let store = StateStore::new(dir.path());

    let mut state = CrawlState::seeded("Architecture");
    state.pop_batch(1);
    state.mark_visited("Architecture");
    state.enqueue("Dome", 1);
    state.enqueue("Vault", 1);
    let failed = state.pop_batch(1).remove(0);
    state.record_failure(failed);
    store.save(&state).expect("save");

    let loaded = store.load("Architecture");
    assert!(loaded.failed().is_empty());
    let frontier: Vec<_> = loaded.frontier().map(|e| e.title.clone()).collect();
    assert_eq!(frontier, vec!["Vault", "Dome"]);
}

#[test]
fn test_load_accepts_progress_without_failed_list() {
    let dir = TempDir::new().expect("temp dir");
    let store = StateStore::new(dir.path());
    fs::write(
        dir.path().join(PROGRESS_FILE),
        r#"{"to_visit": [["Dome", 1], ["Arch", 1]], "visited": ["Arch"]}"#,
    )
    .unwrap();

    let state = store.try_load().expect("load");
    assert!(state.is_visited("Arch"));
    // Stale frontier entries for visited titles are dropped
    assert_eq!(state.frontier().cloned().collect::<Vec<_>>(), vec![
        FrontierEntry::new("Dome", 1)
    ]);
}

#[test]
fn test_resume_does_not_duplicate_edges() {
    let dir = TempDir::new().expect("temp dir");
    let store = StateStore::new(dir.path());

    let mut state = CrawlState::new();
    state.add_edge("Arch", "Vault", None, Some(0));
    store.save(&state).expect("save");

    let mut resumed = store.try_load().expect("load");
    assert!(!resumed.add_edge("Vault", "Arch", None, Some(0)));
    assert_eq!(resumed.edge_count(), 1);
}
