use crate::error::Result;
use crate::graph::{self, ExportSummary};
use crate::model::{FrontierEntry, Title};
use crate::state::{CrawlState, DiscoveredLink, PageCommit, StateStore};
use crate::title::{TitlePolicy, is_topic_related, is_valid_link};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use wikigraph_scanner::{FetchError, LinkSource, PageLink};

/// Where and how deep to export once the crawl stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub path: PathBuf,
    pub max_depth: u32,
}

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub root_title: Title,
    pub max_depth: u32,
    pub batch_size: usize,
    pub concurrency: usize,
    pub export: Option<ExportOptions>,
    pub show_progress_bars: bool,
    pub title_policy: TitlePolicy,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            root_title: "Architecture".to_string(),
            max_depth: 2,
            batch_size: 50,
            concurrency: 20,
            export: None,
            show_progress_bars: false,
            title_policy: TitlePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    /// Shutdown requested; the current batch finishes, no new batch starts.
    Draining,
    Stopped,
}

/// Cloneable flag that asks a running crawl to stop after its current batch.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStats {
    pub batches: usize,
    pub pages_processed: usize,
    pub links_found: usize,
    pub edges_added: usize,
    pub enqueued: usize,
    pub failures: usize,
    pub disambiguations: usize,
    pub leaves_dropped: usize,
    pub elapsed: Duration,
}

impl CrawlStats {
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.pages_processed as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub stats: CrawlStats,
    /// Stopped by the shutdown handle with pages still queued.
    pub cancelled: bool,
    pub edges: usize,
    pub visited: usize,
    pub pending: usize,
    pub export: Option<ExportSummary>,
}

/// Callback for reporting crawl progress after each batch
pub type CrawlProgressCallback = Arc<dyn Fn(&CrawlStats) + Send + Sync>;

enum PageFetch {
    Disambiguation,
    Links(Vec<PageLink>),
}

/// Batched breadth-first crawl over a `LinkSource`. The driver is the only
/// writer of its `CrawlState`; fetches run concurrently but their results
/// are applied one page at a time in batch order.
pub struct CrawlDriver<S: LinkSource> {
    source: S,
    store: StateStore,
    state: CrawlState,
    options: CrawlOptions,
    stats: CrawlStats,
    driver_state: DriverState,
    shutdown: ShutdownHandle,
    progress_callback: Option<CrawlProgressCallback>,
}

impl<S: LinkSource> CrawlDriver<S> {
    /// Create a driver resuming from whatever `store` holds. The root title
    /// is normalized with the configured policy.
    pub fn new(source: S, store: StateStore, mut options: CrawlOptions) -> Self {
        options.root_title = options.title_policy.normalize(&options.root_title);
        let state = store.load(&options.root_title);
        Self {
            source,
            store,
            state,
            options,
            stats: CrawlStats::default(),
            driver_state: DriverState::Idle,
            shutdown: ShutdownHandle::new(),
            progress_callback: None,
        }
    }

    /// Replace the loaded state.
    pub fn with_state(mut self, state: CrawlState) -> Self {
        self.state = state;
        self
    }

    pub fn with_shutdown_handle(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = handle;
        self
    }

    pub fn with_progress_callback(mut self, callback: CrawlProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn into_state(self) -> CrawlState {
        self.state
    }

    pub fn driver_state(&self) -> DriverState {
        self.driver_state
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Crawl until the frontier is empty or shutdown is requested.
    ///
    /// Per-page fetch failures are recorded and the crawl carries on. Any
    /// persistence error ends the run.
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        let root = self.options.root_title.clone();
        if self.state.seed_root(&root) {
            debug!("Seeded frontier with root {}", root);
        }

        info!(
            "Starting crawl from {} (max depth {}, batch size {}, concurrency {})",
            root, self.options.max_depth, self.options.batch_size, self.options.concurrency
        );

        let progress_bar = self.options.show_progress_bars.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message("Starting crawl...");
            pb
        });

        self.driver_state = DriverState::Running;
        let started = Instant::now();
        let mut cancelled = false;

        while self.state.frontier_len() > 0 {
            if self.shutdown.is_triggered() {
                cancelled = true;
                self.driver_state = DriverState::Draining;
                info!(
                    "Shutdown requested, stopping with {} pages still queued",
                    self.state.frontier_len()
                );
                break;
            }

            let batch = self.state.pop_batch(self.options.batch_size.max(1));
            self.process_batch(batch).await;
            self.stats.batches += 1;
            self.stats.elapsed = started.elapsed();

            self.store.save(&self.state)?;

            info!(
                "Progress: {} pages processed, {} links found, {:.2} pages/second",
                self.stats.pages_processed,
                self.stats.links_found,
                self.stats.pages_per_second()
            );
            if let Some(ref pb) = progress_bar {
                pb.set_message(format!(
                    "Crawling... {} pages processed, {} queued",
                    self.stats.pages_processed,
                    self.state.frontier_len()
                ));
                pb.tick();
            }
            if let Some(ref callback) = self.progress_callback {
                callback(&self.stats);
            }
        }

        self.stats.elapsed = started.elapsed();
        self.store.save(&self.state)?;

        if let Some(ref pb) = progress_bar {
            pb.finish_with_message(format!(
                "Crawl {}! {} pages processed",
                if cancelled { "stopped" } else { "complete" },
                self.stats.pages_processed
            ));
        }

        let export = match self.options.export {
            Some(ref export) => Some(graph::export(
                self.state.edges(),
                &root,
                export.max_depth,
                &export.path,
            )?),
            None => None,
        };

        self.driver_state = DriverState::Stopped;
        info!(
            "Crawl finished: {} pages processed, {} edges added, {} failures",
            self.stats.pages_processed, self.stats.edges_added, self.stats.failures
        );

        Ok(CrawlSummary {
            stats: self.stats.clone(),
            cancelled,
            edges: self.state.edge_count(),
            visited: self.state.visited_count(),
            pending: self.state.frontier_len(),
            export,
        })
    }

    async fn process_batch(&mut self, batch: Vec<FrontierEntry>) {
        let mut to_fetch = Vec::with_capacity(batch.len());
        for entry in batch {
            if self.state.is_visited(&entry.title) {
                self.state.drop_in_flight(&entry.title);
            } else if entry.depth >= self.options.max_depth {
                // Leaf: its edges already came from the page that linked it
                self.state.drop_in_flight(&entry.title);
                self.stats.leaves_dropped += 1;
            } else {
                to_fetch.push(entry);
            }
        }

        let source = &self.source;
        let results: Vec<(FrontierEntry, std::result::Result<PageFetch, FetchError>)> =
            stream::iter(to_fetch)
                .map(|entry| async move {
                    let fetched = fetch_page(source, &entry.title).await;
                    (entry, fetched)
                })
                .buffered(self.options.concurrency.max(1))
                .collect()
                .await;

        for (entry, fetched) in results {
            self.apply_page(entry, fetched);
        }
    }

    fn apply_page(
        &mut self,
        entry: FrontierEntry,
        fetched: std::result::Result<PageFetch, FetchError>,
    ) {
        if self.state.is_visited(&entry.title) {
            self.state.drop_in_flight(&entry.title);
            return;
        }

        match fetched {
            Err(e) => {
                warn!("Error processing {}: {}", entry.title, e);
                self.stats.failures += 1;
                self.state.record_failure(entry);
            }
            Ok(PageFetch::Disambiguation) => {
                debug!("Skipping disambiguation page {}", entry.title);
                self.stats.disambiguations += 1;
                self.stats.pages_processed += 1;
                self.state.mark_visited(&entry.title);
            }
            Ok(PageFetch::Links(links)) => {
                let discovered = self.discover(&entry, links);
                self.stats.links_found += discovered.len();

                let summary = self.state.commit_page(PageCommit {
                    title: entry.title,
                    depth: entry.depth,
                    links: discovered,
                });
                self.stats.edges_added += summary.new_edges;
                self.stats.enqueued += summary.enqueued;
                self.stats.pages_processed += 1;
            }
        }
    }

    /// Normalize and filter the raw links of one page.
    fn discover(&self, entry: &FrontierEntry, links: Vec<PageLink>) -> Vec<DiscoveredLink> {
        let can_expand = entry.depth < self.options.max_depth;
        let mut seen = HashSet::new();

        links
            .into_iter()
            .filter_map(|link| {
                let title = self.options.title_policy.normalize(&link.title);
                if !is_valid_link(&title) || title == entry.title || !seen.insert(title.clone()) {
                    return None;
                }
                let expand = can_expand && is_topic_related(&title);
                Some(DiscoveredLink {
                    title,
                    context: link.context,
                    expand,
                })
            })
            .collect()
    }
}

async fn fetch_page<S: LinkSource>(
    source: &S,
    title: &str,
) -> std::result::Result<PageFetch, FetchError> {
    let metadata = source.get_page_metadata(title).await?;
    if metadata.is_disambiguation {
        return Ok(PageFetch::Disambiguation);
    }
    if metadata.missing {
        debug!("Page {} does not exist", title);
        return Ok(PageFetch::Links(Vec::new()));
    }
    Ok(PageFetch::Links(source.get_page_links(title).await?))
}
