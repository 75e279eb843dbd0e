// Progress report over the persisted crawl state

use crate::state::CrawlState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Observed average latency of one page fetch.
pub const SECONDS_PER_REQUEST: f64 = 1.1;

/// Concurrency levels the time estimates are given for.
pub const ESTIMATE_CONCURRENCY: [usize; 3] = [20, 50, 100];

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => f.write_str("text"),
            ReportFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEstimate {
    pub concurrency: usize,
    pub seconds: f64,
}

/// Estimates for one slice of the pending queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateGroup {
    /// `None` for the whole queue.
    pub depth: Option<u32>,
    pub pages: usize,
    pub estimates: Vec<TimeEstimate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub edges: usize,
    pub nodes: usize,
    pub visited: usize,
    pub pending: usize,
    /// Queued entries at or past the crawl depth bound. The driver drops
    /// them without fetching, so they carry no time estimate.
    pub leaves: usize,
    pub pending_by_depth: BTreeMap<u32, usize>,
    pub failed: usize,
    pub avg_connections: f64,
    pub estimates: Vec<EstimateGroup>,
    pub generated_at: String,
}

impl ProgressReport {
    pub fn from_state(state: &CrawlState, max_depth: u32) -> Self {
        let edges = state.edge_count();
        let nodes = state.node_count();
        let pending = state.frontier_len();

        let mut pending_by_depth = BTreeMap::new();
        for entry in state.frontier() {
            *pending_by_depth.entry(entry.depth).or_insert(0) += 1;
        }
        let leaves: usize = pending_by_depth.range(max_depth..).map(|(_, count)| count).sum();

        let avg_connections = if nodes > 0 {
            edges as f64 / nodes as f64
        } else {
            0.0
        };

        let mut estimates: Vec<EstimateGroup> = pending_by_depth
            .range(..max_depth)
            .map(|(&depth, &pages)| EstimateGroup {
                depth: Some(depth),
                pages,
                estimates: estimate(pages),
            })
            .collect();
        estimates.push(EstimateGroup {
            depth: None,
            pages: pending - leaves,
            estimates: estimate(pending - leaves),
        });

        Self {
            edges,
            nodes,
            visited: state.visited_count(),
            pending,
            leaves,
            pending_by_depth,
            failed: state.failed().len(),
            avg_connections,
            estimates,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut report = String::new();
        report.push_str(DIVIDER);
        report.push_str("                              CRAWL PROGRESS\n");
        report.push_str(DIVIDER);
        report.push('\n');

        report.push_str(&format!("Nodes collected:      {}\n", self.nodes));
        report.push_str(&format!("Connections:          {}\n", self.edges));
        report.push_str(&format!("Avg connections/page: {:.1}\n\n", self.avg_connections));

        report.push_str("Queue Status:\n");
        report.push_str(&format!("  Pages visited:      {}\n", self.visited));
        report.push_str(&format!("  Pages waiting:      {}\n", self.pending));
        if self.leaves > 0 {
            report.push_str(&format!("  Leaves queued:      {} (never fetched)\n", self.leaves));
        }
        if self.failed > 0 {
            report.push_str(&format!("  Pages failed:       {} (retried on next crawl)\n", self.failed));
        }

        if !self.pending_by_depth.is_empty() {
            report.push_str("\nPages waiting by depth:\n");
            for (depth, count) in &self.pending_by_depth {
                report.push_str(&format!("  Depth {}: {} pages\n", depth, count));
            }
        }

        report.push('\n');
        report.push_str(DIVIDER);
        report.push_str("Time Estimates:\n");
        for group in &self.estimates {
            match group.depth {
                Some(depth) => report.push_str(&format!("\nDepth {} only ({} pages):\n", depth, group.pages)),
                None => report.push_str(&format!("\nAll remaining pages ({} pages):\n", group.pages)),
            }
            for estimate in &group.estimates {
                report.push_str(&format!(
                    "  With {} concurrent requests: {}\n",
                    estimate.concurrency,
                    format_duration(estimate.seconds)
                ));
            }
        }

        report.push('\n');
        report.push_str(&format!("Generated at {}\n", self.generated_at));
        report
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render(&self, format: ReportFormat) -> serde_json::Result<String> {
        match format {
            ReportFormat::Text => Ok(self.render_text()),
            ReportFormat::Json => self.render_json(),
        }
    }
}

fn estimate(pages: usize) -> Vec<TimeEstimate> {
    ESTIMATE_CONCURRENCY
        .iter()
        .map(|&concurrency| TimeEstimate {
            concurrency,
            seconds: pages as f64 / concurrency as f64 * SECONDS_PER_REQUEST,
        })
        .collect()
}

/// `"H hours and M minutes"`, truncating seconds.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{} hours and {} minutes", total / 3600, (total % 3600) / 60)
}
