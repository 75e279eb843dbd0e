use crate::crawl::{CrawlOptions, ExportOptions};
use crate::error::{GraphError, Result};
use crate::graph::GRAPH_FILE;
use crate::persist::read_json;
use crate::model::Title;
use crate::title::TitlePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wikigraph_scanner::client::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use wikigraph_scanner::{ClientOptions, LinkMode};

/// Crawl settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub root_title: String,
    pub max_depth: u32,
    /// Defaults to `max_depth`.
    pub max_export_depth: Option<u32>,
    pub batch_size: usize,
    pub concurrency: usize,
    /// Seconds between request starts.
    pub rate_limit_delay: f64,
    pub data_dir: String,
    pub public_dir: String,
    pub wiki_base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub link_mode: LinkMode,
    pub strip_qualifiers: bool,
    pub export_on_finish: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            root_title: "Architecture".to_string(),
            max_depth: 2,
            max_export_depth: None,
            batch_size: 50,
            concurrency: 20,
            rate_limit_delay: 0.1,
            data_dir: "data".to_string(),
            public_dir: "public".to_string(),
            wiki_base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            link_mode: LinkMode::Article,
            strip_qualifiers: true,
            export_on_finish: true,
        }
    }
}

impl CrawlConfig {
    /// Load a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Self = read_json(&expand_path(&path.to_string_lossy()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.root().is_empty() {
            return Err(GraphError::InvalidConfig("root_title must not be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(GraphError::InvalidConfig("batch_size must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(GraphError::InvalidConfig("concurrency must be at least 1".to_string()));
        }
        if !self.rate_limit_delay.is_finite() || self.rate_limit_delay < 0.0 {
            return Err(GraphError::InvalidConfig(format!(
                "rate_limit_delay must be a non-negative number of seconds, got {}",
                self.rate_limit_delay
            )));
        }
        if self.timeout_secs == 0 {
            return Err(GraphError::InvalidConfig("timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The root title as the crawl stores it, normalized like any link.
    pub fn root(&self) -> Title {
        self.title_policy().normalize(&self.root_title)
    }

    pub fn export_depth(&self) -> u32 {
        self.max_export_depth.unwrap_or(self.max_depth)
    }

    pub fn data_path(&self) -> PathBuf {
        expand_path(&self.data_dir)
    }

    pub fn public_path(&self) -> PathBuf {
        expand_path(&self.public_dir)
    }

    pub fn graph_path(&self) -> PathBuf {
        self.public_path().join(GRAPH_FILE)
    }

    pub fn rate_limit(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.rate_limit_delay)
            .map_err(|e| GraphError::InvalidConfig(format!("rate_limit_delay: {}", e)))
    }

    pub fn title_policy(&self) -> TitlePolicy {
        TitlePolicy::new(self.strip_qualifiers)
    }

    pub fn client_options(&self) -> Result<ClientOptions> {
        Ok(ClientOptions {
            base_url: self.wiki_base_url.clone(),
            user_agent: self.user_agent.clone(),
            timeout_secs: self.timeout_secs,
            rate_limit: self.rate_limit()?,
            link_mode: self.link_mode,
        })
    }

    pub fn crawl_options(&self, show_progress_bars: bool) -> CrawlOptions {
        let export = self.export_on_finish.then(|| ExportOptions {
            path: self.graph_path(),
            max_depth: self.export_depth(),
        });

        CrawlOptions {
            root_title: self.root(),
            max_depth: self.max_depth,
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            export,
            show_progress_bars,
            title_policy: self.title_policy(),
        }
    }
}

/// Expand `~` and environment variables, leaving the path untouched if
/// expansion fails.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(path),
    }
}
