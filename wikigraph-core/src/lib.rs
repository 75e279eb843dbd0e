pub mod config;
pub mod crawl;
pub mod error;
pub mod graph;
pub mod model;
mod persist;
pub mod report;
pub mod state;
pub mod title;

pub use config::CrawlConfig;
pub use crawl::{
    CrawlDriver, CrawlOptions, CrawlProgressCallback, CrawlStats, CrawlSummary, DriverState,
    ExportOptions, ShutdownHandle,
};
pub use error::{GraphError, Result};
pub use graph::{ExportSummary, GraphLink, GraphNode, GraphSnapshot};
pub use model::{EdgeKey, EdgeRecord, FrontierEntry, NodeCategory, Title};
pub use report::{ProgressReport, ReportFormat};
pub use state::{CrawlState, StateStore};
pub use title::{TitlePolicy, is_topic_related, is_valid_link, normalize};
