use crate::error::Result;
use crate::result::{PageLink, PageMetadata};
use std::future::Future;
use std::sync::Arc;

/// Capability the crawl driver consumes: given a page title, report its
/// outbound links and some page metadata.
///
/// Implementations must return an empty list, not an error, for pages that
/// do not exist. Errors are reserved for network and parse failures.
pub trait LinkSource: Send + Sync {
    fn get_page_links(&self, title: &str) -> impl Future<Output = Result<Vec<PageLink>>> + Send;

    fn get_page_metadata(&self, title: &str)
    -> impl Future<Output = Result<PageMetadata>> + Send;
}

impl<T: LinkSource> LinkSource for Arc<T> {
    fn get_page_links(&self, title: &str) -> impl Future<Output = Result<Vec<PageLink>>> + Send {
        (**self).get_page_links(title)
    }

    fn get_page_metadata(
        &self,
        title: &str,
    ) -> impl Future<Output = Result<PageMetadata>> + Send {
        (**self).get_page_metadata(title)
    }
}
