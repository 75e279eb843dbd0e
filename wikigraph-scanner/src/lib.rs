pub mod client;
pub mod error;
pub mod result;
pub mod source;

pub use client::{ClientOptions, LinkMode, WikipediaClient};
pub use error::FetchError;
pub use result::{LinkContext, PageLink, PageMetadata};
pub use source::LinkSource;
