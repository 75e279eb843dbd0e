use crate::error::{FetchError, Result};
use crate::result::{LinkContext, PageLink, PageMetadata};
use crate::source::LinkSource;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";
pub const DEFAULT_USER_AGENT: &str = "Wikigraph/0.1 (https://github.com/trapdoorsec/wikigraph)";

/// Containers whose links are navigation or citation noise.
const EXCLUDED_CONTAINER_CLASSES: &[&str] = &[
    "navbox",
    "reflist",
    "reference",
    "references",
    "mw-references-wrap",
    "reference-text",
];

/// Section headings whose content is skipped entirely.
const EXCLUDED_SECTIONS: &[&str] = &[
    "references",
    "notes",
    "citations",
    "sources",
    "footnotes",
    "works cited",
];

/// How outbound links are discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Scrape the rendered article body. Links carry section/sentence context.
    #[default]
    Article,
    /// Use the MediaWiki `prop=links` API. Faster, no context.
    Api,
}

impl FromStr for LinkMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "article" | "html" => Ok(LinkMode::Article),
            "api" => Ok(LinkMode::Api),
            other => Err(format!("unknown link mode '{}'", other)),
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkMode::Article => write!(f, "article"),
            LinkMode::Api => write!(f, "api"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub rate_limit: Duration,
    pub link_mode: LinkMode,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            rate_limit: Duration::from_millis(100),
            link_mode: LinkMode::Article,
        }
    }
}

/// Link source backed by a MediaWiki installation (Wikipedia by default).
pub struct WikipediaClient {
    client: Client,
    base_url: Url,
    link_mode: LinkMode,
    rate_limit: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl WikipediaClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let base_url = Url::parse(&options.base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", options.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(options.base_url));
        }

        let client = Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(Duration::from_secs(options.timeout_secs))
            .connect_timeout(Duration::from_secs(options.timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(50) // Connection pooling
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            base_url,
            link_mode: options.link_mode,
            rate_limit: options.rate_limit,
            last_request: Mutex::new(None),
        })
    }

    pub fn with_link_mode(mut self, mode: LinkMode) -> Self {
        self.link_mode = mode;
        self
    }

    pub fn with_rate_limit(mut self, delay: Duration) -> Self {
        self.rate_limit = delay;
        self
    }

    pub fn link_mode(&self) -> LinkMode {
        self.link_mode
    }

    /// `{base}/wiki/{Title_with_underscores}`
    pub fn article_url(&self, title: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("wiki")
            .push(&title.replace(' ', "_"));
        Ok(url)
    }

    /// `{base}/w/api.php`
    pub fn api_url(&self) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("w")
            .push("api.php");
        Ok(url)
    }

    /// Space request starts by at least `rate_limit`. Holding the lock while
    /// sleeping serializes concurrent callers.
    async fn throttle(&self) {
        if self.rate_limit.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.rate_limit {
                tokio::time::sleep(self.rate_limit - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch_article_links(&self, title: &str) -> Result<Vec<PageLink>> {
        let url = self.article_url(title)?;
        self.throttle().await;
        debug!("Fetching {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("{} not found, treating as no links", title);
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let links = extract_article_links(&body)?;
        debug!("{}: {} article links", title, links.len());
        Ok(links)
    }

    async fn fetch_api_links(&self, title: &str) -> Result<Vec<PageLink>> {
        let mut links = Vec::new();
        let mut plcontinue: Option<String> = None;

        loop {
            let mut params = vec![
                ("titles", title.to_string()),
                ("prop", "links".to_string()),
                ("pllimit", "max".to_string()),
                ("plnamespace", "0".to_string()),
            ];
            if let Some(ref token) = plcontinue {
                params.push(("plcontinue", token.clone()));
            }

            let response: QueryResponse = self.query(&params).await?;
            let pages = response.query.map(|q| q.pages).unwrap_or_default();
            for page in pages {
                if page.missing || page.invalid {
                    debug!("{} missing on remote, treating as no links", page.title);
                    continue;
                }
                links.extend(page.links.into_iter().map(|l| PageLink::new(l.title)));
            }

            match response.continuation.and_then(|c| c.plcontinue) {
                Some(next) if plcontinue.as_deref() == Some(next.as_str()) => {
                    warn!("Link pagination for {} did not advance, stopping", title);
                    break;
                }
                Some(next) => plcontinue = Some(next),
                None => break,
            }
        }

        debug!("{}: {} API links", title, links.len());
        Ok(links)
    }

    async fn fetch_metadata(&self, title: &str) -> Result<PageMetadata> {
        let params = [
            ("titles", title.to_string()),
            ("prop", "info|pageprops".to_string()),
            ("inprop", "url".to_string()),
        ];
        let response: QueryResponse = self.query(&params).await?;
        let page = response
            .query
            .and_then(|q| q.pages.into_iter().next())
            .ok_or_else(|| FetchError::Parse(format!("no page in metadata response for {}", title)))?;

        Ok(PageMetadata {
            title: page.title,
            page_id: page.pageid,
            is_disambiguation: page
                .pageprops
                .as_ref()
                .is_some_and(|props| props.contains_key("disambiguation")),
            url: page.fullurl,
            missing: page.missing || page.invalid,
        })
    }

    async fn query<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> Result<T> {
        let mut url = self.api_url()?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("action", "query")
                .append_pair("format", "json")
                .append_pair("formatversion", "2");
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        self.throttle().await;
        debug!("Querying {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl LinkSource for WikipediaClient {
    async fn get_page_links(&self, title: &str) -> Result<Vec<PageLink>> {
        match self.link_mode {
            LinkMode::Article => self.fetch_article_links(title).await,
            LinkMode::Api => self.fetch_api_links(title).await,
        }
    }

    async fn get_page_metadata(&self, title: &str) -> Result<PageMetadata> {
        self.fetch_metadata(title).await
    }
}

// MediaWiki response shapes (formatversion=2)

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryPages>,
    #[serde(default, rename = "continue")]
    continuation: Option<Continuation>,
}

#[derive(Debug, Deserialize)]
struct QueryPages {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    pageid: Option<u64>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    pageprops: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    fullurl: Option<String>,
    #[serde(default)]
    links: Vec<ApiLink>,
}

#[derive(Debug, Deserialize)]
struct ApiLink {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Continuation {
    #[serde(default)]
    plcontinue: Option<String>,
}

/// Extract in-article links from a rendered Wikipedia page.
///
/// Only `/wiki/` links under `#mw-content-text` are returned, in document
/// order and deduplicated by raw title. Titles are returned as they appear in
/// the href (still percent-encoded, underscores intact).
pub fn extract_article_links(html: &str) -> Result<Vec<PageLink>> {
    let document = Html::parse_document(html);
    let content_selector =
        Selector::parse("#mw-content-text").map_err(|e| FetchError::Parse(e.to_string()))?;

    let Some(content) = document.select(&content_selector).next() else {
        return Ok(Vec::new());
    };

    let mut links = Vec::new();
    let mut seen = HashSet::new();
    let mut section: Option<String> = None;
    let mut skipping_section = false;

    for node in content.descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };

        match element.value().name() {
            "h2" | "h3" => {
                let heading = heading_text(&element);
                skipping_section = EXCLUDED_SECTIONS.contains(&heading.to_lowercase().as_str());
                section = Some(heading).filter(|h| !h.is_empty());
            }
            "a" if !skipping_section => {
                let Some(title) = element.value().attr("href").and_then(title_from_href) else {
                    continue;
                };
                if in_excluded_container(&element) || !seen.insert(title.clone()) {
                    continue;
                }

                let context = LinkContext {
                    section: section.clone(),
                    sentence: enclosing_sentence(&element),
                };
                links.push(PageLink::with_context(title, context));
            }
            _ => {}
        }
    }

    Ok(links)
}

fn title_from_href(href: &str) -> Option<String> {
    let raw = href.strip_prefix("/wiki/")?;
    let raw = raw.split(['#', '?']).next().unwrap_or_default();
    if raw.is_empty() {
        return None;
    }
    Some(raw.to_string())
}

fn heading_text(heading: &ElementRef) -> String {
    // Older markup wraps the title in .mw-headline next to an [edit] link.
    let headline = heading
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().classes().any(|class| class == "mw-headline"));
    let text: String = headline.unwrap_or(*heading).text().collect();
    text.replace("[edit]", "").trim().to_string()
}

fn in_excluded_container(anchor: &ElementRef) -> bool {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|el| {
            el.value()
                .classes()
                .any(|class| EXCLUDED_CONTAINER_CLASSES.contains(&class))
        })
}

fn enclosing_sentence(anchor: &ElementRef) -> Option<String> {
    let block = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "p" | "li"))?;

    let anchor_text = collapse_whitespace(&anchor.text().collect::<String>());
    if anchor_text.is_empty() {
        return None;
    }

    let text = collapse_whitespace(&block.text().collect::<String>());
    split_sentences(&text)
        .into_iter()
        .find(|sentence| sentence.contains(anchor_text.as_str()))
        .map(str::to_string)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split on `.`, `!` or `?` followed by whitespace or end of text.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
        if matches!(ch, '.' | '!' | '?') && at_boundary {
            let end = idx + ch.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}
