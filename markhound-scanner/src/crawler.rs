use crate::classify::{is_same_site, netloc_of};
use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::extract::{PageItem, extract_page_items};
use crate::matcher::KeywordMatcher;
use crate::redirect::RedirectResolver;
use crate::result::{LocationType, Observation};
use crate::status::StatusLog;
use crate::store::ResultStore;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

/// Default page budget when none is given.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// A fetched HTML page after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub body: String,
}

/// Scans pages of one site for brand keywords.
///
/// Owns everything a crawl session mutates while scanning: the visited
/// set, the page counter, the redirect cache, the result store and the
/// status log. One writer at a time; callers hold `&mut Crawler`.
pub struct Crawler {
    client: Client,
    matcher: KeywordMatcher,
    resolver: RedirectResolver,
    results: ResultStore,
    visited: HashSet<String>,
    status: StatusLog,
    start_url: String,
    main_netloc: String,
    pages_crawled: usize,
    max_pages: usize,
}

impl Crawler {
    pub fn new(start_url: &str, config: ScanConfig) -> Result<Self> {
        let parsed = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        if parsed.host_str().is_none() {
            return Err(ScanError::InvalidUrl(format!("{}: missing host", start_url)));
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.page_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            matcher: KeywordMatcher::new(&config)?,
            resolver: RedirectResolver::new(&config)?,
            results: ResultStore::new(config.snippet_limit),
            visited: HashSet::new(),
            status: StatusLog::new(),
            start_url: start_url.to_string(),
            main_netloc: netloc_of(start_url),
            pages_crawled: 0,
            max_pages: DEFAULT_MAX_PAGES,
        })
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    pub fn main_netloc(&self) -> &str {
        &self.main_netloc
    }

    pub fn matcher(&self) -> &KeywordMatcher {
        &self.matcher
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn status(&self) -> &StatusLog {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusLog {
        &mut self.status
    }

    pub fn pages_crawled(&self) -> usize {
        self.pages_crawled
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Fetch attempts made this session, successful or not.
    pub fn fetch_attempts(&self) -> usize {
        self.visited.len()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.pages_crawled >= self.max_pages
    }

    /// Start a fresh page budget window. The visited set is kept.
    pub fn reset_page_counter(&mut self) {
        self.pages_crawled = 0;
    }

    pub fn is_same_site(&self, url: &str) -> bool {
        is_same_site(&netloc_of(url), &self.main_netloc)
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch one page, scan it and return the same-site URLs it links to
    /// (in document order, not deduplicated).
    ///
    /// The URL is marked visited and counted against the budget before the
    /// request goes out, so a failing page is never retried. Fetch failures
    /// and non-HTML responses yield an empty list.
    pub async fn analyze(&mut self, url: &str) -> Vec<String> {
        if url.is_empty() || self.visited.contains(url) || self.budget_exhausted() {
            return Vec::new();
        }
        self.visited.insert(url.to_string());
        self.pages_crawled += 1;

        let page = match self.fetch_page(url).await {
            Ok(page) => page,
            Err(ScanError::UnsupportedContent { url, content_type }) => {
                debug!("Skipping {} ({})", url, content_type);
                return Vec::new();
            }
            Err(e) => {
                self.status.warn(format!("Error fetching {}: {}", url, e));
                return Vec::new();
            }
        };

        let items = extract_page_items(&page.body, &page.final_url);
        debug!("{} scannable items on {}", items.len(), page.final_url);

        let mut discovered = Vec::new();
        for item in items {
            self.scan_item(item, &page.final_url, &mut discovered).await;
        }

        info!(
            "Scanned {} ({} links, {} matches so far)",
            page.final_url,
            discovered.len(),
            self.results.len()
        );
        discovered
    }

    async fn scan_item(&mut self, item: PageItem, page_url: &str, discovered: &mut Vec<String>) {
        match item {
            PageItem::Link { element, url, text } => {
                self.check_url(&url, page_url).await;
                self.record_text(
                    &text,
                    Observation {
                        source_url: page_url,
                        matched_url: &url,
                        element: &element,
                        attribute: "text",
                        content: &text,
                        location_type: LocationType::AnchorText,
                    },
                );
                if self.is_same_site(&url) {
                    discovered.push(url);
                }
            }
            PageItem::ImageBanner { url, alt } => {
                self.record_text(
                    &alt,
                    Observation {
                        source_url: page_url,
                        matched_url: &url,
                        element: "a",
                        attribute: "img_alt",
                        content: &alt,
                        location_type: LocationType::ImageBanner,
                    },
                );
            }
            PageItem::Text { element, text } => {
                self.record_text(
                    &text,
                    Observation {
                        source_url: page_url,
                        matched_url: page_url,
                        element: &element,
                        attribute: "text",
                        content: &text,
                        location_type: LocationType::Content,
                    },
                );
            }
            PageItem::Meta { attribute, content } => {
                self.record_text(
                    &content,
                    Observation {
                        source_url: page_url,
                        matched_url: page_url,
                        element: "meta",
                        attribute: &attribute,
                        content: &content,
                        location_type: LocationType::Meta,
                    },
                );
            }
            PageItem::ImageAlt { alt } => {
                self.record_text(
                    &alt,
                    Observation {
                        source_url: page_url,
                        matched_url: page_url,
                        element: "img",
                        attribute: "alt",
                        content: &alt,
                        location_type: LocationType::AltText,
                    },
                );
            }
            PageItem::DataUrl { url } | PageItem::ScriptUrl { url } => {
                self.check_url(&url, page_url).await;
                if self.is_same_site(&url) {
                    discovered.push(url);
                }
            }
        }
    }

    fn record_text(&mut self, text: &str, observation: Observation<'_>) {
        let keywords = self.matcher.matches(text);
        if !keywords.is_empty() {
            self.results.record(&observation, &keywords);
        }
    }

    /// Check a URL three ways: as written, at its final destination, and at
    /// every intermediate redirect hop.
    pub async fn check_url(&mut self, raw_url: &str, source_url: &str) {
        if raw_url.is_empty() {
            return;
        }

        self.record_text(
            raw_url,
            Observation {
                source_url,
                matched_url: raw_url,
                element: "url",
                attribute: "href",
                content: raw_url,
                location_type: LocationType::DirectUrl,
            },
        );

        let resolution = self.resolver.resolve(raw_url, &mut self.status).await;

        if resolution.final_url != raw_url {
            let content = format!(
                "Redirected from: {} to: {}",
                raw_url, resolution.final_url
            );
            self.record_text(
                &resolution.final_url,
                Observation {
                    source_url,
                    matched_url: &resolution.final_url,
                    element: "url",
                    attribute: "href",
                    content: &content,
                    location_type: LocationType::RedirectedUrl,
                },
            );
        }

        for hop in &resolution.chain {
            let content = format!("Redirect chain URL: {}", hop);
            self.record_text(
                hop,
                Observation {
                    source_url,
                    matched_url: hop,
                    element: "url",
                    attribute: "href",
                    content: &content,
                    location_type: LocationType::RedirectChainUrl,
                },
            );
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.contains("text/html") {
            return Err(ScanError::UnsupportedContent {
                url: url.to_string(),
                content_type,
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchedPage { final_url, body })
    }
}
