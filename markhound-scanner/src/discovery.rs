use crate::crawler::Crawler;
use crate::error::Result;
use crate::extract::{Anchor, extract_anchors};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Content-area labels, highest priority first.
pub const CATEGORY_PRIORITY: &[&str] = &["travel", "blog", "resources"];

pub const MAX_CATEGORIES: usize = 5;

const ARTICLE_MARKERS: &[&str] = &["/article/", "/post/", "/blog/", "/news/"];

static CATEGORY_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/category/([^/?#]+)").expect("valid category regex"));
static DATE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})/(\d{2})/").expect("valid date regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub url: String,
}

impl Category {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

impl Crawler {
    /// Up to five section URLs from the start page, known content areas
    /// first.
    pub async fn extract_categories(&mut self) -> Vec<Category> {
        let start_url = self.start_url().to_string();
        match self.fetch_anchors(&start_url).await {
            Ok(anchors) => {
                let categories = categories_from_anchors(&anchors);
                debug!("{} categories on {}", categories.len(), start_url);
                categories
            }
            Err(e) => {
                self.status_mut()
                    .warn(format!("Error extracting categories: {}", e));
                Vec::new()
            }
        }
    }

    /// Distinct same-site links on the start page, excluding the start
    /// page itself, capped at the page budget.
    pub async fn get_main_pages(&mut self) -> Vec<String> {
        let start_url = self.start_url().to_string();
        match self.fetch_anchors(&start_url).await {
            Ok(anchors) => {
                let mut links: Vec<String> = Vec::new();
                for anchor in anchors {
                    if anchor.url != start_url
                        && self.is_same_site(&anchor.url)
                        && !links.contains(&anchor.url)
                    {
                        links.push(anchor.url);
                    }
                }
                links.truncate(self.max_pages());
                links
            }
            Err(e) => {
                self.status_mut()
                    .warn(format!("Error getting main pages: {}", e));
                Vec::new()
            }
        }
    }

    /// Article-like same-site links on a category page, newest first when
    /// every link carries a `/YYYY/MM/` segment.
    pub async fn get_category_pages(&mut self, category_url: &str) -> Vec<String> {
        match self.fetch_anchors(category_url).await {
            Ok(anchors) => {
                let mut links: Vec<String> = Vec::new();
                for anchor in anchors {
                    if anchor.url != category_url
                        && self.is_same_site(&anchor.url)
                        && !links.contains(&anchor.url)
                        && is_article_like(&anchor.url)
                    {
                        links.push(anchor.url);
                    }
                }
                let mut links = sort_by_date_desc(links);
                links.truncate(self.max_pages());
                links
            }
            Err(e) => {
                self.status_mut()
                    .warn(format!("Error getting category pages: {}", e));
                Vec::new()
            }
        }
    }

    /// Discovery requests sit outside the page budget and the visited set,
    /// but none are made once the budget is spent.
    async fn fetch_anchors(&self, url: &str) -> Result<Vec<Anchor>> {
        if self.budget_exhausted() {
            return Ok(Vec::new());
        }
        let body = self.client().get(url).send().await?.text().await?;
        Ok(extract_anchors(&body, url))
    }
}

/// Classify anchors into categories and order them by label priority.
pub fn categories_from_anchors(anchors: &[Anchor]) -> Vec<Category> {
    let mut categories: Vec<Category> = Vec::new();

    for anchor in anchors {
        let href = anchor.href.to_lowercase();
        let text = anchor.text.to_lowercase();
        let label = CATEGORY_PRIORITY
            .iter()
            .find(|label| href.contains(*label) || text.contains(*label));

        if !href.contains("/category/") && label.is_none() {
            continue;
        }

        let name = match CATEGORY_SEGMENT.captures(&href) {
            Some(caps) => caps[1].to_string(),
            None => label.map(|l| l.to_string()).unwrap_or_else(|| "other".to_string()),
        };

        let category = Category::new(name, anchor.url.clone());
        if !categories.contains(&category) {
            categories.push(category);
        }
    }

    let mut sorted: Vec<Category> = CATEGORY_PRIORITY
        .iter()
        .filter_map(|label| categories.iter().find(|c| c.name == *label).cloned())
        .collect();
    sorted.extend(
        categories
            .into_iter()
            .filter(|c| !CATEGORY_PRIORITY.contains(&c.name.as_str())),
    );
    sorted.truncate(MAX_CATEGORIES);
    sorted
}

pub fn is_article_like(url: &str) -> bool {
    ARTICLE_MARKERS.iter().any(|m| url.contains(m)) || DATE_SEGMENT.is_match(url)
}

/// `(year, month)` of the last date segment in a URL.
pub fn last_date_segment(url: &str) -> Option<(String, String)> {
    DATE_SEGMENT
        .captures_iter(url)
        .last()
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}

/// Newest first. If any URL lacks a date segment the input order is kept.
pub fn sort_by_date_desc(urls: Vec<String>) -> Vec<String> {
    let keys: Option<Vec<(String, String)>> = urls.iter().map(|u| last_date_segment(u)).collect();
    match keys {
        Some(keys) => {
            let mut keyed: Vec<_> = keys.into_iter().zip(urls).collect();
            keyed.sort_by(|a, b| b.0.cmp(&a.0));
            keyed.into_iter().map(|(_, url)| url).collect()
        }
        None => urls,
    }
}
