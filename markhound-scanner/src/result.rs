use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where on a page a keyword was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    DirectUrl,
    RedirectedUrl,
    RedirectChainUrl,
    AnchorText,
    ImageBanner,
    Content,
    Meta,
    AltText,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::DirectUrl => "direct_url",
            LocationType::RedirectedUrl => "redirected_url",
            LocationType::RedirectChainUrl => "redirect_chain_url",
            LocationType::AnchorText => "anchor_text",
            LocationType::ImageBanner => "image_banner",
            LocationType::Content => "content",
            LocationType::Meta => "meta",
            LocationType::AltText => "alt_text",
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub source_url: String,
    pub matched_url: String,
    pub element: String,
    pub attribute: String,
    pub keyword: String,
    pub content: String,
    pub location_type: LocationType,
    pub timestamp: DateTime<Utc>,
}

/// Identity of a record: every field except the observation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RecordKey {
    source_url: String,
    matched_url: String,
    element: String,
    attribute: String,
    keyword: String,
    content: String,
    location_type: LocationType,
}

impl MatchRecord {
    pub(crate) fn key(&self) -> RecordKey {
        RecordKey {
            source_url: self.source_url.clone(),
            matched_url: self.matched_url.clone(),
            element: self.element.clone(),
            attribute: self.attribute.clone(),
            keyword: self.keyword.clone(),
            content: self.content.clone(),
            location_type: self.location_type,
        }
    }

    /// Content truncated to at most `limit` characters.
    pub fn content_sample(&self, limit: usize) -> String {
        truncate_chars(&self.content, limit)
    }
}

pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// A match waiting to be fanned out into one record per keyword.
#[derive(Debug, Clone)]
pub struct Observation<'a> {
    pub source_url: &'a str,
    pub matched_url: &'a str,
    pub element: &'a str,
    pub attribute: &'a str,
    pub content: &'a str,
    pub location_type: LocationType,
}
