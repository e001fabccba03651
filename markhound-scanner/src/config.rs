use std::time::Duration;

/// Brand markers searched for when no keyword list is supplied.
pub const DEFAULT_KEYWORDS: &[&str] = &["gowithguide", "go with guide", "go-with-guide", "87121"];

pub const DEFAULT_BRAND_DOMAIN: &str = "gowithguide.com";
pub const DEFAULT_PARTNER_ID: &str = "87121";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Records keep at most this many characters of matched content.
pub const DEFAULT_SNIPPET_LIMIT: usize = 500;

/// Settings shared by every scanner component of one crawl session.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub keywords: Vec<String>,
    /// Domain recognised by the literal-domain URL pattern
    pub brand_domain: String,
    /// Numeric affiliate id recognised with `_123` / `%5F123` suffixes
    pub partner_id: String,
    pub page_timeout: Duration,
    pub redirect_timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
    pub snippet_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            brand_domain: DEFAULT_BRAND_DOMAIN.to_string(),
            partner_id: DEFAULT_PARTNER_ID.to_string(),
            page_timeout: Duration::from_secs(15),
            redirect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            snippet_limit: DEFAULT_SNIPPET_LIMIT,
        }
    }
}

impl ScanConfig {
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_brand_domain(mut self, domain: impl Into<String>) -> Self {
        self.brand_domain = domain.into();
        self
    }

    pub fn with_partner_id(mut self, partner_id: impl Into<String>) -> Self {
        self.partner_id = partner_id.into();
        self
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn with_redirect_timeout(mut self, timeout: Duration) -> Self {
        self.redirect_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
