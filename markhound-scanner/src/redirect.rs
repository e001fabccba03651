use crate::classify::is_http_url;
use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::status::StatusLog;
use reqwest::header::LOCATION;
use reqwest::{Client, Response, StatusCode};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Final destination of a URL and the hops taken to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub final_url: String,
    /// URLs that answered with a redirect, in the order they were visited.
    pub chain: Vec<String>,
}

impl Resolution {
    pub fn unchanged(url: &str) -> Self {
        Self {
            final_url: url.to_string(),
            chain: Vec::new(),
        }
    }
}

/// Memoized redirect resolution. Entries are keyed by the exact input
/// string and live as long as the session.
pub struct RedirectResolver {
    client: Client,
    cache: HashMap<String, Resolution>,
    max_hops: usize,
}

impl RedirectResolver {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.redirect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            cache: HashMap::new(),
            max_hops: config.max_redirects,
        })
    }

    /// Best-effort resolution. Transport failures are written to `log` and
    /// resolve to the input URL with an empty chain; that fallback is
    /// cached like any other answer.
    pub async fn resolve(&mut self, url: &str, log: &mut StatusLog) -> Resolution {
        if let Some(hit) = self.cache.get(url) {
            return hit.clone();
        }

        let resolution = if !is_http_url(url) {
            Resolution::unchanged(url)
        } else {
            match self.follow(url).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    log.warn(format!("Error resolving redirects for {}: {}", url, e));
                    Resolution::unchanged(url)
                }
            }
        };

        self.cache.insert(url.to_string(), resolution.clone());
        resolution
    }

    pub fn cached(&self, url: &str) -> Option<&Resolution> {
        self.cache.get(url)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Follow `Location` headers with HEAD requests, then fall back to a
    /// single non-following GET when HEAD gave no chain but the URL moved
    /// or the server refused the HEAD.
    async fn follow(&self, url: &str) -> Result<Resolution> {
        let mut current =
            Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
        let mut chain = Vec::new();
        let mut head_refused = false;

        loop {
            let response = self.client.head(current.clone()).send().await?;
            let status = response.status();
            let next = if status.is_redirection() {
                location_of(&response, &current)
            } else {
                None
            };

            match next {
                Some(next) if chain.len() < self.max_hops => {
                    debug!("{} redirects to {}", current, next);
                    chain.push(current.to_string());
                    current = next;
                }
                _ => {
                    head_refused = matches!(
                        status,
                        StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
                    );
                    break;
                }
            }
        }

        let mut final_url = current.to_string();

        if chain.is_empty() && (final_url != url || head_refused) {
            let response = self.client.get(current.clone()).send().await?;
            if response.status().is_redirection()
                && let Some(next) = location_of(&response, &current)
            {
                chain = vec![url.to_string()];
                final_url = next.to_string();
            }
        }

        Ok(Resolution { final_url, chain })
    }
}

fn location_of(response: &Response, base: &Url) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?.trim();
    if location.is_empty() {
        return None;
    }
    base.join(location).ok()
}
