use chrono::{DateTime, Utc};
use markhound_scanner::error::Result;
use markhound_scanner::{Category, Crawler, MatchRecord, ScanConfig};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Status lines kept in a poll snapshot
pub const STATUS_TAIL: usize = 10;
/// Records kept in a poll snapshot
pub const LATEST_RESULTS: usize = 5;

/// Traversal policy, each with a fixed page budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlMode {
    /// The start page only
    Quick,
    /// Homepage links, then category article pages, pausing on the first match
    Standard,
    /// Breadth-first over the whole site
    Complete,
}

impl CrawlMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quick" => Some(CrawlMode::Quick),
            "standard" => Some(CrawlMode::Standard),
            "complete" => Some(CrawlMode::Complete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlMode::Quick => "Quick",
            CrawlMode::Standard => "Standard",
            CrawlMode::Complete => "Complete",
        }
    }

    pub fn max_pages(&self) -> usize {
        match self {
            CrawlMode::Quick => 1,
            CrawlMode::Standard => 100,
            CrawlMode::Complete => 1000,
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one `advance()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A unit of work was done and more remains
    Progressed,
    /// New matches were found; waiting for a resume action
    Paused,
    Finished,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Running,
    Paused,
    Finished,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Finished => "finished",
            SessionState::Stopped => "stopped",
        }
    }
}

enum Phase {
    Quick,
    /// `None` until the homepage links have been collected
    Homepage(Option<VecDeque<String>>),
    CategoryDiscovery,
    Categories {
        pending: VecDeque<Category>,
        batch: VecDeque<String>,
    },
    Bfs {
        queue: VecDeque<String>,
        queued: HashSet<String>,
    },
    Done,
}

/// Point-in-time view of a session for a front end
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub mode: CrawlMode,
    pub state: SessionState,
    pub pages_crawled: usize,
    pub max_pages: usize,
    pub fetch_attempts: usize,
    pub current_category: Option<String>,
    pub status_tail: Vec<String>,
    pub latest_results: Vec<MatchRecord>,
    pub total_results: usize,
}

/// Everything a finished (or stopped) session leaves behind
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub session_id: String,
    pub start_url: String,
    pub mode: CrawlMode,
    pub state: SessionState,
    pub pages_crawled: usize,
    pub records: Vec<MatchRecord>,
    pub status: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One crawl of one site.
///
/// The session is the only owner of the visited set, redirect cache, result
/// store and frontier; every mutation goes through `&mut self`. A driver
/// loop calls [`CrawlSession::advance`] repeatedly, each call doing at most
/// one page fetch (or one discovery request) before handing control back.
pub struct CrawlSession {
    id: String,
    mode: CrawlMode,
    crawler: Crawler,
    phase: Phase,
    state: SessionState,
    cancel: CancellationToken,
    current_category: Option<String>,
    /// Result count at the last (re)start; growth past it pauses Standard
    resume_mark: usize,
    started_at: DateTime<Utc>,
}

impl CrawlSession {
    pub fn start(url: &str, mode: CrawlMode, config: ScanConfig) -> Result<Self> {
        let start_url = normalize_start_url(url);
        let mut crawler = Crawler::new(&start_url, config)?.with_max_pages(mode.max_pages());

        let phase = match mode {
            CrawlMode::Quick => Phase::Quick,
            CrawlMode::Standard => Phase::Homepage(None),
            CrawlMode::Complete => Phase::Bfs {
                queue: VecDeque::from([start_url.clone()]),
                queued: HashSet::from([start_url.clone()]),
            },
        };

        crawler
            .status_mut()
            .info(format!("Starting crawl of {} in {} mode", start_url, mode));

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            mode,
            crawler,
            phase,
            state: SessionState::Running,
            cancel: CancellationToken::new(),
            current_category: None,
            resume_mark: 0,
            started_at: Utc::now(),
        })
    }

    /// Share an externally owned stop signal.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> CrawlMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn start_url(&self) -> &str {
        self.crawler.start_url()
    }

    pub fn crawler(&self) -> &Crawler {
        &self.crawler
    }

    pub fn results(&self) -> &[MatchRecord] {
        self.crawler.results().records()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request a halt. Honoured at the next `advance()`, never mid-fetch.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn poll(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            mode: self.mode,
            state: self.state,
            pages_crawled: self.crawler.pages_crawled(),
            max_pages: self.crawler.max_pages(),
            fetch_attempts: self.crawler.fetch_attempts(),
            current_category: self.current_category.clone(),
            status_tail: self.crawler.status().tail(STATUS_TAIL).to_vec(),
            latest_results: self.crawler.results().latest(LATEST_RESULTS).to_vec(),
            total_results: self.crawler.results().len(),
        }
    }

    pub fn into_summary(self) -> CrawlSummary {
        CrawlSummary {
            session_id: self.id,
            start_url: self.crawler.start_url().to_string(),
            mode: self.mode,
            state: self.state,
            pages_crawled: self.crawler.fetch_attempts(),
            records: self.crawler.results().records().to_vec(),
            status: self.crawler.status().messages().to_vec(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }

    /// Resume after a pause, scanning the rest of the current batch with a
    /// fresh page budget. No effect in Quick or Complete mode.
    pub fn continue_current(&mut self) {
        if !self.resumable() {
            return;
        }
        self.resume("Continuing current batch");
    }

    /// Resume after a pause, abandoning the current batch for the next
    /// category with a fresh page budget. No effect in Quick or Complete
    /// mode.
    pub fn next_category(&mut self) {
        if !self.resumable() {
            return;
        }
        self.phase = match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Homepage(_) => Phase::CategoryDiscovery,
            Phase::Categories { pending, .. } => Phase::Categories {
                pending,
                batch: VecDeque::new(),
            },
            other => other,
        };
        self.resume("Continuing to next category");
    }

    fn resumable(&self) -> bool {
        self.mode == CrawlMode::Standard
            && matches!(self.state, SessionState::Running | SessionState::Paused)
    }

    fn resume(&mut self, message: &str) {
        self.crawler.reset_page_counter();
        self.resume_mark = self.crawler.results().len();
        self.state = SessionState::Running;
        self.crawler.status_mut().info(message);
    }

    /// Perform one bounded unit of work.
    pub async fn advance(&mut self) -> Step {
        if self.cancel.is_cancelled() {
            if self.state != SessionState::Stopped {
                self.crawler.status_mut().info("Crawl stopped");
            }
            self.state = SessionState::Stopped;
            return Step::Stopped;
        }

        match self.state {
            SessionState::Paused => return Step::Paused,
            SessionState::Finished => return Step::Finished,
            SessionState::Stopped => return Step::Stopped,
            SessionState::Running => {}
        }

        let phase = std::mem::replace(&mut self.phase, Phase::Done);
        let (phase, step) = match phase {
            Phase::Quick => self.advance_quick().await,
            Phase::Homepage(batch) => self.advance_homepage(batch).await,
            Phase::CategoryDiscovery => self.discover_categories().await,
            Phase::Categories { pending, batch } => self.advance_categories(pending, batch).await,
            Phase::Bfs { queue, queued } => self.advance_bfs(queue, queued).await,
            Phase::Done => (Phase::Done, Step::Finished),
        };
        self.phase = phase;

        self.state = match step {
            Step::Progressed => SessionState::Running,
            Step::Paused => SessionState::Paused,
            Step::Finished => SessionState::Finished,
            Step::Stopped => SessionState::Stopped,
        };
        debug!("Session {} advanced: {:?}", self.id, step);
        step
    }

    async fn advance_quick(&mut self) -> (Phase, Step) {
        let start_url = self.crawler.start_url().to_string();
        self.crawl_page(&start_url).await;
        (Phase::Done, Step::Finished)
    }

    async fn advance_homepage(&mut self, batch: Option<VecDeque<String>>) -> (Phase, Step) {
        let Some(mut batch) = batch else {
            self.crawler
                .status_mut()
                .info("Crawling homepage and main pages...");
            let start_url = self.crawler.start_url().to_string();
            let main_pages = self.crawler.get_main_pages().await;
            let batch: VecDeque<String> = std::iter::once(start_url)
                .chain(main_pages)
                .take(self.crawler.max_pages())
                .collect();
            return (Phase::Homepage(Some(batch)), Step::Progressed);
        };

        if self.crawler.budget_exhausted() {
            return self.finish_on_budget();
        }

        let Some(url) = batch.pop_front() else {
            return (Phase::CategoryDiscovery, Step::Progressed);
        };

        self.crawl_page(&url).await;
        if self.found_new_matches() {
            return (Phase::Homepage(Some(batch)), Step::Paused);
        }

        if batch.is_empty() {
            (Phase::CategoryDiscovery, Step::Progressed)
        } else {
            (Phase::Homepage(Some(batch)), Step::Progressed)
        }
    }

    async fn discover_categories(&mut self) -> (Phase, Step) {
        if self.crawler.budget_exhausted() {
            return self.finish_on_budget();
        }

        let categories = self.crawler.extract_categories().await;
        if categories.is_empty() {
            self.crawler.status_mut().info("No categories found.");
            return (Phase::Done, Step::Finished);
        }

        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        self.crawler
            .status_mut()
            .info(format!("Found categories: {}", names.join(", ")));

        (
            Phase::Categories {
                pending: categories.into(),
                batch: VecDeque::new(),
            },
            Step::Progressed,
        )
    }

    async fn advance_categories(
        &mut self,
        mut pending: VecDeque<Category>,
        mut batch: VecDeque<String>,
    ) -> (Phase, Step) {
        if self.crawler.budget_exhausted() {
            return self.finish_on_budget();
        }

        let Some(url) = batch.pop_front() else {
            let Some(category) = pending.pop_front() else {
                self.current_category = None;
                self.crawler
                    .status_mut()
                    .info("All categories processed");
                return (Phase::Done, Step::Finished);
            };

            self.crawler
                .status_mut()
                .info(format!("Processing category: {}", category.name));
            self.current_category = Some(category.name.clone());
            let batch = self.crawler.get_category_pages(&category.url).await.into();
            return (
                Phase::Categories { pending, batch },
                Step::Progressed,
            );
        };

        self.crawl_page(&url).await;
        let step = if self.found_new_matches() {
            Step::Paused
        } else {
            Step::Progressed
        };

        (Phase::Categories { pending, batch }, step)
    }

    async fn advance_bfs(
        &mut self,
        mut queue: VecDeque<String>,
        mut queued: HashSet<String>,
    ) -> (Phase, Step) {
        while let Some(url) = queue.pop_front() {
            queued.remove(&url);
            if self.crawler.budget_exhausted() {
                break;
            }
            if self.crawler.is_visited(&url) {
                continue;
            }

            let discovered = self.crawl_page(&url).await;
            for new_url in discovered {
                if !self.crawler.is_visited(&new_url)
                    && !queued.contains(&new_url)
                    && !self.crawler.budget_exhausted()
                {
                    queued.insert(new_url.clone());
                    queue.push_back(new_url);
                }
            }

            if queue.is_empty() || self.crawler.budget_exhausted() {
                break;
            }
            return (Phase::Bfs { queue, queued }, Step::Progressed);
        }

        info!(
            "Breadth-first crawl finished after {} pages",
            self.crawler.fetch_attempts()
        );
        (Phase::Done, Step::Finished)
    }

    fn finish_on_budget(&mut self) -> (Phase, Step) {
        let max_pages = self.crawler.max_pages();
        self.crawler
            .status_mut()
            .info(format!("Page budget of {} reached", max_pages));
        (Phase::Done, Step::Finished)
    }

    async fn crawl_page(&mut self, url: &str) -> Vec<String> {
        let message = if self.mode == CrawlMode::Complete {
            format!(
                "Crawling: {} (Page {}/{})",
                url,
                self.crawler.pages_crawled() + 1,
                self.crawler.max_pages()
            )
        } else {
            format!("Crawling: {}", url)
        };
        self.crawler.status_mut().info(message);

        let before = self.crawler.results().len();
        let discovered = self.crawler.analyze(url).await;
        let after = self.crawler.results().len();
        if after > before {
            self.crawler
                .status_mut()
                .info(format!("Found {} matches", after));
        }
        discovered
    }

    fn found_new_matches(&self) -> bool {
        self.crawler.results().len() > self.resume_mark
    }
}

/// Prefix `https://` when the user left the scheme off.
pub fn normalize_start_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// What the driver loop does when a Standard crawl pauses on a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMatch {
    Stop,
    ContinueCurrent,
    NextCategory,
}

impl OnMatch {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stop" => Some(OnMatch::Stop),
            "continue" => Some(OnMatch::ContinueCurrent),
            "next-category" | "next" => Some(OnMatch::NextCategory),
            _ => None,
        }
    }
}

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub url: String,
    pub mode: CrawlMode,
    pub config: ScanConfig,
    pub on_match: OnMatch,
}

/// Callback invoked with a fresh snapshot after every step
pub type CrawlProgressCallback = Arc<dyn Fn(&SessionSnapshot) + Send + Sync>;

/// Drive a session to completion, applying `on_match` whenever it pauses.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
    cancel: Option<CancellationToken>,
) -> Result<CrawlSummary> {
    let CrawlOptions {
        url,
        mode,
        config,
        on_match,
    } = options;

    let mut session = CrawlSession::start(&url, mode, config)?;
    if let Some(token) = cancel {
        session = session.with_cancellation(token);
    }

    loop {
        let step = session.advance().await;

        if let Some(ref callback) = progress_callback {
            callback(&session.poll());
        }

        match step {
            Step::Progressed => {}
            Step::Paused => match on_match {
                OnMatch::Stop => session.stop(),
                OnMatch::ContinueCurrent => session.continue_current(),
                OnMatch::NextCategory => session.next_category(),
            },
            Step::Finished | Step::Stopped => break,
        }
    }

    info!(
        "Crawl of {} done: {} pages, {} matches",
        session.start_url(),
        session.crawler().fetch_attempts(),
        session.results().len()
    );
    Ok(session.into_summary())
}
