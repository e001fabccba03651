// Tests for crawl sessions and traversal policies

use markhound_core::crawl::{
    CrawlMode, CrawlOptions, CrawlProgressCallback, CrawlSession, OnMatch, SessionSnapshot,
    SessionState, Step, execute_crawl, normalize_start_url,
};
use markhound_scanner::ScanConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

async fn mount_page(server: &MockServer, route: &str, html: &str, expected_fetches: Option<u64>) {
    let mock = Mock::given(method("GET")).and(path(route)).respond_with(
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html; charset=utf-8")
            .set_body_bytes(html.as_bytes().to_vec()),
    );
    match expected_fetches {
        Some(n) => mock.expect(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

fn start_url(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

fn options(server: &MockServer, mode: CrawlMode, on_match: OnMatch) -> CrawlOptions {
    CrawlOptions {
        url: start_url(server),
        mode,
        config: ScanConfig::default(),
        on_match,
    }
}

/// Drive a session until it stops progressing
async fn run_until_blocked(session: &mut CrawlSession) -> Step {
    loop {
        let step = session.advance().await;
        if step != Step::Progressed {
            return step;
        }
    }
}

// ============================================================================
// Mode Tests
// ============================================================================

#[test]
fn test_crawl_mode_from_str() {
    assert_eq!(CrawlMode::from_str("quick"), Some(CrawlMode::Quick));
    assert_eq!(CrawlMode::from_str("Standard"), Some(CrawlMode::Standard));
    assert_eq!(CrawlMode::from_str("COMPLETE"), Some(CrawlMode::Complete));
    assert_eq!(CrawlMode::from_str("deep"), None);
}

#[test]
fn test_crawl_mode_display() {
    assert_eq!(CrawlMode::Quick.to_string(), "Quick");
    assert_eq!(CrawlMode::Complete.as_str(), "Complete");
}

#[test]
fn test_on_match_from_str() {
    assert_eq!(OnMatch::from_str("stop"), Some(OnMatch::Stop));
    assert_eq!(OnMatch::from_str("continue"), Some(OnMatch::ContinueCurrent));
    assert_eq!(OnMatch::from_str("next-category"), Some(OnMatch::NextCategory));
    assert_eq!(OnMatch::from_str("later"), None);
}

#[test]
fn test_normalize_start_url_adds_scheme() {
    assert_eq!(normalize_start_url("blog.test"), "https://blog.test");
    assert_eq!(normalize_start_url("http://blog.test/"), "http://blog.test/");
}

#[test]
fn test_start_rejects_unparseable_url() {
    assert!(CrawlSession::start("https://", CrawlMode::Quick, ScanConfig::default()).is_err());
}

// ============================================================================
// Quick Mode Tests
// ============================================================================

#[tokio::test]
async fn test_quick_mode_fetches_start_page_only() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/deal">Book on GoWithGuide</a></body></html>"#,
        Some(1),
    )
    .await;
    mount_page(&server, "/deal", "<html></html>", Some(0)).await;

    let summary = execute_crawl(options(&server, CrawlMode::Quick, OnMatch::Stop), None, None)
        .await
        .unwrap();

    assert_eq!(summary.state, SessionState::Finished);
    assert_eq!(summary.pages_crawled, 1);
    assert!(summary.records.iter().any(|r| r.keyword == "gowithguide"));
    assert!(
        summary
            .status
            .iter()
            .any(|m| m.starts_with("Starting crawl of") && m.ends_with("in Quick mode"))
    );
}

#[tokio::test]
async fn test_poll_snapshot_after_quick_crawl() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><p>go with guide</p></body></html>"#,
        None,
    )
    .await;

    let mut session =
        CrawlSession::start(&start_url(&server), CrawlMode::Quick, ScanConfig::default()).unwrap();
    assert_eq!(session.advance().await, Step::Finished);

    let snapshot = session.poll();
    assert_eq!(snapshot.state, SessionState::Finished);
    assert_eq!(snapshot.max_pages, 1);
    assert_eq!(snapshot.pages_crawled, 1);
    assert_eq!(snapshot.total_results, 1);
    assert_eq!(snapshot.latest_results[0].keyword, "go with guide");
    assert!(snapshot.status_tail.len() <= 10);
    assert!(snapshot.status_tail.iter().any(|m| m.starts_with("Crawling: ")));

    // finished sessions stay finished
    assert_eq!(session.advance().await, Step::Finished);
}

// ============================================================================
// Standard Mode Tests
// ============================================================================

#[tokio::test]
async fn test_standard_mode_pauses_on_first_match_and_resumes() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body>
            <a href="/about">About</a>
            <a href="/contact">Contact</a>
        </body></html>"#,
        None,
    )
    .await;
    mount_page(
        &server,
        "/about",
        r#"<html><body><p>We partner with GoWithGuide</p></body></html>"#,
        Some(1),
    )
    .await;
    mount_page(
        &server,
        "/contact",
        r#"<html><body><p>Write to us</p></body></html>"#,
        Some(1),
    )
    .await;

    let mut session =
        CrawlSession::start(&start_url(&server), CrawlMode::Standard, ScanConfig::default())
            .unwrap();

    assert_eq!(run_until_blocked(&mut session).await, Step::Paused);
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(session.poll().pages_crawled, 2);
    assert!(!session.crawler().is_visited(&format!("{}/contact", server.uri())));

    // paused sessions do no work until resumed
    assert_eq!(session.advance().await, Step::Paused);

    session.continue_current();
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(session.poll().pages_crawled, 0);

    assert_eq!(run_until_blocked(&mut session).await, Step::Finished);
    assert!(session.crawler().is_visited(&format!("{}/contact", server.uri())));
    assert!(
        session
            .poll()
            .status_tail
            .iter()
            .any(|m| m == "No categories found.")
    );
}

#[tokio::test]
async fn test_standard_mode_next_category_skips_rest_of_batch() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body>
            <a href="/category/news/">News</a>
            <a href="/category/travel/">Travel</a>
        </body></html>"#,
        None,
    )
    .await;
    mount_page(
        &server,
        "/category/travel/",
        r#"<html><body>
            <a href="/2024/05/post-a/">Older</a>
            <a href="/2024/06/post-b/">Newer</a>
        </body></html>"#,
        None,
    )
    .await;
    mount_page(
        &server,
        "/2024/06/post-b/",
        r#"<html><body><p>Tours by GoWithGuide</p></body></html>"#,
        Some(1),
    )
    .await;
    mount_page(&server, "/2024/05/post-a/", "<html></html>", Some(0)).await;
    mount_page(
        &server,
        "/category/news/",
        r#"<html><body><a href="/news/item-1">Item</a></body></html>"#,
        None,
    )
    .await;
    mount_page(
        &server,
        "/news/item-1",
        r#"<html><body><p>Nothing to see</p></body></html>"#,
        Some(1),
    )
    .await;

    let mut session =
        CrawlSession::start(&start_url(&server), CrawlMode::Standard, ScanConfig::default())
            .unwrap();

    assert_eq!(run_until_blocked(&mut session).await, Step::Paused);
    let snapshot = session.poll();
    assert_eq!(snapshot.current_category.as_deref(), Some("travel"));
    assert!(
        snapshot
            .status_tail
            .iter()
            .any(|m| m == "Found categories: travel, news")
    );

    session.next_category();
    assert_eq!(run_until_blocked(&mut session).await, Step::Finished);
    assert!(
        session
            .poll()
            .status_tail
            .iter()
            .any(|m| m == "Processing category: news")
    );
}

#[tokio::test]
async fn test_standard_mode_stops_at_page_budget() {
    let server = MockServer::start().await;
    let links: String = (0..105)
        .map(|i| format!(r#"<a href="/p{}">Page {}</a>"#, i, i))
        .collect();
    mount_page(
        &server,
        "/",
        &format!("<html><body>{}</body></html>", links),
        None,
    )
    .await;
    // the start page plus the first 99 links fill the budget of 100
    for i in 0..105 {
        let expected = if i < 99 { 1 } else { 0 };
        mount_page(
            &server,
            &format!("/p{}", i),
            "<html><body></body></html>",
            Some(expected),
        )
        .await;
    }

    let mut session =
        CrawlSession::start(&start_url(&server), CrawlMode::Standard, ScanConfig::default())
            .unwrap();

    assert_eq!(run_until_blocked(&mut session).await, Step::Finished);
    let snapshot = session.poll();
    assert_eq!(snapshot.pages_crawled, 100);
    assert_eq!(snapshot.fetch_attempts, 100);
    assert!(
        snapshot
            .status_tail
            .iter()
            .any(|m| m == "Page budget of 100 reached")
    );
    assert!(
        !snapshot
            .status_tail
            .iter()
            .any(|m| m == "No categories found.")
    );
}

#[tokio::test]
async fn test_stop_policy_halts_on_first_match() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body>
            <p>Booked through go-with-guide</p>
            <a href="/other">Other</a>
        </body></html>"#,
        None,
    )
    .await;
    mount_page(&server, "/other", "<html></html>", Some(0)).await;

    let summary = execute_crawl(
        options(&server, CrawlMode::Standard, OnMatch::Stop),
        None,
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.state, SessionState::Stopped);
    assert_eq!(summary.pages_crawled, 1);
    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.records[0].keyword, "go-with-guide");
}

#[tokio::test]
async fn test_continue_policy_scans_every_page() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body>
            <p>gowithguide</p>
            <a href="/second">Second</a>
        </body></html>"#,
        None,
    )
    .await;
    mount_page(
        &server,
        "/second",
        r#"<html><body><p>87121</p></body></html>"#,
        Some(1),
    )
    .await;

    let summary = execute_crawl(
        options(&server, CrawlMode::Standard, OnMatch::ContinueCurrent),
        None,
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.state, SessionState::Finished);
    assert_eq!(summary.pages_crawled, 2);
    let keywords: Vec<&str> = summary.records.iter().map(|r| r.keyword.as_str()).collect();
    assert!(keywords.contains(&"gowithguide"));
    assert!(keywords.contains(&"87121"));
}

// ============================================================================
// Complete Mode Tests
// ============================================================================

#[tokio::test]
async fn test_complete_mode_visits_whole_site_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body>
            <a href="/a">A</a>
            <a href="/b">B</a>
            <a href="http://127.0.0.1:1/elsewhere">Elsewhere</a>
        </body></html>"#,
        Some(1),
    )
    .await;
    mount_page(
        &server,
        "/a",
        r#"<html><body><a href="/c">C</a><a href="/">Home</a></body></html>"#,
        Some(1),
    )
    .await;
    mount_page(
        &server,
        "/b",
        r#"<html><body><a href="/a">A again</a></body></html>"#,
        Some(1),
    )
    .await;
    mount_page(&server, "/c", "<html><body></body></html>", Some(1)).await;

    let progress_calls = Arc::new(AtomicUsize::new(0));
    let counter = progress_calls.clone();
    let callback: CrawlProgressCallback = Arc::new(move |_snapshot: &SessionSnapshot| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let summary = execute_crawl(
        options(&server, CrawlMode::Complete, OnMatch::Stop),
        Some(callback),
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.state, SessionState::Finished);
    assert_eq!(summary.pages_crawled, 4);
    assert!(summary.records.is_empty());
    assert_eq!(progress_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_complete_mode_does_not_pause_on_matches() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><p>gowithguide</p><a href="/next">Next</a></body></html>"#,
        None,
    )
    .await;
    mount_page(
        &server,
        "/next",
        r#"<html><body><p>go with guide</p></body></html>"#,
        Some(1),
    )
    .await;

    let mut session =
        CrawlSession::start(&start_url(&server), CrawlMode::Complete, ScanConfig::default())
            .unwrap();

    assert_eq!(run_until_blocked(&mut session).await, Step::Finished);
    assert_eq!(session.results().len(), 2);

    // resume actions are ignored outside Standard mode
    session.continue_current();
    assert_eq!(session.state(), SessionState::Finished);
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[tokio::test]
async fn test_cancelled_token_stops_before_any_fetch() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<html></html>", Some(0)).await;

    let token = CancellationToken::new();
    token.cancel();

    let summary = execute_crawl(
        options(&server, CrawlMode::Complete, OnMatch::Stop),
        None,
        Some(token),
    )
    .await
    .unwrap();

    assert_eq!(summary.state, SessionState::Stopped);
    assert_eq!(summary.pages_crawled, 0);
    assert!(summary.status.iter().any(|m| m == "Crawl stopped"));
}

#[tokio::test]
async fn test_stop_between_steps() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/a">A</a></body></html>"#,
        None,
    )
    .await;
    mount_page(&server, "/a", "<html></html>", Some(0)).await;

    let mut session =
        CrawlSession::start(&start_url(&server), CrawlMode::Complete, ScanConfig::default())
            .unwrap();

    assert_eq!(session.advance().await, Step::Progressed);
    session.stop();
    assert_eq!(session.advance().await, Step::Stopped);
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.crawler().fetch_attempts(), 1);
}
