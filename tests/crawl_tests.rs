//! Integration tests for the crawl engine
//!
//! These tests use wiremock to stand up mock sites and exercise the full
//! path: classification, strategy traversal, dedup, and the operation
//! lifecycle through the coordinator.

use orb_weaver::config::Config;
use orb_weaver::crawler::Coordinator;
use orb_weaver::state::{CrawlTarget, OperationState, TargetKind};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> Config {
    let mut config = Config::default();
    // Keep failures fast: no backoff rounds in tests that use error pages
    config.crawler.max_attempts = 1;
    config
}

/// An HTML page with a title, links, and enough text to pass validation
fn page(title: &str, links: &[String]) -> String {
    let anchors: String = links
        .iter()
        .map(|l| format!(r#"<a href="{}">{}</a>"#, l, l))
        .collect();
    format!(
        r#"<html><head><title>{}</title></head><body>
        {}
        <p>{}</p>
        </body></html>"#,
        title,
        anchors,
        "body text long enough to satisfy content validation ".repeat(3)
    )
}

async fn mount_page(server: &MockServer, route: &str, title: &str, links: &[String]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(page(title, links)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_recursive_triangle_site() {
    let server = MockServer::start().await;
    let base = server.uri();

    // A links to B and C, B links to A and C, C links to A and B
    mount_page(
        &server,
        "/a",
        "Page A",
        &[format!("{}/b", base), format!("{}/c", base)],
    )
    .await;
    mount_page(
        &server,
        "/b",
        "Page B",
        &[format!("{}/a", base), format!("{}/c", base)],
    )
    .await;
    mount_page(
        &server,
        "/c",
        "Page C",
        &[format!("{}/a", base), format!("{}/b", base)],
    )
    .await;

    let coordinator = Coordinator::new(test_config()).expect("coordinator");
    let target = CrawlTarget::new(format!("{}/a", base))
        .with_max_depth(3)
        .with_max_urls_per_level(10);
    let (id, _records) = coordinator.start(target);

    let operation = coordinator.wait(id).await.expect("wait");

    assert_eq!(operation.state, OperationState::Completed);
    assert_eq!(operation.kind, Some(TargetKind::RecursiveSite));

    // Exactly 3 unique URLs: A at level 0, B and C at level 1, nothing new
    // at level 2
    assert_eq!(operation.records.len(), 3);
    assert_eq!(operation.succeeded(), 3);
    assert_eq!(
        operation.records.iter().filter(|r| r.level == 0).count(),
        1
    );
    assert_eq!(
        operation.records.iter().filter(|r| r.level == 1).count(),
        2
    );

    let stats = operation.dedup.expect("dedup stats");
    assert_eq!(stats.total_considered, 6);
    assert_eq!(stats.unique, 3);
    assert_eq!(stats.duplicates, 3);

    assert_eq!(operation.level_counts, vec![(0, 1), (1, 2)]);
}

#[tokio::test]
async fn test_single_page_when_depth_is_one() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/docs", "Docs", &[format!("{}/other", base)]).await;

    let coordinator = Coordinator::new(test_config()).expect("coordinator");
    let target = CrawlTarget::new(format!("{}/docs", base)).with_max_depth(1);
    let (id, _records) = coordinator.start(target);

    let operation = coordinator.wait(id).await.expect("wait");

    assert_eq!(operation.state, OperationState::Completed);
    assert_eq!(operation.kind, Some(TargetKind::SinglePage));
    assert_eq!(operation.records.len(), 1);
    assert_eq!(operation.records[0].level, 0);
    assert_eq!(operation.records[0].page.title, "Docs");
}

#[tokio::test]
async fn test_sitemap_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0"?>
            <urlset>
                <url><loc>{}/one</loc></url>
                <url><loc>{}/two</loc></url>
                <url><loc>{}/one</loc></url>
            </urlset>"#,
            base, base, base
        )))
        .mount(&server)
        .await;
    mount_page(&server, "/one", "One", &[]).await;
    mount_page(&server, "/two", "Two", &[]).await;

    let coordinator = Coordinator::new(test_config()).expect("coordinator");
    let target = CrawlTarget::new(format!("{}/sitemap.xml", base));
    let (id, _records) = coordinator.start(target);

    let operation = coordinator.wait(id).await.expect("wait");

    assert_eq!(operation.state, OperationState::Completed);
    assert_eq!(operation.kind, Some(TargetKind::Sitemap));

    // The duplicate <loc> is claimed once
    assert_eq!(operation.records.len(), 2);
    assert!(operation.records.iter().all(|r| r.level == 0));
    assert_eq!(operation.succeeded(), 2);
}

#[tokio::test]
async fn test_link_collection_by_name() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/llms.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "Documentation index for the project:\n{}/guide\n{}/api\n",
            base, base
        )))
        .mount(&server)
        .await;
    mount_page(&server, "/guide", "Guide", &[]).await;
    mount_page(&server, "/api", "API", &[]).await;

    let coordinator = Coordinator::new(test_config()).expect("coordinator");
    let target = CrawlTarget::new(format!("{}/llms.txt", base));
    let (id, _records) = coordinator.start(target);

    let operation = coordinator.wait(id).await.expect("wait");

    assert_eq!(operation.state, OperationState::Completed);
    assert_eq!(operation.kind, Some(TargetKind::LinkCollection));

    // The collection file is the level-0 record, its links are level 1
    assert_eq!(operation.records.len(), 3);
    assert_eq!(
        operation.records.iter().filter(|r| r.level == 0).count(),
        1
    );
    assert_eq!(
        operation.records.iter().filter(|r| r.level == 1).count(),
        2
    );
}

#[tokio::test]
async fn test_density_classified_collection_reuses_prefetch() {
    let server = MockServer::start().await;
    let base = server.uri();

    // An unknown .md file that is mostly links: the classifier fetches it
    // once to measure density and must not fetch it again
    Mock::given(method("GET"))
        .and(path("/index.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "{}/p1\n{}/p2\n{}/p3\n{}/p4\n",
            base, base, base, base
        )))
        .expect(1)
        .mount(&server)
        .await;
    for route in ["/p1", "/p2", "/p3", "/p4"] {
        mount_page(&server, route, route, &[]).await;
    }

    let coordinator = Coordinator::new(test_config()).expect("coordinator");
    let target = CrawlTarget::new(format!("{}/index.md", base));
    let (id, _records) = coordinator.start(target);

    let operation = coordinator.wait(id).await.expect("wait");

    assert_eq!(operation.state, OperationState::Completed);
    assert_eq!(operation.kind, Some(TargetKind::LinkCollection));
    assert_eq!(operation.records.len(), 5);
    assert_eq!(operation.succeeded(), 5);
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        "Root",
        &[format!("{}/ok", base), format!("{}/missing", base)],
    )
    .await;
    mount_page(&server, "/ok", "OK", &[]).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(test_config()).expect("coordinator");
    let target = CrawlTarget::new(format!("{}/", base)).with_max_depth(2);
    let (id, _records) = coordinator.start(target);

    let operation = coordinator.wait(id).await.expect("wait");

    // One dead link never aborts the operation
    assert_eq!(operation.state, OperationState::Completed);
    assert_eq!(operation.records.len(), 3);
    assert_eq!(operation.succeeded(), 2);

    let failed: Vec<_> = operation
        .records
        .iter()
        .filter(|r| !r.page.success)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].page.url.ends_with("/missing"));
    assert!(failed[0].page.error.is_some());
}

#[tokio::test]
async fn test_unreachable_seed_fails_operation() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(test_config()).expect("coordinator");
    let target = CrawlTarget::new(format!("{}/", base)).with_max_depth(2);
    let (id, _records) = coordinator.start(target);

    let operation = coordinator.wait(id).await.expect("wait");

    assert_eq!(operation.state, OperationState::Failed);
    let error = operation.error.expect("summary error");
    assert!(error.contains("unreachable"), "unexpected error: {}", error);
}

#[tokio::test]
async fn test_exclude_patterns_skip_urls() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        "Root",
        &[format!("{}/docs", base), format!("{}/login", base)],
    )
    .await;
    mount_page(&server, "/docs", "Docs", &[]).await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("Login", &[])))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(test_config()).expect("coordinator");
    let target = CrawlTarget::new(format!("{}/", base))
        .with_max_depth(2)
        .with_exclude_patterns(vec!["/login".to_string()]);
    let (id, _records) = coordinator.start(target);

    let operation = coordinator.wait(id).await.expect("wait");

    assert_eq!(operation.state, OperationState::Completed);
    assert_eq!(operation.records.len(), 2);
}

#[tokio::test]
async fn test_record_stream_delivers_results() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/solo", "Solo", &[]).await;

    let coordinator = Coordinator::new(test_config()).expect("coordinator");
    let target = CrawlTarget::new(format!("{}/solo", base)).with_max_depth(1);
    let (id, mut records) = coordinator.start(target);

    let record = records.recv().await.expect("streamed record");
    assert_eq!(record.level, 0);
    assert!(record.page.success);
    assert_eq!(record.page.title, "Solo");

    let operation = coordinator.wait(id).await.expect("wait");
    assert_eq!(operation.state, OperationState::Completed);
}
