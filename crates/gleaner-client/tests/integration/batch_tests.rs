use std::time::Duration;

use gleaner_client::CssExtractor;
use gleaner_core::testutil::{MockFetcher, RecordingReporter};
use gleaner_core::{AppError, BatchConfig, BatchService, RawTemplate, RetryPolicy, load_templates};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::integration::common::{
    EVENTS_HTML, batch_service, events_template, record, serve_page, unreachable_url,
};

#[tokio::test]
async fn events_template_yields_expected_records() {
    let fetcher = MockFetcher::new().with_page("http://example.test/events", EVENTS_HTML);
    let svc = BatchService::new(fetcher, CssExtractor::new());

    let batch = svc
        .scrape_templates(vec![events_template("http://example.test/events")])
        .await;

    assert_eq!(
        batch.get(0).unwrap().extracted().unwrap(),
        &[
            record(&[("title", "A"), ("date", "2024-01-01")]),
            record(&[("title", "B"), ("date", "")]),
        ]
    );
}

#[tokio::test]
async fn malformed_selector_is_rejected_before_fetching() {
    let fetcher = MockFetcher::new().with_page("http://a.test/", EVENTS_HTML);
    let svc = BatchService::new(fetcher.clone(), CssExtractor::new());
    let template = RawTemplate::new("http://a.test/")
        .with_entry("selector event", ".item")
        .with_entry("selector date", "span[");

    let batch = svc.scrape_templates(vec![template]).await;

    let err = batch.get(0).unwrap().error().unwrap();
    assert!(matches!(err, AppError::InvalidTemplate { .. }));
    assert!(err.to_string().contains("date"));
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test]
async fn malformed_selector_sends_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(0)
        .mount(&server)
        .await;

    let config = BatchConfig::default()
        .with_retry(RetryPolicy::new(2).with_base_delay(Duration::from_millis(1)));
    let template = RawTemplate::new(format!("{}/events", server.uri()))
        .with_entry("selector event", "li[");
    let batch = batch_service(config).scrape_templates(vec![template]).await;

    assert!(matches!(
        batch.get(0).unwrap().error(),
        Some(AppError::InvalidTemplate { .. })
    ));
    server.verify().await;
}

#[tokio::test]
async fn scrapes_over_http_end_to_end() {
    let server = MockServer::start().await;
    serve_page(&server, "/events", EVENTS_HTML, Duration::ZERO).await;

    let batch = batch_service(BatchConfig::default())
        .scrape_templates(vec![events_template(&format!("{}/events", server.uri()))])
        .await;

    let records = batch.get(0).unwrap().extracted().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["title"], "A");
    assert_eq!(records[1]["date"], "");
}

#[tokio::test]
async fn unreachable_template_does_not_block_valid_one() {
    let server = MockServer::start().await;
    serve_page(&server, "/events", EVENTS_HTML, Duration::ZERO).await;

    let batch = batch_service(BatchConfig::default())
        .scrape_templates(vec![
            events_template(&unreachable_url().await),
            events_template(&format!("{}/events", server.uri())),
        ])
        .await;

    assert!(matches!(
        batch.get(0).unwrap().error(),
        Some(AppError::FetchFailed { status: None, .. })
    ));
    assert_eq!(batch.get(1).unwrap().extracted().unwrap().len(), 2);
}

#[tokio::test]
async fn output_order_ignores_response_latency() {
    let server = MockServer::start().await;
    let count = 4;
    let mut templates = Vec::new();
    for i in 0..count {
        let route = format!("/page{i}");
        let html = format!(r#"<div class="item"><h3 class="title">page {i}</h3></div>"#);
        // Earlier inputs answer later.
        let delay = Duration::from_millis(60 * (count - i) as u64);
        serve_page(&server, &route, &html, delay).await;
        templates.push(events_template(&format!("{}{route}", server.uri())));
    }

    let reporter = RecordingReporter::default();
    let batch = batch_service(BatchConfig::default())
        .scrape_templates_with_reporter(templates, &reporter)
        .await;

    for (i, result) in batch.iter().enumerate() {
        assert_eq!(result.index, i);
        assert_eq!(result.extracted().unwrap()[0]["title"], format!("page {i}"));
    }
    assert_eq!(reporter.completed_indices(), vec![3, 2, 1, 0]);
}

#[tokio::test]
async fn mixed_failures_are_reported_per_template() {
    let server = MockServer::start().await;
    serve_page(&server, "/events", EVENTS_HTML, Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&server)
        .await;

    let templates = vec![
        events_template(&format!("{}/events", server.uri())),
        events_template(&format!("{}/gone", server.uri())),
        events_template(&format!("{}/feed.json", server.uri())),
        RawTemplate::new(format!("{}/events", server.uri())).with_entry("selector title", ".title"),
    ];

    let batch = batch_service(BatchConfig::default())
        .scrape_templates(templates)
        .await;

    let kinds: Vec<&str> = batch
        .iter()
        .map(|r| r.error().map(AppError::kind).unwrap_or("ok"))
        .collect();
    assert_eq!(kinds, vec!["ok", "fetch_failed", "parse_failed", "invalid_template"]);
    assert!(matches!(
        batch.get(1).unwrap().error(),
        Some(AppError::FetchFailed { status: Some(410), .. })
    ));
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let server = MockServer::start().await;
    serve_page(&server, "/events", EVENTS_HTML, Duration::ZERO).await;

    let content = format!(
        "url: {uri}/events\nselector event: .item\nselector title: .title\nselector date: .date\n---\nurl: {uri}/missing\nselector event: .item\n",
        uri = server.uri()
    );
    let templates = load_templates(&content).unwrap();
    let svc = batch_service(BatchConfig::default());

    let first = svc.scrape_templates(templates.clone()).await;
    let second = svc.scrape_templates(templates).await;

    assert_eq!(first, second);
    assert_eq!(first.succeeded(), 1);
    assert_eq!(first.failed(), 1);
}
