use std::time::Duration;

use gleaner_client::{FetchOptions, ReqwestFetcher};
use gleaner_core::{AppError, Fetcher};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::integration::common::{EVENTS_HTML, fetcher, serve_page, unreachable_url};

#[tokio::test]
async fn fetch_returns_body() {
    let server = MockServer::start().await;
    serve_page(&server, "/events", EVENTS_HTML, Duration::ZERO).await;

    let html = fetcher(Duration::from_secs(5))
        .fetch(&format!("{}/events", server.uri()))
        .await
        .unwrap();

    assert_eq!(html, EVENTS_HTML);
}

#[tokio::test]
async fn fetch_sends_configured_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(header("user-agent", "gleaner-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(EVENTS_HTML, "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher =
        ReqwestFetcher::with_options(FetchOptions::default().with_user_agent("gleaner-test/1.0"))
            .unwrap();
    let result = fetcher.fetch(&format!("{}/events", server.uri())).await;

    assert!(result.is_ok(), "unexpected error: {:?}", result.err());
}

#[tokio::test]
async fn non_success_status_carries_status_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = fetcher(Duration::from_secs(5));

    let err = fetcher
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::FetchFailed { status: Some(404), .. }));
    assert!(!err.is_retryable());

    let err = fetcher
        .fetch(&format!("{}/broken", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::FetchFailed { status: Some(503), .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn non_html_content_type_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"))
        .mount(&server)
        .await;

    let err = fetcher(Duration::from_secs(5))
        .fetch(&format!("{}/logo.png", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ParseFailed { .. }));
}

#[tokio::test]
async fn connection_refused_is_fetch_failure() {
    let err = fetcher(Duration::from_secs(5))
        .fetch(&unreachable_url().await)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::FetchFailed { status: None, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    serve_page(&server, "/slow", EVENTS_HTML, Duration::from_secs(3)).await;

    let err = fetcher(Duration::from_millis(200))
        .fetch(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::FetchFailed { status: None, .. }));
    assert!(err.to_string().contains("timed out"), "{err}");
}
