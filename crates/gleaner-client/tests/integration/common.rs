use std::time::Duration;

use gleaner_client::{CssExtractor, FetchOptions, ReqwestFetcher};
use gleaner_core::{BatchConfig, BatchService, RawTemplate, Record};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Two events; the second one has no date.
pub const EVENTS_HTML: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <ul class="events">
      <li class="item"><h3 class="title">A</h3><time class="date">2024-01-01</time></li>
      <li class="item"><h3 class="title">B</h3></li>
    </ul>
  </body>
</html>"#;

/// Serve `html` as `text/html` at `route`, optionally after a delay.
pub async fn serve_page(server: &MockServer, route: &str, html: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html.to_string(), "text/html; charset=utf-8")
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Compound-key template for [`EVENTS_HTML`].
pub fn events_template(url: &str) -> RawTemplate {
    RawTemplate::new(url)
        .with_entry("selector event", ".item")
        .with_entry("selector title", ".title")
        .with_entry("selector date", ".date")
}

pub fn fetcher(timeout: Duration) -> ReqwestFetcher {
    ReqwestFetcher::with_options(FetchOptions::default().with_timeout(timeout))
        .expect("Failed to build fetcher")
}

pub fn batch_service(config: BatchConfig) -> BatchService<ReqwestFetcher, CssExtractor> {
    BatchService::with_config(fetcher(Duration::from_secs(5)), CssExtractor::new(), config)
}

pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A URL on localhost where nothing is listening.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read address");
    drop(listener);
    format!("http://{addr}/events")
}
