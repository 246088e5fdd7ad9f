use std::time::Duration;

use gleaner_core::error::AppError;
use gleaner_core::traits::Fetcher;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

/// User-Agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("gleaner/", env!("CARGO_PKG_VERSION"));

/// Options for [`ReqwestFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    /// Per-request timeout covering connect, response and body.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl FetchOptions {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP fetcher using reqwest.
///
/// Downloads raw HTML with a configurable User-Agent and timeout. Clones
/// share one connection pool; a request's connection goes back to the pool
/// (or is closed) as soon as its response is read or dropped, whether the
/// fetch succeeded or not.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_options(FetchOptions::default())
    }

    pub fn with_options(options: FetchOptions) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(options.timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout: options.timeout,
        })
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::fetch_failed(format!(
                    "Request to {url} timed out after {:?}",
                    self.timeout
                ))
            } else if e.is_connect() {
                AppError::fetch_failed(format!("Connection failed: {e}"))
            } else {
                AppError::fetch_failed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "Non-success status");
            return Err(AppError::http_status(status.as_u16(), url));
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            && !is_markup(content_type)
        {
            return Err(AppError::parse_failed(format!(
                "{url} returned non-HTML content type '{content_type}'"
            )));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::fetch_failed(format!(
                    "Reading body of {url} timed out after {:?}",
                    self.timeout
                ))
            } else {
                AppError::fetch_failed(format!("Failed to read response body: {e}"))
            }
        })?;

        tracing::debug!(%url, status = status.as_u16(), bytes = body.len(), "Fetched");
        Ok(body)
    }
}

/// Whether a `Content-Type` can hold an HTML document.
fn is_markup(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("text/") || mime.contains("html") || mime.contains("xml")
}
