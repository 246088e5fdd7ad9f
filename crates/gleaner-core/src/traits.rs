use std::future::Future;

use crate::error::AppError;
use crate::models::Record;
use crate::template::SelectorMap;

/// Fetches the raw HTML body of a page.
///
/// Implementations map transport failures and non-success statuses to
/// [`AppError::FetchFailed`], and bodies that cannot be HTML to
/// [`AppError::ParseFailed`]. They must not retry; retries are the
/// orchestrator's decision.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns a fetched HTML body into records using a template's selectors.
pub trait Extractor: Send + Sync + Clone {
    /// Checks that every selector in `selectors` is usable, before anything is fetched.
    ///
    /// Rejections are [`AppError::InvalidTemplate`].
    fn validate(&self, selectors: &SelectorMap) -> Result<(), AppError> {
        let _ = selectors;
        Ok(())
    }

    /// Parses `html` and returns one record per element matching the item selector.
    fn extract(&self, html: &str, selectors: &SelectorMap) -> Result<Vec<Record>, AppError>;
}
