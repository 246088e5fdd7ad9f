//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::batch::{BatchEvent, BatchReporter};
use crate::error::AppError;
use crate::models::Record;
use crate::template::SelectorMap;
use crate::traits::{Extractor, Fetcher};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct MockPage {
    /// Each call pops the first response; the last one is repeated forever.
    responses: Vec<Result<String, AppError>>,
    delay: Duration,
}

/// Mock fetcher serving configurable responses per URL.
///
/// Unknown URLs fail with a connection error, like an unreachable host.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<Mutex<HashMap<String, MockPage>>>,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_delayed_page(url, html, Duration::ZERO)
    }

    pub fn with_delayed_page(self, url: &str, html: &str, delay: Duration) -> Self {
        self.insert(url, vec![Ok(html.to_string())], delay)
    }

    pub fn with_error(self, url: &str, error: AppError) -> Self {
        self.insert(url, vec![Err(error)], Duration::ZERO)
    }

    pub fn with_responses(self, url: &str, responses: Vec<Result<String, AppError>>) -> Self {
        self.insert(url, responses, Duration::ZERO)
    }

    fn insert(self, url: &str, responses: Vec<Result<String, AppError>>, delay: Duration) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), MockPage { responses, delay });
        self
    }

    /// Number of fetches issued for `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of fetches that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Fetches currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &str) -> (Result<String, AppError>, Duration) {
        self.calls.lock().unwrap().push(url.to_string());

        let mut pages = self.pages.lock().unwrap();
        match pages.get_mut(url) {
            Some(page) if page.responses.len() > 1 => (page.responses.remove(0), page.delay),
            Some(page) => match page.responses.first() {
                Some(response) => (response.clone(), page.delay),
                None => (Ok(String::new()), page.delay),
            },
            None => (
                Err(AppError::fetch_failed(format!(
                    "Connection failed: {url} is unreachable"
                ))),
                Duration::ZERO,
            ),
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let (response, delay) = self.next_response(url);

        let _in_flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        response
    }
}

/// Counts one running fetch until dropped, so cancelled fetches are released too.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that echoes the fetched HTML back as a single record.
#[derive(Clone, Default)]
pub struct MockExtractor {
    error: Option<AppError>,
    rejection: Option<AppError>,
}

impl MockExtractor {
    /// Creates an extractor returning `[{"html": <body>}]`.
    pub fn echo() -> Self {
        Self::default()
    }

    /// Creates an extractor that always fails with `error`.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Creates an extractor whose `validate` always fails with `error`.
    pub fn rejecting(error: AppError) -> Self {
        Self {
            rejection: Some(error),
            ..Self::default()
        }
    }
}

impl Extractor for MockExtractor {
    fn validate(&self, _selectors: &SelectorMap) -> Result<(), AppError> {
        match &self.rejection {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn extract(&self, html: &str, _selectors: &SelectorMap) -> Result<Vec<Record>, AppError> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        let mut record = Record::new();
        record.insert("html".to_string(), html.to_string());
        Ok(vec![record])
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records every event as a compact string.
///
/// Formats: `started:<n>`, `completed:<index>:<records>`,
/// `failed:<index>:<kind>`, `finished:<succeeded>:<failed>`.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Indices of successful templates, in the order they completed.
    pub fn completed_indices(&self) -> Vec<usize> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix("completed:"))
            .filter_map(|rest| rest.split(':').next()?.parse().ok())
            .collect()
    }
}

impl BatchReporter for RecordingReporter {
    fn report(&self, event: BatchEvent<'_>) {
        let line = match event {
            BatchEvent::Started { templates } => format!("started:{templates}"),
            BatchEvent::TemplateCompleted { index, records, .. } => {
                format!("completed:{index}:{records}")
            }
            BatchEvent::TemplateFailed { index, error, .. } => {
                format!("failed:{index}:{}", error.kind())
            }
            BatchEvent::Finished { succeeded, failed } => {
                format!("finished:{succeeded}:{failed}")
            }
        };
        self.events.lock().unwrap().push(line);
    }
}
