use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{BatchConfig, RetryPolicy};
use crate::error::AppError;
use crate::models::{BatchResult, Record, TemplateResult};
use crate::template::{RawTemplate, Template};
use crate::traits::{Extractor, Fetcher};

/// Events emitted while a batch runs, for monitoring/logging.
#[derive(Debug, Clone)]
pub enum BatchEvent<'a> {
    Started {
        templates: usize,
    },
    TemplateCompleted {
        index: usize,
        url: &'a str,
        records: usize,
    },
    TemplateFailed {
        index: usize,
        url: &'a str,
        error: &'a AppError,
    },
    Finished {
        succeeded: usize,
        failed: usize,
    },
}

/// Trait for receiving batch events (decoupled logging).
pub trait BatchReporter: Send + Sync {
    fn report(&self, event: BatchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBatchReporter;

impl BatchReporter for TracingBatchReporter {
    fn report(&self, event: BatchEvent<'_>) {
        match event {
            BatchEvent::Started { templates } => {
                tracing::info!(%templates, "Batch started");
            }
            BatchEvent::TemplateCompleted {
                index,
                url,
                records,
            } => {
                tracing::info!(%index, %url, %records, "Template completed");
            }
            BatchEvent::TemplateFailed { index, url, error } => {
                tracing::warn!(%index, %url, kind = error.kind(), %error, "Template failed");
            }
            BatchEvent::Finished { succeeded, failed } => {
                tracing::info!(%succeeded, %failed, "Batch finished");
            }
        }
    }
}

/// Runs many templates concurrently: validate → fetch → extract, per template.
///
/// Generic over the fetcher and extractor so the pipeline can be exercised
/// without real HTTP. Each template runs in its own task; one template's
/// failure is recorded in its [`TemplateResult`] and never affects the others.
pub struct BatchService<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    fetcher: F,
    extractor: E,
    config: BatchConfig,
}

impl<F, E> BatchService<F, E>
where
    F: Fetcher + 'static,
    E: Extractor + 'static,
{
    pub fn new(fetcher: F, extractor: E) -> Self {
        Self::with_config(fetcher, extractor, BatchConfig::default())
    }

    pub fn with_config(fetcher: F, extractor: E, config: BatchConfig) -> Self {
        Self {
            fetcher,
            extractor,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Scrape every template and return one result per template, in input order.
    pub async fn scrape_templates<I>(&self, templates: I) -> BatchResult
    where
        I: IntoIterator<Item = RawTemplate>,
    {
        self.scrape_templates_with_reporter(templates, &TracingBatchReporter)
            .await
    }

    /// Like [`scrape_templates`](Self::scrape_templates), reporting progress to `reporter`.
    pub async fn scrape_templates_with_reporter<I, R>(&self, templates: I, reporter: &R) -> BatchResult
    where
        I: IntoIterator<Item = RawTemplate>,
        R: BatchReporter,
    {
        let templates: Vec<RawTemplate> = templates.into_iter().collect();
        reporter.report(BatchEvent::Started {
            templates: templates.len(),
        });

        let semaphore = (self.config.max_concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.config.max_concurrency)));

        // Identity of each input, kept outside the tasks so a panicked task
        // still gets a result at its position.
        let mut identities = Vec::with_capacity(templates.len());
        let mut tasks = JoinSet::new();

        for (index, raw) in templates.into_iter().enumerate() {
            identities.push((raw.name.clone(), raw.url.clone().unwrap_or_default()));

            let pipeline = TemplatePipeline {
                fetcher: self.fetcher.clone(),
                extractor: self.extractor.clone(),
                retry: self.config.retry.clone(),
                template_timeout: self.config.template_timeout,
            };
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => Some(semaphore.acquire_owned().await),
                    None => None,
                };
                (index, pipeline.run(index, raw).await)
            });
        }

        let mut slots: Vec<Option<TemplateResult>> = vec![None; identities.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    report_result(reporter, &result);
                    slots[index] = Some(result);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Template task did not complete");
                }
            }
        }

        let results: Vec<TemplateResult> = slots
            .into_iter()
            .zip(identities)
            .enumerate()
            .map(|(index, (slot, (name, url)))| {
                slot.unwrap_or_else(|| {
                    let result = TemplateResult::failed(
                        index,
                        name,
                        url,
                        AppError::Internal {
                            reason: "template task panicked".to_string(),
                        },
                    );
                    report_result(reporter, &result);
                    result
                })
            })
            .collect();

        let batch = BatchResult::new(results);
        reporter.report(BatchEvent::Finished {
            succeeded: batch.succeeded(),
            failed: batch.failed(),
        });
        batch
    }
}

fn report_result<R: BatchReporter>(reporter: &R, result: &TemplateResult) {
    match (result.extracted(), result.error()) {
        (Some(records), _) => reporter.report(BatchEvent::TemplateCompleted {
            index: result.index,
            url: &result.url,
            records: records.len(),
        }),
        (None, Some(error)) => reporter.report(BatchEvent::TemplateFailed {
            index: result.index,
            url: &result.url,
            error,
        }),
        (None, None) => {}
    }
}

/// Everything one template task needs, owned by that task.
struct TemplatePipeline<F, E> {
    fetcher: F,
    extractor: E,
    retry: RetryPolicy,
    template_timeout: Option<std::time::Duration>,
}

impl<F: Fetcher, E: Extractor> TemplatePipeline<F, E> {
    async fn run(self, index: usize, raw: RawTemplate) -> TemplateResult {
        let name = raw.name.clone();
        let url = raw.url.clone().unwrap_or_default();

        match self.scrape(raw).await {
            Ok(records) => TemplateResult::records(index, name, url, records),
            Err(error) => TemplateResult::failed(index, name, url, error),
        }
    }

    async fn scrape(&self, raw: RawTemplate) -> Result<Vec<Record>, AppError> {
        let template = Template::from_raw(raw)?;
        self.extractor.validate(&template.selectors)?;

        tracing::info!(url = %template.url, "Fetching");
        let html = match self.template_timeout {
            Some(limit) => tokio::time::timeout(limit, self.fetch_with_retry(&template.url))
                .await
                .map_err(|_| {
                    AppError::fetch_failed(format!("template timed out after {limit:?}"))
                })??,
            None => self.fetch_with_retry(&template.url).await?,
        };
        tracing::debug!(url = %template.url, bytes = html.len(), "Fetched");

        let records = self.extractor.extract(&html, &template.selectors)?;
        tracing::info!(url = %template.url, records = records.len(), "Extraction complete");

        Ok(records)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, AppError> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(url).await {
                Ok(html) => return Ok(html),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        %url,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Fetch failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
