use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::AppError;

/// One extracted item: field label → trimmed text (empty if the field was absent).
pub type Record = BTreeMap<String, String>;

/// Outcome of scraping a single template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TemplateOutcome {
    Records { records: Vec<Record> },
    Failed { error: AppError },
}

/// Result for one input template, identified by its input position and URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateResult {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// URL as given in the template; empty if it had none.
    pub url: String,
    #[serde(flatten)]
    pub outcome: TemplateOutcome,
}

impl TemplateResult {
    pub fn records(index: usize, name: Option<String>, url: String, records: Vec<Record>) -> Self {
        Self {
            index,
            name,
            url,
            outcome: TemplateOutcome::Records { records },
        }
    }

    pub fn failed(index: usize, name: Option<String>, url: String, error: AppError) -> Self {
        Self {
            index,
            name,
            url,
            outcome: TemplateOutcome::Failed { error },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TemplateOutcome::Records { .. })
    }

    /// Extracted records, or `None` if the template failed.
    pub fn extracted(&self) -> Option<&[Record]> {
        match &self.outcome {
            TemplateOutcome::Records { records } => Some(records),
            TemplateOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&AppError> {
        match &self.outcome {
            TemplateOutcome::Records { .. } => None,
            TemplateOutcome::Failed { error } => Some(error),
        }
    }
}

/// Results of a whole batch, in the same order as the input templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BatchResult {
    results: Vec<TemplateResult>,
}

impl BatchResult {
    /// Wraps results that are already in input order.
    pub fn new(results: Vec<TemplateResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TemplateResult> {
        self.results.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TemplateResult> {
        self.results.iter()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn into_results(self) -> Vec<TemplateResult> {
        self.results
    }
}

impl<'a> IntoIterator for &'a BatchResult {
    type Item = &'a TemplateResult;
    type IntoIter = std::slice::Iter<'a, TemplateResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
