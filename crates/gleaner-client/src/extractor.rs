use gleaner_core::error::AppError;
use gleaner_core::models::Record;
use gleaner_core::template::{ITEM_LABEL, SelectorMap};
use gleaner_core::traits::Extractor;
use scraper::Selector;

use crate::document::{Document, compile_selector, text};

/// Compiled form of a [`SelectorMap`].
struct CompiledSelectors<'m> {
    item: Selector,
    fields: Vec<(&'m str, Selector)>,
}

impl<'m> CompiledSelectors<'m> {
    fn compile(selectors: &'m SelectorMap) -> Result<Self, AppError> {
        let item = compile_selector(ITEM_LABEL, &selectors.item_selector)?;
        let mut fields = Vec::with_capacity(selectors.fields.len());
        for (label, css) in &selectors.fields {
            fields.push((label.as_str(), compile_selector(label, css)?));
        }
        Ok(Self { item, fields })
    }
}

/// Extract one record per element matching the item selector, in document order.
///
/// Each field takes the trimmed text of the first descendant of the item that
/// matches its selector, or `""` when no descendant matches. Selectors the CSS
/// engine rejects fail with [`AppError::InvalidTemplate`].
pub fn extract_items(document: &Document, selectors: &SelectorMap) -> Result<Vec<Record>, AppError> {
    let compiled = CompiledSelectors::compile(selectors)?;

    let records: Vec<Record> = document
        .select(&compiled.item)
        .map(|element| {
            compiled
                .fields
                .iter()
                .map(|(label, selector)| {
                    let value = element.select(selector).next().map(text).unwrap_or_default();
                    (label.to_string(), value)
                })
                .collect::<Record>()
        })
        .collect();

    Ok(records)
}

/// [`Extractor`] backed by CSS selectors (`scraper`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CssExtractor;

impl CssExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for CssExtractor {
    /// Compiles every selector so malformed CSS is caught before the page is fetched.
    fn validate(&self, selectors: &SelectorMap) -> Result<(), AppError> {
        CompiledSelectors::compile(selectors).map(|_| ())
    }

    fn extract(&self, html: &str, selectors: &SelectorMap) -> Result<Vec<Record>, AppError> {
        let document = Document::parse(html)?;
        extract_items(&document, selectors)
    }
}
