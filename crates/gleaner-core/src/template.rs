//! Scraping templates and the selector map derived from them.
//!
//! A template arrives as a [`RawTemplate`], the loosely-typed shape it has in
//! the template file. Two encodings of selectors are accepted there:
//!
//! ```yaml
//! # explicit
//! url: https://example.com/events
//! item_selector: .event
//! fields:
//!   title: .title
//!   date: .date
//! ---
//! # compound keys, "<role> <label>"
//! url: https://example.com/events
//! selector event: .event
//! selector title: .title
//! ```
//!
//! Both are normalised into a [`SelectorMap`] by [`build_selector_map`], and a
//! [`Template`] is only constructed once the URL and selectors are valid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

/// Label reserved for the selector that delimits repeated items.
pub const ITEM_LABEL: &str = "event";

/// Role token marking a compound key as a selector entry.
pub const SELECTOR_ROLE: &str = "selector";

/// A template as deserialized from the template file, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_selector: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,

    /// Every other key, including compound `"selector <label>"` entries.
    #[serde(flatten)]
    pub entries: BTreeMap<String, serde_json::Value>,

    /// Set when the source document could not be read as a template at all.
    #[serde(skip)]
    pub defect: Option<String>,
}

impl RawTemplate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// A placeholder for a source document that is not a template mapping.
    pub fn defective(reason: impl Into<String>) -> Self {
        Self {
            defect: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_item_selector(mut self, selector: impl Into<String>) -> Self {
        self.item_selector = Some(selector.into());
        self
    }

    pub fn with_field(mut self, label: impl Into<String>, selector: impl Into<String>) -> Self {
        self.fields.insert(label.into(), selector.into());
        self
    }

    /// Add an untyped entry, e.g. `("selector title", ".title")`.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

/// Item selector plus the field selectors scoped within each item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorMap {
    pub item_selector: String,
    /// Field label → CSS selector. Never contains [`ITEM_LABEL`].
    pub fields: BTreeMap<String, String>,
}

impl SelectorMap {
    pub fn new(item_selector: impl Into<String>) -> Self {
        Self {
            item_selector: item_selector.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, label: impl Into<String>, selector: impl Into<String>) -> Self {
        self.fields.insert(label.into(), selector.into());
        self
    }
}

/// A validated template, ready to be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: Option<String>,
    pub url: String,
    pub selectors: SelectorMap,
}

impl Template {
    /// Validate a raw template: URL first, then selectors.
    pub fn from_raw(raw: RawTemplate) -> Result<Self, AppError> {
        if let Some(defect) = &raw.defect {
            return Err(AppError::invalid_template(defect.clone()));
        }

        let url = validate_url(raw.url.as_deref())?;
        let selectors = build_selector_map(&raw)?;

        Ok(Self {
            name: raw.name,
            url,
            selectors,
        })
    }
}

impl TryFrom<RawTemplate> for Template {
    type Error = AppError;

    fn try_from(raw: RawTemplate) -> Result<Self, Self::Error> {
        Template::from_raw(raw)
    }
}

fn validate_url(url: Option<&str>) -> Result<String, AppError> {
    let url = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::invalid_template("missing url"))?;

    let parsed =
        Url::parse(url).map_err(|e| AppError::invalid_template(format!("invalid url '{url}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(url.to_string()),
        scheme => Err(AppError::invalid_template(format!(
            "url scheme '{scheme}' is not supported (only http/https)"
        ))),
    }
}

/// Derive the item selector and field selectors of a template.
///
/// Explicit `item_selector`/`fields` entries and compound `"selector <label>"`
/// keys are merged; the label [`ITEM_LABEL`] designates the item selector.
/// Fails with [`AppError::InvalidTemplate`] if no item selector is found, a
/// label is defined twice, or a selector is empty or not a string.
pub fn build_selector_map(raw: &RawTemplate) -> Result<SelectorMap, AppError> {
    let mut item_selector = None;
    let mut fields = BTreeMap::new();

    if let Some(selector) = &raw.item_selector {
        insert_selector(ITEM_LABEL, selector, &mut item_selector, &mut fields)?;
    }

    for (label, selector) in &raw.fields {
        insert_selector(label, selector, &mut item_selector, &mut fields)?;
    }

    for (key, value) in &raw.entries {
        let Some(label) = selector_label(key)? else {
            continue;
        };
        let selector = value.as_str().ok_or_else(|| {
            AppError::invalid_template(format!("selector for '{label}' must be a string"))
        })?;
        insert_selector(label, selector, &mut item_selector, &mut fields)?;
    }

    let item_selector = item_selector.ok_or_else(|| {
        AppError::invalid_template(format!("no item selector ('{SELECTOR_ROLE} {ITEM_LABEL}')"))
    })?;

    Ok(SelectorMap {
        item_selector,
        fields,
    })
}

/// Label of a compound selector key, `None` for keys of any other role.
fn selector_label(key: &str) -> Result<Option<&str>, AppError> {
    let mut tokens = key.split_whitespace();
    if tokens.next() != Some(SELECTOR_ROLE) {
        return Ok(None);
    }

    let label = tokens
        .next()
        .ok_or_else(|| AppError::invalid_template(format!("selector key '{key}' has no label")))?;

    if tokens.next().is_some() {
        return Err(AppError::invalid_template(format!(
            "selector key '{key}' must be '{SELECTOR_ROLE} <label>'"
        )));
    }

    Ok(Some(label))
}

fn insert_selector(
    label: &str,
    selector: &str,
    item_selector: &mut Option<String>,
    fields: &mut BTreeMap<String, String>,
) -> Result<(), AppError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(AppError::invalid_template(format!(
            "selector for '{label}' is empty"
        )));
    }

    let duplicate = if label == ITEM_LABEL {
        item_selector.replace(selector.to_string()).is_some()
    } else {
        fields
            .insert(label.to_string(), selector.to_string())
            .is_some()
    };

    if duplicate {
        return Err(AppError::invalid_template(format!(
            "selector for '{label}' is defined more than once"
        )));
    }
    Ok(())
}
