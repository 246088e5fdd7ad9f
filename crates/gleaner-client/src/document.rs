use gleaner_core::error::AppError;
use scraper::html::Select;
use scraper::{ElementRef, Html, Selector};

/// A parsed, queryable HTML document.
///
/// Wraps `scraper::Html`, which is not `Send`: parse and query it within one
/// synchronous scope rather than holding it across an `.await`.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse an HTML body. Fails with [`AppError::ParseFailed`] if there is nothing to parse.
    pub fn parse(body: &str) -> Result<Self, AppError> {
        if body.trim().is_empty() {
            return Err(AppError::parse_failed("response body is empty"));
        }

        Ok(Self {
            html: Html::parse_document(body),
        })
    }

    /// Elements matching `selector`, in document order.
    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> Select<'a, 'b> {
        self.html.select(selector)
    }
}

/// Compile the CSS selector for `label`.
pub fn compile_selector(label: &str, css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| {
        AppError::invalid_template(format!("invalid selector for '{label}' ({css}): {e}"))
    })
}

/// Text content of an element and all its descendants, trimmed.
pub fn text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
