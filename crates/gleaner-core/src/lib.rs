pub mod batch;
pub mod config;
pub mod error;
pub mod models;
pub mod source;
pub mod template;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use batch::{BatchEvent, BatchReporter, BatchService, TracingBatchReporter};
pub use config::{BatchConfig, RetryPolicy};
pub use error::AppError;
pub use models::{BatchResult, Record, TemplateOutcome, TemplateResult};
pub use source::{load_templates, load_templates_from_path};
pub use template::{ITEM_LABEL, RawTemplate, SelectorMap, Template, build_selector_map};
pub use traits::{Extractor, Fetcher};
