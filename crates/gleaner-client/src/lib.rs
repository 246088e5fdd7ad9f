pub mod document;
pub mod extractor;
pub mod fetcher;

pub use document::Document;
pub use extractor::{CssExtractor, extract_items};
pub use fetcher::{DEFAULT_USER_AGENT, FetchOptions, ReqwestFetcher};
