//! HTTP adapters — polite fetcher, content analyzer, HTML cleaner, LLM
//! match client, and the site extractors.

pub mod analyzer;
pub mod cleaner;
pub mod extract;
pub mod fetcher;
pub mod llm;
pub mod robots;

pub use analyzer::Analyzer;
pub use cleaner::HtmdCleaner;
pub use extract::{pick_extractor, SiteExtractor};
pub use fetcher::{FetchConfig, PoliteFetcher};
pub use llm::{GeminiClient, MatchClient, MockMatchClient};
