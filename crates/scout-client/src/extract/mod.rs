//! Site extractors and the host-based dispatcher.
//!
//! Every extractor yields [`RawJob`]s for postings newer than `since`.
//! Only the generic extractor supports the relaxed mode; for the rest a
//! relaxed fetch is the normal fetch.

pub mod ashby;
pub mod generic;
pub mod greenhouse;
pub mod lever;
pub mod remoteok;
pub mod wwr;

use chrono::{DateTime, Utc};
use url::Url;

use scout_core::error::AppError;
use scout_core::models::{RawJob, SourceType};
use scout_core::traits::PageFetcher;

pub use ashby::AshbyExtractor;
pub use generic::GenericExtractor;
pub use greenhouse::GreenhouseExtractor;
pub use lever::LeverExtractor;
pub use remoteok::RemoteOkExtractor;
pub use wwr::WwrExtractor;

/// The extractor chosen for one source.
#[derive(Clone)]
pub enum SiteExtractor<F> {
    RemoteOk(RemoteOkExtractor<F>),
    WeWorkRemotely(WwrExtractor<F>),
    Ashby(AshbyExtractor<F>),
    Lever(LeverExtractor<F>),
    Greenhouse(GreenhouseExtractor<F>),
    Generic(GenericExtractor<F>),
}

impl<F: PageFetcher> SiteExtractor<F> {
    pub fn name(&self) -> &'static str {
        match self {
            SiteExtractor::RemoteOk(_) => "remoteok",
            SiteExtractor::WeWorkRemotely(_) => "weworkremotely",
            SiteExtractor::Ashby(_) => "ashby",
            SiteExtractor::Lever(_) => "lever",
            SiteExtractor::Greenhouse(_) => "greenhouse",
            SiteExtractor::Generic(_) => "generic",
        }
    }

    /// Whether this extractor has a relaxed mode worth retrying with.
    pub fn supports_relaxed(&self) -> bool {
        matches!(self, SiteExtractor::Generic(_))
    }

    pub async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<RawJob>, AppError> {
        match self {
            SiteExtractor::RemoteOk(e) => e.fetch_since(since).await,
            SiteExtractor::WeWorkRemotely(e) => e.fetch_since(since).await,
            SiteExtractor::Ashby(e) => e.fetch_since(since).await,
            SiteExtractor::Lever(e) => e.fetch_since(since).await,
            SiteExtractor::Greenhouse(e) => e.fetch_since(since).await,
            SiteExtractor::Generic(e) => e.fetch_since(since).await,
        }
    }

    pub async fn fetch_since_relaxed(&self, since: DateTime<Utc>) -> Result<Vec<RawJob>, AppError> {
        match self {
            SiteExtractor::Generic(e) => e.fetch_since_relaxed(since).await,
            other => other.fetch_since(since).await,
        }
    }
}

/// Pick an extractor by host substring, falling back to the generic one.
pub fn pick_extractor<F: PageFetcher>(
    fetcher: F,
    url: &str,
    _source_type: SourceType,
) -> SiteExtractor<F> {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_default();

    if host.contains("remoteok.com") {
        SiteExtractor::RemoteOk(RemoteOkExtractor::new(fetcher, None))
    } else if host.contains("weworkremotely.com") {
        SiteExtractor::WeWorkRemotely(WwrExtractor::new(fetcher))
    } else if host.contains("ashbyhq.com") {
        SiteExtractor::Ashby(AshbyExtractor::new(fetcher, url))
    } else if host.contains("lever.co") {
        SiteExtractor::Lever(LeverExtractor::new(fetcher, url))
    } else if host.contains("greenhouse.io") {
        SiteExtractor::Greenhouse(GreenhouseExtractor::new(fetcher, url))
    } else {
        SiteExtractor::Generic(GenericExtractor::new(fetcher, url))
    }
}

/// Shared guard for company-board extractors: a bare platform root is not a
/// company board and yields nothing.
fn is_platform_root(base: &str) -> bool {
    Url::parse(base)
        .map(|u| u.path().trim_matches('/').is_empty())
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::testutil::MockFetcher;

    #[test]
    fn dispatches_on_host_substring() {
        let f = MockFetcher::new();
        let cases = [
            ("https://remoteok.com/api", "remoteok"),
            ("https://weworkremotely.com/categories/x", "weworkremotely"),
            ("https://jobs.ashbyhq.com/acme", "ashby"),
            ("https://jobs.lever.co/acme", "lever"),
            ("https://boards.greenhouse.io/acme", "greenhouse"),
            ("https://acme.com/careers", "generic"),
        ];
        for (url, expected) in cases {
            let extractor = pick_extractor(f.clone(), url, SourceType::Unknown);
            assert_eq!(extractor.name(), expected, "for {url}");
        }
    }

    #[test]
    fn only_generic_supports_relaxed() {
        let f = MockFetcher::new();
        assert!(pick_extractor(f.clone(), "https://acme.com/careers", SourceType::Unknown)
            .supports_relaxed());
        assert!(!pick_extractor(f, "https://jobs.lever.co/acme", SourceType::Unknown)
            .supports_relaxed());
    }

    #[test]
    fn platform_roots_are_detected() {
        assert!(is_platform_root("https://jobs.lever.co"));
        assert!(is_platform_root("https://jobs.lever.co/"));
        assert!(!is_platform_root("https://jobs.lever.co/acme"));
        assert!(is_platform_root("not a url"));
    }
}
