use url::Url;

use scout_core::content::{self, Signals};
use scout_core::error::AppError;
use scout_core::traits::PageFetcher;
use scout_core::urlutil;

/// Fetches a page once and turns it into classification [`Signals`].
#[derive(Clone)]
pub struct Analyzer<F> {
    fetcher: F,
}

impl<F: PageFetcher> Analyzer<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Analyze a URL. Pages on ATS hosts are authoritative by origin and
    /// short-circuit without a fetch.
    pub async fn analyze(&self, raw_url: &str) -> Result<Signals, AppError> {
        let (normalized, host) = urlutil::normalize(raw_url)?;
        if urlutil::is_ats_host(&host) {
            return Ok(Signals::ats_page());
        }

        let base =
            Url::parse(&normalized).map_err(|e| AppError::UrlError(format!("{normalized}: {e}")))?;
        let page = self.fetcher.fetch(&normalized).await?;
        Ok(content::extract_signals(&base, &page.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::testutil::MockFetcher;

    #[tokio::test]
    async fn ats_pages_skip_the_fetch() {
        let fetcher = MockFetcher::new();
        let analyzer = Analyzer::new(fetcher.clone());

        let signals = analyzer
            .analyze("https://jobs.lever.co/acme")
            .await
            .unwrap();
        assert!(signals.is_ats_page);
        assert!(signals.job_posting);
        assert!(fetcher.fetched_urls().is_empty());
    }

    #[tokio::test]
    async fn fetches_and_extracts_signals() {
        let html = r#"<html><head><title>Open roles at Acme</title></head>
            <body><a href="https://jobs.lever.co/acme">Jobs</a></body></html>"#;
        let fetcher = MockFetcher::new().with_page("https://acme.com/careers", html);
        let analyzer = Analyzer::new(fetcher);

        let signals = analyzer.analyze("https://acme.com/careers").await.unwrap();
        assert_eq!(signals.title, "Open roles at Acme");
        assert_eq!(signals.ats_links, vec!["https://jobs.lever.co/acme"]);
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let fetcher = MockFetcher::new().with_error(
            "https://acme.com/careers",
            AppError::FetchError {
                status: 429,
                message: "slow down".into(),
            },
        );
        let analyzer = Analyzer::new(fetcher);
        let err = analyzer.analyze("https://acme.com/careers").await.unwrap_err();
        assert!(matches!(err, AppError::FetchError { status: 429, .. }));
    }
}
