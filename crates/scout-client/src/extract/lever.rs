use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use scout_core::error::AppError;
use scout_core::models::RawJob;
use scout_core::traits::PageFetcher;

use super::is_platform_root;

#[derive(Debug, Deserialize)]
struct LeverPosting {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "hostedUrl")]
    hosted_url: String,
    #[serde(default)]
    categories: LeverCategories,
    /// Milliseconds since epoch.
    #[serde(default, rename = "createdAt")]
    created_at: i64,
    #[serde(default, rename = "descriptionPlain")]
    description_plain: String,
}

#[derive(Debug, Default, Deserialize)]
struct LeverCategories {
    #[serde(default)]
    location: String,
}

/// Lever company boards expose their postings as JSON via `?mode=json`.
#[derive(Clone)]
pub struct LeverExtractor<F> {
    fetcher: F,
    base: String,
}

impl<F: PageFetcher> LeverExtractor<F> {
    pub fn new(fetcher: F, base: &str) -> Self {
        Self {
            fetcher,
            base: base.to_string(),
        }
    }

    pub async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<RawJob>, AppError> {
        if is_platform_root(&self.base) {
            return Ok(Vec::new());
        }

        let mut api_url = self.base.trim_end_matches('/').to_string();
        if !api_url.contains("?mode=json") {
            api_url.push_str("?mode=json");
        }

        let page = self.fetcher.fetch(&api_url).await?;
        parse_postings(&page.body, since)
    }
}

fn parse_postings(body: &str, since: DateTime<Utc>) -> Result<Vec<RawJob>, AppError> {
    let postings: Vec<LeverPosting> = serde_json::from_str(body)
        .map_err(|e| AppError::ParseError(format!("lever decode failed: {e}")))?;

    let mut jobs = Vec::new();
    for posting in postings {
        let posted_at = Utc.timestamp_millis_opt(posting.created_at).single();
        if posted_at.is_some_and(|posted| posted < since) {
            continue;
        }
        jobs.push(RawJob {
            company: company_from_url(&posting.hosted_url),
            url: posting.hosted_url,
            title: posting.text,
            description: posting.description_plain,
            location: posting.categories.location,
            salary_range: None,
            posted_at,
        });
    }
    Ok(jobs)
}

fn company_from_url(url: &str) -> String {
    let mut parts = url.split('/');
    while let Some(part) = parts.next() {
        if part.contains("lever.co") {
            if let Some(slug) = parts.next() {
                if !slug.is_empty() {
                    return slug.to_string();
                }
            }
        }
    }
    "Lever".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use scout_core::testutil::MockFetcher;

    const POSTINGS: &str = r#"[
        {"id": "1", "text": "Senior Go Engineer",
         "hostedUrl": "https://jobs.lever.co/acme/se-1",
         "categories": {"location": "Remote - Europe", "team": "Platform"},
         "createdAt": 1714550400000,
         "descriptionPlain": "Build distributed systems"},
        {"id": "2", "text": "Ancient Role",
         "hostedUrl": "https://jobs.lever.co/acme/se-2",
         "categories": {"location": "Berlin"},
         "createdAt": 946684800000,
         "descriptionPlain": "Old"}
    ]"#;

    fn since() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn parses_postings_and_filters_by_created_at() {
        let jobs = parse_postings(POSTINGS, since()).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Senior Go Engineer");
        assert_eq!(jobs[0].company, "acme");
        assert_eq!(jobs[0].location, "Remote - Europe");
    }

    #[test]
    fn company_slug_comes_from_the_hosted_url() {
        assert_eq!(company_from_url("https://jobs.lever.co/acme/se-1"), "acme");
        assert_eq!(company_from_url("https://nowhere.com/x"), "Lever");
    }

    #[tokio::test]
    async fn platform_root_yields_nothing() {
        let fetcher = MockFetcher::new();
        let extractor = LeverExtractor::new(fetcher.clone(), "https://jobs.lever.co/");
        let jobs = extractor.fetch_since(since()).await.unwrap();
        assert!(jobs.is_empty());
        assert!(fetcher.fetched_urls().is_empty());
    }

    #[tokio::test]
    async fn appends_json_mode_to_the_board_url() {
        let fetcher =
            MockFetcher::new().with_page("https://jobs.lever.co/acme?mode=json", POSTINGS);
        let extractor = LeverExtractor::new(fetcher.clone(), "https://jobs.lever.co/acme");
        let jobs = extractor
            .fetch_since(Utc::now() - Duration::days(36500))
            .await
            .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(
            fetcher.fetched_urls(),
            vec!["https://jobs.lever.co/acme?mode=json"]
        );
    }
}
