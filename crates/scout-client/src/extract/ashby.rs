use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use scout_core::content::jsonld::parse_posting_date;
use scout_core::error::AppError;
use scout_core::models::RawJob;
use scout_core::traits::PageFetcher;

use super::is_platform_root;

/// Ashby boards ship their data as a `window.__appData` assignment inside
/// the board HTML rather than a JSON endpoint.
#[derive(Debug, Deserialize)]
struct AshbyAppData {
    organization: Option<AshbyOrganization>,
    #[serde(rename = "jobBoard")]
    job_board: Option<AshbyJobBoard>,
}

#[derive(Debug, Deserialize)]
struct AshbyOrganization {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct AshbyJobBoard {
    #[serde(default, rename = "jobPostings")]
    job_postings: Vec<AshbyPosting>,
}

#[derive(Debug, Deserialize)]
struct AshbyPosting {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "jobId")]
    job_id: String,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "locationName")]
    location_name: String,
    #[serde(default, rename = "workplaceType")]
    workplace_type: String,
    #[serde(default, rename = "employmentType")]
    employment_type: String,
    #[serde(default, rename = "publishedDate")]
    published_date: String,
    #[serde(default, rename = "updatedAt")]
    updated_at: String,
    #[serde(default, rename = "teamName")]
    team_name: String,
    #[serde(default, rename = "departmentName")]
    department_name: String,
    #[serde(default, rename = "isListed")]
    is_listed: bool,
}

#[derive(Clone)]
pub struct AshbyExtractor<F> {
    fetcher: F,
    base: String,
}

impl<F: PageFetcher> AshbyExtractor<F> {
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

        let page = self.fetcher.fetch(&self.base).await?;
        let raw = extract_app_data(&page.body)?;
        let app: AshbyAppData = serde_json::from_str(raw)
            .map_err(|e| AppError::ParseError(format!("ashby appdata decode failed: {e}")))?;

        Ok(postings_to_jobs(app, &self.base, since))
    }
}

fn postings_to_jobs(app: AshbyAppData, base: &str, since: DateTime<Utc>) -> Vec<RawJob> {
    let Some(board) = app.job_board else {
        return Vec::new();
    };

    let company = app
        .organization
        .map(|org| org.name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| company_slug(base));

    let base_url = base.trim_end_matches('/');
    let mut seen = std::collections::HashSet::new();
    let mut jobs = Vec::new();

    for posting in board.job_postings {
        if !posting.is_listed {
            continue;
        }
        let job_id = if posting.job_id.is_empty() {
            posting.id.clone()
        } else {
            posting.job_id.clone()
        };
        if job_id.is_empty() || posting.title.is_empty() || !seen.insert(job_id.clone()) {
            continue;
        }

        let posted_at = parse_posting_date(&posting.published_date)
            .or_else(|| parse_posting_date(&posting.updated_at));
        if posted_at.is_some_and(|posted| posted < since) {
            continue;
        }

        let mut location = posting.location_name.trim().to_string();
        if !posting.workplace_type.is_empty()
            && !location
                .to_lowercase()
                .contains(&posting.workplace_type.to_lowercase())
        {
            location = if location.is_empty() {
                posting.workplace_type.clone()
            } else {
                format!("{location} ({})", posting.workplace_type)
            };
        }

        let description = [
            posting.title.as_str(),
            posting.department_name.as_str(),
            posting.team_name.as_str(),
            posting.employment_type.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" - ");

        jobs.push(RawJob {
            url: format!("{base_url}/{job_id}"),
            title: posting.title,
            description,
            company: company.clone(),
            location,
            salary_range: None,
            posted_at,
        });
    }
    jobs
}

/// Locate the `window.__appData` assignment and slice out the first
/// balanced JSON object, tracking string and escape state so braces inside
/// string values do not end the scan early.
fn extract_app_data(body: &str) -> Result<&str, AppError> {
    let marker = "window.__appData";
    let idx = body
        .find(marker)
        .ok_or_else(|| AppError::ParseError("ashby appdata marker not found".into()))?;
    let after = &body[idx + marker.len()..];
    let start_rel = after
        .find('{')
        .ok_or_else(|| AppError::ParseError("ashby appdata json start not found".into()))?;
    let start = idx + marker.len() + start_rel;

    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, &c) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escape {
                escape = false;
            } else if c == b'\\' {
                escape = true;
            } else if c == b'"' {
                in_string = false;
            }
            continue;
        }
        match c {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&body[start..=i]);
                }
            }
            _ => {}
        }
    }

    Err(AppError::ParseError(
        "ashby appdata json end not found".into(),
    ))
}

fn company_slug(base: &str) -> String {
    Url::parse(base)
        .ok()
        .map(|u| u.path().trim_matches('/').to_string())
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| "Ashby".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use scout_core::testutil::MockFetcher;

    const BOARD: &str = r#"<html><head><script>
        window.__appData = {"organization": {"name": "Acme Labs"},
            "jobBoard": {"jobPostings": [
                {"id": "a1", "jobId": "j1", "title": "Go Engineer",
                 "locationName": "Berlin", "workplaceType": "Hybrid",
                 "employmentType": "FullTime", "publishedDate": "2024-05-01",
                 "teamName": "Platform", "departmentName": "Engineering",
                 "isListed": true},
                {"id": "a2", "jobId": "j1", "title": "Duplicate", "isListed": true},
                {"id": "a3", "jobId": "j3", "title": "Hidden role", "isListed": false},
                {"id": "a4", "jobId": "j4", "title": "Старая роль {brace} \" quoted",
                 "publishedDate": "2020-01-01", "isListed": true}
            ]}};
        </script></head><body></body></html>"#;

    fn since() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn extracts_balanced_appdata_json() {
        let raw = extract_app_data(BOARD).unwrap();
        assert!(raw.starts_with('{'));
        assert!(raw.ends_with('}'));
        // Braces and escaped quotes inside strings do not end the scan.
        let value: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(value["organization"]["name"], "Acme Labs");
    }

    #[test]
    fn missing_marker_is_a_parse_error() {
        let err = extract_app_data("<html></html>").unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }

    #[tokio::test]
    async fn builds_jobs_from_listed_postings() {
        let fetcher = MockFetcher::new().with_page("https://jobs.ashbyhq.com/acme", BOARD);
        let extractor = AshbyExtractor::new(fetcher, "https://jobs.ashbyhq.com/acme");
        let jobs = extractor.fetch_since(since()).await.unwrap();

        // Duplicate job id, unlisted, and stale postings all drop out.
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.url, "https://jobs.ashbyhq.com/acme/j1");
        assert_eq!(job.title, "Go Engineer");
        assert_eq!(job.company, "Acme Labs");
        assert_eq!(job.location, "Berlin (Hybrid)");
        assert_eq!(
            job.description,
            "Go Engineer - Engineering - Platform - FullTime"
        );
    }

    #[tokio::test]
    async fn platform_root_yields_nothing() {
        let fetcher = MockFetcher::new();
        let extractor = AshbyExtractor::new(fetcher.clone(), "https://jobs.ashbyhq.com");
        let jobs = extractor
            .fetch_since(Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert!(jobs.is_empty());
        assert!(fetcher.fetched_urls().is_empty());
    }

    #[test]
    fn company_falls_back_to_the_url_slug() {
        assert_eq!(company_slug("https://jobs.ashbyhq.com/acme"), "acme");
        assert_eq!(company_slug("https://jobs.ashbyhq.com/"), "Ashby");
    }
}
