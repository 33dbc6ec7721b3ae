use chrono::{DateTime, Utc};
use serde::Deserialize;

use scout_core::error::AppError;
use scout_core::models::RawJob;
use scout_core::traits::PageFetcher;

const API_URL: &str = "https://remoteok.com/api";
const DEFAULT_TAG: &str = "golang";

/// RemoteOK JSON feed. The first array element is metadata, recognizable
/// by its missing slug/url.
#[derive(Debug, Deserialize)]
struct RemoteOkJob {
    #[serde(default)]
    slug: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    position: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    date: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    salary_min: Option<i64>,
    #[serde(default)]
    salary_max: Option<i64>,
}

#[derive(Clone)]
pub struct RemoteOkExtractor<F> {
    fetcher: F,
    tag: String,
}

impl<F: PageFetcher> RemoteOkExtractor<F> {
    pub fn new(fetcher: F, tag: Option<String>) -> Self {
        Self {
            fetcher,
            tag: tag.unwrap_or_else(|| DEFAULT_TAG.to_string()),
        }
    }

    pub async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<RawJob>, AppError> {
        let page = self.fetcher.fetch(API_URL).await?;
        parse_feed(&page.body, &self.tag, since)
    }
}

fn parse_feed(body: &str, tag: &str, since: DateTime<Utc>) -> Result<Vec<RawJob>, AppError> {
    let entries: Vec<RemoteOkJob> = serde_json::from_str(body)
        .map_err(|e| AppError::ParseError(format!("remoteok decode failed: {e}")))?;

    let mut jobs = Vec::new();
    for entry in entries {
        if entry.slug.is_empty() || entry.url.is_empty() {
            continue;
        }
        if !has_tag(&entry.tags, tag) {
            continue;
        }
        let posted_at = parse_date(&entry.date);
        if posted_at.is_some_and(|posted| posted < since) {
            continue;
        }
        jobs.push(RawJob {
            url: entry.url,
            title: entry.position,
            description: entry.description,
            company: entry.company,
            location: entry.location,
            salary_range: salary_range(entry.salary_min, entry.salary_max),
            posted_at,
        });
    }
    Ok(jobs)
}

fn has_tag(tags: &[String], want: &str) -> bool {
    tags.iter().any(|t| t.eq_ignore_ascii_case(want))
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn salary_range(min: Option<i64>, max: Option<i64>) -> Option<String> {
    match (min.filter(|v| *v > 0), max.filter(|v| *v > 0)) {
        (Some(min), Some(max)) => Some(format!("${min}-${max}")),
        (Some(single), None) | (None, Some(single)) => Some(format!("${single}")),
        (None, None) => None,
    }
}
