use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

use scout_core::error::AppError;
use scout_core::models::RawJob;
use scout_core::traits::PageFetcher;

use super::is_platform_root;

const BOARDS_BASE: &str = "https://boards.greenhouse.io";

static OPENING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".opening").expect("valid selector"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("valid selector"));
static LOCATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".location").expect("valid selector"));

/// Greenhouse company boards, scraped through the embed view which renders
/// without JavaScript. The board HTML exposes no posting dates.
#[derive(Clone)]
pub struct GreenhouseExtractor<F> {
    fetcher: F,
    base: String,
}

impl<F: PageFetcher> GreenhouseExtractor<F> {
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

        let page = self.fetcher.fetch(&embed_url(&self.base)).await?;
        let jobs = parse_board(&page.body);
        Ok(jobs
            .into_iter()
            .filter(|job| !job.posted_at.is_some_and(|posted| posted < since))
            .collect())
    }
}

fn embed_url(base: &str) -> String {
    if base.contains("embed") {
        return base.to_string();
    }
    if base.contains("boards.greenhouse.io") {
        return format!("{}/embed/jobs?content=true", base.trim_end_matches('/'));
    }
    base.to_string()
}

fn parse_board(html: &str) -> Vec<RawJob> {
    let doc = Html::parse_document(html);
    let mut jobs = Vec::new();

    for opening in doc.select(&OPENING) {
        let Some(anchor) = opening.select(&ANCHOR).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        let title = anchor.text().collect::<String>().trim().to_string();
        let location = opening
            .select(&LOCATION)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{BOARDS_BASE}{href}")
        };

        jobs.push(RawJob {
            company: company_from_url(&url),
            description: title.clone(),
            title,
            url,
            location,
            salary_range: None,
            posted_at: None,
        });
    }
    jobs
}

fn company_from_url(url: &str) -> String {
    let mut parts = url.split('/');
    while let Some(part) = parts.next() {
        if part == "boards.greenhouse.io" {
            if let Some(slug) = parts.next() {
                if !slug.is_empty() {
                    return slug.to_string();
                }
            }
        }
    }
    "Greenhouse".to_string()
}
