use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

use scout_core::error::AppError;
use scout_core::models::RawJob;
use scout_core::traits::PageFetcher;

const LISTING_URL: &str = "https://weworkremotely.com/categories/remote-programming-jobs";
const BASE_URL: &str = "https://weworkremotely.com";

static JOB_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("section.jobs article ul li a").expect("valid selector"));
static TITLE_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.title").expect("valid selector"));
static COMPANY_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.company").expect("valid selector"));

/// WeWorkRemotely programming category, parsed from the listing HTML.
/// The list view exposes no posting dates.
#[derive(Clone)]
pub struct WwrExtractor<F> {
    fetcher: F,
}

impl<F: PageFetcher> WwrExtractor<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<RawJob>, AppError> {
        let page = self.fetcher.fetch(LISTING_URL).await?;
        let jobs = parse_listing(&page.body);
        Ok(jobs
            .into_iter()
            .filter(|job| !job.posted_at.is_some_and(|posted| posted < since))
            .collect())
    }
}

fn parse_listing(html: &str) -> Vec<RawJob> {
    let doc = Html::parse_document(html);
    let mut jobs = Vec::new();

    for anchor in doc.select(&JOB_ANCHOR) {
        let Some(href) = anchor.value().attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        let title = anchor
            .select(&TITLE_SPAN)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let company = anchor
            .select(&COMPANY_SPAN)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        if title.is_empty() || company.is_empty() {
            continue;
        }

        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{BASE_URL}{href}")
        };

        jobs.push(RawJob {
            url,
            description: format!("{title} at {company}"),
            title,
            company,
            location: "Remote".to_string(),
            salary_range: None,
            posted_at: None,
        });
    }
    jobs
}
