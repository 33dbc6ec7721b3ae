//! Fallback extractor for career pages with no known ATS.
//!
//! Strategy: look for JSON-LD JobPosting objects on the board page and a
//! handful of probe paths; only when none exist, harvest same-host detail
//! links and mine each detail page. The relaxed mode drops the anchor-text
//! keyword filter and raises the caps, which finds listings whose links are
//! image-based or unlabeled.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use url::Url;

use scout_core::content::{self, jsonld};
use scout_core::error::AppError;
use scout_core::models::RawJob;
use scout_core::traits::PageFetcher;
use scout_core::urlutil;

const PROBE_PATHS: &[&str] = &["/careers", "/jobs", "/careers/jobs", "/join-us", "/work-with-us"];

const JOB_LINK_KEYWORDS: &[&str] = &["job", "career", "opening", "position"];

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static JSONLD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector"));
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static META_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).expect("valid selector"));
static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid selector"));

#[derive(Clone, Copy)]
struct Limits {
    probe_cap: usize,
    page_cap: usize,
    budget: Duration,
    keyword_filter: bool,
}

const STRICT: Limits = Limits {
    probe_cap: 50,
    page_cap: 40,
    budget: Duration::from_secs(20),
    keyword_filter: true,
};

const RELAXED: Limits = Limits {
    probe_cap: 80,
    page_cap: 60,
    budget: Duration::from_secs(25),
    keyword_filter: false,
};

#[derive(Clone)]
pub struct GenericExtractor<F> {
    fetcher: F,
    base: String,
}

impl<F: PageFetcher> GenericExtractor<F> {
    pub fn new(fetcher: F, base: &str) -> Self {
        Self {
            fetcher,
            base: base.to_string(),
        }
    }

    pub async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<RawJob>, AppError> {
        self.run(since, STRICT).await
    }

    pub async fn fetch_since_relaxed(&self, since: DateTime<Utc>) -> Result<Vec<RawJob>, AppError> {
        self.run(since, RELAXED).await
    }

    async fn run(&self, since: DateTime<Utc>, limits: Limits) -> Result<Vec<RawJob>, AppError> {
        let (normalized, _) = urlutil::normalize(&self.base)?;
        let base = Url::parse(&normalized)
            .map_err(|e| AppError::UrlError(format!("{normalized}: {e}")))?;
        let deadline = Instant::now() + limits.budget;

        // Board page plus probes: JSON-LD postings win outright, and the
        // same fetches feed the detail-link harvest.
        let root = self.fetcher.fetch(&normalized).await?;
        let mut embedded = embedded_jobs(&root.body, &base);
        let mut candidates = collect_detail_links(&root.body, &base, limits.keyword_filter);

        for probe in probe_paths(&base) {
            if candidates.len() >= limits.probe_cap || Instant::now() >= deadline {
                break;
            }
            let Ok(page) = self.fetcher.fetch(&probe).await else {
                continue;
            };
            embedded.extend(embedded_jobs(&page.body, &base));
            candidates.extend(collect_detail_links(&page.body, &base, limits.keyword_filter));
        }

        if !embedded.is_empty() {
            return Ok(dedupe_by_url(embedded)
                .into_iter()
                .filter(|job| !job.posted_at.is_some_and(|posted| posted < since))
                .collect());
        }

        let mut seen = HashSet::new();
        let mut jobs: Vec<RawJob> = Vec::new();
        for link in candidates {
            if jobs.len() >= limits.page_cap || Instant::now() >= deadline {
                break;
            }
            if !seen.insert(link.clone()) {
                continue;
            }
            let Ok(page) = self.fetcher.fetch(&link).await else {
                continue;
            };
            if let Some(job) = extract_job(&page.body, &link, &base) {
                if job.posted_at.is_some_and(|posted| posted < since) {
                    continue;
                }
                jobs.push(job);
            }
        }

        Ok(jobs)
    }
}

/// All JSON-LD JobPosting objects on a page, with URL and company filled
/// from the page context when the markup omits them.
fn embedded_jobs(html: &str, base: &Url) -> Vec<RawJob> {
    let doc = Html::parse_document(html);
    let mut jobs = Vec::new();
    for script in doc.select(&JSONLD) {
        let raw = script.text().collect::<String>();
        let Ok(payload) = serde_json::from_str::<serde_json::Value>(raw.trim()) else {
            continue;
        };
        for posting in jsonld::collect_job_postings(&payload) {
            if let Some(mut job) = jsonld::job_from_value(posting) {
                if job.url.is_empty() {
                    job.url = base.to_string();
                }
                if job.company.is_empty() {
                    job.company = host_company(base);
                }
                jobs.push(job);
            }
        }
    }
    jobs
}

fn collect_detail_links(html: &str, base: &Url, keyword_filter: bool) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in doc.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        if keyword_filter {
            let text = anchor.text().collect::<String>();
            let haystack = format!("{} {}", href, text.trim()).to_lowercase();
            if !JOB_LINK_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
                continue;
            }
        }

        let Some(resolved) = content::resolve_link(base, href) else {
            continue;
        };
        let Ok((normalized, host)) = urlutil::normalize(&resolved) else {
            continue;
        };
        if !content::same_host(base, &host) || !urlutil::is_crawlable(&normalized) {
            continue;
        }
        if seen.insert(normalized.clone()) {
            links.push(normalized);
        }
    }
    links
}

/// Mine one detail page: JSON-LD wins, heuristics fill the gaps.
fn extract_job(html: &str, link: &str, base: &Url) -> Option<RawJob> {
    let doc = Html::parse_document(html);

    for script in doc.select(&JSONLD) {
        let raw = script.text().collect::<String>();
        let Ok(payload) = serde_json::from_str::<serde_json::Value>(raw.trim()) else {
            continue;
        };
        if let Some(mut job) = jsonld::job_from_value(&payload) {
            if job.url.is_empty() {
                job.url = link.to_string();
            }
            if job.company.is_empty() {
                job.company = host_company(base);
            }
            return Some(job);
        }
    }

    let title = first_text(&doc, &H1)
        .or_else(|| first_text(&doc, &TITLE))
        .unwrap_or_else(|| path_title_from_url(link));
    if title.is_empty() {
        return None;
    }

    let description = doc
        .select(&META_DESCRIPTION)
        .find_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .or_else(|| first_text(&doc, &PARAGRAPH))
        .unwrap_or_default();

    Some(RawJob {
        url: link.to_string(),
        title,
        description,
        company: host_company(base),
        location: String::new(),
        salary_range: None,
        posted_at: None,
    })
}

fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty())
}

fn probe_paths(base: &Url) -> Vec<String> {
    PROBE_PATHS
        .iter()
        .map(|path| {
            let mut probe = base.clone();
            probe.set_path(path);
            probe.set_query(None);
            probe.to_string()
        })
        .collect()
}

/// Derive a title from the last non-empty path segment:
/// `senior-backend-engineer` becomes `Senior Backend Engineer`.
fn path_title_from_url(link: &str) -> String {
    let trimmed = link.trim_end_matches('/');
    let Some(segment) = trimmed.rsplit('/').find(|seg| !seg.is_empty()) else {
        return String::new();
    };
    segment
        .replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn host_company(base: &Url) -> String {
    let host = base.host_str().unwrap_or("Unknown").to_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

fn dedupe_by_url(jobs: Vec<RawJob>) -> Vec<RawJob> {
    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|job| seen.insert(job.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use scout_core::testutil::MockFetcher;

    fn base() -> Url {
        Url::parse("https://acme.com/careers").unwrap()
    }

    fn old_since() -> DateTime<Utc> {
        Utc::now() - ChronoDuration::days(3650)
    }

    #[test]
    fn path_titles_are_title_cased() {
        assert_eq!(
            path_title_from_url("https://acme.com/careers/senior-backend-engineer"),
            "Senior Backend Engineer"
        );
        assert_eq!(
            path_title_from_url("https://acme.com/jobs/data_platform_lead/"),
            "Data Platform Lead"
        );
    }

    #[test]
    fn keyword_filter_limits_detail_links() {
        let html = r#"<html><body>
            <a href="/careers/backend-engineer">Backend Engineer</a>
            <a href="/about">About</a>
            <a href="/positions/sre">SRE</a>
        </body></html>"#;
        let strict = collect_detail_links(html, &base(), true);
        assert_eq!(
            strict,
            vec![
                "https://acme.com/careers/backend-engineer",
                "https://acme.com/positions/sre"
            ]
        );
        let relaxed = collect_detail_links(html, &base(), false);
        assert_eq!(relaxed.len(), 3);
    }

    #[test]
    fn detail_links_stay_on_host() {
        let html = r#"<html><body>
            <a href="https://other.com/jobs/1">External job</a>
            <a href="/jobs/internal">Internal job</a>
        </body></html>"#;
        let links = collect_detail_links(html, &base(), true);
        assert_eq!(links, vec!["https://acme.com/jobs/internal"]);
    }

    #[test]
    fn extract_job_prefers_jsonld() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@type": "JobPosting", "title": "Staff Engineer",
             "description": "Own the platform", "datePosted": "2024-04-01"}
            </script></head>
            <body><h1>Ignored heading</h1></body></html>"#;
        let job = extract_job(html, "https://acme.com/careers/staff", &base()).unwrap();
        assert_eq!(job.title, "Staff Engineer");
        assert_eq!(job.url, "https://acme.com/careers/staff");
        assert_eq!(job.company, "acme.com");
        assert!(job.posted_at.is_some());
    }

    #[test]
    fn extract_job_falls_back_to_heuristics() {
        let html = r#"<html><head><title>SE role</title>
            <meta name="description" content="Go backend role"></head>
            <body><h1>Backend Engineer</h1><p>First paragraph</p></body></html>"#;
        let job = extract_job(html, "https://acme.com/careers/se", &base()).unwrap();
        assert_eq!(job.title, "Backend Engineer");
        assert_eq!(job.description, "Go backend role");

        let bare = "<html><body></body></html>";
        let job = extract_job(bare, "https://acme.com/careers/cloud-architect", &base()).unwrap();
        assert_eq!(job.title, "Cloud Architect");
    }

    #[tokio::test]
    async fn jsonld_on_the_board_page_wins() {
        let board = r#"<html><body>
            <script type="application/ld+json">
            [{"@type": "JobPosting", "title": "Go Engineer",
              "url": "https://acme.com/careers/go"},
             {"@type": "JobPosting", "title": "SRE",
              "url": "https://acme.com/careers/sre"}]
            </script>
            <a href="/careers/ignored-detail">Job link</a>
        </body></html>"#;
        let fetcher = MockFetcher::new()
            .with_page("https://acme.com/careers", board)
            .with_default_body("<html><body></body></html>");
        let extractor = GenericExtractor::new(fetcher.clone(), "https://acme.com/careers");

        let jobs = extractor.fetch_since(old_since()).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().any(|j| j.title == "Go Engineer"));
        // The detail page was never fetched.
        assert!(!fetcher
            .fetched_urls()
            .contains(&"https://acme.com/careers/ignored-detail".to_string()));
    }

    #[tokio::test]
    async fn harvests_detail_pages_when_no_jsonld() {
        let board = r#"<html><body>
            <a href="/careers/backend-engineer">Backend Engineer opening</a>
        </body></html>"#;
        let detail = r#"<html><body><h1>Backend Engineer</h1>
            <p>Write Go services</p></body></html>"#;
        let fetcher = MockFetcher::new()
            .with_page("https://acme.com/careers", board)
            .with_page("https://acme.com/careers/backend-engineer", detail)
            .with_default_body("<html><body></body></html>");
        let extractor = GenericExtractor::new(fetcher, "https://acme.com/careers");

        let jobs = extractor.fetch_since(old_since()).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Backend Engineer");
        assert_eq!(jobs[0].description, "Write Go services");
        assert_eq!(jobs[0].company, "acme.com");
    }

    #[tokio::test]
    async fn board_fetch_failure_is_an_error() {
        let fetcher = MockFetcher::new().with_error(
            "https://acme.com/careers",
            AppError::FetchError {
                status: 503,
                message: "down".into(),
            },
        );
        let extractor = GenericExtractor::new(fetcher, "https://acme.com/careers");
        assert!(extractor.fetch_since(old_since()).await.is_err());
    }
}
