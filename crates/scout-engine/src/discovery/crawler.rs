//! Career-link harvesting from a single site.
//!
//! Given a page URL, collect same-host discovery-eligible links, probe the
//! usual career paths, and mine the site's sitemaps for career-ish URLs.
//! ATS links short-circuit everything: once a site is known to delegate to
//! an ATS, the ATS boards are the only links worth returning.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use scout_core::content;
use scout_core::error::AppError;
use scout_core::stats::Counters;
use scout_core::traits::PageFetcher;
use scout_core::urlutil;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

const PROBE_PATHS: &[&str] = &[
    "/careers",
    "/jobs",
    "/careers/jobs",
    "/join-us",
    "/work-with-us",
    "/opportunities",
    "/teams",
    "/engineering",
    "/early-careers",
    "/company/careers",
];

const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];

/// Child sitemaps followed per site before giving up.
const MAX_CHILD_SITEMAPS: usize = 20;

/// Harvest career-like links from a site: page anchors, probe paths, and
/// sitemap entries. Returns ATS links alone when any are found.
pub(crate) async fn extract_career_links<F: PageFetcher>(
    fetcher: &F,
    counters: &Counters,
    raw_url: &str,
) -> Vec<String> {
    let Ok(base) = Url::parse(raw_url) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut ats_out = Vec::new();

    let page = match harvest_page(fetcher, counters, raw_url).await {
        Ok(page) => page,
        Err(err) => {
            counters.inc_error(err.kind(), "discovery");
            tracing::debug!(url = raw_url, error = %err, "career-link crawl failed");
            return Vec::new();
        }
    };
    if !page.ats_links.is_empty() {
        return page.ats_links;
    }
    for link in page.links {
        add_link(&mut seen, &mut out, link);
    }

    if urlutil::is_ats_host(base.host_str().unwrap_or_default()) {
        return out;
    }

    for probe in probe_urls(&base) {
        if seen.contains(&probe) {
            continue;
        }
        let page = match harvest_page(fetcher, counters, &probe).await {
            Ok(page) => page,
            Err(err) => {
                if is_rate_limited(&err) {
                    // The host pushed back; stop probing it this round.
                    return out;
                }
                counters.inc_error(err.kind(), "discovery");
                continue;
            }
        };
        add_link(&mut seen, &mut out, probe);
        if !page.ats_links.is_empty() {
            return page.ats_links;
        }
        for link in page.links {
            add_link(&mut seen, &mut out, link);
        }
    }

    for link in sitemap_career_urls(fetcher, counters, &base).await {
        if urlutil::is_ats_host(&host_of(&link)) {
            add_link(&mut seen, &mut ats_out, link);
        } else {
            add_link(&mut seen, &mut out, link);
        }
    }
    if !ats_out.is_empty() {
        return ats_out;
    }

    out
}

fn add_link(seen: &mut HashSet<String>, out: &mut Vec<String>, link: String) {
    if link.starts_with("http") && seen.insert(link.clone()) {
        out.push(link);
    }
}

struct HarvestedPage {
    links: Vec<String>,
    ats_links: Vec<String>,
}

/// Fetch one page and split its anchors into same-host discovery
/// candidates and ATS board links.
async fn harvest_page<F: PageFetcher>(
    fetcher: &F,
    counters: &Counters,
    target: &str,
) -> Result<HarvestedPage, AppError> {
    let base =
        Url::parse(target).map_err(|e| AppError::UrlError(format!("{target}: {e}")))?;
    let page = fetcher.fetch(target).await?;
    counters.inc_pages_crawled();

    let doc = Html::parse_document(&page.body);
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let mut ats_links = Vec::new();

    for anchor in doc.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        let Some(resolved) = content::resolve_link(&base, href) else {
            continue;
        };
        let Ok((normalized, host)) = urlutil::normalize(&resolved) else {
            continue;
        };
        if !seen.insert(normalized.clone()) {
            continue;
        }
        if urlutil::is_ats_host(&host) {
            ats_links.push(normalized);
            continue;
        }
        if !content::same_host(&base, &host) || !urlutil::is_discovery_eligible(&normalized) {
            continue;
        }
        links.push(normalized);
    }

    Ok(HarvestedPage { links, ats_links })
}

/// Check the standard sitemap locations and pull out career-ish URLs.
/// Sitemap indexes are followed one level down.
async fn sitemap_career_urls<F: PageFetcher>(
    fetcher: &F,
    counters: &Counters,
    base: &Url,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for path in SITEMAP_PATHS {
        let mut sitemap_url = base.clone();
        sitemap_url.set_path(path);
        sitemap_url.set_query(None);

        let Ok(page) = fetcher.fetch(sitemap_url.as_str()).await else {
            continue;
        };
        counters.inc_pages_crawled();

        if page.body.contains("<sitemapindex") {
            for child in extract_locs(&page.body).into_iter().take(MAX_CHILD_SITEMAPS) {
                let Ok(child_page) = fetcher.fetch(&child).await else {
                    continue;
                };
                counters.inc_pages_crawled();
                collect_career_locs(&child_page.body, &mut seen, &mut out);
            }
        } else {
            collect_career_locs(&page.body, &mut seen, &mut out);
        }
    }
    out
}

fn collect_career_locs(xml: &str, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    for loc in extract_locs(xml) {
        if accept_sitemap_url(&loc) && seen.insert(loc.clone()) {
            out.push(loc);
        }
    }
}

/// Pull `<loc>` values out of sitemap XML with a plain scan. Sitemaps use
/// XML namespaces that HTML parsers mangle, and the format is rigid enough
/// that string slicing is the dependable option.
fn extract_locs(xml: &str) -> Vec<String> {
    let mut locs = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<loc>") {
        rest = &rest[start + 5..];
        let Some(end) = rest.find("</loc>") else {
            break;
        };
        let loc = rest[..end]
            .trim()
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'");
        if !loc.is_empty() {
            locs.push(loc);
        }
        rest = &rest[end + 6..];
    }
    locs
}

fn accept_sitemap_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    [
        "career",
        "job",
        "opening",
        "position",
        "opportun",
        "join-us",
        "work-with-us",
        "early-careers",
    ]
    .iter()
    .any(|kw| lower.contains(kw))
}

fn probe_urls(base: &Url) -> Vec<String> {
    PROBE_PATHS
        .iter()
        .map(|path| {
            let mut probe = base.clone();
            probe.set_path(path);
            probe.set_query(None);
            probe.set_fragment(None);
            probe.to_string()
        })
        .collect()
}

fn host_of(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

fn is_rate_limited(err: &AppError) -> bool {
    matches!(err, AppError::FetchError { status: 429, .. })
}
