//! General-web discovery through the DuckDuckGo HTML endpoint.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use scout_core::stats::Counters;
use scout_core::traits::PageFetcher;

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

static RESULT_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("valid selector"));

/// Run one query and return up to `limit` result URLs, with DuckDuckGo's
/// redirect wrapper unwrapped.
pub(crate) async fn duck_duck_search<F: PageFetcher>(
    fetcher: &F,
    counters: &Counters,
    query: &str,
    limit: usize,
) -> Vec<String> {
    let url = format!("{SEARCH_URL}?q={}", urlencoding::encode(query));
    let page = match fetcher.fetch(&url).await {
        Ok(page) => page,
        Err(err) => {
            counters.inc_error(err.kind(), "discovery");
            tracing::debug!(%query, error = %err, "search failed");
            return Vec::new();
        }
    };
    counters.inc_pages_crawled();
    parse_results(&page.body, limit)
}

fn parse_results(html: &str, limit: usize) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut urls = Vec::new();

    for anchor in doc.select(&RESULT_ANCHOR) {
        if urls.len() >= limit {
            break;
        }
        let Some(href) = anchor.value().attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        let Some(url) = extract_result_url(href) else {
            continue;
        };
        if url.contains("duckduckgo.com") {
            continue;
        }
        urls.push(url);
    }
    urls
}

/// Results arrive either as direct URLs or wrapped in a redirect of the
/// form `//duckduckgo.com/l/?uddg=<encoded>&rut=...`.
fn extract_result_url(href: &str) -> Option<String> {
    if let Some(idx) = href.find("uddg=") {
        let encoded = &href[idx + 5..];
        let end = encoded.find('&').unwrap_or(encoded.len());
        return urlencoding::decode(&encoded[..end])
            .ok()
            .map(|s| s.into_owned());
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    if href.starts_with("//") {
        return Some(format!("https:{href}"));
    }
    None
}
