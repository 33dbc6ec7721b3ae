//! Page-content signal extraction and the classification rule table.
//!
//! Signal extraction is pure over an already-fetched HTML body; the
//! fetching half lives in the client crate. Keeping this side-effect free
//! makes every classifier decision reproducible from a fixture.

pub mod jsonld;

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::models::PageType;
use crate::urlutil;

const MAX_TEXT_SAMPLE: usize = 5000;

/// Detects job titles in page titles, h1 headings, or URL paths.
static JOB_TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(engineer|developer|backend|frontend|full.?stack|devops|platform)")
        .expect("valid job title pattern")
});

static SALARY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\$\s?\d{2,3}(?:[.,]\d{3})?(?:k)?|\b(usd|eur|gbp|salary|compensation)\b)")
        .expect("valid salary pattern")
});

static LOCATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(location|remote|hybrid|onsite)\b").expect("valid location pattern")
});

const JOB_KEYWORD_PHRASES: &[&str] = &[
    "open positions",
    "open position",
    "job openings",
    "job opening",
    "current openings",
    "current positions",
    "open roles",
    "open role",
    "career opportunities",
    "join our team",
    "join the team",
    "work with us",
    "we're hiring",
    "we are hiring",
    "vacancies",
    "positions",
    "careers",
];

const APPLY_PHRASES: &[&str] = &["apply", "apply now", "apply today"];

const JOB_LINK_KEYWORDS: &[&str] = &[
    "job",
    "jobs",
    "career",
    "careers",
    "opening",
    "openings",
    "position",
    "positions",
    "role",
    "roles",
    "vacancy",
    "vacancies",
];

/// Structural and textual evidence collected from one page.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    pub title: String,
    pub meta: String,
    /// Body text, trimmed to 5000 chars.
    pub text: String,
    /// Normalized ATS URLs found in anchors.
    pub ats_links: Vec<String>,
    /// Same-host anchors that look like job links; discovery recurses into
    /// these when a page is rejected with low confidence.
    pub job_links: Vec<String>,
    /// A schema.org JobPosting object is embedded in the page.
    pub job_posting: bool,
    pub job_link_count: usize,
    pub keyword_hits: usize,
    pub apply_hits: usize,
    /// The page itself lives on an ATS host.
    pub is_ats_page: bool,
    pub title_match: bool,
    pub h1_match: bool,
    pub url_match: bool,
    pub salary_match: bool,
    pub location_match: bool,
}

impl Signals {
    /// Signals for a page that is authoritative by origin: an ATS host
    /// needs no content inspection.
    pub fn ats_page() -> Self {
        Self {
            is_ats_page: true,
            job_posting: true,
            ..Self::default()
        }
    }
}

/// Classifier output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub page_type: PageType,
    pub reason: &'static str,
    pub confidence: f64,
}

/// Extract classification signals from a fetched page.
pub fn extract_signals(base: &Url, html: &str) -> Signals {
    let mut signals = Signals {
        url_match: JOB_TITLE_PATTERN.is_match(base.path()),
        ..Signals::default()
    };

    let doc = Html::parse_document(html);

    if let Some(title) = select_first_text(&doc, &TITLE_SELECTOR) {
        signals.title_match = JOB_TITLE_PATTERN.is_match(&title);
        signals.title = title;
    }
    if let Some(meta) = doc
        .select(&META_DESCRIPTION_SELECTOR)
        .find_map(|el| el.value().attr("content"))
    {
        signals.meta = meta.trim().to_string();
    }
    signals.h1_match = doc.select(&H1_SELECTOR).any(|el| {
        let text = element_text(&el);
        !text.is_empty() && JOB_TITLE_PATTERN.is_match(&text)
    });
    signals.job_posting = doc
        .select(&JSONLD_SELECTOR)
        .any(|el| jsonld::contains_job_posting(&el.text().collect::<String>()));
    if let Some(body) = doc.select(&BODY_SELECTOR).next() {
        signals.text = limit_text(&element_text(&body));
    }

    let mut ats_links = BTreeSet::new();
    let mut job_links = BTreeSet::new();
    for anchor in doc.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        let Some(resolved) = resolve_link(base, href) else {
            continue;
        };
        let Ok((normalized, host)) = urlutil::normalize(&resolved) else {
            continue;
        };
        if urlutil::is_ats_host(&host) {
            ats_links.insert(normalized);
            continue;
        }
        if !same_host(base, &host) || !urlutil::is_crawlable(&normalized) {
            continue;
        }
        if is_job_anchor(href, &element_text(&anchor)) {
            job_links.insert(normalized);
        }
    }
    signals.ats_links = ats_links.into_iter().collect();
    signals.job_links = job_links.into_iter().collect();
    signals.job_link_count = signals.job_links.len();

    let combined = format!("{} {} {}", signals.title, signals.meta, signals.text)
        .trim()
        .to_lowercase();
    signals.salary_match = SALARY_PATTERN.is_match(&combined);
    signals.location_match = LOCATION_PATTERN.is_match(&combined);
    signals.keyword_hits = count_hits(&combined, JOB_KEYWORD_PHRASES);
    signals.apply_hits = count_hits(&combined, APPLY_PHRASES);

    signals
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

struct Rule {
    matches: fn(&Signals) -> bool,
    page_type: PageType,
    reason: &'static str,
    confidence: f64,
}

/// Priority-ordered classification rules; the first match wins. Any single
/// strong signal is enough.
const RULES: &[Rule] = &[
    Rule {
        matches: |s| s.is_ats_page,
        page_type: PageType::JobList,
        reason: "ats_page",
        confidence: 0.95,
    },
    Rule {
        matches: |s| !s.ats_links.is_empty(),
        page_type: PageType::CareerRoot,
        reason: "ats_link",
        confidence: 0.90,
    },
    Rule {
        matches: |s| s.job_posting,
        page_type: PageType::JobList,
        reason: "jsonld_jobposting",
        confidence: 0.90,
    },
    Rule {
        matches: |s| s.title_match,
        page_type: PageType::JobList,
        reason: "title_pattern",
        confidence: 0.85,
    },
    Rule {
        matches: |s| s.h1_match,
        page_type: PageType::JobList,
        reason: "h1_pattern",
        confidence: 0.80,
    },
    Rule {
        matches: |s| s.url_match,
        page_type: PageType::JobList,
        reason: "url_pattern",
        confidence: 0.75,
    },
    Rule {
        matches: |s| s.apply_hits > 0,
        page_type: PageType::JobList,
        reason: "apply_button",
        confidence: 0.70,
    },
    Rule {
        matches: |s| s.salary_match,
        page_type: PageType::JobList,
        reason: "salary_pattern",
        confidence: 0.70,
    },
    Rule {
        matches: |s| s.location_match,
        page_type: PageType::JobList,
        reason: "location_pattern",
        confidence: 0.70,
    },
    Rule {
        matches: |s| s.job_link_count >= 1,
        page_type: PageType::JobList,
        reason: "job_links",
        confidence: 0.70,
    },
    Rule {
        matches: |s| s.keyword_hits > 0,
        page_type: PageType::CareerRoot,
        reason: "job_keywords",
        confidence: 0.60,
    },
];

/// Map signals to a page-type decision via the ordered rule table.
pub fn classify(signals: &Signals) -> Decision {
    for rule in RULES {
        if (rule.matches)(signals) {
            return Decision {
                page_type: rule.page_type,
                reason: rule.reason,
                confidence: rule.confidence,
            };
        }
    }
    Decision {
        page_type: PageType::NonJob,
        reason: "no_job_signals",
        confidence: 0.2,
    }
}

/// True when any classifier rule input fires; ingestion uses this to decide
/// whether a relaxed retry is worth attempting.
pub fn has_job_signals(signals: &Signals) -> bool {
    RULES.iter().any(|rule| (rule.matches)(signals))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| sel("title"));
static META_DESCRIPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| sel(r#"meta[name="description"]"#));
static H1_SELECTOR: LazyLock<Selector> = LazyLock::new(|| sel("h1"));
static JSONLD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| sel(r#"script[type="application/ld+json"]"#));
static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| sel("body"));
static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| sel("a[href]"));

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector is valid")
}

fn select_first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
}

fn element_text(el: &scraper::ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn limit_text(text: &str) -> String {
    let clean = text.trim();
    if clean.len() <= MAX_TEXT_SAMPLE {
        return clean.to_string();
    }
    let mut end = MAX_TEXT_SAMPLE;
    while !clean.is_char_boundary(end) {
        end -= 1;
    }
    clean[..end].to_string()
}

fn count_hits(text: &str, phrases: &[&str]) -> usize {
    if text.is_empty() {
        return 0;
    }
    phrases.iter().filter(|p| text.contains(*p)).count()
}

fn is_job_anchor(href: &str, text: &str) -> bool {
    let lower = format!("{} {}", href.trim(), text.trim()).to_lowercase();
    JOB_LINK_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Resolve an anchor against the page URL, skipping non-web schemes.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with("mailto:") || href.starts_with("tel:") {
        return None;
    }
    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Host equality with the `www.` prefix ignored on both sides.
pub fn same_host(base: &Url, host: &str) -> bool {
    let Some(base_host) = base.host_str() else {
        return false;
    };
    if host.is_empty() {
        return false;
    }
    strip_www(base_host) == strip_www(host)
}

fn strip_www(host: &str) -> String {
    let lower = host.to_lowercase();
    lower.strip_prefix("www.").unwrap_or(&lower).to_string()
}
