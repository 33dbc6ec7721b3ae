//! URL normalization and path-based page-type inference.
//!
//! Everything here is pure: no I/O, no state. The discovery engine, the
//! ingestion worker, and the API all funnel URLs through [`normalize`] so
//! that a source is identified by exactly one string.

use url::Url;

use crate::error::AppError;
use crate::models::PageType;

const MAX_DISCOVERY_DEPTH: usize = 6;

/// Single-segment paths that introduce an organization's open roles.
const CAREER_ROOT_SEGMENTS: &[&str] = &[
    "careers",
    "jobs",
    "join-us",
    "joinus",
    "work-with-us",
    "workwithus",
];

/// Segments that enumerate postings when they terminate a path.
const JOB_LIST_SEGMENTS: &[&str] = &[
    "jobs",
    "careers",
    "openings",
    "positions",
    "vacancies",
    "job-openings",
    "job-board",
    "jobs-board",
];

/// First-class non-job sections of a company site.
const BLOCKED_SEGMENTS: &[&str] = &[
    "blog",
    "blogs",
    "events",
    "event",
    "summit",
    "resources",
    "resource",
    "press",
    "news",
    "docs",
    "documentation",
    "support",
    "help",
    "legal",
    "privacy",
    "terms",
    "security",
    "engineering",
];

const STATIC_EXTENSIONS: &[&str] = &[
    ".css", ".gif", ".ico", ".jpeg", ".jpg", ".js", ".mp3", ".mp4", ".pdf", ".png", ".svg",
    ".ttf", ".woff", ".woff2", ".zip",
];

/// Hosted applicant-tracking systems; matching is by substring on the
/// normalized host so company subdomains are covered.
const ATS_HOSTS: &[&str] = &[
    "boards.greenhouse.io",
    "greenhouse.io",
    "jobs.lever.co",
    "lever.co",
    "jobs.ashbyhq.com",
    "ashbyhq.com",
    "workdayjobs.com",
    "myworkdayjobs.com",
    "smartrecruiters.com",
    "bamboohr.com",
    "workable.com",
];

/// Dedicated job boards that skip content analysis entirely.
const KNOWN_JOB_BOARDS: &[&str] = &["remoteok.com", "weworkremotely.com", "builtin.com"];

/// Tracking query keys dropped during normalization.
fn is_tracking_key(key: &str) -> bool {
    let lk = key.to_lowercase();
    lk.starts_with("utm_") || lk == "gclid" || lk == "fbclid" || lk == "ref" || lk == "source"
}

/// Normalize a raw URL into its canonical identity and host.
///
/// Lowercases the host and strips a leading `www.`, defaults the scheme to
/// https, drops the fragment, collapses the path, removes a locale prefix
/// in front of a career segment, strips tracking query keys, and re-orders
/// the remaining query keys alphabetically. Idempotent.
pub fn normalize(raw: &str) -> Result<(String, String), AppError> {
    let mut url = parse_with_default_scheme(raw)?;

    let host = url
        .host_str()
        .map(normalize_host)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::UrlError(format!("missing host: {raw}")))?;
    url.set_host(Some(&host))
        .map_err(|e| AppError::UrlError(format!("{raw}: {e}")))?;

    url.set_fragment(None);
    let path = strip_locale_prefix(&normalize_path(url.path()));
    url.set_path(&path);

    let query = normalize_query(&url);
    url.set_query(query.as_deref());

    Ok((url.to_string(), host))
}

/// Like [`normalize`], but ATS URLs are truncated to the company slug.
///
/// `https://boards.greenhouse.io/acme/jobs/123` identifies the same board as
/// `https://boards.greenhouse.io/acme`; keeping only the slug makes those
/// collapse into one source. Greenhouse `embed` paths are kept verbatim.
pub fn normalize_ats(raw: &str) -> Result<(String, String), AppError> {
    let (normalized, host) = normalize(raw)?;
    if !is_ats_host(&host) {
        return Ok((normalized, host));
    }
    let mut url =
        Url::parse(&normalized).map_err(|e| AppError::UrlError(format!("{normalized}: {e}")))?;

    let segments = split_path(url.path());
    let truncatable = host.contains("lever.co")
        || host.contains("ashbyhq.com")
        || (host.contains("greenhouse.io") && segments.first().map(String::as_str) != Some("embed"));
    if truncatable {
        if let Some(slug) = segments.first() {
            url.set_path(&format!("/{slug}"));
        }
    }

    url.set_query(None);
    url.set_fragment(None);
    Ok((url.to_string(), host))
}

/// Infer a page type from the URL path alone, without fetching.
pub fn detect_page_type(raw: &str) -> PageType {
    let Ok((normalized, host)) = normalize(raw) else {
        return PageType::NonJob;
    };
    let Ok(url) = Url::parse(&normalized) else {
        return PageType::NonJob;
    };
    let segments = split_path(url.path());

    if is_ats_host(&host) {
        if segments.is_empty() {
            return PageType::NonJob;
        }
        if segments.len() == 1 {
            return PageType::JobList;
        }
        if segments
            .last()
            .is_some_and(|seg| is_job_list_segment(seg))
        {
            return PageType::JobList;
        }
        return PageType::JobDetail;
    }

    if segments.is_empty() || is_blocked_path(&segments) {
        return PageType::NonJob;
    }

    if segments.len() == 1 && is_career_root_segment(&segments[0]) {
        if segments[0] == "jobs" {
            return PageType::JobList;
        }
        return PageType::CareerRoot;
    }

    if is_job_list_path(&segments) {
        return PageType::JobList;
    }

    if is_job_detail_path(&segments) {
        return PageType::JobDetail;
    }

    PageType::NonJob
}

/// Whether a host belongs to a hosted applicant-tracking system.
pub fn is_ats_host(host: &str) -> bool {
    let h = normalize_host(host);
    ATS_HOSTS.iter().any(|ats| h.contains(ats))
}

/// Whether a host is on the dedicated job-board allowlist.
pub fn is_known_job_board(host: &str) -> bool {
    let h = normalize_host(host);
    KNOWN_JOB_BOARDS.iter().any(|board| h.contains(board))
}

/// Whether a URL points at page content rather than a static asset.
pub fn is_crawlable(raw: &str) -> bool {
    let Ok((normalized, host)) = normalize(raw) else {
        return false;
    };
    if host.is_empty() {
        return false;
    }
    let Ok(url) = Url::parse(&normalized) else {
        return false;
    };
    !is_static_asset_path(url.path())
}

/// Whether a URL is worth handing to the discovery engine at all.
///
/// ATS hosts are always eligible. Everything else must not be a static
/// asset and must sit at most six path segments deep.
pub fn is_discovery_eligible(raw: &str) -> bool {
    let Ok((normalized, host)) = normalize(raw) else {
        return false;
    };
    if is_ats_host(&host) {
        return true;
    }
    let Ok(url) = Url::parse(&normalized) else {
        return false;
    };
    if is_static_asset_path(url.path()) {
        return false;
    }
    split_path(url.path()).len() <= MAX_DISCOVERY_DEPTH
}

/// Preference order among a host's career URLs; lower wins the canonical
/// slot. ATS boards beat everything, `/careers` beats `/jobs`.
pub fn career_root_priority(raw: &str) -> i32 {
    let Ok((normalized, host)) = normalize(raw) else {
        return 100;
    };
    if is_ats_host(&host) {
        return 0;
    }
    let Ok(url) = Url::parse(&normalized) else {
        return 100;
    };
    let segments = split_path(url.path());
    match segments.first().map(String::as_str) {
        Some("careers") => 1,
        Some("jobs") => 2,
        Some("join-us") | Some("joinus") => 4,
        Some("work-with-us") | Some("workwithus") => 5,
        Some(_) => 10,
        None => 100,
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn parse_with_default_scheme(raw: &str) -> Result<Url, AppError> {
    if raw.trim().is_empty() {
        return Err(AppError::UrlError("empty url".into()));
    }
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{raw}"))
            .map_err(|e| AppError::UrlError(format!("{raw}: {e}"))),
        Err(e) => Err(AppError::UrlError(format!("{raw}: {e}"))),
    }
}

fn normalize_host(host: &str) -> String {
    let lower = host.to_lowercase();
    lower.strip_prefix("www.").unwrap_or(&lower).to_string()
}

/// Collapse `.`/`..` segments and trim the trailing slash (except root).
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Drop a `en` / `en-us` style prefix when it fronts a career segment, so
/// `/en/careers` and `/careers` collapse into one source.
fn strip_locale_prefix(path: &str) -> String {
    let segments = split_path(path);
    if segments.len() < 2 || !is_locale(&segments[0]) {
        return path.to_string();
    }
    if is_career_root_segment(&segments[1]) || is_job_list_segment(&segments[1]) {
        return format!("/{}", segments[1..].join("/"));
    }
    path.to_string()
}

fn normalize_query(url: &Url) -> Option<String> {
    url.query()?;
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_key(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        return None;
    }
    // Stable sort keeps repeated keys in their original value order.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in &pairs {
        serializer.append_pair(k, v);
    }
    Some(serializer.finish())
}

fn split_path(path: &str) -> Vec<String> {
    path.trim_matches('/')
        .split('/')
        .filter(|seg| !seg.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn is_static_asset_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    STATIC_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn is_locale(seg: &str) -> bool {
    let bytes = seg.as_bytes();
    match bytes.len() {
        2 => is_alpha(seg),
        5 => bytes[2] == b'-' && is_alpha(&seg[..2]) && is_alpha(&seg[3..]),
        _ => false,
    }
}

fn is_alpha(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase())
}

fn is_career_root_segment(seg: &str) -> bool {
    CAREER_ROOT_SEGMENTS.contains(&seg)
}

fn is_job_list_segment(seg: &str) -> bool {
    JOB_LIST_SEGMENTS.contains(&seg)
}

fn is_job_list_path(segments: &[String]) -> bool {
    if segments.len() == 1 && is_job_list_segment(&segments[0]) {
        return true;
    }
    segments.len() == 2 && segments[0] == "careers" && is_job_list_segment(&segments[1])
}

/// A job-list segment followed by a non-keyword segment reads as a single
/// posting (`/careers/senior-engineer`).
fn is_job_detail_path(segments: &[String]) -> bool {
    for (i, seg) in segments.iter().enumerate() {
        if (is_job_list_segment(seg) || seg == "careers")
            && segments
                .get(i + 1)
                .is_some_and(|next| !is_job_list_segment(next))
        {
            return true;
        }
    }
    false
}

/// A path under a blocked section is non-job unless some segment is an
/// explicit career/job keyword.
fn is_blocked_path(segments: &[String]) -> bool {
    if segments.is_empty() {
        return true;
    }
    if contains_job_segment(segments) {
        return false;
    }
    segments
        .iter()
        .any(|seg| BLOCKED_SEGMENTS.contains(&seg.as_str()))
}

fn contains_job_segment(segments: &[String]) -> bool {
    segments
        .iter()
        .any(|seg| is_job_list_segment(seg) || is_career_root_segment(seg) || seg == "job")
}
