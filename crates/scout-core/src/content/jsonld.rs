//! schema.org JobPosting detection and extraction from JSON-LD blocks.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::models::RawJob;

/// Whether a JSON-LD script body contains a JobPosting object anywhere,
/// including inside `@graph` containers and nested arrays.
pub fn contains_job_posting(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() {
        return false;
    }
    serde_json::from_str::<Value>(raw)
        .map(|payload| find_job_posting(&payload).is_some())
        .unwrap_or(false)
}

/// Locate the first JobPosting object in a decoded JSON-LD payload.
pub fn find_job_posting(payload: &Value) -> Option<&Value> {
    match payload {
        Value::Object(map) => {
            if is_job_posting_type(map.get("@type")) {
                return Some(payload);
            }
            if let Some(Value::Array(graph)) = map.get("@graph") {
                return graph.iter().find_map(find_job_posting);
            }
            None
        }
        Value::Array(items) => items.iter().find_map(find_job_posting),
        _ => None,
    }
}

/// Collect every JobPosting object in a payload, in document order.
/// Listing pages often embed one JSON-LD array with all open roles.
pub fn collect_job_postings(payload: &Value) -> Vec<&Value> {
    let mut found = Vec::new();
    collect_into(payload, &mut found);
    found
}

fn collect_into<'a>(payload: &'a Value, found: &mut Vec<&'a Value>) {
    match payload {
        Value::Object(map) => {
            if is_job_posting_type(map.get("@type")) {
                found.push(payload);
                return;
            }
            if let Some(Value::Array(graph)) = map.get("@graph") {
                for item in graph {
                    collect_into(item, found);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_into(item, found);
            }
        }
        _ => {}
    }
}

/// Convert a JobPosting object into a raw job. Returns None when the
/// payload is not a JobPosting or carries no title.
pub fn job_from_value(payload: &Value) -> Option<RawJob> {
    let posting = find_job_posting(payload)?;

    let title = string_field(posting.get("title"));
    if title.is_empty() {
        return None;
    }

    let company = match posting.get("hiringOrganization") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(org) => string_field(org.get("name")),
        None => String::new(),
    };

    Some(RawJob {
        url: string_field(posting.get("url")),
        title,
        description: string_field(posting.get("description")),
        company,
        location: location_field(posting.get("jobLocation")),
        salary_range: salary_field(posting.get("baseSalary")),
        posted_at: posting
            .get("datePosted")
            .and_then(|v| v.as_str())
            .and_then(parse_posting_date),
    })
}

/// Accepts `"@type": "JobPosting"` and the array form
/// `"@type": ["JobPosting", ...]`.
fn is_job_posting_type(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => s == "JobPosting",
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| item.as_str() == Some("JobPosting")),
        _ => false,
    }
}

/// `datePosted` appears both as RFC 3339 and as a bare `YYYY-MM-DD`.
pub fn parse_posting_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn string_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Object(map)) => match map.get("@value") {
            Some(Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

/// `jobLocation` may be an object, an array of objects, or a plain string;
/// the address parts are joined with spaces.
fn location_field(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .first()
            .map(|item| location_field(Some(item)))
            .unwrap_or_default(),
        Value::Object(map) => {
            let address = map.get("address").unwrap_or(value);
            let parts = ["addressLocality", "addressRegion", "addressCountry"]
                .iter()
                .map(|key| string_field(address.get(*key)))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>();
            parts.join(" ")
        }
        _ => String::new(),
    }
}

fn salary_field(value: Option<&Value>) -> Option<String> {
    let value = value?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => {
            let spec = map.get("value").unwrap_or(value);
            let currency = string_field(map.get("currency"));
            let min = number_field(spec.get("minValue"));
            let max = number_field(spec.get("maxValue"));
            match (min, max) {
                (Some(min), Some(max)) => format!("{currency} {min}-{max}").trim().to_string(),
                (Some(single), None) | (None, Some(single)) => {
                    format!("{currency} {single}").trim().to_string()
                }
                (None, None) => string_field(spec.get("@value")),
            }
        }
        _ => String::new(),
    };
    if text.is_empty() { None } else { Some(text) }
}

fn number_field(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_plain_jobposting() {
        assert!(contains_job_posting(r#"{"@type": "JobPosting"}"#));
        assert!(contains_job_posting(r#"{"@type": ["JobPosting", "Thing"]}"#));
        assert!(!contains_job_posting(r#"{"@type": "Organization"}"#));
        assert!(!contains_job_posting("not json"));
        assert!(!contains_job_posting(""));
    }

    #[test]
    fn detects_jobposting_inside_graph_and_arrays() {
        assert!(contains_job_posting(
            r#"{"@graph": [{"@type": "WebSite"}, {"@type": "JobPosting"}]}"#
        ));
        assert!(contains_job_posting(
            r#"[{"@type": "WebSite"}, {"@type": "JobPosting"}]"#
        ));
    }

    #[test]
    fn extracts_full_posting() {
        let payload = json!({
            "@type": "JobPosting",
            "title": "Senior Backend Engineer",
            "description": "Build APIs in Go",
            "url": "https://acme.com/careers/se-1",
            "hiringOrganization": {"name": "Acme"},
            "jobLocation": {
                "address": {
                    "addressLocality": "Berlin",
                    "addressCountry": "DE"
                }
            },
            "baseSalary": {
                "currency": "EUR",
                "value": {"minValue": 80000, "maxValue": 110000}
            },
            "datePosted": "2024-05-01"
        });
        let job = job_from_value(&payload).unwrap();
        assert_eq!(job.title, "Senior Backend Engineer");
        assert_eq!(job.company, "Acme");
        assert_eq!(job.location, "Berlin DE");
        assert_eq!(job.salary_range.as_deref(), Some("EUR 80000-110000"));
        assert_eq!(
            job.posted_at.unwrap().format("%Y-%m-%d").to_string(),
            "2024-05-01"
        );
    }

    #[test]
    fn extracts_posting_with_string_organization() {
        let payload = json!({
            "@type": "JobPosting",
            "title": "SE",
            "hiringOrganization": "Acme Inc"
        });
        let job = job_from_value(&payload).unwrap();
        assert_eq!(job.company, "Acme Inc");
        assert!(job.posted_at.is_none());
    }

    #[test]
    fn rejects_untitled_postings() {
        let payload = json!({"@type": "JobPosting", "description": "no title"});
        assert!(job_from_value(&payload).is_none());
    }

    #[test]
    fn parses_both_date_shapes() {
        assert!(parse_posting_date("2023-12-20T04:02:19+00:00").is_some());
        assert!(parse_posting_date("2023-12-20").is_some());
        assert!(parse_posting_date("yesterday").is_none());
    }
}
