//! Rule + LLM hybrid scoring of extracted postings.
//!
//! The rule score is cheap and deterministic; the LLM refines it. When the
//! LLM is unavailable the rule score stands alone, so ingestion never
//! stalls on a provider outage.

use crate::models::CandidateProfile;
use crate::traits::Matcher;

/// Keyword phrases that indicate a relevant role; hits drive the rule score.
const MATCH_KEYWORDS: &[&str] = &[
    "golang",
    "go developer",
    "go engineer",
    "backend",
    "backend engineer",
    "platform engineer",
    "infrastructure engineer",
    "distributed systems",
    "microservices",
    "grpc",
    "api",
    "software engineer",
    "site reliability",
    "sre",
];

/// Role families that are never a fit, regardless of keyword overlap.
const BLOCKED_KINDS: &[&str] = &[
    "sales",
    "account executive",
    "business development",
    "bdr",
    "sdr",
    "customer success",
    "marketing",
    "recruiter",
    "talent acquisition",
    "people operations",
    "human resources",
    "finance",
    "legal",
    "partnerships",
];

/// Locations filtered out before scoring (substring match, lowercase).
const BLOCKED_LOCATIONS: &[&str] = &[
    "india",
    "delhi",
    "mumbai",
    "bangalore",
    "bengaluru",
    "korea",
    "south korea",
    "seoul",
    "japan",
    "tokyo",
    "china",
    "beijing",
    "shanghai",
];

/// Count keyword hits and bucket them into a 0–95 score.
pub fn rule_score(text: &str) -> i32 {
    let lower = text.to_lowercase();
    let hits = MATCH_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
    match hits {
        0 => 0,
        1 => 60,
        2 => 75,
        3 => 85,
        _ => 95,
    }
}

pub fn is_blocked_kind(text: &str) -> bool {
    let lower = text.to_lowercase();
    BLOCKED_KINDS.iter().any(|kw| lower.contains(kw))
}

pub fn is_blocked_location(location: &str) -> bool {
    if location.is_empty() {
        return false;
    }
    let lower = location.to_lowercase();
    BLOCKED_LOCATIONS.iter().any(|loc| lower.contains(loc))
}

/// Scores postings against the candidate profile.
#[derive(Clone)]
pub struct Scorer<M> {
    matcher: M,
    profile: CandidateProfile,
}

impl<M: Matcher> Scorer<M> {
    pub fn new(matcher: M, profile: CandidateProfile) -> Self {
        Self { matcher, profile }
    }

    /// Score a posting: blocked kinds and keyword-free postings short out at
    /// zero; otherwise the LLM verdict is blended with the rule score as
    /// `0.4 · rule + 0.6 · llm`, floored.
    pub async fn score(&self, title: &str, description: &str) -> (i32, String) {
        let combined = format!("{title} {description}");
        if is_blocked_kind(&combined) {
            return (0, String::new());
        }

        let rule = rule_score(&combined);
        if rule == 0 {
            return (0, String::new());
        }

        match self.matcher.match_job(title, description, &self.profile).await {
            Ok(verdict) => {
                let llm = verdict.match_score.clamp(0, 100);
                let blended = (0.4 * rule as f64 + 0.6 * llm as f64) as i32;
                (blended, verdict.short_summary)
            }
            Err(err) => {
                tracing::warn!(error = %err, "LLM match failed, using rule score only");
                (rule, "Rule-based match only".to_string())
            }
        }
    }
}

/// Parse and clamp the minimum match score from its environment value.
pub fn min_match_score_from_env(raw: Option<String>) -> i32 {
    raw.and_then(|v| v.trim().parse::<i32>().ok())
        .map(|v| v.clamp(0, 100))
        .unwrap_or(60)
}
