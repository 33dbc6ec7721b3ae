use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a source URL within the discovery lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    /// Under analysis, not yet classified.
    Candidate,
    /// Introduces an organization's open roles without listing them all.
    CareerRoot,
    /// Enumerates open postings (ATS company boards, `/jobs`, `/openings`).
    JobList,
    /// A single posting page.
    JobDetail,
    NonJob,
    /// Rejected once; eligible for a single recheck.
    NonJobLowConfidence,
    /// Rejected after a recheck or superseded by an ATS delegation.
    NonJobHighConfidence,
    /// Terminal rejection; never re-promoted.
    NonJobPermanent,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Candidate => "candidate",
            PageType::CareerRoot => "career_root",
            PageType::JobList => "job_list",
            PageType::JobDetail => "job_detail",
            PageType::NonJob => "non_job",
            PageType::NonJobLowConfidence => "non_job_low_confidence",
            PageType::NonJobHighConfidence => "non_job_high_confidence",
            PageType::NonJobPermanent => "non_job_permanent",
        }
    }

    /// Page types that feed the ingestion worker.
    pub fn is_scrapeable(&self) -> bool {
        matches!(self, PageType::CareerRoot | PageType::JobList)
    }

    /// Terminal rejections that discovery must not revisit.
    pub fn is_terminal_rejection(&self) -> bool {
        matches!(
            self,
            PageType::NonJobHighConfidence | PageType::NonJobPermanent
        )
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candidate" => Ok(PageType::Candidate),
            "career_root" => Ok(PageType::CareerRoot),
            "job_list" => Ok(PageType::JobList),
            "job_detail" => Ok(PageType::JobDetail),
            "non_job" => Ok(PageType::NonJob),
            "non_job_low_confidence" => Ok(PageType::NonJobLowConfidence),
            "non_job_high_confidence" => Ok(PageType::NonJobHighConfidence),
            "non_job_permanent" => Ok(PageType::NonJobPermanent),
            _ => Err(format!("unknown page type: {s}")),
        }
    }
}

/// Broad origin of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    JobBoard,
    CompanyPage,
    Unknown,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::JobBoard => "job_board",
            SourceType::CompanyPage => "company_page",
            SourceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job_board" => Ok(SourceType::JobBoard),
            "company_page" => Ok(SourceType::CompanyPage),
            "unknown" | "" => Ok(SourceType::Unknown),
            _ => Err(format!("unknown source type: {s}")),
        }
    }
}

/// A discovered source URL and its classification state.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: i64,
    pub url: String,
    pub normalized_url: String,
    pub host: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub page_type: PageType,
    pub is_alias: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    pub is_job_site: bool,
    pub tech_related: bool,
    pub confidence: f64,
    pub classification_reason: String,
    pub ats_backed: bool,
    pub recheck_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scraped_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime<Utc>>,
}

/// Fields for inserting or refreshing a source row.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub url: String,
    pub source_type: SourceType,
    pub page_type: PageType,
    pub is_alias: bool,
    pub canonical_url: Option<String>,
    pub is_job_site: bool,
    pub tech_related: bool,
    pub confidence: f64,
    pub reason: String,
    pub ats_backed: bool,
}

impl NewSource {
    /// A candidate row awaiting content analysis.
    pub fn candidate(url: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            url: url.into(),
            source_type,
            page_type: PageType::Candidate,
            is_alias: false,
            canonical_url: None,
            is_job_site: false,
            tech_related: false,
            confidence: 0.0,
            reason: "candidate".into(),
            ats_backed: false,
        }
    }

    /// An approved, scrapeable source.
    pub fn approved(
        url: impl Into<String>,
        source_type: SourceType,
        page_type: PageType,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            source_type,
            page_type,
            is_alias: false,
            canonical_url: None,
            is_job_site: true,
            tech_related: true,
            confidence,
            reason: reason.into(),
            ats_backed: false,
        }
    }

    /// An alias row pointing at the host's canonical source.
    pub fn alias(
        url: impl Into<String>,
        source_type: SourceType,
        page_type: PageType,
        canonical_url: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            source_type,
            page_type,
            is_alias: true,
            canonical_url: Some(canonical_url.into()),
            is_job_site: false,
            tech_related: false,
            confidence: 0.0,
            reason: "alias".into(),
            ats_backed: false,
        }
    }

    /// A rejected row.
    pub fn rejected(
        url: impl Into<String>,
        source_type: SourceType,
        page_type: PageType,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            source_type,
            page_type,
            is_alias: false,
            canonical_url: None,
            is_job_site: false,
            tech_related: false,
            confidence,
            reason: reason.into(),
            ats_backed: false,
        }
    }

    pub fn with_ats_backed(mut self, ats_backed: bool) -> Self {
        self.ats_backed = ats_backed;
        self
    }
}

/// A persisted job posting.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub source_id: i64,
    pub source_url: String,
    pub source_type: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub company: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
    pub match_score: i32,
    pub match_summary: String,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    pub rejected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for upserting a job extracted from a source.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub source_id: i64,
    pub source_type: SourceType,
    pub url: String,
    pub title: String,
    pub description: String,
    pub company: String,
    pub location: String,
    pub salary_range: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub match_score: i32,
    pub match_summary: String,
}

/// A posting as returned by a site extractor, before filtering and scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawJob {
    pub url: String,
    pub title: String,
    pub description: String,
    pub company: String,
    pub location: String,
    pub salary_range: Option<String>,
    /// None when the source does not expose posting dates.
    pub posted_at: Option<DateTime<Utc>>,
}

/// One append-only stats sample.
#[derive(Debug, Clone, Serialize)]
pub struct StatPoint {
    pub metric: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

/// The candidate profile jobs are ranked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub tech_stack: Vec<String>,
}

impl Default for CandidateProfile {
    fn default() -> Self {
        Self {
            tech_stack: vec![
                "golang".into(),
                "backend".into(),
                "grpc".into(),
                "rest".into(),
                "postgresql".into(),
                "redis".into(),
                "docker".into(),
                "linux".into(),
            ],
        }
    }
}

/// LLM verdict on how well a posting fits the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMatch {
    pub match_score: i32,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub short_summary: String,
}
