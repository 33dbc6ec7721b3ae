use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use scout_core::models::{Job, Source, StatPoint};
use scout_core::stats::StatsSnapshot;
use scout_engine::IntakeOutcome;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PaginationQuery {
    /// Page size, clamped to [1, 200]. Defaults to 20.
    pub limit: Option<i64>,
    /// Non-negative row offset. Defaults to 0.
    pub offset: Option<i64>,
}

impl PaginationQuery {
    pub fn resolve(&self) -> (i64, i64) {
        let limit = match self.limit {
            Some(limit) if limit > 0 => limit.min(200),
            _ => 20,
        };
        (limit, self.offset.unwrap_or(0).max(0))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatsHistoryQuery {
    /// Metric name; must be one of the tracked metrics.
    pub metric: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
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
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            source_id: job.source_id,
            source_url: job.source_url,
            source_type: job.source_type,
            url: job.url,
            title: job.title,
            description: job.description,
            company: job.company,
            location: job.location,
            salary_range: job.salary_range,
            match_score: job.match_score,
            match_summary: job.match_summary,
            applied: job.applied,
            applied_at: job.applied_at,
            rejected: job.rejected,
            rejected_at: job.rejected_at,
            closed: job.closed,
            closed_at: job.closed_at,
            posted_at: job.posted_at,
            created_at: job.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    pub items: Vec<JobResponse>,
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
    pub active_total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SourceResponse {
    pub id: i64,
    pub url: String,
    pub normalized_url: String,
    pub host: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub page_type: String,
    pub is_alias: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    pub is_job_site: bool,
    pub tech_related: bool,
    pub confidence: f64,
    pub classification_reason: String,
    pub ats_backed: bool,
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

impl From<Source> for SourceResponse {
    fn from(source: Source) -> Self {
        Self {
            id: source.id,
            url: source.url,
            normalized_url: source.normalized_url,
            host: source.host,
            source_type: source.source_type.as_str().to_string(),
            page_type: source.page_type.as_str().to_string(),
            is_alias: source.is_alias,
            canonical_url: source.canonical_url,
            is_job_site: source.is_job_site,
            tech_related: source.tech_related,
            confidence: source.confidence,
            classification_reason: source.classification_reason,
            ats_backed: source.ats_backed,
            last_error_type: source.last_error_type,
            last_error_message: source.last_error_message,
            last_error_at: source.last_error_at,
            last_checked_at: source.last_checked_at,
            last_scraped_at: source.last_scraped_at,
            discovered_at: source.discovered_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SourceListResponse {
    pub items: Vec<SourceResponse>,
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddSourceRequest {
    pub url: String,
    #[serde(default)]
    pub source_type: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddSourceResponse {
    pub is_job_site: bool,
    pub tech_related: bool,
    pub confidence: f64,
    pub reason: String,
    pub existed: bool,
}

impl From<IntakeOutcome> for AddSourceResponse {
    fn from(outcome: IntakeOutcome) -> Self {
        Self {
            is_job_site: outcome.is_job_site,
            tech_related: outcome.tech_related,
            confidence: outcome.confidence,
            reason: outcome.reason,
            existed: outcome.existed,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobActionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub pages_crawled: u64,
    pub urls_discovered: u64,
    pub jobs_discovered: u64,
    pub jobs_extracted: u64,
    pub ai_calls: u64,
    pub errors_total: u64,
    pub crawl_avg_seconds: f64,
    pub sources_promoted: u64,
    pub ats_detected: u64,
    pub sources_zero_jobs: u64,
    pub sources_total: i64,
    pub jobs_total: i64,
    pub active_jobs: i64,
}

impl StatsResponse {
    pub fn from_snapshot(
        snapshot: &StatsSnapshot,
        sources_total: i64,
        jobs_total: i64,
        active_jobs: i64,
    ) -> Self {
        Self {
            pages_crawled: snapshot.pages_crawled,
            urls_discovered: snapshot.urls_discovered,
            jobs_discovered: snapshot.jobs_discovered,
            jobs_extracted: snapshot.jobs_extracted,
            ai_calls: snapshot.ai_calls,
            errors_total: snapshot.errors_total,
            crawl_avg_seconds: snapshot.crawl_seconds_avg,
            sources_promoted: snapshot.sources_promoted,
            ats_detected: snapshot.ats_detected,
            sources_zero_jobs: snapshot.sources_zero_jobs,
            sources_total,
            jobs_total,
            active_jobs,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatPointResponse {
    pub metric: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

impl From<StatPoint> for StatPointResponse {
    fn from(point: StatPoint) -> Self {
        Self {
            metric: point.metric,
            value: point.value,
            created_at: point.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsHistoryResponse {
    pub metric: String,
    pub items: Vec<StatPointResponse>,
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let q = PaginationQuery {
            limit: None,
            offset: None,
        };
        assert_eq!(q.resolve(), (20, 0));

        let q = PaginationQuery {
            limit: Some(1000),
            offset: Some(-4),
        };
        assert_eq!(q.resolve(), (200, 0));

        let q = PaginationQuery {
            limit: Some(0),
            offset: Some(40),
        };
        assert_eq!(q.resolve(), (20, 40));
    }
}
