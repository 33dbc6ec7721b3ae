use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};

use scout_core::error::AppError;
use scout_core::models::StatPoint;
use scout_core::stats::StatsSnapshot;

use crate::normalize_pagination;

/// Metrics accepted by the history endpoint. Everything written by
/// `save_snapshot` must appear here.
pub const KNOWN_METRICS: &[&str] = &[
    "pages_crawled",
    "urls_discovered",
    "jobs_discovered",
    "jobs_extracted",
    "ai_calls",
    "errors_total",
    "sources_promoted",
    "ats_detected",
    "sources_zero_jobs",
    "crawl_seconds_avg",
    "sources_total",
    "jobs_total",
    "active_jobs",
];

/// Append-only stats samples.
#[derive(Clone)]
pub struct StatsRepository {
    pool: Pool<Postgres>,
}

impl StatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store totals read alongside the counter snapshot.
    pub async fn get_stats_counts(&self) -> Result<(i64, i64, i64), AppError> {
        let sources: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM sources
            WHERE is_job_site = TRUE
              AND is_alias = FALSE
              AND page_type IN ('career_root', 'job_list')
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let jobs: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let active: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE rejected = FALSE AND closed = FALSE")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok((sources.0, jobs.0, active.0))
    }

    /// Append one sample per metric. Read time is snapshot time.
    pub async fn save_snapshot(
        &self,
        snapshot: &StatsSnapshot,
        sources_total: i64,
        jobs_total: i64,
        active_jobs: i64,
    ) -> Result<(), AppError> {
        let samples: [(&str, f64); 13] = [
            ("pages_crawled", snapshot.pages_crawled as f64),
            ("urls_discovered", snapshot.urls_discovered as f64),
            ("jobs_discovered", snapshot.jobs_discovered as f64),
            ("jobs_extracted", snapshot.jobs_extracted as f64),
            ("ai_calls", snapshot.ai_calls as f64),
            ("errors_total", snapshot.errors_total as f64),
            ("sources_promoted", snapshot.sources_promoted as f64),
            ("ats_detected", snapshot.ats_detected as f64),
            ("sources_zero_jobs", snapshot.sources_zero_jobs as f64),
            ("crawl_seconds_avg", snapshot.crawl_seconds_avg),
            ("sources_total", sources_total as f64),
            ("jobs_total", jobs_total as f64),
            ("active_jobs", active_jobs as f64),
        ];

        for (metric, value) in samples {
            sqlx::query("INSERT INTO stats_snapshots (metric, value) VALUES ($1, $2)")
                .bind(metric)
                .bind(value)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        }
        Ok(())
    }

    /// History for one metric, newest first. Unknown metrics are a typed
    /// error so the API can answer 400 instead of an empty series.
    pub async fn list_history(
        &self,
        metric: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<StatPoint>, i64), AppError> {
        if !KNOWN_METRICS.contains(&metric) {
            return Err(AppError::UnknownMetric(metric.to_string()));
        }
        let (limit, offset) = normalize_pagination(limit, offset);

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM stats_snapshots WHERE metric = $1")
                .bind(metric)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let rows = sqlx::query_as::<_, StatRow>(
            r#"
            SELECT metric, value, created_at
            FROM stats_snapshots
            WHERE metric = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(metric)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

#[derive(sqlx::FromRow)]
struct StatRow {
    metric: String,
    value: f64,
    created_at: DateTime<Utc>,
}

impl From<StatRow> for StatPoint {
    fn from(row: StatRow) -> Self {
        StatPoint {
            metric: row.metric,
            value: row.value,
            created_at: row.created_at,
        }
    }
}
