use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Pool, Postgres};

use scout_core::error::AppError;
use scout_core::models::{Job, NewJob};

use crate::normalize_pagination;

/// Repository for job persistence in PostgreSQL.
#[derive(Clone)]
pub struct JobRepository {
    pool: Pool<Postgres>,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert on the job URL. A stored `posted_at` is kept over
    /// the incoming one so the first observed posting date sticks.
    pub async fn save_job(&self, job: NewJob) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                source_id, source_type, url, title, description, company,
                location, salary_range, posted_at, match_score, match_summary,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
            ON CONFLICT (url) DO UPDATE
            SET source_id = EXCLUDED.source_id,
                source_type = COALESCE(EXCLUDED.source_type, jobs.source_type),
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                company = EXCLUDED.company,
                location = EXCLUDED.location,
                salary_range = COALESCE(EXCLUDED.salary_range, jobs.salary_range),
                posted_at = COALESCE(jobs.posted_at, EXCLUDED.posted_at),
                match_score = EXCLUDED.match_score,
                match_summary = EXCLUDED.match_summary,
                updated_at = NOW()
            "#,
        )
        .bind(job.source_id)
        .bind(job.source_type.as_str())
        .bind(&job.url)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.salary_range)
        .bind(job.posted_at)
        .bind(job.match_score)
        .bind(&job.match_summary)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Jobs ordered for review: unapplied first, best matches first,
    /// newest postings first. Returns `(jobs, total, active_total)`.
    pub async fn get_jobs(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Job>, i64, i64), AppError> {
        let (limit, offset) = normalize_pagination(limit, offset);

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let active: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE rejected = FALSE AND closed = FALSE")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT
                j.id, j.source_id,
                COALESCE(s.url, '') AS source_url,
                COALESCE(j.source_type, s.type, '') AS source_type,
                j.url, j.title, j.description, j.company, j.location,
                j.salary_range, j.match_score, j.match_summary,
                j.applied, j.applied_at, j.rejected, j.rejected_at,
                j.closed, j.closed_at, j.posted_at, j.created_at, j.updated_at
            FROM jobs j
            LEFT JOIN sources s ON s.id = j.source_id
            ORDER BY j.applied ASC,
                     j.match_score DESC,
                     COALESCE(j.posted_at, j.created_at) DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok((
            rows.into_iter().map(Into::into).collect(),
            total.0,
            active.0,
        ))
    }

    pub async fn mark_job_applied(&self, job_id: i64) -> Result<(), AppError> {
        self.set_flag(job_id, "applied", "applied_at").await
    }

    pub async fn mark_job_rejected(&self, job_id: i64) -> Result<(), AppError> {
        self.set_flag(job_id, "rejected", "rejected_at").await
    }

    pub async fn mark_job_closed(&self, job_id: i64) -> Result<(), AppError> {
        self.set_flag(job_id, "closed", "closed_at").await
    }

    async fn set_flag(&self, job_id: i64, flag: &str, at: &str) -> Result<(), AppError> {
        // Column names come from the three callers above, never from input.
        let query =
            format!("UPDATE jobs SET {flag} = TRUE, {at} = NOW(), updated_at = NOW() WHERE id = $1");
        sqlx::query(&query)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Retention sweep over the effective posting date.
    pub async fn delete_old_jobs(&self, older_than: Duration) -> Result<u64, AppError> {
        let cutoff = Utc::now() - older_than;
        let result = sqlx::query("DELETE FROM jobs WHERE COALESCE(posted_at, created_at) < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    source_id: i64,
    source_url: String,
    source_type: String,
    url: String,
    title: String,
    description: String,
    company: String,
    location: String,
    salary_range: Option<String>,
    match_score: i32,
    match_summary: String,
    applied: bool,
    applied_at: Option<DateTime<Utc>>,
    rejected: bool,
    rejected_at: Option<DateTime<Utc>>,
    closed: bool,
    closed_at: Option<DateTime<Utc>>,
    posted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            id: row.id,
            source_id: row.source_id,
            source_url: row.source_url,
            source_type: row.source_type,
            url: row.url,
            title: row.title,
            description: row.description,
            company: row.company,
            location: row.location,
            salary_range: row.salary_range,
            match_score: row.match_score,
            match_summary: row.match_summary,
            applied: row.applied,
            applied_at: row.applied_at,
            rejected: row.rejected,
            rejected_at: row.rejected_at,
            closed: row.closed,
            closed_at: row.closed_at,
            posted_at: row.posted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
