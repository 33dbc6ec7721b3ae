use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};

use scout_core::error::{AppError, ErrorKind};
use scout_core::models::{NewSource, PageType, Source, SourceType};
use scout_core::urlutil;

use crate::{normalize_pagination, truncate_message};

const ERROR_MESSAGE_MAX: usize = 800;

/// Repository for source persistence in PostgreSQL.
#[derive(Clone)]
pub struct SourceRepository {
    pool: Pool<Postgres>,
}

impl SourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a source by normalized URL. On conflict every classification
    /// field is refreshed and `last_checked_at` is bumped; `discovered_at`
    /// and `recheck_count` are preserved. Returns `(id, existed)`.
    pub async fn add_source(&self, source: NewSource) -> Result<(i64, bool), AppError> {
        let (normalized, host) = urlutil::normalize(&source.url)
            .unwrap_or_else(|_| (source.url.clone(), String::new()));

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM sources WHERE normalized_url = $1 OR url = $2")
                .bind(&normalized)
                .bind(&source.url)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if let Some((id,)) = existing {
            sqlx::query(
                r#"
                UPDATE sources
                SET url = $1,
                    normalized_url = $2,
                    host = $3,
                    type = $4,
                    page_type = $5,
                    is_alias = $6,
                    canonical_url = $7,
                    is_job_site = $8,
                    tech_related = $9,
                    confidence = $10,
                    classification_reason = $11,
                    ats_backed = $12,
                    last_checked_at = NOW()
                WHERE id = $13
                "#,
            )
            .bind(&source.url)
            .bind(&normalized)
            .bind(&host)
            .bind(source.source_type.as_str())
            .bind(source.page_type.as_str())
            .bind(source.is_alias)
            .bind(&source.canonical_url)
            .bind(source.is_job_site)
            .bind(source.tech_related)
            .bind(source.confidence)
            .bind(&source.reason)
            .bind(source.ats_backed)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
            return Ok((id, true));
        }

        // The unique index on normalized_url makes concurrent inserts
        // converge onto one row.
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO sources (
                url, normalized_url, host, type, page_type, is_alias,
                canonical_url, is_job_site, tech_related, confidence,
                classification_reason, ats_backed, last_checked_at, discovered_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
            ON CONFLICT (normalized_url) DO UPDATE SET last_checked_at = NOW()
            RETURNING id
            "#,
        )
        .bind(&source.url)
        .bind(&normalized)
        .bind(&host)
        .bind(source.source_type.as_str())
        .bind(source.page_type.as_str())
        .bind(source.is_alias)
        .bind(&source.canonical_url)
        .bind(source.is_job_site)
        .bind(source.tech_related)
        .bind(source.confidence)
        .bind(&source.reason)
        .bind(source.ats_backed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok((row.0, false))
    }

    pub async fn find_source_by_url(&self, url: &str) -> Result<Option<Source>, AppError> {
        let normalized = urlutil::normalize(url)
            .map(|(n, _)| n)
            .unwrap_or_else(|_| url.to_string());

        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT * FROM sources
            WHERE normalized_url = $1 OR url = $1 OR url = $2
            LIMIT 1
            "#,
        )
        .bind(&normalized)
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    pub async fn get_canonical_source_by_host(
        &self,
        host: &str,
    ) -> Result<Option<Source>, AppError> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT * FROM sources
            WHERE host = $1
              AND is_alias = FALSE
              AND is_job_site = TRUE
              AND page_type IN ('career_root', 'job_list')
            ORDER BY discovered_at ASC
            LIMIT 1
            "#,
        )
        .bind(host)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    pub async fn mark_source_alias(
        &self,
        source_id: i64,
        canonical_url: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE sources
            SET is_alias = TRUE, canonical_url = NULLIF($1, ''), last_checked_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(canonical_url)
        .bind(source_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_source_scraped(&self, source_id: i64) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE sources SET last_scraped_at = NOW(), last_checked_at = NOW() WHERE id = $1",
        )
        .bind(source_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_source_error(
        &self,
        source_id: i64,
        kind: ErrorKind,
        message: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE sources
            SET last_error_type = $1,
                last_error_message = $2,
                last_error_at = NOW(),
                last_checked_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(kind.as_str())
        .bind(truncate_message(message, ERROR_MESSAGE_MAX))
        .bind(source_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn clear_source_error(&self, source_id: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE sources
            SET last_error_type = NULL, last_error_message = NULL, last_error_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(source_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn increment_source_recheck(&self, source_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE sources SET recheck_count = recheck_count + 1 WHERE id = $1")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_source_page_type(
        &self,
        source_id: i64,
        page_type: PageType,
        reason: &str,
        ats_backed: bool,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE sources
            SET page_type = $1,
                classification_reason = $2,
                ats_backed = ats_backed OR $3,
                last_checked_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(page_type.as_str())
        .bind(reason)
        .bind(ats_backed)
        .bind(source_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_host_ats_backed(&self, host: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE sources SET ats_backed = TRUE WHERE host = $1")
            .bind(host)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn is_host_ats_backed(&self, host: &str) -> Result<bool, AppError> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM sources WHERE host = $1 AND ats_backed = TRUE)",
        )
        .bind(host)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.0)
    }

    /// Approved scrapeable sources, least-recently-scraped first so new
    /// sources get their first pass ahead of refreshes.
    pub async fn list_sources(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Source>, i64), AppError> {
        let (limit, offset) = normalize_pagination(limit, offset);

        let total: (i64,) = sqlx::query_as(
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

        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT * FROM sources
            WHERE is_job_site = TRUE
              AND is_alias = FALSE
              AND page_type IN ('career_root', 'job_list')
            ORDER BY last_scraped_at NULLS FIRST, last_checked_at NULLS FIRST
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct SourceRow {
    id: i64,
    url: String,
    normalized_url: String,
    host: String,
    #[sqlx(rename = "type")]
    source_type: String,
    page_type: String,
    is_alias: bool,
    canonical_url: Option<String>,
    is_job_site: bool,
    tech_related: bool,
    confidence: f64,
    classification_reason: String,
    ats_backed: bool,
    recheck_count: i32,
    last_error_type: Option<String>,
    last_error_message: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
    last_checked_at: Option<DateTime<Utc>>,
    last_scraped_at: Option<DateTime<Utc>>,
    discovered_at: Option<DateTime<Utc>>,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        Source {
            id: row.id,
            url: row.url,
            normalized_url: row.normalized_url,
            host: row.host,
            source_type: row.source_type.parse().unwrap_or(SourceType::Unknown),
            page_type: row.page_type.parse().unwrap_or(PageType::Candidate),
            is_alias: row.is_alias,
            canonical_url: row.canonical_url,
            is_job_site: row.is_job_site,
            tech_related: row.tech_related,
            confidence: row.confidence,
            classification_reason: row.classification_reason,
            ats_backed: row.ats_backed,
            recheck_count: row.recheck_count,
            last_error_type: row.last_error_type,
            last_error_message: row.last_error_message,
            last_error_at: row.last_error_at,
            last_checked_at: row.last_checked_at,
            last_scraped_at: row.last_scraped_at,
            discovered_at: row.discovered_at,
        }
    }
}
