use chrono::Duration;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use scout_core::error::{AppError, ErrorKind};
use scout_core::models::{Job, NewJob, NewSource, PageType, Source};
use scout_core::traits::{JobStore, SourceStore};

use crate::config::DatabaseConfig;
use crate::job_repository::JobRepository;
use crate::source_repository::SourceRepository;
use crate::stats_repository::StatsRepository;

/// Central database facade — owns the connection pool, runs migrations,
/// and vends repository instances. It also implements the core store
/// traits so the engine can run against either this or the in-memory
/// store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL with the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseError(format!("failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn source_repo(&self) -> SourceRepository {
        SourceRepository::new(self.pool.clone())
    }

    pub fn job_repo(&self) -> JobRepository {
        JobRepository::new(self.pool.clone())
    }

    pub fn stats_repo(&self) -> StatsRepository {
        StatsRepository::new(self.pool.clone())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

impl SourceStore for Database {
    async fn add_source(&self, source: NewSource) -> Result<(i64, bool), AppError> {
        self.source_repo().add_source(source).await
    }

    async fn find_source_by_url(&self, url: &str) -> Result<Option<Source>, AppError> {
        self.source_repo().find_source_by_url(url).await
    }

    async fn get_canonical_source_by_host(&self, host: &str) -> Result<Option<Source>, AppError> {
        self.source_repo().get_canonical_source_by_host(host).await
    }

    async fn mark_source_alias(&self, source_id: i64, canonical_url: &str) -> Result<(), AppError> {
        self.source_repo()
            .mark_source_alias(source_id, canonical_url)
            .await
    }

    async fn mark_source_scraped(&self, source_id: i64) -> Result<(), AppError> {
        self.source_repo().mark_source_scraped(source_id).await
    }

    async fn mark_source_error(
        &self,
        source_id: i64,
        kind: ErrorKind,
        message: &str,
    ) -> Result<(), AppError> {
        self.source_repo()
            .mark_source_error(source_id, kind, message)
            .await
    }

    async fn clear_source_error(&self, source_id: i64) -> Result<(), AppError> {
        self.source_repo().clear_source_error(source_id).await
    }

    async fn increment_source_recheck(&self, source_id: i64) -> Result<(), AppError> {
        self.source_repo().increment_source_recheck(source_id).await
    }

    async fn mark_source_page_type(
        &self,
        source_id: i64,
        page_type: PageType,
        reason: &str,
        ats_backed: bool,
    ) -> Result<(), AppError> {
        self.source_repo()
            .mark_source_page_type(source_id, page_type, reason, ats_backed)
            .await
    }

    async fn mark_host_ats_backed(&self, host: &str) -> Result<(), AppError> {
        self.source_repo().mark_host_ats_backed(host).await
    }

    async fn is_host_ats_backed(&self, host: &str) -> Result<bool, AppError> {
        self.source_repo().is_host_ats_backed(host).await
    }

    async fn list_sources(&self, limit: i64, offset: i64) -> Result<(Vec<Source>, i64), AppError> {
        self.source_repo().list_sources(limit, offset).await
    }
}

impl JobStore for Database {
    async fn save_job(&self, job: NewJob) -> Result<(), AppError> {
        self.job_repo().save_job(job).await
    }

    async fn get_jobs(&self, limit: i64, offset: i64) -> Result<(Vec<Job>, i64, i64), AppError> {
        self.job_repo().get_jobs(limit, offset).await
    }

    async fn mark_job_applied(&self, job_id: i64) -> Result<(), AppError> {
        self.job_repo().mark_job_applied(job_id).await
    }

    async fn mark_job_rejected(&self, job_id: i64) -> Result<(), AppError> {
        self.job_repo().mark_job_rejected(job_id).await
    }

    async fn mark_job_closed(&self, job_id: i64) -> Result<(), AppError> {
        self.job_repo().mark_job_closed(job_id).await
    }

    async fn delete_old_jobs(&self, older_than: Duration) -> Result<u64, AppError> {
        self.job_repo().delete_old_jobs(older_than).await
    }
}
