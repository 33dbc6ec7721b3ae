use std::future::Future;

use chrono::Duration;

use crate::error::{AppError, ErrorKind};
use crate::models::{CandidateProfile, Job, JobMatch, NewJob, NewSource, PageType, Source};
use crate::urlutil;

/// A fetched page body with its final HTTP status.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
    pub status: u16,
}

/// Fetches page content over HTTP, politely.
pub trait PageFetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage, AppError>> + Send;
}

/// Scores a posting against the candidate profile via an LLM.
pub trait Matcher: Send + Sync + Clone {
    fn match_job(
        &self,
        title: &str,
        description: &str,
        profile: &CandidateProfile,
    ) -> impl Future<Output = Result<JobMatch, AppError>> + Send;
}

/// Persists and queries discovered sources.
///
/// `add_source` is an idempotent upsert keyed on the normalized URL; every
/// implementation must refresh classification fields and `last_checked_at`
/// on conflict so a re-discovered source converges to one row.
pub trait SourceStore: Send + Sync + Clone {
    /// Upsert a source. Returns `(id, existed)`.
    fn add_source(
        &self,
        source: NewSource,
    ) -> impl Future<Output = Result<(i64, bool), AppError>> + Send;

    fn find_source_by_url(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<Source>, AppError>> + Send;

    /// The oldest non-alias career_root/job_list row for a host, if any.
    fn get_canonical_source_by_host(
        &self,
        host: &str,
    ) -> impl Future<Output = Result<Option<Source>, AppError>> + Send;

    fn mark_source_alias(
        &self,
        source_id: i64,
        canonical_url: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn mark_source_scraped(
        &self,
        source_id: i64,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn mark_source_error(
        &self,
        source_id: i64,
        kind: ErrorKind,
        message: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn clear_source_error(
        &self,
        source_id: i64,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn increment_source_recheck(
        &self,
        source_id: i64,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Re-classify an existing row in place (ingestion demotions).
    fn mark_source_page_type(
        &self,
        source_id: i64,
        page_type: PageType,
        reason: &str,
        ats_backed: bool,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn mark_host_ats_backed(
        &self,
        host: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn is_host_ats_backed(
        &self,
        host: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Approved, non-alias, scrapeable sources, least-recently-scraped
    /// first. Returns `(sources, total)`.
    fn list_sources(
        &self,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Result<(Vec<Source>, i64), AppError>> + Send;

    /// Decide which URL owns a host's canonical slot.
    ///
    /// Only career_root/job_list URLs compete. If the host has no canonical
    /// yet, the caller wins. Otherwise the lower [`career_root_priority`]
    /// wins, ties going to the incumbent; a dethroned incumbent is marked as
    /// an alias of the caller. Returns `(canonical_url, caller_is_alias)`.
    ///
    /// [`career_root_priority`]: crate::urlutil::career_root_priority
    fn resolve_canonical_source(
        &self,
        normalized_url: &str,
        host: &str,
        page_type: PageType,
    ) -> impl Future<Output = Result<(String, bool), AppError>> + Send
    where
        Self: Sized,
    {
        async move {
            if !page_type.is_scrapeable() || host.is_empty() {
                return Ok((normalized_url.to_string(), false));
            }
            let Some(existing) = self.get_canonical_source_by_host(host).await? else {
                return Ok((normalized_url.to_string(), false));
            };
            // The caller may already hold the slot; never alias a row to
            // itself.
            if existing.normalized_url == normalized_url || existing.url == normalized_url {
                return Ok((normalized_url.to_string(), false));
            }

            let existing_priority = urlutil::career_root_priority(&existing.url);
            let new_priority = urlutil::career_root_priority(normalized_url);
            if existing_priority <= new_priority {
                return Ok((existing.url, true));
            }

            self.mark_source_alias(existing.id, normalized_url).await?;
            Ok((normalized_url.to_string(), false))
        }
    }
}

/// Persists and queries extracted job postings.
pub trait JobStore: Send + Sync + Clone {
    /// Idempotent upsert keyed on the job URL. `posted_at` is monotone:
    /// an existing value is never overwritten.
    fn save_job(&self, job: NewJob) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Returns `(jobs, total, active_total)` ordered by applied status,
    /// match score, then effective posting date.
    fn get_jobs(
        &self,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Result<(Vec<Job>, i64, i64), AppError>> + Send;

    fn mark_job_applied(&self, job_id: i64) -> impl Future<Output = Result<(), AppError>> + Send;

    fn mark_job_rejected(&self, job_id: i64)
        -> impl Future<Output = Result<(), AppError>> + Send;

    fn mark_job_closed(&self, job_id: i64) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Delete jobs whose effective date (`posted_at` falling back to
    /// `created_at`) is older than the cutoff. Returns the deleted count.
    fn delete_old_jobs(
        &self,
        older_than: Duration,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;
}
