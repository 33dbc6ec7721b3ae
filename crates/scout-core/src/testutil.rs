//! Test utilities: handwritten mocks for the core traits and an in-memory
//! store mirroring the SQL semantics.
//!
//! All mocks use `Arc<Mutex<_>>` for interior mutability so tests can
//! assert on recorded calls after the fact.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};

use crate::error::{AppError, ErrorKind};
use crate::models::{CandidateProfile, Job, JobMatch, NewJob, NewSource, PageType, Source};
use crate::traits::{FetchedPage, JobStore, Matcher, PageFetcher, SourceStore};
use crate::urlutil;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher with per-URL response queues.
///
/// Each call pops the next queued response for the exact URL; URLs with no
/// queue get the default body with status 200. Every fetched URL is
/// recorded.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Vec<Result<FetchedPage, AppError>>>>>,
    default_body: Arc<Mutex<String>>,
    pub fetched: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        let fetcher = Self::default();
        *fetcher.default_body.lock().unwrap() = "<html><body>default</body></html>".to_string();
        fetcher
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(Ok(FetchedPage {
                body: html.to_string(),
                status: 200,
            }));
        self
    }

    pub fn with_error(self, url: &str, error: AppError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(Err(error));
        self
    }

    pub fn with_default_body(self, html: &str) -> Self {
        *self.default_body.lock().unwrap() = html.to_string();
        self
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AppError> {
        self.fetched.lock().unwrap().push(url.to_string());

        let mut responses = self.responses.lock().unwrap();
        if let Some(queue) = responses.get_mut(url) {
            if !queue.is_empty() {
                return queue.remove(0);
            }
        }
        Ok(FetchedPage {
            body: self.default_body.lock().unwrap().clone(),
            status: 200,
        })
    }
}

// ---------------------------------------------------------------------------
// MockMatcher
// ---------------------------------------------------------------------------

/// Mock LLM matcher returning a fixed verdict, with an optional one-shot
/// error.
#[derive(Clone)]
pub struct MockMatcher {
    score: i32,
    summary: String,
    error: Arc<Mutex<Option<AppError>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockMatcher {
    pub fn with_score(score: i32, summary: &str) -> Self {
        Self {
            score,
            summary: summary.to_string(),
            error: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            score: 0,
            summary: String::new(),
            error: Arc::new(Mutex::new(Some(error))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Matcher for MockMatcher {
    async fn match_job(
        &self,
        title: &str,
        _description: &str,
        _profile: &CandidateProfile,
    ) -> Result<JobMatch, AppError> {
        self.calls.lock().unwrap().push(title.to_string());
        if let Some(err) = self.error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(JobMatch {
            match_score: self.score,
            strengths: vec![],
            weaknesses: vec![],
            short_summary: self.summary.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    sources: Vec<Source>,
    jobs: Vec<Job>,
    next_source_id: i64,
    next_job_id: i64,
}

/// In-memory implementation of [`SourceStore`] and [`JobStore`] with the
/// same upsert and ordering semantics as the PostgreSQL store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> Vec<Source> {
        self.inner.lock().unwrap().sources.clone()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.inner.lock().unwrap().jobs.clone()
    }

    pub fn source_by_normalized(&self, normalized_url: &str) -> Option<Source> {
        self.inner
            .lock()
            .unwrap()
            .sources
            .iter()
            .find(|s| s.normalized_url == normalized_url)
            .cloned()
    }
}

impl SourceStore for MemoryStore {
    async fn add_source(&self, source: NewSource) -> Result<(i64, bool), AppError> {
        let (normalized, host) = urlutil::normalize(&source.url)
            .unwrap_or_else(|_| (source.url.clone(), String::new()));
        let now = Utc::now();

        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .sources
            .iter_mut()
            .find(|s| s.normalized_url == normalized || s.url == source.url)
        {
            existing.url = source.url;
            existing.normalized_url = normalized;
            existing.host = host;
            existing.source_type = source.source_type;
            existing.page_type = source.page_type;
            existing.is_alias = source.is_alias;
            existing.canonical_url = source.canonical_url;
            existing.is_job_site = source.is_job_site;
            existing.tech_related = source.tech_related;
            existing.confidence = source.confidence;
            existing.classification_reason = source.reason;
            existing.ats_backed = source.ats_backed;
            existing.last_checked_at = Some(now);
            return Ok((existing.id, true));
        }

        inner.next_source_id += 1;
        let id = inner.next_source_id;
        inner.sources.push(Source {
            id,
            url: source.url,
            normalized_url: normalized,
            host,
            source_type: source.source_type,
            page_type: source.page_type,
            is_alias: source.is_alias,
            canonical_url: source.canonical_url,
            is_job_site: source.is_job_site,
            tech_related: source.tech_related,
            confidence: source.confidence,
            classification_reason: source.reason,
            ats_backed: source.ats_backed,
            recheck_count: 0,
            last_error_type: None,
            last_error_message: None,
            last_error_at: None,
            last_checked_at: Some(now),
            last_scraped_at: None,
            discovered_at: Some(now),
        });
        Ok((id, false))
    }

    async fn find_source_by_url(&self, url: &str) -> Result<Option<Source>, AppError> {
        let normalized = urlutil::normalize(url)
            .map(|(n, _)| n)
            .unwrap_or_else(|_| url.to_string());
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sources
            .iter()
            .find(|s| s.normalized_url == normalized || s.url == normalized || s.url == url)
            .cloned())
    }

    async fn get_canonical_source_by_host(&self, host: &str) -> Result<Option<Source>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sources
            .iter()
            .filter(|s| {
                s.host == host && !s.is_alias && s.is_job_site && s.page_type.is_scrapeable()
            })
            .min_by_key(|s| s.discovered_at)
            .cloned())
    }

    async fn mark_source_alias(&self, source_id: i64, canonical_url: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == source_id) {
            source.is_alias = true;
            source.canonical_url = Some(canonical_url.to_string());
            source.last_checked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_source_scraped(&self, source_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == source_id) {
            source.last_scraped_at = Some(Utc::now());
            source.last_checked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_source_error(
        &self,
        source_id: i64,
        kind: ErrorKind,
        message: &str,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == source_id) {
            source.last_error_type = Some(kind.as_str().to_string());
            source.last_error_message = Some(message.chars().take(800).collect());
            source.last_error_at = Some(Utc::now());
            source.last_checked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn clear_source_error(&self, source_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == source_id) {
            source.last_error_type = None;
            source.last_error_message = None;
            source.last_error_at = None;
        }
        Ok(())
    }

    async fn increment_source_recheck(&self, source_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == source_id) {
            source.recheck_count += 1;
        }
        Ok(())
    }

    async fn mark_source_page_type(
        &self,
        source_id: i64,
        page_type: PageType,
        reason: &str,
        ats_backed: bool,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == source_id) {
            source.page_type = page_type;
            source.classification_reason = reason.to_string();
            source.ats_backed = source.ats_backed || ats_backed;
            source.last_checked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_host_ats_backed(&self, host: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        for source in inner.sources.iter_mut().filter(|s| s.host == host) {
            source.ats_backed = true;
        }
        Ok(())
    }

    async fn is_host_ats_backed(&self, host: &str) -> Result<bool, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sources
            .iter()
            .any(|s| s.host == host && s.ats_backed))
    }

    async fn list_sources(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Source>, i64), AppError> {
        let inner = self.inner.lock().unwrap();
        let mut filtered: Vec<Source> = inner
            .sources
            .iter()
            .filter(|s| s.is_job_site && !s.is_alias && s.page_type.is_scrapeable())
            .cloned()
            .collect();
        let total = filtered.len() as i64;
        // NULLS FIRST on both timestamps, matching the SQL ordering.
        filtered.sort_by_key(|s| {
            (
                s.last_scraped_at.is_some(),
                s.last_scraped_at,
                s.last_checked_at.is_some(),
                s.last_checked_at,
            )
        });
        let page = filtered
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}

impl JobStore for MemoryStore {
    async fn save_job(&self, job: NewJob) -> Result<(), AppError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.jobs.iter_mut().find(|j| j.url == job.url) {
            existing.source_id = job.source_id;
            existing.source_type = job.source_type.as_str().to_string();
            existing.title = job.title;
            existing.description = job.description;
            existing.company = job.company;
            existing.location = job.location;
            existing.salary_range = job.salary_range;
            existing.posted_at = existing.posted_at.or(job.posted_at);
            existing.match_score = job.match_score;
            existing.match_summary = job.match_summary;
            existing.updated_at = now;
            return Ok(());
        }

        inner.next_job_id += 1;
        let id = inner.next_job_id;
        inner.jobs.push(Job {
            id,
            source_id: job.source_id,
            source_url: String::new(),
            source_type: job.source_type.as_str().to_string(),
            url: job.url,
            title: job.title,
            description: job.description,
            company: job.company,
            location: job.location,
            salary_range: job.salary_range,
            match_score: job.match_score,
            match_summary: job.match_summary,
            applied: false,
            applied_at: None,
            rejected: false,
            rejected_at: None,
            closed: false,
            closed_at: None,
            posted_at: job.posted_at,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn get_jobs(&self, limit: i64, offset: i64) -> Result<(Vec<Job>, i64, i64), AppError> {
        let inner = self.inner.lock().unwrap();
        let total = inner.jobs.len() as i64;
        let active_total = inner
            .jobs
            .iter()
            .filter(|j| !j.rejected && !j.closed)
            .count() as i64;

        let mut jobs = inner.jobs.clone();
        jobs.sort_by(|a, b| {
            a.applied
                .cmp(&b.applied)
                .then(b.match_score.cmp(&a.match_score))
                .then(
                    b.posted_at
                        .unwrap_or(b.created_at)
                        .cmp(&a.posted_at.unwrap_or(a.created_at)),
                )
        });
        let page = jobs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total, active_total))
    }

    async fn mark_job_applied(&self, job_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(job) = inner.jobs.iter_mut().find(|j| j.id == job_id) {
            job.applied = true;
            job.applied_at = Some(Utc::now());
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_job_rejected(&self, job_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(job) = inner.jobs.iter_mut().find(|j| j.id == job_id) {
            job.rejected = true;
            job.rejected_at = Some(Utc::now());
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_job_closed(&self, job_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(job) = inner.jobs.iter_mut().find(|j| j.id == job_id) {
            job.closed = true;
            job.closed_at = Some(Utc::now());
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_old_jobs(&self, older_than: Duration) -> Result<u64, AppError> {
        let cutoff = Utc::now() - older_than;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.jobs.len();
        inner
            .jobs
            .retain(|j| j.posted_at.unwrap_or(j.created_at) >= cutoff);
        Ok((before - inner.jobs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;

    #[tokio::test]
    async fn add_source_upserts_by_normalized_url() {
        let store = MemoryStore::new();
        let (id1, existed1) = store
            .add_source(NewSource::candidate(
                "https://www.acme.com/careers/",
                SourceType::CompanyPage,
            ))
            .await
            .unwrap();
        assert!(!existed1);

        let (id2, existed2) = store
            .add_source(NewSource::approved(
                "https://acme.com/careers",
                SourceType::CompanyPage,
                PageType::CareerRoot,
                0.8,
                "title_pattern",
            ))
            .await
            .unwrap();
        assert!(existed2);
        assert_eq!(id1, id2);

        let source = store
            .source_by_normalized("https://acme.com/careers")
            .unwrap();
        assert_eq!(source.page_type, PageType::CareerRoot);
        assert!(source.is_job_site);
    }

    #[tokio::test]
    async fn resolve_canonical_prefers_lower_priority_and_aliases_loser() {
        let store = MemoryStore::new();
        store
            .add_source(NewSource::approved(
                "https://acme.com/jobs",
                SourceType::CompanyPage,
                PageType::JobList,
                0.8,
                "job_links",
            ))
            .await
            .unwrap();

        // /careers (priority 1) beats /jobs (priority 2).
        let (canonical, is_alias) = store
            .resolve_canonical_source("https://acme.com/careers", "acme.com", PageType::CareerRoot)
            .await
            .unwrap();
        assert_eq!(canonical, "https://acme.com/careers");
        assert!(!is_alias);

        let old = store.source_by_normalized("https://acme.com/jobs").unwrap();
        assert!(old.is_alias);
        assert_eq!(old.canonical_url.as_deref(), Some("https://acme.com/careers"));
    }

    #[tokio::test]
    async fn resolve_canonical_ties_go_to_the_incumbent() {
        let store = MemoryStore::new();
        store
            .add_source(NewSource::approved(
                "https://acme.com/careers",
                SourceType::CompanyPage,
                PageType::CareerRoot,
                0.8,
                "job_keywords",
            ))
            .await
            .unwrap();

        let (canonical, is_alias) = store
            .resolve_canonical_source(
                "https://acme.com/join-us",
                "acme.com",
                PageType::CareerRoot,
            )
            .await
            .unwrap();
        assert_eq!(canonical, "https://acme.com/careers");
        assert!(is_alias);
    }

    #[tokio::test]
    async fn resolving_the_current_canonical_never_self_aliases() {
        let store = MemoryStore::new();
        store
            .add_source(NewSource::approved(
                "https://boards.greenhouse.io/stripe",
                SourceType::JobBoard,
                PageType::JobList,
                0.9,
                "ats_host",
            ))
            .await
            .unwrap();

        let (canonical, is_alias) = store
            .resolve_canonical_source(
                "https://boards.greenhouse.io/stripe",
                "boards.greenhouse.io",
                PageType::JobList,
            )
            .await
            .unwrap();
        assert_eq!(canonical, "https://boards.greenhouse.io/stripe");
        assert!(!is_alias);

        let row = store
            .source_by_normalized("https://boards.greenhouse.io/stripe")
            .unwrap();
        assert!(!row.is_alias);
        assert!(row.canonical_url.is_none());
    }

    #[tokio::test]
    async fn save_job_keeps_existing_posted_at() {
        let store = MemoryStore::new();
        let posted = Utc::now() - Duration::days(3);
        let job = NewJob {
            source_id: 1,
            source_type: SourceType::JobBoard,
            url: "https://acme.com/jobs/1".into(),
            title: "SE".into(),
            description: "desc".into(),
            company: "Acme".into(),
            location: "Remote".into(),
            salary_range: None,
            posted_at: Some(posted),
            match_score: 80,
            match_summary: "good".into(),
        };
        store.save_job(job.clone()).await.unwrap();

        let mut updated = job;
        updated.posted_at = Some(Utc::now());
        updated.match_score = 85;
        store.save_job(updated).await.unwrap();

        let (jobs, total, active) = store.get_jobs(10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(active, 1);
        assert_eq!(jobs[0].posted_at, Some(posted));
        assert_eq!(jobs[0].match_score, 85);
    }

    #[tokio::test]
    async fn delete_old_jobs_uses_effective_date() {
        let store = MemoryStore::new();
        let old = NewJob {
            source_id: 1,
            source_type: SourceType::JobBoard,
            url: "https://acme.com/jobs/old".into(),
            title: "Old".into(),
            description: String::new(),
            company: String::new(),
            location: String::new(),
            salary_range: None,
            posted_at: Some(Utc::now() - Duration::days(45)),
            match_score: 70,
            match_summary: String::new(),
        };
        let fresh = NewJob {
            url: "https://acme.com/jobs/fresh".into(),
            posted_at: Some(Utc::now() - Duration::days(2)),
            ..old.clone()
        };
        store.save_job(old).await.unwrap();
        store.save_job(fresh).await.unwrap();

        let deleted = store.delete_old_jobs(Duration::days(30)).await.unwrap();
        assert_eq!(deleted, 1);
        let (jobs, ..) = store.get_jobs(10, 0).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, "https://acme.com/jobs/fresh");
    }

    #[tokio::test]
    async fn list_sources_filters_and_orders() {
        let store = MemoryStore::new();
        store
            .add_source(NewSource::approved(
                "https://a.com/careers",
                SourceType::CompanyPage,
                PageType::CareerRoot,
                0.8,
                "x",
            ))
            .await
            .unwrap();
        let (alias_id, _) = store
            .add_source(NewSource::approved(
                "https://b.com/careers",
                SourceType::CompanyPage,
                PageType::JobList,
                0.8,
                "x",
            ))
            .await
            .unwrap();
        store
            .mark_source_alias(alias_id, "https://b.com/jobs")
            .await
            .unwrap();
        store
            .add_source(NewSource::rejected(
                "https://c.com/blog",
                SourceType::Unknown,
                PageType::NonJob,
                0.2,
                "no_job_signals",
            ))
            .await
            .unwrap();

        let (sources, total) = store.list_sources(10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(sources[0].normalized_url, "https://a.com/careers");
    }
}
