//! Ingestion: fan out over approved sources, extract postings, score them,
//! and persist the keepers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use scout_client::extract::{pick_extractor, SiteExtractor};
use scout_client::{Analyzer, HtmdCleaner};
use scout_core::content;
use scout_core::error::ErrorKind;
use scout_core::models::{NewJob, PageType, RawJob, Source, SourceType};
use scout_core::scoring::{self, Scorer};
use scout_core::stats::Counters;
use scout_core::traits::{JobStore, Matcher, PageFetcher, SourceStore};
use scout_core::CandidateProfile;

use crate::ats::promote_ats_links;

const WORKER_COUNT: usize = 6;
const SOURCE_BATCH: i64 = 200;
/// Postings older than this are not worth persisting.
const SINCE_WINDOW_DAYS: i64 = 10;

/// Pulls jobs out of approved sources on a schedule.
#[derive(Clone)]
pub struct IngestionService<S, F, M> {
    store: S,
    fetcher: F,
    analyzer: Analyzer<F>,
    scorer: Scorer<M>,
    cleaner: HtmdCleaner,
    counters: Counters,
    min_match_score: i32,
    cancel: CancellationToken,
}

impl<S, F, M> IngestionService<S, F, M>
where
    S: SourceStore + JobStore + 'static,
    F: PageFetcher + 'static,
    M: Matcher + 'static,
{
    pub fn new(
        store: S,
        fetcher: F,
        matcher: M,
        counters: Counters,
        min_match_score: i32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            analyzer: Analyzer::new(fetcher.clone()),
            scorer: Scorer::new(matcher, CandidateProfile::default()),
            cleaner: HtmdCleaner::new(),
            store,
            fetcher,
            counters,
            min_match_score,
            cancel,
        }
    }

    /// Scrape immediately, then on every interval until cancelled.
    pub async fn run_scrape_loop(&self, interval: Duration) {
        tracing::info!(min_match_score = self.min_match_score, "starting ingestion");
        self.scrape_once().await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                _ = ticker.tick() => self.scrape_once().await,
            }
        }
    }

    /// Daily retention sweep.
    pub async fn run_cleanup_loop(&self, interval: Duration, retention: chrono::Duration) {
        self.cleanup(retention).await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                _ = ticker.tick() => self.cleanup(retention).await,
            }
        }
    }

    async fn cleanup(&self, retention: chrono::Duration) {
        match self.store.delete_old_jobs(retention).await {
            Ok(0) => {}
            Ok(deleted) => tracing::info!(deleted, "retention sweep removed expired jobs"),
            Err(err) => {
                self.counters.inc_error(err.kind(), "ingestion");
                tracing::warn!(error = %err, "retention sweep failed");
            }
        }
    }

    /// One scrape round: a fixed worker pool consuming sources off an
    /// unbuffered channel. Cancellation drains the pool.
    pub async fn scrape_once(&self) {
        let sources = match self.store.list_sources(SOURCE_BATCH, 0).await {
            Ok((sources, _)) => sources,
            Err(err) => {
                self.counters.inc_error(err.kind(), "ingestion");
                tracing::warn!(error = %err, "failed to list sources");
                return;
            }
        };
        if sources.is_empty() {
            return;
        }
        let since = Utc::now() - chrono::Duration::days(SINCE_WINDOW_DAYS);

        let (tx, rx) = mpsc::channel::<Source>(1);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(WORKER_COUNT);
        for worker_id in 0..WORKER_COUNT {
            let service = self.clone();
            let rx = rx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let next = { rx.lock().await.recv().await };
                    let Some(source) = next else { break };
                    if service.cancel.is_cancelled() {
                        break;
                    }
                    service.process_source(source, since).await;
                }
                tracing::debug!(worker_id, "scrape worker drained");
            }));
        }

        for source in sources {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                sent = tx.send(source) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
        drop(tx);
        for worker in workers {
            let _ = worker.await;
        }
    }

    pub async fn process_source(&self, source: Source, since: DateTime<Utc>) {
        let extractor = pick_extractor(self.fetcher.clone(), &source.url, source.source_type);
        let started = Instant::now();

        let raw_jobs = match extractor.fetch_since(since).await {
            Ok(raw_jobs) => raw_jobs,
            Err(err) => {
                self.counters.inc_error(err.kind(), "ingestion");
                self.record_source_error(source.id, err.kind(), &err.to_string())
                    .await;
                return;
            }
        };
        self.counters
            .observe_crawl_seconds(started.elapsed().as_secs_f64());

        if raw_jobs.is_empty() && source.source_type != SourceType::JobBoard {
            self.handle_zero_jobs(&source, &extractor, since).await;
            return;
        }

        let saved = self.ingest_raw_jobs(&source, raw_jobs, since).await;
        tracing::info!(url = %source.url, extractor = extractor.name(), saved, "source scraped");
        self.finish_source(source.id).await;
    }

    /// A non-board source yielded nothing. Either its careers moved to an
    /// ATS, or it deserves one relaxed retry, or it is done for good.
    async fn handle_zero_jobs(
        &self,
        source: &Source,
        extractor: &SiteExtractor<F>,
        since: DateTime<Utc>,
    ) {
        let signals = match self.analyzer.analyze(&source.url).await {
            Ok(signals) => signals,
            Err(err) => {
                self.counters.inc_error(err.kind(), "ingestion");
                self.record_source_error(source.id, err.kind(), &err.to_string())
                    .await;
                return;
            }
        };

        if !signals.ats_links.is_empty() {
            self.counters.inc_ats_detected();
            promote_ats_links(&self.store, &self.counters, &signals.ats_links).await;
            if let Err(err) = self.store.mark_host_ats_backed(&source.host).await {
                self.counters.inc_error(err.kind(), "ingestion");
            }
            if let Err(err) = self
                .store
                .mark_source_page_type(source.id, PageType::NonJobPermanent, "ats_backed", true)
                .await
            {
                self.counters.inc_error(err.kind(), "ingestion");
            }
            tracing::info!(url = %source.url, "source delegates to an ATS, retired");
            return;
        }

        if content::has_job_signals(&signals)
            && source.recheck_count == 0
            && extractor.supports_relaxed()
        {
            if let Err(err) = self.store.increment_source_recheck(source.id).await {
                self.counters.inc_error(err.kind(), "ingestion");
            }
            match extractor.fetch_since_relaxed(since).await {
                Ok(raw_jobs) if !raw_jobs.is_empty() => {
                    let saved = self.ingest_raw_jobs(source, raw_jobs, since).await;
                    tracing::info!(url = %source.url, saved, "relaxed fetch recovered jobs");
                    self.finish_source(source.id).await;
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    self.counters.inc_error(err.kind(), "ingestion");
                    self.record_source_error(source.id, err.kind(), &err.to_string())
                        .await;
                    return;
                }
            }
        }

        self.counters.inc_source_zero_jobs();
        if let Err(err) = self
            .store
            .mark_source_page_type(
                source.id,
                PageType::NonJobPermanent,
                "no_jobs_after_retry",
                false,
            )
            .await
        {
            self.counters.inc_error(err.kind(), "ingestion");
        }
        tracing::info!(url = %source.url, "no jobs after retry, source retired");
    }

    /// Filter, score, and upsert the extracted postings. Returns how many
    /// were saved.
    async fn ingest_raw_jobs(
        &self,
        source: &Source,
        raw_jobs: Vec<RawJob>,
        since: DateTime<Utc>,
    ) -> usize {
        let mut saved = 0;
        for raw in raw_jobs {
            if self.cancel.is_cancelled() {
                break;
            }
            self.counters.inc_jobs_extracted();

            if raw.posted_at.is_some_and(|posted| posted < since) {
                continue;
            }
            if scoring::is_blocked_location(&raw.location) {
                continue;
            }

            let description = self
                .cleaner
                .clean(&raw.description)
                .ok()
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| raw.description.clone());

            let combined = format!("{} {}", raw.title, description);
            if scoring::is_blocked_kind(&combined) {
                continue;
            }
            if scoring::rule_score(&combined) > 0 {
                self.counters.inc_ai_call();
            }

            let (score, summary) = self.scorer.score(&raw.title, &description).await;
            if score < self.min_match_score {
                continue;
            }

            let job = NewJob {
                source_id: source.id,
                source_type: source.source_type,
                url: raw.url,
                title: raw.title,
                description,
                company: raw.company,
                location: raw.location,
                salary_range: raw.salary_range,
                posted_at: raw.posted_at,
                match_score: score,
                match_summary: summary,
            };
            match self.store.save_job(job).await {
                Ok(()) => {
                    saved += 1;
                    self.counters.inc_jobs_discovered();
                }
                Err(err) => {
                    self.counters.inc_error(err.kind(), "ingestion");
                    tracing::warn!(error = %err, "failed to save job");
                }
            }
        }
        saved
    }

    async fn finish_source(&self, source_id: i64) {
        if let Err(err) = self.store.mark_source_scraped(source_id).await {
            self.counters.inc_error(err.kind(), "ingestion");
        }
        if let Err(err) = self.store.clear_source_error(source_id).await {
            self.counters.inc_error(err.kind(), "ingestion");
        }
    }

    async fn record_source_error(&self, source_id: i64, kind: ErrorKind, message: &str) {
        if let Err(err) = self.store.mark_source_error(source_id, kind, message).await {
            tracing::warn!(error = %err, "failed to record source error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::models::NewSource;
    use scout_core::testutil::{MemoryStore, MockFetcher, MockMatcher};

    const LEVER_POSTINGS: &str = r#"[
        {"id": "1", "text": "Senior Golang Engineer",
         "hostedUrl": "https://jobs.lever.co/acme/se-1",
         "categories": {"location": "Remote - Europe"},
         "createdAt": 0,
         "descriptionPlain": "Build backend services in Go with grpc"},
        {"id": "2", "text": "Golang Engineer (Tokyo)",
         "hostedUrl": "https://jobs.lever.co/acme/se-2",
         "categories": {"location": "Tokyo, Japan"},
         "createdAt": 0,
         "descriptionPlain": "Backend work in Go"},
        {"id": "3", "text": "Sales Account Executive",
         "hostedUrl": "https://jobs.lever.co/acme/sales-1",
         "categories": {"location": "Remote"},
         "createdAt": 0,
         "descriptionPlain": "Sell the golang platform"}
    ]"#;

    async fn approved_source(store: &MemoryStore, url: &str, page_type: PageType) -> Source {
        store
            .add_source(NewSource::approved(
                url,
                SourceType::CompanyPage,
                page_type,
                0.8,
                "test",
            ))
            .await
            .unwrap();
        store.find_source_by_url(url).await.unwrap().unwrap()
    }

    fn service(
        store: MemoryStore,
        fetcher: MockFetcher,
        matcher: MockMatcher,
    ) -> IngestionService<MemoryStore, MockFetcher, MockMatcher> {
        IngestionService::new(
            store,
            fetcher,
            matcher,
            Counters::new(),
            60,
            CancellationToken::new(),
        )
    }

    fn patch_created_at(json: &str) -> String {
        // Lever postings in the fixture carry createdAt 0; stamp them with
        // a fresh timestamp so the since filter keeps them.
        json.replace("\"createdAt\": 0", &format!("\"createdAt\": {}", Utc::now().timestamp_millis()))
    }

    #[tokio::test]
    async fn scrapes_a_lever_source_and_persists_matching_jobs() {
        let store = MemoryStore::new();
        let source =
            approved_source(&store, "https://jobs.lever.co/acme", PageType::JobList).await;
        let fetcher = MockFetcher::new().with_page(
            "https://jobs.lever.co/acme?mode=json",
            &patch_created_at(LEVER_POSTINGS),
        );
        let svc = service(store.clone(), fetcher, MockMatcher::with_score(90, "Strong fit"));

        svc.scrape_once().await;

        let jobs = store.jobs();
        // The Tokyo posting is a blocked location, the sales posting a
        // blocked kind; one survivor.
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.url, "https://jobs.lever.co/acme/se-1");
        assert!(job.match_score >= 60);
        assert!(!job.applied);

        let source = store.find_source_by_url(&source.url).await.unwrap().unwrap();
        assert!(source.last_scraped_at.is_some());
        assert!(source.last_error_type.is_none());
    }

    #[tokio::test]
    async fn extraction_errors_are_recorded_without_failing_the_round() {
        let store = MemoryStore::new();
        let source =
            approved_source(&store, "https://jobs.lever.co/acme", PageType::JobList).await;
        let fetcher = MockFetcher::new().with_error(
            "https://jobs.lever.co/acme?mode=json",
            scout_core::AppError::FetchError {
                status: 429,
                message: "slow down".into(),
            },
        );
        let svc = service(store.clone(), fetcher, MockMatcher::with_score(90, "x"));

        svc.scrape_once().await;

        let source = store.find_source_by_url(&source.url).await.unwrap().unwrap();
        assert_eq!(source.last_error_type.as_deref(), Some("rate_limit"));
        assert!(store.jobs().is_empty());
    }

    #[tokio::test]
    async fn zero_jobs_with_ats_links_retires_the_source() {
        let store = MemoryStore::new();
        let source =
            approved_source(&store, "https://acme.com/careers", PageType::CareerRoot).await;
        // The careers page now just points at a Lever board.
        let page = r#"<html><body>
            <a href="https://jobs.lever.co/acme">See open roles</a>
        </body></html>"#;
        let fetcher = MockFetcher::new()
            .with_default_body("<html><body></body></html>")
            .with_page("https://acme.com/careers", page)
            .with_page("https://acme.com/careers", page);
        let svc = service(store.clone(), fetcher, MockMatcher::with_score(90, "x"));

        svc.process_source(source.clone(), Utc::now()).await;

        let retired = store.find_source_by_url(&source.url).await.unwrap().unwrap();
        assert_eq!(retired.page_type, PageType::NonJobPermanent);
        assert!(retired.ats_backed);

        let board = store
            .source_by_normalized("https://jobs.lever.co/acme")
            .expect("lever board promoted");
        assert_eq!(board.page_type, PageType::JobList);
    }

    #[tokio::test]
    async fn zero_jobs_with_signals_gets_one_relaxed_retry_then_retires() {
        let store = MemoryStore::new();
        let source =
            approved_source(&store, "https://acme.com/careers", PageType::CareerRoot).await;
        // Job-ish text but no harvestable links or JSON-LD anywhere.
        let page = r#"<html><body><p>We have open positions. Apply now.</p></body></html>"#;
        let fetcher = MockFetcher::new().with_default_body(page);
        let svc = service(store.clone(), fetcher, MockMatcher::with_score(90, "x"));

        svc.process_source(source.clone(), Utc::now()).await;

        let retired = store.find_source_by_url(&source.url).await.unwrap().unwrap();
        assert_eq!(retired.recheck_count, 1);
        assert_eq!(retired.page_type, PageType::NonJobPermanent);
        assert_eq!(retired.classification_reason, "no_jobs_after_retry");
    }

    #[tokio::test]
    async fn job_board_sources_are_not_retired_on_empty_rounds() {
        let store = MemoryStore::new();
        store
            .add_source(NewSource::approved(
                "https://remoteok.com",
                SourceType::JobBoard,
                PageType::JobList,
                0.9,
                "job_board_allowlist",
            ))
            .await
            .unwrap();
        let source = store
            .find_source_by_url("https://remoteok.com")
            .await
            .unwrap()
            .unwrap();
        let fetcher = MockFetcher::new().with_page("https://remoteok.com/api", "[]");
        let svc = service(store.clone(), fetcher, MockMatcher::with_score(90, "x"));

        svc.process_source(source.clone(), Utc::now()).await;

        let row = store.find_source_by_url(&source.url).await.unwrap().unwrap();
        assert_eq!(row.page_type, PageType::JobList);
        assert!(row.last_scraped_at.is_some());
    }

    #[tokio::test]
    async fn remoteok_feed_lands_as_an_unapplied_job() {
        let store = MemoryStore::new();
        store
            .add_source(NewSource::approved(
                "https://remoteok.com",
                SourceType::JobBoard,
                PageType::JobList,
                0.9,
                "job_board_allowlist",
            ))
            .await
            .unwrap();
        let feed = format!(
            r#"[{{"last_updated": 1}},
                {{"slug": "x", "url": "https://remoteok.com/remote-jobs/1",
                  "position": "Golang Backend Engineer", "company": "Acme",
                  "tags": ["Golang", "Backend"], "date": "{}",
                  "description": "Build Go microservices and grpc APIs",
                  "location": "Worldwide"}}]"#,
            Utc::now().to_rfc3339()
        );
        let fetcher = MockFetcher::new().with_page("https://remoteok.com/api", &feed);
        let svc = service(store.clone(), fetcher, MockMatcher::with_score(85, "Good fit"));

        svc.scrape_once().await;

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].match_score >= 60);
        assert!(!jobs[0].applied);
        assert_eq!(jobs[0].company, "Acme");
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_rule_score() {
        let store = MemoryStore::new();
        approved_source(&store, "https://jobs.lever.co/acme", PageType::JobList).await;
        let fetcher = MockFetcher::new().with_page(
            "https://jobs.lever.co/acme?mode=json",
            &patch_created_at(LEVER_POSTINGS),
        );
        let matcher = MockMatcher::with_error(scout_core::AppError::LlmError {
            message: "quota".into(),
            status_code: 429,
            retryable: true,
        });
        let svc = service(store.clone(), fetcher, matcher);

        svc.scrape_once().await;

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].match_summary, "Rule-based match only");
    }
}
