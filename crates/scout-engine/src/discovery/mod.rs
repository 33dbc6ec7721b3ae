//! Autonomous source discovery.
//!
//! Three feeds share one funnel: curated seeds, career-link crawls of
//! bellwether tech sites, and general-web search. Every URL ends up in
//! [`DiscoveryEngine::process_candidate`], which normalizes, consults the
//! store, analyzes page content when needed, and records the outcome.

mod crawler;
mod search;

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use scout_client::Analyzer;
use scout_core::content::{self, Signals};
use scout_core::error::AppError;
use scout_core::models::{NewSource, PageType, SourceType};
use scout_core::stats::Counters;
use scout_core::traits::{PageFetcher, SourceStore};
use scout_core::urlutil;

use crate::ats::promote_ats_links;

/// How deep candidate recursion may go when harvesting child links off a
/// low-confidence rejection.
const MAX_CANDIDATE_DEPTH: usize = 2;

const SEED_SPACING: Duration = Duration::from_millis(500);

/// Sites whose homepages reliably link to careers pages worth crawling.
const BELLWETHER_SITES: &[&str] = &[
    "https://github.com",
    "https://about.gitlab.com",
    "https://www.heroku.com",
    "https://www.cloudflare.com",
    "https://vercel.com",
    "https://supabase.com",
    "https://www.datadoghq.com",
    "https://www.zendesk.com",
    "https://www.hashicorp.com",
    "https://www.digitalocean.com",
    "https://about.gitlab.com/careers/",
];

const SEARCH_QUERIES: &[&str] = &[
    "golang backend engineer jobs",
    "software engineer careers site:careers",
    "backend jobs site:jobs",
    "remote golang hiring",
    "golang remote backend job board",
    "senior golang engineer careers",
    "golang developer jobs Europe remote",
];

/// One entry of the embedded seed list.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedCandidate {
    pub url: String,
    #[serde(default)]
    pub source_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub meta: String,
    #[serde(default)]
    pub text: String,
}

fn load_seeds() -> Vec<SeedCandidate> {
    match serde_json::from_str(include_str!("seeds.json")) {
        Ok(seeds) => seeds,
        Err(err) => {
            tracing::error!(error = %err, "failed to load embedded seeds");
            Vec::new()
        }
    }
}

/// Result of classifying a URL submitted through the API.
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub is_job_site: bool,
    pub tech_related: bool,
    pub confidence: f64,
    pub reason: String,
    pub existed: bool,
}

impl IntakeOutcome {
    fn rejected(reason: impl Into<String>, existed: bool) -> Self {
        Self {
            is_job_site: false,
            tech_related: false,
            confidence: 0.0,
            reason: reason.into(),
            existed,
        }
    }

    fn approved(confidence: f64, reason: impl Into<String>, existed: bool) -> Self {
        Self {
            is_job_site: true,
            tech_related: true,
            confidence,
            reason: reason.into(),
            existed,
        }
    }
}

/// Drives all three discovery feeds against the shared store.
#[derive(Clone)]
pub struct DiscoveryEngine<S, F> {
    store: S,
    fetcher: F,
    analyzer: Analyzer<F>,
    counters: Counters,
    cancel: CancellationToken,
}

impl<S, F> DiscoveryEngine<S, F>
where
    S: SourceStore + 'static,
    F: PageFetcher + 'static,
{
    pub fn new(store: S, fetcher: F, counters: Counters, cancel: CancellationToken) -> Self {
        Self {
            store,
            analyzer: Analyzer::new(fetcher.clone()),
            fetcher,
            counters,
            cancel,
        }
    }

    /// Run one discovery round immediately, then one per interval until
    /// cancelled.
    pub async fn run(&self, interval: Duration) {
        tracing::info!("starting discovery engine");
        self.run_round().await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // immediate first tick
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                _ = ticker.tick() => self.run_round().await,
            }
        }
    }

    async fn run_round(&self) {
        self.seed_cycle().await;
        self.crawl_for_career_links().await;
        self.search_web().await;
        tracing::info!("discovery round complete");
    }

    async fn seed_cycle(&self) {
        for seed in load_seeds() {
            if self.cancel.is_cancelled() {
                return;
            }
            let source_type = seed.source_type.parse().unwrap_or(SourceType::Unknown);
            self.process_candidate(&seed.url, source_type, None, 0).await;
            tokio::select! {
                () = tokio::time::sleep(SEED_SPACING) => {}
                () = self.cancel.cancelled() => return,
            }
        }
    }

    async fn crawl_for_career_links(&self) {
        for site in BELLWETHER_SITES {
            if self.cancel.is_cancelled() {
                return;
            }
            let links =
                crawler::extract_career_links(&self.fetcher, &self.counters, site).await;
            for link in links {
                if self.cancel.is_cancelled() {
                    return;
                }
                self.process_candidate(&link, guess_source_type(&link), Some(site), 0)
                    .await;
            }
        }
    }

    async fn search_web(&self) {
        let mut seen = HashSet::new();
        for query in SEARCH_QUERIES {
            if self.cancel.is_cancelled() {
                return;
            }
            let urls = search::duck_duck_search(&self.fetcher, &self.counters, query, 15).await;
            for url in urls {
                if self.cancel.is_cancelled() {
                    return;
                }
                if !seen.insert(url.clone()) {
                    continue;
                }
                self.process_candidate(&url, guess_source_type(&url), None, 0)
                    .await;

                // The result page itself often links to the real careers
                // page; crawl one level of it too.
                let links =
                    crawler::extract_career_links(&self.fetcher, &self.counters, &url).await;
                for link in links {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    if seen.insert(link.clone()) {
                        self.process_candidate(&link, guess_source_type(&link), Some(&url), 0)
                            .await;
                    }
                }
            }
        }
    }

    /// Evaluate one candidate URL and record the outcome in the store.
    ///
    /// Never fails the surrounding cycle: per-candidate errors are counted,
    /// logged, and swallowed. Boxed because rejected pages recurse into
    /// their child links.
    pub fn process_candidate<'a>(
        &'a self,
        raw_url: &'a str,
        source_type: SourceType,
        parent: Option<&'a str>,
        depth: usize,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if let Err(err) = self
                .process_candidate_inner(raw_url, source_type, parent, depth)
                .await
            {
                if !matches!(err, AppError::Cancelled) {
                    self.counters.inc_error(err.kind(), "discovery");
                    tracing::debug!(url = raw_url, error = %err, "candidate processing failed");
                }
            }
        })
    }

    async fn process_candidate_inner(
        &self,
        raw_url: &str,
        source_type: SourceType,
        parent: Option<&str>,
        depth: usize,
    ) -> Result<(), AppError> {
        let Ok((normalized, host)) = urlutil::normalize(raw_url) else {
            return Ok(());
        };
        if !urlutil::is_discovery_eligible(&normalized) {
            return Ok(());
        }
        self.counters.inc_urls_discovered();

        // A host known to delegate its careers to an ATS needs no further
        // page analysis; the ATS board is already a source.
        if !urlutil::is_ats_host(&host) && self.store.is_host_ats_backed(&host).await? {
            return Ok(());
        }

        let mut retry_attempt = false;
        if let Some(existing) = self.store.find_source_by_url(&normalized).await? {
            if existing.is_alias
                || matches!(
                    existing.page_type,
                    PageType::NonJobPermanent | PageType::NonJobHighConfidence | PageType::JobDetail
                )
            {
                return Ok(());
            }
            match existing.page_type {
                PageType::NonJob | PageType::NonJobLowConfidence => {
                    if existing.recheck_count > 0 {
                        return Ok(());
                    }
                    retry_attempt = true;
                }
                _ if existing.page_type.is_scrapeable() && existing.is_job_site => {
                    return Ok(());
                }
                _ => {}
            }
        }

        if urlutil::is_known_job_board(&host) {
            self.insert_resolved(
                &normalized,
                &host,
                SourceType::JobBoard,
                PageType::JobList,
                0.9,
                "job_board_allowlist",
            )
            .await?;
            return Ok(());
        }

        if urlutil::is_ats_host(&host) {
            let (ats_url, ats_host) = urlutil::normalize_ats(&normalized)?;
            self.insert_resolved(
                &ats_url,
                &ats_host,
                SourceType::JobBoard,
                PageType::JobList,
                0.9,
                "ats_host",
            )
            .await?;
            return Ok(());
        }

        let (candidate_id, _) = self
            .store
            .add_source(NewSource::candidate(&normalized, source_type))
            .await?;

        let signals = match self.analyzer.analyze(&normalized).await {
            Ok(signals) => {
                self.counters.inc_pages_crawled();
                signals
            }
            Err(err) => {
                self.store
                    .mark_source_error(candidate_id, err.kind(), &err.to_string())
                    .await?;
                return Err(err);
            }
        };

        if !signals.ats_links.is_empty() {
            self.counters.inc_ats_detected();
            promote_ats_links(&self.store, &self.counters, &signals.ats_links).await;
            self.store.mark_host_ats_backed(&host).await?;
            self.store
                .add_source(
                    NewSource::rejected(
                        &normalized,
                        source_type,
                        PageType::NonJobHighConfidence,
                        0.9,
                        "ats_link",
                    )
                    .with_ats_backed(true),
                )
                .await?;
            return Ok(());
        }

        let decision = content::classify(&signals);
        self.counters.inc_source_decision(decision.reason);

        if decision.page_type == PageType::NonJob {
            self.record_rejection(
                candidate_id,
                &normalized,
                source_type,
                &signals,
                decision.reason,
                decision.confidence,
                retry_attempt,
                depth,
            )
            .await?;
            return Ok(());
        }

        let (canonical, is_alias) = self
            .store
            .resolve_canonical_source(&normalized, &host, decision.page_type)
            .await?;
        if is_alias {
            self.store
                .add_source(NewSource::alias(
                    &normalized,
                    source_type,
                    decision.page_type,
                    canonical,
                ))
                .await?;
            return Ok(());
        }

        self.counters.inc_source_promoted();
        self.store
            .add_source(NewSource::approved(
                &normalized,
                source_type,
                decision.page_type,
                decision.confidence,
                decision.reason,
            ))
            .await?;
        tracing::info!(url = %normalized, page_type = %decision.page_type, reason = decision.reason, "approved source");

        if let Some(parent_url) = parent {
            self.promote_parent(parent_url, decision.confidence).await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_rejection(
        &self,
        candidate_id: i64,
        normalized: &str,
        source_type: SourceType,
        signals: &Signals,
        reason: &str,
        confidence: f64,
        retry_attempt: bool,
        depth: usize,
    ) -> Result<(), AppError> {
        if retry_attempt {
            // The page failed its second look; stop revisiting it.
            self.store.increment_source_recheck(candidate_id).await?;
            self.store
                .add_source(NewSource::rejected(
                    normalized,
                    source_type,
                    PageType::NonJobHighConfidence,
                    confidence,
                    format!("{reason}_retry"),
                ))
                .await?;
            return Ok(());
        }

        self.store
            .add_source(NewSource::rejected(
                normalized,
                source_type,
                PageType::NonJobLowConfidence,
                confidence,
                reason,
            ))
            .await?;

        // A rejected page can still link to the real careers page.
        if depth + 1 < MAX_CANDIDATE_DEPTH {
            for link in &signals.job_links {
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                self.process_candidate(link, guess_source_type(link), Some(normalized), depth + 1)
                    .await;
            }
        }
        Ok(())
    }

    /// Promote the page that linked to an approved source: it introduces
    /// the organization's roles even if it is not a listing itself.
    async fn promote_parent(&self, parent_url: &str, child_confidence: f64) -> Result<(), AppError> {
        let Ok((normalized, host)) = urlutil::normalize(parent_url) else {
            return Ok(());
        };
        if urlutil::is_ats_host(&host) || !urlutil::is_discovery_eligible(&normalized) {
            return Ok(());
        }
        if let Some(existing) = self.store.find_source_by_url(&normalized).await? {
            if existing.is_alias || existing.page_type.is_scrapeable() {
                return Ok(());
            }
        }

        let confidence = child_confidence.max(0.6);
        let (canonical, is_alias) = self
            .store
            .resolve_canonical_source(&normalized, &host, PageType::CareerRoot)
            .await?;
        let source = if is_alias {
            NewSource::alias(
                &normalized,
                SourceType::CompanyPage,
                PageType::CareerRoot,
                canonical,
            )
        } else {
            NewSource::approved(
                &normalized,
                SourceType::CompanyPage,
                PageType::CareerRoot,
                confidence,
                "parent_of_job_list",
            )
        };
        self.store.add_source(source).await?;
        Ok(())
    }

    /// Insert an approved source after settling the host's canonical slot.
    async fn insert_resolved(
        &self,
        normalized: &str,
        host: &str,
        source_type: SourceType,
        page_type: PageType,
        confidence: f64,
        reason: &str,
    ) -> Result<(), AppError> {
        let (canonical, is_alias) = self
            .store
            .resolve_canonical_source(normalized, host, page_type)
            .await?;
        if is_alias {
            self.store
                .add_source(NewSource::alias(normalized, source_type, page_type, canonical))
                .await?;
            return Ok(());
        }
        self.counters.inc_source_promoted();
        self.store
            .add_source(NewSource::approved(
                normalized,
                source_type,
                page_type,
                confidence,
                reason,
            ))
            .await?;
        Ok(())
    }

    /// Classify a URL submitted through the API, inline.
    pub async fn intake(
        &self,
        raw_url: &str,
        source_type: SourceType,
    ) -> Result<IntakeOutcome, AppError> {
        let (normalized, host) = urlutil::normalize(raw_url)?;

        if !urlutil::is_discovery_eligible(&normalized) {
            let (_, existed) = self
                .store
                .add_source(NewSource::rejected(
                    &normalized,
                    source_type,
                    PageType::NonJob,
                    0.0,
                    "ineligible_url",
                ))
                .await?;
            return Ok(IntakeOutcome::rejected("ineligible_url", existed));
        }

        if urlutil::is_known_job_board(&host) {
            return self
                .intake_resolved(&normalized, &host, SourceType::JobBoard, "job_board_allowlist")
                .await;
        }

        if urlutil::is_ats_host(&host) {
            let (ats_url, ats_host) = urlutil::normalize_ats(&normalized)?;
            if urlutil::detect_page_type(&ats_url) == PageType::NonJob {
                let (_, existed) = self
                    .store
                    .add_source(NewSource::rejected(
                        &ats_url,
                        source_type,
                        PageType::NonJob,
                        0.0,
                        "ats_root",
                    ))
                    .await?;
                return Ok(IntakeOutcome::rejected("ats_root", existed));
            }
            return self
                .intake_resolved(&ats_url, &ats_host, SourceType::JobBoard, "ats_host")
                .await;
        }

        let (candidate_id, existed) = self
            .store
            .add_source(NewSource::candidate(&normalized, source_type))
            .await?;

        let signals = match self.analyzer.analyze(&normalized).await {
            Ok(signals) => signals,
            Err(err) => {
                self.store
                    .mark_source_error(candidate_id, err.kind(), &err.to_string())
                    .await?;
                return Err(err);
            }
        };

        if !signals.ats_links.is_empty() {
            self.counters.inc_ats_detected();
            promote_ats_links(&self.store, &self.counters, &signals.ats_links).await;
            self.store.mark_host_ats_backed(&host).await?;
            self.store
                .add_source(
                    NewSource::rejected(
                        &normalized,
                        source_type,
                        PageType::NonJobHighConfidence,
                        0.9,
                        "ats_link",
                    )
                    .with_ats_backed(true),
                )
                .await?;
            return Ok(IntakeOutcome::approved(0.9, "ats_link", existed));
        }

        let decision = content::classify(&signals);
        self.counters.inc_source_decision(decision.reason);

        if decision.page_type == PageType::NonJob {
            self.store
                .add_source(NewSource::rejected(
                    &normalized,
                    source_type,
                    PageType::NonJobLowConfidence,
                    decision.confidence,
                    decision.reason,
                ))
                .await?;
            return Ok(IntakeOutcome {
                is_job_site: false,
                tech_related: false,
                confidence: decision.confidence,
                reason: decision.reason.to_string(),
                existed,
            });
        }

        let (canonical, is_alias) = self
            .store
            .resolve_canonical_source(&normalized, &host, decision.page_type)
            .await?;
        if is_alias {
            self.store
                .add_source(NewSource::alias(
                    &normalized,
                    source_type,
                    decision.page_type,
                    canonical,
                ))
                .await?;
            return Ok(IntakeOutcome::rejected("alias_of_canonical", existed));
        }

        self.counters.inc_source_promoted();
        self.store
            .add_source(NewSource::approved(
                &normalized,
                source_type,
                decision.page_type,
                decision.confidence,
                decision.reason,
            ))
            .await?;
        Ok(IntakeOutcome::approved(
            decision.confidence,
            decision.reason,
            existed,
        ))
    }

    async fn intake_resolved(
        &self,
        normalized: &str,
        host: &str,
        source_type: SourceType,
        reason: &str,
    ) -> Result<IntakeOutcome, AppError> {
        let (canonical, is_alias) = self
            .store
            .resolve_canonical_source(normalized, host, PageType::JobList)
            .await?;
        if is_alias {
            let (_, existed) = self
                .store
                .add_source(NewSource::alias(
                    normalized,
                    source_type,
                    PageType::JobList,
                    canonical,
                ))
                .await?;
            return Ok(IntakeOutcome::rejected("alias_of_canonical", existed));
        }
        self.counters.inc_source_promoted();
        let (_, existed) = self
            .store
            .add_source(NewSource::approved(
                normalized,
                source_type,
                PageType::JobList,
                0.9,
                reason,
            ))
            .await?;
        Ok(IntakeOutcome::approved(0.9, reason, existed))
    }
}

/// Heuristic source typing by host substring.
pub fn guess_source_type(url: &str) -> SourceType {
    let lower = url.to_lowercase();
    let board_markers = [
        "remoteok",
        "weworkremotely",
        "builtin.com",
        "greenhouse.io",
        "lever.co",
        "ashbyhq.com",
    ];
    if board_markers.iter().any(|marker| lower.contains(marker)) {
        SourceType::JobBoard
    } else {
        SourceType::CompanyPage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::testutil::{MemoryStore, MockFetcher};

    fn engine(
        store: MemoryStore,
        fetcher: MockFetcher,
    ) -> DiscoveryEngine<MemoryStore, MockFetcher> {
        DiscoveryEngine::new(store, fetcher, Counters::new(), CancellationToken::new())
    }

    #[test]
    fn seeds_parse() {
        let seeds = load_seeds();
        assert!(seeds.len() >= 15, "expected a usable seed list");
        assert!(seeds.iter().all(|s| s.url.starts_with("http")));
    }

    #[tokio::test]
    async fn ats_urls_collapse_to_the_company_board() {
        let store = MemoryStore::new();
        let e = engine(store.clone(), MockFetcher::new());

        e.process_candidate(
            "https://boards.greenhouse.io/stripe/jobs/12345",
            SourceType::JobBoard,
            None,
            0,
        )
        .await;

        let source = store
            .source_by_normalized("https://boards.greenhouse.io/stripe")
            .expect("board source should exist");
        assert_eq!(source.page_type, PageType::JobList);
        assert_eq!(source.classification_reason, "ats_host");
        assert_eq!(source.confidence, 0.9);
        assert!(!source.is_alias);
    }

    #[tokio::test]
    async fn known_job_boards_skip_analysis() {
        let store = MemoryStore::new();
        let fetcher = MockFetcher::new();
        let e = engine(store.clone(), fetcher.clone());

        e.process_candidate("https://remoteok.com", SourceType::JobBoard, None, 0)
            .await;

        let source = store.source_by_normalized("https://remoteok.com/").unwrap();
        assert_eq!(source.classification_reason, "job_board_allowlist");
        assert_eq!(source.page_type, PageType::JobList);
        assert!(fetcher.fetched_urls().is_empty());
    }

    #[tokio::test]
    async fn ats_links_mark_host_backed_and_future_candidates_skip() {
        let store = MemoryStore::new();
        let homepage = r#"<html><body>
            <a href="https://jobs.lever.co/acme/se-1">We're hiring</a>
        </body></html>"#;
        let fetcher = MockFetcher::new()
            .with_page("https://acme.com/", homepage)
            .with_default_body("<html><body>nothing</body></html>");
        let e = engine(store.clone(), fetcher.clone());

        e.process_candidate("https://acme.com", SourceType::CompanyPage, None, 0)
            .await;

        // The lever board landed as the approved source.
        let board = store
            .source_by_normalized("https://jobs.lever.co/acme")
            .expect("lever board should exist");
        assert_eq!(board.page_type, PageType::JobList);
        assert_eq!(board.classification_reason, "ats_link");

        // The homepage itself is a terminal rejection with ats_backed set.
        let homepage_row = store.source_by_normalized("https://acme.com/").unwrap();
        assert_eq!(homepage_row.page_type, PageType::NonJobHighConfidence);
        assert_eq!(homepage_row.classification_reason, "ats_link");
        assert!(homepage_row.ats_backed);

        // Later candidates on the same host are skipped without a fetch.
        let fetched_before = fetcher.fetched_urls().len();
        e.process_candidate("https://acme.com/about", SourceType::CompanyPage, None, 0)
            .await;
        assert_eq!(fetcher.fetched_urls().len(), fetched_before);
    }

    #[tokio::test]
    async fn career_pages_are_approved_and_parents_promoted() {
        let store = MemoryStore::new();
        let careers = r#"<html><head><title>Open roles: Backend Engineer</title></head>
            <body><p>Join our team, apply now.</p></body></html>"#;
        let fetcher = MockFetcher::new().with_page("https://acme.com/careers", careers);
        let e = engine(store.clone(), fetcher);

        e.process_candidate(
            "https://acme.com/careers",
            SourceType::CompanyPage,
            Some("https://acme.com/about-us"),
            0,
        )
        .await;

        let source = store.source_by_normalized("https://acme.com/careers").unwrap();
        assert!(source.is_job_site);
        assert_eq!(source.page_type, PageType::JobList);
        assert_eq!(source.classification_reason, "title_pattern");
    }

    #[tokio::test]
    async fn rejected_pages_get_one_recheck_then_stick() {
        let store = MemoryStore::new();
        let empty = "<html><body><p>corporate brochure</p></body></html>";
        let fetcher = MockFetcher::new().with_default_body(empty);
        let e = engine(store.clone(), fetcher.clone());

        let url = "https://acme.com/team-page";
        e.process_candidate(url, SourceType::CompanyPage, None, 0).await;
        let row = store.source_by_normalized("https://acme.com/team-page").unwrap();
        assert_eq!(row.page_type, PageType::NonJobLowConfidence);
        assert_eq!(row.recheck_count, 0);

        // Second sighting: one retry, then promoted to a hard rejection.
        e.process_candidate(url, SourceType::CompanyPage, None, 0).await;
        let row = store.source_by_normalized("https://acme.com/team-page").unwrap();
        assert_eq!(row.page_type, PageType::NonJobHighConfidence);
        assert_eq!(row.recheck_count, 1);
        assert_eq!(row.classification_reason, "no_job_signals_retry");

        // Third sighting: skipped entirely, no new fetch.
        let fetched_before = fetcher.fetched_urls().len();
        e.process_candidate(url, SourceType::CompanyPage, None, 0).await;
        assert_eq!(fetcher.fetched_urls().len(), fetched_before);
    }

    #[tokio::test]
    async fn process_candidate_is_idempotent_for_approved_sources() {
        let store = MemoryStore::new();
        let careers = r#"<html><head><title>Backend Engineer roles</title></head><body></body></html>"#;
        let fetcher = MockFetcher::new()
            .with_page("https://acme.com/careers", careers)
            .with_page("https://acme.com/careers", careers);
        let e = engine(store.clone(), fetcher.clone());

        e.process_candidate("https://acme.com/careers", SourceType::CompanyPage, None, 0)
            .await;
        let first = store.source_by_normalized("https://acme.com/careers").unwrap();

        e.process_candidate("https://acme.com/careers", SourceType::CompanyPage, None, 0)
            .await;
        let second = store.source_by_normalized("https://acme.com/careers").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.page_type, second.page_type);
        assert_eq!(first.classification_reason, second.classification_reason);
        // The approved row short-circuits, so only the first fetch happened.
        assert_eq!(fetcher.fetched_urls().len(), 1);
    }

    #[tokio::test]
    async fn canonical_uniqueness_across_two_rounds() {
        let store = MemoryStore::new();
        let listing = r#"<html><head><title>Backend Engineer openings</title></head><body></body></html>"#;
        let fetcher = MockFetcher::new()
            .with_page("https://acme.com/jobs", listing)
            .with_page("https://acme.com/careers", listing);
        let e = engine(store.clone(), fetcher);

        e.process_candidate("https://acme.com/jobs", SourceType::CompanyPage, None, 0)
            .await;
        e.process_candidate("https://acme.com/careers", SourceType::CompanyPage, None, 0)
            .await;

        // /careers (priority 1) wins; /jobs becomes its alias.
        let jobs_row = store.source_by_normalized("https://acme.com/jobs").unwrap();
        assert!(jobs_row.is_alias);
        assert_eq!(
            jobs_row.canonical_url.as_deref(),
            Some("https://acme.com/careers")
        );

        let canonicals: Vec<_> = store
            .sources()
            .into_iter()
            .filter(|s| {
                s.host == "acme.com"
                    && s.is_job_site
                    && !s.is_alias
                    && s.page_type.is_scrapeable()
            })
            .collect();
        assert_eq!(canonicals.len(), 1);
        assert_eq!(canonicals[0].normalized_url, "https://acme.com/careers");
    }

    #[tokio::test]
    async fn intake_classifies_inline() {
        let store = MemoryStore::new();
        let careers = r#"<html><head><title>Careers at Vercel</title></head>
            <body><p>We're hiring for open roles. Apply now.</p></body></html>"#;
        let fetcher = MockFetcher::new().with_page("https://vercel.com/careers", careers);
        let e = engine(store.clone(), fetcher);

        let outcome = e
            .intake("https://vercel.com/careers", SourceType::CompanyPage)
            .await
            .unwrap();
        assert!(outcome.is_job_site);
        assert!(outcome.tech_related);
        assert!(outcome.confidence >= 0.6);
        assert!(!outcome.existed);

        let row = store.source_by_normalized("https://vercel.com/careers").unwrap();
        assert!(row.page_type.is_scrapeable());
        assert!(!row.is_alias);
    }

    #[tokio::test]
    async fn intake_rejects_ineligible_and_ats_roots() {
        let store = MemoryStore::new();
        let e = engine(store.clone(), MockFetcher::new());

        let outcome = e
            .intake("https://acme.com/brochure.pdf", SourceType::Unknown)
            .await
            .unwrap();
        assert!(!outcome.is_job_site);
        assert_eq!(outcome.reason, "ineligible_url");

        let outcome = e
            .intake("https://boards.greenhouse.io", SourceType::Unknown)
            .await
            .unwrap();
        assert!(!outcome.is_job_site);
        assert_eq!(outcome.reason, "ats_root");
    }

    #[test]
    fn source_type_guessing() {
        assert_eq!(
            guess_source_type("https://remoteok.com/api"),
            SourceType::JobBoard
        );
        assert_eq!(
            guess_source_type("https://jobs.lever.co/acme"),
            SourceType::JobBoard
        );
        assert_eq!(
            guess_source_type("https://acme.com/careers"),
            SourceType::CompanyPage
        );
    }
}
