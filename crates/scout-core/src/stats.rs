//! Pipeline counters, owned explicitly and shared by `Arc` clone.
//!
//! Scalars are atomics; map-valued counters sit behind a single mutex.
//! [`Counters::snapshot`] returns an owned copy, so readers never hold the
//! pipeline's lock while serializing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::ErrorKind;

#[derive(Default)]
struct Maps {
    source_decisions: HashMap<String, u64>,
    errors_by_type: HashMap<String, u64>,
    errors_by_component: HashMap<String, u64>,
}

#[derive(Default)]
struct Inner {
    pages_crawled: AtomicU64,
    urls_discovered: AtomicU64,
    jobs_discovered: AtomicU64,
    jobs_extracted: AtomicU64,
    ai_calls: AtomicU64,
    errors_total: AtomicU64,
    sources_promoted: AtomicU64,
    ats_detected: AtomicU64,
    sources_zero_jobs: AtomicU64,
    crawl_count: AtomicU64,
    crawl_nanos: AtomicU64,
    maps: Mutex<Maps>,
}

/// Shared counter registry for the whole pipeline.
#[derive(Clone, Default)]
pub struct Counters {
    inner: Arc<Inner>,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub pages_crawled: u64,
    pub urls_discovered: u64,
    pub jobs_discovered: u64,
    pub jobs_extracted: u64,
    pub ai_calls: u64,
    pub errors_total: u64,
    pub sources_promoted: u64,
    pub ats_detected: u64,
    pub sources_zero_jobs: u64,
    pub crawl_seconds_avg: f64,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub source_decisions: HashMap<String, u64>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub errors_by_type: HashMap<String, u64>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub errors_by_component: HashMap<String, u64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages_crawled(&self) {
        self.inner.pages_crawled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_urls_discovered(&self) {
        self.inner.urls_discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_jobs_discovered(&self) {
        self.inner.jobs_discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_jobs_extracted(&self) {
        self.inner.jobs_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ai_call(&self) {
        self.inner.ai_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_source_promoted(&self) {
        self.inner.sources_promoted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ats_detected(&self) {
        self.inner.ats_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_source_zero_jobs(&self) {
        self.inner.sources_zero_jobs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_source_decision(&self, decision: &str) {
        let decision = if decision.is_empty() { "unknown" } else { decision };
        let mut maps = self.inner.maps.lock().expect("stats mutex poisoned");
        *maps.source_decisions.entry(decision.to_string()).or_default() += 1;
    }

    pub fn observe_crawl_seconds(&self, seconds: f64) {
        if seconds <= 0.0 {
            return;
        }
        self.inner.crawl_count.fetch_add(1, Ordering::Relaxed);
        self.inner
            .crawl_nanos
            .fetch_add((seconds * 1e9) as u64, Ordering::Relaxed);
    }

    pub fn inc_error(&self, kind: ErrorKind, component: &str) {
        let component = if component.is_empty() { "unknown" } else { component };
        self.inner.errors_total.fetch_add(1, Ordering::Relaxed);
        let mut maps = self.inner.maps.lock().expect("stats mutex poisoned");
        *maps
            .errors_by_type
            .entry(kind.as_str().to_string())
            .or_default() += 1;
        *maps
            .errors_by_component
            .entry(component.to_string())
            .or_default() += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let (source_decisions, errors_by_type, errors_by_component) = {
            let maps = self.inner.maps.lock().expect("stats mutex poisoned");
            (
                maps.source_decisions.clone(),
                maps.errors_by_type.clone(),
                maps.errors_by_component.clone(),
            )
        };

        let count = self.inner.crawl_count.load(Ordering::Relaxed);
        let crawl_seconds_avg = if count > 0 {
            self.inner.crawl_nanos.load(Ordering::Relaxed) as f64 / count as f64 / 1e9
        } else {
            0.0
        };

        StatsSnapshot {
            pages_crawled: self.inner.pages_crawled.load(Ordering::Relaxed),
            urls_discovered: self.inner.urls_discovered.load(Ordering::Relaxed),
            jobs_discovered: self.inner.jobs_discovered.load(Ordering::Relaxed),
            jobs_extracted: self.inner.jobs_extracted.load(Ordering::Relaxed),
            ai_calls: self.inner.ai_calls.load(Ordering::Relaxed),
            errors_total: self.inner.errors_total.load(Ordering::Relaxed),
            sources_promoted: self.inner.sources_promoted.load(Ordering::Relaxed),
            ats_detected: self.inner.ats_detected.load(Ordering::Relaxed),
            sources_zero_jobs: self.inner.sources_zero_jobs.load(Ordering::Relaxed),
            crawl_seconds_avg,
            source_decisions,
            errors_by_type,
            errors_by_component,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let counters = Counters::new();
        counters.inc_pages_crawled();
        counters.inc_pages_crawled();
        counters.inc_jobs_discovered();
        counters.inc_error(ErrorKind::Network, "discovery");
        counters.inc_error(ErrorKind::Network, "ingestion");
        counters.inc_source_decision("job_list");
        counters.observe_crawl_seconds(2.0);
        counters.observe_crawl_seconds(4.0);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.pages_crawled, 2);
        assert_eq!(snapshot.jobs_discovered, 1);
        assert_eq!(snapshot.errors_total, 2);
        assert_eq!(snapshot.errors_by_type.get("network"), Some(&2));
        assert_eq!(snapshot.errors_by_component.get("discovery"), Some(&1));
        assert_eq!(snapshot.source_decisions.get("job_list"), Some(&1));
        assert!((snapshot.crawl_seconds_avg - 3.0).abs() < 1e-6);
    }

    #[test]
    fn snapshot_is_an_owned_copy() {
        let counters = Counters::new();
        counters.inc_source_decision("career_root");
        let mut snapshot = counters.snapshot();
        snapshot.source_decisions.insert("tampered".into(), 99);

        assert!(counters
            .snapshot()
            .source_decisions
            .get("tampered")
            .is_none());
    }

    #[test]
    fn clones_share_state() {
        let counters = Counters::new();
        let clone = counters.clone();
        clone.inc_ai_call();
        assert_eq!(counters.snapshot().ai_calls, 1);
    }
}
