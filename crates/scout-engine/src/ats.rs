//! Promotion of ATS board links discovered on company pages.

use std::collections::HashSet;

use scout_core::models::{NewSource, PageType, SourceType};
use scout_core::stats::Counters;
use scout_core::traits::SourceStore;
use scout_core::urlutil;

/// Insert each discovered ATS link as a `job_list` source, deduplicating
/// by company slug and respecting the host's canonical slot.
pub(crate) async fn promote_ats_links<S: SourceStore>(
    store: &S,
    counters: &Counters,
    links: &[String],
) {
    let mut seen = HashSet::new();
    for link in links {
        let Ok((normalized, host)) = urlutil::normalize_ats(link) else {
            continue;
        };
        if host.is_empty() || !seen.insert(normalized.clone()) {
            continue;
        }

        let resolved = store
            .resolve_canonical_source(&normalized, &host, PageType::JobList)
            .await;
        let (canonical, is_alias) = match resolved {
            Ok(outcome) => outcome,
            Err(err) => {
                counters.inc_error(err.kind(), "discovery");
                continue;
            }
        };

        let source = if is_alias {
            NewSource::alias(&normalized, SourceType::JobBoard, PageType::JobList, canonical)
        } else {
            counters.inc_source_promoted();
            NewSource::approved(
                &normalized,
                SourceType::JobBoard,
                PageType::JobList,
                0.9,
                "ats_link",
            )
        };
        if let Err(err) = store.add_source(source).await {
            counters.inc_error(err.kind(), "discovery");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::testutil::MemoryStore;

    #[tokio::test]
    async fn promotes_and_dedupes_ats_links() {
        let store = MemoryStore::new();
        let counters = Counters::new();
        let links = vec![
            "https://jobs.lever.co/acme/se-1".to_string(),
            "https://jobs.lever.co/acme/se-2".to_string(),
            "https://boards.greenhouse.io/globex/jobs/1".to_string(),
        ];

        promote_ats_links(&store, &counters, &links).await;

        let sources = store.sources();
        // Both lever links collapse to the acme board.
        assert_eq!(sources.len(), 2);
        assert!(store
            .source_by_normalized("https://jobs.lever.co/acme")
            .is_some_and(|s| s.page_type == PageType::JobList && !s.is_alias));
        assert!(store
            .source_by_normalized("https://boards.greenhouse.io/globex")
            .is_some());
        assert_eq!(counters.snapshot().sources_promoted, 2);
    }

    #[tokio::test]
    async fn second_board_on_a_host_becomes_an_alias_or_canonical() {
        let store = MemoryStore::new();
        let counters = Counters::new();

        promote_ats_links(
            &store,
            &counters,
            &["https://jobs.lever.co/acme".to_string()],
        )
        .await;
        promote_ats_links(
            &store,
            &counters,
            &["https://jobs.lever.co/globex".to_string()],
        )
        .await;

        // ATS priorities tie at 0, so the incumbent keeps the slot and the
        // newcomer is recorded as an alias.
        let newcomer = store
            .source_by_normalized("https://jobs.lever.co/globex")
            .unwrap();
        assert!(newcomer.is_alias);
        assert_eq!(
            newcomer.canonical_url.as_deref(),
            Some("https://jobs.lever.co/acme")
        );
    }
}
