mod common;

use chrono::{Duration, Utc};

use scout_db::Database;
use scout_core::models::{NewJob, NewSource, PageType, SourceType};
use scout_core::traits::{JobStore, SourceStore};

use common::setup_test_db;

#[tokio::test]
async fn add_source_is_idempotent_on_normalized_url() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);

    let (id1, existed1) = db
        .add_source(NewSource::candidate(
            "https://www.acme.com/careers/",
            SourceType::CompanyPage,
        ))
        .await
        .unwrap();
    assert!(!existed1);

    let (id2, existed2) = db
        .add_source(NewSource::approved(
            "https://acme.com/careers",
            SourceType::CompanyPage,
            PageType::CareerRoot,
            0.85,
            "title_pattern",
        ))
        .await
        .unwrap();
    assert!(existed2);
    assert_eq!(id1, id2);

    let source = db
        .find_source_by_url("https://acme.com/careers")
        .await
        .unwrap()
        .expect("source should exist");
    assert_eq!(source.page_type, PageType::CareerRoot);
    assert_eq!(source.classification_reason, "title_pattern");
    assert!(source.is_job_site);
}

#[tokio::test]
async fn canonical_resolution_aliases_the_lower_priority_url() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);

    db.add_source(NewSource::approved(
        "https://acme.com/jobs",
        SourceType::CompanyPage,
        PageType::JobList,
        0.7,
        "job_links",
    ))
    .await
    .unwrap();

    let (canonical, is_alias) = db
        .resolve_canonical_source("https://acme.com/careers", "acme.com", PageType::CareerRoot)
        .await
        .unwrap();
    assert_eq!(canonical, "https://acme.com/careers");
    assert!(!is_alias);

    let old = db
        .find_source_by_url("https://acme.com/jobs")
        .await
        .unwrap()
        .expect("old canonical should exist");
    assert!(old.is_alias);
    assert_eq!(old.canonical_url.as_deref(), Some("https://acme.com/careers"));

    // Exactly one canonical row remains for the host.
    let canonical_row = db
        .get_canonical_source_by_host("acme.com")
        .await
        .unwrap()
        .expect("canonical should exist");
    assert!(!canonical_row.is_alias);
}

#[tokio::test]
async fn save_job_preserves_posted_at_across_upserts() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);

    let first_seen = Utc::now() - Duration::days(5);
    let job = NewJob {
        source_id: 0,
        source_type: SourceType::JobBoard,
        url: "https://remoteok.com/remote-jobs/1".into(),
        title: "Go Engineer".into(),
        description: "Build services".into(),
        company: "Acme".into(),
        location: "Remote".into(),
        salary_range: Some("$90k-$120k".into()),
        posted_at: Some(first_seen),
        match_score: 80,
        match_summary: "good".into(),
    };
    db.save_job(job.clone()).await.unwrap();

    let mut second = job;
    second.posted_at = Some(Utc::now());
    second.match_score = 90;
    db.save_job(second).await.unwrap();

    let (jobs, total, active_total) = db.get_jobs(10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(active_total, 1);
    let saved = &jobs[0];
    assert_eq!(saved.match_score, 90);
    let drift = (saved.posted_at.unwrap() - first_seen).num_seconds().abs();
    assert!(drift < 2, "posted_at should keep its first value");
}

#[tokio::test]
async fn job_state_flags_and_retention() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);

    let job = NewJob {
        source_id: 0,
        source_type: SourceType::JobBoard,
        url: "https://acme.com/jobs/old".into(),
        title: "Old role".into(),
        description: String::new(),
        company: String::new(),
        location: String::new(),
        salary_range: None,
        posted_at: Some(Utc::now() - Duration::days(45)),
        match_score: 70,
        match_summary: String::new(),
    };
    db.save_job(job).await.unwrap();

    let (jobs, ..) = db.get_jobs(10, 0).await.unwrap();
    db.mark_job_applied(jobs[0].id).await.unwrap();

    let (jobs, _, active_total) = db.get_jobs(10, 0).await.unwrap();
    assert!(jobs[0].applied);
    assert!(jobs[0].applied_at.is_some());
    assert_eq!(active_total, 1);

    let deleted = db.delete_old_jobs(Duration::days(30)).await.unwrap();
    assert_eq!(deleted, 1);
    let (_, total, _) = db.get_jobs(10, 0).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn source_error_bookkeeping_round_trips() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);

    let (id, _) = db
        .add_source(NewSource::approved(
            "https://acme.com/careers",
            SourceType::CompanyPage,
            PageType::CareerRoot,
            0.8,
            "x",
        ))
        .await
        .unwrap();

    let long_message = "e".repeat(2000);
    db.mark_source_error(id, scout_core::ErrorKind::Network, &long_message)
        .await
        .unwrap();

    let source = db
        .find_source_by_url("https://acme.com/careers")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.last_error_type.as_deref(), Some("network"));
    assert_eq!(source.last_error_message.unwrap().len(), 800);

    db.clear_source_error(id).await.unwrap();
    let source = db
        .find_source_by_url("https://acme.com/careers")
        .await
        .unwrap()
        .unwrap();
    assert!(source.last_error_type.is_none());
}
