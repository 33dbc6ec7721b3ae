use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use scout_client::{FetchConfig, MatchClient, PoliteFetcher};
use scout_core::scoring::min_match_score_from_env;
use scout_core::stats::Counters;
use scout_db::{Database, DatabaseConfig};
use scout_engine::{DiscoveryEngine, IngestionService};
use scout_server::routes;
use scout_server::state::AppState;

const DISCOVERY_INTERVAL: Duration = Duration::from_secs(60 * 60);
const SCRAPE_INTERVAL: Duration = Duration::from_secs(30 * 60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const RETENTION_DAYS: i64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scout=info".parse()?))
        .with_target(false)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");
    let min_match_score = min_match_score_from_env(std::env::var("JOB_MIN_MATCH_SCORE").ok());
    let user_agent =
        std::env::var("SCOUT_USER_AGENT").unwrap_or_else(|_| "scout-bot/1.0".to_string());

    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    db.migrate().await?;

    let cancel = CancellationToken::new();
    let counters = Counters::new();

    let fetcher = PoliteFetcher::new(
        FetchConfig {
            user_agent,
            ..FetchConfig::default()
        },
        cancel.child_token(),
    )?;
    let matcher = MatchClient::from_env()?;

    let engine = DiscoveryEngine::new(
        db.clone(),
        fetcher.clone(),
        counters.clone(),
        cancel.child_token(),
    );
    let discovery = engine.clone();
    tokio::spawn(async move { discovery.run(DISCOVERY_INTERVAL).await });

    let ingestion = IngestionService::new(
        db.clone(),
        fetcher,
        matcher,
        counters.clone(),
        min_match_score,
        cancel.child_token(),
    );
    let scraper = ingestion.clone();
    tokio::spawn(async move { scraper.run_scrape_loop(SCRAPE_INTERVAL).await });
    tokio::spawn(async move {
        ingestion
            .run_cleanup_loop(CLEANUP_INTERVAL, chrono::Duration::days(RETENTION_DAYS))
            .await
    });

    let state = Arc::new(AppState {
        db,
        counters,
        engine,
    });

    let cors = match std::env::var("SCOUT_CORS_ORIGIN") {
        Ok(origin) if origin == "*" => CorsLayer::permissive(),
        Ok(origin) => {
            let origins: Vec<HeaderValue> = origin
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        }
        Err(_) => CorsLayer::permissive(),
    };

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!("starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install CTRL+C handler");
        return;
    }
    tracing::info!("shutdown signal received");
    cancel.cancel();
}
