use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use scout_core::models::SourceType;

use crate::dto::{
    AddSourceRequest, AddSourceResponse, ErrorResponse, HealthResponse, JobActionResponse,
    JobListResponse, JobResponse, PaginationQuery, SourceListResponse, SourceResponse,
    StatsHistoryQuery, StatsHistoryResponse, StatsResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}/apply", post(apply_job))
        .route("/jobs/{id}/reject", post(reject_job))
        .route("/jobs/{id}/close", post(close_job))
        .route("/sources", get(list_sources))
        .route("/sources", post(add_source))
        .route("/stats", get(stats))
        .route("/stats/history", get(stats_history))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ok = state.db.health_check().await.is_ok();
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        status: if db_ok { "healthy" } else { "unhealthy" },
        database: if db_ok { "ok" } else { "error" },
    };
    (status, axum::Json(body))
}

#[utoipa::path(
    get,
    path = "/jobs",
    params(PaginationQuery),
    responses((status = 200, description = "Jobs ordered for review", body = JobListResponse)),
    tag = "jobs"
)]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = query.resolve();
    let (jobs, total, active_total) = state.db.job_repo().get_jobs(limit, offset).await?;

    Ok(axum::Json(JobListResponse {
        items: jobs.into_iter().map(JobResponse::from).collect(),
        limit,
        offset,
        total,
        active_total,
    }))
}

#[utoipa::path(
    post,
    path = "/jobs/{id}/apply",
    params(("id" = i64, Path, description = "Job ID")),
    responses((status = 200, description = "Job marked applied", body = JobActionResponse)),
    tag = "jobs"
)]
pub async fn apply_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.job_repo().mark_job_applied(id).await?;
    Ok(axum::Json(JobActionResponse {
        applied: Some(true),
        rejected: None,
        closed: None,
    }))
}

#[utoipa::path(
    post,
    path = "/jobs/{id}/reject",
    params(("id" = i64, Path, description = "Job ID")),
    responses((status = 200, description = "Job marked rejected", body = JobActionResponse)),
    tag = "jobs"
)]
pub async fn reject_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.job_repo().mark_job_rejected(id).await?;
    Ok(axum::Json(JobActionResponse {
        applied: None,
        rejected: Some(true),
        closed: None,
    }))
}

#[utoipa::path(
    post,
    path = "/jobs/{id}/close",
    params(("id" = i64, Path, description = "Job ID")),
    responses((status = 200, description = "Job marked closed", body = JobActionResponse)),
    tag = "jobs"
)]
pub async fn close_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.job_repo().mark_job_closed(id).await?;
    Ok(axum::Json(JobActionResponse {
        applied: None,
        rejected: None,
        closed: Some(true),
    }))
}

#[utoipa::path(
    get,
    path = "/sources",
    params(PaginationQuery),
    responses((status = 200, description = "Approved sources", body = SourceListResponse)),
    tag = "sources"
)]
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = query.resolve();
    let (sources, total) = state.db.source_repo().list_sources(limit, offset).await?;

    Ok(axum::Json(SourceListResponse {
        items: sources.into_iter().map(SourceResponse::from).collect(),
        limit,
        offset,
        total,
    }))
}

#[utoipa::path(
    post,
    path = "/sources",
    request_body = AddSourceRequest,
    responses(
        (status = 200, description = "Source classified", body = AddSourceResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
    ),
    tag = "sources"
)]
pub async fn add_source(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<AddSourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError(scout_core::AppError::UrlError(
            "url is required".into(),
        )));
    }
    let source_type = body.source_type.parse().unwrap_or(SourceType::Unknown);

    let outcome = state.engine.intake(body.url.trim(), source_type).await?;
    Ok(axum::Json(AddSourceResponse::from(outcome)))
}

#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Pipeline counters and totals", body = StatsResponse)),
    tag = "stats"
)]
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats_repo = state.db.stats_repo();
    let (sources_total, jobs_total, active_jobs) = stats_repo.get_stats_counts().await?;
    let snapshot = state.counters.snapshot();

    // Reading stats is also when a sample gets appended; a failed write
    // must not fail the read.
    if let Err(err) = stats_repo
        .save_snapshot(&snapshot, sources_total, jobs_total, active_jobs)
        .await
    {
        tracing::warn!(error = %err, "failed to save stats snapshot");
    }

    Ok(axum::Json(StatsResponse::from_snapshot(
        &snapshot,
        sources_total,
        jobs_total,
        active_jobs,
    )))
}

#[utoipa::path(
    get,
    path = "/stats/history",
    params(StatsHistoryQuery),
    responses(
        (status = 200, description = "Metric history, newest first", body = StatsHistoryResponse),
        (status = 400, description = "Unknown metric", body = ErrorResponse),
    ),
    tag = "stats"
)]
pub async fn stats_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsHistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.metric.trim().is_empty() {
        return Err(ApiError(scout_core::AppError::UnknownMetric(
            "metric is required".into(),
        )));
    }
    let pagination = PaginationQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let (limit, offset) = pagination.resolve();

    let (items, total) = state
        .db
        .stats_repo()
        .list_history(&query.metric, limit, offset)
        .await?;

    Ok(axum::Json(StatsHistoryResponse {
        metric: query.metric,
        items: items.into_iter().map(Into::into).collect(),
        limit,
        offset,
        total,
    }))
}
