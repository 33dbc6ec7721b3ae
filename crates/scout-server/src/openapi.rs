use utoipa::OpenApi;

use crate::dto::{
    AddSourceRequest, AddSourceResponse, ErrorResponse, HealthResponse, JobActionResponse,
    JobListResponse, JobResponse, SourceListResponse, SourceResponse, StatPointResponse,
    StatsHistoryResponse, StatsResponse,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "scout API",
        description = "Job-listing discovery and ingestion pipeline API",
    ),
    paths(
        crate::routes::health,
        crate::routes::list_jobs,
        crate::routes::apply_job,
        crate::routes::reject_job,
        crate::routes::close_job,
        crate::routes::list_sources,
        crate::routes::add_source,
        crate::routes::stats,
        crate::routes::stats_history,
    ),
    components(schemas(
        AddSourceRequest,
        AddSourceResponse,
        ErrorResponse,
        HealthResponse,
        JobActionResponse,
        JobListResponse,
        JobResponse,
        SourceListResponse,
        SourceResponse,
        StatPointResponse,
        StatsHistoryResponse,
        StatsResponse,
    )),
    tags(
        (name = "jobs", description = "Extracted job postings"),
        (name = "sources", description = "Discovered sources"),
        (name = "stats", description = "Pipeline counters"),
        (name = "system", description = "Health"),
    )
)]
pub struct ApiDoc;
