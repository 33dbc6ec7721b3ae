//! PostgreSQL persistence: the database facade and its repositories.

pub mod config;
pub mod database;
pub mod job_repository;
pub mod source_repository;
pub mod stats_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use job_repository::JobRepository;
pub use source_repository::SourceRepository;
pub use stats_repository::StatsRepository;

/// Clamp pagination inputs: limit to [1, 200] with a default of 20,
/// offset to non-negative.
pub(crate) fn normalize_pagination(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 { 20 } else { limit.min(200) };
    (limit, offset.max(0))
}

/// Truncate a message for storage, respecting char boundaries.
pub(crate) fn truncate_message(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        return message.to_string();
    }
    message.chars().take(max).collect()
}
