use scout_client::PoliteFetcher;
use scout_core::stats::Counters;
use scout_db::Database;
use scout_engine::DiscoveryEngine;

/// Shared application state, available to all route handlers via
/// `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Database,
    pub counters: Counters,
    /// Discovery engine handle, used for inline classification of sources
    /// submitted through the API.
    pub engine: DiscoveryEngine<Database, PoliteFetcher>,
}
