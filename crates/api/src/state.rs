use std::sync::Arc;

use autotube_core::storage::ArtifactStore;

use crate::config::ServerConfig;
use crate::ws::Subscribers;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: autotube_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Dashboard sockets on the job change feed.
    pub subscribers: Arc<Subscribers>,
    /// Where job artifacts live. Uploads write here, deletes clean up here.
    pub artifacts: Arc<dyn ArtifactStore>,
}
