//! remasterd library interface
//!
//! Exposes the router, state, and services for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use remaster_client::MasteringClient;

use crate::config::HostConfig;
use crate::db::meta::MetaStore;
use crate::services::pipeline::EntityLocks;
use crate::services::scheduler::TaskQueue;

/// Application state shared across handlers and background workers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Client for the remote mastering API
    pub client: Arc<MasteringClient>,
    /// Per-track mastering bookkeeping
    pub store: MetaStore,
    /// Per-track locks serializing mastering writes
    pub locks: EntityLocks,
    /// Background task queue handle
    pub queue: TaskQueue,
    pub config: Arc<HostConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last background task error, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        client: MasteringClient,
        queue: TaskQueue,
        config: Arc<HostConfig>,
    ) -> Self {
        Self {
            store: MetaStore::new(db.clone()),
            db,
            client: Arc::new(client),
            locks: EntityLocks::default(),
            queue,
            config,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::track_routes())
        .merge(api::mastering_routes())
        .merge(api::segment_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
