pub mod config;
pub mod controllers;
pub mod error;
pub mod geometry;
pub mod hit_test;
pub mod icons;
pub mod layout;
pub mod models;
pub mod render;
pub mod selection;
pub mod services;
pub mod session;
pub mod summary;
pub mod sync;
pub mod viewport;

use std::sync::Arc;

use services::lock::{HttpLockClient, LockService};
use services::snapshot::SnapshotClient;
use session::registry::SessionRegistry;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub sessions: Arc<SessionRegistry>,
    pub snapshots: SnapshotClient,
    pub locks: Arc<dyn LockService>,
}

impl AppState {
    pub fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let snapshots = SnapshotClient::from_config(&config)?;
        let locks: Arc<dyn LockService> = Arc::new(HttpLockClient::from_config(&config)?);
        Ok(Arc::new(Self {
            config,
            sessions: Arc::new(SessionRegistry::new()),
            snapshots,
            locks,
        }))
    }
}
