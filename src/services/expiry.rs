use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::session::registry::SessionRegistry;

/// Периодически тикает все сеансы: удержания истекают без ожидания сервера.
pub struct HoldExpiryService {
    registry: Arc<SessionRegistry>,
}

impl HoldExpiryService {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Один проход по всем сеансам.
    pub async fn run_sweep(&self) -> usize {
        let sessions = self.registry.all().await;
        for handle in &sessions {
            handle.tick().await;
        }
        debug!("Hold expiry sweep over {} sessions", sessions.len());
        sessions.len()
    }

    pub fn spawn(self, every: Duration) -> tokio::task::JoinHandle<()> {
        info!("Starting hold expiry sweeper, interval {:?}", every);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                self.run_sweep().await;
            }
        })
    }
}
