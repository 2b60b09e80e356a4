//! Опрос ленты статусов: один запрос на событие, курсор хранится здесь.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::snapshot::SnapshotClient;
use crate::models::{EventId, StatusUpdate};
use crate::session::driver::SessionHandle;
use crate::session::registry::SessionRegistry;

pub struct StatusFeedPoller {
    client: SnapshotClient,
    cursors: HashMap<EventId, u64>,
}

impl StatusFeedPoller {
    pub fn new(client: SnapshotClient) -> Self {
        Self { client, cursors: HashMap::new() }
    }

    pub fn cursor(&self, event_id: EventId) -> u64 {
        self.cursors.get(&event_id).copied().unwrap_or(0)
    }

    /// Новые изменения по событию. Ошибка ленты не фатальна: логируем и
    /// пробуем снова со старым курсором на следующем тике.
    pub async fn poll(&mut self, event_id: EventId) -> Vec<StatusUpdate> {
        let since = self.cursor(event_id);
        match self.client.fetch_updates(event_id, since).await {
            Ok(page) => {
                // Курсор не откатывается назад
                self.cursors.insert(event_id, page.cursor.max(since));
                page.updates
            }
            Err(e) => {
                warn!("Status feed poll for event {} failed: {}", event_id, e);
                Vec::new()
            }
        }
    }

    /// Забывает курсоры событий, которые больше никто не смотрит.
    pub fn retain_events(&mut self, mut live: impl FnMut(EventId) -> bool) {
        self.cursors.retain(|event_id, _| live(*event_id));
    }
}

/// Догоняет ленту для одного сеанса с позиции его снимка.
///
/// Общий курсор опроса мог уйти вперёд, пока снимок грузился, а сеанс ещё
/// не был зарегистрирован. Повторно доставленные изменения отсекаются по версии.
pub async fn catch_up(client: &SnapshotClient, handle: &SessionHandle, event_id: EventId, since: u64) -> usize {
    match client.fetch_updates(event_id, since).await {
        Ok(page) => {
            let applied = page.updates.len();
            if applied > 0 {
                debug!("Catching up {} status updates for event {} since {}", applied, event_id, since);
                handle.apply_feed(page.updates).await;
            }
            applied
        }
        Err(e) => {
            warn!("Status feed catch-up for event {} failed: {}", event_id, e);
            0
        }
    }
}

/// Фоновый опрос ленты для всех открытых сеансов.
pub fn spawn_feed_loop(
    mut poller: StatusFeedPoller,
    registry: Arc<SessionRegistry>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    info!("Starting status feed poller, interval {:?}", every);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let grouped = registry.by_event().await;
            poller.retain_events(|event_id| grouped.contains_key(&event_id));
            for (event_id, sessions) in grouped {
                let updates = poller.poll(event_id).await;
                if updates.is_empty() {
                    continue;
                }
                for handle in &sessions {
                    handle.apply_feed(updates.clone()).await;
                }
            }
        }
    })
}
