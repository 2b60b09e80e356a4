use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::driver::SessionHandle;
use crate::models::EventId;

/// Открытые сеансы просмотра.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, (EventId, SessionHandle)>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: Uuid, event_id: EventId, handle: SessionHandle) {
        self.sessions.write().await.insert(id, (event_id, handle));
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).map(|(_, h)| h.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.write().await.remove(&id).map(|(_, h)| h)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<SessionHandle> {
        self.sessions.read().await.values().map(|(_, h)| h.clone()).collect()
    }

    /// Сеансы, сгруппированные по событию: ленту статусов опрашиваем по разу на событие.
    pub async fn by_event(&self) -> HashMap<EventId, Vec<SessionHandle>> {
        let mut grouped: HashMap<EventId, Vec<SessionHandle>> = HashMap::new();
        for (event_id, handle) in self.sessions.read().await.values() {
            grouped.entry(*event_id).or_default().push(handle.clone());
        }
        grouped
    }
}
