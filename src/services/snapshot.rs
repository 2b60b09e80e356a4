//! Клиент сервиса снимков схемы зала и ленты статусов.

use serde::Deserialize;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::SnapshotError;
use crate::models::{EventId, SeatMapSnapshot, StatusUpdate};

/// Страница ленты статусов: изменения после курсора `since`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusFeedPage {
    #[serde(default)]
    pub updates: Vec<StatusUpdate>,
    /// Курсор для следующего запроса.
    pub cursor: u64,
}

#[derive(Clone)]
pub struct SnapshotClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl SnapshotClient {
    pub fn from_config(config: &Config) -> Result<Self, SnapshotError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.seat_map_api.timeout_secs))
            .gzip(true)
            .build()?;
        Ok(Self {
            base_url: config.seat_map_api.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Полный снимок схемы с текущими статусами мест.
    pub async fn fetch(&self, event_id: EventId) -> Result<SeatMapSnapshot, SnapshotError> {
        let response = self
            .http_client
            .get(format!("{}/events/{}/seat-map", self.base_url, event_id))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SnapshotError::Status(response.status().as_u16()));
        }
        let snapshot: SeatMapSnapshot = response.json().await?;
        if snapshot.sections.is_empty() {
            return Err(SnapshotError::Empty(event_id));
        }
        info!("Fetched seat map for event {}: {} sections", event_id, snapshot.sections.len());
        Ok(snapshot)
    }

    /// Изменения статусов после курсора `since`.
    pub async fn fetch_updates(&self, event_id: EventId, since: u64) -> Result<StatusFeedPage, SnapshotError> {
        let response = self
            .http_client
            .get(format!("{}/events/{}/seat-status", self.base_url, event_id))
            .query(&[("since", since)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SnapshotError::Status(response.status().as_u16()));
        }
        let page: StatusFeedPage = response.json().await?;
        debug!("Status feed for event {}: {} updates, cursor {}", event_id, page.updates.len(), page.cursor);
        Ok(page)
    }
}
