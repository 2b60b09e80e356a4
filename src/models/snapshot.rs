use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Event, FeedStatus, RowId, SeatId, SeatType, SectionId, StageShape, Ticket, UserId};

/// Снимок схемы зала, как его отдаёт внешний сервис.
///
/// Координаты опциональны: сервис может прислать неполную запись, и такой
/// элемент пропускается при построении `SeatMap`, не ломая остальную схему.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatMapSnapshot {
    pub event: Event,
    #[serde(default)]
    pub stage: Option<StageRecord>,
    #[serde(default)]
    pub sections: Vec<SectionRecord>,
    /// Позиция ленты статусов, которую уже отражает снимок.
    #[serde(default)]
    pub feed_cursor: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StageRecord {
    pub x: Option<f64>,
    pub y: Option<f64>,
    #[validate(range(min = 0.0))]
    pub width: Option<f64>,
    #[validate(range(min = 0.0))]
    pub height: Option<f64>,
    #[serde(default)]
    pub shape: StageShape,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub curve_factor: f64,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SectionRecord {
    pub id: SectionId,
    #[serde(default)]
    pub name: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    #[validate(range(min = 0.0))]
    pub width: Option<f64>,
    #[serde(default)]
    pub rows: Vec<RowRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowRecord {
    pub id: RowId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub seats: Vec<SeatRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SeatRecord {
    pub id: SeatId,
    #[serde(default)]
    pub number: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    #[validate(range(exclusive_min = 0.0))]
    pub radius: Option<f64>,
    #[serde(rename = "type", default)]
    pub seat_type: SeatType,
    #[serde(default)]
    pub ticket: Option<Ticket>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_status")]
    pub status: FeedStatus,
    #[serde(default)]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub version: u64,
}

fn default_status() -> FeedStatus {
    FeedStatus::Available
}
