use serde::{Deserialize, Serialize};

use super::{EventId, SeatId, StatusUpdate, UserId};

/// `lock(eventId, seatIds, userId)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub event_id: EventId,
    pub seat_ids: Vec<SeatId>,
    pub user_id: UserId,
}

/// Ответ сервиса блокировок. `conflicts` - серверный взгляд на отклонённые
/// места (кто держит, версия), `ttl_seconds` - срок удержания выданных мест.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockResponse {
    #[serde(default)]
    pub granted: Vec<SeatId>,
    #[serde(default)]
    pub rejected: Vec<SeatId>,
    #[serde(default)]
    pub conflicts: Vec<StatusUpdate>,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

/// `unlock(seatIds)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockRequest {
    pub event_id: EventId,
    pub seat_ids: Vec<SeatId>,
    pub user_id: UserId,
}
