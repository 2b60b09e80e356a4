use serde::{Deserialize, Serialize};

use super::{SeatId, UserId};

/// Статус места. Ровно одно значение в любой момент времени.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "owner", rename_all = "snake_case")]
pub enum SeatStatus {
    Available,
    /// Удержание текущего пользователя (ожидает или уже подтверждено сервером).
    SelectedLocal,
    /// Удержание другого пользователя; владелец может быть неизвестен.
    HeldRemote(Option<UserId>),
    Booked,
    Disabled,
}

impl SeatStatus {
    /// Booked и Disabled меняются только полной перезагрузкой снимка.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SeatStatus::Booked | SeatStatus::Disabled)
    }

    pub fn is_held_by(&self, user_id: UserId) -> bool {
        match self {
            SeatStatus::SelectedLocal => true,
            SeatStatus::HeldRemote(owner) => *owner == Some(user_id),
            _ => false,
        }
    }
}

/// Статус в формате сервиса (снимок, лента изменений, ответ на блокировку).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Available,
    Held,
    Booked,
    Disabled,
}

/// One `{seatId, status, ownerId, version}` tuple from the status feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub seat_id: SeatId,
    pub status: FeedStatus,
    #[serde(default)]
    pub owner_id: Option<UserId>,
    pub version: u64,
}

impl StatusUpdate {
    /// Перевод серверного статуса в локальный с точки зрения пользователя `me`.
    /// Удержание самим пользователем остаётся `HeldRemote(Some(me))`:
    /// в `SelectedLocal` место попадает только через локальный выбор.
    pub fn to_seat_status(&self) -> SeatStatus {
        match self.status {
            FeedStatus::Available => SeatStatus::Available,
            FeedStatus::Held => SeatStatus::HeldRemote(self.owner_id),
            FeedStatus::Booked => SeatStatus::Booked,
            FeedStatus::Disabled => SeatStatus::Disabled,
        }
    }
}
