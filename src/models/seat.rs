use serde::{Deserialize, Serialize};

use super::{SeatId, TicketId};
use crate::geometry::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatType {
    #[default]
    Normal,
    /// Пустое место в ряду (проход). Никогда не интерактивно.
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub name: String,
    pub price: i64,
    /// Лимит мест этой категории на одного пользователя (если сервис его задаёт).
    #[serde(default)]
    pub booking_limit: Option<u32>,
}

/// Seat geometry in section-local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub number: String,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    #[serde(rename = "type", default)]
    pub seat_type: SeatType,
    pub ticket: Option<Ticket>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl Seat {
    pub fn is_blank(&self) -> bool {
        self.seat_type == SeatType::Blank
    }

    pub fn has_ticket(&self) -> bool {
        self.ticket.is_some()
    }

    /// Центр места в мировых координатах для секции со смещением `origin`.
    pub fn world_center(&self, origin: Point) -> Point {
        origin.offset(self.x, self.y)
    }

    pub fn world_bounds(&self, origin: Point) -> Rect {
        Rect::centered(self.world_center(origin), self.radius * 2.0)
    }
}
