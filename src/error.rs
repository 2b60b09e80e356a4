//! Таксономия ошибок движка схемы зала.
//!
//! Ошибки блокировок и ленты статусов обрабатываются внутри синхронизатора и
//! превращаются в уведомления (`Notice`); наружу через `SeatMapError` выходят
//! только ошибки загрузки и валидации.

use thiserror::Error;

use crate::models::{SeatId, TicketId};

/// Отказ в выборе места. Состояние при этом не меняется.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("ticket category {ticket_name} allows at most {limit} seats per user")]
    LimitExceeded {
        ticket_id: TicketId,
        ticket_name: String,
        limit: u32,
    },
    #[error("at most {limit} seats can be selected at once")]
    TotalLimitExceeded { limit: u32 },
    #[error("seat {0} has no ticket category assigned")]
    NoTicketAssigned(SeatId),
    #[error("seat {0} is not part of this seat map")]
    UnknownSeat(SeatId),
    #[error("seat {0} cannot be selected in its current state")]
    NotEligible(SeatId),
}

/// Ошибки сервиса блокировок.
#[derive(Debug, Error)]
pub enum LockError {
    /// Место занято параллельно другим пользователем.
    #[error("seats {0:?} were locked concurrently by someone else")]
    Conflict(Vec<SeatId>),
    /// Сеть не ответила после всех повторов.
    #[error("lock service did not respond after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("circuit breaker is open - lock service temporarily unavailable")]
    CircuitOpen,
    #[error("lock service transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("lock service returned status {status}: {body}")]
    InvalidResponse { status: u16, body: String },
}

impl LockError {
    /// Имеет ли смысл повторять запрос.
    pub fn is_retryable(&self) -> bool {
        match self {
            LockError::Transport(_) | LockError::Timeout { .. } => true,
            LockError::InvalidResponse { status, .. } => *status >= 500,
            LockError::Conflict(_) | LockError::CircuitOpen => false,
        }
    }
}

/// MalformedGeometry: элемент схемы без координат или с недопустимыми размерами.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed {element} {id}: {reason}")]
pub struct GeometryError {
    pub element: &'static str,
    pub id: i64,
    pub reason: String,
}

/// IconLoadFailure: глиф не найден или не растеризовался.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IconError {
    #[error("icon {0:?} is not in the registry")]
    UnknownIcon(String),
    #[error("icon {name:?} has invalid path data: {reason}")]
    InvalidPath { name: String, reason: String },
    #[error("icon size {0} is out of range")]
    InvalidSize(u32),
    #[error("rasterization task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("seat map request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("seat map service returned status {0}")]
    Status(u16),
    #[error("seat map for event {0} contains no renderable seats")]
    Empty(i64),
}

/// Umbrella error for the session API.
#[derive(Debug, Error)]
pub enum SeatMapError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error("session {0} not found")]
    SessionNotFound(uuid::Uuid),
}
