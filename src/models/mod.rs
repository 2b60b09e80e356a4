pub mod event;
pub mod lock;
pub mod seat;
pub mod snapshot;
pub mod section;
pub mod stage;
pub mod status;

pub use event::Event;
pub use lock::{LockRequest, LockResponse, UnlockRequest};
pub use seat::{Seat, SeatType, Ticket};
pub use snapshot::{RowRecord, SeatMapSnapshot, SeatRecord, SectionRecord, StageRecord};
pub use section::{Row, Section};
pub use stage::{Stage, StageShape};
pub use status::{FeedStatus, SeatStatus, StatusUpdate};

pub type EventId = i64;
pub type SectionId = i64;
pub type RowId = i64;
pub type SeatId = i64;
pub type TicketId = i64;
pub type UserId = i64;
