use serde::{Deserialize, Serialize};
use chrono::NaiveDateTime;

use super::EventId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub datetime_start: Option<NaiveDateTime>,
}
