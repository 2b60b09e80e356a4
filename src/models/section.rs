use serde::{Deserialize, Serialize};

use super::{RowId, Seat, SectionId};
use crate::geometry::{Point, Rect};

/// Ряд: места упорядочены слева направо, подпись рисуется один раз.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    pub title: String,
    pub seats: Vec<Seat>,
}

/// Named seating block positioned in world space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub rows: Vec<Row>,
}

impl Section {
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Границы секции: заявленная ширина плюс фактический охват мест.
    pub fn bounds(&self) -> Rect {
        let origin = self.origin();
        let declared = Rect::new(self.x, self.y, self.width, 0.0);
        self.rows
            .iter()
            .flat_map(|row| row.seats.iter())
            .fold(declared, |acc, seat| acc.union(&seat.world_bounds(origin)))
    }

    pub fn row_bounds(&self, row: &Row) -> Option<Rect> {
        let origin = self.origin();
        let rects: Vec<Rect> = row.seats.iter().map(|s| s.world_bounds(origin)).collect();
        Rect::union_all(rects.iter())
    }
}
