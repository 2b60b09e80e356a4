//! Display list, который получает фронтенд. Все координаты мировые,
//! экранное преобразование передаётся отдельно в `Frame::transform`.

use serde::{Serialize, Serializer};
use std::sync::Arc;

use super::visual::SeatVisual;
use crate::geometry::{Point, Rect};
use crate::icons::IconKey;
use crate::models::{RowId, SeatId, SectionId, StageShape};
use crate::viewport::Transform;

/// Чем рисовать содержимое места: готовой иконкой или номером.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeatGlyph {
    Icon { key: IconKey },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    Stage {
        bounds: Rect,
        shape: StageShape,
        curve_factor: f64,
        label: String,
    },
    SectionLabel {
        section_id: SectionId,
        text: String,
        at: Point,
    },
    RowLabel {
        row_id: RowId,
        text: String,
        at: Point,
    },
    Seat {
        seat_id: SeatId,
        center: Point,
        radius: f64,
        stroke_width: f64,
        visual: SeatVisual,
        glyph: SeatGlyph,
    },
}

impl DrawCommand {
    pub fn seat_id(&self) -> Option<SeatId> {
        match self {
            DrawCommand::Seat { seat_id, .. } => Some(*seat_id),
            _ => None,
        }
    }
}

/// Кадр собирается из слоёв: сцена, заголовки секций и ряды. Слой ряда,
/// который не перерисовывался, - тот же `Arc`, что и в прошлом кадре.
/// Наружу кадр уходит плоским списком `commands`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub transform: Transform,
    #[serde(rename = "commands", serialize_with = "flatten_layers")]
    pub layers: Vec<Arc<[DrawCommand]>>,
    /// Иконки, которых ещё нет в кеше: их нужно растеризовать и перерисовать места.
    pub missing_icons: Vec<IconKey>,
}

impl Frame {
    pub fn commands(&self) -> impl Iterator<Item = &DrawCommand> {
        self.layers.iter().flat_map(|layer| layer.iter())
    }

    pub fn seat(&self, seat_id: SeatId) -> Option<&DrawCommand> {
        self.commands().find(|c| c.seat_id() == Some(seat_id))
    }
}

fn flatten_layers<S: Serializer>(layers: &[Arc<[DrawCommand]>], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(layers.iter().flat_map(|layer| layer.iter()))
}
