use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageShape {
    #[default]
    Straight,
    Curved,
}

/// Сцена или экран: декоративный ориентир, не интерактивна.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub shape: StageShape,
    #[serde(default)]
    pub curve_factor: f64,
    #[serde(default)]
    pub label: String,
}

impl Stage {
    pub fn bounds(&self) -> Rect {
        // Изогнутая сцена выгибается вниз на curve_factor * height
        let bulge = match self.shape {
            StageShape::Straight => 0.0,
            StageShape::Curved => self.curve_factor.max(0.0) * self.height,
        };
        Rect::new(self.x, self.y, self.width, self.height + bulge)
    }
}
