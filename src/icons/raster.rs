//! Растеризация глифов: path data разбирает `kurbo`, заливку с
//! антиалиасингом по правилу non-zero делает `tiny-skia`.

use kurbo::{BezPath, PathEl};
use serde::Serialize;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

use super::registry::{Glyph, VIEWBOX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `0xRRGGBBAA`.
    pub const fn from_u32(v: u32) -> Self {
        Self::new((v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Готовый битмап глифа.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    /// RGBA без премультипликации, построчно.
    pub pixels: Vec<u8>,
}

impl Raster {
    pub fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4 + 3) as usize;
        self.pixels.get(idx).copied()
    }

    /// Доля пикселей с ненулевой альфой.
    pub fn fill_ratio(&self) -> f64 {
        let total = (self.width * self.height) as usize;
        if total == 0 {
            return 0.0;
        }
        let filled = self.pixels.chunks_exact(4).filter(|px| px[3] > 0).count();
        filled as f64 / total as f64
    }
}

/// Разбор одной строки path data (в единицах viewbox).
pub fn parse_path(data: &str) -> Result<BezPath, String> {
    let path = BezPath::from_svg(data.trim()).map_err(|e| format!("invalid path data: {}", e))?;
    if path.elements().is_empty() {
        return Err("path has no contours".to_string());
    }
    Ok(path)
}

fn append(path: &BezPath, builder: &mut PathBuilder) {
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => builder.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => builder.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
}

/// Растеризует глиф в квадрат `size` x `size`.
pub fn rasterize(glyph: &Glyph, size: u32, color: Rgba) -> Result<Raster, String> {
    let mut builder = PathBuilder::new();
    for data in glyph.paths {
        append(&parse_path(data)?, &mut builder);
    }
    let path = builder
        .finish()
        .ok_or_else(|| "glyph has no drawable contours".to_string())?;
    let mut pixmap =
        Pixmap::new(size, size).ok_or_else(|| format!("cannot allocate {}x{} raster", size, size))?;

    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;

    // Все контуры глифа заливаются одним путём, чтобы дырки работали через обход
    let scale = (size as f64 / VIEWBOX) as f32;
    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::from_scale(scale, scale), None);

    let pixels = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Ok(Raster { width: size, height: size, pixels })
}
