//! ViewportController: pan/zoom transform between screen and world space.
//!
//! `screen = world * scale + offset`. Scale is clamped to
//! `[min_scale, max_scale]`, where `min_scale` fits the whole layout into the
//! viewport and `max_scale = min_scale * max_zoom_ratio`. Pan is clamped so
//! that at least `pan_margin_px` of the layout stays on screen.

use serde::Serialize;
use tracing::debug;

use crate::config::InteractionConfig;
use crate::geometry::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
    width: f64,
    height: f64,
    content: Rect,
    min_scale: f64,
    max_scale: f64,
    max_zoom_ratio: f64,
    pan_margin_px: f64,
}

impl Viewport {
    pub fn new(content: Rect, width: f64, height: f64, config: &InteractionConfig) -> Self {
        let mut viewport = Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            width: width.max(1.0),
            height: height.max(1.0),
            content,
            min_scale: 1.0,
            max_scale: 1.0,
            max_zoom_ratio: config.max_zoom_ratio.max(1.0),
            pan_margin_px: config.pan_margin_px.max(0.0),
        };
        viewport.recompute_limits();
        viewport.fit();
        viewport
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn min_scale(&self) -> f64 {
        self.min_scale
    }

    pub fn max_scale(&self) -> f64 {
        self.max_scale
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn transform(&self) -> Transform {
        Transform { scale: self.scale, offset_x: self.offset_x, offset_y: self.offset_y }
    }

    pub fn screen_to_world(&self, p: Point) -> Point {
        Point::new((p.x - self.offset_x) / self.scale, (p.y - self.offset_y) / self.scale)
    }

    pub fn world_to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.scale + self.offset_x, p.y * self.scale + self.offset_y)
    }

    /// Прямоугольник видимой области в мировых координатах.
    pub fn visible_world(&self) -> Rect {
        let top_left = self.screen_to_world(Point::new(0.0, 0.0));
        Rect::new(top_left.x, top_left.y, self.width / self.scale, self.height / self.scale)
    }

    /// Layout bounding box in screen pixels.
    pub fn content_on_screen(&self) -> Rect {
        let a = self.world_to_screen(Point::new(self.content.min_x, self.content.min_y));
        let b = self.world_to_screen(Point::new(self.content.max_x, self.content.max_y));
        Rect::new(a.x, a.y, b.x - a.x, b.y - a.y)
    }

    /// Вписать схему целиком и отцентрировать.
    pub fn fit(&mut self) {
        self.scale = self.min_scale;
        let center = self.content.center();
        self.offset_x = self.width / 2.0 - center.x * self.scale;
        self.offset_y = self.height / 2.0 - center.y * self.scale;
        self.clamp_pan();
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        let anchor_world = self.screen_to_world(Point::new(self.width / 2.0, self.height / 2.0));
        self.width = width.max(1.0);
        self.height = height.max(1.0);
        self.recompute_limits();
        self.scale = self.scale.clamp(self.min_scale, self.max_scale);
        self.offset_x = self.width / 2.0 - anchor_world.x * self.scale;
        self.offset_y = self.height / 2.0 - anchor_world.y * self.scale;
        self.clamp_pan();
    }

    /// Масштабирование вокруг неподвижной экранной точки.
    /// Возвращает true, если трансформация изменилась.
    pub fn zoom_at(&mut self, anchor: Point, scale_delta: f64) -> bool {
        if !scale_delta.is_finite() || scale_delta <= 0.0 || !anchor.is_finite() {
            return false;
        }
        let before = self.transform();
        let world = self.screen_to_world(anchor);
        self.scale = (self.scale * scale_delta).clamp(self.min_scale, self.max_scale);
        self.offset_x = anchor.x - world.x * self.scale;
        self.offset_y = anchor.y - world.y * self.scale;
        self.clamp_pan();
        let changed = before != self.transform();
        if changed {
            debug!("Zoom to {:.3} around ({:.1}, {:.1})", self.scale, anchor.x, anchor.y);
        }
        changed
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        if !dx.is_finite() || !dy.is_finite() {
            return false;
        }
        let before = self.transform();
        self.offset_x += dx;
        self.offset_y += dy;
        self.clamp_pan();
        before != self.transform()
    }

    fn recompute_limits(&mut self) {
        let cw = self.content.width().max(1.0);
        let ch = self.content.height().max(1.0);
        self.min_scale = (self.width / cw).min(self.height / ch);
        self.max_scale = self.min_scale * self.max_zoom_ratio;
    }

    // Не даём утащить схему целиком за пределы экрана
    fn clamp_pan(&mut self) {
        let margin_x = self.pan_margin_px.min(self.width / 2.0);
        let margin_y = self.pan_margin_px.min(self.height / 2.0);
        let (lo_x, hi_x) = (
            margin_x - self.content.max_x * self.scale,
            self.width - margin_x - self.content.min_x * self.scale,
        );
        let (lo_y, hi_y) = (
            margin_y - self.content.max_y * self.scale,
            self.height - margin_y - self.content.min_y * self.scale,
        );
        self.offset_x = clamp_range(self.offset_x, lo_x, hi_x);
        self.offset_y = clamp_range(self.offset_y, lo_y, hi_y);
    }
}

fn clamp_range(value: f64, lo: f64, hi: f64) -> f64 {
    if lo > hi {
        // Схема уже меньше отступа: центрируем между границами
        (lo + hi) / 2.0
    } else {
        value.clamp(lo, hi)
    }
}

/// Derives pinch-zoom deltas from two active pointers.
#[derive(Debug, Clone, Default)]
pub struct PinchTracker {
    previous: Option<(Point, Point)>,
}

/// One pinch step: scale around `anchor`, then translate by `pan`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchStep {
    pub anchor: Point,
    pub scale_delta: f64,
    pub pan: (f64, f64),
}

impl PinchTracker {
    pub fn is_active(&self) -> bool {
        self.previous.is_some()
    }

    pub fn begin(&mut self, a: Point, b: Point) {
        self.previous = Some((a, b));
    }

    pub fn end(&mut self) {
        self.previous = None;
    }

    /// Новая пара позиций; возвращает шаг относительно предыдущей пары.
    pub fn update(&mut self, a: Point, b: Point) -> Option<PinchStep> {
        let (pa, pb) = self.previous.replace((a, b))?;
        let prev_dist = pa.distance(pb);
        let dist = a.distance(b);
        if prev_dist < f64::EPSILON || dist < f64::EPSILON {
            return None;
        }
        let prev_mid = pa.midpoint(pb);
        let mid = a.midpoint(b);
        Some(PinchStep {
            anchor: mid,
            scale_delta: dist / prev_dist,
            pan: (mid.x - prev_mid.x, mid.y - prev_mid.y),
        })
    }
}

impl Viewport {
    pub fn apply_pinch(&mut self, step: PinchStep) -> bool {
        let zoomed = self.zoom_at(step.anchor, step.scale_delta);
        let panned = self.pan_by(step.pan.0, step.pan.1);
        zoomed || panned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn viewport() -> Viewport {
        let config = Config::default();
        Viewport::new(Rect::new(0.0, 0.0, 1000.0, 500.0), 500.0, 500.0, &config.interaction)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn fit_scale_is_minimum() {
        let vp = viewport();
        assert!(close(vp.min_scale(), 0.5));
        assert!(close(vp.max_scale(), 4.0));
        assert!(close(vp.scale(), 0.5));
    }

    #[test]
    fn conversions_are_inverse() {
        let mut vp = viewport();
        vp.zoom_at(Point::new(120.0, 300.0), 3.0);
        let world = Point::new(321.5, 77.25);
        let back = vp.screen_to_world(vp.world_to_screen(world));
        assert!(close(back.x, world.x) && close(back.y, world.y));
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut vp = viewport();
        let anchor = Point::new(250.0, 250.0);
        let before = vp.screen_to_world(anchor);
        assert!(vp.zoom_at(anchor, 2.0));
        let after = vp.screen_to_world(anchor);
        assert!(close(before.x, after.x) && close(before.y, after.y));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = viewport();
        vp.zoom_at(Point::new(0.0, 0.0), 1000.0);
        assert!(close(vp.scale(), vp.max_scale()));
        vp.zoom_at(Point::new(0.0, 0.0), 1e-6);
        assert!(close(vp.scale(), vp.min_scale()));
        assert!(!vp.zoom_at(Point::new(0.0, 0.0), -1.0));
    }

    #[test]
    fn pan_cannot_lose_the_layout() {
        let mut vp = viewport();
        vp.pan_by(1e6, -1e6);
        let on_screen = vp.content_on_screen();
        let screen = Rect::new(0.0, 0.0, 500.0, 500.0);
        assert!(on_screen.intersects(&screen));
        assert!(on_screen.max_y >= 48.0 - 1e-9);
    }

    #[test]
    fn pinch_derives_ratio_and_midpoint() {
        let mut pinch = PinchTracker::default();
        pinch.begin(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let step = pinch.update(Point::new(0.0, 0.0), Point::new(200.0, 0.0)).unwrap();
        assert!(close(step.scale_delta, 2.0));
        assert_eq!(step.anchor, Point::new(100.0, 0.0));
        assert_eq!(step.pan, (50.0, 0.0));
        pinch.end();
        assert!(pinch.update(Point::new(0.0, 0.0), Point::new(1.0, 0.0)).is_none());
    }
}
