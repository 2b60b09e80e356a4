//! Распознавание жестов: тап, перетаскивание, щипок, колесо.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::geometry::Point;
use crate::hit_test::InputKind;
use crate::viewport::{PinchTracker, Viewport};

pub type PointerId = u32;

/// Сырые события указателя от фронтенда, координаты экранные.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    Down {
        pointer_id: PointerId,
        x: f64,
        y: f64,
        #[serde(default)]
        input: InputKind,
    },
    Move {
        pointer_id: PointerId,
        x: f64,
        y: f64,
    },
    Up {
        pointer_id: PointerId,
        x: f64,
        y: f64,
    },
    Cancel {
        pointer_id: PointerId,
    },
    Wheel {
        x: f64,
        y: f64,
        delta_y: f64,
    },
    Resize {
        width: f64,
        height: f64,
    },
}

/// Что получилось из события.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Короткое касание без смещения: кандидат на выбор места.
    Tap { at: Point, input: InputKind },
    /// Изменилась трансформация вида.
    ViewChanged,
    None,
}

#[derive(Debug, Clone, Copy)]
struct ActivePointer {
    start: Point,
    last: Point,
    input: InputKind,
    // сдвинулся дальше допуска или участвовал в щипке - уже не тап
    moved: bool,
}

#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    pointers: BTreeMap<PointerId, ActivePointer>,
    pinch: PinchTracker,
    tap_slop_px: f64,
    wheel_zoom_step: f64,
}

impl GestureRecognizer {
    pub fn new(tap_slop_px: f64, wheel_zoom_step: f64) -> Self {
        Self {
            pointers: BTreeMap::new(),
            pinch: PinchTracker::default(),
            tap_slop_px: tap_slop_px.max(0.0),
            wheel_zoom_step: if wheel_zoom_step > 1.0 { wheel_zoom_step } else { 1.1 },
        }
    }

    pub fn active_pointers(&self) -> usize {
        self.pointers.len()
    }

    fn pair(&self) -> Option<(Point, Point)> {
        let mut it = self.pointers.values();
        Some((it.next()?.last, it.next()?.last))
    }

    pub fn handle(&mut self, event: PointerEvent, viewport: &mut Viewport) -> Gesture {
        match event {
            PointerEvent::Down { pointer_id, x, y, input } => {
                let at = Point::new(x, y);
                self.pointers.insert(pointer_id, ActivePointer { start: at, last: at, input, moved: false });
                if self.pointers.len() >= 2 {
                    for p in self.pointers.values_mut() {
                        p.moved = true;
                    }
                    if let Some((a, b)) = self.pair() {
                        self.pinch.begin(a, b);
                    }
                }
                Gesture::None
            }
            PointerEvent::Move { pointer_id, x, y } => {
                let at = Point::new(x, y);
                let Some(pointer) = self.pointers.get_mut(&pointer_id) else {
                    return Gesture::None;
                };
                let previous = pointer.last;
                pointer.last = at;
                if pointer.start.distance(at) > self.tap_slop_px {
                    pointer.moved = true;
                }
                let moved = pointer.moved;

                if self.pinch.is_active() {
                    let changed = match self.pair() {
                        Some((a, b)) => self.pinch.update(a, b).is_some_and(|step| viewport.apply_pinch(step)),
                        None => false,
                    };
                    return if changed { Gesture::ViewChanged } else { Gesture::None };
                }
                if moved && viewport.pan_by(at.x - previous.x, at.y - previous.y) {
                    Gesture::ViewChanged
                } else {
                    Gesture::None
                }
            }
            PointerEvent::Up { pointer_id, x, y } => {
                let Some(pointer) = self.pointers.remove(&pointer_id) else {
                    return Gesture::None;
                };
                if self.pinch.is_active() {
                    if self.pointers.len() < 2 {
                        self.pinch.end();
                    }
                    return Gesture::None;
                }
                let at = Point::new(x, y);
                if !pointer.moved && pointer.start.distance(at) <= self.tap_slop_px {
                    Gesture::Tap { at, input: pointer.input }
                } else {
                    Gesture::None
                }
            }
            PointerEvent::Cancel { pointer_id } => {
                self.pointers.remove(&pointer_id);
                if self.pointers.len() < 2 {
                    self.pinch.end();
                }
                Gesture::None
            }
            PointerEvent::Wheel { x, y, delta_y } => {
                if delta_y == 0.0 || !delta_y.is_finite() {
                    return Gesture::None;
                }
                // Колесо вверх (отрицательная дельта) приближает
                let factor = if delta_y < 0.0 { self.wheel_zoom_step } else { 1.0 / self.wheel_zoom_step };
                if viewport.zoom_at(Point::new(x, y), factor) {
                    Gesture::ViewChanged
                } else {
                    Gesture::None
                }
            }
            PointerEvent::Resize { width, height } => {
                viewport.resize(width, height);
                Gesture::ViewChanged
            }
        }
    }
}
