//! HitTester: решает, попал ли указатель в место.
//!
//! Базовая зона - квадрат со стороной `2 * radius`. На сенсорном вводе сторона
//! расширяется до `MIN_TAP_PX / scale`, чтобы в пикселях экрана зона не была
//! меньше пальца при любом масштабе. Неподходящие места проверку не проходят
//! вовсе.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::layout::SeatMap;
use crate::models::{Seat, SeatId, SeatStatus, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    #[default]
    Mouse,
    Touch,
}

/// Контекст вызова, передаётся явно по цепочке рендер/хит-тест.
#[derive(Debug, Clone, Copy)]
pub struct HitContext {
    pub current_user: UserId,
    pub scale: f64,
    pub input: InputKind,
}

#[derive(Debug, Clone)]
pub struct HitTester {
    min_tap_px: f64,
}

/// Seat may receive hit tests: it has a ticket, is not a blank placeholder,
/// and is either available or held by the current user.
pub fn is_eligible(seat: &Seat, status: Option<SeatStatus>, current_user: UserId) -> bool {
    if seat.is_blank() || !seat.has_ticket() {
        return false;
    }
    match status {
        Some(SeatStatus::Available) => true,
        Some(s) => s.is_held_by(current_user),
        None => false,
    }
}

impl HitTester {
    pub fn new(min_tap_px: f64) -> Self {
        Self { min_tap_px: min_tap_px.max(0.0) }
    }

    /// Сторона зоны попадания в мировых координатах.
    pub fn hit_side(&self, radius: f64, scale: f64, input: InputKind) -> f64 {
        let visual = 2.0 * radius;
        match input {
            InputKind::Mouse => visual,
            InputKind::Touch if scale > 0.0 => visual.max(self.min_tap_px / scale),
            InputKind::Touch => visual,
        }
    }

    pub fn is_hit(&self, center: Point, radius: f64, pointer_world: Point, ctx: &HitContext) -> bool {
        Rect::centered(center, self.hit_side(radius, ctx.scale, ctx.input)).contains(pointer_world)
    }

    /// Находит место под указателем. При перекрытии расширенных зон
    /// побеждает место с ближайшим центром.
    pub fn hit_test<F>(&self, map: &SeatMap, status_of: F, pointer_world: Point, ctx: &HitContext) -> Option<SeatId>
    where
        F: Fn(SeatId) -> Option<SeatStatus>,
    {
        let mut best: Option<(f64, SeatId)> = None;

        for (si, section) in map.sections().iter().enumerate() {
            // Грубое отсечение по границам секции с запасом на расширенную зону
            if let Some(bounds) = map.section_bounds(si) {
                let slack = self.hit_side(0.0, ctx.scale, ctx.input) / 2.0;
                if !bounds.expand(slack).contains(pointer_world) {
                    continue;
                }
            }
            let origin = section.origin();
            for row in &section.rows {
                for seat in &row.seats {
                    if !is_eligible(seat, status_of(seat.id), ctx.current_user) {
                        continue;
                    }
                    let center = seat.world_center(origin);
                    if !self.is_hit(center, seat.radius, pointer_world, ctx) {
                        continue;
                    }
                    let d = center.distance(pointer_world);
                    if best.map_or(true, |(bd, _)| d < bd) {
                        best = Some((d, seat.id));
                    }
                }
            }
        }

        best.map(|(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::{seat_record, snapshot, vip};

    const ME: UserId = 7;

    fn ctx(scale: f64, input: InputKind) -> HitContext {
        HitContext { current_user: ME, scale, input }
    }

    #[test]
    fn touch_region_never_below_min_tap_in_pixels() {
        let tester = HitTester::new(44.0);
        for scale in [0.05, 0.3, 1.0, 2.5, 10.0] {
            let side_px = tester.hit_side(3.0, scale, InputKind::Touch) * scale;
            assert!(side_px >= 44.0 - 1e-9, "scale {} gave {}px", scale, side_px);
        }
        assert_eq!(tester.hit_side(3.0, 0.05, InputKind::Mouse), 6.0);
    }

    #[test]
    fn mouse_hits_only_visual_square() {
        let build = SeatMap::build(snapshot(vec![seat_record(1, 0.0, Some(vip()))]), 1);
        let tester = HitTester::new(44.0);
        let available = |_| Some(SeatStatus::Available);
        // центр места (100, 50), радиус 5
        assert_eq!(tester.hit_test(&build.map, available, Point::new(104.0, 54.0), &ctx(1.0, InputKind::Mouse)), Some(1));
        assert_eq!(tester.hit_test(&build.map, available, Point::new(106.0, 50.0), &ctx(1.0, InputKind::Mouse)), None);
        assert_eq!(tester.hit_test(&build.map, available, Point::new(115.0, 50.0), &ctx(1.0, InputKind::Touch)), Some(1));
    }

    #[test]
    fn ineligible_seats_are_never_hit() {
        let build = SeatMap::build(
            snapshot(vec![seat_record(1, 0.0, None), seat_record(2, 30.0, Some(vip()))]),
            1,
        );
        let tester = HitTester::new(44.0);
        let c = ctx(1.0, InputKind::Mouse);
        // нет билета
        assert_eq!(tester.hit_test(&build.map, |_| Some(SeatStatus::Available), Point::new(100.0, 50.0), &c), None);
        let at_two = Point::new(130.0, 50.0);
        assert_eq!(tester.hit_test(&build.map, |_| Some(SeatStatus::Booked), at_two, &c), None);
        assert_eq!(tester.hit_test(&build.map, |_| Some(SeatStatus::HeldRemote(Some(8))), at_two, &c), None);
        assert_eq!(tester.hit_test(&build.map, |_| Some(SeatStatus::HeldRemote(Some(ME))), at_two, &c), Some(2));
        assert_eq!(tester.hit_test(&build.map, |_| Some(SeatStatus::SelectedLocal), at_two, &c), Some(2));
    }

    #[test]
    fn overlapping_touch_regions_prefer_nearest() {
        let build = SeatMap::build(
            snapshot(vec![seat_record(1, 0.0, Some(vip())), seat_record(2, 12.0, Some(vip()))]),
            1,
        );
        let tester = HitTester::new(44.0);
        let c = ctx(0.5, InputKind::Touch);
        let hit = tester.hit_test(&build.map, |_| Some(SeatStatus::Available), Point::new(109.0, 50.0), &c);
        assert_eq!(hit, Some(2));
    }
}
