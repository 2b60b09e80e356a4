use proptest::prelude::*;
use std::time::{Duration, Instant};

use seat_map::config::Config;
use seat_map::geometry::{Point, Rect};
use seat_map::hit_test::{HitContext, HitTester, InputKind};
use seat_map::layout::SeatMap;
use seat_map::models::{
    Event, FeedStatus, LockResponse, RowRecord, SeatMapSnapshot, SeatRecord, SeatStatus, SeatType,
    SectionRecord, StatusUpdate, Ticket,
};
use seat_map::selection::SelectionEngine;
use seat_map::sync::{LockCommand, SeatStatusSynchronizer};
use seat_map::viewport::Viewport;

const ME: i64 = 7;
const SEATS: i64 = 12;

fn hall() -> SeatMapSnapshot {
    let seats = (1..=SEATS)
        .map(|id| SeatRecord {
            id,
            number: id.to_string(),
            x: Some(id as f64 * 20.0),
            y: Some(0.0),
            radius: Some(6.0),
            seat_type: SeatType::Normal,
            // Три категории с разными ценами
            ticket: Some(Ticket {
                id: id % 3,
                name: format!("Cat {}", id % 3),
                price: 100 * (id % 3 + 1),
                booking_limit: None,
            }),
            icon: None,
            status: FeedStatus::Available,
            owner_id: None,
            version: 0,
        })
        .collect();
    SeatMapSnapshot {
        event: Event { id: 5, title: "Gala".into(), venue: None, datetime_start: None },
        stage: None,
        sections: vec![SectionRecord {
            id: 1,
            name: "Main".into(),
            x: Some(0.0),
            y: Some(0.0),
            width: Some(300.0),
            rows: vec![RowRecord { id: 1, title: "A".into(), seats }],
        }],
        feed_cursor: 0,
    }
}

#[derive(Debug, Clone)]
enum Op {
    Toggle(i64),
    Grant(usize),
    Reject(usize),
    Push { seat_id: i64, held: bool, owner: i64, version: u64 },
    Tick(u64),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1..=SEATS).prop_map(Op::Toggle),
        2 => (0usize..8).prop_map(Op::Grant),
        1 => (0usize..8).prop_map(Op::Reject),
        2 => (1..=SEATS, any::<bool>(), prop_oneof![Just(ME), Just(99)], 0u64..20)
            .prop_map(|(seat_id, held, owner, version)| Op::Push { seat_id, held, owner, version }),
        1 => (1u64..400).prop_map(Op::Tick),
        1 => Just(Op::Clear),
    ]
}

fn run(ops: Vec<Op>) -> SeatStatusSynchronizer {
    let start = Instant::now();
    let mut now = start;
    let build = SeatMap::build(hall(), 1);
    let mut sync = SeatStatusSynchronizer::new(
        ME,
        build.initial,
        SelectionEngine::new(4, 8),
        Duration::from_secs(600),
        Duration::from_secs(60),
        now,
    );
    let mut pending: Vec<(u64, Vec<i64>)> = Vec::new();

    for op in ops {
        let outcome = match op {
            Op::Toggle(seat_id) => match sync.toggle(&build.map, seat_id, now) {
                Ok(outcome) => outcome,
                Err(_) => continue,
            },
            Op::Grant(_) | Op::Reject(_) if pending.is_empty() => continue,
            Op::Grant(i) => {
                let (request_id, seats) = pending.remove(i % pending.len());
                let response = LockResponse { granted: seats, ..Default::default() };
                sync.apply_lock_response(request_id, &response, now)
            }
            Op::Reject(i) => {
                let (request_id, seats) = pending.remove(i % pending.len());
                let response = LockResponse { rejected: seats, ..Default::default() };
                sync.apply_lock_response(request_id, &response, now)
            }
            Op::Push { seat_id, held, owner, version } => {
                let update = StatusUpdate {
                    seat_id,
                    status: if held { FeedStatus::Held } else { FeedStatus::Available },
                    owner_id: held.then_some(owner),
                    version,
                };
                sync.apply_updates(&[update], now)
            }
            Op::Tick(secs) => {
                now += Duration::from_secs(secs);
                sync.expire_holds(now)
            }
            Op::Clear => sync.clear(),
        };
        for command in outcome.commands {
            if let LockCommand::Acquire { request_id, seat_ids } = command {
                pending.push((request_id, seat_ids));
            }
        }
    }
    sync
}

proptest! {
    #[test]
    fn selection_matches_local_statuses(ops in prop::collection::vec(op(), 0..60)) {
        let sync = run(ops);
        prop_assert!(sync.is_consistent());
        for (seat_id, status) in sync.statuses() {
            prop_assert_eq!(status == SeatStatus::SelectedLocal, sync.selection().contains(seat_id));
        }
    }

    #[test]
    fn total_is_sum_of_selected_prices(ops in prop::collection::vec(op(), 0..60)) {
        let sync = run(ops);
        let selection = sync.selection();
        prop_assert_eq!(selection.total_amount(), selection.recompute_total());
        let by_category: i64 = selection.aggregates().map(|a| a.subtotal()).sum();
        prop_assert_eq!(selection.total_amount(), by_category);
        prop_assert!(selection.len() <= 8);
    }

    #[test]
    fn older_versions_never_override(versions in prop::collection::vec(1u64..50, 1..20)) {
        let build = SeatMap::build(hall(), 1);
        let now = Instant::now();
        let mut sync = SeatStatusSynchronizer::new(
            ME, build.initial, SelectionEngine::new(4, 8),
            Duration::from_secs(600), Duration::from_secs(60), now,
        );
        let mut newest: Option<(u64, bool)> = None;
        for (i, version) in versions.into_iter().enumerate() {
            let held = i % 2 == 0;
            let update = StatusUpdate {
                seat_id: 1,
                status: if held { FeedStatus::Held } else { FeedStatus::Available },
                owner_id: held.then_some(99),
                version,
            };
            sync.apply_updates(&[update], now);
            if newest.map_or(true, |(v, _)| version > v) {
                newest = Some((version, held));
            }
        }
        let (version, held) = newest.unwrap();
        prop_assert_eq!(sync.version(1), Some(version));
        let expected = if held { SeatStatus::HeldRemote(Some(99)) } else { SeatStatus::Available };
        prop_assert_eq!(sync.status(1), Some(expected));
    }

    #[test]
    fn zoom_stays_within_limits(steps in prop::collection::vec((0.0f64..800.0, 0.0f64..600.0, 0.1f64..10.0), 1..30)) {
        let config = Config::default();
        let mut viewport = Viewport::new(Rect::new(0.0, 0.0, 1200.0, 400.0), 800.0, 600.0, &config.interaction);
        for (x, y, delta) in steps {
            viewport.zoom_at(Point::new(x, y), delta);
            prop_assert!(viewport.scale() >= viewport.min_scale() - 1e-9);
            prop_assert!(viewport.scale() <= viewport.max_scale() + 1e-9);
        }
    }

    #[test]
    fn pan_keeps_layout_on_screen(moves in prop::collection::vec((-5000.0f64..5000.0, -5000.0f64..5000.0), 1..30)) {
        let config = Config::default();
        let mut viewport = Viewport::new(Rect::new(0.0, 0.0, 1200.0, 400.0), 800.0, 600.0, &config.interaction);
        viewport.zoom_at(Point::new(400.0, 300.0), 4.0);
        let (width, height) = viewport.size();
        let margin = config.interaction.pan_margin_px;
        for (dx, dy) in moves {
            viewport.pan_by(dx, dy);
            let on_screen = viewport.content_on_screen();
            prop_assert!(on_screen.max_x >= margin - 1e-6);
            prop_assert!(on_screen.min_x <= width - margin + 1e-6);
            prop_assert!(on_screen.max_y >= margin - 1e-6);
            prop_assert!(on_screen.min_y <= height - margin + 1e-6);
        }
    }

    #[test]
    fn touch_target_is_never_below_minimum(radius in 0.5f64..30.0, scale in 0.05f64..20.0) {
        let tester = HitTester::new(44.0);
        let side_px = tester.hit_side(radius, scale, InputKind::Touch) * scale;
        prop_assert!(side_px >= 44.0 - 1e-9);
    }

    #[test]
    fn touch_hits_seat_within_minimum_target(offset_px in -21.0f64..21.0, scale in 0.05f64..1.0) {
        let build = SeatMap::build(hall(), 1);
        let sync = SeatStatusSynchronizer::new(
            ME, build.initial, SelectionEngine::new(4, 8),
            Duration::from_secs(600), Duration::from_secs(60), Instant::now(),
        );
        let tester = HitTester::new(44.0);
        let ctx = HitContext { current_user: ME, scale, input: InputKind::Touch };
        // Место 1 стоит в (20, 0); соседи в 20 мировых единицах
        let pointer = Point::new(20.0, offset_px / scale);
        let hit = tester.hit_test(&build.map, |id| sync.status(id), pointer, &ctx);
        prop_assert!(hit.is_some());
    }
}
