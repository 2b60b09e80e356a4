//! Criterion benchmarks for rendering and hit-testing on a stadium-sized map.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::{Duration, Instant};

use seat_map::config::Config;
use seat_map::geometry::Point;
use seat_map::hit_test::{HitContext, HitTester, InputKind};
use seat_map::icons::IconCache;
use seat_map::layout::SeatMap;
use seat_map::models::{
    Event, FeedStatus, RowRecord, SeatMapSnapshot, SeatRecord, SeatType, SectionRecord, Ticket,
};
use seat_map::render::{RenderContext, RenderTree};
use seat_map::selection::SelectionEngine;
use seat_map::sync::SeatStatusSynchronizer;
use seat_map::viewport::Viewport;

const SECTIONS: i64 = 20;
const ROWS: i64 = 30;
const SEATS_PER_ROW: i64 = 40;
const ME: i64 = 1;

/// 24 000 мест: 20 секций по 30 рядов по 40 мест.
fn stadium() -> SeatMapSnapshot {
    let ticket = Ticket { id: 1, name: "Standard".into(), price: 250, booking_limit: None };
    let sections = (0..SECTIONS)
        .map(|s| SectionRecord {
            id: s,
            name: format!("Sector {}", s + 1),
            x: Some((s % 5) as f64 * 900.0),
            y: Some((s / 5) as f64 * 700.0),
            width: Some(820.0),
            rows: (0..ROWS)
                .map(|r| RowRecord {
                    id: s * 1000 + r,
                    title: (r + 1).to_string(),
                    seats: (0..SEATS_PER_ROW)
                        .map(|n| SeatRecord {
                            id: (s * ROWS + r) * SEATS_PER_ROW + n,
                            number: (n + 1).to_string(),
                            x: Some(10.0 + n as f64 * 20.0),
                            y: Some(10.0 + r as f64 * 20.0),
                            radius: Some(8.0),
                            seat_type: SeatType::Normal,
                            ticket: Some(ticket.clone()),
                            icon: None,
                            status: if n % 7 == 0 { FeedStatus::Booked } else { FeedStatus::Available },
                            owner_id: None,
                            version: 1,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();
    SeatMapSnapshot {
        event: Event { id: 1, title: "Final".into(), venue: None, datetime_start: None },
        stage: None,
        sections,
        feed_cursor: 0,
    }
}

fn setup() -> (SeatMap, SeatStatusSynchronizer, Viewport) {
    let config = Config::default();
    let build = SeatMap::build(stadium(), 1);
    let sync = SeatStatusSynchronizer::new(
        ME,
        build.initial,
        SelectionEngine::new(100, 100),
        Duration::from_secs(600),
        Duration::from_secs(60),
        Instant::now(),
    );
    let viewport = Viewport::new(build.map.bounds(), 1920.0, 1080.0, &config.interaction);
    (build.map, sync, viewport)
}

fn render_benchmarks(c: &mut Criterion) {
    let (map, mut sync, viewport) = setup();
    let icons = IconCache::new();
    let ctx = RenderContext { current_user: ME, transform: viewport.transform() };

    c.bench_function("full_render_24k_seats", |b| {
        b.iter(|| {
            let mut tree = RenderTree::new();
            black_box(tree.frame(&map, &sync, &icons, &ctx))
        })
    });

    // Одно изменение статуса: перерисовывается один ряд
    let mut tree = RenderTree::new();
    tree.frame(&map, &sync, &icons, &ctx);
    let seat_id: i64 = 12_345;
    c.bench_function("single_toggle_rerender", |b| {
        b.iter(|| {
            let outcome = sync.toggle(&map, seat_id, Instant::now()).unwrap_or_default();
            tree.invalidate(&outcome.changed);
            black_box(tree.frame(&map, &sync, &icons, &ctx))
        })
    });
}

fn hit_test_benchmarks(c: &mut Criterion) {
    let (map, sync, viewport) = setup();
    let tester = HitTester::new(44.0);
    let ctx = HitContext { current_user: ME, scale: viewport.scale(), input: InputKind::Touch };
    let pointer = viewport.screen_to_world(Point::new(1200.0, 700.0));

    c.bench_function("hit_test_24k_seats", |b| {
        b.iter(|| black_box(tester.hit_test(&map, |id| sync.status(id), black_box(pointer), &ctx)))
    });
}

criterion_group!(benches, render_benchmarks, hit_test_benchmarks);
criterion_main!(benches);
