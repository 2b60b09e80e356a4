//! SeatMapSession: сеанс просмотра схемы одним пользователем.
//!
//! Собирает вместе геометрию, вид, хит-тест, синхронизатор статусов, рендер и
//! кеш иконок. Сеанс синхронный: всё, что требует сети, возвращается
//! вызывающему в виде `LockCommand`, а результаты возвращаются обратно через
//! `lock_resolved` / `lock_failed`. Асинхронная обвязка живёт в `driver`.

pub mod driver;
pub mod gesture;
pub mod registry;

use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{LockError, SeatMapError, SelectionError, SnapshotError};
use crate::geometry::Point;
use crate::hit_test::{HitContext, HitTester, InputKind};
use crate::icons::{IconCache, IconKey};
use crate::layout::SeatMap;
use crate::models::{EventId, LockResponse, SeatId, SeatMapSnapshot, StatusUpdate, UserId};
use crate::render::{Frame, RenderContext, RenderTree};
use crate::selection::SelectionEngine;
use crate::summary::BookingSummary;
use crate::sync::{LockCommand, Notice, RequestId, SeatStatusSynchronizer, SyncOutcome};
use crate::viewport::Viewport;

pub use gesture::{Gesture, GestureRecognizer, PointerEvent};

pub struct SeatMapSession {
    id: Uuid,
    current_user: UserId,
    map: SeatMap,
    viewport: Viewport,
    hit_tester: HitTester,
    gestures: GestureRecognizer,
    sync: SeatStatusSynchronizer,
    render: RenderTree,
    icons: IconCache,
    notices: Vec<Notice>,
    config: Config,
}

impl SeatMapSession {
    /// Открывает сеанс по снимку схемы.
    pub fn open(
        current_user: UserId,
        snapshot: SeatMapSnapshot,
        width: f64,
        height: f64,
        config: &Config,
        icons: IconCache,
        now: Instant,
    ) -> Result<Self, SeatMapError> {
        let event_id = snapshot.event.id;
        let build = SeatMap::build(snapshot, 1);
        if build.map.seat_count() == 0 {
            return Err(SnapshotError::Empty(event_id).into());
        }

        let interaction = &config.interaction;
        let viewport = Viewport::new(build.map.bounds(), width, height, interaction);
        let sync = SeatStatusSynchronizer::new(
            current_user,
            build.initial,
            SelectionEngine::new(interaction.max_seats_per_ticket, interaction.max_seats_total),
            config.lock.hold_ttl(),
            config.lock.hold_warning(),
            now,
        );

        let id = Uuid::new_v4();
        info!(
            "Session {} opened for user {} on event {} ({} seats)",
            id,
            current_user,
            event_id,
            build.map.seat_count()
        );

        Ok(Self {
            id,
            current_user,
            hit_tester: HitTester::new(interaction.min_tap_px),
            gestures: GestureRecognizer::new(interaction.tap_slop_px, interaction.wheel_zoom_step),
            map: build.map,
            viewport,
            sync,
            render: RenderTree::new(),
            icons,
            notices: Vec::new(),
            config: config.clone(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn current_user(&self) -> UserId {
        self.current_user
    }

    pub fn event_id(&self) -> EventId {
        self.map.event().id
    }

    pub fn map(&self) -> &SeatMap {
        &self.map
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn sync(&self) -> &SeatStatusSynchronizer {
        &self.sync
    }

    pub fn icons(&self) -> &IconCache {
        &self.icons
    }

    pub fn render_tree(&self) -> &RenderTree {
        &self.render
    }

    // Единая точка: изменения -> рендер, уведомления -> очередь
    fn absorb(&mut self, outcome: SyncOutcome) -> Vec<LockCommand> {
        self.render.invalidate(&outcome.changed);
        self.notices.extend(outcome.notices);
        outcome.commands
    }

    /// Событие указателя. Тап превращается в выбор места.
    pub fn pointer(&mut self, event: PointerEvent, now: Instant) -> Vec<LockCommand> {
        match self.gestures.handle(event, &mut self.viewport) {
            Gesture::Tap { at, input } => self.tap(at, input, now),
            Gesture::ViewChanged | Gesture::None => Vec::new(),
        }
    }

    /// Тап в экранных координатах.
    pub fn tap(&mut self, screen: Point, input: InputKind, now: Instant) -> Vec<LockCommand> {
        let world = self.viewport.screen_to_world(screen);
        let ctx = HitContext { current_user: self.current_user, scale: self.viewport.scale(), input };
        let sync = &self.sync;
        let Some(seat_id) = self.hit_tester.hit_test(&self.map, |id| sync.status(id), world, &ctx) else {
            debug!("Tap at ({:.1}, {:.1}) hit no eligible seat", screen.x, screen.y);
            return Vec::new();
        };
        match self.toggle_seat(seat_id, now) {
            Ok(commands) => commands,
            Err(e) => {
                self.notices.push(Notice::SelectionRejected { reason: e.to_string() });
                Vec::new()
            }
        }
    }

    /// Выбор или снятие выбора по id места.
    pub fn toggle_seat(&mut self, seat_id: SeatId, now: Instant) -> Result<Vec<LockCommand>, SelectionError> {
        let outcome = self.sync.toggle(&self.map, seat_id, now)?;
        Ok(self.absorb(outcome))
    }

    pub fn deselect(&mut self, seat_id: SeatId) -> Vec<LockCommand> {
        let outcome = self.sync.deselect(seat_id);
        self.absorb(outcome)
    }

    pub fn lock_resolved(&mut self, request_id: RequestId, response: &LockResponse, now: Instant) -> Vec<LockCommand> {
        let outcome = self.sync.apply_lock_response(request_id, response, now);
        self.absorb(outcome)
    }

    pub fn lock_failed(&mut self, request_id: RequestId, error: &LockError, now: Instant) -> Vec<LockCommand> {
        let outcome = self.sync.apply_lock_failure(request_id, error, now);
        self.absorb(outcome)
    }

    /// Пачка изменений из ленты статусов (push или poll).
    pub fn apply_feed(&mut self, updates: &[StatusUpdate], now: Instant) -> Vec<LockCommand> {
        let outcome = self.sync.apply_updates(updates, now);
        self.absorb(outcome)
    }

    /// Таймер: истечение удержаний и предупреждения.
    pub fn tick(&mut self, now: Instant) -> Vec<LockCommand> {
        let outcome = self.sync.expire_holds(now);
        self.absorb(outcome)
    }

    pub fn clear(&mut self) -> Vec<LockCommand> {
        let outcome = self.sync.clear();
        self.absorb(outcome)
    }

    /// Полная перезагрузка снимка: новая ревизия геометрии, сброс терминальных
    /// статусов и сверка выбора.
    pub fn refresh(&mut self, snapshot: SeatMapSnapshot, now: Instant) -> Vec<LockCommand> {
        let revision = self.map.revision() + 1;
        let build = SeatMap::build(snapshot, revision);
        let (width, height) = self.viewport.size();
        self.viewport = Viewport::new(build.map.bounds(), width, height, &self.config.interaction);
        self.map = build.map;
        let outcome = self.sync.reset(build.initial, now);
        self.render.invalidate_all();
        info!("Session {} refreshed to revision {}", self.id, revision);
        self.absorb(outcome)
    }

    /// Кадр для отрисовки. Перерисовываются только затронутые ряды.
    pub fn frame(&mut self) -> Frame {
        let ctx = RenderContext { current_user: self.current_user, transform: self.viewport.transform() };
        self.render.frame(&self.map, &self.sync, &self.icons, &ctx)
    }

    /// Иконка растеризована: ждавшие её места перерисуются.
    pub fn icon_ready(&mut self, key: &IconKey) {
        self.render.icon_resolved(key);
    }

    pub fn summary(&self, now: Instant) -> BookingSummary {
        BookingSummary::project(&self.map, &self.sync, now)
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Уход со схемы: снимаем весь выбор, вызывающий отпускает блокировки.
    pub fn teardown(&mut self) -> Vec<LockCommand> {
        info!("Session {} torn down, releasing {} seats", self.id, self.sync.selection().len());
        self.clear()
    }
}
