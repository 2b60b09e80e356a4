//! RenderTree: Stage -> Section -> Row -> Seat с мемоизацией поддеревьев.
//!
//! Ряд перерисовывается, только если сменилась геометрия (ревизия схемы),
//! масштаб или статус/выбор хотя бы одного его места. Остальные ряды берутся
//! из кеша как есть: кадр держит ссылки на их списки команд, а не копии.

pub mod frame;
pub mod visual;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::geometry::Point;
use crate::icons::{IconCache, IconKey};
use crate::layout::SeatMap;
use crate::models::{Row, Seat, SeatId, Section, UserId};
use crate::sync::{ChangeSet, SeatStatusSynchronizer};
use crate::viewport::Transform;

pub use frame::{DrawCommand, Frame, SeatGlyph};
pub use visual::{SeatFill, SeatMark, SeatVisual};

/// Толщина обводки места в экранных пикселях.
const STROKE_PX: f64 = 1.5;
const LABEL_GAP: f64 = 6.0;

/// Context passed explicitly down the render chain.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub current_user: UserId,
    pub transform: Transform,
}

/// Сколько работы сделал последний проход.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub sections_rendered: usize,
    pub rows_rendered: usize,
    pub rows_reused: usize,
    pub seats_rendered: usize,
}

#[derive(Debug, Clone)]
struct RowCache {
    commands: Arc<[DrawCommand]>,
    missing: Vec<IconKey>,
}

#[derive(Debug, Clone)]
struct SectionCache {
    header: Arc<[DrawCommand]>,
    rows: Vec<RowCache>,
}

#[derive(Debug, Default)]
pub struct RenderTree {
    revision: Option<u64>,
    scale: Option<f64>,
    stage: Option<Arc<[DrawCommand]>>,
    sections: Vec<SectionCache>,
    dirty: BTreeSet<SeatId>,
    // места, ожидающие растеризации иконки
    waiting: HashMap<IconKey, BTreeSet<SeatId>>,
    last_stats: RenderStats,
}

impl RenderTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Копит изменённые места до следующего прохода.
    pub fn invalidate(&mut self, changed: &ChangeSet) {
        self.dirty.extend(changed.iter().copied());
    }

    /// Полная перерисовка на следующем проходе.
    pub fn invalidate_all(&mut self) {
        self.revision = None;
    }

    /// Иконка готова: места, которые её ждали, помечаются грязными.
    pub fn icon_resolved(&mut self, key: &IconKey) -> ChangeSet {
        let seats = self.waiting.remove(key).unwrap_or_default();
        self.dirty.extend(seats.iter().copied());
        seats
    }

    pub fn last_stats(&self) -> RenderStats {
        self.last_stats
    }

    pub fn frame(
        &mut self,
        map: &SeatMap,
        sync: &SeatStatusSynchronizer,
        icons: &IconCache,
        ctx: &RenderContext,
    ) -> Frame {
        let scale = ctx.transform.scale;
        let full = self.revision != Some(map.revision())
            || self.scale != Some(scale)
            || self.sections.len() != map.sections().len();
        let mut stats = RenderStats::default();

        if full {
            debug!("Full render at scale {:.3} (revision {})", scale, map.revision());
            self.waiting.clear();
            self.stage = render_stage(map);
            let mut sections = Vec::with_capacity(map.sections().len());
            for section in map.sections() {
                stats.sections_rendered += 1;
                let mut rows = Vec::with_capacity(section.rows.len());
                for row in &section.rows {
                    rows.push(self.render_row(section, row, sync, icons, ctx, &mut stats));
                }
                sections.push(SectionCache { header: render_section_header(section), rows });
            }
            self.sections = sections;
            self.revision = Some(map.revision());
            self.scale = Some(scale);
        } else {
            let mut touched: BTreeSet<(usize, usize)> = BTreeSet::new();
            for seat_id in &self.dirty {
                if let Some(loc) = map.locate(*seat_id) {
                    touched.insert((loc.section, loc.row));
                }
            }
            let mut sections_touched = BTreeSet::new();
            for (si, ri) in touched {
                let Some(section) = map.sections().get(si) else { continue };
                let Some(row) = section.rows.get(ri) else { continue };
                let rendered = self.render_row(section, row, sync, icons, ctx, &mut stats);
                if let Some(slot) = self.sections.get_mut(si).and_then(|s| s.rows.get_mut(ri)) {
                    *slot = rendered;
                }
                sections_touched.insert(si);
            }
            stats.sections_rendered = sections_touched.len();
            let total_rows: usize = self.sections.iter().map(|s| s.rows.len()).sum();
            stats.rows_reused = total_rows - stats.rows_rendered;
        }
        self.dirty.clear();
        self.last_stats = stats;

        self.assemble(ctx)
    }

    /// Сборка кадра: O(рядов) клонов `Arc`, команды не копируются.
    fn assemble(&self, ctx: &RenderContext) -> Frame {
        let rows: usize = self.sections.iter().map(|s| s.rows.len() + 1).sum();
        let mut layers = Vec::with_capacity(rows + 1);
        layers.extend(self.stage.clone());
        let mut missing: Vec<IconKey> = Vec::new();
        for section in &self.sections {
            layers.push(Arc::clone(&section.header));
            for row in &section.rows {
                layers.push(Arc::clone(&row.commands));
                for key in &row.missing {
                    if !missing.contains(key) {
                        missing.push(key.clone());
                    }
                }
            }
        }
        Frame { transform: ctx.transform, layers, missing_icons: missing }
    }

    fn render_row(
        &mut self,
        section: &Section,
        row: &Row,
        sync: &SeatStatusSynchronizer,
        icons: &IconCache,
        ctx: &RenderContext,
        stats: &mut RenderStats,
    ) -> RowCache {
        stats.rows_rendered += 1;
        let origin = section.origin();
        let mut commands = Vec::with_capacity(row.seats.len() + 1);
        let mut missing = Vec::new();

        // Подпись ряда слева от первого места
        if let Some(first) = row.seats.first() {
            let at = first.world_center(origin).offset(-(first.radius + LABEL_GAP), 0.0);
            commands.push(DrawCommand::RowLabel { row_id: row.id, text: row.title.clone(), at });
        }

        for seat in &row.seats {
            // Пустые места занимают место в ряду, но не рисуются
            if seat.is_blank() {
                continue;
            }
            stats.seats_rendered += 1;
            let command = self.render_seat(seat, section, sync, icons, ctx, &mut missing);
            commands.push(command);
        }
        RowCache { commands: commands.into(), missing }
    }

    fn render_seat(
        &mut self,
        seat: &Seat,
        section: &Section,
        sync: &SeatStatusSynchronizer,
        icons: &IconCache,
        ctx: &RenderContext,
        missing: &mut Vec<IconKey>,
    ) -> DrawCommand {
        let scale = ctx.transform.scale;
        let status = sync.status(seat.id);
        let is_selected = sync.selection().contains(seat.id);
        let has_icon = seat.icon.is_some();
        let visual = SeatVisual::derive(status, is_selected, has_icon, seat.has_ticket(), ctx.current_user);

        let glyph = match &seat.icon {
            Some(name) => {
                let px = (seat.radius * 2.0 * scale).ceil().max(1.0) as u32;
                let key = IconKey::new(name.clone(), px, visual.color);
                match icons.peek(&key) {
                    Some(Some(_)) => SeatGlyph::Icon { key },
                    // Растеризация не удалась: номер текстом
                    Some(None) => SeatGlyph::Text { text: seat.number.clone() },
                    None => {
                        self.waiting.entry(key.clone()).or_default().insert(seat.id);
                        if !missing.contains(&key) {
                            missing.push(key);
                        }
                        SeatGlyph::Text { text: seat.number.clone() }
                    }
                }
            }
            None => SeatGlyph::Text { text: seat.number.clone() },
        };

        DrawCommand::Seat {
            seat_id: seat.id,
            center: seat.world_center(section.origin()),
            radius: seat.radius,
            stroke_width: if scale > 0.0 { STROKE_PX / scale } else { STROKE_PX },
            visual,
            glyph,
        }
    }
}

fn render_stage(map: &SeatMap) -> Option<Arc<[DrawCommand]>> {
    map.stage().map(|stage| {
        Arc::from([DrawCommand::Stage {
            bounds: stage.bounds(),
            shape: stage.shape,
            curve_factor: stage.curve_factor,
            label: stage.label.clone(),
        }])
    })
}

fn render_section_header(section: &Section) -> Arc<[DrawCommand]> {
    let bounds = section.bounds();
    Arc::from([DrawCommand::SectionLabel {
        section_id: section.id,
        text: section.name.clone(),
        at: Point::new(bounds.center().x, bounds.min_y - LABEL_GAP * 2.0),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::{seat_record, snapshot, vip};
    use crate::models::{RowRecord, SeatMapSnapshot};
    use crate::selection::SelectionEngine;
    use std::time::{Duration, Instant};

    fn two_rows() -> SeatMapSnapshot {
        let mut snap = snapshot(vec![seat_record(1, 0.0, Some(vip())), seat_record(2, 20.0, Some(vip()))]);
        let mut second = seat_record(3, 0.0, Some(vip()));
        second.y = Some(30.0);
        snap.sections[0].rows.push(RowRecord { id: 101, title: "B".into(), seats: vec![second] });
        snap
    }

    fn setup() -> (SeatMap, SeatStatusSynchronizer, Instant) {
        let build = SeatMap::build(two_rows(), 1);
        let now = Instant::now();
        let sync = SeatStatusSynchronizer::new(
            7,
            build.initial,
            SelectionEngine::new(10, 20),
            Duration::from_secs(600),
            Duration::from_secs(60),
            now,
        );
        (build.map, sync, now)
    }

    fn ctx(scale: f64) -> RenderContext {
        RenderContext { current_user: 7, transform: Transform { scale, offset_x: 0.0, offset_y: 0.0 } }
    }

    #[test]
    fn only_affected_row_is_rerendered() {
        let (map, mut sync, now) = setup();
        let icons = IconCache::new();
        let mut tree = RenderTree::new();

        tree.frame(&map, &sync, &icons, &ctx(1.0));
        assert_eq!(tree.last_stats().rows_rendered, 2);

        let outcome = sync.select(&map, 3, now).unwrap();
        tree.invalidate(&outcome.changed);
        let frame = tree.frame(&map, &sync, &icons, &ctx(1.0));
        let stats = tree.last_stats();
        assert_eq!(stats.rows_rendered, 1);
        assert_eq!(stats.rows_reused, 1);
        assert_eq!(stats.seats_rendered, 1);

        match frame.seat(3) {
            Some(DrawCommand::Seat { visual, .. }) => assert_eq!(visual.mark, SeatMark::Glow),
            other => panic!("seat 3 missing: {:?}", other),
        }
        match frame.seat(1) {
            Some(DrawCommand::Seat { visual, .. }) => assert_eq!(visual.fill, SeatFill::Outline),
            other => panic!("seat 1 missing: {:?}", other),
        }
    }

    #[test]
    fn unchanged_rows_are_shared_between_frames() {
        let (map, mut sync, now) = setup();
        let icons = IconCache::new();
        let mut tree = RenderTree::new();
        let before = tree.frame(&map, &sync, &icons, &ctx(1.0));

        let outcome = sync.select(&map, 3, now).unwrap();
        tree.invalidate(&outcome.changed);
        let after = tree.frame(&map, &sync, &icons, &ctx(1.0));

        // заголовок секции, ряд A, ряд B
        assert_eq!(after.layers.len(), 3);
        assert!(Arc::ptr_eq(&before.layers[0], &after.layers[0]));
        assert!(Arc::ptr_eq(&before.layers[1], &after.layers[1]));
        assert!(!Arc::ptr_eq(&before.layers[2], &after.layers[2]));
        assert_eq!(after.commands().count(), before.commands().count());
    }

    #[test]
    fn frame_serializes_as_flat_command_list() {
        let (map, sync, _) = setup();
        let icons = IconCache::new();
        let mut tree = RenderTree::new();
        let frame = tree.frame(&map, &sync, &icons, &ctx(1.0));
        let json = serde_json::to_value(&frame).unwrap();
        let commands = json["commands"].as_array().unwrap();
        // подпись секции, две подписи рядов, три места
        assert_eq!(commands.len(), 6);
        assert_eq!(commands[0]["kind"], "section_label");
        assert!(json.get("layers").is_none());
    }

    #[test]
    fn nothing_dirty_means_nothing_rendered() {
        let (map, sync, _) = setup();
        let icons = IconCache::new();
        let mut tree = RenderTree::new();
        let first = tree.frame(&map, &sync, &icons, &ctx(1.0));
        let second = tree.frame(&map, &sync, &icons, &ctx(1.0));
        assert_eq!(tree.last_stats().rows_rendered, 0);
        assert_eq!(first, second);
    }

    #[test]
    fn scale_or_revision_change_forces_full_render() {
        let (map, sync, _) = setup();
        let icons = IconCache::new();
        let mut tree = RenderTree::new();
        tree.frame(&map, &sync, &icons, &ctx(1.0));
        tree.frame(&map, &sync, &icons, &ctx(2.0));
        assert_eq!(tree.last_stats().rows_rendered, 2);

        let rebuilt = SeatMap::build(two_rows(), 2).map;
        tree.frame(&rebuilt, &sync, &icons, &ctx(2.0));
        assert_eq!(tree.last_stats().rows_rendered, 2);
    }

    #[tokio::test]
    async fn missing_icon_falls_back_to_text_until_resolved() {
        let mut record = seat_record(1, 0.0, Some(vip()));
        record.icon = Some("chair".into());
        let build = SeatMap::build(snapshot(vec![record]), 1);
        let now = Instant::now();
        let sync = SeatStatusSynchronizer::new(
            7,
            build.initial,
            SelectionEngine::new(10, 20),
            Duration::from_secs(600),
            Duration::from_secs(60),
            now,
        );
        let icons = IconCache::new();
        let mut tree = RenderTree::new();

        let frame = tree.frame(&build.map, &sync, &icons, &ctx(2.0));
        assert_eq!(frame.missing_icons.len(), 1);
        assert!(matches!(frame.seat(1), Some(DrawCommand::Seat { glyph: SeatGlyph::Text { .. }, .. })));

        let key = frame.missing_icons[0].clone();
        assert!(icons.get(key.clone()).await.is_some());
        assert_eq!(tree.icon_resolved(&key).len(), 1);

        let frame = tree.frame(&build.map, &sync, &icons, &ctx(2.0));
        assert!(frame.missing_icons.is_empty());
        assert!(matches!(frame.seat(1), Some(DrawCommand::Seat { glyph: SeatGlyph::Icon { .. }, .. })));
    }
}
