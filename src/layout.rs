//! SpatialModel: неизменяемая геометрия схемы зала (сцена, секции, ряды, места).
//!
//! Строится один раз на сеанс просмотра из снимка сервиса. Каждый элемент
//! проверяется отдельно: битая запись места или секции пропускается с
//! предупреждением в лог, остальная схема строится как обычно.

use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use validator::Validate;

use crate::error::GeometryError;
use crate::geometry::{Point, Rect};
use crate::models::{
    Event, Row, RowRecord, Seat, SeatId, SeatMapSnapshot, SeatRecord, SeatStatus, Section,
    SectionRecord, Stage, StageRecord, StatusUpdate,
};

/// Положение места в иерархии плюс центр в мировых координатах.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeatLocation {
    pub section: usize,
    pub row: usize,
    pub seat: usize,
    pub center: Point,
}

/// Borrowed view of one seat together with its parents.
#[derive(Debug, Clone, Copy)]
pub struct SeatRef<'a> {
    pub section: &'a Section,
    pub row: &'a Row,
    pub seat: &'a Seat,
    pub location: SeatLocation,
}

#[derive(Debug, Clone)]
pub struct SeatMap {
    revision: u64,
    event: Event,
    stage: Option<Stage>,
    sections: Vec<Section>,
    section_bounds: Vec<Rect>,
    index: HashMap<SeatId, SeatLocation>,
    bounds: Rect,
}

/// Результат построения: схема, начальные статусы и пропущенные элементы.
#[derive(Debug)]
pub struct SeatMapBuild {
    pub map: SeatMap,
    pub initial: Vec<(SeatId, SeatStatus, u64)>,
    pub skipped: Vec<GeometryError>,
}

impl SeatMap {
    /// Строит схему из снимка. `revision` - идентичность геометрии для
    /// мемоизации рендера: новая загрузка обязана передать новое значение.
    pub fn build(snapshot: SeatMapSnapshot, revision: u64) -> SeatMapBuild {
        let mut skipped = Vec::new();
        let mut initial = Vec::new();
        let mut seen = HashSet::new();

        let stage = snapshot.stage.and_then(|record| match stage_from_record(record) {
            Ok(stage) => Some(stage),
            Err(e) => {
                warn!("Skipping stage: {}", e);
                skipped.push(e);
                None
            }
        });

        let mut sections = Vec::with_capacity(snapshot.sections.len());
        for record in snapshot.sections {
            match section_from_record(record, &mut seen, &mut initial, &mut skipped) {
                Ok(Some(section)) => sections.push(section),
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping section: {}", e);
                    skipped.push(e);
                }
            }
        }

        let mut index = HashMap::new();
        let mut section_bounds = Vec::with_capacity(sections.len());
        for (si, section) in sections.iter().enumerate() {
            section_bounds.push(section.bounds());
            let origin = section.origin();
            for (ri, row) in section.rows.iter().enumerate() {
                for (ci, seat) in row.seats.iter().enumerate() {
                    index.insert(
                        seat.id,
                        SeatLocation { section: si, row: ri, seat: ci, center: seat.world_center(origin) },
                    );
                }
            }
        }

        let stage_bounds = stage.as_ref().map(Stage::bounds);
        let bounds = Rect::union_all(section_bounds.iter().chain(stage_bounds.iter()))
            .unwrap_or_else(|| Rect::new(0.0, 0.0, 1.0, 1.0));

        info!(
            "Seat map built for event {}: {} sections, {} seats, {} skipped elements",
            snapshot.event.id,
            sections.len(),
            index.len(),
            skipped.len()
        );

        SeatMapBuild {
            map: SeatMap {
                revision,
                event: snapshot.event,
                stage,
                sections,
                section_bounds,
                index,
                bounds,
            },
            initial,
            skipped,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn stage(&self) -> Option<&Stage> {
        self.stage.as_ref()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_bounds(&self, section: usize) -> Option<Rect> {
        self.section_bounds.get(section).copied()
    }

    /// Layout bounding box (stage + sections), computed once at build time.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn seat_count(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, seat_id: SeatId) -> bool {
        self.index.contains_key(&seat_id)
    }

    pub fn locate(&self, seat_id: SeatId) -> Option<SeatLocation> {
        self.index.get(&seat_id).copied()
    }

    pub fn seat(&self, seat_id: SeatId) -> Option<SeatRef<'_>> {
        let location = self.locate(seat_id)?;
        let section = self.sections.get(location.section)?;
        let row = section.rows.get(location.row)?;
        let seat = row.seats.get(location.seat)?;
        Some(SeatRef { section, row, seat, location })
    }

    pub fn seats(&self) -> impl Iterator<Item = SeatRef<'_>> + '_ {
        self.sections.iter().enumerate().flat_map(move |(si, section)| {
            let origin = section.origin();
            section.rows.iter().enumerate().flat_map(move |(ri, row)| {
                row.seats.iter().enumerate().map(move |(ci, seat)| SeatRef {
                    section,
                    row,
                    seat,
                    location: SeatLocation { section: si, row: ri, seat: ci, center: seat.world_center(origin) },
                })
            })
        })
    }
}

fn finite(value: Option<f64>, element: &'static str, id: i64, field: &str) -> Result<f64, GeometryError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(GeometryError { element, id, reason: format!("{} is not finite", field) }),
        None => Err(GeometryError { element, id, reason: format!("missing {}", field) }),
    }
}

fn validation_error(element: &'static str, id: i64, errors: validator::ValidationErrors) -> GeometryError {
    GeometryError { element, id, reason: errors.to_string() }
}

fn stage_from_record(record: StageRecord) -> Result<Stage, GeometryError> {
    record.validate().map_err(|e| validation_error("stage", 0, e))?;
    Ok(Stage {
        x: finite(record.x, "stage", 0, "x")?,
        y: finite(record.y, "stage", 0, "y")?,
        width: finite(record.width, "stage", 0, "width")?,
        height: finite(record.height, "stage", 0, "height")?,
        shape: record.shape,
        curve_factor: record.curve_factor,
        label: record.label,
    })
}

fn section_from_record(
    record: SectionRecord,
    seen: &mut HashSet<SeatId>,
    initial: &mut Vec<(SeatId, SeatStatus, u64)>,
    skipped: &mut Vec<GeometryError>,
) -> Result<Option<Section>, GeometryError> {
    record.validate().map_err(|e| validation_error("section", record.id, e))?;
    let x = finite(record.x, "section", record.id, "x")?;
    let y = finite(record.y, "section", record.id, "y")?;
    let width = record.width.filter(|w| w.is_finite()).unwrap_or(0.0);

    let mut rows = Vec::with_capacity(record.rows.len());
    for row in record.rows {
        if let Some(row) = row_from_record(row, seen, initial, skipped) {
            rows.push(row);
        }
    }
    if rows.is_empty() {
        warn!("Section {} has no renderable rows", record.id);
        return Ok(None);
    }

    Ok(Some(Section { id: record.id, name: record.name, x, y, width, rows }))
}

fn row_from_record(
    record: RowRecord,
    seen: &mut HashSet<SeatId>,
    initial: &mut Vec<(SeatId, SeatStatus, u64)>,
    skipped: &mut Vec<GeometryError>,
) -> Option<Row> {
    let mut seats = Vec::with_capacity(record.seats.len());
    for seat in record.seats {
        match seat_from_record(seat, seen) {
            Ok((seat, status)) => {
                if let Some((status, version)) = status {
                    initial.push((seat.id, status, version));
                }
                seats.push(seat);
            }
            Err(e) => {
                warn!("Skipping seat in row {}: {}", record.id, e);
                skipped.push(e);
            }
        }
    }
    if seats.is_empty() {
        return None;
    }
    // Слева направо, даже если сервис прислал в другом порядке
    seats.sort_by(|a, b| a.x.total_cmp(&b.x));
    Some(Row { id: record.id, title: record.title, seats })
}

type InitialStatus = Option<(SeatStatus, u64)>;

fn seat_from_record(record: SeatRecord, seen: &mut HashSet<SeatId>) -> Result<(Seat, InitialStatus), GeometryError> {
    record.validate().map_err(|e| validation_error("seat", record.id, e))?;
    let x = finite(record.x, "seat", record.id, "x")?;
    let y = finite(record.y, "seat", record.id, "y")?;
    let radius = finite(record.radius, "seat", record.id, "radius")?;
    if !seen.insert(record.id) {
        return Err(GeometryError { element: "seat", id: record.id, reason: "duplicate id".to_string() });
    }

    let seat = Seat {
        id: record.id,
        number: record.number,
        x,
        y,
        radius,
        seat_type: record.seat_type,
        ticket: record.ticket,
        icon: record.icon,
    };

    // Пустые места (проходы) не имеют статуса вовсе
    let status = if seat.is_blank() {
        None
    } else {
        let update = StatusUpdate {
            seat_id: record.id,
            status: record.status,
            owner_id: record.owner_id,
            version: record.version,
        };
        Some((update.to_seat_status(), record.version))
    };

    Ok((seat, status))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{FeedStatus, SeatType, Ticket};

    pub(crate) fn seat_record(id: SeatId, x: f64, ticket: Option<Ticket>) -> SeatRecord {
        SeatRecord {
            id,
            number: id.to_string(),
            x: Some(x),
            y: Some(0.0),
            radius: Some(5.0),
            seat_type: SeatType::Normal,
            ticket,
            icon: None,
            status: FeedStatus::Available,
            owner_id: None,
            version: 0,
        }
    }

    pub(crate) fn vip() -> Ticket {
        Ticket { id: 1, name: "VIP".into(), price: 500, booking_limit: None }
    }

    pub(crate) fn snapshot(seats: Vec<SeatRecord>) -> SeatMapSnapshot {
        SeatMapSnapshot {
            event: Event { id: 42, title: "Concert".into(), venue: None, datetime_start: None },
            stage: None,
            sections: vec![SectionRecord {
                id: 10,
                name: "Stalls".into(),
                x: Some(100.0),
                y: Some(50.0),
                width: Some(200.0),
                rows: vec![RowRecord { id: 100, title: "A".into(), seats }],
            }],
            feed_cursor: 0,
        }
    }

    #[test]
    fn malformed_seat_is_skipped_and_rest_survives() {
        let mut broken = seat_record(2, 20.0, Some(vip()));
        broken.x = None;
        let mut zero = seat_record(3, 40.0, Some(vip()));
        zero.radius = Some(0.0);
        let build = SeatMap::build(
            snapshot(vec![seat_record(1, 0.0, Some(vip())), broken, zero]),
            1,
        );
        assert_eq!(build.map.seat_count(), 1);
        assert_eq!(build.skipped.len(), 2);
        assert!(build.map.contains(1));
        assert!(!build.map.contains(2));
    }

    #[test]
    fn seat_centers_are_offset_by_section_origin() {
        let build = SeatMap::build(snapshot(vec![seat_record(1, 10.0, None)]), 1);
        let loc = build.map.locate(1).unwrap();
        assert_eq!(loc.center, Point::new(110.0, 50.0));
    }

    #[test]
    fn blank_seats_have_no_initial_status() {
        let mut gap = seat_record(2, 20.0, None);
        gap.seat_type = SeatType::Blank;
        let build = SeatMap::build(snapshot(vec![seat_record(1, 0.0, None), gap]), 1);
        assert_eq!(build.map.seat_count(), 2);
        assert_eq!(build.initial.len(), 1);
        assert_eq!(build.initial[0].0, 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let build = SeatMap::build(
            snapshot(vec![seat_record(1, 0.0, None), seat_record(1, 30.0, None)]),
            1,
        );
        assert_eq!(build.map.seat_count(), 1);
        assert_eq!(build.skipped[0].reason, "duplicate id");
    }

    #[test]
    fn seats_are_ordered_left_to_right() {
        let build = SeatMap::build(
            snapshot(vec![seat_record(2, 30.0, None), seat_record(1, 0.0, None)]),
            1,
        );
        let ids: Vec<SeatId> = build.map.seats().map(|s| s.seat.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
