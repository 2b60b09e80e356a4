//! BookingSummary: чистая проекция выбора для отображения и передачи в оплату.

use serde::Serialize;
use std::time::Instant;

use crate::layout::SeatMap;
use crate::models::{EventId, SeatId, TicketId};
use crate::sync::SeatStatusSynchronizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryLine {
    pub ticket_id: TicketId,
    pub ticket_name: String,
    pub count: u32,
    pub unit_price: i64,
    pub subtotal: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatLine {
    pub seat_id: SeatId,
    pub section_name: String,
    pub row_title: String,
    pub seat_number: String,
    pub ticket_name: String,
    pub price: i64,
    /// Обратный отсчёт удержания; `None` пока блокировка не подтверждена.
    pub hold_expires_in_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingSummary {
    pub event_id: EventId,
    pub categories: Vec<CategoryLine>,
    pub seats: Vec<SeatLine>,
    pub total_amount: i64,
    pub total_seat_count: u32,
}

/// Payload handed to the external checkout flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutHandoff {
    pub event_id: EventId,
    pub seat_ids: Vec<SeatId>,
    pub total_amount: i64,
}

impl BookingSummary {
    /// Собирает сводку из текущего выбора. Места перечисляются в порядке выбора.
    pub fn project(map: &SeatMap, sync: &SeatStatusSynchronizer, now: Instant) -> Self {
        let selection = sync.selection();

        let categories: Vec<CategoryLine> = selection
            .aggregates()
            .map(|a| CategoryLine {
                ticket_id: a.ticket_id,
                ticket_name: a.ticket_name.clone(),
                count: a.count,
                unit_price: a.unit_price,
                subtotal: a.subtotal(),
            })
            .collect();

        let seats = selection
            .entries()
            .into_iter()
            .filter_map(|entry| {
                let seat = map.seat(entry.seat_id)?;
                let ticket = seat.seat.ticket.as_ref()?;
                let hold_expires_in_secs = if sync.is_hold_confirmed(entry.seat_id) {
                    sync.hold_remaining(entry.seat_id, now).map(|d| d.as_secs())
                } else {
                    None
                };
                Some(SeatLine {
                    seat_id: entry.seat_id,
                    section_name: seat.section.name.clone(),
                    row_title: seat.row.title.clone(),
                    seat_number: seat.seat.number.clone(),
                    ticket_name: ticket.name.clone(),
                    price: ticket.price,
                    hold_expires_in_secs,
                })
            })
            .collect();

        Self {
            event_id: map.event().id,
            categories,
            seats,
            total_amount: selection.total_amount(),
            total_seat_count: selection.len() as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_seat_count == 0
    }

    pub fn checkout(&self) -> CheckoutHandoff {
        CheckoutHandoff {
            event_id: self.event_id,
            seat_ids: self.seats.iter().map(|s| s.seat_id).collect(),
            total_amount: self.total_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::{seat_record, snapshot, vip};
    use crate::models::{LockResponse, Ticket};
    use crate::selection::SelectionEngine;
    use std::time::Duration;

    #[test]
    fn summary_lists_categories_and_seats() {
        let standard = Ticket { id: 2, name: "Standard".into(), price: 300, booking_limit: None };
        let build = SeatMap::build(
            snapshot(vec![
                seat_record(1, 0.0, Some(vip())),
                seat_record(2, 20.0, Some(standard)),
                seat_record(3, 40.0, Some(vip())),
            ]),
            1,
        );
        let now = Instant::now();
        let mut sync = SeatStatusSynchronizer::new(
            7,
            build.initial,
            SelectionEngine::new(10, 20),
            Duration::from_secs(600),
            Duration::from_secs(60),
            now,
        );
        sync.select(&build.map, 3, now).unwrap();
        sync.select(&build.map, 2, now).unwrap();
        sync.select(&build.map, 1, now).unwrap();
        sync.apply_lock_response(1, &LockResponse { granted: vec![3], ..Default::default() }, now);

        let summary = BookingSummary::project(&build.map, &sync, now + Duration::from_secs(100));
        assert_eq!(summary.total_amount, 1300);
        assert_eq!(summary.total_seat_count, 3);
        assert_eq!(summary.categories.len(), 2);
        assert_eq!(summary.categories[0].subtotal, 1000);
        let order: Vec<SeatId> = summary.seats.iter().map(|s| s.seat_id).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(summary.seats[0].hold_expires_in_secs, Some(500));
        assert_eq!(summary.seats[1].hold_expires_in_secs, None);
        assert_eq!(summary.seats[0].row_title, "A");
        assert_eq!(summary.seats[0].section_name, "Stalls");

        let handoff = summary.checkout();
        assert_eq!(handoff.event_id, 42);
        assert_eq!(handoff.seat_ids, vec![3, 2, 1]);
        assert_eq!(handoff.total_amount, 1300);
    }
}
