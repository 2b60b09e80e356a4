//! SelectionEngine: места, выбранные текущим пользователем, и агрегаты по
//! категориям билетов.
//!
//! Агрегаты и итоговая сумма обновляются инкрементально на каждом
//! select/deselect, без пересчёта по всей схеме. Изменяет движок только
//! `SeatStatusSynchronizer`, вместе со статусом места.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::error::SelectionError;
use crate::models::{RowId, SeatId, SectionId, Ticket, TicketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionEntry {
    pub seat_id: SeatId,
    pub section_id: SectionId,
    pub row_id: RowId,
    pub ticket_id: TicketId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketCategoryAggregate {
    pub ticket_id: TicketId,
    pub ticket_name: String,
    pub count: u32,
    pub unit_price: i64,
}

impl TicketCategoryAggregate {
    pub fn subtotal(&self) -> i64 {
        i64::from(self.count) * self.unit_price
    }
}

#[derive(Debug, Clone)]
pub struct SelectionEngine {
    // seat -> (порядковый номер выбора, запись)
    entries: HashMap<SeatId, (u64, SelectionEntry)>,
    aggregates: BTreeMap<TicketId, TicketCategoryAggregate>,
    total_amount: i64,
    next_seq: u64,
    revision: u64,
    per_ticket_limit: u32,
    total_limit: u32,
}

impl SelectionEngine {
    pub fn new(per_ticket_limit: u32, total_limit: u32) -> Self {
        Self {
            entries: HashMap::new(),
            aggregates: BTreeMap::new(),
            total_amount: 0,
            next_seq: 0,
            revision: 0,
            per_ticket_limit,
            total_limit,
        }
    }

    /// Проверка лимитов без изменения состояния.
    pub fn check(&self, entry: &SelectionEntry, ticket: &Ticket) -> Result<(), SelectionError> {
        if self.entries.contains_key(&entry.seat_id) {
            return Ok(());
        }
        let limit = ticket.booking_limit.unwrap_or(self.per_ticket_limit);
        let count = self.aggregates.get(&ticket.id).map_or(0, |a| a.count);
        if count + 1 > limit {
            return Err(SelectionError::LimitExceeded {
                ticket_id: ticket.id,
                ticket_name: ticket.name.clone(),
                limit,
            });
        }
        if self.entries.len() + 1 > self.total_limit as usize {
            return Err(SelectionError::TotalLimitExceeded { limit: self.total_limit });
        }
        Ok(())
    }

    /// Добавляет место. `Ok(false)` - место уже было выбрано.
    pub fn select(&mut self, entry: SelectionEntry, ticket: &Ticket) -> Result<bool, SelectionError> {
        if self.entries.contains_key(&entry.seat_id) {
            return Ok(false);
        }
        self.check(&entry, ticket)?;

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(entry.seat_id, (seq, entry));

        let aggregate = self
            .aggregates
            .entry(ticket.id)
            .or_insert_with(|| TicketCategoryAggregate {
                ticket_id: ticket.id,
                ticket_name: ticket.name.clone(),
                count: 0,
                unit_price: ticket.price,
            });
        aggregate.count += 1;
        self.total_amount += aggregate.unit_price;
        self.revision += 1;
        Ok(true)
    }

    pub fn deselect(&mut self, seat_id: SeatId) -> Option<SelectionEntry> {
        let (_, entry) = self.entries.remove(&seat_id)?;
        if let Some(aggregate) = self.aggregates.get_mut(&entry.ticket_id) {
            aggregate.count = aggregate.count.saturating_sub(1);
            self.total_amount -= aggregate.unit_price;
            if aggregate.count == 0 {
                self.aggregates.remove(&entry.ticket_id);
            }
        }
        self.revision += 1;
        Some(entry)
    }

    /// Снимает весь выбор, возвращая записи в порядке выбора.
    pub fn clear(&mut self) -> Vec<SelectionEntry> {
        let removed = self.entries();
        self.entries.clear();
        self.aggregates.clear();
        self.total_amount = 0;
        if !removed.is_empty() {
            self.revision += 1;
        }
        removed
    }

    pub fn contains(&self, seat_id: SeatId) -> bool {
        self.entries.contains_key(&seat_id)
    }

    pub fn get(&self, seat_id: SeatId) -> Option<&SelectionEntry> {
        self.entries.get(&seat_id).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn seat_ids(&self) -> impl Iterator<Item = SeatId> + '_ {
        self.entries.keys().copied()
    }

    /// Entries in the order the user picked them.
    pub fn entries(&self) -> Vec<SelectionEntry> {
        let mut ordered: Vec<&(u64, SelectionEntry)> = self.entries.values().collect();
        ordered.sort_by_key(|(seq, _)| *seq);
        ordered.into_iter().map(|(_, e)| *e).collect()
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &TicketCategoryAggregate> {
        self.aggregates.values()
    }

    pub fn aggregate(&self, ticket_id: TicketId) -> Option<&TicketCategoryAggregate> {
        self.aggregates.get(&ticket_id)
    }

    pub fn total_amount(&self) -> i64 {
        self.total_amount
    }

    /// Меняется при каждой мутации; по нему сводка понимает, что пора пересчитаться.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Полный пересчёт суммы по агрегатам - для проверки инкрементального значения.
    pub fn recompute_total(&self) -> i64 {
        self.aggregates.values().map(TicketCategoryAggregate::subtotal).sum()
    }
}
