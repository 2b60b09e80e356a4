//! SeatStatusSynchronizer: единственный владелец статусов мест.
//!
//! Машина состояний места:
//!
//! ```text
//! Available --tap--> SelectedLocal --lock ok--> SelectedLocal (подтверждено, идёт TTL)
//!                         |--lock rejected / push "занято"--> HeldRemote | Booked
//!                         |--TTL / deselect--> Available
//! Available <--> HeldRemote        (лента статусов, TTL чужого удержания)
//! * --> Booked                     (терминально до полной перезагрузки снимка)
//! ```
//!
//! Выбор пользователя (`SelectionEngine`) живёт здесь же: каждая мутация меняет
//! статус и выбор в одном `&mut self` вызове, поэтому множество выбранных мест и
//! места в `SelectedLocal` совпадают всегда. Каждое обновление с сервера несёт
//! версию; версии не больше уже применённой отбрасываются.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{LockError, SelectionError};
use crate::hit_test::is_eligible;
use crate::layout::SeatMap;
use crate::models::{LockResponse, SeatId, SeatStatus, StatusUpdate, UserId};
use crate::selection::{SelectionEngine, SelectionEntry};

pub type RequestId = u64;

/// Seats whose status or selection changed in one batch.
pub type ChangeSet = BTreeSet<SeatId>;

/// Команды сервису блокировок, которые вызывающий должен выполнить.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockCommand {
    Acquire { request_id: RequestId, seat_ids: Vec<SeatId> },
    Release { seat_ids: Vec<SeatId> },
}

/// Уведомление для пользователя.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Место только что занял кто-то другой.
    SeatTaken { seat_id: SeatId },
    HoldExpired { seat_id: SeatId },
    HoldExpiringSoon { seat_id: SeatId, remaining_secs: u64 },
    /// Сервис блокировок недоступен, выбор отменён.
    LockUnavailable { seat_id: SeatId },
    SelectionRejected { reason: String },
}

impl Notice {
    pub fn seat_id(&self) -> Option<SeatId> {
        match self {
            Notice::SeatTaken { seat_id }
            | Notice::HoldExpired { seat_id }
            | Notice::HoldExpiringSoon { seat_id, .. }
            | Notice::LockUnavailable { seat_id } => Some(*seat_id),
            Notice::SelectionRejected { .. } => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub changed: ChangeSet,
    pub commands: Vec<LockCommand>,
    pub notices: Vec<Notice>,
}

impl SyncOutcome {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.commands.is_empty() && self.notices.is_empty()
    }

    pub fn merge(&mut self, other: SyncOutcome) {
        self.changed.extend(other.changed);
        self.commands.extend(other.commands);
        self.notices.extend(other.notices);
    }
}

#[derive(Debug, Clone, Copy)]
struct StatusEntry {
    status: SeatStatus,
    version: u64,
}

/// Локальное удержание выбранного места.
#[derive(Debug, Clone, Copy)]
struct Hold {
    request_id: RequestId,
    // статус до оптимистичного выбора, для отката при сбое сети
    previous: SeatStatus,
    confirmed: bool,
    expires_at: Instant,
    warned: bool,
}

#[derive(Debug, Clone)]
pub struct SeatStatusSynchronizer {
    current_user: UserId,
    table: HashMap<SeatId, StatusEntry>,
    holds: HashMap<SeatId, Hold>,
    // чужие удержания: когда они истекут, если сервер не сообщит раньше
    remote_holds: HashMap<SeatId, Instant>,
    selection: SelectionEngine,
    hold_ttl: Duration,
    hold_warning: Duration,
    next_request_id: RequestId,
    stale_discarded: u64,
}

impl SeatStatusSynchronizer {
    pub fn new(
        current_user: UserId,
        initial: impl IntoIterator<Item = (SeatId, SeatStatus, u64)>,
        selection: SelectionEngine,
        hold_ttl: Duration,
        hold_warning: Duration,
        now: Instant,
    ) -> Self {
        let mut sync = Self {
            current_user,
            table: HashMap::new(),
            holds: HashMap::new(),
            remote_holds: HashMap::new(),
            selection,
            hold_ttl,
            hold_warning,
            next_request_id: 1,
            stale_discarded: 0,
        };
        for (seat_id, status, version) in initial {
            sync.table.insert(seat_id, StatusEntry { status, version });
            sync.track_remote_hold(seat_id, status, now);
        }
        sync
    }

    pub fn current_user(&self) -> UserId {
        self.current_user
    }

    pub fn status(&self, seat_id: SeatId) -> Option<SeatStatus> {
        self.table.get(&seat_id).map(|e| e.status)
    }

    pub fn version(&self, seat_id: SeatId) -> Option<u64> {
        self.table.get(&seat_id).map(|e| e.version)
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded
    }

    pub fn is_hold_confirmed(&self, seat_id: SeatId) -> bool {
        self.holds.get(&seat_id).is_some_and(|h| h.confirmed)
    }

    /// Оставшееся время удержания для обратного отсчёта в интерфейсе.
    pub fn hold_remaining(&self, seat_id: SeatId, now: Instant) -> Option<Duration> {
        self.holds
            .get(&seat_id)
            .map(|h| h.expires_at.saturating_duration_since(now))
    }

    pub fn statuses(&self) -> impl Iterator<Item = (SeatId, SeatStatus)> + '_ {
        self.table.iter().map(|(id, e)| (*id, e.status))
    }

    /// Множество выбранных мест совпадает с местами в `SelectedLocal`.
    pub fn is_consistent(&self) -> bool {
        let local: BTreeSet<SeatId> = self
            .table
            .iter()
            .filter(|(_, e)| e.status == SeatStatus::SelectedLocal)
            .map(|(id, _)| *id)
            .collect();
        let selected: BTreeSet<SeatId> = self.selection.seat_ids().collect();
        let held: BTreeSet<SeatId> = self.holds.keys().copied().collect();
        local == selected && selected == held
    }

    fn next_request(&mut self) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn set_status(&mut self, seat_id: SeatId, status: SeatStatus, version: Option<u64>, now: Instant) {
        if let Some(entry) = self.table.get_mut(&seat_id) {
            entry.status = status;
            if let Some(v) = version {
                entry.version = entry.version.max(v);
            }
        }
        self.track_remote_hold(seat_id, status, now);
    }

    fn track_remote_hold(&mut self, seat_id: SeatId, status: SeatStatus, now: Instant) {
        match status {
            // Наши собственные удержания вне выбора тоже истекают по TTL
            SeatStatus::HeldRemote(_) => {
                self.remote_holds.insert(seat_id, now + self.hold_ttl);
            }
            _ => {
                self.remote_holds.remove(&seat_id);
            }
        }
    }

    /// Убирает место из выбора и удержаний, выставляя новый статус.
    fn drop_local(&mut self, seat_id: SeatId, status: SeatStatus, version: Option<u64>, now: Instant) {
        self.selection.deselect(seat_id);
        self.holds.remove(&seat_id);
        self.set_status(seat_id, status, version, now);
    }

    /// Tap on a seat: select when free, deselect when it is our own hold.
    pub fn toggle(&mut self, map: &SeatMap, seat_id: SeatId, now: Instant) -> Result<SyncOutcome, SelectionError> {
        if self.selection.contains(seat_id) {
            Ok(self.deselect(seat_id))
        } else {
            self.select(map, seat_id, now)
        }
    }

    /// Оптимистичный выбор: место сразу `SelectedLocal`, запрос блокировки уходит асинхронно.
    pub fn select(&mut self, map: &SeatMap, seat_id: SeatId, now: Instant) -> Result<SyncOutcome, SelectionError> {
        let seat = map.seat(seat_id).ok_or(SelectionError::UnknownSeat(seat_id))?;
        if seat.seat.is_blank() {
            return Err(SelectionError::NotEligible(seat_id));
        }
        let ticket = seat
            .seat
            .ticket
            .as_ref()
            .ok_or(SelectionError::NoTicketAssigned(seat_id))?;
        if self.selection.contains(seat_id) {
            return Ok(SyncOutcome::default());
        }
        let previous = self.status(seat_id).ok_or(SelectionError::UnknownSeat(seat_id))?;
        if !is_eligible(seat.seat, Some(previous), self.current_user) {
            return Err(SelectionError::NotEligible(seat_id));
        }

        let entry = SelectionEntry {
            seat_id,
            section_id: seat.section.id,
            row_id: seat.row.id,
            ticket_id: ticket.id,
        };
        self.selection.select(entry, ticket)?;

        let request_id = self.next_request();
        self.holds.insert(
            seat_id,
            Hold { request_id, previous, confirmed: false, expires_at: now + self.hold_ttl, warned: false },
        );
        self.set_status(seat_id, SeatStatus::SelectedLocal, None, now);
        debug!("Seat {} selected locally, lock request {}", seat_id, request_id);

        let mut outcome = SyncOutcome::default();
        outcome.changed.insert(seat_id);
        outcome.commands.push(LockCommand::Acquire { request_id, seat_ids: vec![seat_id] });
        Ok(outcome)
    }

    /// Снятие выбора: откат сразу, разблокировка best-effort.
    pub fn deselect(&mut self, seat_id: SeatId) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        if !self.selection.contains(seat_id) {
            return outcome;
        }
        // Время для чужих удержаний здесь не нужно: статус Available
        self.selection.deselect(seat_id);
        self.holds.remove(&seat_id);
        if let Some(entry) = self.table.get_mut(&seat_id) {
            entry.status = SeatStatus::Available;
        }
        self.remote_holds.remove(&seat_id);

        outcome.changed.insert(seat_id);
        outcome.commands.push(LockCommand::Release { seat_ids: vec![seat_id] });
        outcome
    }

    /// Снимает весь выбор одним запросом на разблокировку.
    pub fn clear(&mut self) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        let removed = self.selection.clear();
        if removed.is_empty() {
            return outcome;
        }
        let seat_ids: Vec<SeatId> = removed.iter().map(|e| e.seat_id).collect();
        for seat_id in &seat_ids {
            self.holds.remove(seat_id);
            if let Some(entry) = self.table.get_mut(seat_id) {
                entry.status = SeatStatus::Available;
            }
            outcome.changed.insert(*seat_id);
        }
        info!("Selection cleared, releasing {} seats", seat_ids.len());
        outcome.commands.push(LockCommand::Release { seat_ids });
        outcome
    }

    /// Применяет ответ сервиса блокировок на запрос `request_id`.
    pub fn apply_lock_response(&mut self, request_id: RequestId, response: &LockResponse, now: Instant) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        let ttl = response.ttl_seconds.map(Duration::from_secs).unwrap_or(self.hold_ttl);
        let server_view: HashMap<SeatId, &StatusUpdate> =
            response.conflicts.iter().map(|u| (u.seat_id, u)).collect();

        let mut orphaned = Vec::new();
        for &seat_id in &response.granted {
            match self.holds.get_mut(&seat_id) {
                Some(hold) if hold.request_id == request_id => {
                    hold.confirmed = true;
                    hold.expires_at = now + ttl;
                    hold.warned = false;
                    info!("Seat {} locked, hold expires in {}s", seat_id, ttl.as_secs());
                }
                // Место выбрано заново, его подтвердит более новый запрос
                Some(hold) => {
                    debug!(
                        "Grant for seat {} from superseded request {} ignored (current {})",
                        seat_id, request_id, hold.request_id
                    );
                }
                // Выбор уже снят, а блокировка всё же выдана: отпускаем её
                None => orphaned.push(seat_id),
            }
        }
        if !orphaned.is_empty() {
            debug!("Releasing {} orphaned grants from request {}", orphaned.len(), request_id);
            outcome.commands.push(LockCommand::Release { seat_ids: orphaned });
        }

        for &seat_id in &response.rejected {
            let pending_here = self.holds.get(&seat_id).is_some_and(|h| h.request_id == request_id);
            if !pending_here {
                continue;
            }
            let (status, version) = match server_view.get(&seat_id) {
                Some(update) => (update.to_seat_status(), Some(update.version)),
                None => (SeatStatus::HeldRemote(None), None),
            };
            warn!("Lock for seat {} rejected, rolling back to {:?}", seat_id, status);
            self.drop_local(seat_id, status, version, now);
            outcome.changed.insert(seat_id);
            outcome.notices.push(Notice::SeatTaken { seat_id });
        }

        // Места из запроса, о которых сервис промолчал, считаем не полученными
        let answered: BTreeSet<SeatId> = response.granted.iter().chain(response.rejected.iter()).copied().collect();
        let silent: Vec<SeatId> = self
            .holds
            .iter()
            .filter(|(id, h)| h.request_id == request_id && !h.confirmed && !answered.contains(id))
            .map(|(id, _)| *id)
            .collect();
        for seat_id in silent {
            self.rollback_unavailable(seat_id, now, &mut outcome);
        }

        outcome
    }

    /// Запрос блокировки не удался совсем (после всех повторов).
    pub fn apply_lock_failure(&mut self, request_id: RequestId, error: &LockError, now: Instant) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        let seats: Vec<SeatId> = self
            .holds
            .iter()
            .filter(|(_, h)| h.request_id == request_id)
            .map(|(id, _)| *id)
            .collect();

        for seat_id in seats {
            match error {
                LockError::Conflict(taken) if taken.contains(&seat_id) => {
                    warn!("Lock conflict on seat {}", seat_id);
                    self.drop_local(seat_id, SeatStatus::HeldRemote(None), None, now);
                    outcome.changed.insert(seat_id);
                    outcome.notices.push(Notice::SeatTaken { seat_id });
                }
                _ => {
                    warn!("Lock request {} for seat {} failed: {}", request_id, seat_id, error);
                    self.rollback_unavailable(seat_id, now, &mut outcome);
                }
            }
        }
        outcome
    }

    fn rollback_unavailable(&mut self, seat_id: SeatId, now: Instant, outcome: &mut SyncOutcome) {
        let previous = self
            .holds
            .get(&seat_id)
            .map(|h| h.previous)
            .unwrap_or(SeatStatus::Available);
        self.drop_local(seat_id, previous, None, now);
        outcome.changed.insert(seat_id);
        outcome.notices.push(Notice::LockUnavailable { seat_id });
    }

    /// Batch of status-feed tuples (push or poll).
    pub fn apply_updates(&mut self, updates: &[StatusUpdate], now: Instant) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        for update in updates {
            let Some(entry) = self.table.get(&update.seat_id).copied() else {
                debug!("Status update for unknown seat {} ignored", update.seat_id);
                continue;
            };
            if update.version <= entry.version {
                self.stale_discarded += 1;
                debug!(
                    "Stale update for seat {} discarded (v{} <= v{})",
                    update.seat_id, update.version, entry.version
                );
                continue;
            }
            if entry.status.is_terminal() {
                if let Some(e) = self.table.get_mut(&update.seat_id) {
                    e.version = update.version;
                }
                continue;
            }

            let seat_id = update.seat_id;
            let incoming = update.to_seat_status();

            if !self.selection.contains(seat_id) {
                if incoming != entry.status {
                    outcome.changed.insert(seat_id);
                }
                self.set_status(seat_id, incoming, Some(update.version), now);
                continue;
            }

            // Место в нашем выборе: решаем, подтверждение это или гонка
            match incoming {
                SeatStatus::HeldRemote(Some(owner)) if owner == self.current_user => {
                    if let Some(hold) = self.holds.get_mut(&seat_id) {
                        hold.confirmed = true;
                    }
                    self.set_status(seat_id, SeatStatus::SelectedLocal, Some(update.version), now);
                }
                SeatStatus::Available => {
                    if self.is_hold_confirmed(seat_id) {
                        warn!("Server released our hold on seat {}", seat_id);
                        self.drop_local(seat_id, SeatStatus::Available, Some(update.version), now);
                        outcome.changed.insert(seat_id);
                        outcome.notices.push(Notice::HoldExpired { seat_id });
                    } else {
                        // Блокировка ещё в пути: сервер просто её не видел
                        self.set_status(seat_id, SeatStatus::SelectedLocal, Some(update.version), now);
                    }
                }
                SeatStatus::Booked if update.owner_id == Some(self.current_user) => {
                    info!("Seat {} booked by current user", seat_id);
                    self.drop_local(seat_id, SeatStatus::Booked, Some(update.version), now);
                    outcome.changed.insert(seat_id);
                }
                other => {
                    warn!("Seat {} taken while selected locally ({:?}), forcing rollback", seat_id, other);
                    self.drop_local(seat_id, other, Some(update.version), now);
                    outcome.changed.insert(seat_id);
                    outcome.notices.push(Notice::SeatTaken { seat_id });
                }
            }
        }

        outcome
    }

    /// TTL: истёкшие удержания возвращаются в `Available` без ожидания сервера.
    pub fn expire_holds(&mut self, now: Instant) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        let expired: Vec<SeatId> = self
            .holds
            .iter()
            .filter(|(_, h)| h.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        if !expired.is_empty() {
            for &seat_id in &expired {
                warn!("Hold on seat {} expired", seat_id);
                self.drop_local(seat_id, SeatStatus::Available, None, now);
                outcome.changed.insert(seat_id);
                outcome.notices.push(Notice::HoldExpired { seat_id });
            }
            outcome.commands.push(LockCommand::Release { seat_ids: expired });
        }

        for (seat_id, hold) in self.holds.iter_mut() {
            if !hold.confirmed || hold.warned {
                continue;
            }
            let remaining = hold.expires_at.saturating_duration_since(now);
            if remaining <= self.hold_warning {
                hold.warned = true;
                outcome.notices.push(Notice::HoldExpiringSoon {
                    seat_id: *seat_id,
                    remaining_secs: remaining.as_secs(),
                });
            }
        }

        let lapsed: Vec<SeatId> = self
            .remote_holds
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(id, _)| *id)
            .collect();
        for seat_id in lapsed {
            self.remote_holds.remove(&seat_id);
            if let Some(entry) = self.table.get_mut(&seat_id) {
                if matches!(entry.status, SeatStatus::HeldRemote(_)) {
                    debug!("Remote hold on seat {} lapsed", seat_id);
                    entry.status = SeatStatus::Available;
                    outcome.changed.insert(seat_id);
                }
            }
        }

        outcome
    }

    /// Полная перезагрузка снимка: терминальные статусы сбрасываются, выбор
    /// сверяется со свежими статусами.
    pub fn reset(&mut self, initial: impl IntoIterator<Item = (SeatId, SeatStatus, u64)>, now: Instant) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        let fresh: HashMap<SeatId, StatusEntry> = initial
            .into_iter()
            .map(|(id, status, version)| (id, StatusEntry { status, version }))
            .collect();

        outcome.changed.extend(self.table.keys().copied());
        outcome.changed.extend(fresh.keys().copied());
        self.table = fresh;
        self.remote_holds.clear();
        let statuses: Vec<(SeatId, SeatStatus)> = self.statuses().collect();
        for (seat_id, status) in statuses {
            self.track_remote_hold(seat_id, status, now);
        }

        let mut released = Vec::new();
        for entry in self.selection.entries() {
            let seat_id = entry.seat_id;
            match self.status(seat_id) {
                None => {
                    self.selection.deselect(seat_id);
                    self.holds.remove(&seat_id);
                    released.push(seat_id);
                }
                Some(SeatStatus::HeldRemote(Some(owner))) if owner == self.current_user => {
                    if let Some(hold) = self.holds.get_mut(&seat_id) {
                        hold.confirmed = true;
                    }
                    self.set_status(seat_id, SeatStatus::SelectedLocal, None, now);
                }
                Some(SeatStatus::Available) if !self.is_hold_confirmed(seat_id) => {
                    self.set_status(seat_id, SeatStatus::SelectedLocal, None, now);
                }
                Some(SeatStatus::Available) => {
                    self.drop_local(seat_id, SeatStatus::Available, None, now);
                    outcome.notices.push(Notice::HoldExpired { seat_id });
                }
                Some(other) => {
                    self.drop_local(seat_id, other, None, now);
                    outcome.notices.push(Notice::SeatTaken { seat_id });
                }
            }
        }
        if !released.is_empty() {
            outcome.commands.push(LockCommand::Release { seat_ids: released });
        }
        outcome
    }
}
