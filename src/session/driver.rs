//! Асинхронная обвязка сеанса: выполняет команды блокировок, подгружает иконки.
//!
//! Доступ к сеансу сериализован через `tokio::sync::Mutex`, поэтому
//! синхронизатор статусов остаётся единственным писателем. Ответы сети
//! применяются по мере прихода, в любом порядке.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::{PointerEvent, SeatMapSession};
use crate::models::{EventId, LockRequest, SeatId, StatusUpdate, UnlockRequest, UserId};
use crate::render::Frame;
use crate::services::lock::LockService;
use crate::summary::BookingSummary;
use crate::sync::{LockCommand, Notice, RequestId};

/// Текущее время для синхронизатора; в тестах идёт по часам tokio.
pub fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<SeatMapSession>>,
    locks: Arc<dyn LockService>,
    in_flight: Arc<std::sync::Mutex<HashMap<RequestId, AbortHandle>>>,
}

impl SessionHandle {
    pub fn new(session: SeatMapSession, locks: Arc<dyn LockService>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            locks,
            in_flight: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, AbortHandle>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn pending_locks(&self) -> usize {
        self.in_flight().len()
    }

    /// Доступ к сеансу на чтение/запись под мьютексом.
    pub async fn with<R>(&self, f: impl FnOnce(&mut SeatMapSession) -> R) -> R {
        let mut session = self.session.lock().await;
        f(&mut session)
    }

    pub async fn pointer(&self, event: PointerEvent) {
        let commands = self.with(|s| s.pointer(event, now())).await;
        self.execute(commands).await;
    }

    pub async fn apply_feed(&self, updates: Vec<StatusUpdate>) {
        if updates.is_empty() {
            return;
        }
        let commands = self.with(|s| s.apply_feed(&updates, now())).await;
        self.execute(commands).await;
    }

    pub async fn tick(&self) {
        let commands = self.with(|s| s.tick(now())).await;
        self.execute(commands).await;
    }

    pub async fn clear(&self) {
        let commands = self.with(|s| s.clear()).await;
        self.execute(commands).await;
    }

    pub async fn summary(&self) -> BookingSummary {
        self.with(|s| s.summary(now())).await
    }

    pub async fn drain_notices(&self) -> Vec<Notice> {
        self.with(|s| s.drain_notices()).await
    }

    /// Кадр плюс фоновая растеризация недостающих иконок.
    pub async fn frame(&self) -> Frame {
        let (frame, icons) = self.with(|s| (s.frame(), s.icons().clone())).await;
        for key in frame.missing_icons.iter().filter(|k| !icons.is_pending(k)).cloned() {
            let handle = self.clone();
            let icons = icons.clone();
            tokio::spawn(async move {
                icons.get(key.clone()).await;
                handle.with(|s| s.icon_ready(&key)).await;
            });
        }
        frame
    }

    /// Запускает сетевые команды. Захват - в фоне с возможностью отмены,
    /// освобождение - best-effort.
    pub async fn execute(&self, commands: Vec<LockCommand>) {
        if commands.is_empty() {
            return;
        }
        let (event_id, user_id) = self.with(|s| (s.event_id(), s.current_user())).await;

        for command in commands {
            match command {
                LockCommand::Acquire { request_id, seat_ids } => {
                    let handle = self.clone();
                    let request = LockRequest { event_id, seat_ids, user_id };
                    // Регистрируем до того, как задача сможет себя удалить
                    let mut in_flight = self.in_flight();
                    let task = tokio::spawn(async move {
                        let result = handle.locks.lock(request).await;
                        handle.in_flight().remove(&request_id);
                        let follow_up = handle
                            .with(|s| match &result {
                                Ok(response) => s.lock_resolved(request_id, response, now()),
                                Err(e) => s.lock_failed(request_id, e, now()),
                            })
                            .await;
                        handle.spawn_releases(event_id, user_id, follow_up);
                    });
                    in_flight.insert(request_id, task.abort_handle());
                }
                LockCommand::Release { seat_ids } => {
                    self.spawn_release(UnlockRequest { event_id, seat_ids, user_id });
                }
            }
        }
    }

    // Ответ на захват может породить только освобождения
    fn spawn_releases(&self, event_id: EventId, user_id: UserId, commands: Vec<LockCommand>) {
        for command in commands {
            match command {
                LockCommand::Release { seat_ids } => self.spawn_release(UnlockRequest { event_id, seat_ids, user_id }),
                LockCommand::Acquire { request_id, .. } => {
                    warn!("Unexpected acquire {} in lock follow-up ignored", request_id);
                }
            }
        }
    }

    fn spawn_release(&self, request: UnlockRequest) {
        let locks = self.locks.clone();
        tokio::spawn(async move {
            if let Err(e) = locks.unlock(request).await {
                // Разблокировка не критична: сервер сам снимет удержание по TTL
                warn!("Best-effort unlock failed: {}", e);
            }
        });
    }

    /// Уход со схемы: отменяем захваты в полёте и отпускаем всё выбранное.
    /// Возвращает места, для которых отправлялась разблокировка.
    pub async fn teardown(&self) -> Vec<SeatId> {
        let aborted: Vec<AbortHandle> = self.in_flight().drain().map(|(_, h)| h).collect();
        for handle in &aborted {
            handle.abort();
        }
        if !aborted.is_empty() {
            debug!("Cancelled {} in-flight lock requests", aborted.len());
        }

        let (commands, event_id, user_id) = self.with(|s| (s.teardown(), s.event_id(), s.current_user())).await;
        let mut released = Vec::new();
        let unlocks = commands.into_iter().filter_map(|command| match command {
            LockCommand::Release { seat_ids } => {
                released.extend(seat_ids.iter().copied());
                Some(self.locks.unlock(UnlockRequest { event_id, seat_ids, user_id }))
            }
            LockCommand::Acquire { .. } => None,
        });
        let unlocks: Vec<_> = unlocks.collect();
        for result in join_all(unlocks).await {
            if let Err(e) = result {
                warn!("Best-effort unlock on teardown failed: {}", e);
            }
        }
        info!("Teardown released {} seats", released.len());
        released
    }
}
