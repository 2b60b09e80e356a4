//! IconCache: асинхронная растеризация глифов с мемоизацией по (name, size, color).
//!
//! Параллельные запросы одного ключа ждут одну и ту же растеризацию
//! (`futures::future::Shared`). Неудача запоминается как пустой дескриптор,
//! рендер в этом случае выводит номер места текстом. Кеш живёт столько же,
//! сколько сеанс просмотра, и передаётся рендеру явно.

pub mod raster;
pub mod registry;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::IconError;
pub use raster::{Raster, Rgba};

pub const MIN_ICON_PX: u32 = 8;
pub const MAX_ICON_PX: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IconKey {
    pub name: String,
    pub size: u32,
    pub color: Rgba,
}

impl IconKey {
    /// Размер округляется вверх до степени двойки, чтобы мелкие изменения
    /// масштаба не порождали новых растеризаций.
    pub fn new(name: impl Into<String>, size: u32, color: Rgba) -> Self {
        Self { name: name.into(), size: size_bucket(size), color }
    }
}

pub fn size_bucket(size: u32) -> u32 {
    size.clamp(MIN_ICON_PX, MAX_ICON_PX).next_power_of_two()
}

/// `None` - растеризация не удалась.
pub type RasterHandle = Option<Arc<Raster>>;

type PendingRaster = Shared<BoxFuture<'static, RasterHandle>>;

#[derive(Clone)]
enum Slot {
    Ready(RasterHandle),
    Pending(PendingRaster),
}

#[derive(Clone, Default)]
pub struct IconCache {
    slots: Arc<Mutex<HashMap<IconKey, Slot>>>,
    rasterizations: Arc<AtomicU64>,
}

/// Синхронная растеризация глифа из реестра.
pub fn rasterize_icon(key: &IconKey) -> Result<Raster, IconError> {
    if key.size == 0 || key.size > MAX_ICON_PX {
        return Err(IconError::InvalidSize(key.size));
    }
    let glyph = registry::lookup(&key.name).ok_or_else(|| IconError::UnknownIcon(key.name.clone()))?;
    raster::rasterize(glyph, key.size, key.color)
        .map_err(|reason| IconError::InvalidPath { name: key.name.clone(), reason })
}

impl IconCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<IconKey, Slot>> {
        // Под мьютексом нет кода, который может запаниковать посреди изменения
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Готовый результат без ожидания. `None` - ключ ещё не растеризован.
    pub fn peek(&self, key: &IconKey) -> Option<RasterHandle> {
        match self.slots().get(key) {
            Some(Slot::Ready(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn is_pending(&self, key: &IconKey) -> bool {
        matches!(self.slots().get(key), Some(Slot::Pending(_)))
    }

    /// Сколько растеризаций реально запускалось.
    pub fn rasterizations(&self) -> u64 {
        self.rasterizations.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    pub async fn get_icon(&self, name: &str, size: u32, color: Rgba) -> RasterHandle {
        self.get(IconKey::new(name, size, color)).await
    }

    pub async fn get(&self, key: IconKey) -> RasterHandle {
        let pending = {
            let mut slots = self.slots();
            match slots.get(&key) {
                Some(Slot::Ready(handle)) => return handle.clone(),
                Some(Slot::Pending(fut)) => fut.clone(),
                None => {
                    let fut = self.spawn_rasterization(key.clone());
                    slots.insert(key.clone(), Slot::Pending(fut.clone()));
                    fut
                }
            }
        };

        let handle = pending.await;
        self.slots().insert(key, Slot::Ready(handle.clone()));
        handle
    }

    fn spawn_rasterization(&self, key: IconKey) -> PendingRaster {
        self.rasterizations.fetch_add(1, Ordering::Relaxed);
        async move {
            debug!("Rasterizing icon {} at {}px", key.name, key.size);
            let task_key = key.clone();
            let result = tokio::task::spawn_blocking(move || rasterize_icon(&task_key))
                .await
                .map_err(|e| IconError::TaskFailed(e.to_string()))
                .and_then(|r| r);
            match result {
                Ok(raster) => Some(Arc::new(raster)),
                Err(e) => {
                    warn!("Icon load failed, falling back to seat number: {}", e);
                    None
                }
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: Rgba = Rgba::new(30, 160, 90, 255);

    #[test]
    fn sizes_are_bucketed() {
        assert_eq!(size_bucket(1), 8);
        assert_eq!(size_bucket(20), 32);
        assert_eq!(size_bucket(32), 32);
        assert_eq!(size_bucket(5000), 128);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_rasterization() {
        let cache = IconCache::new();
        let (a, b, c) = tokio::join!(
            cache.get_icon("chair", 24, GREEN),
            cache.get_icon("chair", 30, GREEN),
            cache.get_icon("chair", 32, GREEN),
        );
        assert!(a.is_some());
        assert!(Arc::ptr_eq(a.as_ref().unwrap(), b.as_ref().unwrap()));
        assert!(Arc::ptr_eq(a.as_ref().unwrap(), c.as_ref().unwrap()));
        assert_eq!(cache.rasterizations(), 1);

        cache.get_icon("chair", 32, GREEN).await;
        assert_eq!(cache.rasterizations(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_rasterize_separately() {
        let cache = IconCache::new();
        cache.get_icon("sofa", 16, GREEN).await;
        cache.get_icon("sofa", 16, Rgba::new(0, 0, 0, 255)).await;
        cache.get_icon("sofa", 64, GREEN).await;
        assert_eq!(cache.rasterizations(), 3);
    }

    #[tokio::test]
    async fn unknown_icon_resolves_to_empty_handle() {
        let cache = IconCache::new();
        let key = IconKey::new("throne", 16, GREEN);
        assert_eq!(cache.peek(&key), None);
        assert!(cache.get(key.clone()).await.is_none());
        assert_eq!(cache.peek(&key), Some(None));
        // неудача тоже запоминается
        cache.get(key).await;
        assert_eq!(cache.rasterizations(), 1);
    }
}
