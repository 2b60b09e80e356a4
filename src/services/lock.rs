//! Клиент внешнего сервиса блокировок мест.
//!
//! Каждый вызов проходит через `CircuitBreaker`; сетевые сбои и ответы 5xx
//! повторяются с экспоненциальной задержкой, конфликт не повторяется никогда.

use futures::future::{BoxFuture, FutureExt};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use super::circuit_breaker::CircuitBreaker;
use crate::config::Config;
use crate::error::LockError;
use crate::models::{LockRequest, LockResponse, UnlockRequest};

/// Сервис блокировок, как его видит движок.
pub trait LockService: Send + Sync {
    fn lock(&self, request: LockRequest) -> BoxFuture<'_, Result<LockResponse, LockError>>;

    /// Best-effort: ошибка только логируется вызывающим.
    fn unlock(&self, request: UnlockRequest) -> BoxFuture<'_, Result<(), LockError>>;
}

#[derive(Clone)]
pub struct HttpLockClient {
    base_url: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpLockClient {
    pub fn from_config(config: &Config) -> Result<Self, LockError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.seat_map_api.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.seat_map_api.base_url.trim_end_matches('/').to_string(),
            http_client,
            circuit_breaker: Arc::new(CircuitBreaker::new(
                config.circuit_breaker.failure_threshold,
                config.circuit_breaker.timeout_seconds,
            )),
            max_retries: config.lock.max_retries,
            retry_base_delay: Duration::from_millis(config.lock.retry_base_delay_ms),
        })
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay.saturating_mul(1u32 << attempt.min(10))
    }

    /// Повторяет операцию, пока она не удастся или ошибка не станет окончательной.
    ///
    /// Выключатель считает логические запросы: исчерпанные повторы - одна неудача.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, LockError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LockError>>,
    {
        let attempts = self.max_retries + 1;
        for attempt in 0..attempts {
            if !self.circuit_breaker.can_execute() {
                warn!("Circuit breaker is OPEN - blocking {} request", what);
                return Err(LockError::CircuitOpen);
            }

            match operation().await {
                Ok(value) => {
                    self.circuit_breaker.record_success();
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    if attempt + 1 < attempts {
                        let delay = self.backoff(attempt);
                        warn!("{} attempt {} failed: {}; retrying in {:?}", what, attempt + 1, e, delay);
                        tokio::time::sleep(delay).await;
                    } else {
                        error!("{} failed after {} attempts: {}", what, attempts, e);
                    }
                }
                // Конфликт - ответ сервиса, а не его сбой
                Err(e) => {
                    self.circuit_breaker.record_success();
                    return Err(e);
                }
            }
        }
        self.circuit_breaker.record_failure();
        Err(LockError::Timeout { attempts })
    }

    async fn post_lock(&self, request: &LockRequest) -> Result<LockResponse, LockError> {
        let response = self
            .http_client
            .post(format!("{}/locks", self.base_url))
            .json(request)
            .send()
            .await?;
        let status = response.status();
        match status {
            s if s.is_success() => Ok(response.json::<LockResponse>().await?),
            StatusCode::CONFLICT => {
                // Сервис может прислать свой взгляд на занятые места
                let body = response.text().await?;
                match serde_json::from_str::<LockResponse>(&body) {
                    Ok(parsed) if !parsed.rejected.is_empty() => Ok(parsed),
                    _ => Err(LockError::Conflict(request.seat_ids.clone())),
                }
            }
            s => Err(LockError::InvalidResponse {
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn post_unlock(&self, request: &UnlockRequest) -> Result<(), LockError> {
        let response = self
            .http_client
            .post(format!("{}/locks/release", self.base_url))
            .json(request)
            .send()
            .await?;
        let status = response.status();
        // Уже снятая блокировка - тоже успех
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(LockError::InvalidResponse {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

impl LockService for HttpLockClient {
    fn lock(&self, request: LockRequest) -> BoxFuture<'_, Result<LockResponse, LockError>> {
        async move {
            debug!("Locking seats {:?} for user {}", request.seat_ids, request.user_id);
            let response = self.with_retry("lock", || self.post_lock(&request)).await?;
            info!(
                "Lock for event {}: {} granted, {} rejected",
                request.event_id,
                response.granted.len(),
                response.rejected.len()
            );
            Ok(response)
        }
        .boxed()
    }

    fn unlock(&self, request: UnlockRequest) -> BoxFuture<'_, Result<(), LockError>> {
        async move {
            self.with_retry("unlock", || self.post_unlock(&request)).await?;
            info!("Released seats {:?} for user {}", request.seat_ids, request.user_id);
            Ok(())
        }
        .boxed()
    }
}
