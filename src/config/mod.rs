use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// Ошибка чтения конфигурации из окружения
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub seat_map_api: SeatMapApiConfig,
    pub lock: LockConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub interaction: InteractionConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: String,
}

// Внешний сервис схемы зала: снимок, блокировки, лента статусов
#[derive(Debug, Clone, Deserialize)]
pub struct SeatMapApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

// Настройки удержания мест
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// TTL по умолчанию, если сервис блокировок не прислал свой.
    pub hold_ttl_secs: u64,
    /// За сколько секунд до истечения предупреждать пользователя.
    pub hold_warning_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

// Жесты, масштаб и лимиты выбора
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionConfig {
    pub min_tap_px: f64,
    pub tap_slop_px: f64,
    pub max_zoom_ratio: f64,
    pub pan_margin_px: f64,
    pub wheel_zoom_step: f64,
    pub max_seats_per_ticket: u32,
    pub max_seats_total: u32,
}

impl LockConfig {
    pub fn hold_ttl(&self) -> Duration {
        Duration::from_secs(self.hold_ttl_secs)
    }

    pub fn hold_warning(&self) -> Duration {
        Duration::from_secs(self.hold_warning_secs)
    }
}

fn var_or(key: &'static str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", &defaults.app.host),
                port: parse_or("PORT", defaults.app.port)?,
                environment: var_or("ENVIRONMENT", &defaults.app.environment),
                rust_log: var_or("RUST_LOG", &defaults.app.rust_log),
                log_format: var_or("LOG_FORMAT", &defaults.app.log_format),
            },
            seat_map_api: SeatMapApiConfig {
                base_url: var_or("SEAT_MAP_API_URL", &defaults.seat_map_api.base_url),
                timeout_secs: parse_or("API_TIMEOUT_SECS", defaults.seat_map_api.timeout_secs)?,
                poll_interval_ms: parse_or(
                    "STATUS_POLL_INTERVAL_MS",
                    defaults.seat_map_api.poll_interval_ms,
                )?,
            },
            lock: LockConfig {
                hold_ttl_secs: parse_or("HOLD_TTL_SECS", defaults.lock.hold_ttl_secs)?,
                hold_warning_secs: parse_or("HOLD_WARNING_SECS", defaults.lock.hold_warning_secs)?,
                max_retries: parse_or("LOCK_MAX_RETRIES", defaults.lock.max_retries)?,
                retry_base_delay_ms: parse_or(
                    "LOCK_RETRY_BASE_DELAY_MS",
                    defaults.lock.retry_base_delay_ms,
                )?,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: parse_or(
                    "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                    defaults.circuit_breaker.failure_threshold,
                )?,
                timeout_seconds: parse_or(
                    "CIRCUIT_BREAKER_TIMEOUT_SECONDS",
                    defaults.circuit_breaker.timeout_seconds,
                )?,
            },
            interaction: InteractionConfig {
                min_tap_px: parse_or("MIN_TAP_PX", defaults.interaction.min_tap_px)?,
                tap_slop_px: parse_or("TAP_SLOP_PX", defaults.interaction.tap_slop_px)?,
                max_zoom_ratio: parse_or("MAX_ZOOM_RATIO", defaults.interaction.max_zoom_ratio)?,
                pan_margin_px: parse_or("PAN_MARGIN_PX", defaults.interaction.pan_margin_px)?,
                wheel_zoom_step: parse_or("WHEEL_ZOOM_STEP", defaults.interaction.wheel_zoom_step)?,
                max_seats_per_ticket: parse_or(
                    "MAX_SEATS_PER_TICKET",
                    defaults.interaction.max_seats_per_ticket,
                )?,
                max_seats_total: parse_or("MAX_SEATS_TOTAL", defaults.interaction.max_seats_total)?,
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app: AppConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                environment: "development".to_string(),
                rust_log: "seat_map=debug,tower_http=debug".to_string(),
                log_format: "text".to_string(),
            },
            seat_map_api: SeatMapApiConfig {
                base_url: "http://localhost:8080/api".to_string(),
                timeout_secs: 10,
                poll_interval_ms: 2000,
            },
            lock: LockConfig {
                hold_ttl_secs: 600,
                hold_warning_secs: 60,
                max_retries: 3,
                retry_base_delay_ms: 200,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 5,
                timeout_seconds: 30,
            },
            interaction: InteractionConfig {
                min_tap_px: 44.0,
                tap_slop_px: 8.0,
                max_zoom_ratio: 8.0,
                pan_margin_px: 48.0,
                wheel_zoom_step: 1.1,
                max_seats_per_ticket: 10,
                max_seats_total: 20,
            },
        }
    }
}
