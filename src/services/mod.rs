pub mod circuit_breaker;
pub mod expiry;
pub mod lock;
pub mod snapshot;
pub mod status_feed;
