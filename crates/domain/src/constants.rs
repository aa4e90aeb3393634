//! Layer constants
//!
//! Defaults mirror the recognised configuration options; see
//! [`crate::ResilienceConfig`].

// Retry defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 30_000;

// Cache defaults
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
pub const DEFAULT_CACHE_SWEEP_INTERVAL_MS: u64 = 60_000;

// Offline queue
pub const DEFAULT_OFFLINE_QUEUE_CAPACITY: usize = 256;

// Durable storage
pub const CACHE_STORAGE_KEY: &str = "tether.response_cache";
pub const CACHE_SCHEMA_VERSION: u32 = 1;

// Fallback data
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Data temporarily unavailable";
pub const FALLBACK_MESSAGE_FIELD: &str = "message";
