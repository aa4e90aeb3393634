//! Layer configuration
//!
//! Every option is optional when deserialised; missing fields take the
//! defaults from [`crate::constants`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CACHE_STORAGE_KEY, DEFAULT_CACHE_SWEEP_INTERVAL_MS, DEFAULT_CACHE_TTL_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_RETRY_DELAY_MS, DEFAULT_OFFLINE_QUEUE_CAPACITY, DEFAULT_RETRY_DELAY_MS,
};
use crate::errors::{Result, TetherError};

/// Options recognised by the resilient client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Retries after the initial attempt (0 disables retrying)
    pub max_retries: u32,
    /// Delay before the first retry
    pub retry_delay_ms: u64,
    /// Double the delay on every further retry
    pub exponential_backoff: bool,
    /// Ceiling applied to every retry delay
    pub max_retry_delay_ms: u64,
    /// Queue requests while offline instead of attempting them
    pub enable_offline_mode: bool,
    /// Cache successful GET responses
    pub enable_caching: bool,
    pub cache_ttl_ms: u64,
    pub cache_sweep_interval_ms: u64,
    /// Serve fallback payloads when nothing better is available
    pub enable_fallback_data: bool,
    pub offline_queue_capacity: usize,
    /// Durable-storage key holding the serialised cache
    pub storage_key: String,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            exponential_backoff: true,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
            enable_offline_mode: true,
            enable_caching: true,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            cache_sweep_interval_ms: DEFAULT_CACHE_SWEEP_INTERVAL_MS,
            enable_fallback_data: true,
            offline_queue_capacity: DEFAULT_OFFLINE_QUEUE_CAPACITY,
            storage_key: CACHE_STORAGE_KEY.to_string(),
        }
    }
}

impl ResilienceConfig {
    /// Check value constraints.
    ///
    /// # Errors
    /// Returns `TetherError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.retry_delay_ms == 0 {
            return Err(TetherError::Config("retry_delay_ms must be greater than 0".into()));
        }
        if self.max_retry_delay_ms < self.retry_delay_ms {
            return Err(TetherError::Config(format!(
                "max_retry_delay_ms ({}) must be at least retry_delay_ms ({})",
                self.max_retry_delay_ms, self.retry_delay_ms
            )));
        }
        if self.cache_ttl_ms == 0 {
            return Err(TetherError::Config("cache_ttl_ms must be greater than 0".into()));
        }
        if self.cache_sweep_interval_ms == 0 {
            return Err(TetherError::Config(
                "cache_sweep_interval_ms must be greater than 0".into(),
            ));
        }
        if self.offline_queue_capacity == 0 {
            return Err(TetherError::Config(
                "offline_queue_capacity must be greater than 0".into(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(TetherError::Config("storage_key must not be empty".into()));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.cache_sweep_interval_ms)
    }
}
