use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::CACHE_TTL_SECS;

pub type SharedState = Arc<RwLock<AppState>>;

/// A cached upstream payload. Entries are never refreshed in place; an
/// expired entry stays in the map until the lazy sweep removes it.
pub struct CacheEntry {
    pub payload: Value,
    pub stored_at: SystemTime,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            stored_at: SystemTime::now(),
            ttl: Duration::from_secs(CACHE_TTL_SECS),
        }
    }

    pub fn is_valid(&self, now: SystemTime) -> bool {
        match now.duration_since(self.stored_at) {
            Ok(age) => age < self.ttl,
            Err(_) => true, // stored_at in the future, clock went backwards
        }
    }
}

/// Fixed-window request counter for one client key. The window is replaced,
/// not merged, once `reset_time` passes.
pub struct RateLimitWindow {
    pub count: u32,
    pub reset_time: SystemTime,
}

/// Tracks consecutive upstream failures. Once the threshold is reached,
/// fetches are suspended until `retry_at`.
#[derive(Default)]
pub struct UpstreamBackoff {
    pub consecutive_errors: u32,
    pub retry_at: Option<SystemTime>,
}

pub struct AppState {
    pub cache: HashMap<String, CacheEntry>,
    pub rate_limits: HashMap<String, RateLimitWindow>,
    pub backoff: UpstreamBackoff,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            rate_limits: HashMap::new(),
            backoff: UpstreamBackoff::default(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire shape of every error response: `{ error, message?, resetIn?, retryAfter? }`.
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "resetIn", skip_serializing_if = "Option::is_none")]
    pub reset_in: Option<u64>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            reset_in: None,
            retry_after: None,
        }
    }
}
