use crate::config::{
    BACKOFF_BASE_SECS, BACKOFF_ERROR_THRESHOLD, BACKOFF_MAX_SECS, CACHE_MAX_ENTRIES,
    RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW_SECS, USER_AGENT,
};
use crate::errors::GatewayError;
use crate::models::{CacheEntry, RateLimitWindow, SharedState};
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request};
use hyper_rustls::HttpsConnector;
use serde_json::Value;
use std::time::{Duration, SystemTime};
use url::form_urlencoded;


pub type HttpClient = Client<HttpsConnector<HttpConnector>>;

/// hyper client with a connector that speaks both https (the real upstream)
/// and plain http (local mock upstreams in tests).
pub fn build_client() -> HttpClient {
    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder().build(https)
}

pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { reset_in: u64 },
}

/// Fixed-window check for one client key. An expired or missing window is
/// replaced with a fresh one at count 1; an active window at capacity
/// rejects without incrementing.
pub async fn check_rate_limit(state: &SharedState, client_key: &str) -> RateLimitDecision {
    let mut state = state.write().await;
    let now = SystemTime::now();

    if let Some(window) = state.rate_limits.get_mut(client_key) {
        if now < window.reset_time {
            if window.count >= RATE_LIMIT_MAX_REQUESTS {
                return RateLimitDecision::Limited {
                    reset_in: secs_until(now, window.reset_time),
                };
            }
            window.count += 1;
            return RateLimitDecision::Allowed {
                remaining: RATE_LIMIT_MAX_REQUESTS - window.count,
            };
        }
    }

    state.rate_limits.insert(
        client_key.to_string(),
        RateLimitWindow {
            count: 1,
            reset_time: now + Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        },
    );
    RateLimitDecision::Allowed {
        remaining: RATE_LIMIT_MAX_REQUESTS - 1,
    }
}

fn secs_until(now: SystemTime, deadline: SystemTime) -> u64 {
    deadline
        .duration_since(now)
        .map(|d| d.as_secs_f64().ceil() as u64)
        .unwrap_or(1)
        .max(1)
}

/// Canonical query string: form-urlencoded pairs with only the first value
/// kept per key, sorted by key. Used for both the upstream URL and the
/// cache key, so parameter order never splits the cache.
pub fn canonical_query(raw: &str) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        if !pairs.iter().any(|(k, _)| *k == *key) {
            pairs.push((key.into_owned(), value.into_owned()));
        }
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

pub async fn get_cached(state: &SharedState, cache_key: &str) -> Option<Value> {
    let state = state.read().await;
    let entry = state.cache.get(cache_key)?;
    if entry.is_valid(SystemTime::now()) {
        Some(entry.payload.clone())
    } else {
        None
    }
}

/// Stores a fresh payload, then sweeps expired entries once the map grows
/// past the ceiling. Valid entries are never removed, so the map can stay
/// above the ceiling when everything in it is still live.
pub async fn store_cached(state: &SharedState, cache_key: &str, payload: Value) {
    let mut state = state.write().await;
    state.cache.insert(cache_key.to_string(), CacheEntry::new(payload));

    if state.cache.len() > CACHE_MAX_ENTRIES {
        let now = SystemTime::now();
        state.cache.retain(|_, entry| entry.is_valid(now));
    }
}

/// Single GET against the upstream. No retries and no gateway-imposed
/// timeout; the connector's defaults apply.
pub async fn fetch_upstream(client: &HttpClient, url: &str) -> Result<Value, GatewayError> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(url)
        .header("user-agent", USER_AGENT)
        .header("accept", "application/json")
        .body(Body::empty())
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;

    let response = client
        .request(request)
        .await
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;

    let status = response.status();
    if status == hyper::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("60")
            .to_string();
        return Err(GatewayError::UpstreamRateLimited { retry_after });
    }

    if !status.is_success() {
        let body = match hyper::body::to_bytes(response.into_body()).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => "Unknown error".to_string(),
        };
        return Err(GatewayError::UpstreamStatus { status, body });
    }

    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::Upstream(format!("Invalid JSON from upstream: {}", e)))
}

/// Seconds left on the backoff suspension, or None when fetching is allowed.
pub async fn backoff_delay(state: &SharedState) -> Option<u64> {
    let state = state.read().await;
    let retry_at = state.backoff.retry_at?;
    let now = SystemTime::now();
    if now < retry_at {
        Some(secs_until(now, retry_at))
    } else {
        None
    }
}

/// Advances the backoff machine after an upstream attempt. Transport
/// failures, 5xx and upstream 429s count against it; anything else resets
/// it to normal.
pub async fn record_upstream_result(state: &SharedState, result: &Result<Value, GatewayError>) {
    let strained = match result {
        Ok(_) => false,
        Err(GatewayError::UpstreamRateLimited { .. }) | Err(GatewayError::Upstream(_)) => true,
        Err(GatewayError::UpstreamStatus { status, .. }) => status.is_server_error(),
        Err(_) => false,
    };

    let mut state = state.write().await;
    let backoff = &mut state.backoff;
    if !strained {
        backoff.consecutive_errors = 0;
        backoff.retry_at = None;
        return;
    }

    backoff.consecutive_errors += 1;
    if backoff.consecutive_errors >= BACKOFF_ERROR_THRESHOLD {
        let exponent = (backoff.consecutive_errors - BACKOFF_ERROR_THRESHOLD).min(5);
        let secs = (BACKOFF_BASE_SECS << exponent).min(BACKOFF_MAX_SECS);
        backoff.retry_at = Some(SystemTime::now() + Duration::from_secs(secs));
    }
}
