use std::convert::Infallible;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, HeaderMap, Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use crate::config::RATE_LIMIT_MAX_REQUESTS;
use crate::errors::GatewayError;
use crate::middleware::{add_cors_headers, client_key};
use crate::models::{ErrorBody, SharedState};
use crate::services::{
    backoff_delay, canonical_query, check_rate_limit, fetch_upstream, get_cached,
    record_upstream_result, store_cached, HttpClient, RateLimitDecision,
};


/// The full request pipeline: preflight, method guard, rate limit, path
/// validation, cache lookup, upstream fetch, cache store. Every policy
/// rejection comes back as a `GatewayError` for `handle_rejection` to shape.
pub async fn proxy_request(
    method: Method,
    headers: HeaderMap,
    tail: &str,
    raw_query: &str,
    state: &SharedState,
    client: &HttpClient,
    upstream_base: &str,
) -> Result<Response<Body>, GatewayError> {
    if method == Method::OPTIONS {
        return Ok(preflight_response());
    }
    if method != Method::GET {
        return Err(GatewayError::MethodNotAllowed);
    }

    let client_key = client_key(&headers);
    let remaining = match check_rate_limit(state, &client_key).await {
        RateLimitDecision::Allowed { remaining } => remaining,
        RateLimitDecision::Limited { reset_in } => {
            return Err(GatewayError::RateLimited { reset_in });
        }
    };

    let path = tail.trim_matches('/');
    if path.is_empty() {
        return Err(GatewayError::InvalidPath);
    }
    let reddit_path = format!("/{}", path);

    let query = canonical_query(raw_query);
    let cache_key = format!("{}?{}", reddit_path, query);

    if let Some(payload) = get_cached(state, &cache_key).await {
        println!("Cache hit for: {}", cache_key);
        return Ok(cached_response(&payload));
    }

    if let Some(secs) = backoff_delay(state).await {
        return Err(GatewayError::UpstreamRateLimited {
            retry_after: secs.to_string(),
        });
    }

    let url = if query.is_empty() {
        format!("{}{}", upstream_base, reddit_path)
    } else {
        format!("{}{}?{}", upstream_base, reddit_path, query)
    };
    println!("Fetching from Reddit: {}", url);

    let result = fetch_upstream(client, &url).await;
    record_upstream_result(state, &result).await;
    let payload = result?;

    store_cached(state, &cache_key, payload.clone()).await;
    Ok(success_response(&payload, remaining))
}

pub fn preflight_response() -> Response<Body> {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .body(Body::empty())
        .unwrap();
    add_cors_headers(response.headers_mut());
    response
}

/// Cache hits carry the public cache directive but not the rate-limit
/// headers; only fresh fetches report the window.
pub fn cached_response(payload: &Value) -> Response<Body> {
    let mut response = json_response(StatusCode::OK, payload);
    response.headers_mut().insert(
        "cache-control",
        hyper::header::HeaderValue::from_static("public, max-age=300"),
    );
    response
}

pub fn success_response(payload: &Value, remaining: u32) -> Response<Body> {
    let mut response = cached_response(payload);
    let headers = response.headers_mut();
    headers.insert(
        "x-ratelimit-limit",
        hyper::header::HeaderValue::from(RATE_LIMIT_MAX_REQUESTS),
    );
    headers.insert(
        "x-ratelimit-remaining",
        hyper::header::HeaderValue::from(remaining),
    );
    response
}

pub fn error_response(error: &GatewayError) -> Response<Body> {
    let (status, body) = match error {
        GatewayError::MethodNotAllowed => {
            (StatusCode::METHOD_NOT_ALLOWED, ErrorBody::new("Method not allowed"))
        }
        GatewayError::InvalidPath => (StatusCode::BAD_REQUEST, ErrorBody::new("Invalid path")),
        GatewayError::RateLimited { reset_in } => {
            let mut body = ErrorBody::new("Rate limit exceeded");
            body.reset_in = Some(*reset_in);
            body.message = Some(format!(
                "Too many requests. Try again in {} seconds.",
                reset_in
            ));
            (StatusCode::TOO_MANY_REQUESTS, body)
        }
        GatewayError::UpstreamRateLimited { retry_after } => {
            let mut body = ErrorBody::new("Reddit API rate limit exceeded");
            body.message = Some(
                "Reddit is temporarily limiting requests. Please try again later.".to_string(),
            );
            body.retry_after = Some(retry_after.clone());
            (StatusCode::TOO_MANY_REQUESTS, body)
        }
        GatewayError::UpstreamStatus { status, body: text } => {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            let mut body = ErrorBody::new(format!(
                "Reddit API error: {} {}",
                status.as_u16(),
                reason
            ));
            body.message = Some(text.clone());
            (*status, body)
        }
        GatewayError::Upstream(message) => {
            let mut body = ErrorBody::new("Internal server error");
            body.message = Some(message.clone());
            (StatusCode::INTERNAL_SERVER_ERROR, body)
        }
    };
    json_response(status, &body)
}

pub async fn handle_rejection(err: warp::Rejection) -> Result<Response<Body>, Infallible> {
    if let Some(error) = err.find::<GatewayError>() {
        eprintln!("Request rejected: {}", error);
        return Ok(error_response(error));
    }

    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let body = ErrorBody::new(status.canonical_reason().unwrap_or("Internal server error"));
    Ok(json_response(status, &body))
}

fn json_response(status: StatusCode, body: &impl Serialize) -> Response<Body> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let mut response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .unwrap();
    add_cors_headers(response.headers_mut());
    response
}
