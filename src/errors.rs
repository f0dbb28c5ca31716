use std::fmt;
use hyper::StatusCode;

#[derive(Debug)]
pub enum GatewayError {
    MethodNotAllowed,
    InvalidPath,
    /// Local per-client quota exhausted; `reset_in` is whole seconds until
    /// the window turns over.
    RateLimited { reset_in: u64 },
    /// Reddit answered 429, or the backoff gate is suspended. `retry_after`
    /// is kept as a string because it is relayed verbatim from the upstream
    /// `retry-after` header.
    UpstreamRateLimited { retry_after: String },
    /// Any other non-success upstream status, relayed as-is with the body text.
    UpstreamStatus { status: StatusCode, body: String },
    /// Transport failure, malformed upstream JSON, request build failure.
    Upstream(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MethodNotAllowed => write!(f, "Method not allowed"),
            Self::InvalidPath => write!(f, "Invalid path"),
            Self::RateLimited { reset_in } => {
                write!(f, "Rate limit exceeded, resets in {}s", reset_in)
            }
            Self::UpstreamRateLimited { retry_after } => {
                write!(f, "Reddit API rate limit exceeded, retry after {}s", retry_after)
            }
            Self::UpstreamStatus { status, .. } => {
                write!(f, "Reddit API error: {}", status)
            }
            Self::Upstream(e) => write!(f, "Upstream error: {}", e),
        }
    }
}

impl warp::reject::Reject for GatewayError {}
