pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use errors::GatewayError;
pub use models::{AppState, CacheEntry, RateLimitWindow, SharedState};
