pub const REDDIT_BASE_URL: &str = "https://www.reddit.com";
pub const USER_AGENT: &str = "RedditTrendsBot/1.0 (by /u/RedditTrendsApp)";

pub const CACHE_TTL_SECS: u64 = 300; // 5 minutes
pub const CACHE_MAX_ENTRIES: usize = 100; // insert count that triggers the lazy sweep

pub const RATE_LIMIT_MAX_REQUESTS: u32 = 30; // requests per window
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60; // window size in seconds

pub const BACKOFF_ERROR_THRESHOLD: u32 = 3; // consecutive upstream failures before suspending
pub const BACKOFF_BASE_SECS: u64 = 2;
pub const BACKOFF_MAX_SECS: u64 = 60;
