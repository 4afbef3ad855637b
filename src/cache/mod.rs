//! Content-addressed AI response caching with JSON-per-key persistence.

pub mod key;
pub mod response_cache;

pub use key::CacheKey;
pub use response_cache::{CacheStats, ResponseCache};
