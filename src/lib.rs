//! CleanBites: a food-label analysis backend.
//!
//! User profiles and per-session food submissions are kept as JSON
//! documents on disk. Analyses are produced by a Gemini completion call
//! routed through a persistent response cache keyed by a SHA-256 digest of
//! the prompt template and the food data, so repeat lookups of the same
//! product never reach the model twice.

pub mod analysis;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod providers;
pub mod store;

pub use analysis::Analyzer;
pub use cache::{CacheKey, CacheStats, ResponseCache};
pub use config::Config;
pub use error::{CleanBitesError, Result};
pub use providers::{CompletionClient, TextExtractor};
pub use store::{ContentStore, FoodDetails, FoodSearchStore, UserRecord, UserStore};
