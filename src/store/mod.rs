//! File-backed persistence: the generic [`ContentStore`] and the record
//! stores built on it.

pub mod content;
pub mod food;
pub mod users;

pub use content::ContentStore;
pub use food::{FoodDetails, FoodSearchStore, DEFAULT_SESSION};
pub use users::{UserRecord, UserStore, USER_ID_FIELD};
