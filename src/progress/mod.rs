// Progress tracking: the persisted record, its storage backends and the store
// that applies the advancement rule

pub mod model;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use model::UserProgress;
pub use storage::{FileStorage, MemoryStorage, ProgressStorage};
pub use store::{CurrentStationInfo, DEFAULT_STORAGE_KEY, ProgressStore, ProgressSummary};
