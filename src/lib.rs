// Library interface for tetsundo
// This allows integration tests and benches to access internal modules

pub mod catalog;
pub mod config;
pub mod errors;
pub mod exercise;
pub mod journal;
pub mod progress;
pub mod railway;
pub mod report;
pub mod watch;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::TetsundoError;
pub use exercise::{ExerciseOutcome, ExerciseRecorder};
pub use journal::{ExerciseJournal, ExerciseRecord};
pub use progress::{FileStorage, MemoryStorage, ProgressStorage, ProgressStore, UserProgress};
pub use railway::{Line, LineId, RailwayNetwork, Station, StationId};
pub use report::{ErrorReporter, LogReporter, RecordingReporter};
pub use watch::{
    CompletionEvent, CompletionHandler, PlayState, PlaybackEvent, PlaybackHandle, VideoId,
    WatchRatioMonitor,
};
