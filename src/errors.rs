// Error types for tetsundo

use snafu::Snafu;
use std::{io, path::PathBuf};

#[derive(Debug, Snafu)]
pub enum TetsundoError {
    // Progress storage errors
    #[snafu(display("Progress storage is unavailable: {operation}"))]
    StorageUnavailable { operation: String, source: io::Error },
    #[snafu(display("Stored progress record '{key}' is corrupt"))]
    CorruptRecord {
        key: String,
        source: serde_json::Error,
    },
    #[snafu(display("Error serializing progress record"))]
    SerializeRecord { source: serde_json::Error },
    #[snafu(display("Could not find application data directory to store progress"))]
    NoDataDir,

    // Reference data errors
    #[snafu(display("Invalid line '{line_id}': {reason}"))]
    InvalidLine { line_id: String, reason: String },
    #[snafu(display("Unknown line '{line_id}'"))]
    UnknownLine { line_id: String },
    #[snafu(display("Station '{station_id}' does not belong to line '{line_id}'"))]
    UnknownStation { line_id: String, station_id: String },
    #[snafu(display("Error parsing railway reference data"))]
    NetworkParseError { source: serde_json::Error },
    #[snafu(display("Error reading railway reference data file {}", path.display()))]
    NetworkIOError { path: PathBuf, source: io::Error },

    // Playback errors
    #[snafu(display("Playback handle error: {description}"))]
    PlaybackHandleError { description: String },
    #[snafu(display("Not a recognised YouTube video URL: {url}"))]
    InvalidVideoUrl { url: String },

    // Config management errors
    #[snafu(display("Could not find application config directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // Exercise journal errors
    #[snafu(display("Error accessing exercise journal {}", path.display()))]
    JournalError { path: PathBuf, source: io::Error },

    // Video catalog errors
    #[snafu(display("YouTube API key is not configured"))]
    MissingApiKey,
    #[snafu(display("Video catalog request failed"))]
    CatalogRequestError { source: reqwest::Error },
    #[snafu(display("Video catalog returned no videos: {reason}"))]
    CatalogEmpty { reason: String },
    #[snafu(display("Could not start async runtime for catalog request"))]
    RuntimeError { source: io::Error },

    // Replay errors
    #[snafu(display("Invalid playback log: {}", path.display()))]
    InvalidPlaybackLog { path: PathBuf },
    #[snafu(display("Error reading playback log"))]
    PlaybackLogError { source: io::Error },

    // CLI input errors
    #[snafu(display("Invalid value for {field}: {reason}"))]
    InvalidUserInput { field: String, reason: String },
}
