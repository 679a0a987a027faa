// Railway reference data: stations, lines and the advancement table

pub mod network;
pub mod types;

// Re-export commonly used types
pub use network::RailwayNetwork;
pub use types::{GeoPoint, Line, LineId, LineKind, Station, StationId};
