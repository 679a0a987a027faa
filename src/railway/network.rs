// Line table plus the per-line advancement wiring

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::errors::TetsundoError;

use super::types::{Line, LineId, Station};

const BUNDLED_NETWORK: &str = include_str!("../../data/lines.json");

#[derive(Serialize, Deserialize)]
struct NetworkRecord {
    default_line: LineId,
    #[serde(default)]
    advancement_lines: Vec<LineId>,
    lines: Vec<Line>,
}

/// Static railway reference data.
///
/// Every line is available for display, but only lines registered in the
/// advancement table take part in `next_station_in_line`. The default line is
/// always registered.
#[derive(Clone, Debug)]
pub struct RailwayNetwork {
    lines: Vec<Line>,
    default_line: LineId,
    advancement_lines: BTreeSet<LineId>,
}

impl RailwayNetwork {
    pub fn new(lines: Vec<Line>, default_line: impl Into<String>) -> Result<Self, TetsundoError> {
        let default_line = LineId::new(default_line);

        let mut seen = HashSet::new();
        for line in &lines {
            if !seen.insert(line.id().clone()) {
                return Err(TetsundoError::InvalidLine {
                    line_id: line.id().to_string(),
                    reason: "duplicate line id".to_string(),
                });
            }
        }
        if !seen.contains(&default_line) {
            return Err(TetsundoError::UnknownLine {
                line_id: default_line.to_string(),
            });
        }

        let mut advancement_lines = BTreeSet::new();
        advancement_lines.insert(default_line.clone());

        Ok(Self {
            lines,
            default_line,
            advancement_lines,
        })
    }

    /// The Tokyo network shipped with the crate.
    pub fn bundled() -> Result<Self, TetsundoError> {
        Self::from_json_str(BUNDLED_NETWORK)
    }

    pub fn from_json_str(json: &str) -> Result<Self, TetsundoError> {
        let record: NetworkRecord = serde_json::from_str(json)
            .map_err(|e| TetsundoError::NetworkParseError { source: e })?;

        let mut network = Self::new(record.lines, record.default_line.as_str())?;
        for line_id in record.advancement_lines {
            network.enable_advancement(line_id.as_str())?;
        }
        Ok(network)
    }

    pub fn from_file(path: &Path) -> Result<Self, TetsundoError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| TetsundoError::NetworkIOError {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::from_json_str(&content)
    }

    /// Register a line in the advancement table.
    pub fn enable_advancement(&mut self, line_id: &str) -> Result<(), TetsundoError> {
        let line = self.line(line_id).ok_or_else(|| TetsundoError::UnknownLine {
            line_id: line_id.to_string(),
        })?;
        let id = line.id().clone();
        self.advancement_lines.insert(id);
        Ok(())
    }

    pub fn with_advancement(mut self, line_id: &str) -> Result<Self, TetsundoError> {
        self.enable_advancement(line_id)?;
        Ok(self)
    }

    pub fn is_advancement_line(&self, line_id: &str) -> bool {
        self.advancement_lines
            .iter()
            .any(|id| id.as_str() == line_id)
    }

    pub fn advancement_lines(&self) -> impl Iterator<Item = &LineId> {
        self.advancement_lines.iter()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, line_id: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.id().as_str() == line_id)
    }

    pub fn default_line(&self) -> &Line {
        // presence checked in `new`
        self.line(self.default_line.as_str())
            .unwrap_or(&self.lines[0])
    }

    pub fn resolve_station(&self, line_id: &str, station_id: &str) -> Option<&Station> {
        self.line(line_id)?.station(station_id)
    }

    /// The station after `station_id` on `line_id`.
    ///
    /// Returns `None` when the station is the last one, when either id is
    /// unknown, or when the line is not part of the advancement table.
    pub fn next_station_in_line(&self, line_id: &str, station_id: &str) -> Option<&Station> {
        if !self.is_advancement_line(line_id) {
            log::debug!("line {} is not wired for advancement", line_id);
            return None;
        }
        self.line(line_id)?.station_after(station_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc_network() -> RailwayNetwork {
        let abc = Line::new(
            "abc",
            "ABC",
            vec![
                Station::new("a", "A", 1),
                Station::new("b", "B", 2),
                Station::new("c", "C", 3),
            ],
        )
        .unwrap();
        let xy = Line::new(
            "xy",
            "XY",
            vec![Station::new("x", "X", 1), Station::new("y", "Y", 2)],
        )
        .unwrap();
        RailwayNetwork::new(vec![abc, xy], "abc").unwrap()
    }

    #[test]
    fn test_bundled_network_loads() {
        let network = RailwayNetwork::bundled().unwrap();
        assert_eq!(network.lines().len(), 7);
        let yamanote = network.default_line();
        assert_eq!(yamanote.id().as_str(), "yamanote");
        assert_eq!(yamanote.len(), 29);
        assert_eq!(yamanote.first_station().id.as_str(), "tokyo");
        assert_eq!(yamanote.last_station().id.as_str(), "kanda");
        assert!(network.is_advancement_line("yamanote"));
        assert!(!network.is_advancement_line("ginza_line"));
    }

    #[test]
    fn test_next_station_only_on_advancement_lines() {
        let network = abc_network();
        assert_eq!(
            network.next_station_in_line("abc", "a").unwrap().id.as_str(),
            "b"
        );
        assert!(network.next_station_in_line("abc", "c").is_none());
        assert!(network.next_station_in_line("xy", "x").is_none());
        assert!(network.next_station_in_line("nope", "a").is_none());
    }

    #[test]
    fn test_enable_advancement() {
        let network = abc_network().with_advancement("xy").unwrap();
        assert_eq!(
            network.next_station_in_line("xy", "x").unwrap().id.as_str(),
            "y"
        );

        let mut network = abc_network();
        assert!(matches!(
            network.enable_advancement("missing"),
            Err(TetsundoError::UnknownLine { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_default_and_duplicate_lines() {
        let line = Line::new("abc", "ABC", vec![Station::new("a", "A", 1)]).unwrap();
        assert!(RailwayNetwork::new(vec![line.clone()], "other").is_err());
        assert!(RailwayNetwork::new(vec![line.clone(), line], "abc").is_err());
    }

    #[test]
    fn test_from_json_str_advancement_table() {
        let json = r#"{
            "default_line": "abc",
            "advancement_lines": ["xy"],
            "lines": [
                {"id": "abc", "display_name": "ABC", "stations": [
                    {"id": "a", "display_name": "A", "sequence_index": 1}
                ]},
                {"id": "xy", "display_name": "XY", "stations": [
                    {"id": "x", "display_name": "X", "sequence_index": 1},
                    {"id": "y", "display_name": "Y", "sequence_index": 2}
                ]}
            ]
        }"#;
        let network = RailwayNetwork::from_json_str(json).unwrap();
        assert!(network.is_advancement_line("abc"));
        assert!(network.is_advancement_line("xy"));
        assert_eq!(network.advancement_lines().count(), 2);
    }

    #[test]
    fn test_from_json_str_rejects_garbage() {
        assert!(matches!(
            RailwayNetwork::from_json_str("{not json"),
            Err(TetsundoError::NetworkParseError { .. })
        ));
    }
}
