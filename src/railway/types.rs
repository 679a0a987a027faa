// Core data structures for railway reference data

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::errors::TetsundoError;

/// Identifier of a station, unique within its line.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of a railway line.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Position of a station on the map, in decimal degrees.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Operator category, only used for display.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Jr,
    Private,
    Subway,
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineKind::Jr => write!(f, "JR"),
            LineKind::Private => write!(f, "Private"),
            LineKind::Subway => write!(f, "Subway"),
        }
    }
}

/// A single checkpoint along a line.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Station {
    pub id: StationId,
    pub display_name: String,
    /// 1-based position within the line
    pub sequence_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl Station {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, sequence_index: u32) -> Self {
        Self {
            id: StationId::new(id),
            display_name: display_name.into(),
            sequence_index,
            location: None,
        }
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = Some(GeoPoint {
            latitude,
            longitude,
        });
        self
    }
}

/// Raw form of a line as it appears in reference data files, before validation.
#[derive(Deserialize, Serialize)]
struct LineRecord {
    id: LineId,
    display_name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    operator: Option<String>,
    #[serde(default)]
    kind: Option<LineKind>,
    stations: Vec<Station>,
}

/// An ordered sequence of stations. Stations are always kept sorted by
/// `sequence_index`; ids and sequence indexes are unique.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "LineRecord", into = "LineRecord")]
pub struct Line {
    id: LineId,
    display_name: String,
    color: Option<String>,
    operator: Option<String>,
    kind: Option<LineKind>,
    stations: Vec<Station>,
}

impl Line {
    /// Build a validated line. Stations may be passed in any order.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        stations: Vec<Station>,
    ) -> Result<Self, TetsundoError> {
        Self::try_from(LineRecord {
            id: LineId::new(id),
            display_name: display_name.into(),
            color: None,
            operator: None,
            kind: None,
            stations,
        })
    }

    pub fn with_display(
        mut self,
        color: Option<String>,
        operator: Option<String>,
        kind: Option<LineKind>,
    ) -> Self {
        self.color = color;
        self.operator = operator;
        self.kind = kind;
        self
    }

    pub fn id(&self) -> &LineId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn operator(&self) -> Option<&str> {
        self.operator.as_deref()
    }

    pub fn kind(&self) -> Option<LineKind> {
        self.kind
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn first_station(&self) -> &Station {
        // validated non-empty on construction
        &self.stations[0]
    }

    pub fn last_station(&self) -> &Station {
        &self.stations[self.stations.len() - 1]
    }

    pub fn station(&self, station_id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id.as_str() == station_id)
    }

    pub fn contains(&self, station_id: &str) -> bool {
        self.station(station_id).is_some()
    }

    /// Station immediately after `station_id`, or `None` when the given
    /// station is the last one or is not on this line.
    pub fn station_after(&self, station_id: &str) -> Option<&Station> {
        let idx = self
            .stations
            .iter()
            .position(|s| s.id.as_str() == station_id)?;
        self.stations.get(idx + 1)
    }
}

impl TryFrom<LineRecord> for Line {
    type Error = TetsundoError;

    fn try_from(record: LineRecord) -> Result<Self, Self::Error> {
        let invalid = |reason: String| TetsundoError::InvalidLine {
            line_id: record.id.to_string(),
            reason,
        };

        if record.id.as_str().is_empty() {
            return Err(invalid("line id cannot be empty".to_string()));
        }
        if record.stations.is_empty() {
            return Err(invalid("line has no stations".to_string()));
        }

        let mut seen_ids = HashSet::new();
        let mut seen_indexes = HashSet::new();
        for station in &record.stations {
            if station.sequence_index == 0 {
                return Err(invalid(format!(
                    "station '{}' has sequence index 0, indexes start at 1",
                    station.id
                )));
            }
            if !seen_ids.insert(station.id.clone()) {
                return Err(invalid(format!("duplicate station id '{}'", station.id)));
            }
            if !seen_indexes.insert(station.sequence_index) {
                return Err(invalid(format!(
                    "duplicate sequence index {}",
                    station.sequence_index
                )));
            }
        }

        let mut stations = record.stations;
        stations.sort_by_key(|s| s.sequence_index);

        Ok(Self {
            id: record.id,
            display_name: record.display_name,
            color: record.color,
            operator: record.operator,
            kind: record.kind,
            stations,
        })
    }
}

impl From<Line> for LineRecord {
    fn from(line: Line) -> Self {
        Self {
            id: line.id,
            display_name: line.display_name,
            color: line.color,
            operator: line.operator,
            kind: line.kind,
            stations: line.stations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc_line() -> Line {
        Line::new(
            "test",
            "Test Line",
            vec![
                Station::new("c", "C", 3),
                Station::new("a", "A", 1),
                Station::new("b", "B", 2),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_stations_sorted_by_sequence_index() {
        let line = abc_line();
        let ids: Vec<&str> = line.stations().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(line.first_station().id.as_str(), "a");
        assert_eq!(line.last_station().id.as_str(), "c");
    }

    #[test]
    fn test_station_after() {
        let line = abc_line();
        assert_eq!(line.station_after("a").unwrap().id.as_str(), "b");
        assert_eq!(line.station_after("b").unwrap().id.as_str(), "c");
        assert!(line.station_after("c").is_none());
        assert!(line.station_after("missing").is_none());
    }

    #[test]
    fn test_rejects_duplicate_station_ids() {
        let result = Line::new(
            "dup",
            "Dup",
            vec![Station::new("a", "A", 1), Station::new("a", "A again", 2)],
        );
        assert!(matches!(result, Err(TetsundoError::InvalidLine { .. })));
    }

    #[test]
    fn test_rejects_duplicate_sequence_index() {
        let result = Line::new(
            "dup",
            "Dup",
            vec![Station::new("a", "A", 1), Station::new("b", "B", 1)],
        );
        assert!(matches!(result, Err(TetsundoError::InvalidLine { .. })));
    }

    #[test]
    fn test_rejects_zero_sequence_index_and_empty_line() {
        assert!(Line::new("z", "Z", vec![Station::new("a", "A", 0)]).is_err());
        assert!(Line::new("e", "Empty", Vec::new()).is_err());
    }

    #[test]
    fn test_deserialization_validates() {
        let json = r#"{
            "id": "bad",
            "display_name": "Bad",
            "stations": [
                {"id": "a", "display_name": "A", "sequence_index": 1},
                {"id": "a", "display_name": "A", "sequence_index": 2}
            ]
        }"#;
        assert!(serde_json::from_str::<Line>(json).is_err());

        let json = r##"{
            "id": "ok",
            "display_name": "Ok",
            "color": "#FF0000",
            "kind": "subway",
            "stations": [
                {"id": "b", "display_name": "B", "sequence_index": 2},
                {"id": "a", "display_name": "A", "sequence_index": 1,
                 "location": {"latitude": 35.0, "longitude": 139.0}}
            ]
        }"##;
        let line: Line = serde_json::from_str(json).unwrap();
        assert_eq!(line.first_station().id.as_str(), "a");
        assert_eq!(line.kind(), Some(LineKind::Subway));
        assert_eq!(line.color(), Some("#FF0000"));
        assert!(line.first_station().location.is_some());
    }
}
