// The persisted progress record

use chrono::{DateTime, SubsecRound, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::railway::{LineId, StationId};

/// Cumulative progress of one user.
///
/// Serialized as a flat JSON object with camelCase keys. Unknown keys are
/// ignored and missing keys take their defaults, so older or newer records
/// still load.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProgress {
    /// Insertion ordered, never holds the same station twice
    pub completed_stations: Vec<StationId>,
    pub current_station: Option<StationId>,
    pub current_line: Option<LineId>,
    pub total_exercises_completed: u64,
    #[serde(with = "timestamp")]
    pub last_updated: DateTime<Utc>,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            completed_stations: Vec::new(),
            current_station: None,
            current_line: None,
            total_exercises_completed: 0,
            last_updated: now_millis(),
        }
    }
}

impl UserProgress {
    /// Fresh progress positioned at the given station.
    pub fn starting_at(line: LineId, station: StationId) -> Self {
        Self {
            current_line: Some(line),
            current_station: Some(station),
            ..Self::default()
        }
    }

    pub fn has_completed(&self, station_id: &str) -> bool {
        self.completed_stations
            .iter()
            .any(|s| s.as_str() == station_id)
    }

    /// Add a station to the completed set. Returns `false` if it was already there.
    pub fn mark_completed(&mut self, station: StationId) -> bool {
        if self.has_completed(station.as_str()) {
            return false;
        }
        self.completed_stations.push(station);
        true
    }

    /// Drop duplicate completed stations a hand-edited record might contain.
    pub(crate) fn dedup_completed(&mut self) -> bool {
        let before = self.completed_stations.len();
        self.completed_stations = self.completed_stations.drain(..).unique().collect();
        before != self.completed_stations.len()
    }

    pub(crate) fn touch(&mut self) {
        self.last_updated = now_millis();
    }
}

/// Current time truncated to whole milliseconds, the precision of the stored record.
pub(crate) fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Timestamps are written as RFC 3339 strings with millisecond precision,
/// e.g. `2025-06-01T10:00:00.000Z`. Reading also accepts milliseconds since
/// the Unix epoch. Values of any other shape read as the epoch.
pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, TimeZone as _, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(parse(&value).unwrap_or_else(|| {
            log::debug!("unreadable timestamp {}, using epoch", value);
            DateTime::<Utc>::UNIX_EPOCH
        }))
    }

    fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|time| time.with_timezone(&Utc)),
            Value::Number(number) => number
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            _ => None,
        }
    }
}
