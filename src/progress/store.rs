// Progress store: persistence plus the station advancement rule

use std::sync::Arc;

use crate::errors::TetsundoError;
use crate::railway::{Line, RailwayNetwork, Station};
use crate::report::{ErrorReporter, LogReporter};

use super::model::UserProgress;
use super::storage::ProgressStorage;

/// Storage key used when none is configured.
pub const DEFAULT_STORAGE_KEY: &str = "tetsundo_user_progress";

/// Single source of truth for a user's cumulative progress.
///
/// The store never returns an error for storage trouble. Failures go to the
/// injected [`ErrorReporter`] and the store carries on with in-memory state,
/// so an unreliable backend can't keep anyone from exercising.
///
/// One writer is assumed. Two stores over the same backend can lose updates
/// because `advance` is a plain read-modify-write.
pub struct ProgressStore<S: ProgressStorage> {
    storage: S,
    storage_key: String,
    network: Arc<RailwayNetwork>,
    reporter: Arc<dyn ErrorReporter>,
}

/// Where the user currently is, resolved against the reference data.
#[derive(Clone, Debug, PartialEq)]
pub struct CurrentStationInfo {
    pub line: Line,
    pub station: Station,
}

/// Dashboard view of the progress record.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressSummary {
    pub line: Line,
    pub current_station: Station,
    pub next_station: Option<Station>,
    /// Completed stations that belong to the current line
    pub completed_on_line: usize,
    pub total_completed_stations: usize,
    pub total_exercises_completed: u64,
    /// Share of the current line's stations completed, 0 to 100
    pub line_completion_pct: f64,
}

impl<S: ProgressStorage> ProgressStore<S> {
    pub fn new(storage: S, network: Arc<RailwayNetwork>) -> Self {
        Self {
            storage,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            network,
            reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn network(&self) -> &RailwayNetwork {
        &self.network
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Current progress. Bootstraps (and persists) a fresh record at the first
    /// station of the default line when nothing is stored yet.
    pub fn load(&mut self) -> UserProgress {
        let stored = match self.storage.read(&self.storage_key) {
            Ok(stored) => stored,
            Err(e) => {
                self.reporter.report("progress.load", &e);
                // nothing we can persist to either, stay in memory
                return self.bootstrap_record();
            }
        };

        let Some(content) = stored else {
            log::info!("No stored progress, starting at the default line");
            let mut progress = self.bootstrap_record();
            self.save(&mut progress);
            return progress;
        };

        match self.parse_record(&content) {
            Ok(progress) => self.normalize(progress),
            Err(e) => {
                self.reporter.report("progress.load", &e);
                match self.recover() {
                    Some(progress) => {
                        let mut progress = self.normalize(progress);
                        self.save(&mut progress);
                        progress
                    }
                    None => {
                        log::warn!("Progress record unrecoverable, using a fresh in-memory record");
                        self.bootstrap_record()
                    }
                }
            }
        }
    }

    /// Overwrite the stored record and stamp `last_updated`.
    pub fn save(&mut self, progress: &mut UserProgress) {
        progress.touch();

        let content = match serde_json::to_string(progress) {
            Ok(content) => content,
            Err(e) => {
                self.reporter
                    .report("progress.save", &TetsundoError::SerializeRecord { source: e });
                return;
            }
        };

        if let Err(e) = self.storage.write(&self.storage_key, &content) {
            self.reporter.report("progress.save", &e);
        }
    }

    /// Record one completed exercise and move to the next station.
    ///
    /// The current station is marked completed, the exercise counter always
    /// goes up by one, and the position moves along the current line when
    /// there is a next station. Returns that station, or `None` at the end of
    /// the line.
    pub fn advance(&mut self) -> Option<Station> {
        let mut progress = self.load();

        let (Some(line_id), Some(station_id)) =
            (progress.current_line.clone(), progress.current_station.clone())
        else {
            // load always positions the record, this only guards the type
            progress.total_exercises_completed += 1;
            self.save(&mut progress);
            return None;
        };

        progress.mark_completed(station_id.clone());

        let next = self
            .network
            .next_station_in_line(line_id.as_str(), station_id.as_str())
            .cloned();
        if let Some(ref next) = next {
            progress.current_station = Some(next.id.clone());
            log::info!(
                "Advanced on {} from {} to {}",
                line_id,
                station_id,
                next.id
            );
        } else {
            log::info!(
                "No station after {} on {}, exercise counted without moving",
                station_id,
                line_id
            );
        }

        progress.total_exercises_completed += 1;
        self.save(&mut progress);

        next
    }

    /// Clear all stored progress. The next `load` bootstraps again.
    pub fn reset(&mut self) {
        match self.storage.remove(&self.storage_key) {
            Ok(()) => log::info!("Progress reset"),
            Err(e) => self.reporter.report("progress.reset", &e),
        }
    }

    /// The station after `station_id` on `line_id`, if that line is wired for advancement.
    pub fn next_station_in_line(&self, line_id: &str, station_id: &str) -> Option<Station> {
        self.network
            .next_station_in_line(line_id, station_id)
            .cloned()
    }

    pub fn current_station_info(&mut self) -> CurrentStationInfo {
        let progress = self.load();
        self.resolve_position(&progress)
    }

    pub fn summary(&mut self) -> ProgressSummary {
        let progress = self.load();
        let CurrentStationInfo { line, station } = self.resolve_position(&progress);

        let completed_on_line = line
            .stations()
            .iter()
            .filter(|s| progress.has_completed(s.id.as_str()))
            .count();
        let line_completion_pct = completed_on_line as f64 / line.len() as f64 * 100.;
        let next_station = self
            .network
            .next_station_in_line(line.id().as_str(), station.id.as_str())
            .cloned();

        ProgressSummary {
            next_station,
            current_station: station,
            line,
            completed_on_line,
            total_completed_stations: progress.completed_stations.len(),
            total_exercises_completed: progress.total_exercises_completed,
            line_completion_pct,
        }
    }

    fn bootstrap_record(&self) -> UserProgress {
        let line = self.network.default_line();
        UserProgress::starting_at(line.id().clone(), line.first_station().id.clone())
    }

    fn parse_record(&self, content: &str) -> Result<UserProgress, TetsundoError> {
        serde_json::from_str(content).map_err(|e| TetsundoError::CorruptRecord {
            key: self.storage_key.clone(),
            source: e,
        })
    }

    /// Try the backup copy, then a light repair of the primary record.
    fn recover(&self) -> Option<UserProgress> {
        match self.storage.read_backup(&self.storage_key) {
            Ok(Some(backup)) => match self.parse_record(&backup) {
                Ok(progress) => {
                    log::info!("Recovered progress from backup");
                    return Some(progress);
                }
                Err(e) => log::warn!("Backup progress record unusable: {}", e),
            },
            Ok(None) => log::debug!("No backup progress record"),
            Err(e) => self.reporter.report("progress.recover", &e),
        }

        let content = self.storage.read(&self.storage_key).ok().flatten()?;
        let repaired = repair_json(&content);
        if repaired == content {
            return None;
        }
        let progress = self.parse_record(&repaired).ok()?;
        log::info!("Recovered progress after repairing the stored record");
        Some(progress)
    }

    /// Enforce the record invariants: positioned on a real station, no
    /// duplicate completions. Repairs are persisted.
    fn normalize(&mut self, mut progress: UserProgress) -> UserProgress {
        let mut dirty = progress.dedup_completed();

        let resolved = match (&progress.current_line, &progress.current_station) {
            (Some(line_id), Some(station_id)) => {
                if self
                    .network
                    .resolve_station(line_id.as_str(), station_id.as_str())
                    .is_none()
                {
                    self.reporter.report(
                        "progress.load",
                        &TetsundoError::UnknownStation {
                            line_id: line_id.to_string(),
                            station_id: station_id.to_string(),
                        },
                    );
                    false
                } else {
                    true
                }
            }
            _ => false,
        };

        if !resolved {
            let line = self.network.default_line();
            log::info!(
                "Positioning progress at {} on {}",
                line.first_station().id,
                line.id()
            );
            progress.current_line = Some(line.id().clone());
            progress.current_station = Some(line.first_station().id.clone());
            dirty = true;
        }

        if dirty {
            self.save(&mut progress);
        }
        progress
    }

    fn resolve_position(&self, progress: &UserProgress) -> CurrentStationInfo {
        let resolved = progress
            .current_line
            .as_ref()
            .zip(progress.current_station.as_ref())
            .and_then(|(line_id, station_id)| {
                let line = self.network.line(line_id.as_str())?;
                let station = line.station(station_id.as_str())?;
                Some((line.clone(), station.clone()))
            });

        match resolved {
            Some((line, station)) => CurrentStationInfo { line, station },
            None => {
                let line = self.network.default_line();
                CurrentStationInfo {
                    station: line.first_station().clone(),
                    line: line.clone(),
                }
            }
        }
    }
}

/// Basic repair for records damaged by hand edits or partial writes.
fn repair_json(content: &str) -> String {
    content
        .replace('\0', "")
        .replace('\r', "")
        .replace(",}", "}")
        .replace(",]", "]")
        .trim()
        .to_string()
}
