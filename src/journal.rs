// Exercise journal: one JSON line per completed exercise

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::TetsundoError;
use crate::progress::model::now_millis;
use crate::railway::StationId;
use crate::watch::{CompletionEvent, VideoId};

const JOURNAL_FILE_NAME: &str = "journal.jsonl";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseRecord {
    #[serde(with = "crate::progress::model::timestamp")]
    pub completed_at: DateTime<Utc>,
    pub video_id: VideoId,
    pub duration_seconds: f64,
    pub watch_time_seconds: u64,
    pub completion_rate: f64,
    /// Station the user moved to, `None` when already at the end of the line
    pub station_reached: Option<StationId>,
    pub total_exercises: u64,
}

impl ExerciseRecord {
    pub fn from_completion(
        event: &CompletionEvent,
        station_reached: Option<StationId>,
        total_exercises: u64,
    ) -> Self {
        Self {
            completed_at: now_millis(),
            video_id: event.video_id.clone(),
            duration_seconds: event.duration_seconds,
            watch_time_seconds: event.watch_time_seconds,
            completion_rate: event.completion_rate,
            station_reached,
            total_exercises,
        }
    }
}

/// Append-only log of completed exercises.
#[derive(Clone, Debug)]
pub struct ExerciseJournal {
    path: PathBuf,
}

impl ExerciseJournal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Journal file inside the given data directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(JOURNAL_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ExerciseRecord) -> Result<(), TetsundoError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TetsundoError::JournalError {
                path: self.path.clone(),
                source: e,
            })?;
        }
        serde_jsonlines::append_json_lines(&self.path, [record]).map_err(|e| {
            TetsundoError::JournalError {
                path: self.path.clone(),
                source: e,
            }
        })
    }

    /// Every record, oldest first. A missing journal is empty.
    pub fn entries(&self) -> Result<Vec<ExerciseRecord>, TetsundoError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        serde_jsonlines::json_lines(&self.path)
            .map_err(|e| TetsundoError::JournalError {
                path: self.path.clone(),
                source: e,
            })?
            .collect::<Result<Vec<ExerciseRecord>, std::io::Error>>()
            .map_err(|e| TetsundoError::JournalError {
                path: self.path.clone(),
                source: e,
            })
    }

    /// The `limit` most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ExerciseRecord>, TetsundoError> {
        let mut entries = self.entries()?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}
