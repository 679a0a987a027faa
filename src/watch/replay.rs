// Replays a recorded playback log through a monitor.
//
// Each line of the log is one JSON record tagged by `kind`:
//
//   {"kind":"load","video":"https://youtu.be/dQw4w9WgXcQ"}
//   {"kind":"ready","duration":600.0}
//   {"kind":"state","state":"playing"}
//   {"kind":"position","seconds":481.2}
//   {"kind":"fault","count":1}
//   {"kind":"teardown"}
//
// A `position` record moves the playhead and takes one sample, standing in
// for a tick of the live sampler.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::TetsundoError;

use super::{
    CompletionEvent, CompletionHandler, PlayState, SampleOutcome, SimulatedPlayer, VideoId,
    WatchRatioMonitor,
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlaybackRecord {
    Load { video: String },
    Ready { duration: f64 },
    State { state: PlayState },
    Position { seconds: f64 },
    Fault {
        #[serde(default = "default_fault_count")]
        count: u32,
    },
    Teardown,
}

fn default_fault_count() -> u32 {
    1
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayReport {
    pub sessions: usize,
    pub samples: usize,
    pub skipped_samples: usize,
    pub completions: Vec<CompletionEvent>,
}

#[derive(Clone, Debug, Default)]
pub struct PlaybackLog {
    records: Vec<PlaybackRecord>,
}

impl PlaybackLog {
    pub fn from_records(records: Vec<PlaybackRecord>) -> Self {
        Self { records }
    }

    /// Load a playback log from a JSON Lines file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a line does not parse, or
    /// the log holds no records.
    pub fn from_file(path: &Path) -> Result<Self, TetsundoError> {
        let records = serde_jsonlines::json_lines(path)
            .map_err(|e| TetsundoError::PlaybackLogError { source: e })?
            .collect::<Result<Vec<PlaybackRecord>, std::io::Error>>()
            .map_err(|e| TetsundoError::PlaybackLogError { source: e })?;

        if records.is_empty() {
            return Err(TetsundoError::InvalidPlaybackLog {
                path: path.to_path_buf(),
            });
        }
        log::debug!("Loaded {} playback records from {:?}", records.len(), path);
        Ok(Self { records })
    }

    pub fn records(&self) -> &[PlaybackRecord] {
        &self.records
    }

    /// Feed every record to `monitor`. Records that need a loaded video are
    /// ignored when none is loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if a `load` record does not name a YouTube video.
    pub fn replay<H: CompletionHandler>(
        &self,
        monitor: &mut WatchRatioMonitor<H>,
    ) -> Result<ReplayReport, TetsundoError> {
        let mut report = ReplayReport::default();
        let mut player: Option<SimulatedPlayer> = None;

        for (line, record) in self.records.iter().enumerate() {
            if let PlaybackRecord::Load { video } = record {
                let video_id = VideoId::parse(video)?;
                let loaded = SimulatedPlayer::new();
                monitor.start_tracking(video_id, loaded.clone());
                player = Some(loaded);
                report.sessions += 1;
                continue;
            }

            let Some(current) = player.as_ref() else {
                log::warn!("Playback record {} ignored, no video loaded: {:?}", line + 1, record);
                continue;
            };

            match record {
                PlaybackRecord::Load { .. } => {}
                PlaybackRecord::Ready { duration } => current.set_duration(*duration),
                PlaybackRecord::State { state } => {
                    if let Some(event) = monitor.on_play_state(*state) {
                        report.completions.push(event);
                    }
                }
                PlaybackRecord::Position { seconds } => {
                    current.seek(*seconds);
                    match monitor.sample() {
                        SampleOutcome::Completed(event) => {
                            report.samples += 1;
                            report.completions.push(event);
                        }
                        SampleOutcome::Sampled { .. } => report.samples += 1,
                        SampleOutcome::Skipped => report.skipped_samples += 1,
                        SampleOutcome::Idle | SampleOutcome::Inert => {}
                    }
                }
                PlaybackRecord::Fault { count } => current.fail_next_queries(*count),
                PlaybackRecord::Teardown => {
                    current.destroy();
                    monitor.stop_tracking();
                    player = None;
                }
            }
        }

        // a log that stops mid-video still tears its session down
        monitor.stop_tracking();
        Ok(report)
    }
}
