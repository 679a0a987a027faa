// Integration tests: watch sessions driving station advancement

use std::io::Write;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};
use tetsundo::watch::{MonitorConfig, PlaybackLog, SessionEnd, SimulatedPlayer, run_session};
use tetsundo::{
    ExerciseJournal, ExerciseRecorder, FileStorage, PlayState, PlaybackEvent, ProgressStore,
    RailwayNetwork, VideoId, WatchRatioMonitor,
};

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        sample_interval: Duration::from_millis(5),
        ..MonitorConfig::default()
    }
}

fn bundled_store(dir: &TempDir) -> ProgressStore<FileStorage> {
    let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
    ProgressStore::new(storage, Arc::new(RailwayNetwork::bundled().unwrap()))
}

#[test]
fn test_live_session_credits_one_exercise() {
    let temp_dir = TempDir::new().unwrap();
    let journal = ExerciseJournal::in_dir(temp_dir.path());
    let mut store = bundled_store(&temp_dir);

    let (tx, rx) = mpsc::channel();
    let events = thread::spawn(move || {
        tx.send(PlaybackEvent::StateChanged(PlayState::Playing))
            .unwrap();
        thread::sleep(Duration::from_millis(200));
        tx.send(PlaybackEvent::StateChanged(PlayState::Ended)).unwrap();
        tx.send(PlaybackEvent::Teardown).unwrap();
    });

    // 600 seconds of video in a tenth of a second
    let player = SimulatedPlayer::realtime(600., 6000.);
    let video_id = VideoId::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();

    let outcomes = {
        let recorder = ExerciseRecorder::new(&mut store).with_journal(journal.clone());
        let mut monitor = WatchRatioMonitor::new(recorder).with_config(fast_config());
        let outcome = run_session(&mut monitor, video_id, player, &rx);

        assert_eq!(outcome.end, SessionEnd::Teardown);
        let completion = outcome.completion.unwrap();
        assert!(completion.watch_time_seconds >= 480);
        assert!(completion.completion_rate >= 0.8);
        assert!(!monitor.is_tracking());
        monitor.into_handler().into_outcomes()
    };
    events.join().unwrap();

    assert_eq!(outcomes.len(), 1);
    let progress = store.load();
    assert_eq!(progress.total_exercises_completed, 1);
    assert_eq!(progress.current_station.unwrap().as_str(), "yurakucho");
    assert_eq!(journal.entries().unwrap().len(), 1);
}

#[test]
fn test_session_paused_early_gives_no_credit() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = bundled_store(&temp_dir);

    let player = SimulatedPlayer::with_duration(600.);
    player.seek(300.);

    let (tx, rx) = mpsc::channel();
    tx.send(PlaybackEvent::StateChanged(PlayState::Playing))
        .unwrap();
    tx.send(PlaybackEvent::StateChanged(PlayState::Paused)).unwrap();
    drop(tx);

    {
        let recorder = ExerciseRecorder::new(&mut store);
        let mut monitor = WatchRatioMonitor::new(recorder).with_config(fast_config());
        let outcome = run_session(
            &mut monitor,
            VideoId::parse("dQw4w9WgXcQ").unwrap(),
            player,
            &rx,
        );
        assert_eq!(outcome.end, SessionEnd::Disconnected);
        assert!(outcome.completion.is_none());
        assert!(monitor.handler().outcomes().is_empty());
    }

    assert_eq!(store.load().total_exercises_completed, 0);
}

#[test]
fn test_replayed_log_advances_progress() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = bundled_store(&temp_dir);

    let mut file = NamedTempFile::new().unwrap();
    let lines = [
        r#"{"kind":"load","video":"https://youtu.be/dQw4w9WgXcQ"}"#,
        r#"{"kind":"ready","duration":600.0}"#,
        r#"{"kind":"state","state":"playing"}"#,
        r#"{"kind":"position","seconds":479.9}"#,
        r#"{"kind":"position","seconds":480.0}"#,
        r#"{"kind":"position","seconds":481.0}"#,
        r#"{"kind":"state","state":"ended"}"#,
        r#"{"kind":"load","video":"https://www.youtube.com/embed/M7lc1UVf-VE"}"#,
        r#"{"kind":"ready","duration":300.0}"#,
        r#"{"kind":"state","state":"playing"}"#,
        r#"{"kind":"position","seconds":100.0}"#,
        r#"{"kind":"state","state":"ended"}"#,
        r#"{"kind":"teardown"}"#,
    ];
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }

    let playback_log = PlaybackLog::from_file(file.path()).unwrap();
    let report = {
        let recorder = ExerciseRecorder::new(&mut store);
        let mut monitor = WatchRatioMonitor::new(recorder);
        playback_log.replay(&mut monitor).unwrap()
    };

    assert_eq!(report.sessions, 2);
    assert_eq!(report.completions.len(), 1);
    assert_eq!(report.completions[0].watch_time_seconds, 480);
    assert_eq!(report.completions[0].completion_rate, 0.8);

    let progress = store.load();
    assert_eq!(progress.total_exercises_completed, 1);
    assert_eq!(progress.completed_stations.len(), 1);
}

#[test]
fn test_pause_at_threshold_is_credited() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = bundled_store(&temp_dir);
    let config = fast_config();

    // 600 seconds at 6000x: the 480 s stop point is reached after 80ms
    let player = SimulatedPlayer::realtime(600., 6000.).holding_at(480.);
    let pause_after = Duration::from_secs_f64(480. / 6000.) + config.sample_interval * 10;

    let (tx, rx) = mpsc::channel();
    let events = thread::spawn(move || {
        tx.send(PlaybackEvent::StateChanged(PlayState::Playing))
            .unwrap();
        thread::sleep(pause_after);
        tx.send(PlaybackEvent::StateChanged(PlayState::Paused)).unwrap();
        tx.send(PlaybackEvent::Teardown).unwrap();
    });

    let completion = {
        let recorder = ExerciseRecorder::new(&mut store);
        let mut monitor = WatchRatioMonitor::new(recorder).with_config(config);
        let outcome = run_session(&mut monitor, VideoId::parse("dQw4w9WgXcQ").unwrap(), player, &rx);
        assert_eq!(outcome.end, SessionEnd::Teardown);
        outcome.completion
    };
    events.join().unwrap();

    let completion = completion.unwrap();
    assert_eq!(completion.watch_time_seconds, 480);
    assert_eq!(completion.completion_rate, 0.8);
    assert_eq!(store.load().total_exercises_completed, 1);
}
