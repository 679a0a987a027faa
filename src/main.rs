use std::{
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use chrono::Local;
use clap::{Parser, Subcommand, arg};
use tetsundo::{
    AppConfig, ExerciseJournal, ExerciseRecorder, LogReporter, PlayState, PlaybackEvent,
    ProgressStorage, ProgressStore, RailwayNetwork, TetsundoError, VideoId, WatchRatioMonitor,
    catalog::{self, YouTubeCatalog},
    progress::ProgressSummary,
    watch::{PlaybackLog, SimulatedPlayer, run_session},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Directory holding progress and the exercise journal
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    storage_key: Option<String>,

    /// Railway reference data file to use instead of the bundled lines
    #[arg(long, global = true)]
    network: Option<PathBuf>,

    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the current station and overall progress
    Status,
    /// Credit one exercise without watching a video
    Advance,
    /// Forget all progress
    Reset,
    /// List the lines, or the stations of one line
    Lines {
        #[arg(short, long)]
        line: Option<String>,
    },
    /// Show recent exercises
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Replay a recorded playback log
    Replay {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Watch a simulated video and credit it when enough was watched
    Simulate {
        #[arg(short, long)]
        url: String,

        /// Video length in seconds
        #[arg(short, long)]
        duration: f64,

        /// Playback speed multiplier
        #[arg(short, long, default_value_t = 1.0)]
        speed: f64,

        /// Stop watching at this position (seconds)
        #[arg(long)]
        stop_at: Option<f64>,
    },
    /// Suggest workout videos from the configured channel
    Recommend,
}

struct Context {
    config: AppConfig,
    /// `None` when the data directory is unusable and progress is kept in memory
    data_dir: Option<PathBuf>,
    store: ProgressStore<Box<dyn ProgressStorage>>,
}

impl Context {
    fn new(args: &Args) -> Result<Self, TetsundoError> {
        let mut config = match &args.config {
            Some(path) => AppConfig::from_path(path),
            None => AppConfig::from_local_file(),
        };
        if let Some(data_dir) = &args.data_dir {
            config.data_dir = Some(data_dir.clone());
        }
        if let Some(storage_key) = &args.storage_key {
            config.storage_key = storage_key.clone();
        }
        if let Some(network) = &args.network {
            config.network_file = Some(network.clone());
        }

        let network = match &config.network_file {
            Some(path) => RailwayNetwork::from_file(path)?,
            None => RailwayNetwork::bundled()?,
        };
        let reporter = Arc::new(LogReporter);
        let (storage, data_dir) = config.open_storage(reporter.as_ref());
        if data_dir.is_none() {
            eprintln!("Warning: the data directory is unavailable, progress will not be saved");
        }
        let store = ProgressStore::new(storage, Arc::new(network))
            .with_storage_key(config.storage_key.clone())
            .with_reporter(reporter);

        Ok(Self {
            config,
            data_dir,
            store,
        })
    }

    fn journal(&self) -> Option<ExerciseJournal> {
        self.data_dir
            .as_deref()
            .filter(|_| self.config.journal_enabled)
            .map(ExerciseJournal::in_dir)
    }
}

fn print_summary(summary: &ProgressSummary) {
    println!(
        "{} ({}): {}",
        summary.line.display_name(),
        summary.line.id(),
        summary.current_station.display_name
    );
    match &summary.next_station {
        Some(next) => println!("Next station: {}", next.display_name),
        None => println!("Next station: none, end of the line"),
    }
    println!(
        "Line progress: {}/{} stations ({:.1}%)",
        summary.completed_on_line,
        summary.line.len(),
        summary.line_completion_pct
    );
    println!(
        "Stations completed: {}, exercises completed: {}",
        summary.total_completed_stations, summary.total_exercises_completed
    );
}

fn status(ctx: &mut Context) -> Result<(), TetsundoError> {
    print_summary(&ctx.store.summary());
    if let Some(journal) = ctx.journal() {
        let recent = journal.recent(3)?;
        if !recent.is_empty() {
            println!("Recent exercises:");
            for record in recent {
                println!(
                    "  {} watched {}s ({:.0}%)",
                    record.video_id,
                    record.watch_time_seconds,
                    record.completion_rate * 100.
                );
            }
        }
    }
    Ok(())
}

fn advance(ctx: &mut Context) -> Result<(), TetsundoError> {
    match ctx.store.advance() {
        Some(station) => println!("Arrived at {}", station.display_name),
        None => println!("Exercise counted, already at the end of the line"),
    }
    print_summary(&ctx.store.summary());
    Ok(())
}

fn lines(ctx: &mut Context, line: Option<&str>) -> Result<(), TetsundoError> {
    let progress = ctx.store.load();
    let network = ctx.store.network();

    let Some(line_id) = line else {
        for line in network.lines() {
            let marker = if network.is_advancement_line(line.id().as_str()) {
                "*"
            } else {
                " "
            };
            println!(
                "{} {:<16} {} ({} stations)",
                marker,
                line.id(),
                line.display_name(),
                line.len()
            );
        }
        return Ok(());
    };

    let line = network
        .line(line_id)
        .ok_or_else(|| TetsundoError::UnknownLine {
            line_id: line_id.to_string(),
        })?;
    for station in line.stations() {
        let marker = if progress.current_station.as_ref() == Some(&station.id) {
            ">"
        } else if progress.has_completed(station.id.as_str()) {
            "x"
        } else {
            " "
        };
        println!(
            "{} {:>2} {}",
            marker, station.sequence_index, station.display_name
        );
    }
    Ok(())
}

fn history(ctx: &Context, limit: usize) -> Result<(), TetsundoError> {
    let Some(journal) = ctx.journal() else {
        println!("The exercise journal is disabled or unavailable");
        return Ok(());
    };
    for record in journal.recent(limit)? {
        println!(
            "{} {} {}s/{:.0}s station: {} total: {}",
            record
                .completed_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M"),
            record.video_id,
            record.watch_time_seconds,
            record.duration_seconds,
            record
                .station_reached
                .as_ref()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.total_exercises
        );
    }
    Ok(())
}

fn replay(ctx: &mut Context, input: &Path) -> Result<(), TetsundoError> {
    if !input.exists() {
        return Err(TetsundoError::InvalidPlaybackLog {
            path: input.to_path_buf(),
        });
    }
    let playback_log = PlaybackLog::from_file(input)?;
    let monitor_config = ctx.config.monitor_config();
    let journal = ctx.journal();

    let mut recorder = ExerciseRecorder::new(&mut ctx.store);
    if let Some(journal) = journal {
        recorder = recorder.with_journal(journal);
    }
    let mut monitor = WatchRatioMonitor::new(recorder).with_config(monitor_config);
    let report = playback_log.replay(&mut monitor)?;
    println!(
        "Replayed {} sessions, {} samples ({} skipped), {} exercises credited",
        report.sessions,
        report.samples,
        report.skipped_samples,
        report.completions.len()
    );
    for outcome in monitor.handler().outcomes() {
        match &outcome.next_station {
            Some(station) => println!("  {} -> {}", outcome.completion.video_id, station.display_name),
            None => println!("  {} -> end of the line", outcome.completion.video_id),
        }
    }
    Ok(())
}

fn simulate(
    ctx: &mut Context,
    url: &str,
    duration: f64,
    speed: f64,
    stop_at: Option<f64>,
) -> Result<(), TetsundoError> {
    let video_id = VideoId::parse(url)?;
    if !(duration.is_finite() && duration > 0.) {
        return Err(TetsundoError::InvalidUserInput {
            field: "duration".to_string(),
            reason: format!("{} is not a positive number of seconds", duration),
        });
    }
    if !(speed.is_finite() && speed > 0.) {
        return Err(TetsundoError::InvalidUserInput {
            field: "speed".to_string(),
            reason: format!("{} is not a positive multiplier", speed),
        });
    }
    let stop_at = stop_at.unwrap_or(duration).clamp(0., duration);
    let monitor_config = ctx.config.monitor_config();
    let journal = ctx.journal();

    let (events_tx, events_rx) = mpsc::channel();
    let interrupt_tx = events_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("Stopping...");
        let _ = interrupt_tx.send(PlaybackEvent::Teardown);
    }) {
        log::warn!("Could not set Ctrl-C handler: {}", e);
    }

    let ended = stop_at >= duration;
    // the clock starts before the timer below, so the playhead reaches
    // `stop_at` no later than the timer fires
    let mut player = SimulatedPlayer::realtime(duration, speed);
    let mut watch_for = Duration::from_secs_f64(stop_at / speed);
    if !ended {
        // hold at the stop point for two sample intervals before pausing
        player = player.holding_at(stop_at);
        watch_for += monitor_config.sample_interval * 2;
    }
    thread::spawn(move || {
        let _ = events_tx.send(PlaybackEvent::StateChanged(PlayState::Playing));
        thread::sleep(watch_for);
        let final_state = if ended {
            PlayState::Ended
        } else {
            PlayState::Paused
        };
        let _ = events_tx.send(PlaybackEvent::StateChanged(final_state));
        let _ = events_tx.send(PlaybackEvent::Teardown);
    });

    println!("Watching {} ({:.0}s at {}x)", video_id.watch_url(), duration, speed);

    let mut recorder = ExerciseRecorder::new(&mut ctx.store);
    if let Some(journal) = journal {
        recorder = recorder.with_journal(journal);
    }
    let mut monitor = WatchRatioMonitor::new(recorder).with_config(monitor_config);
    let outcome = run_session(&mut monitor, video_id, player, &events_rx);

    if let Some(session) = &outcome.session {
        println!(
            "Watched {:.1}% in {} samples",
            session.completion_ratio * 100.,
            session.samples_taken
        );
    }
    match monitor.handler().outcomes().first() {
        Some(exercise) => match &exercise.next_station {
            Some(station) => println!("Exercise complete, arrived at {}", station.display_name),
            None => println!("Exercise complete, already at the end of the line"),
        },
        None => println!("Not enough of the video was watched, no credit"),
    }
    Ok(())
}

fn recommend(ctx: &Context) -> Result<(), TetsundoError> {
    let catalog = YouTubeCatalog::new(
        ctx.config.youtube_api_key.clone(),
        ctx.config.youtube_channel_id.clone(),
    )
    .with_max_results(ctx.config.max_results);
    let recommendations = catalog::recommend(&catalog, ctx.config.recommendation_count);

    if let Some(message) = &recommendations.message {
        println!("{}", message);
    }
    for video in &recommendations.videos {
        println!(
            "{} [{}] {}",
            video.id.watch_url(),
            video.formatted_duration(),
            video.title
        );
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), TetsundoError> {
    let mut ctx = Context::new(args)?;
    match &args.command {
        Commands::Status => status(&mut ctx),
        Commands::Advance => advance(&mut ctx),
        Commands::Reset => {
            ctx.store.reset();
            println!("Progress reset");
            Ok(())
        }
        Commands::Lines { line } => lines(&mut ctx, line.as_deref()),
        Commands::History { limit } => history(&ctx, *limit),
        Commands::Replay { input } => replay(&mut ctx, input),
        Commands::Simulate {
            url,
            duration,
            speed,
            stop_at,
        } => simulate(&mut ctx, url, *duration, *speed, *stop_at),
        Commands::Recommend => recommend(&ctx),
    }
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    if !matches!(cli.command, Commands::Simulate { .. }) {
        if let Err(e) = ctrlc::set_handler(move || {
            println!("Exiting...");
            std::process::exit(0);
        }) {
            log::warn!("Could not set Ctrl-C handler: {}", e);
        }
    }

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
