// Turns completed watch sessions into station advancement

use std::sync::Arc;

use crate::journal::{ExerciseJournal, ExerciseRecord};
use crate::progress::{ProgressStorage, ProgressStore};
use crate::railway::Station;
use crate::report::{ErrorReporter, LogReporter};
use crate::watch::{CompletionEvent, CompletionHandler};

/// What one credited exercise did to the user's progress.
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseOutcome {
    pub completion: CompletionEvent,
    /// `None` when the user was already at the end of the line
    pub next_station: Option<Station>,
    pub total_exercises_completed: u64,
}

/// Completion handler that advances the store and journals the exercise.
pub struct ExerciseRecorder<'a, S: ProgressStorage> {
    store: &'a mut ProgressStore<S>,
    journal: Option<ExerciseJournal>,
    reporter: Arc<dyn ErrorReporter>,
    outcomes: Vec<ExerciseOutcome>,
}

impl<'a, S: ProgressStorage> ExerciseRecorder<'a, S> {
    pub fn new(store: &'a mut ProgressStore<S>) -> Self {
        Self {
            store,
            journal: None,
            reporter: Arc::new(LogReporter),
            outcomes: Vec::new(),
        }
    }

    pub fn with_journal(mut self, journal: ExerciseJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn outcomes(&self) -> &[ExerciseOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<ExerciseOutcome> {
        self.outcomes
    }
}

impl<S: ProgressStorage> CompletionHandler for ExerciseRecorder<'_, S> {
    fn on_complete(&mut self, event: &CompletionEvent) {
        let next_station = self.store.advance();
        let total_exercises_completed = self.store.load().total_exercises_completed;

        match &next_station {
            Some(station) => log::info!("Exercise done, arrived at {}", station.display_name),
            None => log::info!("Exercise done, already at the end of the line"),
        }

        if let Some(journal) = &self.journal {
            let record = ExerciseRecord::from_completion(
                event,
                next_station.as_ref().map(|s| s.id.clone()),
                total_exercises_completed,
            );
            if let Err(e) = journal.append(&record) {
                self.reporter.report("exercise.journal", &e);
            }
        }

        self.outcomes.push(ExerciseOutcome {
            completion: event.clone(),
            next_station,
            total_exercises_completed,
        });
    }
}
