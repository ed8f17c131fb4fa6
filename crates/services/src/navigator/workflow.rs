use std::sync::Arc;
use std::time::Duration;

use lesson_core::model::{Catalog, EngineSettings, LessonId};
use lesson_core::{CodeRunner, Grader, PrintSimulator, StrategyGrader, Verdict};

use super::service::{Advance, AdvanceOutcome, LessonNavigator, RunReport, RunTicket};
use crate::Clock;
use crate::error::NavigatorError;
use crate::events::{CompletionSink, NoopCompletionSink};
use crate::progress_service::ProgressService;

/// Orchestrates lesson opening, delayed runs, persisted advancing and
/// completion events around a `LessonNavigator`.
#[derive(Clone)]
pub struct LessonLoopService {
    clock: Clock,
    catalog: Arc<Catalog>,
    progress: Arc<ProgressService>,
    runner: Arc<dyn CodeRunner>,
    grader: Arc<dyn Grader>,
    completions: Arc<dyn CompletionSink>,
    run_delay: Duration,
}

impl LessonLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<Catalog>,
        progress: Arc<ProgressService>,
        settings: &EngineSettings,
    ) -> Self {
        let runner: Arc<dyn CodeRunner> = Arc::new(PrintSimulator::new());
        Self {
            clock,
            catalog,
            progress,
            grader: Arc::new(StrategyGrader::new(Arc::clone(&runner))),
            runner,
            completions: Arc::new(NoopCompletionSink),
            run_delay: settings.run_delay(),
        }
    }

    #[must_use]
    pub fn with_completion_sink(mut self, completions: Arc<dyn CompletionSink>) -> Self {
        self.completions = completions;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Open a lesson at its first incomplete step.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::Catalog` for an unknown lesson.
    pub async fn open_lesson(&self, lesson_id: LessonId) -> Result<LessonNavigator, NavigatorError> {
        let lesson = Arc::new(self.catalog.lesson(lesson_id)?.clone());
        let progress = self.progress.load_lesson(lesson_id).await;
        let navigator = LessonNavigator::new(lesson, progress);
        tracing::debug!(
            lesson_id = %lesson_id,
            step_index = navigator.current_index(),
            "opened lesson"
        );
        Ok(navigator)
    }

    async fn pause(&self) {
        if !self.run_delay.is_zero() {
            tokio::time::sleep(self.run_delay).await;
        }
    }

    /// Run the editor text after the configured delay and record the output.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError` if the step has no editor or a run is pending.
    pub async fn run_code(&self, navigator: &mut LessonNavigator) -> Result<RunReport, NavigatorError> {
        let ticket = navigator.begin_run()?;
        let in_flight = InFlight { navigator, ticket };
        self.pause().await;
        let output = self.runner.run(in_flight.ticket.code());
        let report = in_flight
            .navigator
            .finish_run(&in_flight.ticket, &output, self.grader.as_ref())?;
        tracing::debug!(
            lesson_id = %in_flight.navigator.lesson().id(),
            step_id = %report.step_id,
            passed = report.verdict.as_ref().map(Verdict::is_pass),
            "code run finished"
        );
        Ok(report)
    }

    /// Check a challenge answer after the configured delay.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError` on non-challenge steps or while a run is pending.
    pub async fn check_answer(&self, navigator: &mut LessonNavigator) -> Result<Verdict, NavigatorError> {
        let ticket = navigator.begin_check()?;
        let in_flight = InFlight { navigator, ticket };
        self.pause().await;
        let verdict = in_flight
            .navigator
            .finish_check(&in_flight.ticket, self.grader.as_ref())?;
        tracing::debug!(
            lesson_id = %in_flight.navigator.lesson().id(),
            step_id = %in_flight.ticket.step_id(),
            passed = verdict.is_pass(),
            "answer checked"
        );
        Ok(verdict)
    }

    /// Grade a quiz selection; no delay.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError` on non-quiz steps or an invalid index.
    pub fn select_option(
        &self,
        navigator: &mut LessonNavigator,
        index: usize,
    ) -> Result<Verdict, NavigatorError> {
        navigator.select_option(index, self.grader.as_ref())
    }

    /// Advance past the current step, persist its completion and publish the
    /// lesson-complete event when the last step is passed.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::GateClosed` if the step is not passed yet.
    pub async fn go_next(&self, navigator: &mut LessonNavigator) -> Result<Advance, NavigatorError> {
        let lesson_id = navigator.lesson().id();
        let advance = navigator.go_next(self.clock.now())?;
        self.progress
            .mark_complete(lesson_id, advance.completed_step)
            .await;

        if let AdvanceOutcome::Finished { event: Some(event) } = &advance.outcome {
            tracing::info!(lesson_id = %event.lesson_id, "lesson completed");
            self.completions.lesson_completed(event);
        }
        Ok(advance)
    }
}

/// Releases the navigator's pending ticket when a run future is dropped
/// during the delay. A redeemed ticket makes the release a no-op.
struct InFlight<'a> {
    navigator: &'a mut LessonNavigator,
    ticket: RunTicket,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.navigator.cancel_run(&self.ticket) {
            tracing::debug!(
                lesson_id = %self.navigator.lesson().id(),
                step_id = %self.ticket.step_id(),
                "abandoned pending run"
            );
        }
    }
}
