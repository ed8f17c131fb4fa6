use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use lesson_core::model::{
    DisplayFlags, Lesson, LessonCompleted, LessonProgress, SessionState, Step, StepAttempt, StepId,
    StepKind,
};
use lesson_core::{Attempt, Grader, Mismatch, RunOutput, Verdict};

use super::progress::NavigatorProgress;
use crate::error::{GateReason, NavigatorError};

//
// ─── RUN TICKETS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPurpose {
    /// Execute the editor text and show its output.
    Run,
    /// Grade the editor text of a challenge.
    Check,
}

/// Handle for a run or check in flight. Redeeming it after the learner has
/// left the step fails with `NavigatorError::StaleRun`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTicket {
    id: u64,
    purpose: RunPurpose,
    step_index: usize,
    step_id: StepId,
    code: String,
}

impl RunTicket {
    #[must_use]
    pub fn purpose(&self) -> RunPurpose {
        self.purpose
    }

    #[must_use]
    pub fn step_id(&self) -> StepId {
        self.step_id
    }

    /// Editor text captured when the ticket was issued.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub step_id: StepId,
    pub output: String,
    /// `None` when the step has nothing to compare a run against.
    pub verdict: Option<Verdict>,
}

//
// ─── ADVANCING ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved { index: usize },
    /// Passed the last step. The event is only present the first time per
    /// visit of the last step.
    Finished { event: Option<LessonCompleted> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub completed_step: StepId,
    /// `false` if the step had already been completed before.
    pub newly_completed: bool,
    pub outcome: AdvanceOutcome,
}

//
// ─── NAVIGATOR ─────────────────────────────────────────────────────────────────
//

/// In-memory walk through one lesson.
///
/// Owns the transient session state. Persistence and completion events are
/// handled by `LessonLoopService`; this type only reports what changed.
pub struct LessonNavigator {
    lesson: Arc<Lesson>,
    progress: LessonProgress,
    current: usize,
    state: SessionState,
    completion_sent: bool,
    pending: Option<u64>,
    next_ticket: u64,
}

impl LessonNavigator {
    /// Open `lesson` at its first incomplete step, or the first step if all
    /// are complete.
    #[must_use]
    pub fn new(lesson: Arc<Lesson>, progress: LessonProgress) -> Self {
        let current = progress.resume_index(&lesson);
        Self {
            lesson,
            progress,
            current,
            state: SessionState::new(),
            completion_sent: false,
            pending: None,
            next_ticket: 1,
        }
    }

    #[must_use]
    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    #[must_use]
    pub fn lesson_progress(&self) -> &LessonProgress {
        &self.progress
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_step(&self) -> &Step {
        &self.lesson.steps()[self.current]
    }

    #[must_use]
    pub fn is_last_step(&self) -> bool {
        self.current + 1 == self.lesson.step_count()
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn display(&self) -> DisplayFlags {
        *self.state.display()
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&StepAttempt> {
        self.state.attempt(self.current_step().id())
    }

    #[must_use]
    pub fn last_output(&self) -> Option<&str> {
        self.attempt().and_then(StepAttempt::last_output)
    }

    /// Text in the editor: the learner's edit, or the step template.
    #[must_use]
    pub fn editor_text(&self) -> &str {
        let step = self.current_step();
        self.state
            .attempt(step.id())
            .and_then(StepAttempt::answer)
            .unwrap_or(step.template())
    }

    #[must_use]
    pub fn is_run_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn progress(&self) -> NavigatorProgress {
        NavigatorProgress {
            index: self.current,
            total: self.lesson.step_count(),
            completed: self.progress.completed_steps(&self.lesson),
            percent: self.progress.percent(&self.lesson),
        }
    }

    /// Whether the current step lets the learner continue, and why not.
    ///
    /// # Errors
    ///
    /// Returns the `GateReason` blocking `go_next`.
    pub fn gate(&self) -> Result<(), GateReason> {
        let step = self.current_step();
        if self.progress.is_complete(step.id()) {
            return Ok(());
        }
        let attempt = self.state.attempt(step.id());
        let passed = attempt.is_some_and(StepAttempt::passed);

        match step.kind() {
            StepKind::Explanation => Ok(()),
            StepKind::Code(_) => {
                if !attempt.is_some_and(StepAttempt::has_run) {
                    Err(GateReason::NotRun)
                } else if passed {
                    Ok(())
                } else {
                    Err(GateReason::OutputMismatch)
                }
            }
            StepKind::Quiz(_) => {
                if passed && attempt.and_then(StepAttempt::selected).is_some() {
                    Ok(())
                } else {
                    Err(GateReason::NoCorrectSelection)
                }
            }
            StepKind::Challenge(_) => {
                if passed {
                    Ok(())
                } else {
                    Err(GateReason::CheckNotPassed)
                }
            }
        }
    }

    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.gate().is_ok()
    }

    fn move_to(&mut self, index: usize) {
        if index != self.current {
            self.current = index;
            self.completion_sent = false;
        }
        self.state.clear_display();
        self.pending = None;
    }

    /// Step back one screen. Returns `false` at the first step.
    pub fn go_back(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.move_to(self.current - 1);
        true
    }

    /// Mark the current step complete and continue.
    ///
    /// `now` stamps the completion event when the last step is passed.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::GateClosed` without changing any state if the
    /// step has not been passed.
    pub fn go_next(&mut self, now: DateTime<Utc>) -> Result<Advance, NavigatorError> {
        self.gate()
            .map_err(|reason| NavigatorError::GateClosed { reason })?;

        let completed_step = self.current_step().id();
        let newly_completed = self.progress.mark_complete(completed_step);

        let outcome = if self.is_last_step() {
            self.state.clear_display();
            self.pending = None;
            let event = if self.completion_sent {
                None
            } else {
                self.completion_sent = true;
                Some(LessonCompleted {
                    lesson_id: self.lesson.id(),
                    completed_at: now,
                })
            };
            AdvanceOutcome::Finished { event }
        } else {
            self.move_to(self.current + 1);
            AdvanceOutcome::Moved {
                index: self.current,
            }
        };

        Ok(Advance {
            completed_step,
            newly_completed,
            outcome,
        })
    }

    /// Jump to a completed step or to the first incomplete one.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::NotReachable` for any other index.
    pub fn jump_to(&mut self, index: usize) -> Result<(), NavigatorError> {
        let reachable = self.lesson.step_at(index).is_some_and(|step| {
            self.progress.is_complete(step.id())
                || index == self.progress.resume_index(&self.lesson)
        });
        if !reachable {
            return Err(NavigatorError::NotReachable { index });
        }
        self.move_to(index);
        Ok(())
    }

    fn require_exercise(&self, action: &'static str) -> Result<StepId, NavigatorError> {
        let step = self.current_step();
        match step.kind() {
            StepKind::Code(_) | StepKind::Challenge(_) => Ok(step.id()),
            StepKind::Explanation | StepKind::Quiz(_) => Err(NavigatorError::WrongStepKind {
                action,
                step_type: step.step_type(),
            }),
        }
    }

    /// # Errors
    ///
    /// Returns `NavigatorError::WrongStepKind` for steps without an editor.
    pub fn edit_answer(&mut self, text: impl Into<String>) -> Result<(), NavigatorError> {
        let step_id = self.require_exercise("edit code")?;
        self.state.attempt_mut(step_id).set_answer(text);
        Ok(())
    }

    /// Put the step template back into the editor.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::WrongStepKind` for steps without an editor.
    pub fn reset_answer(&mut self) -> Result<(), NavigatorError> {
        let step_id = self.require_exercise("reset code")?;
        self.state.attempt_mut(step_id).clear_answer();
        Ok(())
    }

    /// Grade a quiz selection immediately.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::WrongStepKind` on non-quiz steps and
    /// `NavigatorError::OptionOutOfRange` for an invalid index.
    pub fn select_option(
        &mut self,
        index: usize,
        grader: &dyn Grader,
    ) -> Result<Verdict, NavigatorError> {
        let lesson = Arc::clone(&self.lesson);
        let step = &lesson.steps()[self.current];
        let StepKind::Quiz(quiz) = step.kind() else {
            return Err(NavigatorError::WrongStepKind {
                action: "select an option",
                step_type: step.step_type(),
            });
        };
        if index >= quiz.options().len() {
            return Err(NavigatorError::OptionOutOfRange {
                index,
                available: quiz.options().len(),
            });
        }

        let verdict = grader.grade(step, Attempt::Select(index));
        self.state
            .attempt_mut(step.id())
            .record_selection(index, verdict.is_pass());
        self.state.show_outcome(verdict.is_pass());
        Ok(verdict)
    }

    fn issue_ticket(&mut self, purpose: RunPurpose) -> Result<RunTicket, NavigatorError> {
        if self.pending.is_some() {
            return Err(NavigatorError::RunInProgress);
        }
        let id = self.next_ticket;
        self.next_ticket += 1;
        self.pending = Some(id);
        Ok(RunTicket {
            id,
            purpose,
            step_index: self.current,
            step_id: self.current_step().id(),
            code: self.editor_text().to_owned(),
        })
    }

    fn redeem(&mut self, ticket: &RunTicket, purpose: RunPurpose) -> Result<(), NavigatorError> {
        if self.pending != Some(ticket.id)
            || ticket.purpose != purpose
            || ticket.step_index != self.current
        {
            return Err(NavigatorError::StaleRun);
        }
        self.pending = None;
        Ok(())
    }

    /// Start running the editor text.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::WrongStepKind` for steps without an editor and
    /// `NavigatorError::RunInProgress` while another run or check is pending.
    pub fn begin_run(&mut self) -> Result<RunTicket, NavigatorError> {
        self.require_exercise("run code")?;
        self.issue_ticket(RunPurpose::Run)
    }

    /// Record the output of a run started with [`Self::begin_run`].
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::StaleRun` if the ticket no longer matches; the
    /// output is discarded.
    pub fn finish_run(
        &mut self,
        ticket: &RunTicket,
        output: &RunOutput,
        grader: &dyn Grader,
    ) -> Result<RunReport, NavigatorError> {
        self.redeem(ticket, RunPurpose::Run)?;
        let lesson = Arc::clone(&self.lesson);
        let step = &lesson.steps()[self.current];

        let verdict = match grader.grade(step, Attempt::Output(output.text())) {
            Verdict::Fail(Mismatch::NotApplicable { .. }) => None,
            verdict => Some(verdict),
        };
        let attempt = self.state.attempt_mut(step.id());
        let passed = verdict
            .as_ref()
            .map_or(attempt.passed(), Verdict::is_pass);
        attempt.record_run(output.text(), passed);

        if output.has_errors() {
            self.state.show_outcome(false);
        } else if step.expected_output().is_some() {
            self.state.show_outcome(passed);
        }

        Ok(RunReport {
            step_id: step.id(),
            output: output.text().to_owned(),
            verdict,
        })
    }

    /// Start checking a challenge answer.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::WrongStepKind` on non-challenge steps and
    /// `NavigatorError::RunInProgress` while another run or check is pending.
    pub fn begin_check(&mut self) -> Result<RunTicket, NavigatorError> {
        let step = self.current_step();
        if !matches!(step.kind(), StepKind::Challenge(_)) {
            return Err(NavigatorError::WrongStepKind {
                action: "check an answer",
                step_type: step.step_type(),
            });
        }
        self.issue_ticket(RunPurpose::Check)
    }

    /// Grade the text captured by a check ticket.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::StaleRun` if the ticket no longer matches.
    pub fn finish_check(
        &mut self,
        ticket: &RunTicket,
        grader: &dyn Grader,
    ) -> Result<Verdict, NavigatorError> {
        self.redeem(ticket, RunPurpose::Check)?;
        let lesson = Arc::clone(&self.lesson);
        let step = &lesson.steps()[self.current];

        let verdict = grader.grade(step, Attempt::Submit(&ticket.code));
        self.state
            .attempt_mut(step.id())
            .record_check(verdict.is_pass());
        self.state.show_outcome(verdict.is_pass());
        Ok(verdict)
    }

    /// Abandon a run or check that will never be finished. Returns `false` if
    /// the ticket was no longer pending.
    pub fn cancel_run(&mut self, ticket: &RunTicket) -> bool {
        if self.pending != Some(ticket.id) {
            return false;
        }
        self.pending = None;
        true
    }

    /// Reveal one more hint. Returns the newly shown hint, or `None` once all
    /// hints are visible.
    pub fn reveal_next_hint(&mut self) -> Option<&str> {
        let total = self.current_step().hints().len();
        let display = self.state.display_mut();
        if display.hints_shown >= total {
            return None;
        }
        display.hints_shown += 1;
        let shown = display.hints_shown;
        self.current_step()
            .hints()
            .get(shown - 1)
            .map(String::as_str)
    }

    pub fn hide_hints(&mut self) {
        self.state.display_mut().hints_shown = 0;
    }

    #[must_use]
    pub fn visible_hints(&self) -> &[String] {
        let hints = self.current_step().hints();
        &hints[..self.state.display().hints_shown.min(hints.len())]
    }

    /// Show or hide the reference solution. Returns whether it is now shown.
    ///
    /// # Errors
    ///
    /// Returns `NavigatorError::NoSolution` if the step has none.
    pub fn toggle_solution(&mut self) -> Result<bool, NavigatorError> {
        if self.current_step().solution().is_none() {
            return Err(NavigatorError::NoSolution);
        }
        let display = self.state.display_mut();
        display.solution_shown = !display.solution_shown;
        Ok(display.solution_shown)
    }

    #[must_use]
    pub fn visible_solution(&self) -> Option<&str> {
        if self.state.display().solution_shown {
            self.current_step().solution()
        } else {
            None
        }
    }
}

impl fmt::Debug for LessonNavigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LessonNavigator")
            .field("lesson_id", &self.lesson.id())
            .field("steps_len", &self.lesson.step_count())
            .field("current", &self.current)
            .field("completion_sent", &self.completion_sent)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{
        Difficulty, Exercise, LessonDraft, LessonId, ModuleId, Quiz, QuizOption,
    };
    use lesson_core::time::fixed_now;
    use lesson_core::{CodeRunner, PrintSimulator, StrategyGrader};

    fn step(id: u64, kind: StepKind) -> Step {
        Step::new(StepId::new(id), format!("Step {id}"), "", kind).unwrap()
    }

    /// explanation, code, quiz, challenge (fuzzy), explanation
    fn lesson() -> Arc<Lesson> {
        let steps = vec![
            step(1, StepKind::Explanation),
            step(
                2,
                StepKind::Code(
                    Exercise::new(r#"print("Hello, World!")"#).with_expected_output("Hello, World!"),
                ),
            ),
            step(
                3,
                StepKind::Quiz(
                    Quiz::new(
                        vec![
                            QuizOption::new("display text", true),
                            QuizOption::new("draw graphics", false),
                        ],
                        vec!["Think about the screen".into()],
                    )
                    .unwrap(),
                ),
            ),
            step(
                4,
                StepKind::Challenge(
                    Exercise::new("# your code")
                        .with_solution("print(1+1)")
                        .with_hints(vec!["Use print".into(), "Add 1 and 1".into()]),
                ),
            ),
            step(5, StepKind::Explanation),
        ];
        Arc::new(
            LessonDraft {
                id: LessonId::new(1),
                title: "Intro".into(),
                description: String::new(),
                module_id: ModuleId::new(1),
                difficulty: Difficulty::Beginner,
                duration_minutes: 15,
                prerequisites: Default::default(),
                steps,
            }
            .validate()
            .unwrap(),
        )
    }

    fn navigator() -> LessonNavigator {
        LessonNavigator::new(lesson(), LessonProgress::new(LessonId::new(1)))
    }

    fn run(nav: &mut LessonNavigator) -> RunReport {
        let grader: StrategyGrader = StrategyGrader::default();
        let ticket = nav.begin_run().unwrap();
        let output = PrintSimulator.run(ticket.code());
        nav.finish_run(&ticket, &output, &grader).unwrap()
    }

    fn check(nav: &mut LessonNavigator) -> Verdict {
        let grader: StrategyGrader = StrategyGrader::default();
        let ticket = nav.begin_check().unwrap();
        nav.finish_check(&ticket, &grader).unwrap()
    }

    #[test]
    fn opens_at_first_incomplete_step() {
        let mut progress = LessonProgress::new(LessonId::new(1));
        progress.mark_complete(StepId::new(1));
        progress.mark_complete(StepId::new(2));
        let nav = LessonNavigator::new(lesson(), progress);
        assert_eq!(nav.current_index(), 2);

        let mut all = LessonProgress::new(LessonId::new(1));
        for id in 1..=5 {
            all.mark_complete(StepId::new(id));
        }
        assert_eq!(LessonNavigator::new(lesson(), all).current_index(), 0);
    }

    #[test]
    fn go_back_at_first_step_is_a_no_op() {
        let mut nav = navigator();
        assert!(!nav.go_back());
        assert_eq!(nav.current_index(), 0);
    }

    #[test]
    fn code_step_needs_a_matching_run() {
        let mut nav = navigator();
        nav.go_next(fixed_now()).unwrap();
        assert_eq!(nav.gate(), Err(GateReason::NotRun));

        nav.edit_answer(r#"print("Hello World")"#).unwrap();
        let report = run(&mut nav);
        assert_eq!(report.output, "Hello World");
        assert!(!report.verdict.unwrap().is_pass());
        assert_eq!(nav.gate(), Err(GateReason::OutputMismatch));
        assert!(nav.display().error);
        assert!(matches!(
            nav.go_next(fixed_now()),
            Err(NavigatorError::GateClosed {
                reason: GateReason::OutputMismatch
            })
        ));
        assert_eq!(nav.current_index(), 1);

        nav.reset_answer().unwrap();
        assert!(run(&mut nav).verdict.unwrap().is_pass());
        assert!(nav.display().success);
        let advance = nav.go_next(fixed_now()).unwrap();
        assert_eq!(advance.completed_step, StepId::new(2));
        assert_eq!(advance.outcome, AdvanceOutcome::Moved { index: 2 });
    }

    #[test]
    fn quiz_unlocks_only_with_the_correct_option() {
        let mut nav = navigator();
        nav.jump_to(0).unwrap();
        nav.go_next(fixed_now()).unwrap();
        run(&mut nav);
        nav.go_next(fixed_now()).unwrap();
        let grader: StrategyGrader = StrategyGrader::default();

        assert!(!nav.select_option(1, &grader).unwrap().is_pass());
        assert!(!nav.can_advance());
        assert!(matches!(
            nav.select_option(5, &grader),
            Err(NavigatorError::OptionOutOfRange {
                index: 5,
                available: 2
            })
        ));
        assert!(nav.select_option(0, &grader).unwrap().is_pass());
        assert!(nav.can_advance());
    }

    #[test]
    fn challenge_uses_the_most_recent_check() {
        let mut progress = LessonProgress::new(LessonId::new(1));
        for id in 1..=3 {
            progress.mark_complete(StepId::new(id));
        }
        let mut nav = LessonNavigator::new(lesson(), progress);
        assert_eq!(nav.current_index(), 3);

        nav.edit_answer("print( 1 + 1 )").unwrap();
        assert!(check(&mut nav).is_pass());
        assert!(nav.can_advance());

        nav.edit_answer("print(2)").unwrap();
        assert!(!check(&mut nav).is_pass());
        assert_eq!(nav.gate(), Err(GateReason::CheckNotPassed));

        nav.edit_answer("").unwrap();
        assert_eq!(
            check(&mut nav),
            Verdict::Fail(Mismatch::EmptySubmission)
        );
    }

    #[test]
    fn completion_event_fires_once_per_visit_of_the_last_step() {
        let mut progress = LessonProgress::new(LessonId::new(1));
        for id in 1..=4 {
            progress.mark_complete(StepId::new(id));
        }
        let mut nav = LessonNavigator::new(lesson(), progress);
        assert!(nav.is_last_step());

        let first = nav.go_next(fixed_now()).unwrap();
        assert!(matches!(
            first.outcome,
            AdvanceOutcome::Finished { event: Some(LessonCompleted { lesson_id, .. }) }
                if lesson_id == LessonId::new(1)
        ));
        assert!(first.newly_completed);

        let second = nav.go_next(fixed_now()).unwrap();
        assert_eq!(second.outcome, AdvanceOutcome::Finished { event: None });
        assert!(!second.newly_completed);

        assert!(nav.go_back());
        nav.go_next(fixed_now()).unwrap();
        let again = nav.go_next(fixed_now()).unwrap();
        assert!(matches!(
            again.outcome,
            AdvanceOutcome::Finished { event: Some(_) }
        ));
    }

    #[test]
    fn percent_never_decreases_while_advancing() {
        let mut nav = navigator();
        let grader: StrategyGrader = StrategyGrader::default();
        let mut last = nav.progress().percent;
        loop {
            match nav.current_step().kind() {
                StepKind::Code(_) => {
                    run(&mut nav);
                }
                StepKind::Quiz(_) => {
                    nav.select_option(0, &grader).unwrap();
                }
                StepKind::Challenge(_) => {
                    nav.edit_answer("print(1+1)").unwrap();
                    check(&mut nav);
                }
                StepKind::Explanation => {}
            }
            let advance = nav.go_next(fixed_now()).unwrap();
            let percent = nav.progress().percent;
            assert!(percent >= last);
            last = percent;
            if matches!(advance.outcome, AdvanceOutcome::Finished { .. }) {
                break;
            }
        }
        assert_eq!(nav.progress().percent, 100);
        assert_eq!(nav.progress().completed, 5);
    }

    #[test]
    fn navigation_discards_pending_runs() {
        let mut nav = navigator();
        nav.go_next(fixed_now()).unwrap();
        let grader: StrategyGrader = StrategyGrader::default();

        let ticket = nav.begin_run().unwrap();
        assert!(matches!(nav.begin_run(), Err(NavigatorError::RunInProgress)));

        nav.go_back();
        nav.jump_to(1).unwrap();
        let output = PrintSimulator.run(ticket.code());
        assert!(matches!(
            nav.finish_run(&ticket, &output, &grader),
            Err(NavigatorError::StaleRun)
        ));
        assert!(nav.last_output().is_none());
        assert!(!nav.is_run_pending());
    }

    #[test]
    fn cancelled_run_frees_the_step() {
        let mut nav = navigator();
        nav.go_next(fixed_now()).unwrap();
        let grader: StrategyGrader = StrategyGrader::default();

        let abandoned = nav.begin_run().unwrap();
        assert!(nav.cancel_run(&abandoned));
        assert!(!nav.is_run_pending());
        assert!(!nav.cancel_run(&abandoned));

        let ticket = nav.begin_run().unwrap();
        assert!(!nav.cancel_run(&abandoned));
        assert!(nav.is_run_pending());
        let output = PrintSimulator.run(ticket.code());
        assert!(nav.finish_run(&ticket, &output, &grader).is_ok());
        assert!(matches!(
            nav.finish_run(&abandoned, &output, &grader),
            Err(NavigatorError::StaleRun)
        ));
    }

    #[test]
    fn display_flags_reset_on_navigation_but_answers_persist() {
        let mut nav = navigator();
        nav.go_next(fixed_now()).unwrap();
        nav.edit_answer("print(42)").unwrap();
        run(&mut nav);
        assert!(nav.display().error);

        nav.go_back();
        assert_eq!(nav.display(), DisplayFlags::default());
        nav.go_next(fixed_now()).unwrap();
        assert_eq!(nav.editor_text(), "print(42)");
        assert_eq!(nav.last_output(), Some("42"));
    }

    #[test]
    fn hints_are_revealed_one_at_a_time() {
        let mut progress = LessonProgress::new(LessonId::new(1));
        for id in 1..=3 {
            progress.mark_complete(StepId::new(id));
        }
        let mut nav = LessonNavigator::new(lesson(), progress);

        assert_eq!(nav.reveal_next_hint(), Some("Use print"));
        assert_eq!(nav.reveal_next_hint(), Some("Add 1 and 1"));
        assert_eq!(nav.reveal_next_hint(), None);
        assert_eq!(nav.visible_hints().len(), 2);
        nav.hide_hints();
        assert!(nav.visible_hints().is_empty());

        assert!(nav.toggle_solution().unwrap());
        assert_eq!(nav.visible_solution(), Some("print(1+1)"));
        assert!(!nav.toggle_solution().unwrap());

        nav.jump_to(0).unwrap();
        assert!(matches!(nav.toggle_solution(), Err(NavigatorError::NoSolution)));
        assert_eq!(nav.reveal_next_hint(), None);
    }

    #[test]
    fn jump_only_reaches_completed_or_next_step() {
        let mut nav = navigator();
        assert!(matches!(
            nav.jump_to(2),
            Err(NavigatorError::NotReachable { index: 2 })
        ));
        nav.go_next(fixed_now()).unwrap();
        nav.jump_to(0).unwrap();
        nav.jump_to(1).unwrap();
        assert!(nav.jump_to(9).is_err());
    }

    #[test]
    fn completed_steps_can_be_passed_again_without_the_gate() {
        let mut progress = LessonProgress::new(LessonId::new(1));
        progress.mark_complete(StepId::new(1));
        progress.mark_complete(StepId::new(2));
        let mut nav = LessonNavigator::new(lesson(), progress);
        nav.jump_to(1).unwrap();
        assert!(nav.can_advance());
        assert!(!nav.go_next(fixed_now()).unwrap().newly_completed);
    }

    #[test]
    fn editor_actions_are_rejected_on_explanations() {
        let mut nav = navigator();
        assert!(matches!(
            nav.edit_answer("x"),
            Err(NavigatorError::WrongStepKind { .. })
        ));
        assert!(nav.begin_run().is_err());
        assert!(nav.begin_check().is_err());
        assert!(!nav.is_run_pending());
    }
}
