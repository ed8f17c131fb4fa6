use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::ids::{LessonId, StepId};

/// What the learner has done on one step during the current visit of a lesson.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepAttempt {
    answer: Option<String>,
    selected: Option<usize>,
    has_run: bool,
    last_output: Option<String>,
    passed: bool,
}

impl StepAttempt {
    /// Edited answer text; `None` until the learner types something.
    #[must_use]
    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn set_answer(&mut self, text: impl Into<String>) {
        self.answer = Some(text.into());
    }

    /// Forget the edited text so the step shows its template again.
    pub fn clear_answer(&mut self) {
        self.answer = None;
    }

    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn has_run(&self) -> bool {
        self.has_run
    }

    #[must_use]
    pub fn last_output(&self) -> Option<&str> {
        self.last_output.as_deref()
    }

    /// Outcome of the most recent graded action (run, selection or check).
    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn record_run(&mut self, output: impl Into<String>, passed: bool) {
        self.has_run = true;
        self.last_output = Some(output.into());
        self.passed = passed;
    }

    pub fn record_selection(&mut self, index: usize, passed: bool) {
        self.selected = Some(index);
        self.passed = passed;
    }

    pub fn record_check(&mut self, passed: bool) {
        self.passed = passed;
    }
}

/// Per-visit display state. Reset whenever the learner changes step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayFlags {
    pub hints_shown: usize,
    pub solution_shown: bool,
    pub success: bool,
    pub error: bool,
}

/// Transient state of one open lesson.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    attempts: HashMap<StepId, StepAttempt>,
    display: DisplayFlags,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attempt(&self, step_id: StepId) -> Option<&StepAttempt> {
        self.attempts.get(&step_id)
    }

    pub fn attempt_mut(&mut self, step_id: StepId) -> &mut StepAttempt {
        self.attempts.entry(step_id).or_default()
    }

    #[must_use]
    pub fn display(&self) -> &DisplayFlags {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut DisplayFlags {
        &mut self.display
    }

    /// Clear display flags; entered answers are kept.
    pub fn clear_display(&mut self) {
        self.display = DisplayFlags::default();
    }

    /// Set the success/error pair from a graded outcome.
    pub fn show_outcome(&mut self, passed: bool) {
        self.display.success = passed;
        self.display.error = !passed;
    }
}

/// Emitted once when the learner advances past the last step of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonCompleted {
    pub lesson_id: LessonId,
    pub completed_at: DateTime<Utc>,
}
