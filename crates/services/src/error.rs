//! Shared error types for the services crate.

use std::fmt;
use thiserror::Error;

use lesson_core::model::{CatalogError, LessonId, SettingsError, StepType};
use storage::catalog::CatalogLoadError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Why the learner may not leave the current step yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    /// Code step that has not been run.
    NotRun,
    /// Code step whose last run did not produce the expected output.
    OutputMismatch,
    /// Quiz without a correct selection.
    NoCorrectSelection,
    /// Challenge whose most recent check did not pass.
    CheckNotPassed,
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GateReason::NotRun => "run the code first",
            GateReason::OutputMismatch => "the output does not match yet",
            GateReason::NoCorrectSelection => "pick the correct answer first",
            GateReason::CheckNotPassed => "check a correct answer first",
        })
    }
}

/// Errors emitted by the lesson navigator and its loop service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NavigatorError {
    #[error("cannot continue: {reason}")]
    GateClosed { reason: GateReason },
    #[error("a run is already in progress")]
    RunInProgress,
    #[error("run result belongs to a step that is no longer shown")]
    StaleRun,
    #[error("cannot {action} on a {step_type} step")]
    WrongStepKind {
        action: &'static str,
        step_type: StepType,
    },
    #[error("option {index} out of range (0..{available})")]
    OptionOutOfRange { index: usize, available: usize },
    #[error("this step has no solution")]
    NoSolution,
    #[error("step {index} cannot be reached yet")]
    NotReachable { index: usize },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors emitted by `ProgressService`.
///
/// Write failures are logged and retried rather than returned.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("cannot read progress of lesson {lesson_id}: {source}")]
    Read {
        lesson_id: LessonId,
        source: StorageError,
    },
    #[error("cannot write progress of lesson {lesson_id} (attempt {attempt}): {source}")]
    Write {
        lesson_id: LessonId,
        attempt: u32,
        source: StorageError,
    },
}

/// Errors emitted by `Playground`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlaygroundError {
    #[error("a run is already in progress")]
    RunInProgress,
    #[error("run result was discarded because the editor changed")]
    StaleRun,
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    CatalogLoad(#[from] CatalogLoadError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
