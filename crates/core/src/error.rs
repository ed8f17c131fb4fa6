use thiserror::Error;

use crate::model::{
    CatalogError, LessonError, ModuleError, ParseIdError, SettingsError, StepError,
};

/// Any validation failure raised while building domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
