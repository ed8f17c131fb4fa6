mod catalog;
mod ids;
mod lesson;
mod module;
mod progress;
mod session;
mod settings;
mod step;

pub use ids::{LessonId, ModuleId, ParseIdError, StepId};

pub use catalog::{Catalog, CatalogError};
pub use lesson::{Difficulty, Lesson, LessonDraft, LessonError};
pub use module::{Module, ModuleError};
pub use progress::{LessonProgress, ProgressLedger, percent};
pub use session::{DisplayFlags, LessonCompleted, SessionState, StepAttempt};
pub use settings::{EngineSettings, SettingsError};
pub use step::{Exercise, Quiz, QuizOption, Step, StepError, StepKind, StepType};
