#![forbid(unsafe_code)]

pub mod app_services;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod navigator;
pub mod playground;
pub mod progress_service;

pub use lesson_core::Clock;

pub use app_services::AppServices;
pub use dashboard::{DashboardService, DashboardSnapshot, ModuleOverview};
pub use error::{
    AppServicesError, GateReason, NavigatorError, PlaygroundError, ProgressServiceError,
};
pub use events::{CompletionSink, NoopCompletionSink, RecordingCompletionSink};
pub use navigator::{
    Advance, AdvanceOutcome, LessonLoopService, LessonNavigator, NavigatorProgress, RunReport,
    RunTicket,
};
pub use playground::{Playground, PlaygroundService};
pub use progress_service::ProgressService;
