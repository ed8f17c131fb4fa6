mod progress;
mod service;
mod workflow;

// Public API of the lesson player.
pub use crate::error::{GateReason, NavigatorError};
pub use progress::NavigatorProgress;
pub use service::{
    Advance, AdvanceOutcome, LessonNavigator, RunPurpose, RunReport, RunTicket,
};
pub use workflow::LessonLoopService;
