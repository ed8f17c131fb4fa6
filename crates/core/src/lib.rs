#![forbid(unsafe_code)]

pub mod error;
pub mod grading;
pub mod model;
pub mod simulator;
pub mod time;
pub mod tracker;

pub use error::Error;
pub use grading::{Attempt, Grader, Mismatch, StrategyGrader, Verdict};
pub use simulator::{CodeRunner, PrintSimulator, RunOutput, SimulationError};
pub use time::Clock;
pub use tracker::{LessonOverview, UnlockTracker};
