use std::sync::Mutex;

use lesson_core::model::LessonCompleted;

/// Receives lesson-complete events (achievements, confetti, streaks).
pub trait CompletionSink: Send + Sync {
    fn lesson_completed(&self, event: &LessonCompleted);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCompletionSink;

impl CompletionSink for NoopCompletionSink {
    fn lesson_completed(&self, _event: &LessonCompleted) {}
}

/// Keeps events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingCompletionSink {
    events: Mutex<Vec<LessonCompleted>>,
}

impl RecordingCompletionSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<LessonCompleted> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl CompletionSink for RecordingCompletionSink {
    fn lesson_completed(&self, event: &LessonCompleted) {
        if let Ok(mut events) = self.events.lock() {
            events.push(*event);
        }
    }
}
