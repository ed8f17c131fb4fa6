/// Aggregated view of lesson progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigatorProgress {
    /// Zero-based index of the step on screen.
    pub index: usize,
    pub total: usize,
    pub completed: usize,
    /// Completed steps as a rounded percentage of the lesson.
    pub percent: u8,
}
