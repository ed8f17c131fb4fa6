use std::collections::{BTreeMap, HashMap};

use crate::model::ids::{LessonId, StepId};
use crate::model::lesson::Lesson;

/// `round(100 * done / total)` with ties rounding up; `0` when `total == 0`.
///
/// Integer arithmetic keeps results exact for every input.
#[must_use]
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total) as u128;
    let total = total as u128;
    let rounded = (200 * done + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}

/// Completion flags of one lesson's steps.
///
/// Flags only ever go from absent to `true`; there is no way to clear one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonProgress {
    lesson_id: LessonId,
    completed: BTreeMap<StepId, bool>,
}

impl LessonProgress {
    #[must_use]
    pub fn new(lesson_id: LessonId) -> Self {
        Self {
            lesson_id,
            completed: BTreeMap::new(),
        }
    }

    /// Rehydrate from persisted flags. `false` entries are kept as-is; they
    /// count as incomplete.
    #[must_use]
    pub fn from_flags(lesson_id: LessonId, flags: BTreeMap<StepId, bool>) -> Self {
        Self {
            lesson_id,
            completed: flags,
        }
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn flags(&self) -> &BTreeMap<StepId, bool> {
        &self.completed
    }

    #[must_use]
    pub fn is_complete(&self, step_id: StepId) -> bool {
        self.completed.get(&step_id).copied().unwrap_or(false)
    }

    /// Mark a step as completed. Returns `true` if the flag changed.
    pub fn mark_complete(&mut self, step_id: StepId) -> bool {
        let previous = self.completed.insert(step_id, true);
        previous != Some(true)
    }

    /// Union with another record of the same lesson; a step stays complete
    /// if either side says so.
    pub fn merge(&mut self, other: &LessonProgress) {
        for (step_id, done) in &other.completed {
            if *done {
                self.completed.insert(*step_id, true);
            } else {
                self.completed.entry(*step_id).or_insert(false);
            }
        }
    }

    /// Number of the lesson's steps flagged complete. Flags for ids that
    /// are not part of the lesson are ignored.
    #[must_use]
    pub fn completed_steps(&self, lesson: &Lesson) -> usize {
        lesson
            .steps()
            .iter()
            .filter(|step| self.is_complete(step.id()))
            .count()
    }

    #[must_use]
    pub fn percent(&self, lesson: &Lesson) -> u8 {
        percent(self.completed_steps(lesson), lesson.step_count())
    }

    #[must_use]
    pub fn is_lesson_complete(&self, lesson: &Lesson) -> bool {
        self.completed_steps(lesson) == lesson.step_count()
    }

    /// Index of the first step not yet complete, or `0` if all are.
    #[must_use]
    pub fn resume_index(&self, lesson: &Lesson) -> usize {
        lesson
            .steps()
            .iter()
            .position(|step| !self.is_complete(step.id()))
            .unwrap_or(0)
    }
}

/// Progress of every lesson the learner has touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressLedger {
    lessons: HashMap<LessonId, LessonProgress>,
}

impl ProgressLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lesson(&self, lesson_id: LessonId) -> Option<&LessonProgress> {
        self.lessons.get(&lesson_id)
    }

    /// Record for `lesson_id`, created empty on first access.
    pub fn lesson_mut(&mut self, lesson_id: LessonId) -> &mut LessonProgress {
        self.lessons
            .entry(lesson_id)
            .or_insert_with(|| LessonProgress::new(lesson_id))
    }

    /// Merge a loaded record into the ledger (see [`LessonProgress::merge`]).
    pub fn absorb(&mut self, progress: &LessonProgress) {
        self.lesson_mut(progress.lesson_id()).merge(progress);
    }

    #[must_use]
    pub fn is_complete(&self, lesson_id: LessonId, step_id: StepId) -> bool {
        self.lesson(lesson_id)
            .is_some_and(|progress| progress.is_complete(step_id))
    }

    #[must_use]
    pub fn completed_steps(&self, lesson: &Lesson) -> usize {
        self.lesson(lesson.id())
            .map_or(0, |progress| progress.completed_steps(lesson))
    }

    #[must_use]
    pub fn percent(&self, lesson: &Lesson) -> u8 {
        percent(self.completed_steps(lesson), lesson.step_count())
    }

    #[must_use]
    pub fn is_lesson_complete(&self, lesson: &Lesson) -> bool {
        self.completed_steps(lesson) == lesson.step_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::ModuleId;
    use crate::model::lesson::{Difficulty, LessonDraft};
    use crate::model::step::{Step, StepKind};
    use std::collections::BTreeSet;

    fn lesson(steps: u64) -> Lesson {
        LessonDraft {
            id: LessonId::new(1),
            title: "Lesson".into(),
            description: String::new(),
            module_id: ModuleId::new(1),
            difficulty: Difficulty::Beginner,
            duration_minutes: 5,
            prerequisites: BTreeSet::new(),
            steps: (1..=steps)
                .map(|id| Step::new(StepId::new(id), "s", "", StepKind::Explanation).unwrap())
                .collect(),
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(percent(0, 3), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 0), 0);
    }

    #[test]
    fn percent_matches_float_formula_for_small_lessons() {
        for total in 1..=40_usize {
            for done in 0..=total {
                #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let expected = (100.0 * done as f64 / total as f64 + 0.5).floor() as u8;
                assert_eq!(percent(done, total), expected, "{done}/{total}");
            }
        }
    }

    #[test]
    fn mark_complete_is_idempotent() {
        let mut once = LessonProgress::new(LessonId::new(1));
        assert!(once.mark_complete(StepId::new(2)));

        let mut twice = once.clone();
        assert!(!twice.mark_complete(StepId::new(2)));
        assert_eq!(once, twice);
    }

    #[test]
    fn ignores_flags_for_foreign_steps() {
        let lesson = lesson(4);
        let mut flags = BTreeMap::new();
        flags.insert(StepId::new(1), true);
        flags.insert(StepId::new(2), false);
        flags.insert(StepId::new(99), true);
        let progress = LessonProgress::from_flags(lesson.id(), flags);

        assert_eq!(progress.completed_steps(&lesson), 1);
        assert_eq!(progress.percent(&lesson), 25);
        assert_eq!(progress.resume_index(&lesson), 1);
    }

    #[test]
    fn resume_index_wraps_to_start_when_all_complete() {
        let lesson = lesson(2);
        let mut progress = LessonProgress::new(lesson.id());
        progress.mark_complete(StepId::new(1));
        progress.mark_complete(StepId::new(2));
        assert!(progress.is_lesson_complete(&lesson));
        assert_eq!(progress.resume_index(&lesson), 0);
    }

    #[test]
    fn merge_never_clears_a_flag() {
        let mut memory = LessonProgress::new(LessonId::new(1));
        memory.mark_complete(StepId::new(1));

        let mut stored = BTreeMap::new();
        stored.insert(StepId::new(1), false);
        stored.insert(StepId::new(2), true);
        memory.merge(&LessonProgress::from_flags(LessonId::new(1), stored));

        assert!(memory.is_complete(StepId::new(1)));
        assert!(memory.is_complete(StepId::new(2)));
    }

    #[test]
    fn ledger_reports_untouched_lessons_as_zero() {
        let lesson = lesson(3);
        let ledger = ProgressLedger::new();
        assert_eq!(ledger.percent(&lesson), 0);
        assert!(!ledger.is_complete(lesson.id(), StepId::new(1)));
    }
}
