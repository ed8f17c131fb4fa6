use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{LessonId, ModuleId, StepId};
use crate::model::step::Step;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("lesson {lesson_id} has no steps")]
    NoSteps { lesson_id: LessonId },

    #[error("lesson {lesson_id} repeats step id {step_id}")]
    DuplicateStep { lesson_id: LessonId, step_id: StepId },
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        })
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// Unvalidated lesson fields, as read from a content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDraft {
    pub id: LessonId,
    pub title: String,
    pub description: String,
    pub module_id: ModuleId,
    pub difficulty: Difficulty,
    pub duration_minutes: u32,
    pub prerequisites: BTreeSet<LessonId>,
    pub steps: Vec<Step>,
}

impl LessonDraft {
    /// # Errors
    ///
    /// Returns `LessonError` if the title is blank, the lesson has no steps
    /// or two steps share an identifier.
    pub fn validate(self) -> Result<Lesson, LessonError> {
        if self.title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        if self.steps.is_empty() {
            return Err(LessonError::NoSteps { lesson_id: self.id });
        }
        let mut seen = HashSet::with_capacity(self.steps.len());
        for step in &self.steps {
            if !seen.insert(step.id()) {
                return Err(LessonError::DuplicateStep {
                    lesson_id: self.id,
                    step_id: step.id(),
                });
            }
        }

        Ok(Lesson {
            id: self.id,
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            module_id: self.module_id,
            difficulty: self.difficulty,
            duration_minutes: self.duration_minutes,
            prerequisites: self.prerequisites,
            steps: self.steps,
        })
    }
}

/// An ordered sequence of steps plus the lessons it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    title: String,
    description: String,
    module_id: ModuleId,
    difficulty: Difficulty,
    duration_minutes: u32,
    prerequisites: BTreeSet<LessonId>,
    steps: Vec<Step>,
}

impl Lesson {
    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Estimated time to finish the lesson.
    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    #[must_use]
    pub fn prerequisites(&self) -> &BTreeSet<LessonId> {
        &self.prerequisites
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Never zero: a validated lesson has at least one step.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn step_at(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    #[must_use]
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|step| step.id() == id)
    }

    #[must_use]
    pub fn step_index(&self, id: StepId) -> Option<usize> {
        self.steps.iter().position(|step| step.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::step::StepKind;

    fn step(id: u64) -> Step {
        Step::new(StepId::new(id), format!("Step {id}"), "", StepKind::Explanation).unwrap()
    }

    fn draft(steps: Vec<Step>) -> LessonDraft {
        LessonDraft {
            id: LessonId::new(1),
            title: "  Intro  ".into(),
            description: "first steps".into(),
            module_id: ModuleId::new(1),
            difficulty: Difficulty::Beginner,
            duration_minutes: 15,
            prerequisites: BTreeSet::new(),
            steps,
        }
    }

    #[test]
    fn validate_trims_and_indexes_steps() {
        let lesson = draft(vec![step(10), step(20)]).validate().unwrap();
        assert_eq!(lesson.title(), "Intro");
        assert_eq!(lesson.step_count(), 2);
        assert_eq!(lesson.step_index(StepId::new(20)), Some(1));
        assert!(lesson.step(StepId::new(30)).is_none());
    }

    #[test]
    fn validate_rejects_duplicate_step_ids() {
        let err = draft(vec![step(1), step(2), step(1)]).validate().unwrap_err();
        assert_eq!(
            err,
            LessonError::DuplicateStep {
                lesson_id: LessonId::new(1),
                step_id: StepId::new(1)
            }
        );
    }

    #[test]
    fn validate_rejects_empty_lessons() {
        let err = draft(Vec::new()).validate().unwrap_err();
        assert_eq!(err, LessonError::NoSteps { lesson_id: LessonId::new(1) });

        let mut blank = draft(vec![step(1)]);
        blank.title = " ".into();
        assert_eq!(blank.validate().unwrap_err(), LessonError::EmptyTitle);
    }
}
