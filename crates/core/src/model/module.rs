use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{LessonId, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModuleError {
    #[error("module title cannot be empty")]
    EmptyTitle,

    #[error("module {module_id} lists lesson {lesson_id} twice")]
    DuplicateLesson {
        module_id: ModuleId,
        lesson_id: LessonId,
    },
}

/// A titled, ordered group of lessons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    id: ModuleId,
    title: String,
    description: String,
    order_index: u32,
    lessons: Vec<LessonId>,
}

impl Module {
    /// # Errors
    ///
    /// Returns `ModuleError::EmptyTitle` for a blank title and
    /// `ModuleError::DuplicateLesson` when a lesson is listed twice.
    pub fn new(
        id: ModuleId,
        title: impl Into<String>,
        description: impl Into<String>,
        order_index: u32,
        lessons: Vec<LessonId>,
    ) -> Result<Self, ModuleError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ModuleError::EmptyTitle);
        }
        let mut seen = HashSet::with_capacity(lessons.len());
        for lesson_id in &lessons {
            if !seen.insert(*lesson_id) {
                return Err(ModuleError::DuplicateLesson {
                    module_id: id,
                    lesson_id: *lesson_id,
                });
            }
        }

        Ok(Self {
            id,
            title: title.trim().to_owned(),
            description: description.into().trim().to_owned(),
            order_index,
            lessons,
        })
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
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

    /// Display position among modules (ascending).
    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }

    #[must_use]
    pub fn lessons(&self) -> &[LessonId] {
        &self.lessons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_rejects_repeated_lessons() {
        let err = Module::new(
            ModuleId::new(1),
            "Basics",
            "",
            1,
            vec![LessonId::new(1), LessonId::new(1)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ModuleError::DuplicateLesson {
                module_id: ModuleId::new(1),
                lesson_id: LessonId::new(1)
            }
        );
    }

    #[test]
    fn module_trims_text() {
        let module = Module::new(ModuleId::new(2), " Loops ", " again ", 2, Vec::new()).unwrap();
        assert_eq!(module.title(), "Loops");
        assert_eq!(module.description(), "again");
    }
}
