use std::collections::HashMap;
use thiserror::Error;

use crate::model::ids::{LessonId, ModuleId, StepId};
use crate::model::lesson::Lesson;
use crate::model::module::Module;
use crate::model::step::Step;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("module {module_id} is defined twice")]
    DuplicateModule { module_id: ModuleId },

    #[error("lesson {lesson_id} is defined twice")]
    DuplicateLesson { lesson_id: LessonId },

    #[error("lesson {lesson_id} belongs to unknown module {module_id}")]
    UnknownModule {
        lesson_id: LessonId,
        module_id: ModuleId,
    },

    #[error("module {module_id} lists unknown lesson {lesson_id}")]
    UnknownLessonInModule {
        module_id: ModuleId,
        lesson_id: LessonId,
    },

    #[error("module {listed_in} lists lesson {lesson_id}, which belongs to module {declared}")]
    ModuleMismatch {
        lesson_id: LessonId,
        listed_in: ModuleId,
        declared: ModuleId,
    },

    #[error("lesson {lesson_id} requires unknown lesson {prerequisite}")]
    UnknownPrerequisite {
        lesson_id: LessonId,
        prerequisite: LessonId,
    },

    #[error("prerequisite cycle: {}", format_path(.path))]
    PrerequisiteCycle { path: Vec<LessonId> },

    #[error("lesson {lesson_id} not found")]
    LessonNotFound { lesson_id: LessonId },

    #[error("module {module_id} not found")]
    ModuleNotFound { module_id: ModuleId },

    #[error("step {step_id} not found in lesson {lesson_id}")]
    StepNotFound { lesson_id: LessonId, step_id: StepId },
}

fn format_path(path: &[LessonId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Read-only registry of modules and lessons.
///
/// Construction validates cross references and checks once that the
/// prerequisite relation is acyclic, so unlock computations never recurse.
#[derive(Debug, Clone)]
pub struct Catalog {
    modules: Vec<Module>,
    lessons: Vec<Lesson>,
    lesson_index: HashMap<LessonId, usize>,
    module_index: HashMap<ModuleId, usize>,
}

impl Catalog {
    /// Build a catalog. Lessons keep the given order ("catalog order");
    /// modules are sorted by their display order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for duplicate identifiers, dangling references,
    /// module membership mismatches or a prerequisite cycle.
    pub fn new(mut modules: Vec<Module>, lessons: Vec<Lesson>) -> Result<Self, CatalogError> {
        modules.sort_by_key(Module::order_index);

        let mut module_index = HashMap::with_capacity(modules.len());
        for (position, module) in modules.iter().enumerate() {
            if module_index.insert(module.id(), position).is_some() {
                return Err(CatalogError::DuplicateModule {
                    module_id: module.id(),
                });
            }
        }

        let mut lesson_index = HashMap::with_capacity(lessons.len());
        for (position, lesson) in lessons.iter().enumerate() {
            if lesson_index.insert(lesson.id(), position).is_some() {
                return Err(CatalogError::DuplicateLesson {
                    lesson_id: lesson.id(),
                });
            }
        }

        for lesson in &lessons {
            if !module_index.contains_key(&lesson.module_id()) {
                return Err(CatalogError::UnknownModule {
                    lesson_id: lesson.id(),
                    module_id: lesson.module_id(),
                });
            }
            if let Some(missing) = lesson
                .prerequisites()
                .iter()
                .find(|id| !lesson_index.contains_key(id))
            {
                return Err(CatalogError::UnknownPrerequisite {
                    lesson_id: lesson.id(),
                    prerequisite: *missing,
                });
            }
        }

        for module in &modules {
            for lesson_id in module.lessons() {
                let Some(&position) = lesson_index.get(lesson_id) else {
                    return Err(CatalogError::UnknownLessonInModule {
                        module_id: module.id(),
                        lesson_id: *lesson_id,
                    });
                };
                let declared = lessons[position].module_id();
                if declared != module.id() {
                    return Err(CatalogError::ModuleMismatch {
                        lesson_id: *lesson_id,
                        listed_in: module.id(),
                        declared,
                    });
                }
            }
        }

        if let Some(path) = find_cycle(&lessons, &lesson_index) {
            return Err(CatalogError::PrerequisiteCycle { path });
        }

        Ok(Self {
            modules,
            lessons,
            lesson_index,
            module_index,
        })
    }

    /// Modules in display order.
    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Lessons in catalog order.
    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    /// # Errors
    ///
    /// Returns `CatalogError::LessonNotFound` if the id is unknown.
    pub fn lesson(&self, lesson_id: LessonId) -> Result<&Lesson, CatalogError> {
        self.lesson_index
            .get(&lesson_id)
            .map(|&position| &self.lessons[position])
            .ok_or(CatalogError::LessonNotFound { lesson_id })
    }

    /// # Errors
    ///
    /// Returns `CatalogError::ModuleNotFound` if the id is unknown.
    pub fn module(&self, module_id: ModuleId) -> Result<&Module, CatalogError> {
        self.module_index
            .get(&module_id)
            .map(|&position| &self.modules[position])
            .ok_or(CatalogError::ModuleNotFound { module_id })
    }

    /// # Errors
    ///
    /// Returns `CatalogError::LessonNotFound` or `CatalogError::StepNotFound`.
    pub fn step(&self, lesson_id: LessonId, step_id: StepId) -> Result<&Step, CatalogError> {
        self.lesson(lesson_id)?
            .step(step_id)
            .ok_or(CatalogError::StepNotFound { lesson_id, step_id })
    }

    /// Lessons of a module, in the order the module lists them.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ModuleNotFound` if the id is unknown.
    pub fn lessons_in_module(&self, module_id: ModuleId) -> Result<Vec<&Lesson>, CatalogError> {
        let module = self.module(module_id)?;
        module
            .lessons()
            .iter()
            .map(|lesson_id| self.lesson(*lesson_id))
            .collect()
    }
}

/// Depth-first search over prerequisite edges; returns the first cycle
/// found as a path that starts and ends on the same lesson.
fn find_cycle(lessons: &[Lesson], index: &HashMap<LessonId, usize>) -> Option<Vec<LessonId>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        at: usize,
        lessons: &[Lesson],
        index: &HashMap<LessonId, usize>,
        marks: &mut [Mark],
        stack: &mut Vec<LessonId>,
    ) -> Option<Vec<LessonId>> {
        marks[at] = Mark::InProgress;
        stack.push(lessons[at].id());

        for prerequisite in lessons[at].prerequisites() {
            let Some(&next) = index.get(prerequisite) else {
                continue;
            };
            match marks[next] {
                Mark::InProgress => {
                    let start = stack
                        .iter()
                        .position(|id| id == prerequisite)
                        .unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(*prerequisite);
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(next, lessons, index, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }

        stack.pop();
        marks[at] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; lessons.len()];
    let mut stack = Vec::new();
    for start in 0..lessons.len() {
        if marks[start] == Mark::Unvisited {
            if let Some(cycle) = visit(start, lessons, index, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::lesson::{Difficulty, LessonDraft};
    use crate::model::step::StepKind;
    use std::collections::BTreeSet;

    fn lesson(id: u64, module: u64, prerequisites: &[u64]) -> Lesson {
        LessonDraft {
            id: LessonId::new(id),
            title: format!("Lesson {id}"),
            description: String::new(),
            module_id: ModuleId::new(module),
            difficulty: Difficulty::Beginner,
            duration_minutes: 10,
            prerequisites: prerequisites.iter().copied().map(LessonId::new).collect::<BTreeSet<_>>(),
            steps: vec![Step::new(StepId::new(1), "Only", "", StepKind::Explanation).unwrap()],
        }
        .validate()
        .unwrap()
    }

    fn module(id: u64, order: u32, lessons: &[u64]) -> Module {
        Module::new(
            ModuleId::new(id),
            format!("Module {id}"),
            "",
            order,
            lessons.iter().copied().map(LessonId::new).collect(),
        )
        .unwrap()
    }

    #[test]
    fn modules_are_sorted_by_display_order() {
        let catalog = Catalog::new(
            vec![module(2, 2, &[2]), module(1, 1, &[1])],
            vec![lesson(1, 1, &[]), lesson(2, 2, &[1])],
        )
        .unwrap();
        let ids: Vec<_> = catalog.modules().iter().map(Module::id).collect();
        assert_eq!(ids, vec![ModuleId::new(1), ModuleId::new(2)]);
        assert_eq!(catalog.lessons_in_module(ModuleId::new(2)).unwrap()[0].id(), LessonId::new(2));
    }

    #[test]
    fn lookup_reports_not_found() {
        let catalog = Catalog::new(vec![module(1, 1, &[1])], vec![lesson(1, 1, &[])]).unwrap();
        assert_eq!(
            catalog.lesson(LessonId::new(9)).unwrap_err(),
            CatalogError::LessonNotFound { lesson_id: LessonId::new(9) }
        );
        assert_eq!(
            catalog.step(LessonId::new(1), StepId::new(5)).unwrap_err(),
            CatalogError::StepNotFound {
                lesson_id: LessonId::new(1),
                step_id: StepId::new(5)
            }
        );
        assert!(catalog.step(LessonId::new(1), StepId::new(1)).is_ok());
    }

    #[test]
    fn rejects_unknown_prerequisite() {
        let err = Catalog::new(vec![module(1, 1, &[1])], vec![lesson(1, 1, &[7])]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownPrerequisite {
                lesson_id: LessonId::new(1),
                prerequisite: LessonId::new(7)
            }
        );
    }

    #[test]
    fn rejects_prerequisite_cycle() {
        let err = Catalog::new(
            vec![module(1, 1, &[1, 2, 3])],
            vec![lesson(1, 1, &[3]), lesson(2, 1, &[1]), lesson(3, 1, &[2])],
        )
        .unwrap_err();
        let CatalogError::PrerequisiteCycle { path } = &err else {
            panic!("expected cycle, got {err:?}");
        };
        assert_eq!(path.first(), path.last());
        assert_eq!(path.len(), 4);
        assert!(err.to_string().starts_with("prerequisite cycle: "));
    }

    #[test]
    fn rejects_self_prerequisite() {
        let err = Catalog::new(vec![module(1, 1, &[1])], vec![lesson(1, 1, &[1])]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::PrerequisiteCycle {
                path: vec![LessonId::new(1), LessonId::new(1)]
            }
        );
    }

    #[test]
    fn accepts_diamond_shaped_prerequisites() {
        let catalog = Catalog::new(
            vec![module(1, 1, &[1, 2, 3, 4])],
            vec![
                lesson(1, 1, &[]),
                lesson(2, 1, &[1]),
                lesson(3, 1, &[1]),
                lesson(4, 1, &[2, 3]),
            ],
        );
        assert!(catalog.is_ok());
    }

    #[test]
    fn rejects_module_membership_mismatch() {
        let err = Catalog::new(
            vec![module(1, 1, &[1, 2]), module(2, 2, &[])],
            vec![lesson(1, 1, &[]), lesson(2, 2, &[])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            CatalogError::ModuleMismatch {
                lesson_id: LessonId::new(2),
                listed_in: ModuleId::new(1),
                declared: ModuleId::new(2)
            }
        );
    }

    #[test]
    fn rejects_duplicates_and_dangling_modules() {
        let err = Catalog::new(
            vec![module(1, 1, &[])],
            vec![lesson(1, 1, &[]), lesson(1, 1, &[])],
        )
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateLesson { lesson_id: LessonId::new(1) });

        let err = Catalog::new(vec![module(1, 1, &[])], vec![lesson(1, 4, &[])]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownModule {
                lesson_id: LessonId::new(1),
                module_id: ModuleId::new(4)
            }
        );
    }
}
