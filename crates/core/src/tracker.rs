//! Lesson locks, recommendations and completion percentages.

use crate::model::{
    Catalog, CatalogError, Difficulty, Lesson, LessonId, ModuleId, ProgressLedger, percent,
};

/// One row of the lesson overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonOverview {
    pub lesson_id: LessonId,
    pub title: String,
    pub module_id: ModuleId,
    pub difficulty: Difficulty,
    pub percent: u8,
    pub locked: bool,
    pub complete: bool,
}

/// Read-only view joining the catalog with the learner's progress.
#[derive(Debug, Clone, Copy)]
pub struct UnlockTracker<'a> {
    catalog: &'a Catalog,
    ledger: &'a ProgressLedger,
    recommendation_limit: usize,
}

impl<'a> UnlockTracker<'a> {
    #[must_use]
    pub fn new(catalog: &'a Catalog, ledger: &'a ProgressLedger, recommendation_limit: usize) -> Self {
        Self {
            catalog,
            ledger,
            recommendation_limit,
        }
    }

    /// # Errors
    ///
    /// Returns `CatalogError::LessonNotFound` for an unknown lesson.
    pub fn lesson_percent(&self, lesson_id: LessonId) -> Result<u8, CatalogError> {
        Ok(self.ledger.percent(self.catalog.lesson(lesson_id)?))
    }

    /// Share of completed steps over all steps of all lessons in the module.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ModuleNotFound` for an unknown module.
    pub fn module_percent(&self, module_id: ModuleId) -> Result<u8, CatalogError> {
        let lessons = self.catalog.lessons_in_module(module_id)?;
        let (done, total) = lessons.iter().fold((0, 0), |(done, total), lesson| {
            (
                done + self.ledger.completed_steps(lesson),
                total + lesson.step_count(),
            )
        });
        Ok(percent(done, total))
    }

    /// Prerequisites of the lesson that are not yet at 100 %, in id order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::LessonNotFound` for an unknown lesson.
    pub fn missing_prerequisites(&self, lesson_id: LessonId) -> Result<Vec<LessonId>, CatalogError> {
        let lesson = self.catalog.lesson(lesson_id)?;
        let mut missing = Vec::new();
        for prerequisite in lesson.prerequisites() {
            let required = self.catalog.lesson(*prerequisite)?;
            if !self.ledger.is_lesson_complete(required) {
                missing.push(*prerequisite);
            }
        }
        Ok(missing)
    }

    /// A lesson is locked while any of its prerequisites is incomplete.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::LessonNotFound` for an unknown lesson.
    pub fn is_locked(&self, lesson_id: LessonId) -> Result<bool, CatalogError> {
        Ok(!self.missing_prerequisites(lesson_id)?.is_empty())
    }

    fn locked(&self, lesson: &Lesson) -> bool {
        lesson.prerequisites().iter().any(|prerequisite| {
            self.catalog
                .lesson(*prerequisite)
                .map_or(true, |required| !self.ledger.is_lesson_complete(required))
        })
    }

    /// Unlocked, unfinished lessons in catalog order, at most
    /// `recommendation_limit` of them.
    #[must_use]
    pub fn recommended(&self) -> Vec<&'a Lesson> {
        self.catalog
            .lessons()
            .iter()
            .filter(|lesson| !self.locked(lesson) && !self.ledger.is_lesson_complete(lesson))
            .take(self.recommendation_limit)
            .collect()
    }

    /// Mean of all lesson percentages, rounded half up; `0` for an empty catalog.
    #[must_use]
    pub fn overall_progress(&self) -> u8 {
        let lessons = self.catalog.lessons();
        let sum: usize = lessons
            .iter()
            .map(|lesson| usize::from(self.ledger.percent(lesson)))
            .sum();
        // percent() computes round(100 * sum / (100 * n)), the rounded mean.
        percent(sum, lessons.len() * 100)
    }

    #[must_use]
    pub fn completed_lessons(&self) -> usize {
        self.catalog
            .lessons()
            .iter()
            .filter(|lesson| self.ledger.is_lesson_complete(lesson))
            .count()
    }

    #[must_use]
    pub fn lesson_overview(&self) -> Vec<LessonOverview> {
        self.catalog
            .lessons()
            .iter()
            .map(|lesson| LessonOverview {
                lesson_id: lesson.id(),
                title: lesson.title().to_owned(),
                module_id: lesson.module_id(),
                difficulty: lesson.difficulty(),
                percent: self.ledger.percent(lesson),
                locked: self.locked(lesson),
                complete: self.ledger.is_lesson_complete(lesson),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LessonDraft, Module, Step, StepId, StepKind};
    use std::collections::BTreeSet;

    fn lesson(id: u64, module: u64, steps: u64, prerequisites: &[u64]) -> Lesson {
        LessonDraft {
            id: LessonId::new(id),
            title: format!("Lesson {id}"),
            description: String::new(),
            module_id: ModuleId::new(module),
            difficulty: Difficulty::Beginner,
            duration_minutes: 10,
            prerequisites: prerequisites.iter().copied().map(LessonId::new).collect::<BTreeSet<_>>(),
            steps: (1..=steps)
                .map(|step| {
                    Step::new(StepId::new(step), format!("Step {step}"), "", StepKind::Explanation)
                        .unwrap()
                })
                .collect(),
        }
        .validate()
        .unwrap()
    }

    /// Lessons A=1 and B=2 have no prerequisites, C=3 needs both, D=4 needs C.
    fn catalog() -> Catalog {
        let modules = vec![
            Module::new(ModuleId::new(1), "Basics", "", 0, vec![LessonId::new(1), LessonId::new(2)])
                .unwrap(),
            Module::new(ModuleId::new(2), "Next", "", 1, vec![LessonId::new(3), LessonId::new(4)])
                .unwrap(),
        ];
        let lessons = vec![
            lesson(1, 1, 2, &[]),
            lesson(2, 1, 3, &[]),
            lesson(3, 2, 1, &[1, 2]),
            lesson(4, 2, 1, &[3]),
        ];
        Catalog::new(modules, lessons).unwrap()
    }

    fn complete(ledger: &mut ProgressLedger, catalog: &Catalog, lesson_id: u64) {
        let lesson = catalog.lesson(LessonId::new(lesson_id)).unwrap();
        for step in lesson.steps() {
            ledger.lesson_mut(lesson.id()).mark_complete(step.id());
        }
    }

    #[test]
    fn lesson_unlocks_only_when_all_prerequisites_are_complete() {
        let catalog = catalog();
        let mut ledger = ProgressLedger::new();
        let c = LessonId::new(3);

        assert!(UnlockTracker::new(&catalog, &ledger, 3).is_locked(c).unwrap());

        complete(&mut ledger, &catalog, 1);
        let tracker = UnlockTracker::new(&catalog, &ledger, 3);
        assert!(tracker.is_locked(c).unwrap());
        assert_eq!(tracker.missing_prerequisites(c).unwrap(), vec![LessonId::new(2)]);

        ledger.lesson_mut(LessonId::new(2)).mark_complete(StepId::new(1));
        ledger.lesson_mut(LessonId::new(2)).mark_complete(StepId::new(2));
        assert!(UnlockTracker::new(&catalog, &ledger, 3).is_locked(c).unwrap());

        complete(&mut ledger, &catalog, 2);
        assert!(!UnlockTracker::new(&catalog, &ledger, 3).is_locked(c).unwrap());
    }

    #[test]
    fn lessons_without_prerequisites_are_never_locked() {
        let catalog = catalog();
        let ledger = ProgressLedger::new();
        let tracker = UnlockTracker::new(&catalog, &ledger, 3);
        assert!(!tracker.is_locked(LessonId::new(1)).unwrap());
        assert!(matches!(
            tracker.is_locked(LessonId::new(99)),
            Err(CatalogError::LessonNotFound { .. })
        ));
    }

    #[test]
    fn recommends_unlocked_unfinished_lessons_in_catalog_order() {
        let catalog = catalog();
        let mut ledger = ProgressLedger::new();
        let ids = |tracker: &UnlockTracker<'_>| {
            tracker.recommended().iter().map(|l| l.id().value()).collect::<Vec<_>>()
        };

        assert_eq!(ids(&UnlockTracker::new(&catalog, &ledger, 3)), vec![1, 2]);
        assert_eq!(ids(&UnlockTracker::new(&catalog, &ledger, 1)), vec![1]);

        complete(&mut ledger, &catalog, 1);
        complete(&mut ledger, &catalog, 2);
        assert_eq!(ids(&UnlockTracker::new(&catalog, &ledger, 3)), vec![3]);
    }

    #[test]
    fn percentages_round_half_up() {
        let catalog = catalog();
        let mut ledger = ProgressLedger::new();
        ledger.lesson_mut(LessonId::new(1)).mark_complete(StepId::new(1));
        let tracker = UnlockTracker::new(&catalog, &ledger, 3);

        assert_eq!(tracker.lesson_percent(LessonId::new(1)).unwrap(), 50);
        // 1 of 5 steps in module 1.
        assert_eq!(tracker.module_percent(ModuleId::new(1)).unwrap(), 20);
        assert_eq!(tracker.module_percent(ModuleId::new(2)).unwrap(), 0);
        // (50 + 0 + 0 + 0) / 4 = 12.5
        assert_eq!(tracker.overall_progress(), 13);
    }

    #[test]
    fn overall_progress_of_empty_catalog_is_zero() {
        let catalog = Catalog::new(Vec::new(), Vec::new()).unwrap();
        let ledger = ProgressLedger::new();
        assert_eq!(UnlockTracker::new(&catalog, &ledger, 3).overall_progress(), 0);
    }

    #[test]
    fn overview_reports_every_lesson() {
        let catalog = catalog();
        let mut ledger = ProgressLedger::new();
        complete(&mut ledger, &catalog, 1);
        let tracker = UnlockTracker::new(&catalog, &ledger, 3);

        let rows = tracker.lesson_overview();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].complete && !rows[0].locked && rows[0].percent == 100);
        assert!(rows[2].locked);
        assert_eq!(tracker.completed_lessons(), 1);
    }
}
