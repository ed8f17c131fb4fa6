use std::sync::Arc;

use lesson_core::model::{Catalog, CatalogError, LessonId, ModuleId};
use lesson_core::{LessonOverview, UnlockTracker};

use crate::progress_service::ProgressService;

/// Completion of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOverview {
    pub module_id: ModuleId,
    pub title: String,
    pub percent: u8,
}

/// Everything the dashboard and profile screens show, computed from one
/// progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub overall_percent: u8,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub recommended: Vec<LessonId>,
    pub modules: Vec<ModuleOverview>,
    pub lessons: Vec<LessonOverview>,
}

/// Read side of learner progress: locks, recommendations and percentages.
#[derive(Clone)]
pub struct DashboardService {
    catalog: Arc<Catalog>,
    progress: Arc<ProgressService>,
    recommendation_limit: usize,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        catalog: Arc<Catalog>,
        progress: Arc<ProgressService>,
        recommendation_limit: usize,
    ) -> Self {
        Self {
            catalog,
            progress,
            recommendation_limit,
        }
    }

    /// Build the dashboard from freshly loaded progress.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the catalog references a missing module.
    pub async fn snapshot(&self) -> Result<DashboardSnapshot, CatalogError> {
        let ledger = self.progress.load_all(&self.catalog).await;
        let tracker = UnlockTracker::new(&self.catalog, &ledger, self.recommendation_limit);

        let modules = self
            .catalog
            .modules()
            .iter()
            .map(|module| -> Result<ModuleOverview, CatalogError> {
                Ok(ModuleOverview {
                    module_id: module.id(),
                    title: module.title().to_owned(),
                    percent: tracker.module_percent(module.id())?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DashboardSnapshot {
            overall_percent: tracker.overall_progress(),
            completed_lessons: tracker.completed_lessons(),
            total_lessons: self.catalog.lessons().len(),
            recommended: tracker.recommended().iter().map(|lesson| lesson.id()).collect(),
            modules,
            lessons: tracker.lesson_overview(),
        })
    }

    /// # Errors
    ///
    /// Returns `CatalogError::LessonNotFound` for an unknown lesson.
    pub async fn is_locked(&self, lesson_id: LessonId) -> Result<bool, CatalogError> {
        let ledger = self.progress.load_all(&self.catalog).await;
        UnlockTracker::new(&self.catalog, &ledger, self.recommendation_limit).is_locked(lesson_id)
    }

    /// Prerequisites still blocking a lesson, in id order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::LessonNotFound` for an unknown lesson.
    pub async fn missing_prerequisites(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<LessonId>, CatalogError> {
        let ledger = self.progress.load_all(&self.catalog).await;
        UnlockTracker::new(&self.catalog, &ledger, self.recommendation_limit)
            .missing_prerequisites(lesson_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::catalog::{BUILTIN_CATALOG, parse_catalog};

    fn service() -> (DashboardService, Arc<ProgressService>, Arc<Catalog>) {
        let catalog = Arc::new(parse_catalog(BUILTIN_CATALOG).unwrap());
        let progress = Arc::new(ProgressService::in_memory());
        let dashboard = DashboardService::new(Arc::clone(&catalog), Arc::clone(&progress), 3);
        (dashboard, progress, catalog)
    }

    #[tokio::test]
    async fn fresh_learner_sees_only_the_first_lesson() {
        let (dashboard, _, _) = service();
        let snapshot = dashboard.snapshot().await.unwrap();
        assert_eq!(snapshot.overall_percent, 0);
        assert_eq!(snapshot.total_lessons, 10);
        assert_eq!(snapshot.recommended, vec![LessonId::new(1)]);
        assert_eq!(snapshot.modules.len(), 3);
        assert!(snapshot.lessons[1].locked);
        assert!(dashboard.is_locked(LessonId::new(2)).await.unwrap());
    }

    #[tokio::test]
    async fn finishing_a_lesson_unlocks_its_dependents() {
        let (dashboard, progress, catalog) = service();
        let lesson = catalog.lesson(LessonId::new(1)).unwrap();
        for step in lesson.steps() {
            progress.mark_complete(lesson.id(), step.id()).await;
        }

        let snapshot = dashboard.snapshot().await.unwrap();
        assert_eq!(snapshot.completed_lessons, 1);
        assert_eq!(snapshot.recommended, vec![LessonId::new(2)]);
        assert_eq!(snapshot.lessons[0].percent, 100);
        assert_eq!(
            dashboard.missing_prerequisites(LessonId::new(3)).await.unwrap(),
            vec![LessonId::new(2)]
        );
        // 100 / 10 lessons
        assert_eq!(snapshot.overall_percent, 10);
    }
}
