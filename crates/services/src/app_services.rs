use std::sync::Arc;

use lesson_core::model::{Catalog, EngineSettings};
use storage::catalog::{CatalogSource, JsonCatalogSource};
use storage::repository::Storage;

use crate::Clock;
use crate::dashboard::DashboardService;
use crate::error::AppServicesError;
use crate::events::{CompletionSink, NoopCompletionSink};
use crate::navigator::LessonLoopService;
use crate::playground::PlaygroundService;
use crate::progress_service::ProgressService;

/// Assembles app-facing services around one catalog and one progress store.
#[derive(Clone)]
pub struct AppServices {
    settings: EngineSettings,
    catalog: Arc<Catalog>,
    progress: Arc<ProgressService>,
    lesson_loop: Arc<LessonLoopService>,
    dashboard: Arc<DashboardService>,
    playground: Arc<PlaygroundService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or catalog loading fails.
    pub async fn new_sqlite(
        db_url: &str,
        catalog: &dyn CatalogSource,
        clock: Clock,
        settings: EngineSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let catalog = catalog.load().await?;
        Ok(Self::assemble(
            storage,
            catalog,
            clock,
            settings,
            Arc::new(NoopCompletionSink),
        ))
    }

    /// Build services on an in-memory store with the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::CatalogLoad` if the built-in catalog is invalid.
    pub async fn in_memory(clock: Clock, settings: EngineSettings) -> Result<Self, AppServicesError> {
        let catalog = JsonCatalogSource::builtin().load().await?;
        Ok(Self::assemble(
            Storage::in_memory(),
            catalog,
            clock,
            settings,
            Arc::new(NoopCompletionSink),
        ))
    }

    #[must_use]
    pub fn assemble(
        storage: Storage,
        catalog: Catalog,
        clock: Clock,
        settings: EngineSettings,
        completions: Arc<dyn CompletionSink>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.progress),
            settings.persist_retry_limit(),
        ));
        let lesson_loop = Arc::new(
            LessonLoopService::new(clock, Arc::clone(&catalog), Arc::clone(&progress), &settings)
                .with_completion_sink(completions),
        );
        let dashboard = Arc::new(DashboardService::new(
            Arc::clone(&catalog),
            Arc::clone(&progress),
            settings.recommendation_limit(),
        ));
        let playground = Arc::new(PlaygroundService::new(&settings));

        tracing::debug!(
            lessons = catalog.lessons().len(),
            run_delay_ms = settings.run_delay_ms(),
            "services assembled"
        );

        Self {
            settings,
            catalog,
            progress,
            lesson_loop,
            dashboard,
            playground,
        }
    }

    #[must_use]
    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn lesson_loop(&self) -> Arc<LessonLoopService> {
        Arc::clone(&self.lesson_loop)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn playground(&self) -> Arc<PlaygroundService> {
        Arc::clone(&self.playground)
    }
}
