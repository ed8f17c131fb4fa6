use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use lesson_core::model::{LessonId, LessonProgress, StepId};
use services::ProgressService;
use storage::repository::{
    InMemoryKeyValueStore, KvProgressRepository, ProgressRepository, StorageError,
};

/// Fails the next `failures` writes and `read_failures` reads, then behaves
/// like the wrapped repository.
struct FlakyRepository {
    inner: KvProgressRepository,
    failures: AtomicU32,
    read_failures: AtomicU32,
    writes: AtomicU32,
}

impl FlakyRepository {
    fn new(failures: u32) -> Self {
        Self {
            inner: KvProgressRepository::new(Arc::new(InMemoryKeyValueStore::new())),
            failures: AtomicU32::new(failures),
            read_failures: AtomicU32::new(0),
            writes: AtomicU32::new(0),
        }
    }

    fn failing_reads(self, read_failures: u32) -> Self {
        self.read_failures.store(read_failures, Ordering::SeqCst);
        self
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ProgressRepository for FlakyRepository {
    async fn get(&self, lesson_id: LessonId) -> Result<LessonProgress, StorageError> {
        if Self::take(&self.read_failures) {
            return Err(StorageError::Connection("disk unavailable".into()));
        }
        self.inner.get(lesson_id).await
    }

    async fn set(
        &self,
        lesson_id: LessonId,
        step_id: StepId,
        completed: bool,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.failures) {
            return Err(StorageError::Connection("disk unavailable".into()));
        }
        self.inner.set(lesson_id, step_id, completed).await
    }

    async fn lessons(&self) -> Result<Vec<LessonId>, StorageError> {
        self.inner.lessons().await
    }
}

#[tokio::test]
async fn failed_write_keeps_progress_in_memory_and_retries_on_flush() {
    let repo = Arc::new(FlakyRepository::new(1));
    let service = ProgressService::new(repo.clone(), 3);
    let lesson = LessonId::new(1);

    service.mark_complete(lesson, StepId::new(1)).await;
    assert!(service.is_complete(lesson, StepId::new(1)));
    assert_eq!(service.pending_writes(), 1);
    assert!(repo.inner.get(lesson).await.unwrap().flags().is_empty());

    assert_eq!(service.flush().await, 0);
    assert!(repo.inner.get(lesson).await.unwrap().is_complete(StepId::new(1)));
}

#[tokio::test]
async fn next_write_retries_other_queued_lessons() {
    let repo = Arc::new(FlakyRepository::new(1));
    let service = ProgressService::new(repo.clone(), 3);

    service.mark_complete(LessonId::new(1), StepId::new(1)).await;
    service.mark_complete(LessonId::new(2), StepId::new(1)).await;

    assert_eq!(service.pending_writes(), 0);
    let mut stored = repo.inner.lessons().await.unwrap();
    stored.sort();
    assert_eq!(stored, vec![LessonId::new(1), LessonId::new(2)]);
}

#[tokio::test]
async fn write_is_dropped_after_the_retry_limit() {
    let repo = Arc::new(FlakyRepository::new(u32::MAX));
    let service = ProgressService::new(repo.clone(), 2);
    let lesson = LessonId::new(3);

    service.mark_complete(lesson, StepId::new(1)).await;
    assert_eq!(service.pending_writes(), 1);
    assert_eq!(service.flush().await, 0);
    assert_eq!(repo.writes.load(Ordering::SeqCst), 2);

    // In-memory state stays authoritative.
    assert!(service.is_complete(lesson, StepId::new(1)));
    assert_eq!(service.flush().await, 0);
    assert_eq!(repo.writes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn write_after_a_failed_read_keeps_stored_flags() {
    let repo = Arc::new(FlakyRepository::new(0).failing_reads(1));
    let lesson = LessonId::new(1);
    repo.inner.set(lesson, StepId::new(2), true).await.unwrap();
    repo.inner.set(lesson, StepId::new(3), true).await.unwrap();
    let service = ProgressService::new(repo.clone(), 3);

    assert!(service.load_lesson(lesson).await.flags().is_empty());
    service.mark_complete(lesson, StepId::new(1)).await;

    let stored = repo.inner.get(lesson).await.unwrap();
    for step in 1..=3 {
        assert!(stored.is_complete(StepId::new(step)));
    }
}

#[tokio::test]
async fn queued_steps_of_one_lesson_are_all_written() {
    let repo = Arc::new(FlakyRepository::new(2));
    let service = ProgressService::new(repo.clone(), 5);
    let lesson = LessonId::new(4);

    service.mark_complete(lesson, StepId::new(1)).await;
    service.mark_complete(lesson, StepId::new(2)).await;
    assert_eq!(service.pending_writes(), 1);

    assert_eq!(service.flush().await, 0);
    let stored = repo.inner.get(lesson).await.unwrap();
    assert!(stored.is_complete(StepId::new(1)));
    assert!(stored.is_complete(StepId::new(2)));
}

#[tokio::test]
async fn navigation_continues_while_storage_is_down() {
    use lesson_core::model::EngineSettings;
    use lesson_core::time::fixed_clock;
    use services::LessonLoopService;
    use storage::catalog::{BUILTIN_CATALOG, parse_catalog};

    let repo = Arc::new(FlakyRepository::new(u32::MAX));
    let progress = Arc::new(ProgressService::new(repo.clone(), 3));
    let catalog = Arc::new(parse_catalog(BUILTIN_CATALOG).unwrap());
    let settings = EngineSettings::default().with_run_delay_ms(0).unwrap();
    let lessons = LessonLoopService::new(fixed_clock(), catalog, Arc::clone(&progress), &settings);

    let mut nav = lessons.open_lesson(LessonId::new(1)).await.unwrap();
    lessons.go_next(&mut nav).await.unwrap();
    lessons.run_code(&mut nav).await.unwrap();
    lessons.go_next(&mut nav).await.unwrap();

    assert_eq!(nav.current_index(), 2);
    assert!(progress.is_complete(LessonId::new(1), StepId::new(2)));
    assert_eq!(progress.pending_writes(), 1);
    assert!(repo.inner.lessons().await.unwrap().is_empty());
}
