use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use lesson_core::model::{Catalog, LessonId, LessonProgress, ProgressLedger, StepId};
use storage::repository::{
    InMemoryKeyValueStore, KvProgressRepository, ProgressRepository, StorageError,
};

use crate::error::ProgressServiceError;

/// Cached learner progress with best-effort persistence.
///
/// The in-memory ledger is authoritative. Completions are written one step
/// at a time so flags already stored for a lesson are never replaced by the
/// cached record. A write that fails is queued per lesson and retried on the
/// next write or [`ProgressService::flush`], at most `retry_limit` attempts in
/// total, after which it is dropped with an error log.
pub struct ProgressService {
    repo: Arc<dyn ProgressRepository>,
    ledger: Mutex<ProgressLedger>,
    pending: Mutex<BTreeMap<LessonId, PendingWrite>>,
    retry_limit: u32,
}

/// Steps of one lesson not yet confirmed by the repository.
#[derive(Debug, Default)]
struct PendingWrite {
    steps: BTreeSet<StepId>,
    attempts: u32,
}

impl ProgressService {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>, retry_limit: u32) -> Self {
        Self {
            repo,
            ledger: Mutex::new(ProgressLedger::new()),
            pending: Mutex::new(BTreeMap::new()),
            retry_limit: retry_limit.max(1),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryKeyValueStore::new());
        Self::new(Arc::new(KvProgressRepository::new(store)), 3)
    }

    fn ledger(&self) -> MutexGuard<'_, ProgressLedger> {
        self.ledger
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, BTreeMap<LessonId, PendingWrite>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Read one lesson from storage without falling back.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Read` if the repository fails.
    pub async fn try_load(&self, lesson_id: LessonId) -> Result<LessonProgress, ProgressServiceError> {
        let stored = self
            .repo
            .get(lesson_id)
            .await
            .map_err(|source| ProgressServiceError::Read { lesson_id, source })?;
        let mut ledger = self.ledger();
        ledger.absorb(&stored);
        Ok(ledger.lesson_mut(lesson_id).clone())
    }

    /// Progress of one lesson, merged with what is already cached.
    /// A failed read is logged and yields the cached (possibly empty) record.
    pub async fn load_lesson(&self, lesson_id: LessonId) -> LessonProgress {
        match self.try_load(lesson_id).await {
            Ok(progress) => progress,
            Err(err) => {
                tracing::warn!(lesson_id = %lesson_id, error = %err, "using cached progress");
                self.ledger().lesson_mut(lesson_id).clone()
            }
        }
    }

    /// Load every catalog lesson that has a stored record and return a
    /// snapshot of the ledger. If the stored lessons cannot be listed, every
    /// catalog lesson is read instead.
    pub async fn load_all(&self, catalog: &Catalog) -> ProgressLedger {
        let stored = match self.repo.lessons().await {
            Ok(ids) => Some(ids.into_iter().collect::<BTreeSet<_>>()),
            Err(err) => {
                tracing::warn!(error = %err, "cannot list stored progress, reading every lesson");
                None
            }
        };
        for lesson in catalog.lessons() {
            if stored.as_ref().is_none_or(|ids| ids.contains(&lesson.id())) {
                self.load_lesson(lesson.id()).await;
            }
        }
        self.snapshot()
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressLedger {
        self.ledger().clone()
    }

    #[must_use]
    pub fn is_complete(&self, lesson_id: LessonId, step_id: StepId) -> bool {
        self.ledger().is_complete(lesson_id, step_id)
    }

    /// Mark a step complete and persist its flag.
    ///
    /// Returns `true` if the flag changed. Marking twice is harmless.
    pub async fn mark_complete(&self, lesson_id: LessonId, step_id: StepId) -> bool {
        let changed = self.ledger().lesson_mut(lesson_id).mark_complete(step_id);
        if changed {
            tracing::debug!(lesson_id = %lesson_id, step_id = %step_id, "step completed");
        }
        self.retry_queued(Some(lesson_id)).await;
        self.pending()
            .entry(lesson_id)
            .or_default()
            .steps
            .insert(step_id);
        self.persist(lesson_id).await;
        changed
    }

    /// Retry queued writes. Returns the number still queued afterwards.
    pub async fn flush(&self) -> usize {
        self.retry_queued(None).await;
        self.pending_writes()
    }

    async fn retry_queued(&self, skip: Option<LessonId>) {
        let queued: Vec<LessonId> = self
            .pending()
            .keys()
            .copied()
            .filter(|lesson_id| Some(*lesson_id) != skip)
            .collect();
        for lesson_id in queued {
            self.persist(lesson_id).await;
        }
    }

    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.pending().len()
    }

    /// Write the queued steps of a lesson, stopping at the first failure.
    async fn persist(&self, lesson_id: LessonId) {
        let steps: Vec<StepId> = match self.pending().get(&lesson_id) {
            Some(write) => write.steps.iter().copied().collect(),
            None => return,
        };
        for step_id in steps {
            if let Err(source) = self.repo.set(lesson_id, step_id, true).await {
                self.record_failure(lesson_id, source);
                return;
            }
            let mut pending = self.pending();
            if let Some(write) = pending.get_mut(&lesson_id) {
                write.steps.remove(&step_id);
                if write.steps.is_empty() {
                    pending.remove(&lesson_id);
                }
            }
        }
    }

    fn record_failure(&self, lesson_id: LessonId, source: StorageError) {
        let mut pending = self.pending();
        let Some(write) = pending.get_mut(&lesson_id) else {
            return;
        };
        write.attempts += 1;
        let err = ProgressServiceError::Write {
            lesson_id,
            attempt: write.attempts,
            source,
        };
        if write.attempts >= self.retry_limit {
            pending.remove(&lesson_id);
            tracing::error!(lesson_id = %lesson_id, error = %err, "dropping progress write");
        } else {
            tracing::warn!(lesson_id = %lesson_id, error = %err, "progress write queued for retry");
        }
    }
}
