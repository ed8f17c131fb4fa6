use async_trait::async_trait;
use lesson_core::model::{LessonId, LessonProgress, StepId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── KEY-VALUE STORE ───────────────────────────────────────────────────────────
//

/// String key-value persistence offered by the host.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// All keys starting with `prefix`, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Map-backed store for tests and ephemeral sessions.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Persistence of per-lesson step completion flags.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Stored progress of a lesson; empty if nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or decoded.
    async fn get(&self, lesson_id: LessonId) -> Result<LessonProgress, StorageError>;

    /// Set one step's flag, keeping the others already stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or written.
    async fn set(
        &self,
        lesson_id: LessonId,
        step_id: StepId,
        completed: bool,
    ) -> Result<(), StorageError>;

    /// Lessons that have a stored record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be listed.
    async fn lessons(&self) -> Result<Vec<LessonId>, StorageError>;
}

const PROGRESS_KEY_PREFIX: &str = "lesson_";
const PROGRESS_KEY_SUFFIX: &str = "_progress";

/// Storage key of a lesson's progress map: `lesson_<id>_progress`.
#[must_use]
pub fn progress_key(lesson_id: LessonId) -> String {
    format!("{PROGRESS_KEY_PREFIX}{lesson_id}{PROGRESS_KEY_SUFFIX}")
}

fn lesson_from_key(key: &str) -> Option<LessonId> {
    key.strip_prefix(PROGRESS_KEY_PREFIX)?
        .strip_suffix(PROGRESS_KEY_SUFFIX)?
        .parse()
        .ok()
}

/// Progress stored as one JSON object `{"<stepId>": true, ...}` per lesson.
#[derive(Clone)]
pub struct KvProgressRepository {
    store: Arc<dyn KeyValueStore>,
}

impl KvProgressRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn decode(lesson_id: LessonId, key: &str, raw: &str) -> Result<LessonProgress, StorageError> {
        let map: HashMap<String, bool> =
            serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let mut flags = BTreeMap::new();
        for (raw_step, done) in map {
            match raw_step.parse::<StepId>() {
                Ok(step_id) => {
                    flags.insert(step_id, done);
                }
                Err(err) => {
                    tracing::warn!(key, step = %raw_step, error = %err, "ignoring malformed step id");
                }
            }
        }
        Ok(LessonProgress::from_flags(lesson_id, flags))
    }

    fn encode(progress: &LessonProgress) -> Result<String, StorageError> {
        let map: BTreeMap<String, bool> = progress
            .flags()
            .iter()
            .map(|(step_id, done)| (step_id.to_string(), *done))
            .collect();
        serde_json::to_string(&map).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn write(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        let key = progress_key(progress.lesson_id());
        let value = Self::encode(progress)?;
        self.store.set(&key, &value).await?;
        tracing::debug!(key, steps = progress.flags().len(), "saved lesson progress");
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for KvProgressRepository {
    async fn get(&self, lesson_id: LessonId) -> Result<LessonProgress, StorageError> {
        let key = progress_key(lesson_id);
        match self.store.get(&key).await? {
            Some(raw) => Self::decode(lesson_id, &key, &raw),
            None => Ok(LessonProgress::new(lesson_id)),
        }
    }

    async fn set(
        &self,
        lesson_id: LessonId,
        step_id: StepId,
        completed: bool,
    ) -> Result<(), StorageError> {
        let current = self.get(lesson_id).await?;
        let mut flags = current.flags().clone();
        flags.insert(step_id, completed);
        self.write(&LessonProgress::from_flags(lesson_id, flags)).await
    }

    async fn lessons(&self) -> Result<Vec<LessonId>, StorageError> {
        let keys = self.store.keys_with_prefix(PROGRESS_KEY_PREFIX).await?;
        Ok(keys.iter().filter_map(|key| lesson_from_key(key)).collect())
    }
}

//
// ─── STORAGE ───────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    /// Wire the progress repository onto an existing key-value store.
    #[must_use]
    pub fn from_store(kv: Arc<dyn KeyValueStore>) -> Self {
        let progress: Arc<dyn ProgressRepository> =
            Arc::new(KvProgressRepository::new(Arc::clone(&kv)));
        Self { kv, progress }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryKeyValueStore::new()))
    }
}
