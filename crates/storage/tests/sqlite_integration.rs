use lesson_core::model::{LessonId, StepId};
use storage::repository::{KeyValueStore, ProgressRepository, Storage};
use storage::sqlite::SqliteRepository;

#[tokio::test]
async fn sqlite_key_value_round_trip() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(repo.get("missing").await.unwrap(), None);

    repo.set("theme", "dark").await.unwrap();
    repo.set("theme", "light").await.unwrap();
    assert_eq!(repo.get("theme").await.unwrap().as_deref(), Some("light"));
    assert_eq!(repo.get("them").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_prefix_scan_treats_wildcards_literally() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_prefix?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    for key in ["lesson_2_progress", "lesson_1_progress", "lessonX1", "other"] {
        repo.set(key, "{}").await.unwrap();
    }

    assert_eq!(
        repo.keys_with_prefix("lesson_").await.unwrap(),
        vec!["lesson_1_progress".to_owned(), "lesson_2_progress".to_owned()]
    );
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate_twice?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.set("k", "v").await.unwrap();
    repo.migrate().await.expect("second migrate");
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn progress_survives_a_new_storage_handle() {
    let url = "sqlite:file:memdb_progress_reopen?mode=memory&cache=shared";
    let first = Storage::sqlite(url).await.expect("open");
    first
        .progress
        .set(LessonId::new(1), StepId::new(2), true)
        .await
        .unwrap();
    first
        .progress
        .set(LessonId::new(1), StepId::new(3), true)
        .await
        .unwrap();

    let second = Storage::sqlite(url).await.expect("reopen");
    let progress = second.progress.get(LessonId::new(1)).await.unwrap();
    assert!(progress.is_complete(StepId::new(2)));
    assert!(progress.is_complete(StepId::new(3)));
    assert_eq!(second.progress.lessons().await.unwrap(), vec![LessonId::new(1)]);

    let raw = second.kv.get("lesson_1_progress").await.unwrap().unwrap();
    assert_eq!(raw, r#"{"2":true,"3":true}"#);
}
