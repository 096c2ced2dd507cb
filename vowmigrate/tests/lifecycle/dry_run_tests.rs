use super::support::*;

#[tokio::test]
async fn dry_run_writes_no_record_and_skips_validation() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("a", "1").build();
    let runner = runner_with(store.clone(), vec![migration]);

    let result = runner
        .run_single("a", &dry().with_validate_after(true))
        .await
        .expect("dry run");

    assert!(result.success);
    assert!(result.validation_result.is_none());
    assert_eq!(calls.execute(), 1);
    assert_eq!(calls.validate(), 0);
    assert!(store.history(TENANT).await.is_empty());
}

#[tokio::test]
async fn dry_run_ignores_completed_history() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("a", "1").build();
    let runner = runner_with(store.clone(), vec![migration]);

    runner.run_single("a", &live()).await.unwrap();
    let first = runner.run_single("a", &dry()).await.unwrap();
    let second = runner.run_single("a", &dry()).await.unwrap();

    assert_eq!(first.stats.items_processed, 3);
    assert_eq!(second.stats.items_processed, 3);
    assert_eq!(first.stats.items_skipped, 0);
    assert_eq!(calls.execute(), 3);
    assert_eq!(store.history(TENANT).await.len(), 1);
}

#[tokio::test]
async fn failing_dry_run_records_nothing() {
    let store = FlakyStore::new();
    let (thrower, _) = ScriptedMigration::new("throws", "1").behavior(Behavior::Throw).build();
    let (item_errors, _) = ScriptedMigration::new("items", "2").behavior(Behavior::ItemErrors).build();
    let runner = runner_with(store.clone(), vec![thrower, item_errors]);

    let results = runner
        .run_multiple(&["throws", "items"], &dry().with_continue_on_error(true))
        .await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.success));
    assert!(store.history(TENANT).await.is_empty());
}

#[tokio::test]
async fn dry_run_pending_keeps_everything_pending() {
    let store = FlakyStore::new();
    let (a, _) = ScriptedMigration::new("a", "1").build();
    let (b, _) = ScriptedMigration::new("b", "2").build();
    let runner = runner_with(store.clone(), vec![a, b]);

    let results = runner.run_pending(&dry()).await;
    assert_eq!(results.len(), 2);
    assert_eq!(runner.registry().get_pending_migrations(TENANT).await.len(), 2);
}
