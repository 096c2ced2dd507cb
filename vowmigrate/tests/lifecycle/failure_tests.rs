use super::support::*;

#[tokio::test]
async fn thrown_error_becomes_failed_result_and_record() {
    let store = FlakyStore::new();
    let (migration, _) = ScriptedMigration::new("explodes", "1").behavior(Behavior::Throw).build();
    let runner = runner_with(store.clone(), vec![migration]);

    let result = runner.run_single("explodes", &live()).await.expect("errors are captured");

    assert!(!result.success);
    assert_eq!(result.stats.errors.len(), 1);
    assert_eq!(result.stats.errors[0].id, "explodes");
    assert_eq!(result.stats.errors[0].error, "guest table exploded");
    assert!(result.stats.is_finalized());

    let history = store.history(TENANT).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, MigrationStatus::Failed);
    assert_eq!(history[0].error.as_deref(), Some("guest table exploded"));
    assert!(!runner.registry().is_executed("explodes", TENANT).await);
}

#[tokio::test]
async fn item_errors_fail_the_migration() {
    let store = FlakyStore::new();
    let (migration, _) = ScriptedMigration::new("items", "1").behavior(Behavior::ItemErrors).build();
    let runner = runner_with(store.clone(), vec![migration]);

    let result = runner.run_single("items", &live()).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.stats.items_processed, 3);
    assert_eq!(result.stats.items_updated, 2);
    assert_eq!(result.stats.errors[0].id, "item-0");

    let history = store.history(TENANT).await;
    assert_eq!(history[0].status, MigrationStatus::Failed);
    assert_eq!(history[0].error.as_deref(), Some("unreadable answer"));
    assert!(history[0].stats.is_some());
}

#[tokio::test]
async fn can_run_false_is_fatal_and_unrecorded() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("blocked", "1").behavior(Behavior::Blocked).build();
    let runner = runner_with(store.clone(), vec![migration]);

    let err = runner.run_single("blocked", &live()).await.unwrap_err();

    assert!(matches!(err, MigrationError::PrerequisiteFailed { ref id } if id == "blocked"));
    assert_eq!(calls.can_run(), 1);
    assert_eq!(calls.execute(), 0);
    assert!(store.history(TENANT).await.is_empty());
}

#[tokio::test]
async fn can_run_is_checked_in_dry_run_too() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("blocked", "1").behavior(Behavior::Blocked).build();
    let runner = runner_with(store.clone(), vec![migration]);

    assert!(runner.run_single("blocked", &dry()).await.is_err());
    assert_eq!(calls.execute(), 0);
}

#[tokio::test]
async fn unknown_migration_is_not_found() {
    let runner = runner_with(FlakyStore::new(), Vec::new());
    let err = runner.run_single("ghost", &live()).await.unwrap_err();
    assert!(matches!(err, MigrationError::NotFound(ref id) if id == "ghost"));
}

#[tokio::test]
async fn failed_validation_marks_result_failed() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("drift", "1").behavior(Behavior::Drift).build();
    let runner = runner_with(store.clone(), vec![migration]);

    let result = runner
        .run_single("drift", &live().with_validate_after(true))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(calls.validate(), 1);
    let validation = result.validation_result.expect("validation attached");
    assert!(!validation.is_valid);
    assert_eq!(validation.inconsistencies, 1);

    let history = store.history(TENANT).await;
    assert_eq!(history[0].status, MigrationStatus::Failed);
    assert_eq!(
        history[0].error.as_deref(),
        Some("validation failed with 1 inconsistencies")
    );
}

#[tokio::test]
async fn validation_is_skipped_unless_requested() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("drift", "1").behavior(Behavior::Drift).build();
    let runner = runner_with(store.clone(), vec![migration]);

    let result = runner.run_single("drift", &live()).await.unwrap();

    assert!(result.success);
    assert_eq!(calls.validate(), 0);
    assert_eq!(store.history(TENANT).await[0].status, MigrationStatus::Completed);
}

#[tokio::test]
async fn failure_record_write_errors_are_swallowed() {
    let store = FlakyStore::new();
    let (migration, _) = ScriptedMigration::new("explodes", "1").behavior(Behavior::Throw).build();
    let runner = runner_with(store.clone(), vec![migration]);
    store.set_fail_writes(true);

    let result = runner.run_single("explodes", &live()).await.expect("swallowed");
    assert!(!result.success);
    assert!(store.history(TENANT).await.is_empty());
}

#[tokio::test]
async fn completion_record_write_error_keeps_counters() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("a", "1").build();
    let runner = runner_with(store.clone(), vec![migration]);
    store.set_fail_writes(true);

    let result = runner.run_single("a", &live()).await.expect("write failure is reported in the result");
    assert!(!result.success);
    assert_eq!(result.stats.items_processed, 3);
    assert_eq!(result.stats.items_updated, 3);
    assert_eq!(result.stats.errors.len(), 1);
    assert_eq!(result.stats.errors[0].id, "a");
    assert!(result.stats.errors[0].error.contains("history write failed"));
    assert_eq!(calls.execute(), 1);
    assert!(store.history(TENANT).await.is_empty());
    assert!(!runner.registry().is_executed("a", TENANT).await);

    let results = runner.run_multiple(&["a"], &live()).await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(results[0].stats.items_updated, 3);
    assert_eq!(calls.execute(), 2);
}

#[tokio::test]
async fn rollback_record_write_error_keeps_counters() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("a", "1").with_rollback().build();
    let runner = runner_with(store.clone(), vec![migration]);
    runner.run_single("a", &live()).await.unwrap();
    store.set_fail_writes(true);

    let result = runner.rollback("a", &live()).await.expect("write failure is reported in the result");
    assert!(!result.success);
    assert_eq!(result.stats.items_updated, 3);
    assert_eq!(result.stats.errors[0].id, "a");
    assert_eq!(calls.rollback(), 1);
    assert_eq!(runner.registry().get_status("a", TENANT).await, MigrationStatus::Completed);
}
