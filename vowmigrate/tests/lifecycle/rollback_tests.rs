use super::support::*;

#[tokio::test]
async fn rollback_makes_migration_pending_again() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("A", "1").with_rollback().build();
    let runner = runner_with(store.clone(), vec![migration]);

    runner.run_single("A", &live()).await.unwrap();
    assert!(runner.registry().get_pending_migrations(TENANT).await.is_empty());

    let result = runner.rollback("A", &live()).await.expect("rollback");
    assert!(result.success);
    assert_eq!(calls.rollback(), 1);
    assert_eq!(runner.registry().get_status("A", TENANT).await, MigrationStatus::RolledBack);
    assert_eq!(runner.registry().get_pending_migrations(TENANT).await.len(), 1);

    let rerun = runner.run_single("A", &live()).await.unwrap();
    assert_eq!(rerun.stats.items_processed, 3);
    assert_eq!(calls.execute(), 2);
    assert!(runner.registry().is_executed("A", TENANT).await);
}

#[tokio::test]
async fn rollback_requires_support() {
    let (migration, _) = ScriptedMigration::new("A", "1").build();
    let runner = runner_with(FlakyStore::new(), vec![migration]);

    let err = runner.rollback("A", &live()).await.unwrap_err();
    assert!(matches!(err, MigrationError::RollbackUnsupported(ref id) if id == "A"));
}

#[tokio::test]
async fn dry_run_rollback_records_nothing() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("A", "1").with_rollback().build();
    let runner = runner_with(store.clone(), vec![migration]);
    runner.run_single("A", &live()).await.unwrap();

    runner.rollback("A", &dry()).await.unwrap();
    assert_eq!(calls.rollback(), 1);
    assert_eq!(store.history(TENANT).await.len(), 1);
    assert!(runner.registry().is_executed("A", TENANT).await);
}

#[tokio::test]
async fn runner_never_rolls_back_on_failure() {
    let store = FlakyStore::new();
    let (migration, calls) = ScriptedMigration::new("A", "1")
        .behavior(Behavior::Throw)
        .with_rollback()
        .build();
    let runner = runner_with(store.clone(), vec![migration]);

    runner.run_multiple(&["A"], &live()).await;
    assert_eq!(calls.rollback(), 0);
}
