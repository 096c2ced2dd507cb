use super::support::*;

#[tokio::test]
async fn duplicate_id_is_rejected_without_side_effects() {
    let mut registry = MigrationRegistry::new(FlakyStore::new());
    let (first, _) = ScriptedMigration::new("dup", "1").build();
    let (second, _) = ScriptedMigration::new("dup", "2").build();

    registry.register(first).unwrap();
    let err = registry.register(second).unwrap_err();

    assert!(matches!(err, MigrationError::DuplicateId(ref id) if id == "dup"));
    assert_eq!(registry.get_all().len(), 1);
}

#[tokio::test]
async fn versions_sort_lexicographically() {
    let (a, _) = ScriptedMigration::new("ten", "1.10.0").build();
    let (b, _) = ScriptedMigration::new("two", "1.2.0").build();
    let (c, _) = ScriptedMigration::new("zero", "1.0.0").build();
    let registry = registry_with(FlakyStore::new(), vec![a, b, c]);

    let ordered = registry.get_ordered_by_version();
    let versions: Vec<_> = ordered.iter().map(|d| d.metadata().version.as_str()).collect();
    assert_eq!(versions, vec!["1.0.0", "1.10.0", "1.2.0"]);
    for pair in ordered.windows(2) {
        assert!(pair[0].metadata().version <= pair[1].metadata().version);
    }
}

#[tokio::test]
async fn pending_excludes_completed_migrations() {
    let store = FlakyStore::new();
    let (c, _) = ScriptedMigration::new("C", "3").build();
    let (a, _) = ScriptedMigration::new("A", "1").build();
    let (b, _) = ScriptedMigration::new("B", "2").build();
    let registry = registry_with(store.clone(), vec![c, a, b]);

    registry
        .mark_as_executed("A", TENANT, &vowmigrate::MigrationStats::new(), MigrationStatus::Completed)
        .await
        .unwrap();

    let pending: Vec<_> = registry
        .get_pending_migrations(TENANT)
        .await
        .iter()
        .map(|d| d.id().to_string())
        .collect();
    assert_eq!(pending, vec!["B", "C"]);
    assert_eq!(registry.get_executed_migration_ids(TENANT).await, vec!["A"]);
}

#[tokio::test]
async fn list_with_status_joins_catalog_and_history() {
    let store = FlakyStore::new();
    let (a, _) = ScriptedMigration::new("A", "1").build();
    let (b, _) = ScriptedMigration::new("B", "2").behavior(Behavior::Throw).build();
    let (c, _) = ScriptedMigration::new("C", "3").build();
    let runner = runner_with(store.clone(), vec![a, b, c]);

    runner
        .run_multiple(&["A", "B"], &live().with_continue_on_error(true))
        .await;

    let entries = runner.registry().list_with_status(TENANT).await;
    let statuses: Vec<_> = entries.iter().map(|e| (e.migration.id.as_str(), e.status)).collect();
    assert_eq!(
        statuses,
        vec![
            ("A", MigrationStatus::Completed),
            ("B", MigrationStatus::Failed),
            ("C", MigrationStatus::Pending),
        ]
    );
    assert_eq!(entries[0].stats.as_ref().map(|s| s.items_updated), Some(3));
    assert!(entries[2].last_executed.is_none());
}

#[tokio::test]
async fn history_read_failure_lists_everything_pending() {
    let store = FlakyStore::new();
    let (a, _) = ScriptedMigration::new("A", "1").build();
    let runner = runner_with(store.clone(), vec![a]);
    runner.run_single("A", &live()).await.unwrap();

    store.set_fail_reads(true);
    let entries = runner.registry().list_with_status(TENANT).await;
    assert_eq!(entries[0].status, MigrationStatus::Pending);
    assert_eq!(runner.registry().get_status("A", TENANT).await, MigrationStatus::Pending);
}

#[tokio::test]
async fn tag_lookup() {
    let (a, _) = ScriptedMigration::new("A", "1").build();
    let registry = registry_with(FlakyStore::new(), vec![a]);
    assert!(registry.get_by_tag("rsvp").is_empty());
    assert!(registry.get("A").is_some());
}
