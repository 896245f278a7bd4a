
use crate::providers::SnapshotType;
use crate::runner::{BackupRunner, WaitPolicy};
use crate::tags::TagMap;
use crate::{
    BackupEngine, BackupResource, EngineConfig, EngineError, EngineRegistry, EntityResource,
    RdsBackupEngine,
};
use chrono::{TimeZone, Utc};
use fake::FakeRds;
use std::sync::Arc;
use std::time::Duration;

const REGION: &str = "eu-west-1";
const DR_REGION: &str = "us-west-2";
const PREFIX: &str = "shelvery";

fn rds_engine(fake: &Arc<FakeRds>, mode: &str) -> RdsBackupEngine {
    RdsBackupEngine::new(EngineConfig::new(REGION, PREFIX, mode), fake.clone())
}

fn request_for(entity_id: &str, name: &str) -> BackupResource {
    let entity = EntityResource::new(entity_id, REGION, None, TagMap::new());
    let mut request = BackupResource::for_entity(PREFIX, &entity, Utc::now());
    request.name = name.to_string();
    request
        .tags
        .insert(format!("{PREFIX}:name"), name.to_string());
    request
}

fn at_minute(minute: u32) -> Option<chrono::DateTime<Utc>> {
    Some(Utc.with_ymd_and_hms(2024, 1, 1, 3, minute, 0).unwrap())
}

fn fast_wait(max_attempts: u32) -> WaitPolicy {
    WaitPolicy {
        poll_interval: Duration::from_millis(1),
        max_attempts,
    }
}

mod discovery_tests {
    use super::*;

    #[tokio::test]
    async fn only_entities_with_exact_marker_key_are_returned() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[("shelvery:run", "true")]);
        fake.add_instance(REGION, "db-2", &[("shelvery:run-later", "true")]);
        fake.add_instance(REGION, "db-3", &[("shelvery:ru", "true"), ("env", "prod")]);
        fake.add_instance(REGION, "db-4", &[]);
        fake.add_instance(DR_REGION, "db-5", &[("shelvery:run", "true")]);

        let entities = rds_engine(&fake, "CREATE_SNAPSHOT")
            .get_entities_to_backup("shelvery:run")
            .await
            .unwrap();

        assert_eq!(entities.len(), 1);
        let entity = &entities[0];
        assert_eq!(entity.entity_id, "db-1");
        assert_eq!(entity.region, REGION);
        assert_eq!(entity.tags["shelvery:run"], "true");
        assert!(entity.date_created.is_some());
    }

    #[tokio::test]
    async fn discovery_follows_every_page() {
        let fake = Arc::new(FakeRds::with_page_size(3));
        for i in 0..10 {
            fake.add_instance(REGION, &format!("db-{i}"), &[("shelvery:run", "true")]);
        }
        fake.add_instance(REGION, "db-untagged", &[]);

        let entities = rds_engine(&fake, "CREATE_SNAPSHOT")
            .get_entities_to_backup("shelvery:run")
            .await
            .unwrap();

        assert_eq!(entities.len(), 10);
        assert_eq!(
            fake.instance_markers(),
            vec![
                None,
                Some("3".to_string()),
                Some("6".to_string()),
                Some("9".to_string())
            ]
        );
    }
}

mod backup_tests {
    use super::*;

    #[tokio::test]
    async fn create_snapshot_uses_backup_name_as_id() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[("shelvery:run", "true")]);

        let backup = rds_engine(&fake, "CREATE_SNAPSHOT")
            .backup_resource(request_for("db-1", "db-1-20240101"))
            .await
            .unwrap();

        assert_eq!(backup.backup_id.as_deref(), Some("db-1-20240101"));
        assert_eq!(backup.name, "db-1-20240101");
        assert_eq!(fake.snapshot_ids(REGION), vec!["db-1-20240101"]);
        assert_eq!(fake.mutations(), vec!["create:eu-west-1:db-1-20240101"]);
    }

    #[tokio::test]
    async fn existing_backup_name_is_treated_as_success() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[]);
        fake.add_snapshot(REGION, "db-1-20240101", "db-1", SnapshotType::Manual, at_minute(0), &[]);

        let backup = rds_engine(&fake, "CREATE_SNAPSHOT")
            .backup_resource(request_for("db-1", "db-1-20240101"))
            .await
            .unwrap();

        assert_eq!(backup.backup_id.as_deref(), Some("db-1-20240101"));
        assert_eq!(fake.snapshot_ids(REGION).len(), 1);
    }

    #[tokio::test]
    async fn copy_automated_takes_the_newest_snapshot_across_pages() {
        let fake = Arc::new(FakeRds::with_page_size(2));
        fake.add_instance(REGION, "db-1", &[]);
        fake.add_snapshot(REGION, "rds:db-1-a", "db-1", SnapshotType::Automated, at_minute(1), &[("env", "prod")]);
        fake.add_snapshot(REGION, "rds:db-1-b", "db-1", SnapshotType::Automated, at_minute(5), &[]);
        fake.add_snapshot(REGION, "db-1-manual", "db-1", SnapshotType::Manual, at_minute(50), &[]);
        fake.add_snapshot(REGION, "rds:db-1-c", "db-1", SnapshotType::Automated, at_minute(30), &[("env", "prod")]);
        fake.add_snapshot(REGION, "rds:db-2-a", "db-2", SnapshotType::Automated, at_minute(59), &[]);
        fake.add_snapshot(REGION, "rds:db-1-d", "db-1", SnapshotType::Automated, at_minute(10), &[]);

        let backup = rds_engine(&fake, "COPY_AUTOMATED_SNAPSHOT")
            .backup_resource(request_for("db-1", "db-1-20240101"))
            .await
            .unwrap();

        assert_eq!(backup.backup_id.as_deref(), Some("db-1-20240101"));
        assert_eq!(fake.mutations(), vec!["copy:eu-west-1:rds:db-1-c->db-1-20240101"]);
        assert!(fake.snapshot_tags(REGION, "db-1-20240101").unwrap().is_empty());
    }

    #[tokio::test]
    async fn copy_automated_without_candidates_fails_without_mutation() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[("shelvery:run", "true")]);
        fake.add_snapshot(REGION, "db-1-manual", "db-1", SnapshotType::Manual, at_minute(0), &[]);

        let err = rds_engine(&fake, "COPY_AUTOMATED_SNAPSHOT")
            .backup_resource(request_for("db-1", "db-1-20240101"))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::NoAutomatedSnapshot { ref entity_id } if entity_id == "db-1"));
        assert!(fake.mutations().is_empty());
    }

    #[tokio::test]
    async fn unknown_mode_fails_without_mutation() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[("shelvery:run", "true")]);

        for mode in ["", "SNAPSHOT_EVERYTHING"] {
            let err = rds_engine(&fake, mode)
                .backup_resource(request_for("db-1", "db-1-20240101"))
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Configuration(_)), "{mode:?}");
        }
        assert!(fake.mutations().is_empty());
        assert!(fake.snapshot_ids(REGION).is_empty());
    }

    #[tokio::test]
    async fn request_without_entity_is_rejected() {
        let fake = Arc::new(FakeRds::new());
        let mut request = request_for("db-1", "db-1-20240101");
        request.entity_id = None;

        let err = rds_engine(&fake, "CREATE_SNAPSHOT")
            .backup_resource(request)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }
}

mod catalog_tests {
    use super::*;

    #[tokio::test]
    async fn existing_backups_require_exact_marker_key() {
        let fake = Arc::new(FakeRds::with_page_size(2));
        fake.add_snapshot(
            REGION,
            "db-1-a",
            "db-1",
            SnapshotType::Manual,
            at_minute(0),
            &[("shelvery:backup-marker", "true"), ("shelvery:tag_name", "shelvery")],
        );
        fake.add_snapshot(REGION, "db-1-b", "db-1", SnapshotType::Manual, at_minute(1), &[("other:backup-marker", "true"), ("other:tag_name", "other")]);
        fake.add_snapshot(REGION, "db-1-c", "db-1", SnapshotType::Manual, at_minute(2), &[("shelvery:backup-marker-old", "true")]);
        fake.add_snapshot(REGION, "db-1-d", "db-1", SnapshotType::Manual, at_minute(3), &[("env", "prod")]);
        fake.add_snapshot(
            REGION,
            "db-2-a",
            "db-2",
            SnapshotType::Manual,
            at_minute(4),
            &[("shelvery:backup-marker", "true"), ("shelvery:tag_name", "shelvery"), ("shelvery:entity_id", "db-2")],
        );

        let backups = rds_engine(&fake, "CREATE_SNAPSHOT")
            .get_existing_backups(PREFIX)
            .await
            .unwrap();

        let ids: Vec<_> = backups.iter().map(|b| b.identifier().to_string()).collect();
        assert_eq!(ids, vec!["db-1-a", "db-2-a"]);
        assert_eq!(backups[1].entity_id.as_deref(), Some("db-2"));
    }

    #[tokio::test]
    async fn marked_backup_without_tag_name_is_reported() {
        let fake = Arc::new(FakeRds::new());
        fake.add_snapshot(REGION, "db-1-a", "db-1", SnapshotType::Manual, at_minute(0), &[("shelvery:backup-marker", "true")]);

        let err = rds_engine(&fake, "CREATE_SNAPSHOT")
            .get_existing_backups(PREFIX)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingProvenance { .. }));
    }

    #[tokio::test]
    async fn tagging_then_lookup_round_trips_tags() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[]);
        let engine = rds_engine(&fake, "CREATE_SNAPSHOT");

        let backup = engine
            .backup_resource(request_for("db-1", "db-1-20240101"))
            .await
            .unwrap();
        engine.tag_backup_resource(&backup).await.unwrap();

        let found = engine.get_backup_resource(REGION, "db-1-20240101").await.unwrap();
        assert_eq!(found.tags, backup.tags);
        assert_eq!(found.name, "db-1-20240101");
        assert_eq!(found.entity_id.as_deref(), Some("db-1"));
        assert_eq!(found.backup_id.as_deref(), Some("db-1-20240101"));
    }

    #[tokio::test]
    async fn lookup_distinguishes_missing_artifact_from_missing_provenance() {
        let fake = Arc::new(FakeRds::new());
        fake.add_snapshot(REGION, "foreign", "db-1", SnapshotType::Manual, at_minute(0), &[("env", "prod")]);
        let engine = rds_engine(&fake, "CREATE_SNAPSHOT");

        let err = engine.get_backup_resource(REGION, "foreign").await.unwrap_err();
        assert!(matches!(err, EngineError::MissingProvenance { ref tag, .. } if tag == "shelvery:tag_name"));

        let err = engine.get_backup_resource(REGION, "missing").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn tagging_unknown_artifact_is_not_found() {
        let fake = Arc::new(FakeRds::new());
        let mut backup = request_for("db-1", "db-1-20240101");
        backup.backup_id = Some("db-1-20240101".to_string());

        let err = rds_engine(&fake, "CREATE_SNAPSHOT")
            .tag_backup_resource(&backup)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(fake.mutations().is_empty());
    }

    #[tokio::test]
    async fn tagging_never_writes_outside_the_prefix() {
        let fake = Arc::new(FakeRds::new());
        fake.add_snapshot(REGION, "db-1-20240101", "db-1", SnapshotType::Manual, at_minute(0), &[("owner", "team-a")]);
        let mut backup = request_for("db-1", "db-1-20240101");
        backup.backup_id = Some("db-1-20240101".to_string());
        backup.tags.insert("owner".to_string(), "shelvery".to_string());

        let err = rds_engine(&fake, "CREATE_SNAPSHOT")
            .tag_backup_resource(&backup)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTags(_)));
        assert_eq!(fake.snapshot_tags(REGION, "db-1-20240101").unwrap()["owner"], "team-a");
    }

    #[tokio::test]
    async fn availability_follows_snapshot_status() {
        let fake = Arc::new(FakeRds::new());
        fake.add_snapshot(REGION, "db-1-a", "db-1", SnapshotType::Manual, at_minute(0), &[]);
        fake.set_pending(REGION, "db-1-a", 1);
        let engine = rds_engine(&fake, "CREATE_SNAPSHOT");

        assert!(!engine.is_backup_available(REGION, "db-1-a").await.unwrap());
        assert!(engine.is_backup_available(REGION, "db-1-a").await.unwrap());
        assert!(matches!(
            engine.is_backup_available(REGION, "missing").await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_a_backup_leaves_siblings_of_the_same_entity() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[]);
        let engine = rds_engine(&fake, "CREATE_SNAPSHOT");

        let first = engine
            .backup_resource(request_for("db-1", "db-1-20240101"))
            .await
            .unwrap();
        engine
            .backup_resource(request_for("db-1", "db-1-20240102"))
            .await
            .unwrap();

        engine.delete_backup(&first).await.unwrap();

        assert_eq!(fake.snapshot_ids(REGION), vec!["db-1-20240102"]);
        assert_eq!(fake.mutations().last().unwrap(), "delete:eu-west-1:db-1-20240101");
    }

    #[tokio::test]
    async fn deleting_a_copy_found_in_another_region_leaves_the_source() {
        let fake = Arc::new(FakeRds::new());
        let tags = [
            ("shelvery:tag_name", "shelvery"),
            ("shelvery:backup-marker", "true"),
            ("shelvery:region", REGION),
        ];
        fake.add_snapshot(REGION, "db-1-x", "db-1", SnapshotType::Manual, at_minute(0), &tags);
        fake.add_snapshot(DR_REGION, "db-1-x", "db-1", SnapshotType::Manual, at_minute(0), &tags);
        let engine = rds_engine(&fake, "CREATE_SNAPSHOT");

        let copy = engine.get_backup_resource(DR_REGION, "db-1-x").await.unwrap();
        assert_eq!(copy.region, DR_REGION);
        engine.delete_backup(&copy).await.unwrap();

        assert_eq!(fake.snapshot_ids(REGION), vec!["db-1-x"]);
        assert!(fake.snapshot_ids(DR_REGION).is_empty());
    }

    #[tokio::test]
    async fn sharing_grants_restore_to_the_account() {
        let fake = Arc::new(FakeRds::new());
        fake.add_snapshot(REGION, "db-1-a", "db-1", SnapshotType::Manual, at_minute(0), &[]);

        rds_engine(&fake, "CREATE_SNAPSHOT")
            .share_backup_with_account(REGION, "db-1-a", "210987654321")
            .await
            .unwrap();

        assert_eq!(fake.shared_with(REGION, "db-1-a"), vec!["210987654321"]);
        assert_eq!(fake.mutations(), vec!["restore:eu-west-1:db-1-a:210987654321"]);
    }
}

mod region_copy_tests {
    use super::*;

    #[tokio::test]
    async fn copy_keeps_id_and_leaves_tags_to_the_caller() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[]);
        let engine = rds_engine(&fake, "CREATE_SNAPSHOT");

        let backup = engine
            .backup_resource(request_for("db-1", "db-1-20240101"))
            .await
            .unwrap();
        engine.tag_backup_resource(&backup).await.unwrap();

        let copied_id = engine
            .copy_backup_to_region("db-1-20240101", DR_REGION)
            .await
            .unwrap();
        assert_eq!(copied_id, "db-1-20240101");
        assert!(fake.snapshot_tags(DR_REGION, &copied_id).unwrap().is_empty());
        assert!(matches!(
            engine.get_backup_resource(DR_REGION, &copied_id).await,
            Err(EngineError::MissingProvenance { .. })
        ));

        let mut copy = backup.with_region(DR_REGION);
        copy.backup_id = Some(copied_id.clone());
        engine.tag_backup_resource(&copy).await.unwrap();

        let found = engine.get_backup_resource(DR_REGION, &copied_id).await.unwrap();
        assert_eq!(found.tags, copy.tags);
        assert_eq!(found.region, DR_REGION);
    }

    #[tokio::test]
    async fn copying_a_missing_backup_is_not_found() {
        let fake = Arc::new(FakeRds::new());
        let err = rds_engine(&fake, "CREATE_SNAPSHOT")
            .copy_backup_to_region("missing", DR_REGION)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(fake.snapshot_ids(DR_REGION).is_empty());
    }
}

mod runner_tests {
    use super::*;

    #[tokio::test]
    async fn create_backups_reports_every_entity() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[("shelvery:create_backup", "true")]);
        fake.add_instance(REGION, "db-2", &[("shelvery:create_backup", "true")]);
        fake.add_instance(REGION, "db-3", &[]);
        fake.add_snapshot(REGION, "rds:db-1-a", "db-1", SnapshotType::Automated, at_minute(0), &[]);

        let engine = Arc::new(rds_engine(&fake, "COPY_AUTOMATED_SNAPSHOT"));
        let report = BackupRunner::new(engine, fast_wait(1))
            .create_backups("shelvery:create_backup")
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].subject, "db-2");
        assert!(!report.is_success());

        let backup = &report.succeeded[0];
        assert!(backup.name.starts_with("db-1-"));
        let tags = fake.snapshot_tags(REGION, backup.identifier()).unwrap();
        assert_eq!(tags["shelvery:backup-marker"], "true");
        assert_eq!(tags["shelvery:entity_id"], "db-1");
    }

    #[tokio::test]
    async fn waiting_polls_until_available() {
        let fake = Arc::new(FakeRds::new());
        fake.add_snapshot(REGION, "db-1-a", "db-1", SnapshotType::Manual, at_minute(0), &[]);
        fake.set_pending(REGION, "db-1-a", 2);
        let runner = BackupRunner::new(Arc::new(rds_engine(&fake, "CREATE_SNAPSHOT")), fast_wait(3));

        runner.wait_until_available(REGION, "db-1-a").await.unwrap();
    }

    #[tokio::test]
    async fn waiting_gives_up_after_max_attempts() {
        let fake = Arc::new(FakeRds::new());
        fake.add_snapshot(REGION, "db-1-a", "db-1", SnapshotType::Manual, at_minute(0), &[]);
        fake.set_pending(REGION, "db-1-a", 10);
        let runner = BackupRunner::new(Arc::new(rds_engine(&fake, "CREATE_SNAPSHOT")), fast_wait(3));

        let err = runner.wait_until_available(REGION, "db-1-a").await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn process_existing_shares_and_copies_with_provenance() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[("shelvery:create_backup", "true")]);
        let engine = Arc::new(rds_engine(&fake, "CREATE_SNAPSHOT"));
        let runner = BackupRunner::new(engine, fast_wait(2));

        let created = runner.create_backups("shelvery:create_backup").await.unwrap();
        let backup_id = created.succeeded[0].identifier().to_string();

        let accounts = vec!["210987654321".to_string()];
        let regions = vec![REGION.to_string(), DR_REGION.to_string()];
        let report = runner.process_existing(&accounts, &regions).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(fake.shared_with(REGION, &backup_id), accounts);
        assert_eq!(fake.snapshot_ids(DR_REGION), vec![backup_id.clone()]);

        let copied_tags = fake.snapshot_tags(DR_REGION, &backup_id).unwrap();
        assert_eq!(copied_tags["shelvery:region"], DR_REGION);
        assert_eq!(copied_tags["shelvery:entity_id"], "db-1");
    }

    #[tokio::test]
    async fn process_existing_copies_provenance_but_not_foreign_tags() {
        let fake = Arc::new(FakeRds::new());
        fake.add_instance(REGION, "db-1", &[("shelvery:create_backup", "true")]);
        let engine = Arc::new(rds_engine(&fake, "CREATE_SNAPSHOT"));
        let runner = BackupRunner::new(engine, fast_wait(2));

        let created = runner.create_backups("shelvery:create_backup").await.unwrap();
        let backup_id = created.succeeded[0].identifier().to_string();
        fake.tag_snapshot(REGION, &backup_id, "owner", "team-a");

        let report = runner
            .process_existing(&[], &[DR_REGION.to_string()])
            .await
            .unwrap();

        assert!(report.is_success(), "{:?}", report.failed);
        let copied_tags = fake.snapshot_tags(DR_REGION, &backup_id).unwrap();
        assert_eq!(copied_tags["shelvery:backup-marker"], "true");
        assert_eq!(copied_tags["shelvery:region"], DR_REGION);
        assert!(!copied_tags.contains_key("owner"));
        assert_eq!(fake.snapshot_tags(REGION, &backup_id).unwrap()["owner"], "team-a");
    }
}

mod registry_tests {
    use super::*;

    #[test]
    fn engines_are_looked_up_by_engine_type() {
        let fake = Arc::new(FakeRds::new());
        let registry =
            EngineRegistry::with_defaults(EngineConfig::new(REGION, PREFIX, "CREATE_SNAPSHOT"), fake);

        assert_eq!(registry.engine_types(), vec!["rds"]);
        let engine = registry.get("rds").unwrap();
        assert_eq!(engine.get_resource_type(), "RDS Instance");
        assert_eq!(engine.region(), REGION);

        assert!(matches!(registry.get("ebs"), Err(EngineError::Configuration(_))));
    }
}
