use crate::pagination::{collect_all, paginate};
use crate::providers::{
    CopySnapshotRequest, DbSnapshot, RdsApi, SnapshotQuery, RESTORE_ATTRIBUTE,
};
use crate::tags::{self, to_tag_list, to_tag_map};
use crate::{BackupEngine, BackupMode, BackupResource, EngineConfig, EngineError, EntityResource};
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use std::sync::Arc;

/// Backup engine for RDS database instances.
pub struct RdsBackupEngine {
    config: EngineConfig,
    api: Arc<dyn RdsApi>,
}

impl RdsBackupEngine {
    pub fn new(config: EngineConfig, api: Arc<dyn RdsApi>) -> Self {
        Self { config, api }
    }

    /// Looks up one snapshot by id, reading only the first page of the listing.
    async fn describe_snapshot(&self, region: &str, backup_id: &str) -> Result<DbSnapshot, EngineError> {
        let api = self.api.as_ref();
        let query = &SnapshotQuery::by_id(backup_id);
        let mut snapshots =
            Box::pin(paginate(move |marker| api.describe_db_snapshots(region, query, marker)));

        snapshots
            .next()
            .await
            .transpose()?
            .ok_or_else(|| EngineError::NotFound(format!("RDS snapshot {backup_id} in {region}")))
    }

    async fn backup_from_instance(
        &self,
        mut request: BackupResource,
    ) -> Result<BackupResource, EngineError> {
        let entity_id = source_entity(&request)?;
        let region = self.region();

        info!("Creating RDS snapshot {} of instance {entity_id}", request.name);
        match self
            .api
            .create_db_snapshot(region, &request.name, entity_id)
            .await
        {
            Ok(snapshot) => debug!("Snapshot {} is {:?}", snapshot.identifier, snapshot.status),
            Err(EngineError::AlreadyExists(_)) => {
                warn!("RDS snapshot {} already exists, reusing it", request.name)
            }
            Err(e) => return Err(e),
        }

        request.region = region.to_string();
        request.backup_id = Some(request.name.clone());
        Ok(request)
    }

    async fn backup_from_latest_automated(
        &self,
        mut request: BackupResource,
    ) -> Result<BackupResource, EngineError> {
        let entity_id = source_entity(&request)?;
        let region = self.region();
        let api = self.api.as_ref();
        let query = &SnapshotQuery::automated_for(entity_id);

        let candidates =
            collect_all(paginate(move |marker| api.describe_db_snapshots(region, query, marker)))
                .await?;
        let latest = latest_snapshot(candidates).ok_or_else(|| EngineError::NoAutomatedSnapshot {
            entity_id: entity_id.to_string(),
        })?;

        info!(
            "Copying automated snapshot {} of {entity_id} to {}",
            latest.identifier, request.name
        );
        let copy = CopySnapshotRequest {
            source: latest.identifier,
            target_id: request.name.clone(),
            copy_tags: false,
        };
        match api.copy_db_snapshot(region, &copy).await {
            Ok(_) => {}
            Err(EngineError::AlreadyExists(_)) => {
                warn!("RDS snapshot {} already exists, reusing it", request.name)
            }
            Err(e) => return Err(e),
        }

        request.region = region.to_string();
        request.backup_id = Some(request.name.clone());
        Ok(request)
    }
}

fn source_entity(request: &BackupResource) -> Result<&str, EngineError> {
    request.entity_id.as_deref().ok_or_else(|| {
        EngineError::InvalidRequest(format!("backup {} names no source instance", request.name))
    })
}

/// The newest snapshot; equal creation times go to the greatest identifier,
/// and snapshots still lacking a creation time rank oldest.
fn latest_snapshot(snapshots: Vec<DbSnapshot>) -> Option<DbSnapshot> {
    snapshots.into_iter().max_by(|a, b| {
        a.create_time
            .cmp(&b.create_time)
            .then_with(|| a.identifier.cmp(&b.identifier))
    })
}

#[async_trait]
impl BackupEngine for RdsBackupEngine {
    fn get_resource_type(&self) -> &str {
        "RDS Instance"
    }

    fn get_engine_type(&self) -> &str {
        "rds"
    }

    fn region(&self) -> &str {
        &self.config.region
    }

    fn tag_prefix(&self) -> &str {
        &self.config.tag_prefix
    }

    async fn get_entities_to_backup(
        &self,
        marker_tag: &str,
    ) -> Result<Vec<EntityResource>, EngineError> {
        let region = self.region();
        let api = self.api.as_ref();

        let instances =
            collect_all(paginate(move |marker| api.describe_db_instances(region, marker))).await?;
        info!("Found {} RDS instances in {region}", instances.len());

        let mut entities = Vec::new();
        for instance in instances {
            let tags = to_tag_map(api.list_tags_for_resource(region, &instance.arn).await?);
            if tags.contains_key(marker_tag) {
                debug!("RDS instance {} carries {marker_tag}", instance.identifier);
                entities.push(EntityResource::new(
                    instance.identifier,
                    region,
                    instance.create_time,
                    tags,
                ));
            } else {
                debug!("Skipping RDS instance {}", instance.identifier);
            }
        }
        Ok(entities)
    }

    async fn backup_resource(
        &self,
        request: BackupResource,
    ) -> Result<BackupResource, EngineError> {
        match self.config.mode()? {
            BackupMode::CreateSnapshot => self.backup_from_instance(request).await,
            BackupMode::CopyAutomatedSnapshot => self.backup_from_latest_automated(request).await,
        }
    }

    async fn tag_backup_resource(&self, backup: &BackupResource) -> Result<(), EngineError> {
        let backup_id = backup.backup_id.as_deref().ok_or_else(|| {
            EngineError::InvalidRequest(format!("backup {} has not been created", backup.name))
        })?;
        tags::validate_provenance(&backup.tag_prefix, backup_id, &backup.tags)?;

        let snapshot = self.describe_snapshot(&backup.region, backup_id).await?;
        info!(
            "Tagging RDS snapshot {backup_id} in {} with {} tags",
            backup.region,
            backup.tags.len()
        );
        self.api
            .add_tags_to_resource(&backup.region, &snapshot.arn, to_tag_list(&backup.tags))
            .await
    }

    async fn get_existing_backups(
        &self,
        tag_prefix: &str,
    ) -> Result<Vec<BackupResource>, EngineError> {
        let region = self.region();
        let api = self.api.as_ref();
        let query = &SnapshotQuery::default();

        let snapshots =
            collect_all(paginate(move |marker| api.describe_db_snapshots(region, query, marker)))
                .await?;

        let marker_key = tags::marker_key(tag_prefix);
        let mut backups = Vec::new();
        for snapshot in snapshots {
            debug!("Checking RDS snapshot {}", snapshot.identifier);
            let tags = to_tag_map(api.list_tags_for_resource(region, &snapshot.arn).await?);
            if tags.contains_key(&marker_key) {
                backups.push(BackupResource::construct(
                    tag_prefix,
                    &snapshot.identifier,
                    region,
                    tags,
                )?);
            }
        }
        info!("Found {} {tag_prefix} backups of RDS instances in {region}", backups.len());
        Ok(backups)
    }

    async fn get_backup_resource(
        &self,
        region: &str,
        backup_id: &str,
    ) -> Result<BackupResource, EngineError> {
        let snapshot = self.describe_snapshot(region, backup_id).await?;
        let tags = to_tag_map(self.api.list_tags_for_resource(region, &snapshot.arn).await?);
        BackupResource::construct(self.tag_prefix(), backup_id, region, tags)
    }

    async fn is_backup_available(&self, region: &str, backup_id: &str) -> Result<bool, EngineError> {
        let snapshot = self.describe_snapshot(region, backup_id).await?;
        debug!("RDS snapshot {backup_id} status {:?}", snapshot.status);
        Ok(snapshot.is_available())
    }

    async fn delete_backup(&self, backup: &BackupResource) -> Result<(), EngineError> {
        let backup_id = backup.identifier();
        info!("Deleting RDS snapshot {backup_id} in {}", backup.region);
        self.api.delete_db_snapshot(&backup.region, backup_id).await
    }

    async fn share_backup_with_account(
        &self,
        region: &str,
        backup_id: &str,
        account_id: &str,
    ) -> Result<(), EngineError> {
        info!("Sharing RDS snapshot {backup_id} in {region} with account {account_id}");
        self.api
            .modify_db_snapshot_attribute(
                region,
                backup_id,
                RESTORE_ATTRIBUTE,
                vec![account_id.to_string()],
            )
            .await
    }

    async fn copy_backup_to_region(
        &self,
        backup_id: &str,
        target_region: &str,
    ) -> Result<String, EngineError> {
        let source_region = self.region();
        let snapshot = self.describe_snapshot(source_region, backup_id).await?;

        info!("Copying RDS snapshot {backup_id} from {source_region} to {target_region}");
        let copy = CopySnapshotRequest {
            source: snapshot.arn,
            target_id: backup_id.to_string(),
            // provenance is re-applied explicitly in the destination
            copy_tags: false,
        };
        match self.api.copy_db_snapshot(target_region, &copy).await {
            Ok(_) => {}
            Err(EngineError::AlreadyExists(_)) => {
                warn!("RDS snapshot {backup_id} already exists in {target_region}")
            }
            Err(e) => return Err(e),
        }
        Ok(backup_id.to_string())
    }
}
