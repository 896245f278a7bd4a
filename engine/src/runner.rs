//! Drives whole backup runs over a [`BackupEngine`].
//!
//! One entity or backup failing never stops the rest of a run: failures are
//! logged and recorded in the [`RunReport`] next to the successes.

use crate::{BackupEngine, BackupResource, EngineError};
use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for a backup to become available.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_attempts: 60,
        }
    }
}

impl From<&common::config::WaitConfig> for WaitPolicy {
    fn from(config: &common::config::WaitConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    /// Entity id or backup id the failure belongs to.
    pub subject: String,
    pub error: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub succeeded: Vec<BackupResource>,
    pub failed: Vec<Failure>,
}

impl RunReport {
    fn record(&mut self, subject: &str, outcome: Result<BackupResource, EngineError>) {
        match outcome {
            Ok(backup) => self.succeeded.push(backup),
            Err(e) => {
                error!("{subject}: {e}");
                self.failed.push(Failure {
                    subject: subject.to_string(),
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                });
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct BackupRunner {
    engine: Arc<dyn BackupEngine>,
    wait: WaitPolicy,
}

impl BackupRunner {
    pub fn new(engine: Arc<dyn BackupEngine>, wait: WaitPolicy) -> Self {
        Self { engine, wait }
    }

    /// Backs up every entity carrying `marker_tag` and tags each new backup.
    pub async fn create_backups(&self, marker_tag: &str) -> Result<RunReport, EngineError> {
        let engine = self.engine.as_ref();
        let entities = engine.get_entities_to_backup(marker_tag).await?;
        info!(
            "{} {} entities tagged with {marker_tag} in {}",
            entities.len(),
            engine.get_resource_type(),
            engine.region()
        );

        let mut report = RunReport::default();
        for entity in entities {
            let request = BackupResource::for_entity(engine.tag_prefix(), &entity, Utc::now());
            let outcome = self.create_one(request).await;
            report.record(&entity.entity_id, outcome);
        }
        Ok(report)
    }

    async fn create_one(&self, request: BackupResource) -> Result<BackupResource, EngineError> {
        let backup = self.engine.backup_resource(request).await?;
        self.engine.tag_backup_resource(&backup).await?;
        info!("Created backup {} in {}", backup.identifier(), backup.region);
        Ok(backup)
    }

    /// Polls until the backup is available or the policy runs out of attempts.
    pub async fn wait_until_available(&self, region: &str, backup_id: &str) -> Result<(), EngineError> {
        for attempt in 1..=self.wait.max_attempts {
            if self.engine.is_backup_available(region, backup_id).await? {
                return Ok(());
            }
            if attempt < self.wait.max_attempts {
                info!(
                    "Backup {backup_id} in {region} not available yet ({attempt}/{}), waiting {:?}",
                    self.wait.max_attempts, self.wait.poll_interval
                );
                tokio::time::sleep(self.wait.poll_interval).await;
            }
        }
        Err(EngineError::Timeout(format!(
            "backup {backup_id} in {region} not available after {} checks",
            self.wait.max_attempts
        )))
    }

    /// Grants restore permission on the backup to every account.
    pub async fn share_backup(
        &self,
        backup: &BackupResource,
        accounts: &[String],
    ) -> Result<(), EngineError> {
        if accounts.is_empty() {
            return Ok(());
        }
        let backup_id = backup.identifier();
        self.wait_until_available(&backup.region, backup_id).await?;
        for account in accounts {
            self.engine
                .share_backup_with_account(&backup.region, backup_id, account)
                .await?;
        }
        Ok(())
    }

    /// Copies the backup into every region and re-applies its provenance there.
    pub async fn copy_backup(
        &self,
        backup: &BackupResource,
        regions: &[String],
    ) -> Result<Vec<BackupResource>, EngineError> {
        let mut copies = Vec::new();
        let targets: Vec<&String> = regions.iter().filter(|r| **r != backup.region).collect();
        if targets.is_empty() {
            return Ok(copies);
        }

        let backup_id = backup.identifier();
        self.wait_until_available(&backup.region, backup_id).await?;
        for region in targets {
            let copied_id = self.engine.copy_backup_to_region(backup_id, region).await?;
            let mut copy = backup.with_region(region);
            copy.backup_id = Some(copied_id);
            self.engine.tag_backup_resource(&copy).await?;
            copies.push(copy);
        }
        Ok(copies)
    }

    /// Shares and copies every existing backup in the engine's region.
    pub async fn process_existing(
        &self,
        accounts: &[String],
        regions: &[String],
    ) -> Result<RunReport, EngineError> {
        let engine = self.engine.as_ref();
        let backups = engine.get_existing_backups(engine.tag_prefix()).await?;
        if accounts.is_empty() && regions.is_empty() {
            warn!("No accounts to share with and no regions to copy to");
        }

        let mut report = RunReport::default();
        for backup in backups {
            let outcome = async {
                self.share_backup(&backup, accounts).await?;
                self.copy_backup(&backup, regions).await?;
                Ok::<_, EngineError>(backup.clone())
            }
            .await;
            report.record(backup.identifier(), outcome);
        }
        Ok(report)
    }
}
