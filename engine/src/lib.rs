//! Tag-driven backup engines for managed cloud resources.
//!
//! Every resource type gets a [`BackupEngine`] implementation that discovers
//! entities carrying a marker tag, creates snapshots for them, records
//! provenance in snapshot tags, and shares or copies those snapshots to other
//! accounts and regions. All durable state lives in the provider's catalog.

pub mod cli;
mod config;
pub mod engines;
mod error;
pub mod pagination;
pub mod providers;
mod registry;
pub mod runner;
pub mod tags;
mod types;

pub use config::{BackupMode, EngineConfig};
pub use engines::RdsBackupEngine;
pub use error::EngineError;
pub use registry::EngineRegistry;
pub use types::*;

use async_trait::async_trait;

/// Lifecycle operations every resource-type adapter provides.
#[async_trait]
pub trait BackupEngine: Send + Sync + 'static {
    /// Human readable resource label for logs and reports.
    fn get_resource_type(&self) -> &str;

    /// Stable key the engine is registered and configured under.
    fn get_engine_type(&self) -> &str;

    /// The region entities are discovered and backed up in.
    fn region(&self) -> &str;

    /// The tag namespace provenance is written under.
    fn tag_prefix(&self) -> &str;

    /// Lists every entity in the engine's region whose tags contain `marker_tag`.
    async fn get_entities_to_backup(
        &self,
        marker_tag: &str,
    ) -> Result<Vec<EntityResource>, EngineError>;

    /// Creates a backup for `request`, returning it with `backup_id` set.
    async fn backup_resource(&self, request: BackupResource)
        -> Result<BackupResource, EngineError>;

    /// Writes `backup.tags` onto the artifact in `backup.region`.
    async fn tag_backup_resource(&self, backup: &BackupResource) -> Result<(), EngineError>;

    /// Lists every backup in the engine's region marked with `{tag_prefix}:backup-marker`.
    async fn get_existing_backups(
        &self,
        tag_prefix: &str,
    ) -> Result<Vec<BackupResource>, EngineError>;

    async fn get_backup_resource(
        &self,
        region: &str,
        backup_id: &str,
    ) -> Result<BackupResource, EngineError>;

    async fn is_backup_available(&self, region: &str, backup_id: &str) -> Result<bool, EngineError>;

    async fn delete_backup(&self, backup: &BackupResource) -> Result<(), EngineError>;

    async fn share_backup_with_account(
        &self,
        region: &str,
        backup_id: &str,
        account_id: &str,
    ) -> Result<(), EngineError>;

    /// Copies a backup into `target_region` under the same id. Tags are not carried over.
    async fn copy_backup_to_region(
        &self,
        backup_id: &str,
        target_region: &str,
    ) -> Result<String, EngineError>;
}

#[cfg(test)]
mod tests;
