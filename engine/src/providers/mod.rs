//! The provider API boundary the engines are written against.

pub mod aws;

pub use aws::RdsProvider;

use crate::pagination::Page;
use crate::tags::Tag;
use crate::EngineError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub const SNAPSHOT_STATUS_AVAILABLE: &str = "available";
pub const RESTORE_ATTRIBUTE: &str = "restore";

#[derive(Debug, Clone, PartialEq)]
pub struct DbInstance {
    pub identifier: String,
    pub arn: String,
    pub create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbSnapshot {
    pub identifier: String,
    pub arn: String,
    pub instance_identifier: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub snapshot_type: Option<String>,
}

impl DbSnapshot {
    pub fn is_available(&self) -> bool {
        self.status.as_deref() == Some(SNAPSHOT_STATUS_AVAILABLE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotType {
    Automated,
    Manual,
}

impl SnapshotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotType::Automated => "automated",
            SnapshotType::Manual => "manual",
        }
    }
}

/// Filters for `describe_db_snapshots`; every field left `None` matches all snapshots.
#[derive(Debug, Clone, Default)]
pub struct SnapshotQuery {
    pub snapshot_id: Option<String>,
    pub instance_id: Option<String>,
    pub snapshot_type: Option<SnapshotType>,
}

impl SnapshotQuery {
    pub fn by_id(snapshot_id: &str) -> Self {
        Self {
            snapshot_id: Some(snapshot_id.to_string()),
            ..Self::default()
        }
    }

    pub fn automated_for(instance_id: &str) -> Self {
        Self {
            instance_id: Some(instance_id.to_string()),
            snapshot_type: Some(SnapshotType::Automated),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CopySnapshotRequest {
    /// Snapshot identifier, or ARN when copying across regions.
    ///
    /// The request is sent to the destination region; an ARN source names the
    /// region it is copied from.
    pub source: String,
    pub target_id: String,
    pub copy_tags: bool,
}

/// RDS snapshot catalog operations, each addressed to an explicit region.
///
/// Implementations own retry and backoff for throttling and transient failures.
#[async_trait]
pub trait RdsApi: Send + Sync + 'static {
    async fn describe_db_instances(
        &self,
        region: &str,
        marker: Option<String>,
    ) -> Result<Page<DbInstance>, EngineError>;

    async fn describe_db_snapshots(
        &self,
        region: &str,
        query: &SnapshotQuery,
        marker: Option<String>,
    ) -> Result<Page<DbSnapshot>, EngineError>;

    async fn create_db_snapshot(
        &self,
        region: &str,
        snapshot_id: &str,
        instance_id: &str,
    ) -> Result<DbSnapshot, EngineError>;

    async fn copy_db_snapshot(
        &self,
        region: &str,
        request: &CopySnapshotRequest,
    ) -> Result<DbSnapshot, EngineError>;

    async fn delete_db_snapshot(&self, region: &str, snapshot_id: &str) -> Result<(), EngineError>;

    async fn list_tags_for_resource(&self, region: &str, arn: &str) -> Result<Vec<Tag>, EngineError>;

    async fn add_tags_to_resource(
        &self,
        region: &str,
        arn: &str,
        tags: Vec<Tag>,
    ) -> Result<(), EngineError>;

    async fn modify_db_snapshot_attribute(
        &self,
        region: &str,
        snapshot_id: &str,
        attribute: &str,
        values_to_add: Vec<String>,
    ) -> Result<(), EngineError>;
}
