use crate::pagination::Page;
use crate::providers::{
    CopySnapshotRequest, DbInstance, DbSnapshot, RdsApi, SnapshotQuery,
};
use crate::tags::Tag;
use crate::EngineError;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_rds::config::Region;
use aws_sdk_rds::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_rds::Client;
use aws_smithy_types::DateTime;
use chrono::{TimeZone, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use tokio::sync::Mutex;

const DEFAULT_REGION: &str = "us-east-1";
const PAGE_SIZE: i32 = 100;

/// [`RdsApi`] backed by the AWS SDK, with one client per region.
pub struct RdsProvider {
    sdk_config: SdkConfig,
    default_region: String,
    clients: Mutex<HashMap<String, Client>>,
}

impl RdsProvider {
    /// Creates a new RDS provider
    ///
    /// Without an explicit region the AWS default chain (environment, profile) decides.
    pub async fn new(
        region: Option<String>,
        endpoint: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Self, EngineError> {
        let mut config_builder = aws_config::defaults(BehaviorVersion::v2025_01_17())
            .retry_config(aws_config::retry::RetryConfig::standard().with_max_attempts(3));

        if let Some(ref region) = region {
            config_builder = config_builder.region(Region::new(region.clone()));
        }

        // Add credentials if provided
        if let (Some(access_key), Some(secret_key)) = (access_key, secret_key) {
            let credentials = aws_credential_types::Credentials::new(
                access_key, secret_key, None, None, "explicit",
            );
            config_builder =
                config_builder.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        if let Some(ref endpoint) = endpoint {
            info!("Using custom endpoint: {endpoint}");
            config_builder = config_builder.endpoint_url(endpoint);
        }

        let sdk_config = config_builder.load().await;
        let default_region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        info!("Initializing RdsProvider for region {default_region}");

        Ok(Self {
            sdk_config,
            default_region,
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// The region used when the caller does not name one.
    pub fn default_region(&self) -> &str {
        &self.default_region
    }

    async fn client(&self, region: &str) -> Client {
        let mut clients = self.clients.lock().await;
        clients
            .entry(region.to_string())
            .or_insert_with(|| {
                debug!("Creating RDS client for region {region}");
                let conf = aws_sdk_rds::config::Builder::from(&self.sdk_config)
                    .region(Region::new(region.to_string()))
                    .build();
                Client::from_conf(conf)
            })
            .clone()
    }
}

fn to_utc(dt: &DateTime) -> Option<chrono::DateTime<Utc>> {
    Utc.timestamp_opt(dt.secs(), dt.subsec_nanos()).single()
}

fn convert_instance(instance: &aws_sdk_rds::types::DbInstance) -> Option<DbInstance> {
    Some(DbInstance {
        identifier: instance.db_instance_identifier()?.to_string(),
        arn: instance.db_instance_arn()?.to_string(),
        create_time: instance.instance_create_time().and_then(to_utc),
    })
}

fn convert_snapshot(snapshot: &aws_sdk_rds::types::DbSnapshot) -> Option<DbSnapshot> {
    Some(DbSnapshot {
        identifier: snapshot.db_snapshot_identifier()?.to_string(),
        arn: snapshot.db_snapshot_arn().unwrap_or_default().to_string(),
        instance_identifier: snapshot.db_instance_identifier().map(str::to_string),
        create_time: snapshot.snapshot_create_time().and_then(to_utc),
        status: snapshot.status().map(str::to_string),
        snapshot_type: snapshot.snapshot_type().map(str::to_string),
    })
}

fn returned_snapshot(
    operation: &str,
    snapshot: Option<&aws_sdk_rds::types::DbSnapshot>,
) -> Result<DbSnapshot, EngineError> {
    snapshot
        .and_then(convert_snapshot)
        .ok_or_else(|| EngineError::Provider(format!("{operation} returned no snapshot")))
}

/// Maps an SDK failure onto the engine's error kinds by its RDS error code.
fn map_rds_error<E, R>(operation: &str, target: &str, err: SdkError<E, R>) -> EngineError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().unwrap_or_default().to_string();
    let message = DisplayErrorContext(&err).to_string();
    match code.as_str() {
        "DBSnapshotNotFound" | "DBInstanceNotFound" => {
            EngineError::NotFound(format!("{target} ({operation})"))
        }
        "InvalidDBSnapshotState" | "InvalidDBInstanceState" => {
            EngineError::InvalidState(format!("{target}: {message}"))
        }
        "DBSnapshotAlreadyExists" => EngineError::AlreadyExists(target.to_string()),
        _ => {
            // the Sentry event comes from report_rds_error_to_sentry alone
            warn!("RDS {operation} failed for {target}: {message}");
            report_rds_error_to_sentry(operation, &message, target);
            EngineError::Provider(format!("{operation} {target}: {message}"))
        }
    }
}

#[async_trait]
impl RdsApi for RdsProvider {
    async fn describe_db_instances(
        &self,
        region: &str,
        marker: Option<String>,
    ) -> Result<Page<DbInstance>, EngineError> {
        let output = self
            .client(region)
            .await
            .describe_db_instances()
            .max_records(PAGE_SIZE)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| map_rds_error("describe_db_instances", region, e))?;

        Ok(Page {
            items: output
                .db_instances()
                .iter()
                .filter_map(convert_instance)
                .collect(),
            marker: output.marker().map(str::to_string),
        })
    }

    async fn describe_db_snapshots(
        &self,
        region: &str,
        query: &SnapshotQuery,
        marker: Option<String>,
    ) -> Result<Page<DbSnapshot>, EngineError> {
        let target = query.snapshot_id.as_deref().unwrap_or(region);
        let output = self
            .client(region)
            .await
            .describe_db_snapshots()
            .set_db_snapshot_identifier(query.snapshot_id.clone())
            .set_db_instance_identifier(query.instance_id.clone())
            .set_snapshot_type(query.snapshot_type.map(|t| t.as_str().to_string()))
            .max_records(PAGE_SIZE)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| map_rds_error("describe_db_snapshots", target, e))?;

        Ok(Page {
            items: output
                .db_snapshots()
                .iter()
                .filter_map(convert_snapshot)
                .collect(),
            marker: output.marker().map(str::to_string),
        })
    }

    async fn create_db_snapshot(
        &self,
        region: &str,
        snapshot_id: &str,
        instance_id: &str,
    ) -> Result<DbSnapshot, EngineError> {
        let output = self
            .client(region)
            .await
            .create_db_snapshot()
            .db_snapshot_identifier(snapshot_id)
            .db_instance_identifier(instance_id)
            .send()
            .await
            .map_err(|e| map_rds_error("create_db_snapshot", snapshot_id, e))?;
        returned_snapshot("create_db_snapshot", output.db_snapshot())
    }

    async fn copy_db_snapshot(
        &self,
        region: &str,
        request: &CopySnapshotRequest,
    ) -> Result<DbSnapshot, EngineError> {
        let output = self
            .client(region)
            .await
            .copy_db_snapshot()
            .source_db_snapshot_identifier(&request.source)
            .target_db_snapshot_identifier(&request.target_id)
            .copy_tags(request.copy_tags)
            .send()
            .await
            .map_err(|e| map_rds_error("copy_db_snapshot", &request.target_id, e))?;
        returned_snapshot("copy_db_snapshot", output.db_snapshot())
    }

    async fn delete_db_snapshot(&self, region: &str, snapshot_id: &str) -> Result<(), EngineError> {
        self.client(region)
            .await
            .delete_db_snapshot()
            .db_snapshot_identifier(snapshot_id)
            .send()
            .await
            .map_err(|e| map_rds_error("delete_db_snapshot", snapshot_id, e))?;
        Ok(())
    }

    async fn list_tags_for_resource(&self, region: &str, arn: &str) -> Result<Vec<Tag>, EngineError> {
        let output = self
            .client(region)
            .await
            .list_tags_for_resource()
            .resource_name(arn)
            .send()
            .await
            .map_err(|e| map_rds_error("list_tags_for_resource", arn, e))?;

        Ok(output
            .tag_list()
            .iter()
            .map(|t| Tag {
                key: t.key().map(str::to_string),
                value: t.value().map(str::to_string),
            })
            .collect())
    }

    async fn add_tags_to_resource(
        &self,
        region: &str,
        arn: &str,
        tags: Vec<Tag>,
    ) -> Result<(), EngineError> {
        let tags = tags
            .into_iter()
            .map(|t| {
                aws_sdk_rds::types::Tag::builder()
                    .set_key(t.key)
                    .set_value(t.value)
                    .build()
            })
            .collect::<Vec<_>>();

        self.client(region)
            .await
            .add_tags_to_resource()
            .resource_name(arn)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| map_rds_error("add_tags_to_resource", arn, e))?;
        Ok(())
    }

    async fn modify_db_snapshot_attribute(
        &self,
        region: &str,
        snapshot_id: &str,
        attribute: &str,
        values_to_add: Vec<String>,
    ) -> Result<(), EngineError> {
        self.client(region)
            .await
            .modify_db_snapshot_attribute()
            .db_snapshot_identifier(snapshot_id)
            .attribute_name(attribute)
            .set_values_to_add(Some(values_to_add))
            .send()
            .await
            .map_err(|e| map_rds_error("modify_db_snapshot_attribute", snapshot_id, e))?;
        Ok(())
    }
}

fn report_rds_error_to_sentry(operation: &str, message: &str, target: &str) {
    let mut extra = HashMap::new();
    extra.insert("service", "rds");
    extra.insert("target", target);

    let extra_json = serde_json::to_string(&extra).unwrap_or_default();
    let sentry_message = format!("{operation}: {message} | context: {extra_json}");
    sentry::capture_message(&sentry_message, sentry::Level::Error);
}
