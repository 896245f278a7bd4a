use crate::cli::RdsCommands;
use crate::providers::RdsProvider;
use crate::runner::{BackupRunner, RunReport, WaitPolicy};
use crate::{EngineConfig, EngineRegistry};
use anyhow::{bail, Context, Result};
use common::config::ShelveryConfig;
use log::info;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

const RDS_ENGINE: &str = "rds";

/// Loads the configuration, falling back to the standard locations.
pub fn load_config(config_path: Option<&Path>) -> Result<ShelveryConfig> {
    common::config::load_config_from(config_path).context("Failed to load configuration")
}

/// Builds the registry of every engine against the real provider APIs.
pub async fn build_registry(config: &ShelveryConfig) -> Result<EngineRegistry> {
    let provider = RdsProvider::new(
        config.region.clone(),
        config.aws.endpoint.clone(),
        config.aws.access_key.clone(),
        config.aws.secret_key.clone(),
    )
    .await?;
    let engine_config = EngineConfig::from_shelvery(config, provider.default_region());
    Ok(EngineRegistry::with_defaults(engine_config, Arc::new(provider)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn finish(report: &RunReport) -> Result<()> {
    print_json(report)?;
    if !report.is_success() {
        bail!("{} of {} operations failed", report.failed.len(), report.failed.len() + report.succeeded.len());
    }
    Ok(())
}

pub async fn list_engines(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = build_registry(&config).await?;
    for engine_type in registry.engine_types() {
        let engine = registry.get(&engine_type)?;
        println!("{engine_type}\t{}\t{}", engine.get_resource_type(), engine.region());
    }
    Ok(())
}

pub async fn run_rds(command: RdsCommands, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let RdsCommands::CreateBackups { mode: Some(mode), .. } = &command {
        config.rds_backup_mode = mode.clone();
    }

    let registry = build_registry(&config).await?;
    let engine = registry.get(RDS_ENGINE)?;
    let runner = BackupRunner::new(engine.clone(), WaitPolicy::from(&config.wait));
    let region_or_default =
        |region: Option<String>| region.unwrap_or_else(|| engine.region().to_string());

    match command {
        RdsCommands::CreateBackups { marker_tag, .. } => {
            let marker_tag = marker_tag.unwrap_or_else(|| config.marker_tag());
            info!("Creating {} backups for entities tagged {marker_tag}", engine.get_resource_type());
            let report = runner.create_backups(&marker_tag).await?;
            finish(&report)?;
        }
        RdsCommands::ListBackups { tag_prefix } => {
            let tag_prefix = tag_prefix.unwrap_or_else(|| config.tag_prefix.clone());
            let backups = engine.get_existing_backups(&tag_prefix).await?;
            print_json(&backups)?;
        }
        RdsCommands::DescribeBackup { backup_id, region } => {
            let backup = engine
                .get_backup_resource(&region_or_default(region), &backup_id)
                .await?;
            print_json(&backup)?;
        }
        RdsCommands::BackupStatus {
            backup_id,
            region,
            wait,
        } => {
            let region = region_or_default(region);
            if wait {
                runner.wait_until_available(&region, &backup_id).await?;
            }
            let available = engine.is_backup_available(&region, &backup_id).await?;
            println!("{}", if available { "available" } else { "pending" });
        }
        RdsCommands::ShareBackup {
            backup_id,
            accounts,
            region,
        } => {
            let region = region_or_default(region);
            for account in &accounts {
                engine
                    .share_backup_with_account(&region, &backup_id, account)
                    .await?;
            }
            info!("Shared {backup_id} with {} accounts", accounts.len());
        }
        RdsCommands::CopyBackup { backup_id, regions } => {
            let backup = engine.get_backup_resource(engine.region(), &backup_id).await?;
            let copies = runner.copy_backup(&backup, &regions).await?;
            print_json(&copies)?;
        }
        RdsCommands::DeleteBackup { backup_id, region } => {
            let backup = engine
                .get_backup_resource(&region_or_default(region), &backup_id)
                .await?;
            engine.delete_backup(&backup).await?;
            info!("Deleted {backup_id}");
        }
        RdsCommands::ProcessBackups => {
            let report = runner
                .process_existing(&config.share_with_accounts, &config.copy_to_regions)
                .await?;
            finish(&report)?;
        }
    }

    Ok(())
}
