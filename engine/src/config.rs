use crate::EngineError;
use std::fmt;
use std::str::FromStr;

/// How a new RDS backup is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMode {
    /// Take an on-demand snapshot of the live instance.
    CreateSnapshot,
    /// Copy the newest automated snapshot under the backup name.
    CopyAutomatedSnapshot,
}

impl BackupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupMode::CreateSnapshot => "CREATE_SNAPSHOT",
            BackupMode::CopyAutomatedSnapshot => "COPY_AUTOMATED_SNAPSHOT",
        }
    }
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = s.strip_prefix("RDS_").unwrap_or(s);
        match mode {
            "CREATE_SNAPSHOT" => Ok(BackupMode::CreateSnapshot),
            "COPY_AUTOMATED_SNAPSHOT" => Ok(BackupMode::CopyAutomatedSnapshot),
            _ => Err(EngineError::Configuration(format!(
                "unsupported rds backup mode {s:?}: only {} and {} are supported, \
                 set it with the rds_backup_mode configuration option",
                BackupMode::CopyAutomatedSnapshot,
                BackupMode::CreateSnapshot
            ))),
        }
    }
}

/// Settings handed to an engine at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Region the engine discovers entities in and creates backups in.
    pub region: String,
    pub tag_prefix: String,
    /// Kept raw so an invalid value fails the backup call rather than startup.
    pub backup_mode: String,
}

impl EngineConfig {
    pub fn new(region: impl Into<String>, tag_prefix: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            tag_prefix: tag_prefix.into(),
            backup_mode: mode.into(),
        }
    }

    pub fn from_shelvery(config: &common::config::ShelveryConfig, region: impl Into<String>) -> Self {
        Self::new(region, config.tag_prefix.clone(), config.rds_backup_mode.clone())
    }

    pub fn mode(&self) -> Result<BackupMode, EngineError> {
        self.backup_mode.parse()
    }
}
