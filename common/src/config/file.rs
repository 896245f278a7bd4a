use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TAG_PREFIX: &str = "shelvery";
pub const DEFAULT_BACKUP_MODE: &str = "COPY_AUTOMATED_SNAPSHOT";

const CONFIG_PATHS: [&str; 3] = [
    "/etc/shelvery/shelvery.toml",
    "~/.config/shelvery/shelvery.toml",
    "shelvery.toml",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShelveryConfig {
    /// Namespace for every provenance tag written onto a backup.
    pub tag_prefix: String,
    /// Tag key that opts an entity into backups. Defaults to `{tag_prefix}:create_backup`.
    pub marker_tag: Option<String>,
    /// Raw RDS backup mode; validated when a backup is requested.
    pub rds_backup_mode: String,
    /// Region the engines operate in. Falls back to the AWS default chain.
    pub region: Option<String>,
    #[serde(default)]
    pub share_with_accounts: Vec<String>,
    #[serde(default)]
    pub copy_to_regions: Vec<String>,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaitConfig {
    pub poll_interval_secs: u64,
    pub max_attempts: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            max_attempts: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AwsConfig {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl ShelveryConfig {
    pub fn marker_tag(&self) -> String {
        match &self.marker_tag {
            Some(tag) if !tag.is_empty() => tag.clone(),
            _ => format!("{}:create_backup", self.tag_prefix),
        }
    }

    /// Parses a configuration from TOML text on top of the defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        defaults()?
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("tag_prefix", DEFAULT_TAG_PREFIX)?
        .set_default("marker_tag", None::<String>)?
        .set_default("rds_backup_mode", DEFAULT_BACKUP_MODE)?
        .set_default("region", None::<String>)?
        .set_default("share_with_accounts", Vec::<String>::new())?
        .set_default("copy_to_regions", Vec::<String>::new())?
        .set_default("wait.poll_interval_secs", 30)?
        .set_default("wait.max_attempts", 60)
}

/// Loads the configuration from the standard locations and `SHELVERY_*` environment variables.
pub fn load_config() -> Result<ShelveryConfig, ConfigError> {
    load_config_from(None)
}

/// Like [`load_config`], with an extra file that takes precedence over the standard locations.
pub fn load_config_from(explicit: Option<&Path>) -> Result<ShelveryConfig, ConfigError> {
    let config_builder = CONFIG_PATHS.iter().fold(defaults()?, |builder, path| {
        let path = shellexpand::full(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_string());
        if Path::new(&path).exists() {
            info!("Loading configuration from {path}");
            builder.add_source(File::with_name(&path))
        } else {
            debug!("Configuration file {path} not present, skipping");
            builder
        }
    });

    let config_builder = match explicit {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            config_builder.add_source(File::from(path).required(true))
        }
        None => config_builder,
    };

    config_builder
        .add_source(
            Environment::with_prefix("SHELVERY")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("share_with_accounts")
                .with_list_parse_key("copy_to_regions")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// Renders the effective configuration as TOML.
pub fn render_config(config: &ShelveryConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}
