mod file;

pub use file::{
    load_config, load_config_from, render_config, AwsConfig, ShelveryConfig, WaitConfig,
    DEFAULT_BACKUP_MODE, DEFAULT_TAG_PREFIX,
};
