use crate::engines::RdsBackupEngine;
use crate::providers::RdsApi;
use crate::{BackupEngine, EngineConfig, EngineError};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;

/// Engines keyed by [`BackupEngine::get_engine_type`].
#[derive(Default, Clone)]
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn BackupEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in engine.
    pub fn with_defaults(config: EngineConfig, rds: Arc<dyn RdsApi>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RdsBackupEngine::new(config, rds)));
        registry
    }

    /// Adds an engine, replacing any engine registered under the same type.
    pub fn register(&mut self, engine: Arc<dyn BackupEngine>) {
        let key = engine.get_engine_type().to_string();
        info!("Registering {} engine as {key}", engine.get_resource_type());
        self.engines.insert(key, engine);
    }

    pub fn get(&self, engine_type: &str) -> Result<Arc<dyn BackupEngine>, EngineError> {
        self.engines.get(engine_type).cloned().ok_or_else(|| {
            EngineError::Configuration(format!(
                "no backup engine registered for {engine_type:?} (known: {})",
                self.engine_types().join(", ")
            ))
        })
    }

    pub fn engine_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.engines.keys().cloned().collect();
        types.sort();
        types
    }
}
