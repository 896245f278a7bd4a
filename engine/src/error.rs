use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backup {backup_id} is missing provenance tag {tag}")]
    MissingProvenance { backup_id: String, tag: String },

    #[error("No automated snapshot exists for {entity_id}")]
    NoAutomatedSnapshot { entity_id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid tags: {0}")]
    InvalidTags(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl EngineError {
    /// Whether running the same operation again can succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidState(_) | EngineError::Timeout(_) | EngineError::Provider(_)
        )
    }
}
