use thiserror::Error;

pub type BanditResult<T> = Result<T, BanditError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BanditError {
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Model already exists: {0}")]
    AlreadyExists(String),

    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Context dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Reward must be a finite number, got {0}")]
    InvalidReward(f64),

    #[error("Context must contain only finite values")]
    InvalidContext,

    #[error("Version conflict on {model}: expected counter {expected}, found {actual}")]
    VersionConflict {
        model: String,
        expected: u64,
        actual: u64,
    },

    #[error("Update to {model} abandoned after {attempts} conflicting attempts")]
    Conflict { model: String, attempts: u32 },

    #[error("Model store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Stored model state is corrupt: {0}")]
    CorruptState(String),
}

impl BanditError {
    /// Whether the service may retry the read-compute-write cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, BanditError::VersionConflict { .. })
    }
}

impl From<serde_json::Error> for BanditError {
    fn from(err: serde_json::Error) -> Self {
        BanditError::CorruptState(err.to_string())
    }
}
