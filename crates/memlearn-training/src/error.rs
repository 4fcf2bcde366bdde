use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("unknown dataset: {0} (see --list_dataset for available datasets)")]
    UnknownDataset(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("extension {name} failed: {message}")]
    Extension { name: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrainingError {
    pub(crate) fn recorder(err: &burn::record::RecorderError) -> Self {
        Self::Checkpoint(format!("{err:?}"))
    }

    pub(crate) fn extension(name: &str, message: impl std::fmt::Display) -> Self {
        Self::Extension { name: name.to_string(), message: message.to_string() }
    }
}
