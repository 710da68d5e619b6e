use thiserror::Error;

/// Coarse classification of [`ForecastError`], for callers that branch on the
/// failure family rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingColumn,
    DataLoad,
    Aggregation,
    InsufficientData,
    ModelFit,
    Io,
}

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Mandatory {role} column '{column}' was not found in the input")]
    MissingColumn { role: String, column: String },

    #[error("Failed to load data: {0}")]
    DataLoad(String),

    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    #[error("Insufficient data: {details} ({available} periods available)")]
    InsufficientData { available: usize, details: String },

    #[error("Model fit failed: {0}")]
    ModelFit(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ForecastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingColumn { .. } => ErrorKind::MissingColumn,
            Self::DataLoad(_) | Self::Csv(_) => ErrorKind::DataLoad,
            Self::Aggregation(_) => ErrorKind::Aggregation,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::ModelFit(_) => ErrorKind::ModelFit,
            Self::SerializationError(_) | Self::IoError(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
