use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Aggregation error: {message}")]
    Aggregation { message: String },

    #[error("Cannot parse date from field '{field}': {value:?}")]
    InvalidDate { field: String, value: String },

    #[error("Unknown query: {0}")]
    UnknownQuery(String),
}

impl AnalyticsError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn aggregation(message: impl Into<String>) -> Self {
        Self::Aggregation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
