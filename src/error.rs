use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Row {row}: {message}")]
    Normalization { row: usize, message: String },

    #[error("Invalid date: {0}")]
    DateParse(String),

    #[error("Invalid window format: {0}")]
    WindowParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data source error for {member}: {message}")]
    Source { member: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
