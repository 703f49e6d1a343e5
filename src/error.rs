use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatSqlError {
    /// A required semantic-request parameter was absent. Raised before any network call.
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Database connection is closed")]
    NotConnected,

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChatSqlError>;
