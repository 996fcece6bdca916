use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("no document found with id {0}")]
    NotFound(String),

    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),
}
