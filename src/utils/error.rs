use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("resource '{name}' does not exist in the data directory")]
    ResourceNotFound { name: String },

    #[error("malformed record in '{resource}': {detail}")]
    MalformedRecord { resource: String, detail: String },

    #[error("no {entity} with id '{id}' found")]
    NotFound { entity: String, id: String },

    #[error("invalid value for {field} ('{value}'): {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StudyError>;
