use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("remote call failed: {0}")]
    Remote(String),
}

impl ServiceError {
    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{context}: {err}"))
    }

    pub fn remote(action: &str, err: impl std::fmt::Display) -> Self {
        Self::Remote(format!("{action}: {err}"))
    }
}
