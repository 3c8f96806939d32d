use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("file is too large: {size} bytes (limit {limit} bytes)")]
    Oversize { size: u64, limit: u64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Trims `text` and rejects it when nothing is left.
pub fn require_text(field: &str, text: &str) -> StoreResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }

    Ok(trimmed.to_string())
}
