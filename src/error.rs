use thiserror::Error;

/// Failures surfaced by the placement engine and its collaborators.
///
/// Collision rejections and queue exhaustion are not errors; they are
/// reported through `advance()` returning `Ok(false)` or by a candidate
/// being skipped.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("marker not found: {0}")]
    MarkerNotFound(String),

    #[error("failed to load marker {id}: {reason}")]
    MarkerLoad { id: String, reason: String },

    #[error("text shaping failed: {0}")]
    Shaping(String),

    #[error("coordinate transform failed: {0}")]
    Transform(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PlacementError>;
