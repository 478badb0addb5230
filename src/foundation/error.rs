/// Convenience result type used across polyscan.
pub type PolyscanResult<T> = Result<T, PolyscanError>;

/// Top-level error taxonomy for construction, configuration and queue bookkeeping.
///
/// Polygon submission itself never fails: capacity exhaustion and allocation failures are
/// recovered or degraded locally and only show up in [`crate::RenderStats`].
#[derive(thiserror::Error, Debug)]
pub enum PolyscanError {
    /// Invalid caller-provided configuration or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// A fixed-capacity structure has no room left.
    #[error("capacity error: {0}")]
    Capacity(String),

    /// A work queue was driven outside its contract (duplicate index, reset while busy).
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// Errors when serializing or deserializing configuration.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PolyscanError {
    /// Build a [`PolyscanError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PolyscanError::Capacity`] value.
    pub fn capacity(msg: impl Into<String>) -> Self {
        Self::Capacity(msg.into())
    }

    /// Build a [`PolyscanError::Scheduling`] value.
    pub fn scheduling(msg: impl Into<String>) -> Self {
        Self::Scheduling(msg.into())
    }

    /// Build a [`PolyscanError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
