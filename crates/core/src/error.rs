//! Error types shared across the workspace.

use thiserror::Error;

/// Top-level application error.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Vulkan-related errors surfaced outside the RHI layer
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the workspace-level Error type.
pub type Result<T> = std::result::Result<T, Error>;
