use std::io;

use thiserror::Error;

/// Request-level failure taxonomy shared by the issuer and the intake.
///
/// Every variant is terminal for its request: the boundary converts it to
/// a one-line text response and an HTTP status, nothing retries.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Authentication failed")]
    Authentication,

    #[error("Failed to lock counter file: {0}")]
    LockAcquisition(#[source] io::Error),

    #[error("Counter read/write failed: {0}")]
    CounterReadWrite(#[source] io::Error),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to create upload directories: {0}")]
    DirectoryCreation(#[source] io::Error),

    #[error("Failed to store uploaded file: {0}")]
    StorageWrite(#[source] io::Error),
}

/// Reasons an upload payload is rejected before it is stored.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Upload transport error: {0}")]
    Transport(String),

    #[error("No file uploaded")]
    MissingFile,

    #[error("File is empty")]
    EmptyFile,

    #[error("File too large. Maximum size: {max} bytes")]
    Oversized { max: u64 },

    #[error("Invalid file type `{extension}`. Allowed: {allowed}")]
    DisallowedExtension { extension: String, allowed: String },
}
