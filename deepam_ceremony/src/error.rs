//! Error types for the ceremony application.

use ceremony_core::CeremonyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Window error: {0}")]
    Window(String),

    #[error("Ceremony error: {0}")]
    Core(#[from] CeremonyError),

    #[error("Invalid option: {0}")]
    Config(String),
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;
