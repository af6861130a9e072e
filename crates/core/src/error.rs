// Central Error Type for the Library
//
// Admission decisions never fail; errors only arise while loading
// configuration.

use thiserror::Error;

/// Library-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
