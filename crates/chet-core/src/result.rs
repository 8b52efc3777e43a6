//! Convenience result type alias for the hub.

use crate::error::AppError;

/// A specialized `Result` type for hub operations.
pub type AppResult<T> = Result<T, AppError>;
