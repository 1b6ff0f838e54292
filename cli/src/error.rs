#![deny(missing_docs)]

//! # CLI Errors
//!
//! Error types for the CLI crate.

use derive_more::{Display, From};
use oaspipe_core::{AppError, LoadError};

/// Main error enum for CLI operations.
#[derive(Debug, Display, From)]
pub enum CliError {
    /// IO Error wrapper.
    #[display("IO Error: {}", _0)]
    Io(std::io::Error),

    /// Loading the documents failed.
    #[display("{}", _0)]
    Load(LoadError),

    /// The pipeline, a module or the configuration failed.
    #[display("{}", _0)]
    App(AppError),

    /// The JSON report could not be produced.
    #[display("JSON Error: {}", _0)]
    Json(serde_json::Error),

    /// General failure message.
    #[display("Operation failed: {}", _0)]
    General(String),
}

/// Manual implementation of the standard Error trait.
///
/// `General(String)` holds a `String`, which does not implement
/// `std::error::Error`, so `source()` cannot be derived.
impl std::error::Error for CliError {}

/// Result type alias.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display_is_unwrapped() {
        let err: CliError = LoadError::NoLocations.into();
        assert_eq!(err.to_string(), "No document locations were supplied");
    }
}
