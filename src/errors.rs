//! Unified error type for the crate.
//!
//! Every fallible operation returns [`Result`]. Validation and generation failures
//! carry the template identifier so an operator can fix the template and retry.

use thiserror::Error;

/// All errors surfaced by the item store, the code generator and the variant workflow.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Caller-correctable precondition failure (missing or invalid group number, bad input)
    #[error("Validation error: {message}")]
    Validation {
        /// Message shown verbatim to whoever initiated the operation
        message: String,
    },

    /// No unique Saturn Code could be produced within the retry budget
    #[error("Failed to create unique Saturn Code for template '{template}' after {attempts} attempts")]
    GenerationFailure {
        /// Template the variant was being created for
        template: String,
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Referenced template item does not exist
    #[error("Template item '{name}' not found")]
    TemplateNotFound {
        /// Template name that was looked up
        name: String,
    },

    /// Referenced variant item does not exist
    #[error("Variant item '{name}' not found")]
    VariantNotFound {
        /// Variant name that was looked up
        name: String,
    },

    /// A variant with the same attributes already exists for the template
    #[error("Variant '{name}' already exists")]
    VariantExists {
        /// Name of the existing variant
        name: String,
    },

    /// A backfill run left variants without a code
    #[error("{failed} variant(s) could not be given a code")]
    BackfillIncomplete {
        /// Number of variants that failed
        failed: usize,
    },

    /// Underlying database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for building a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_template() {
        let err = Error::GenerationFailure {
            template: "WIDGET".to_string(),
            attempts: 1000,
        };
        assert_eq!(
            err.to_string(),
            "Failed to create unique Saturn Code for template 'WIDGET' after 1000 attempts"
        );
    }

    #[test]
    fn test_backfill_incomplete_is_not_a_validation_error() {
        let err = Error::BackfillIncomplete { failed: 2 };
        assert_eq!(err.to_string(), "2 variant(s) could not be given a code");
        assert!(!matches!(err, Error::Validation { .. }));
    }
}
