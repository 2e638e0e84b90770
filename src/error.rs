use std::{io, path::PathBuf};
use thiserror::Error;

/**
Result type to simplify function signatures.

This is a custom result type that uses our custom `ExplorerError` for the error type.

Functions can return `ExplorerResult<T>` and then use `?` to automatically propagate errors.
*/
pub type ExplorerResult<T> = Result<T, ExplorerError>;

/// How a raised condition should surface to the person driving the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged only. The host resets its loading state and stays quiet.
    Silent,
    /// Something the user can fix (pick another file, narrow the filters...).
    UserActionable,
    /// The environment failed us: unreadable source, malformed document.
    Environment,
}

/**
Custom error type for the catalog explorer.

This enum defines all the possible errors that can occur in the application.

We use the `thiserror` crate to derive the `Error` trait and automatically
implement `Display` using the `#[error(...)]` attribute.
*/
#[derive(Error, Debug)]
pub enum ExplorerError {
    // Wrapper for standard IO errors.
    // The #[from] attribute automatically converts io::Error to ExplorerError::Io.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Malformed JSON in one of the optional documents.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // --- Loading outcomes ---
    /// The user pressed stop (or declined to continue) while a search was running.
    #[error("Loading cancelled by user.")]
    Cancelled,

    /// Too many rows passed the filters.
    #[error(
        "Too many items loaded ({ceiling}). \
        Please use filters to reduce the number of items before loading."
    )]
    RowCeilingExceeded { ceiling: usize },

    /// The CSV source could not be parsed. Carries the parser diagnostic.
    #[error("CSV parsing error: {0}")]
    ParseFailure(String),

    /// Parsing worked, but nothing survived the filters.
    #[error("No rows loaded. No item matched the current filters.")]
    EmptyResult,

    /// A schema is already present for this session; nothing was inferred.
    #[error("Schema inference skipped: a schema is already loaded.")]
    SchemaInferenceSkipped,

    // --- Input errors ---
    #[error("Invalid schema document: {0}")]
    InvalidSchema(String),

    // Errors related to the file type (e.g., a JSON file offered as CSV source).
    #[error("File type error: {0}")]
    FileType(String),

    // Indicates that a specified file could not be found, storing the attempted path.
    #[error("File not found: {0:#?}")]
    FileNotFound(PathBuf),

    #[error("No file was provided to load.")]
    NoFileProvided,

    // Indicates an invalid CSV delimiter was provided (empty or too long).
    #[error("Invalid CSV delimiter: '{0}'")]
    InvalidDelimiter(String),

    #[error("Invalid value for command-line argument '{arg_name}': {reason}")]
    InvalidArgument {
        arg_name: String, // Context about *which* argument failed
        reason: String,   // The specific error reason
    },

    #[error("Invalid filter for column '{column}': {reason}")]
    InvalidFilter { column: String, reason: String },
}

impl ExplorerError {
    /// Classifies the error for the host: silent reset, user message, or environment failure.
    pub fn severity(&self) -> Severity {
        match self {
            ExplorerError::Cancelled | ExplorerError::SchemaInferenceSkipped => Severity::Silent,
            ExplorerError::RowCeilingExceeded { .. }
            | ExplorerError::EmptyResult
            | ExplorerError::FileType(_)
            | ExplorerError::FileNotFound(_)
            | ExplorerError::NoFileProvided
            | ExplorerError::InvalidDelimiter(_)
            | ExplorerError::InvalidArgument { .. }
            | ExplorerError::InvalidFilter { .. } => Severity::UserActionable,
            ExplorerError::Io(_)
            | ExplorerError::Json(_)
            | ExplorerError::ParseFailure(_)
            | ExplorerError::InvalidSchema(_) => Severity::Environment,
        }
    }

    /// Short title for the consolidated notification.
    pub fn label(&self) -> &'static str {
        match self {
            ExplorerError::Cancelled => "Loading Cancelled",
            ExplorerError::SchemaInferenceSkipped => "Schema Present",
            ExplorerError::RowCeilingExceeded { .. } => "Too Many Rows",
            ExplorerError::EmptyResult => "No Rows Loaded",
            ExplorerError::FileType(_) => "Invalid File Type",
            ExplorerError::FileNotFound(_) | ExplorerError::NoFileProvided => "No File Provided",
            ExplorerError::InvalidSchema(_) | ExplorerError::Json(_) => "Document Load Failed",
            ExplorerError::InvalidDelimiter(_)
            | ExplorerError::InvalidArgument { .. }
            | ExplorerError::InvalidFilter { .. } => "Invalid Input",
            _ => "CSV Search Failed",
        }
    }

    /// Exactly one message describing what failed and why. `None` for silent conditions.
    pub fn user_message(&self) -> Option<String> {
        match self.severity() {
            Severity::Silent => None,
            _ => Some(format!("{}\n\n{}", self.label(), self)),
        }
    }
}

//----------------------------------------------------------------------------//
//                                   Tests                                    //
//----------------------------------------------------------------------------//

/// Run tests with:
/// `cargo test -- --show-output tests_error`
#[cfg(test)]
mod tests_error {
    use super::*;

    #[test]
    fn test_ceiling_message_names_the_ceiling() {
        let error = ExplorerError::RowCeilingExceeded { ceiling: 30000 };
        let message = error.user_message().unwrap_or_default();
        assert!(message.contains("30000"));
        assert!(message.contains("filters"));
        assert_eq!(error.severity(), Severity::UserActionable);
    }

    #[test]
    fn test_silent_conditions_have_no_message() {
        assert_eq!(ExplorerError::Cancelled.user_message(), None);
        assert_eq!(ExplorerError::SchemaInferenceSkipped.user_message(), None);
    }

    #[test]
    fn test_each_outcome_is_distinct() {
        let outcomes = [
            ExplorerError::Cancelled.to_string(),
            ExplorerError::RowCeilingExceeded { ceiling: 10 }.to_string(),
            ExplorerError::ParseFailure("bad quote".into()).to_string(),
            ExplorerError::EmptyResult.to_string(),
            ExplorerError::SchemaInferenceSkipped.to_string(),
        ];
        for (i, a) in outcomes.iter().enumerate() {
            for b in outcomes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert_eq!(
            ExplorerError::ParseFailure("x".into()).severity(),
            Severity::Environment
        );
    }
}
