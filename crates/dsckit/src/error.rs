//! Error types for DSC reconciliation.
//!
//! Every error maps to an [`ErrorCategory`] carrying a short description and
//! advice for the user.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for DSC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The interpreter returned no output
    EmptyOutput,
    /// The interpreter returned something that is not a JSON object
    MalformedOutput,
    /// Desired state or type definition does not match the declared schema
    Schema,
    /// Script template could not be rendered
    Render,
    /// The interpreter session could not be started or died mid-call
    Session,
    /// Filesystem error
    Io,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::EmptyOutput => "Nothing returned",
            Self::MalformedOutput => "Unreadable interpreter output",
            Self::Schema => "Schema mismatch",
            Self::Render => "Script rendering failed",
            Self::Session => "PowerShell session failure",
            Self::Io => "Filesystem error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::EmptyOutput => "Run with -vv to see the generated script and interpreter stderr",
            Self::MalformedOutput => {
                "The DSC resource wrote extra output to stdout; check the resource module"
            }
            Self::Schema => "Check the attribute names against the resource type definition",
            Self::Render => "Check the custom template directory for syntax errors",
            Self::Session => "Verify that PowerShell 7 is installed and the configured path is correct",
            Self::Io => "Check file paths and permissions",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, Error)]
pub enum Error {
    /// The interpreter produced no stdout for an invocation
    #[error("nothing returned for {resource} ({method})")]
    EmptyOutput {
        /// DSC resource that was invoked
        resource: String,
        /// Invocation verb
        method: String,
    },

    /// Stdout was not a JSON object
    #[error("malformed output for {resource}: {message}")]
    MalformedOutput {
        /// DSC resource that was invoked
        resource: String,
        /// Parser message or shape description
        message: String,
    },

    /// Desired state names an attribute the type does not declare
    #[error("attribute '{attribute}' is not declared by resource type {resource}")]
    UnknownAttribute {
        /// Resource type name
        resource: String,
        /// Offending attribute key
        attribute: String,
    },

    /// Two desired keys name the same DSC property
    #[error("attributes '{first}' and '{second}' of {resource} name the same property")]
    DuplicateAttribute {
        /// Resource type name
        resource: String,
        /// Key seen first
        first: String,
        /// Key that collides with it
        second: String,
    },

    /// Resource type definition is invalid
    #[error("invalid resource type definition: {0}")]
    Schema(String),

    /// Template rendering failed
    #[error("failed to render script: {0}")]
    Render(String),

    /// Interpreter session failure
    #[error("PowerShell session error: {message}")]
    Session {
        /// What went wrong
        message: String,
        /// Underlying IO error, if any
        #[source]
        source: Option<io::Error>,
    },

    /// IO error with path context
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        /// Path involved in the error
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a session error.
    pub fn session(message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self::Session {
            message: message.into(),
            source,
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::EmptyOutput { .. } => ErrorCategory::EmptyOutput,
            Error::MalformedOutput { .. } => ErrorCategory::MalformedOutput,
            Error::UnknownAttribute { .. }
            | Error::DuplicateAttribute { .. }
            | Error::Schema(_) => ErrorCategory::Schema,
            Error::Render(_) => ErrorCategory::Render,
            Error::Session { .. } => ErrorCategory::Session,
            Error::Io { .. } => ErrorCategory::Io,
        }
    }
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        Self::Render(err.to_string())
    }
}
