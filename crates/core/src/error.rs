//! Error taxonomy and translation into host exceptions
//!
//! Argument errors are raised synchronously, before a carrier exists.
//! Operation and embedding errors are recorded on a carrier and surface
//! through promise rejection. [`reject_deferred`] is the only place in the
//! crate that calls the host's rejection primitive.

use crate::embedding::{Embedding, LastError, ValueKind};
use crate::status::{Status, StatusRange};
use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while bridging a call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Wrong number of arguments
    #[error("For method {method}, expected {expected} arguments and got {actual}.")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// Argument of the wrong kind (position is 1-based)
    #[error("For method {method} argument {position}, expected type {expected} and got {actual}.")]
    ArgumentType {
        method: String,
        position: usize,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Argument of the right kind outside the accepted set
    #[error("For method {method}, {argument} value {value} is not a valid {axis}.")]
    ArgumentValue {
        method: String,
        argument: String,
        axis: &'static str,
        value: i64,
    },

    /// Native call failed or the bridge detected a defect
    #[error("{message}")]
    Operation { status: Status, message: String },

    /// A host runtime primitive failed
    #[error("{message}")]
    Embedding { code: i32, message: String },
}

/// Coarse classification of a [`BridgeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Operation,
    Embedding,
}

impl BridgeError {
    pub fn operation(status: Status, message: impl Into<String>) -> Self {
        BridgeError::Operation {
            status,
            message: message.into(),
        }
    }

    /// Build an embedding error from a last-error snapshot
    pub fn embedding(last: LastError) -> Self {
        BridgeError::Embedding {
            code: last.code,
            message: last.message,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::ArgumentCount { .. }
            | BridgeError::ArgumentType { .. }
            | BridgeError::ArgumentValue { .. } => ErrorKind::Argument,
            BridgeError::Operation { .. } => ErrorKind::Operation,
            BridgeError::Embedding { .. } => ErrorKind::Embedding,
        }
    }

    /// Status carried by the error; argument errors carry none
    pub fn status(&self) -> Option<Status> {
        match self {
            BridgeError::Operation { status, .. } => Some(*status),
            BridgeError::Embedding { code, .. } => Some(Status::from_code(*code)),
            _ => None,
        }
    }

    /// Throw this error synchronously into the current host callback
    ///
    /// Used for failures that happen before a carrier exists. An exception
    /// already pending in the host is left untouched.
    #[track_caller]
    pub fn throw<E: Embedding>(&self, env: &E) {
        self.throw_at(env, SourceLocation::caller());
    }

    pub fn throw_at<E: Embedding>(&self, env: &E, at: SourceLocation) {
        tracing::error!(
            file = at.file,
            line = at.line,
            status = ?self.status().map(Status::code),
            "bridge call failed: {}",
            self
        );

        if self.status() == Some(Status::HOST_PENDING_EXCEPTION) {
            return;
        }

        let code = self.status().map(|s| s.to_string());
        if let Err(e) = env.throw_error(code.as_deref(), &self.to_string()) {
            tracing::error!("failed to throw error into host: {}", e);
        }
    }
}

/// Source position of the call site that detected a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
}

impl SourceLocation {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for SourceLocation {
    fn from(loc: &'static Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Message shown for a failed status
///
/// A recorded message always wins. Otherwise host codes consult the
/// last-error facility and bridge codes use their static description.
pub fn describe_status<E: Embedding>(env: &E, status: Status, recorded: Option<&str>) -> String {
    if let Some(msg) = recorded {
        return msg.to_string();
    }
    match status.range() {
        StatusRange::Host => {
            let last = env.last_error();
            if last.message.is_empty() {
                format!("host status {}", status)
            } else {
                last.message
            }
        }
        StatusRange::Bridge => status
            .static_message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("bridge status {}", status)),
        StatusRange::Success => "rejected without a failure status".to_string(),
    }
}

/// Compose the rejection message embedding the failing call site
pub fn compose_message(at: SourceLocation, message: &str) -> String {
    format!(
        "In file {} on line {}, found error: {}",
        at.file, at.line, message
    )
}

/// Build the exception value for a failed status
pub fn build_exception<E: Embedding>(
    env: &E,
    status: Status,
    recorded: Option<&str>,
    at: SourceLocation,
) -> Result<E::Value> {
    let message = compose_message(at, &describe_status(env, status, recorded));
    let code = env.create_string(&status.to_string())?;
    let message = env.create_string(&message)?;
    env.create_error(code, message)
}

/// Reject a deferred promise with the exception for `status`
///
/// Consumes the deferred; callers hand it over exactly once.
pub(crate) fn reject_deferred<E: Embedding>(
    env: &E,
    deferred: E::Deferred,
    status: Status,
    recorded: Option<&str>,
    at: SourceLocation,
) -> Result<()> {
    tracing::warn!(
        file = at.file,
        line = at.line,
        status = status.code(),
        "rejecting carrier"
    );
    let error = build_exception(env, status, recorded, at)?;
    env.reject_deferred(deferred, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_messages() {
        let err = BridgeError::ArgumentCount {
            method: "find".to_string(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "For method find, expected 2 arguments and got 1."
        );

        let err = BridgeError::ArgumentType {
            method: "receive".to_string(),
            position: 2,
            expected: ValueKind::Number,
            actual: ValueKind::String,
        };
        assert_eq!(
            err.to_string(),
            "For method receive argument 2, expected type number and got string."
        );
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_status_of_captured_errors() {
        let err = BridgeError::operation(Status::TIMEOUT, "no frame");
        assert_eq!(err.status(), Some(Status::TIMEOUT));
        assert_eq!(err.kind(), ErrorKind::Operation);

        let err = BridgeError::embedding(LastError {
            code: 3,
            message: "A string was expected".to_string(),
            engine_code: 0,
        });
        assert_eq!(err.status(), Some(Status::from_code(3)));
        assert_eq!(err.to_string(), "A string was expected");
    }

    #[test]
    fn test_compose_message() {
        let msg = compose_message(SourceLocation::new("receive.rs", 42), "handle closed");
        assert_eq!(
            msg,
            "In file receive.rs on line 42, found error: handle closed"
        );
    }

    #[test]
    fn test_caller_location() {
        let here = SourceLocation::caller();
        assert!(here.file.ends_with("error.rs"));
        assert!(here.line > 0);
    }
}
