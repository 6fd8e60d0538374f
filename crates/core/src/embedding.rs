//! Host runtime interface
//!
//! The bridge never talks to a concrete runtime directly. Everything it needs
//! from the host (typed values, deferred promises, held references, the
//! last-error facility and the worker pool) is described by the [`Embedding`]
//! and [`Executor`] traits. The Node.js binding implements them on top of
//! N-API; [`crate::local::LocalRuntime`] implements them in-process.
//!
//! # Ownership of handles
//!
//! Deferred promises, held references and work tokens are move-only
//! associated types. Settling a deferred or deleting a reference consumes
//! the token, so releasing the same resource twice does not compile.
//!
//! # Thread affinity
//!
//! Every method here must be called on the host's own thread. Implementors
//! are expected to be `!Send`; only the `execute` closure handed to
//! [`Executor::queue_work`] ever runs elsewhere.

use crate::error::{BridgeError, Result};
use std::fmt;

/// Kind of a runtime value, as reported by the host's `typeof`
///
/// The vocabulary is fixed so error messages stay stable across host
/// versions; kinds the host adds later map to [`ValueKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Symbol,
    Object,
    Function,
    External,
    Unknown,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Symbol => "symbol",
            ValueKind::Object => "object",
            ValueKind::Function => "function",
            ValueKind::External => "external",
            ValueKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the host's last-error facility
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastError {
    /// Host status code of the last failed primitive (0 when none)
    pub code: i32,
    /// Host supplied description, empty when none
    pub message: String,
    /// Engine specific code, informational only
    pub engine_code: u32,
}

/// Typed-value, promise and reference primitives of the host runtime
///
/// A failing primitive returns [`BridgeError::Embedding`] carrying the
/// last-error snapshot taken right after the failure.
pub trait Embedding: Clone + 'static {
    /// Handle to a runtime value, valid for the current host callback
    type Value: Copy + fmt::Debug;
    /// Resolver half of a deferred promise
    type Deferred;
    /// Held reference keeping a runtime value alive across callbacks
    type Reference;

    /// Read the host's last-error facility
    fn last_error(&self) -> LastError;

    fn type_of(&self, value: Self::Value) -> Result<ValueKind>;

    fn undefined(&self) -> Result<Self::Value>;

    fn null(&self) -> Result<Self::Value>;

    fn create_string(&self, text: &str) -> Result<Self::Value>;

    fn create_number(&self, number: f64) -> Result<Self::Value>;

    fn create_object(&self) -> Result<Self::Value>;

    /// Read `object[name]`; absent properties read as `undefined`
    fn named_property(&self, object: Self::Value, name: &str) -> Result<Self::Value>;

    fn set_named_property(&self, object: Self::Value, name: &str, value: Self::Value)
        -> Result<()>;

    /// UTF-8 byte length of a string value, without terminator
    fn string_utf8_len(&self, value: Self::Value) -> Result<usize>;

    /// Copy a string value into `buf`, always NUL terminated, returning the
    /// number of bytes written before the terminator
    fn copy_string_utf8(&self, value: Self::Value, buf: &mut [u8]) -> Result<usize>;

    /// Read a number value as `i32`, wrapping like ECMAScript ToInt32
    fn number_i32(&self, value: Self::Value) -> Result<i32>;

    /// Build an error object with `code` and `message` string values
    fn create_error(&self, code: Self::Value, message: Self::Value) -> Result<Self::Value>;

    /// Throw an error synchronously in the current host callback
    fn throw_error(&self, code: Option<&str>, message: &str) -> Result<()>;

    /// Create a pending promise and its resolver
    fn create_promise(&self) -> Result<(Self::Deferred, Self::Value)>;

    fn resolve_deferred(&self, deferred: Self::Deferred, value: Self::Value) -> Result<()>;

    fn reject_deferred(&self, deferred: Self::Deferred, error: Self::Value) -> Result<()>;

    fn create_reference(&self, value: Self::Value) -> Result<Self::Reference>;

    fn delete_reference(&self, reference: Self::Reference) -> Result<()>;
}

/// Closure run on a worker slot; must not touch the host
pub type Execute = Box<dyn FnOnce() + Send + 'static>;

/// Result the host reports for a finished work item
pub type WorkOutcome = std::result::Result<(), BridgeError>;

/// Closure run on the host thread once `execute` has returned
///
/// Receives the work token (absent if the work never got queued) and the
/// host's view of how the work item ended.
pub type Complete<E> = Box<dyn FnOnce(&E, Option<<E as Executor>::Work>, WorkOutcome) + 'static>;

/// Work the host refused to queue
///
/// The completion closure comes back so the caller can still settle
/// whatever it owns.
pub struct QueueRejected<E: Executor> {
    pub error: BridgeError,
    pub complete: Complete<E>,
}

impl<E: Executor> fmt::Debug for QueueRejected<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueRejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Worker pool of the host runtime
///
/// `execute` runs on a worker slot. `complete` runs afterwards on the host
/// thread, strictly after `execute` returned (or after the host cancelled
/// the item). No ordering holds between different work items.
pub trait Executor: Embedding {
    /// Scheduled-work token
    type Work;

    fn queue_work(
        &self,
        name: &str,
        execute: Execute,
        complete: Complete<Self>,
    ) -> std::result::Result<(), QueueRejected<Self>>;

    fn delete_work(&self, work: Self::Work) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        let names: Vec<_> = [
            ValueKind::Undefined,
            ValueKind::Null,
            ValueKind::Boolean,
            ValueKind::Number,
            ValueKind::String,
            ValueKind::Symbol,
            ValueKind::Object,
            ValueKind::Function,
            ValueKind::External,
            ValueKind::Unknown,
        ]
        .iter()
        .map(|k| k.to_string())
        .collect();
        assert_eq!(
            names,
            [
                "undefined", "null", "boolean", "number", "string", "symbol", "object",
                "function", "external", "unknown"
            ]
        );
    }
}
