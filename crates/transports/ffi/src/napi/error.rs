//! Error types for Node.js FFI bindings
//!
//! Bridged operations report through promises and coded exceptions (see
//! `ndi_bridge_core::error`). Entry points driven by napi-rs itself, such as
//! module initialisation, return `napi::Result` and convert through
//! [`AddonError`].

use ndi_bridge_core::config::ConfigError;
use ndi_bridge_core::error::{BridgeError, ErrorKind};
use thiserror::Error;

/// Errors that can occur in the napi FFI layer
#[derive(Debug, Error)]
pub enum AddonError {
    /// A bridge or host runtime call failed
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Addon configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<AddonError> for napi::Error {
    fn from(err: AddonError) -> Self {
        let status = match &err {
            AddonError::Bridge(e) => match (e.kind(), e.status()) {
                (ErrorKind::Argument, _) => napi::Status::InvalidArg,
                (ErrorKind::Embedding, Some(status)) => napi::Status::from(status.code()),
                _ => napi::Status::GenericFailure,
            },
            AddonError::Config(_) => napi::Status::InvalidArg,
        };
        napi::Error::new(status, err.to_string())
    }
}

/// Result type for addon operations
pub type AddonResult<T> = std::result::Result<T, AddonError>;

/// Helper trait for converting Results to napi::Result
pub trait IntoNapiResult<T> {
    fn into_napi(self) -> napi::Result<T>;
}

impl<T> IntoNapiResult<T> for AddonResult<T> {
    fn into_napi(self) -> napi::Result<T> {
        self.map_err(|e| e.into())
    }
}

impl<T> IntoNapiResult<T> for ndi_bridge_core::Result<T> {
    fn into_napi(self) -> napi::Result<T> {
        self.map_err(|e| AddonError::from(e).into())
    }
}
