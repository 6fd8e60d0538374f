//! Node.js bindings for the NDI bridge
//!
//! This crate exposes the bridge core to Node.js through N-API.
//!
//! # Features
//!
//! - `napi`: Enable the Node.js addon via napi-rs
//!
//! # Architecture
//!
//! ## Node.js-specific (`napi` feature)
//! - **napi/env.rs**: `NapiEnv`, the host runtime interface over raw N-API
//! - **napi/error.rs**: Conversion of bridge errors into napi errors
//! - **napi/exports.rs**: Module entry point and exported functions
//!
//! # Usage (Node.js)
//!
//! ```javascript
//! const ndi = require('@ndi-bridge/native');
//!
//! ndi.validBandwidth(100);            // true
//! const echoed = await ndi.echoSource({ name: 'Cam1', urlAddress: '192.0.2.4:5961' });
//! ```

#![warn(clippy::all)]

pub use ndi_bridge_core as bridge;

// Node.js-specific modules (only compiled with `napi` feature)
#[cfg(feature = "napi")]
pub mod napi;
