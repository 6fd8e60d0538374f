//! Node.js FFI bindings for the NDI bridge
//!
//! # Architecture
//!
//! - **env.rs**: `Embedding` and `Executor` over raw N-API calls
//! - **error.rs**: Error conversion for napi-rs entry points
//! - **exports.rs**: Exported predicates and bridged operations
//!
//! # Threading Model
//!
//! Every N-API call happens on the JavaScript main thread. Native work runs
//! on libuv's thread pool through `napi_async_work`; its completion callback
//! is delivered back on the main thread, where the carrier settles.
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  JavaScript Main Thread                         │
//! │    ├─ validate, marshal, create promise         │
//! │    └─ complete: convert result, settle promise  │
//! ├─────────────────────────────────────────────────┤
//! │  libuv Worker Thread                            │
//! │    └─ execute: native SDK call, no N-API access │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod env;
pub mod error;
pub mod exports;

pub use env::{NapiDeferred, NapiEnv, NapiReference, NapiWork};
