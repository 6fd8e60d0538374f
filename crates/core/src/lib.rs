//! NDI Bridge Core - async bridge between a polling media SDK and a
//! single-threaded promise runtime
//!
//! Native SDK calls (discovery, frame capture, transmission) are blocking or
//! polling. The host runtime is single-threaded and promise based. This crate
//! is the glue between them:
//!
//! - **validation**: argument count, kinds and format selectors, checked
//!   synchronously before any native work starts
//! - **error** / **status**: one status space for host and bridge failures,
//!   translated into host exceptions carrying code, message and call site
//! - **marshal**: runtime records to owned native descriptors and back
//! - **carrier**: the per-operation state, typed by lifecycle phase
//! - **executor**: runs carrier work on the host worker pool and settles the
//!   promise back on the host thread
//!
//! The host itself is abstracted by the [`Embedding`] and [`Executor`]
//! traits. [`local::LocalRuntime`] implements them in-process; the FFI crate
//! implements them over N-API.
//!
//! # Example
//!
//! ```
//! use ndi_bridge_core::local::{LocalRuntime, PromiseState};
//! use ndi_bridge_core::{run_async, Embedding};
//!
//! let rt = LocalRuntime::new();
//! let promise = run_async(
//!     &rt,
//!     "double",
//!     21u32,
//!     None,
//!     |task| *task.payload_mut() *= 2,
//!     |env: &LocalRuntime, n| env.create_number(f64::from(n)),
//! )
//! .unwrap();
//!
//! let PromiseState::Fulfilled(value) = rt.run_until_settled(promise) else {
//!     panic!("not fulfilled");
//! };
//! assert_eq!(rt.number_value(value), Some(42.0));
//! ```

#![warn(clippy::all)]

pub mod carrier;
pub mod config;
pub mod embedding;
pub mod error;
pub mod executor;
pub mod local;
pub mod logging;
pub mod marshal;
pub mod status;
pub mod validation;

pub use carrier::{CarrierHandles, Created, Settling, Task};
pub use config::{BridgeConfig, ConfigError, LogFormat};
pub use embedding::{Embedding, Executor, LastError, ValueKind};
pub use error::{BridgeError, ErrorKind, Result, SourceLocation};
pub use executor::{micro_time, run_async};
pub use logging::init_tracing;
pub use marshal::{make_native_source, source_to_record, NativeSource, RawSource};
pub use status::{Status, StatusRange};
pub use validation::check_args;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
