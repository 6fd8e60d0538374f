//! Module entry point and exported functions
//!
//! The format predicates are plain napi-rs functions. `echoSource` is
//! registered as a raw N-API callback because it validates its own call
//! shape (argument count included) through the bridge validator.

use super::env::NapiEnv;
use super::error::{AddonResult, IntoNapiResult};
use napi::{sys, Env, JsObject, NapiRaw};
use napi_derive::napi;
use ndi_bridge_core::config::BridgeConfig;
use ndi_bridge_core::embedding::{Embedding, ValueKind};
use ndi_bridge_core::error::{BridgeError, Result};
use ndi_bridge_core::marshal::{make_native_source, source_to_record, NativeSource};
use ndi_bridge_core::status::Status;
use ndi_bridge_core::{check_args, init_tracing, validation, Created, VERSION};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

const ECHO_SOURCE: &str = "echoSource";

#[napi]
pub fn valid_color_format(value: i32) -> bool {
    validation::valid_color_format(value)
}

#[napi]
pub fn valid_bandwidth(value: i32) -> bool {
    validation::valid_bandwidth(value)
}

#[napi]
pub fn valid_frame_format(value: i32) -> bool {
    validation::valid_frame_format(value)
}

#[napi]
pub fn valid_audio_format(value: i32) -> bool {
    validation::valid_audio_format(value)
}

/// Payload of an `echoSource` carrier
#[derive(Debug, Default)]
struct EchoPayload {
    input: NativeSource,
    output: NativeSource,
}

/// `echoSource(source)`: copy a source descriptor through a worker slot
///
/// Resolves with `{ name, urlAddress }` rebuilt from the native copy.
fn echo(env: &NapiEnv, args: &[sys::napi_value]) -> Result<sys::napi_value> {
    let args = check_args(env, ECHO_SOURCE, args, &[ValueKind::Object])?;
    let record = args[0];
    let (mut carrier, promise) = Created::new(env, EchoPayload::default())?;

    match make_native_source(env, record) {
        Ok(source) => carrier.payload_mut().input = source,
        Err(err) => {
            carrier.reject(err);
            return Ok(promise);
        }
    }
    if let Err(err) = carrier.hold(record) {
        carrier.reject(err);
        return Ok(promise);
    }

    carrier.schedule(
        ECHO_SOURCE,
        |task| {
            let payload = task.payload_mut();
            // SAFETY: the view borrows `input`, which outlives the copy
            payload.output = unsafe { NativeSource::from_raw(&payload.input.as_raw()) };
        },
        |settling| settling.resolve(|env, payload| source_to_record(env, &payload.output)),
    );
    Ok(promise)
}

unsafe extern "C" fn echo_source(
    raw_env: sys::napi_env,
    info: sys::napi_callback_info,
) -> sys::napi_value {
    // SAFETY: N-API passes the environment of this callback
    let env = unsafe { NapiEnv::from_raw(raw_env) };
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: `info` belongs to this callback
        let args = unsafe { env.callback_args(info) }?;
        echo(&env, &args)
    }));

    match result {
        Ok(Ok(promise)) => promise,
        Ok(Err(err)) => {
            err.throw(&env);
            ptr::null_mut()
        }
        Err(_) => {
            BridgeError::operation(Status::ASYNC_FAILURE, "echoSource panicked").throw(&env);
            ptr::null_mut()
        }
    }
}

fn register(env: NapiEnv, exports: sys::napi_value) -> AddonResult<()> {
    let echo = env.create_function(ECHO_SOURCE, Some(echo_source))?;
    env.set_named_property(exports, ECHO_SOURCE, echo)?;

    let version = env.create_string(VERSION)?;
    env.set_named_property(exports, "version", version)?;
    Ok(())
}

/// Node.js module entry point
///
/// Logging is configured from the `NDI_BRIDGE_*` environment variables. An
/// invalid configuration falls back to defaults so the addon still loads.
#[napi(module_exports)]
pub fn init(exports: JsObject, env: Env) -> napi::Result<()> {
    let loaded = BridgeConfig::from_env();
    let fallback = BridgeConfig::default();
    init_tracing(loaded.as_ref().unwrap_or(&fallback));
    if let Err(e) = &loaded {
        tracing::warn!("using default bridge configuration: {}", e);
    }

    // SAFETY: `exports` is alive for the duration of module initialisation
    let target = unsafe { exports.raw() };
    register(NapiEnv::from(env), target).into_napi()?;

    tracing::debug!(version = VERSION, "ndi bridge addon loaded");
    Ok(())
}
