//! Host runtime interface over raw N-API
//!
//! `NapiEnv` wraps the `napi_env` of the current module instance. It is
//! `!Send` (it holds a raw pointer), so it cannot leak into worker threads;
//! only the boxed `execute` closure of a work item ever runs off the main
//! thread.

use napi::sys;
use ndi_bridge_core::embedding::{
    Complete, Embedding, Execute, Executor, LastError, QueueRejected, ValueKind,
};
use ndi_bridge_core::error::{BridgeError, Result};
use ndi_bridge_core::status::Status;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

const NAPI_OK: sys::napi_status = 0;
const NAPI_CANCELLED: sys::napi_status = 11;

/// Handle to the N-API environment of the calling module instance
#[derive(Debug, Clone, Copy)]
pub struct NapiEnv {
    raw: sys::napi_env,
}

/// Resolver half of an N-API promise
#[derive(Debug)]
pub struct NapiDeferred(sys::napi_deferred);

/// Strong N-API reference (refcount 1)
#[derive(Debug)]
pub struct NapiReference(sys::napi_ref);

/// Scheduled `napi_async_work`
#[derive(Debug)]
pub struct NapiWork(sys::napi_async_work);

impl From<napi::Env> for NapiEnv {
    fn from(env: napi::Env) -> Self {
        Self { raw: env.raw() }
    }
}

impl NapiEnv {
    /// # Safety
    ///
    /// `raw` must be the environment passed to the current callback.
    pub unsafe fn from_raw(raw: sys::napi_env) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> sys::napi_env {
        self.raw
    }

    /// Turn an N-API status into a result, snapshotting the last error
    fn check(&self, status: sys::napi_status) -> Result<()> {
        if status == NAPI_OK {
            return Ok(());
        }
        let mut last = self.last_error();
        if last.code == 0 {
            last.code = status;
        }
        Err(BridgeError::embedding(last))
    }

    fn c_string(&self, text: &str) -> Result<CString> {
        CString::new(text).map_err(|_| {
            BridgeError::operation(
                Status::INVALID_ARGS,
                format!("string {:?} contains a NUL byte", text),
            )
        })
    }

    pub fn is_exception_pending(&self) -> Result<bool> {
        let mut pending = false;
        self.check(unsafe { sys::napi_is_exception_pending(self.raw, &mut pending) })?;
        Ok(pending)
    }

    /// Arguments of the current callback
    ///
    /// # Safety
    ///
    /// `info` must be the callback info of the callback currently running.
    pub unsafe fn callback_args(&self, info: sys::napi_callback_info) -> Result<Vec<sys::napi_value>> {
        let mut argc = 0;
        self.check(unsafe {
            sys::napi_get_cb_info(
                self.raw,
                info,
                &mut argc,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        })?;
        let mut argv = vec![ptr::null_mut(); argc];
        self.check(unsafe {
            sys::napi_get_cb_info(
                self.raw,
                info,
                &mut argc,
                argv.as_mut_ptr(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        })?;
        argv.truncate(argc);
        Ok(argv)
    }

    /// Wrap a raw callback as a JavaScript function
    pub fn create_function(&self, name: &str, callback: sys::napi_callback) -> Result<sys::napi_value> {
        let mut result = ptr::null_mut();
        self.check(unsafe {
            sys::napi_create_function(
                self.raw,
                name.as_ptr() as *const c_char,
                name.len() as _,
                callback,
                ptr::null_mut(),
                &mut result,
            )
        })?;
        Ok(result)
    }
}

impl Embedding for NapiEnv {
    type Value = sys::napi_value;
    type Deferred = NapiDeferred;
    type Reference = NapiReference;

    fn last_error(&self) -> LastError {
        let mut info: *const sys::napi_extended_error_info = ptr::null();
        let status = unsafe { sys::napi_get_last_error_info(self.raw, &mut info) };
        if status != NAPI_OK || info.is_null() {
            return LastError::default();
        }
        // SAFETY: N-API keeps the record valid until the next N-API call
        let info = unsafe { &*info };
        let message = if info.error_message.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(info.error_message) }
                .to_string_lossy()
                .into_owned()
        };
        LastError {
            code: info.error_code,
            message,
            engine_code: info.engine_error_code,
        }
    }

    fn type_of(&self, value: sys::napi_value) -> Result<ValueKind> {
        let mut kind = 0;
        self.check(unsafe { sys::napi_typeof(self.raw, value, &mut kind) })?;
        Ok(match kind {
            0 => ValueKind::Undefined,
            1 => ValueKind::Null,
            2 => ValueKind::Boolean,
            3 => ValueKind::Number,
            4 => ValueKind::String,
            5 => ValueKind::Symbol,
            6 => ValueKind::Object,
            7 => ValueKind::Function,
            8 => ValueKind::External,
            _ => ValueKind::Unknown,
        })
    }

    fn undefined(&self) -> Result<sys::napi_value> {
        let mut result = ptr::null_mut();
        self.check(unsafe { sys::napi_get_undefined(self.raw, &mut result) })?;
        Ok(result)
    }

    fn null(&self) -> Result<sys::napi_value> {
        let mut result = ptr::null_mut();
        self.check(unsafe { sys::napi_get_null(self.raw, &mut result) })?;
        Ok(result)
    }

    fn create_string(&self, text: &str) -> Result<sys::napi_value> {
        let mut result = ptr::null_mut();
        self.check(unsafe {
            sys::napi_create_string_utf8(
                self.raw,
                text.as_ptr() as *const c_char,
                text.len() as _,
                &mut result,
            )
        })?;
        Ok(result)
    }

    fn create_number(&self, number: f64) -> Result<sys::napi_value> {
        let mut result = ptr::null_mut();
        self.check(unsafe { sys::napi_create_double(self.raw, number, &mut result) })?;
        Ok(result)
    }

    fn create_object(&self) -> Result<sys::napi_value> {
        let mut result = ptr::null_mut();
        self.check(unsafe { sys::napi_create_object(self.raw, &mut result) })?;
        Ok(result)
    }

    fn named_property(&self, object: sys::napi_value, name: &str) -> Result<sys::napi_value> {
        let name = self.c_string(name)?;
        let mut result = ptr::null_mut();
        self.check(unsafe {
            sys::napi_get_named_property(self.raw, object, name.as_ptr(), &mut result)
        })?;
        Ok(result)
    }

    fn set_named_property(
        &self,
        object: sys::napi_value,
        name: &str,
        value: sys::napi_value,
    ) -> Result<()> {
        let name = self.c_string(name)?;
        self.check(unsafe { sys::napi_set_named_property(self.raw, object, name.as_ptr(), value) })
    }

    fn string_utf8_len(&self, value: sys::napi_value) -> Result<usize> {
        let mut len = 0;
        self.check(unsafe {
            sys::napi_get_value_string_utf8(self.raw, value, ptr::null_mut(), 0, &mut len)
        })?;
        Ok(len as usize)
    }

    fn copy_string_utf8(&self, value: sys::napi_value, buf: &mut [u8]) -> Result<usize> {
        let mut written = 0;
        self.check(unsafe {
            sys::napi_get_value_string_utf8(
                self.raw,
                value,
                buf.as_mut_ptr() as *mut c_char,
                buf.len() as _,
                &mut written,
            )
        })?;
        Ok(written as usize)
    }

    fn number_i32(&self, value: sys::napi_value) -> Result<i32> {
        let mut result = 0;
        self.check(unsafe { sys::napi_get_value_int32(self.raw, value, &mut result) })?;
        Ok(result)
    }

    fn create_error(&self, code: sys::napi_value, message: sys::napi_value) -> Result<sys::napi_value> {
        let mut result = ptr::null_mut();
        self.check(unsafe { sys::napi_create_error(self.raw, code, message, &mut result) })?;
        Ok(result)
    }

    fn throw_error(&self, code: Option<&str>, message: &str) -> Result<()> {
        let code = code.map(|c| self.c_string(c)).transpose()?;
        let message = self.c_string(message)?;
        let code_ptr = code.as_deref().map_or(ptr::null(), CStr::as_ptr);
        self.check(unsafe { sys::napi_throw_error(self.raw, code_ptr, message.as_ptr()) })
    }

    fn create_promise(&self) -> Result<(NapiDeferred, sys::napi_value)> {
        let mut deferred = ptr::null_mut();
        let mut promise = ptr::null_mut();
        self.check(unsafe { sys::napi_create_promise(self.raw, &mut deferred, &mut promise) })?;
        Ok((NapiDeferred(deferred), promise))
    }

    fn resolve_deferred(&self, deferred: NapiDeferred, value: sys::napi_value) -> Result<()> {
        self.check(unsafe { sys::napi_resolve_deferred(self.raw, deferred.0, value) })
    }

    fn reject_deferred(&self, deferred: NapiDeferred, error: sys::napi_value) -> Result<()> {
        self.check(unsafe { sys::napi_reject_deferred(self.raw, deferred.0, error) })
    }

    fn create_reference(&self, value: sys::napi_value) -> Result<NapiReference> {
        let mut reference = ptr::null_mut();
        self.check(unsafe { sys::napi_create_reference(self.raw, value, 1, &mut reference) })?;
        Ok(NapiReference(reference))
    }

    fn delete_reference(&self, reference: NapiReference) -> Result<()> {
        self.check(unsafe { sys::napi_delete_reference(self.raw, reference.0) })
    }
}

/// Heap state of one work item, owned by N-API between queue and complete
struct WorkItem {
    env: NapiEnv,
    work: sys::napi_async_work,
    execute: Option<Execute>,
    panicked: bool,
    complete: Option<Complete<NapiEnv>>,
}

unsafe extern "C" fn execute_work(_env: sys::napi_env, data: *mut c_void) {
    // SAFETY: `data` is the WorkItem leaked in `queue_work`; the worker only
    // touches `execute` and `panicked`, the main thread waits for completion
    let item = unsafe { &mut *(data as *mut WorkItem) };
    if let Some(execute) = item.execute.take() {
        item.panicked = panic::catch_unwind(AssertUnwindSafe(execute)).is_err();
    }
}

unsafe extern "C" fn complete_work(_env: sys::napi_env, status: sys::napi_status, data: *mut c_void) {
    // SAFETY: N-API calls this exactly once, after `execute_work` returned
    let mut item = unsafe { Box::from_raw(data as *mut WorkItem) };
    let outcome = if status == NAPI_CANCELLED {
        Err(BridgeError::Embedding {
            code: status,
            message: "The async work item was cancelled".to_string(),
        })
    } else if status != NAPI_OK {
        Err(BridgeError::Embedding {
            code: status,
            message: format!("async work failed with status {}", status),
        })
    } else if item.panicked {
        Err(BridgeError::operation(
            Status::ASYNC_FAILURE,
            "native work panicked",
        ))
    } else {
        Ok(())
    };

    let env = item.env;
    let work = NapiWork(item.work);
    if let Some(complete) = item.complete.take() {
        // Unwinding into libuv is undefined behavior
        if panic::catch_unwind(AssertUnwindSafe(|| complete(&env, Some(work), outcome))).is_err() {
            tracing::error!("work completion panicked");
        }
    }
}

impl Executor for NapiEnv {
    type Work = NapiWork;

    fn queue_work(
        &self,
        name: &str,
        execute: Execute,
        complete: Complete<Self>,
    ) -> std::result::Result<(), QueueRejected<Self>> {
        let resource_name = match self.create_string(name) {
            Ok(value) => value,
            Err(error) => return Err(QueueRejected { error, complete }),
        };

        let data = Box::into_raw(Box::new(WorkItem {
            env: *self,
            work: ptr::null_mut(),
            execute: Some(execute),
            panicked: false,
            complete: Some(complete),
        }));

        // Take the item back after a failed hand-over
        let reclaim = |error: BridgeError| {
            // SAFETY: N-API never saw `data` or has released it
            let mut item = unsafe { Box::from_raw(data) };
            match item.complete.take() {
                Some(complete) => QueueRejected { error, complete },
                None => QueueRejected {
                    error,
                    complete: Box::new(|_: &NapiEnv, _, _| {}),
                },
            }
        };

        let mut work = ptr::null_mut();
        let created = self.check(unsafe {
            sys::napi_create_async_work(
                self.raw,
                ptr::null_mut(),
                resource_name,
                Some(execute_work),
                Some(complete_work),
                data as *mut c_void,
                &mut work,
            )
        });
        if let Err(error) = created {
            return Err(reclaim(error));
        }
        // SAFETY: not queued yet, still exclusively ours
        unsafe { (*data).work = work };

        if let Err(error) = self.check(unsafe { sys::napi_queue_async_work(self.raw, work) }) {
            let rejected = reclaim(error);
            if let Err(e) = self.check(unsafe { sys::napi_delete_async_work(self.raw, work) }) {
                tracing::error!("failed to delete unqueued work: {}", e);
            }
            return Err(rejected);
        }
        Ok(())
    }

    fn delete_work(&self, work: NapiWork) -> Result<()> {
        self.check(unsafe { sys::napi_delete_async_work(self.raw, work.0) })
    }
}
