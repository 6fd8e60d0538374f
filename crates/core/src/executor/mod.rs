//! Scheduler glue between carriers and the host worker pool
//!
//! [`Created::schedule`] hands a carrier's native work to a worker slot and
//! rebuilds the carrier as a [`Settling`] on the host thread once the work
//! has returned. Nothing here touches the runtime from the worker side; the
//! only shared state is the task slot.
//!
//! ```text
//! host thread             worker slot               host thread
//! Created ──schedule──▶  execute(&mut Task)  ──▶   settle(Settling)
//!    │                                                   │
//!    └── promise returned to the caller                  └── resolve / reject
//! ```

use crate::carrier::{Created, Settling, Task};
use crate::embedding::{Complete, Execute, Executor, QueueRejected};
use crate::error::{Result, SourceLocation};
use crate::status::Status;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Microseconds elapsed since `start`
pub fn micro_time(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<E, P> Created<E, P>
where
    E: Executor,
    P: Send + 'static,
{
    /// Run `execute` on a worker slot, then `settle` on the host thread
    ///
    /// Never fails: if the host refuses the work, `settle` still runs with
    /// the refusal recorded on the carrier, which then rejects.
    pub fn schedule<X, S>(self, name: &str, execute: X, settle: S)
    where
        X: FnOnce(&mut Task<P>) + Send + 'static,
        S: FnOnce(Settling<E, P>) + 'static,
    {
        let Created { mut handles, task } = self;
        let env = handles.env().clone();

        let slot = Arc::new(Mutex::new(Some(task)));
        let worker_slot = Arc::clone(&slot);
        let worker_name = name.to_string();
        let settle_name = name.to_string();

        let run: Execute = Box::new(move || {
            let start = Instant::now();
            let mut guard = worker_slot.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(task) = guard.as_mut() else {
                return;
            };
            let result = panic::catch_unwind(AssertUnwindSafe(|| execute(&mut *task)));
            if let Err(payload) = result {
                task.fail(
                    Status::ASYNC_FAILURE,
                    format!("native work panicked: {}", panic_message(&*payload)),
                );
            }
            tracing::trace!(
                operation = %worker_name,
                elapsed_us = micro_time(start),
                "native work finished"
            );
        });

        let complete: Complete<E> = Box::new(move |_env: &E, work, outcome| {
            handles.work = work;
            let task = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            let Some(mut task) = task else {
                tracing::error!(operation = %settle_name, "carrier task missing at completion");
                return;
            };
            if let Err(err) = outcome {
                task.record(&err);
            }
            tracing::debug!(
                operation = %settle_name,
                status = task.status().code(),
                "carrier settling"
            );
            settle(Settling::new(handles, task));
        });

        match env.queue_work(name, run, complete) {
            Ok(()) => tracing::debug!(operation = name, "carrier scheduled"),
            Err(QueueRejected { error, complete }) => {
                tracing::warn!(operation = name, "host refused work: {}", error);
                complete(&env, None, Err(error));
            }
        }
    }
}

/// Create a carrier, schedule `execute` and resolve with `convert`
///
/// This is the whole life of a typical bridged operation. `hold` names a
/// runtime object that must stay alive while the work runs, typically the
/// object owning the native handle the work borrows. The rejection site
/// reported for failures is the caller of `run_async`.
///
/// Returns the promise. Only a failure to create the promise itself is
/// returned as an error; everything later rejects the promise.
#[track_caller]
pub fn run_async<E, P, X, C>(
    env: &E,
    name: &str,
    payload: P,
    hold: Option<E::Value>,
    execute: X,
    convert: C,
) -> Result<E::Value>
where
    E: Executor,
    P: Send + 'static,
    X: FnOnce(&mut Task<P>) + Send + 'static,
    C: FnOnce(&E, P) -> Result<E::Value> + 'static,
{
    let at = SourceLocation::caller();
    let (mut carrier, promise) = Created::new(env, payload)?;

    if let Some(owner) = hold {
        if let Err(err) = carrier.hold(owner) {
            carrier.reject_at(err, at);
            return Ok(promise);
        }
    }

    carrier.schedule(name, execute, move |settling| {
        settling.resolve_at(at, convert)
    });
    Ok(promise)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedding;
    use crate::local::{LocalRuntime, PromiseState, Primitive};

    #[test]
    fn test_micro_time_monotonic() {
        let start = Instant::now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(micro_time(start) >= 2000);
    }

    #[test]
    fn test_success_fulfills() {
        let rt = LocalRuntime::new();
        let promise = run_async(
            &rt,
            "double",
            21u32,
            None,
            |task| *task.payload_mut() *= 2,
            |env: &LocalRuntime, n| env.create_number(f64::from(n)),
        )
        .unwrap();

        let PromiseState::Fulfilled(value) = rt.run_until_settled(promise) else {
            panic!("promise not fulfilled");
        };
        assert_eq!(rt.number_value(value), Some(42.0));
        assert_eq!(rt.stats().promises_rejected, 0);
        assert_eq!(rt.stats().works_deleted, 1);
    }

    #[test]
    fn test_native_failure_rejects_and_skips_convert() {
        let rt = LocalRuntime::new();
        let promise = run_async(
            &rt,
            "receive",
            (),
            None,
            |task| task.fail(Status::TIMEOUT, "no frame within 100ms"),
            |_env: &LocalRuntime, ()| -> Result<_> { panic!("convert must not run") },
        )
        .unwrap();

        let PromiseState::Rejected(error) = rt.run_until_settled(promise) else {
            panic!("promise not rejected");
        };
        let (code, message) = rt.error_parts(error).unwrap();
        assert_eq!(code.as_deref(), Some("4144"));
        assert!(message.contains("no frame within 100ms"));
        assert_eq!(rt.stats().promises_fulfilled, 0);
    }

    #[test]
    fn test_panic_in_native_work_rejects() {
        let rt = LocalRuntime::new();
        let promise = run_async(
            &rt,
            "explode",
            (),
            None,
            |_task| panic!("sdk exploded"),
            |env: &LocalRuntime, ()| env.undefined(),
        )
        .unwrap();

        let PromiseState::Rejected(error) = rt.run_until_settled(promise) else {
            panic!("promise not rejected");
        };
        let (code, message) = rt.error_parts(error).unwrap();
        assert_eq!(code.as_deref(), Some("4098"));
        assert!(message.contains("sdk exploded"));
    }

    #[test]
    fn test_refused_work_rejects() {
        let rt = LocalRuntime::new();
        rt.fail_next(Primitive::QueueWork, 15);
        let promise = run_async(
            &rt,
            "send",
            (),
            None,
            |_task| {},
            |env: &LocalRuntime, ()| env.undefined(),
        )
        .unwrap();

        // Rejected synchronously, nothing was queued
        let PromiseState::Rejected(error) = rt.promise_state(promise) else {
            panic!("promise not rejected");
        };
        let (code, _) = rt.error_parts(error).unwrap();
        assert_eq!(code.as_deref(), Some("15"));
        assert_eq!(rt.stats().works_queued, 0);
        assert_eq!(rt.stats().works_deleted, 0);
    }

    #[test]
    fn test_hold_failure_rejects_before_scheduling() {
        let rt = LocalRuntime::new();
        let owner = rt.object(&[]);
        rt.fail_next(Primitive::CreateReference, 1);
        let promise = run_async(
            &rt,
            "send",
            (),
            Some(owner),
            |_task| {},
            |env: &LocalRuntime, ()| env.undefined(),
        )
        .unwrap();

        assert!(matches!(rt.promise_state(promise), PromiseState::Rejected(_)));
        assert_eq!(rt.stats().works_queued, 0);
    }
}
