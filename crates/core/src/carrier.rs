//! Carrier: state of one in-flight asynchronous operation
//!
//! A carrier moves through `CREATED -> SCHEDULED -> RUNNING -> SETTLING ->
//! DONE`. Each phase that code can act on has its own type:
//!
//! - [`Created`] owns the deferred promise, held references and the task.
//!   Failures here reject immediately ([`Created::reject`]).
//! - [`Task`] is the only thing native work sees. It holds no host handle
//!   and is `Send`, so work on a worker slot cannot reach the runtime.
//! - [`Settling`] is rebuilt on the host thread after the work returned.
//!   [`Settling::resolve`] and [`Settling::reject`] consume it, so a second
//!   settlement does not compile.
//!
//! Host resources live in [`CarrierHandles`]. They are released by
//! [`CarrierHandles::tidy`] right after settlement; every release takes the
//! resource out of its `Option` first, so the `Drop` pass that follows is a
//! no-op.

use crate::embedding::Executor;
use crate::error::{self, BridgeError, Result, SourceLocation};
use crate::status::Status;

/// Host-side resources owned by a carrier
pub struct CarrierHandles<E: Executor> {
    env: E,
    deferred: Option<E::Deferred>,
    passthru: Option<E::Reference>,
    pub(crate) work: Option<E::Work>,
}

impl<E: Executor> CarrierHandles<E> {
    pub(crate) fn env(&self) -> &E {
        &self.env
    }

    /// Release the held reference and the work token
    ///
    /// Safe to call repeatedly; released resources are gone from the
    /// carrier afterwards.
    pub fn tidy(&mut self) {
        if let Some(reference) = self.passthru.take() {
            if let Err(e) = self.env.delete_reference(reference) {
                tracing::error!("failed to release held reference: {}", e);
            }
        }
        if let Some(work) = self.work.take() {
            if let Err(e) = self.env.delete_work(work) {
                tracing::error!("failed to release work token: {}", e);
            }
        }
    }

    /// Reject the promise with `status`
    ///
    /// The host consumes the deferred on every settlement attempt. When a
    /// failed fulfilment already took it, the failure can only be logged.
    fn reject(&mut self, status: Status, message: Option<&str>, at: SourceLocation) {
        let Some(deferred) = self.deferred.take() else {
            tracing::error!(
                file = at.file,
                line = at.line,
                "carrier failed with status {} after its promise was consumed: {}",
                status,
                message.unwrap_or_else(|| status.static_message().unwrap_or("no message"))
            );
            self.tidy();
            return;
        };
        if let Err(e) = error::reject_deferred(&self.env, deferred, status, message, at) {
            tracing::error!(
                file = at.file,
                line = at.line,
                "failed to reject carrier with status {}: {}",
                status,
                e
            );
        }
        self.tidy();
    }
}

impl<E: Executor> Drop for CarrierHandles<E> {
    fn drop(&mut self) {
        if self.deferred.is_some() {
            tracing::warn!("carrier dropped before its promise was settled");
        }
        self.tidy();
    }
}

/// The part of a carrier that crosses to the worker slot
///
/// Native work reads its inputs from the payload, stores its result there
/// and records failures with [`Task::fail`].
#[derive(Debug)]
pub struct Task<P> {
    status: Status,
    message: Option<String>,
    payload: P,
}

impl<P> Task<P> {
    pub(crate) fn new(payload: P) -> Self {
        Self {
            status: Status::SUCCESS,
            message: None,
            payload,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Record a failure; the first failure recorded wins
    pub fn fail(&mut self, status: Status, message: impl Into<String>) {
        if self.status.is_success() {
            self.status = status;
            self.message = Some(message.into());
        }
    }

    /// Record a bridge error captured on this carrier
    pub fn record(&mut self, err: &BridgeError) {
        let status = err.status().unwrap_or(Status::INVALID_ARGS);
        self.fail(status, err.to_string());
    }
}

/// A carrier that has not been scheduled yet
pub struct Created<E: Executor, P> {
    pub(crate) handles: CarrierHandles<E>,
    pub(crate) task: Task<P>,
}

impl<E: Executor, P> Created<E, P> {
    /// Allocate a carrier and its promise
    ///
    /// The returned promise value goes back to the application.
    pub fn new(env: &E, payload: P) -> Result<(Self, E::Value)> {
        let (deferred, promise) = env.create_promise()?;
        tracing::debug!("carrier created");
        let carrier = Self {
            handles: CarrierHandles {
                env: env.clone(),
                deferred: Some(deferred),
                passthru: None,
                work: None,
            },
            task: Task::new(payload),
        };
        Ok((carrier, promise))
    }

    /// Keep `value` alive until the carrier is torn down
    ///
    /// Used for the runtime object that owns a native handle the work
    /// borrows. A carrier holds at most one such reference; holding again
    /// releases the previous one.
    pub fn hold(&mut self, value: E::Value) -> Result<()> {
        let reference = self.handles.env.create_reference(value)?;
        if let Some(previous) = self.handles.passthru.replace(reference) {
            self.handles.env.delete_reference(previous)?;
        }
        Ok(())
    }

    pub fn payload(&self) -> &P {
        &self.task.payload
    }

    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.task.payload
    }

    /// Reject before scheduling, e.g. when argument conversion failed
    #[track_caller]
    pub fn reject(self, err: BridgeError) {
        self.reject_at(err, SourceLocation::caller());
    }

    pub fn reject_at(mut self, err: BridgeError, at: SourceLocation) {
        self.task.record(&err);
        let Task {
            status, message, ..
        } = &self.task;
        self.handles.reject(*status, message.as_deref(), at);
    }
}

/// A carrier whose work has finished, back on the host thread
pub struct Settling<E: Executor, P> {
    handles: CarrierHandles<E>,
    task: Task<P>,
}

impl<E: Executor, P> Settling<E, P> {
    pub(crate) fn new(handles: CarrierHandles<E>, task: Task<P>) -> Self {
        Self { handles, task }
    }

    pub fn env(&self) -> &E {
        self.handles.env()
    }

    pub fn status(&self) -> Status {
        self.task.status
    }

    pub fn payload(&self) -> &P {
        &self.task.payload
    }

    /// Record a failure discovered while settling
    pub fn fail(&mut self, status: Status, message: impl Into<String>) {
        self.task.fail(status, message);
    }

    /// Fulfill with the converted payload, or reject if the carrier failed
    ///
    /// A conversion failure is recorded and rejects the promise instead.
    #[track_caller]
    pub fn resolve<F>(self, convert: F)
    where
        F: FnOnce(&E, P) -> Result<E::Value>,
    {
        self.resolve_at(SourceLocation::caller(), convert);
    }

    pub fn resolve_at<F>(self, at: SourceLocation, convert: F)
    where
        F: FnOnce(&E, P) -> Result<E::Value>,
    {
        if !self.task.is_success() {
            self.reject_at(at.file, at.line);
            return;
        }

        let Task {
            status,
            message,
            payload,
        } = self.task;
        let mut handles = self.handles;

        let outcome = convert(&handles.env, payload).and_then(|value| {
            let deferred = handles.deferred.take().ok_or_else(|| {
                BridgeError::operation(Status::ASYNC_FAILURE, "carrier already settled")
            })?;
            handles.env.resolve_deferred(deferred, value)
        });

        match outcome {
            Ok(()) => {
                tracing::debug!(file = at.file, line = at.line, "carrier fulfilled");
                handles.tidy();
            }
            Err(err) => {
                let mut task = Task {
                    status,
                    message,
                    payload: (),
                };
                task.record(&err);
                handles.reject(task.status, task.message.as_deref(), at);
            }
        }
    }

    /// Reject with the recorded status
    #[track_caller]
    pub fn reject(self) {
        let at = SourceLocation::caller();
        self.reject_at(at.file, at.line);
    }

    /// Reject with the recorded status, attributing the failure to
    /// `file`/`line`
    pub fn reject_at(mut self, file: &'static str, line: u32) {
        let at = SourceLocation::new(file, line);
        let status = if self.task.is_success() {
            Status::ASYNC_FAILURE
        } else {
            self.task.status
        };
        self.handles.reject(status, self.task.message.as_deref(), at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalRuntime, PromiseState, Primitive};

    #[test]
    fn test_created_reject_short_circuits() {
        let rt = LocalRuntime::new();
        let (carrier, promise) = Created::<_, ()>::new(&rt, ()).unwrap();

        carrier.reject(BridgeError::operation(Status::INVALID_HANDLE, "handle closed"));

        let stats = rt.stats();
        assert_eq!(stats.promises_rejected, 1);
        assert_eq!(stats.works_queued, 0);

        let PromiseState::Rejected(error) = rt.promise_state(promise) else {
            panic!("promise not rejected");
        };
        let (code, message) = rt.error_parts(error).unwrap();
        assert_eq!(code.as_deref(), Some("4103"));
        assert!(message.contains("handle closed"));
        assert!(message.contains("carrier.rs"));
    }

    #[test]
    fn test_hold_released_once_on_reject() {
        let rt = LocalRuntime::new();
        let owner = rt.object(&[]);
        let (mut carrier, _promise) = Created::<_, ()>::new(&rt, ()).unwrap();
        carrier.hold(owner).unwrap();
        assert_eq!(rt.live_references(), 1);

        carrier.reject(BridgeError::operation(Status::TIMEOUT, "no data"));

        assert_eq!(rt.live_references(), 0);
        assert_eq!(rt.stats().references_deleted, 1);
    }

    #[test]
    fn test_hold_twice_replaces_reference() {
        let rt = LocalRuntime::new();
        let (mut carrier, _promise) = Created::<_, ()>::new(&rt, ()).unwrap();
        let a = rt.object(&[]);
        let b = rt.object(&[]);
        carrier.hold(a).unwrap();
        carrier.hold(b).unwrap();
        assert_eq!(rt.live_references(), 1);
        drop(carrier);
        assert_eq!(rt.live_references(), 0);
        assert_eq!(rt.stats().references_deleted, 2);
    }

    #[test]
    fn test_promise_creation_failure_is_synchronous() {
        let rt = LocalRuntime::new();
        rt.fail_next(Primitive::CreatePromise, 9);
        let err = Created::<_, ()>::new(&rt, ()).err().unwrap();
        assert_eq!(err.status(), Some(Status::HOST_GENERIC_FAILURE));
        assert_eq!(rt.stats().promises_rejected, 0);
    }

    #[test]
    fn test_task_first_failure_wins() {
        let mut task = Task::new(0u32);
        assert!(task.is_success());
        task.fail(Status::NOT_FOUND, "no source");
        task.fail(Status::TIMEOUT, "later");
        assert_eq!(task.status(), Status::NOT_FOUND);
        assert_eq!(task.message(), Some("no source"));
    }

    #[test]
    fn test_task_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Task<Vec<u8>>>();
    }
}
