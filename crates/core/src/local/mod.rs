//! In-process host runtime
//!
//! `LocalRuntime` implements [`Embedding`] and [`Executor`] without Node.js.
//! It mirrors the N-API contract closely enough to stand in for the real
//! runtime in tests and short-lived tools:
//!
//! - values live in an arena and are addressed by [`ValueId`]
//! - promises settle at most once; settling twice is a host failure
//! - the last-error facility is overwritten by every primitive call, so a
//!   late read sees a cleared or unrelated error
//! - native work runs on a tokio blocking pool; completions are queued and
//!   only run when the owning thread drains them with
//!   [`LocalRuntime::run_until_idle`] or [`LocalRuntime::run_until_settled`]
//!
//! There is no garbage collector. Values and promises stay in the arena
//! until the runtime is dropped, so a long-running process should create a
//! fresh runtime per batch of work instead of keeping one forever.
//!
//! Every primitive can be made to fail once with [`LocalRuntime::fail_next`],
//! and [`RuntimeStats`] counts how often the release and settlement
//! primitives were used.

mod value;

pub use value::{LocalValue, PromiseState, ValueId};

use crate::config::BridgeConfig;
use crate::embedding::{
    Complete, Embedding, Execute, Executor, LastError, QueueRejected, ValueKind, WorkOutcome,
};
use crate::error::{BridgeError, Result};
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use value::Heap;

/// Host status codes used by the local runtime (N-API numbering)
mod code {
    pub const INVALID_ARG: i32 = 1;
    pub const OBJECT_EXPECTED: i32 = 2;
    pub const STRING_EXPECTED: i32 = 3;
    pub const NUMBER_EXPECTED: i32 = 6;
    pub const GENERIC_FAILURE: i32 = 9;
}

/// Host description of a status code, as N-API words it
pub fn host_message(code: i32) -> &'static str {
    match code {
        0 => "",
        1 => "Invalid argument",
        2 => "An object was expected",
        3 => "A string was expected",
        4 => "A string or symbol was expected",
        5 => "A function was expected",
        6 => "A number was expected",
        7 => "A boolean was expected",
        8 => "An array was expected",
        9 => "Unknown failure",
        10 => "An exception is pending",
        11 => "The async work item was cancelled",
        12 => "napi_escape_handle already called on scope",
        13 => "Invalid handle scope usage",
        14 => "Invalid callback scope usage",
        15 => "Thread-safe function queue is full",
        16 => "Thread-safe function handle is closing",
        17 => "A bigint was expected",
        18 => "A date was expected",
        19 => "An arraybuffer was expected",
        20 => "A detachable arraybuffer was expected",
        21 => "Main thread would deadlock",
        _ => "Unknown status",
    }
}

/// ECMAScript ToInt32: truncate, then wrap modulo 2^32
fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

/// Primitive that [`LocalRuntime::fail_next`] can make fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    TypeOf,
    CreateValue,
    NamedProperty,
    SetNamedProperty,
    ReadString,
    ReadNumber,
    CreateError,
    ThrowError,
    CreatePromise,
    ResolveDeferred,
    RejectDeferred,
    CreateReference,
    DeleteReference,
    QueueWork,
    DeleteWork,
}

/// Usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub type_queries: u64,
    pub references_created: u64,
    pub references_deleted: u64,
    pub works_queued: u64,
    pub works_deleted: u64,
    pub promises_fulfilled: u64,
    pub promises_rejected: u64,
    pub exceptions_thrown: u64,
}

/// Resolver of a local promise
#[derive(Debug)]
pub struct LocalDeferred(usize);

/// Held reference to a local value
#[derive(Debug)]
pub struct LocalReference(u64);

/// Token of a queued work item
#[derive(Debug)]
pub struct LocalWork(u64);

struct Inner {
    heap: RefCell<Heap>,
    last_error: RefCell<LastError>,
    faults: RefCell<HashMap<Primitive, i32>>,
    stats: Cell<RuntimeStats>,
    worker_threads: usize,
    pool: OnceCell<tokio::runtime::Runtime>,
    done_tx: Sender<(u64, bool)>,
    done_rx: Receiver<(u64, bool)>,
    pending: RefCell<HashMap<u64, Complete<LocalRuntime>>>,
    live_works: RefCell<HashSet<u64>>,
    next_work: Cell<u64>,
}

/// Single-threaded host runtime with a background worker pool
#[derive(Clone)]
pub struct LocalRuntime {
    inner: Rc<Inner>,
}

impl fmt::Debug for LocalRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalRuntime")
            .field("worker_threads", &self.inner.worker_threads)
            .field("pending_work", &self.pending_work())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRuntime {
    pub fn new() -> Self {
        Self::with_config(&BridgeConfig::default())
    }

    /// Runtime whose worker pool is sized by `config.worker_threads`
    ///
    /// The pool itself starts on the first queued work item.
    pub fn with_config(config: &BridgeConfig) -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            inner: Rc::new(Inner {
                heap: RefCell::new(Heap::default()),
                last_error: RefCell::new(LastError::default()),
                faults: RefCell::new(HashMap::new()),
                stats: Cell::new(RuntimeStats::default()),
                worker_threads: config.worker_threads.max(1),
                pool: OnceCell::new(),
                done_tx,
                done_rx,
                pending: RefCell::new(HashMap::new()),
                live_works: RefCell::new(HashSet::new()),
                next_work: Cell::new(1),
            }),
        }
    }

    // ---- fault injection and accounting ----------------------------------

    /// Make the next call of `primitive` fail with host status `code`
    pub fn fail_next(&self, primitive: Primitive, code: i32) {
        self.inner.faults.borrow_mut().insert(primitive, code);
    }

    pub fn stats(&self) -> RuntimeStats {
        self.inner.stats.get()
    }

    fn bump(&self, f: impl FnOnce(&mut RuntimeStats)) {
        let mut stats = self.inner.stats.get();
        f(&mut stats);
        self.inner.stats.set(stats);
    }

    /// Record a host failure in the last-error facility
    fn failure(&self, code: i32) -> BridgeError {
        let last = LastError {
            code,
            message: host_message(code).to_string(),
            engine_code: 0,
        };
        *self.inner.last_error.borrow_mut() = last.clone();
        BridgeError::embedding(last)
    }

    /// Enter a primitive: apply an injected fault or clear the last error
    fn enter(&self, primitive: Primitive) -> Result<()> {
        let fault = self.inner.faults.borrow_mut().remove(&primitive);
        if let Some(code) = fault {
            tracing::debug!(?primitive, code, "injected host failure");
            return Err(self.failure(code));
        }
        *self.inner.last_error.borrow_mut() = LastError::default();
        Ok(())
    }

    fn alloc(&self, value: LocalValue) -> ValueId {
        self.inner.heap.borrow_mut().alloc(value)
    }

    fn with_value<T>(&self, id: ValueId, f: impl FnOnce(&LocalValue) -> T) -> Result<T> {
        let heap = self.inner.heap.borrow();
        match heap.get(id) {
            Some(value) => Ok(f(value)),
            None => Err(self.failure(code::INVALID_ARG)),
        }
    }

    // ---- infallible constructors ------------------------------------------

    pub fn undefined_value(&self) -> ValueId {
        self.alloc(LocalValue::Undefined)
    }

    pub fn null_value(&self) -> ValueId {
        self.alloc(LocalValue::Null)
    }

    pub fn boolean(&self, value: bool) -> ValueId {
        self.alloc(LocalValue::Boolean(value))
    }

    pub fn number(&self, value: f64) -> ValueId {
        self.alloc(LocalValue::Number(value))
    }

    pub fn string(&self, value: &str) -> ValueId {
        self.alloc(LocalValue::String(value.to_string()))
    }

    pub fn symbol(&self, description: &str) -> ValueId {
        self.alloc(LocalValue::Symbol(description.to_string()))
    }

    pub fn function(&self, name: &str) -> ValueId {
        self.alloc(LocalValue::Function(name.to_string()))
    }

    pub fn external(&self) -> ValueId {
        self.alloc(LocalValue::External)
    }

    pub fn big_int(&self, value: i64) -> ValueId {
        self.alloc(LocalValue::BigInt(value))
    }

    pub fn object(&self, fields: &[(&str, ValueId)]) -> ValueId {
        let fields = fields
            .iter()
            .map(|(name, id)| ((*name).to_string(), *id))
            .collect::<BTreeMap<_, _>>();
        self.alloc(LocalValue::Object(fields))
    }

    // ---- inspection -------------------------------------------------------

    /// Copy of the value behind `id`
    pub fn value(&self, id: ValueId) -> Option<LocalValue> {
        self.inner.heap.borrow().get(id).cloned()
    }

    pub fn number_value(&self, id: ValueId) -> Option<f64> {
        match self.value(id)? {
            LocalValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn string_value(&self, id: ValueId) -> Option<String> {
        match self.value(id)? {
            LocalValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn property(&self, object: ValueId, name: &str) -> Option<ValueId> {
        match self.value(object)? {
            LocalValue::Object(fields) => fields.get(name).copied(),
            _ => None,
        }
    }

    pub fn has_property(&self, object: ValueId, name: &str) -> bool {
        self.property(object, name).is_some()
    }

    pub fn property_string(&self, object: ValueId, name: &str) -> Option<String> {
        self.string_value(self.property(object, name)?)
    }

    /// `(code, message)` of an error value
    pub fn error_parts(&self, id: ValueId) -> Option<(Option<String>, String)> {
        match self.value(id)? {
            LocalValue::Error { code, message } => Some((code, message)),
            _ => None,
        }
    }

    /// Settlement state of a promise; other values read as pending
    pub fn promise_state(&self, promise: ValueId) -> PromiseState {
        let heap = self.inner.heap.borrow();
        match heap.get(promise) {
            Some(LocalValue::Promise(index)) => heap.promise(*index),
            _ => PromiseState::Pending,
        }
    }

    /// Take the exception thrown by the last failing synchronous call
    pub fn take_exception(&self) -> Option<ValueId> {
        self.inner.heap.borrow_mut().pending_exception.take()
    }

    pub fn live_references(&self) -> usize {
        self.inner.heap.borrow().references.len()
    }

    /// Work items queued but not yet completed
    pub fn pending_work(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Work tokens not yet deleted
    pub fn live_work_tokens(&self) -> usize {
        self.inner.live_works.borrow().len()
    }

    // ---- event loop -------------------------------------------------------

    fn pool(&self) -> Result<&tokio::runtime::Runtime> {
        if let Some(pool) = self.inner.pool.get() {
            return Ok(pool);
        }
        let pool = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(self.inner.worker_threads)
            .thread_name("ndi-bridge-worker")
            .build()
            .map_err(|e| {
                tracing::error!("failed to start worker pool: {}", e);
                self.failure(code::GENERIC_FAILURE)
            })?;
        Ok(self.inner.pool.get_or_init(|| pool))
    }

    /// Run one completion, waiting for it if necessary
    ///
    /// Returns `false` when no work is outstanding.
    pub fn run_once(&self) -> bool {
        if self.inner.pending.borrow().is_empty() {
            return false;
        }
        let Ok((id, finished)) = self.inner.done_rx.recv() else {
            return false;
        };
        let complete = self.inner.pending.borrow_mut().remove(&id);
        if let Some(complete) = complete {
            let outcome: WorkOutcome = if finished {
                Ok(())
            } else {
                Err(self.failure(code::GENERIC_FAILURE))
            };
            complete(self, Some(LocalWork(id)), outcome);
        }
        true
    }

    /// Drain completions until no work is outstanding
    pub fn run_until_idle(&self) {
        while self.run_once() {}
    }

    /// Drain completions until `promise` settles or no work is left
    pub fn run_until_settled(&self, promise: ValueId) -> PromiseState {
        loop {
            let state = self.promise_state(promise);
            if state != PromiseState::Pending || !self.run_once() {
                return state;
            }
        }
    }
}

impl Embedding for LocalRuntime {
    type Value = ValueId;
    type Deferred = LocalDeferred;
    type Reference = LocalReference;

    fn last_error(&self) -> LastError {
        self.inner.last_error.borrow().clone()
    }

    fn type_of(&self, value: ValueId) -> Result<ValueKind> {
        self.enter(Primitive::TypeOf)?;
        self.bump(|s| s.type_queries += 1);
        self.with_value(value, LocalValue::kind)
    }

    fn undefined(&self) -> Result<ValueId> {
        self.enter(Primitive::CreateValue)?;
        Ok(self.undefined_value())
    }

    fn null(&self) -> Result<ValueId> {
        self.enter(Primitive::CreateValue)?;
        Ok(self.null_value())
    }

    fn create_string(&self, text: &str) -> Result<ValueId> {
        self.enter(Primitive::CreateValue)?;
        Ok(self.string(text))
    }

    fn create_number(&self, number: f64) -> Result<ValueId> {
        self.enter(Primitive::CreateValue)?;
        Ok(self.number(number))
    }

    fn create_object(&self) -> Result<ValueId> {
        self.enter(Primitive::CreateValue)?;
        Ok(self.object(&[]))
    }

    fn named_property(&self, object: ValueId, name: &str) -> Result<ValueId> {
        self.enter(Primitive::NamedProperty)?;
        let found = self.with_value(object, |v| match v {
            LocalValue::Object(fields) => Some(fields.get(name).copied()),
            _ => None,
        })?;
        match found {
            Some(Some(id)) => Ok(id),
            Some(None) => Ok(self.undefined_value()),
            None => Err(self.failure(code::OBJECT_EXPECTED)),
        }
    }

    fn set_named_property(&self, object: ValueId, name: &str, value: ValueId) -> Result<()> {
        self.enter(Primitive::SetNamedProperty)?;
        let mut heap = self.inner.heap.borrow_mut();
        match heap.get_mut(object) {
            Some(LocalValue::Object(fields)) => {
                fields.insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(self.failure(code::OBJECT_EXPECTED)),
        }
    }

    fn string_utf8_len(&self, value: ValueId) -> Result<usize> {
        self.enter(Primitive::ReadString)?;
        match self.with_value(value, |v| v.as_str().map(str::len))? {
            Some(len) => Ok(len),
            None => Err(self.failure(code::STRING_EXPECTED)),
        }
    }

    fn copy_string_utf8(&self, value: ValueId, buf: &mut [u8]) -> Result<usize> {
        self.enter(Primitive::ReadString)?;
        if buf.is_empty() {
            return Err(self.failure(code::INVALID_ARG));
        }
        let Some(text) = self.with_value(value, |v| v.as_str().map(str::to_string))? else {
            return Err(self.failure(code::STRING_EXPECTED));
        };
        // Never split a character, like the host's UTF-8 writer
        let mut n = text.len().min(buf.len() - 1);
        while !text.is_char_boundary(n) {
            n -= 1;
        }
        buf[..n].copy_from_slice(&text.as_bytes()[..n]);
        buf[n] = 0;
        Ok(n)
    }

    fn number_i32(&self, value: ValueId) -> Result<i32> {
        self.enter(Primitive::ReadNumber)?;
        match self.with_value(value, |v| match v {
            LocalValue::Number(n) => Some(*n),
            _ => None,
        })? {
            Some(n) => Ok(to_int32(n)),
            None => Err(self.failure(code::NUMBER_EXPECTED)),
        }
    }

    fn create_error(&self, code: ValueId, message: ValueId) -> Result<ValueId> {
        self.enter(Primitive::CreateError)?;
        let code = match self.value(code) {
            Some(LocalValue::String(s)) => Some(s),
            Some(LocalValue::Undefined) | Some(LocalValue::Null) => None,
            _ => return Err(self.failure(code::STRING_EXPECTED)),
        };
        let Some(message) = self.string_value(message) else {
            return Err(self.failure(code::STRING_EXPECTED));
        };
        Ok(self.alloc(LocalValue::Error { code, message }))
    }

    fn throw_error(&self, code: Option<&str>, message: &str) -> Result<()> {
        self.enter(Primitive::ThrowError)?;
        let error = self.alloc(LocalValue::Error {
            code: code.map(str::to_string),
            message: message.to_string(),
        });
        self.inner.heap.borrow_mut().pending_exception = Some(error);
        self.bump(|s| s.exceptions_thrown += 1);
        Ok(())
    }

    fn create_promise(&self) -> Result<(LocalDeferred, ValueId)> {
        self.enter(Primitive::CreatePromise)?;
        let (index, promise) = self.inner.heap.borrow_mut().new_promise();
        Ok((LocalDeferred(index), promise))
    }

    fn resolve_deferred(&self, deferred: LocalDeferred, value: ValueId) -> Result<()> {
        self.enter(Primitive::ResolveDeferred)?;
        let settled = self
            .inner
            .heap
            .borrow_mut()
            .settle(deferred.0, PromiseState::Fulfilled(value));
        if !settled {
            return Err(self.failure(code::GENERIC_FAILURE));
        }
        self.bump(|s| s.promises_fulfilled += 1);
        Ok(())
    }

    fn reject_deferred(&self, deferred: LocalDeferred, error: ValueId) -> Result<()> {
        self.enter(Primitive::RejectDeferred)?;
        let settled = self
            .inner
            .heap
            .borrow_mut()
            .settle(deferred.0, PromiseState::Rejected(error));
        if !settled {
            return Err(self.failure(code::GENERIC_FAILURE));
        }
        self.bump(|s| s.promises_rejected += 1);
        Ok(())
    }

    fn create_reference(&self, value: ValueId) -> Result<LocalReference> {
        self.enter(Primitive::CreateReference)?;
        let id = self.inner.heap.borrow_mut().add_reference(value);
        self.bump(|s| s.references_created += 1);
        Ok(LocalReference(id))
    }

    fn delete_reference(&self, reference: LocalReference) -> Result<()> {
        self.enter(Primitive::DeleteReference)?;
        if self
            .inner
            .heap
            .borrow_mut()
            .references
            .remove(&reference.0)
            .is_none()
        {
            return Err(self.failure(code::INVALID_ARG));
        }
        self.bump(|s| s.references_deleted += 1);
        Ok(())
    }
}

impl Executor for LocalRuntime {
    type Work = LocalWork;

    fn queue_work(
        &self,
        name: &str,
        execute: Execute,
        complete: Complete<Self>,
    ) -> std::result::Result<(), QueueRejected<Self>> {
        if let Err(error) = self.enter(Primitive::QueueWork) {
            return Err(QueueRejected { error, complete });
        }
        let pool = match self.pool() {
            Ok(pool) => pool,
            Err(error) => return Err(QueueRejected { error, complete }),
        };

        let id = self.inner.next_work.get();
        self.inner.next_work.set(id + 1);
        self.inner.pending.borrow_mut().insert(id, complete);
        self.inner.live_works.borrow_mut().insert(id);

        let done = self.inner.done_tx.clone();
        let name = name.to_string();
        pool.spawn_blocking(move || {
            let finished = panic::catch_unwind(AssertUnwindSafe(execute)).is_ok();
            if !finished {
                tracing::error!(work = %name, "work item panicked");
            }
            // The runtime may already be gone
            let _ = done.send((id, finished));
        });

        self.bump(|s| s.works_queued += 1);
        Ok(())
    }

    fn delete_work(&self, work: LocalWork) -> Result<()> {
        self.enter(Primitive::DeleteWork)?;
        if !self.inner.live_works.borrow_mut().remove(&work.0) {
            return Err(self.failure(code::INVALID_ARG));
        }
        self.bump(|s| s.works_deleted += 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let rt = LocalRuntime::new();
        let cases = [
            (rt.undefined_value(), ValueKind::Undefined),
            (rt.null_value(), ValueKind::Null),
            (rt.boolean(false), ValueKind::Boolean),
            (rt.number(1.5), ValueKind::Number),
            (rt.string("x"), ValueKind::String),
            (rt.symbol("s"), ValueKind::Symbol),
            (rt.object(&[]), ValueKind::Object),
            (rt.function("f"), ValueKind::Function),
            (rt.external(), ValueKind::External),
            (rt.big_int(7), ValueKind::Unknown),
        ];
        for (value, kind) in cases {
            assert_eq!(rt.type_of(value).unwrap(), kind);
        }
    }

    #[test]
    fn test_last_error_is_overwritten() {
        let rt = LocalRuntime::new();
        rt.fail_next(Primitive::CreateValue, 9);
        let err = rt.create_string("x").unwrap_err();
        assert_eq!(rt.last_error().code, 9);
        assert_eq!(err.to_string(), "Unknown failure");

        // A later successful call clears the facility
        rt.create_string("y").unwrap();
        assert_eq!(rt.last_error(), LastError::default());
    }

    #[test]
    fn test_promise_settles_once() {
        let rt = LocalRuntime::new();
        let (deferred, promise) = rt.create_promise().unwrap();
        let value = rt.number(1.0);
        rt.resolve_deferred(deferred, value).unwrap();
        assert_eq!(rt.promise_state(promise), PromiseState::Fulfilled(value));
        assert_eq!(rt.stats().promises_fulfilled, 1);

        let Some(LocalValue::Promise(index)) = rt.value(promise) else {
            panic!("not a promise");
        };
        let error = rt.string("late");
        let err = rt.reject_deferred(LocalDeferred(index), error).unwrap_err();
        assert_eq!(err.to_string(), "Unknown failure");
        assert!(rt.resolve_deferred(LocalDeferred(index), value).is_err());
        assert_eq!(rt.promise_state(promise), PromiseState::Fulfilled(value));
        assert_eq!(rt.stats().promises_fulfilled, 1);
        assert_eq!(rt.stats().promises_rejected, 0);
    }

    #[test]
    fn test_number_i32_wraps_like_to_int32() {
        let rt = LocalRuntime::new();
        let cases = [
            (4_294_967_396.0, 100),
            (2_147_483_648.0, i32::MIN),
            (-2_147_483_649.0, i32::MAX),
            (-1.9, -1),
            (7.9, 7),
            (f64::NAN, 0),
            (f64::INFINITY, 0),
        ];
        for (n, expected) in cases {
            let value = rt.number(n);
            assert_eq!(rt.number_i32(value).unwrap(), expected, "{n}");
        }
    }

    #[test]
    fn test_copy_string_truncates_on_char_boundary() {
        let rt = LocalRuntime::new();
        let value = rt.string("aé");
        let mut buf = [0xffu8; 3];
        let written = rt.copy_string_utf8(value, &mut buf).unwrap();
        assert_eq!(written, 1);
        assert_eq!(&buf[..2], b"a\0");
    }

    #[test]
    fn test_reference_lifecycle() {
        let rt = LocalRuntime::new();
        let obj = rt.object(&[]);
        let reference = rt.create_reference(obj).unwrap();
        assert_eq!(rt.live_references(), 1);
        rt.delete_reference(reference).unwrap();
        assert_eq!(rt.live_references(), 0);
    }

    #[test]
    fn test_throw_error_sets_pending_exception() {
        let rt = LocalRuntime::new();
        rt.throw_error(Some("4001"), "bad").unwrap();
        let error = rt.take_exception().unwrap();
        assert_eq!(
            rt.error_parts(error),
            Some((Some("4001".to_string()), "bad".to_string()))
        );
        assert!(rt.take_exception().is_none());
    }

    #[test]
    fn test_work_runs_off_thread_and_completes_on_owner() {
        let rt = LocalRuntime::new();
        let owner = std::thread::current().id();
        let (tx, rx) = mpsc::channel();
        let seen = Rc::new(Cell::new(false));
        let seen_in_complete = Rc::clone(&seen);

        rt.queue_work(
            "sample",
            Box::new(move || {
                let _ = tx.send(std::thread::current().id());
            }),
            Box::new(move |env: &LocalRuntime, work, outcome| {
                assert!(outcome.is_ok());
                assert_eq!(std::thread::current().id(), owner);
                if let Some(work) = work {
                    env.delete_work(work).unwrap();
                }
                seen_in_complete.set(true);
            }),
        )
        .unwrap();

        assert_eq!(rt.pending_work(), 1);
        rt.run_until_idle();
        assert!(seen.get());
        assert_ne!(rx.recv().unwrap(), owner);
        assert_eq!(rt.live_work_tokens(), 0);
    }
}
