use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::callback::{
    AfterCallback, BeforeCallback, FailCallback, InvalidCallback, SuccessCallback,
};
use crate::data::{ConnectionParameters, ConnectionPriority, Data, Value, WriteType};
use crate::error::{Error, ErrorKind, Result};
use crate::execution::{Dispatcher, Execution, Waiter, WaiterGuard};
use crate::status::Status;
use crate::target::{Characteristic, Descriptor, Target};
use crate::value_request::ValueRequest;

/// The operation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Connect,
    Disconnect,
    CreateBond,
    RemoveBond,
    Read,
    Write,
    ReadDescriptor,
    WriteDescriptor,
    EnableNotifications,
    EnableIndications,
    DisableNotifications,
    RequestMtu,
    RequestConnectionPriority,
    ReadRssi,
    RefreshCache,
    Sleep,
}

impl RequestKind {
    fn needs_characteristic(self) -> bool {
        matches!(
            self,
            RequestKind::Read
                | RequestKind::Write
                | RequestKind::EnableNotifications
                | RequestKind::EnableIndications
                | RequestKind::DisableNotifications
        )
    }

    fn needs_descriptor(self) -> bool {
        matches!(
            self,
            RequestKind::ReadDescriptor | RequestKind::WriteDescriptor
        )
    }
}

/// The last recorded outcome of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Outcome {
    #[default]
    Pending,
    Success,
    Failed(Status),
    Invalid,
}

impl Outcome {
    /// Maps the outcome to the error a synchronous caller observes.
    ///
    /// `Pending` means no outcome arrived, which is reported as [`ErrorKind::Timeout`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Outcome::Success => Ok(()),
            Outcome::Failed(status) => Err(Error::from_status(status)),
            Outcome::Invalid => Err(ErrorKind::InvalidRequest.into()),
            Outcome::Pending => Err(ErrorKind::Timeout.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Payload {
    None,
    Write { value: Vec<u8>, write_type: WriteType },
    Mtu(u16),
    Priority(ConnectionPriority),
    Sleep(Duration),
}

pub(crate) type ValueSlot = Box<dyn FnMut(&Value) + Send>;

#[derive(Default)]
pub(crate) struct Callbacks {
    success: Option<SuccessCallback>,
    fail: Option<FailCallback>,
    invalid: Option<InvalidCallback>,
    before: Option<BeforeCallback>,
    after: Option<AfterCallback>,
    value: Option<ValueSlot>,
}

/// A single operation against a connected peripheral.
///
/// `Request` is a cheap handle; clones refer to the same request. Configuration methods replace
/// the previously registered observer of the same slot and return the request for chaining.
///
/// ```no_run
/// # use blerequest::{Request, Dispatcher};
/// # use std::sync::Arc;
/// # fn example(queue: Arc<dyn Dispatcher>) -> blerequest::Result<()> {
/// Request::connect()
///     .done(|| println!("connected"))
///     .fail(|status| println!("connection failed: {status}"))
///     .attach(queue)
///     .enqueue()
/// # }
/// ```
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestInner>,
}

struct RequestInner {
    id: u64,
    kind: RequestKind,
    target: Option<Target>,
    payload: Payload,
    callbacks: Mutex<Callbacks>,
    dispatcher: Mutex<Option<Arc<dyn Dispatcher>>>,
    outcome: Mutex<Outcome>,
    waiting: AtomicBool,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("target", &self.inner.target)
            .field("outcome", &self.outcome())
            .finish()
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Request {}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Request {
    pub(crate) fn new(kind: RequestKind, target: Option<Target>, payload: Payload) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        Request {
            inner: Arc::new(RequestInner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                kind,
                target,
                payload,
                callbacks: Mutex::new(Callbacks::default()),
                dispatcher: Mutex::new(None),
                outcome: Mutex::new(Outcome::Pending),
                waiting: AtomicBool::new(false),
            }),
        }
    }

    pub fn connect() -> Request {
        Request::new(RequestKind::Connect, None, Payload::None)
    }

    pub fn disconnect() -> Request {
        Request::new(RequestKind::Disconnect, None, Payload::None)
    }

    pub fn create_bond() -> Request {
        Request::new(RequestKind::CreateBond, None, Payload::None)
    }

    pub fn remove_bond() -> Request {
        Request::new(RequestKind::RemoveBond, None, Payload::None)
    }

    /// Clears the platform's service cache. Services must be discovered again afterwards.
    pub fn refresh_cache() -> Request {
        Request::new(RequestKind::RefreshCache, None, Payload::None)
    }

    /// Holds the queue for `duration` before the next request runs.
    pub fn sleep(duration: Duration) -> Request {
        Request::new(RequestKind::Sleep, None, Payload::Sleep(duration))
    }

    pub fn enable_notifications(characteristic: Characteristic) -> Request {
        Request::new(
            RequestKind::EnableNotifications,
            Some(characteristic.into()),
            Payload::None,
        )
    }

    pub fn enable_indications(characteristic: Characteristic) -> Request {
        Request::new(
            RequestKind::EnableIndications,
            Some(characteristic.into()),
            Payload::None,
        )
    }

    pub fn disable_notifications(characteristic: Characteristic) -> Request {
        Request::new(
            RequestKind::DisableNotifications,
            Some(characteristic.into()),
            Payload::None,
        )
    }

    pub fn read(characteristic: Characteristic) -> ValueRequest<Data> {
        ValueRequest::new(Request::new(
            RequestKind::Read,
            Some(characteristic.into()),
            Payload::None,
        ))
    }

    pub fn read_descriptor(descriptor: Descriptor) -> ValueRequest<Data> {
        ValueRequest::new(Request::new(
            RequestKind::ReadDescriptor,
            Some(descriptor.into()),
            Payload::None,
        ))
    }

    /// Writes `value`. The value callback receives the bytes that were sent.
    pub fn write(
        characteristic: Characteristic,
        value: impl Into<Vec<u8>>,
        write_type: WriteType,
    ) -> ValueRequest<Data> {
        ValueRequest::new(Request::new(
            RequestKind::Write,
            Some(characteristic.into()),
            Payload::Write {
                value: value.into(),
                write_type,
            },
        ))
    }

    pub fn write_descriptor(descriptor: Descriptor, value: impl Into<Vec<u8>>) -> ValueRequest<Data> {
        ValueRequest::new(Request::new(
            RequestKind::WriteDescriptor,
            Some(descriptor.into()),
            Payload::Write {
                value: value.into(),
                write_type: WriteType::WithResponse,
            },
        ))
    }

    /// Requests an MTU. The value callback receives the MTU the peripheral agreed to.
    pub fn request_mtu(mtu: u16) -> ValueRequest<u16> {
        ValueRequest::new(Request::new(RequestKind::RequestMtu, None, Payload::Mtu(mtu)))
    }

    pub fn request_connection_priority(
        priority: ConnectionPriority,
    ) -> ValueRequest<ConnectionParameters> {
        ValueRequest::new(Request::new(
            RequestKind::RequestConnectionPriority,
            None,
            Payload::Priority(priority),
        ))
    }

    pub fn read_rssi() -> ValueRequest<i16> {
        ValueRequest::new(Request::new(RequestKind::ReadRssi, None, Payload::None))
    }

    /// A process-unique identifier, used in log output.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn kind(&self) -> RequestKind {
        self.inner.kind
    }

    pub fn target(&self) -> Option<&Target> {
        self.inner.target.as_ref()
    }

    /// The bytes a write request sends.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.inner.payload {
            Payload::Write { value, .. } => Some(value),
            _ => None,
        }
    }

    pub(crate) fn payload(&self) -> &Payload {
        &self.inner.payload
    }

    /// Whether the request addresses the kind of attribute its operation needs.
    pub fn is_valid(&self) -> bool {
        let kind = self.inner.kind;
        match &self.inner.target {
            Some(Target::Characteristic(_)) => kind.needs_characteristic(),
            Some(Target::Descriptor(_)) => kind.needs_descriptor(),
            None => !kind.needs_characteristic() && !kind.needs_descriptor(),
        }
    }

    /// The outcome recorded by the most recent execution.
    pub fn outcome(&self) -> Outcome {
        *lock(&self.inner.outcome)
    }

    /// Sets the callback invoked when the request completes successfully.
    pub fn done(self, callback: impl FnMut() + Send + 'static) -> Self {
        self.callbacks().success = Some(Box::new(callback));
        self
    }

    /// Sets the callback invoked with the status when the request fails.
    pub fn fail(self, callback: impl FnMut(Status) + Send + 'static) -> Self {
        self.callbacks().fail = Some(Box::new(callback));
        self
    }

    /// Sets the callback invoked when the dispatcher rejects the request as invalid.
    pub fn invalid(self, callback: impl FnMut() + Send + 'static) -> Self {
        self.callbacks().invalid = Some(Box::new(callback));
        self
    }

    /// Sets the hook invoked right before the request is handed to the dispatcher.
    pub fn before(self, callback: impl FnMut() + Send + 'static) -> Self {
        self.callbacks().before = Some(Box::new(callback));
        self
    }

    /// Sets the hook invoked after the outcome callback has run.
    pub fn then(self, callback: impl FnMut() + Send + 'static) -> Self {
        self.callbacks().after = Some(Box::new(callback));
        self
    }

    /// Sets the dispatcher that [`enqueue()`][Self::enqueue] submits to.
    pub fn attach(self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        *lock(&self.inner.dispatcher) = Some(dispatcher);
        self
    }

    /// Submits the request to its dispatcher as a new unit of work.
    ///
    /// Outcomes are delivered to the registered callbacks on the dispatch thread.
    pub fn enqueue(&self) -> Result<()> {
        let dispatcher = self.dispatcher()?;
        self.submit(&dispatcher, None);
        Ok(())
    }

    pub(crate) fn set_value_slot(&self, slot: ValueSlot) {
        self.callbacks().value = Some(slot);
    }

    fn callbacks(&self) -> MutexGuard<'_, Callbacks> {
        lock(&self.inner.callbacks)
    }

    fn dispatcher(&self) -> Result<Arc<dyn Dispatcher>> {
        lock(&self.inner.dispatcher)
            .clone()
            .ok_or_else(|| Error::usage("the request is not attached to a dispatcher"))
    }

    fn submit(&self, dispatcher: &Arc<dyn Dispatcher>, waiter: Option<Arc<Waiter>>) {
        *lock(&self.inner.outcome) = Outcome::Pending;
        self.invoke(|callbacks| &mut callbacks.before, |before| before());
        trace!(
            request = self.inner.id,
            kind = ?self.inner.kind,
            waiting = waiter.is_some(),
            "submitting request"
        );
        dispatcher.submit(Execution::new(self.clone(), waiter));
    }

    /// Claims the single waiter slot of this request.
    ///
    /// With `confined` set, waiting on the dispatch thread is rejected because the outcome is
    /// delivered on that thread.
    pub(crate) fn begin_wait(&self, confined: bool) -> Result<WaitToken> {
        let dispatcher = self.dispatcher()?;
        if confined && dispatcher.is_dispatch_thread() {
            return Err(Error::usage(
                "cannot wait for a request on the dispatch thread",
            ));
        }
        if self
            .inner
            .waiting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::usage("another wait on this request is in progress"));
        }
        Ok(WaitToken {
            request: self.clone(),
            dispatcher,
        })
    }

    pub(crate) fn record(&self, outcome: Outcome) {
        *lock(&self.inner.outcome) = outcome;
    }

    /// Delivers `outcome` to the caller-visible observer for it.
    pub(crate) fn notify_outcome(&self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.invoke(|callbacks| &mut callbacks.success, |success| success()),
            Outcome::Failed(status) => {
                self.invoke(|callbacks| &mut callbacks.fail, |fail| fail(status))
            }
            Outcome::Invalid => self.invoke(|callbacks| &mut callbacks.invalid, |invalid| invalid()),
            Outcome::Pending => {}
        }
    }

    pub(crate) fn notify_value(&self, value: &Value) {
        self.invoke(|callbacks| &mut callbacks.value, |slot| slot(value));
    }

    pub(crate) fn notify_after(&self) {
        self.invoke(|callbacks| &mut callbacks.after, |after| after());
    }

    /// Runs the observer in `slot` without holding the lock, so that it may reconfigure the
    /// request. The observer goes back into the slot unless it was replaced meanwhile.
    fn invoke<C: ?Sized>(
        &self,
        slot: impl for<'a> Fn(&'a mut Callbacks) -> &'a mut Option<Box<C>>,
        call: impl FnOnce(&mut C),
    ) {
        let taken = slot(&mut self.callbacks()).take();
        if let Some(mut callback) = taken {
            call(&mut *callback);
            let mut callbacks = self.callbacks();
            let current = slot(&mut callbacks);
            if current.is_none() {
                *current = Some(callback);
            }
        }
    }
}

/// Exclusive right to wait on a request. Dropping it frees the slot again.
pub(crate) struct WaitToken {
    request: Request,
    dispatcher: Arc<dyn Dispatcher>,
}

impl WaitToken {
    pub(crate) fn request(&self) -> &Request {
        &self.request
    }

    pub(crate) fn submit(self, waiter: Arc<Waiter>) -> WaiterGuard {
        self.request.submit(&self.dispatcher, Some(waiter.clone()));
        WaiterGuard::new(waiter, self)
    }
}

impl Drop for WaitToken {
    fn drop(&mut self) {
        debug!(request = self.request.inner.id, "wait finished");
        self.request.inner.waiting.store(false, Ordering::Release);
    }
}
