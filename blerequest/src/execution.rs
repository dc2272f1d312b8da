use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, trace, warn};

use crate::data::{Data, NotificationMode, Value};
use crate::device::Device;
use crate::request::{Outcome, Payload, Request, RequestKind, WaitToken};
use crate::status::Status;
use crate::target::{Characteristic, Descriptor, Target};

/// Executes submitted requests against a peripheral, one at a time.
///
/// Implementations must eventually call exactly one of [`Execution::notify_success()`],
/// [`Execution::notify_failure()`] or [`Execution::notify_invalid()`] for every execution
/// submitted, and always on their dispatch thread. Dropping an execution without notifying it
/// fails it with [`Status::CANCELLED`].
pub trait Dispatcher: Send + Sync {
    fn submit(&self, execution: Execution);

    /// Returns `true` if the calling thread is the one outcomes are delivered on.
    fn is_dispatch_thread(&self) -> bool;
}

/// One submission of a [`Request`], owned by the dispatcher until it is notified.
pub struct Execution {
    request: Request,
    waiter: Option<Arc<Waiter>>,
    finished: bool,
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("request", &self.request)
            .field("waiting", &self.waiter.is_some())
            .finish()
    }
}

impl Execution {
    pub(crate) fn new(request: Request, waiter: Option<Arc<Waiter>>) -> Self {
        Self {
            request,
            waiter,
            finished: false,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn kind(&self) -> RequestKind {
        self.request.kind()
    }

    pub fn target(&self) -> Option<&Target> {
        self.request.target()
    }

    pub fn is_valid(&self) -> bool {
        self.request.is_valid()
    }

    /// Runs the operation on `device` and delivers the value it produced.
    ///
    /// This does not record an outcome; the dispatcher notifies one afterwards.
    pub fn perform(&self, device: &mut dyn Device) -> Result<(), Status> {
        let value = match (self.kind(), self.request.payload()) {
            (RequestKind::Connect, _) => device.connect().map(|()| Value::None),
            (RequestKind::Disconnect, _) => device.disconnect().map(|()| Value::None),
            (RequestKind::CreateBond, _) => device.create_bond().map(|()| Value::None),
            (RequestKind::RemoveBond, _) => device.remove_bond().map(|()| Value::None),
            (RequestKind::RefreshCache, _) => device.refresh_cache().map(|()| Value::None),
            (RequestKind::Read, _) => device.read(self.characteristic()?).map(Value::Data),
            (RequestKind::ReadDescriptor, _) => {
                device.read_descriptor(self.descriptor()?).map(Value::Data)
            }
            (RequestKind::Write, Payload::Write { value, write_type }) => device
                .write(self.characteristic()?, value, *write_type)
                .map(|()| Value::Data(Data::new(value.clone()))),
            (RequestKind::WriteDescriptor, Payload::Write { value, .. }) => device
                .write_descriptor(self.descriptor()?, value)
                .map(|()| Value::Data(Data::new(value.clone()))),
            (RequestKind::EnableNotifications, _) => device
                .set_notifications(self.characteristic()?, NotificationMode::Notify)
                .map(|()| Value::None),
            (RequestKind::EnableIndications, _) => device
                .set_notifications(self.characteristic()?, NotificationMode::Indicate)
                .map(|()| Value::None),
            (RequestKind::DisableNotifications, _) => device
                .set_notifications(self.characteristic()?, NotificationMode::Disabled)
                .map(|()| Value::None),
            (RequestKind::RequestMtu, Payload::Mtu(mtu)) => device.request_mtu(*mtu).map(Value::Mtu),
            (RequestKind::RequestConnectionPriority, Payload::Priority(priority)) => device
                .request_connection_priority(*priority)
                .map(Value::ConnectionParameters),
            (RequestKind::ReadRssi, _) => device.read_rssi().map(Value::Rssi),
            (RequestKind::Sleep, Payload::Sleep(duration)) => {
                thread::sleep(*duration);
                Ok(Value::None)
            }
            (kind, payload) => {
                warn!(request = self.request.id(), ?kind, ?payload, "payload does not match request kind");
                Err(Status::VALIDATION)
            }
        }?;

        if value != Value::None {
            self.notify_value(&value);
        }
        Ok(())
    }

    fn characteristic(&self) -> Result<&Characteristic, Status> {
        self.target()
            .and_then(Target::as_characteristic)
            .ok_or(Status::NULL_ATTRIBUTE)
    }

    fn descriptor(&self) -> Result<&Descriptor, Status> {
        self.target()
            .and_then(Target::as_descriptor)
            .ok_or(Status::NULL_ATTRIBUTE)
    }

    /// Delivers a value produced by the operation, ahead of notifying success.
    ///
    /// The value goes to the container of an active wait, or else to the request's value callback.
    pub fn notify_value(&self, value: &Value) {
        if let Some(waiter) = &self.waiter {
            if waiter.deliver_value(value) {
                return;
            }
        }
        self.request.notify_value(value);
    }

    pub fn notify_success(mut self) {
        self.finish(Outcome::Success);
    }

    pub fn notify_failure(mut self, status: Status) {
        if status.is_success() {
            warn!(request = self.request.id(), "failure notified with a success status");
            self.finish(Outcome::Success);
        } else {
            self.finish(Outcome::Failed(status));
        }
    }

    pub fn notify_invalid(mut self) {
        self.finish(Outcome::Invalid);
    }

    /// Notifies success or failure according to `result`.
    pub fn complete(self, result: Result<(), Status>) {
        match result {
            Ok(()) => self.notify_success(),
            Err(status) => self.notify_failure(status),
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.finished = true;
        self.request.record(outcome);
        debug!(request = self.request.id(), kind = ?self.kind(), ?outcome, "request finished");

        let consumed = self
            .waiter
            .as_ref()
            .is_some_and(|waiter| waiter.complete(outcome));
        if !consumed {
            self.request.notify_outcome(outcome);
        }
        self.request.notify_after();
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        if !self.finished {
            warn!(request = self.request.id(), "execution dropped without an outcome");
            self.finish(Outcome::Failed(Status::CANCELLED));
        }
    }
}

/// The state an active wait leaves with its execution: the response container and what to do
/// with it once the outcome is known.
pub(crate) trait Pending: Send {
    fn value(&mut self, value: &Value);

    fn complete(self: Box<Self>, outcome: Outcome);
}

enum WaiterState {
    Armed(Box<dyn Pending>),
    /// The pending state is out, receiving a value.
    Delivering,
    Abandoned,
    Done,
}

/// Rendezvous between one execution and the wait that submitted it.
///
/// Exactly one of `complete()` and `abandon()` wins. An execution whose waiter was abandoned
/// delivers its outcome to the request's callbacks instead.
pub(crate) struct Waiter {
    state: Mutex<WaiterState>,
}

impl Waiter {
    pub(crate) fn new(pending: Box<dyn Pending>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(WaiterState::Armed(pending)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, WaiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands `value` to the armed container. The container runs without the lock held, so it may
    /// abandon the wait it belongs to.
    fn deliver_value(&self, value: &Value) -> bool {
        let mut pending = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, WaiterState::Delivering) {
                WaiterState::Armed(pending) => pending,
                other => {
                    *state = other;
                    return false;
                }
            }
        };
        pending.value(value);

        let mut state = self.lock();
        if let WaiterState::Delivering = *state {
            *state = WaiterState::Armed(pending);
        } else {
            drop(state);
            drop(pending);
        }
        true
    }

    fn complete(&self, outcome: Outcome) -> bool {
        let pending = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, WaiterState::Done) {
                WaiterState::Armed(pending) => pending,
                other => {
                    *state = other;
                    return false;
                }
            }
        };
        pending.complete(outcome);
        true
    }

    fn abandon(&self) -> bool {
        let released = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, WaiterState::Abandoned) {
                WaiterState::Done => {
                    *state = WaiterState::Done;
                    return false;
                }
                other => other,
            }
        };
        // The container is dropped outside the lock.
        drop(released);
        true
    }
}

/// Keeps a wait registered with its execution. Dropping the guard abandons the wait.
pub struct WaiterGuard {
    waiter: Arc<Waiter>,
    token: WaitToken,
}

impl std::fmt::Debug for WaiterGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WaiterGuard { .. }")
    }
}

impl WaiterGuard {
    pub(crate) fn new(waiter: Arc<Waiter>, token: WaitToken) -> Self {
        Self { waiter, token }
    }

    /// Detaches the wait from its execution.
    ///
    /// Returns `false` if the execution already completed, in which case its outcome was or is
    /// being handed to the wait. After a successful abandon, a later outcome is delivered to the
    /// request's callbacks.
    pub fn abandon(&self) -> bool {
        let abandoned = self.waiter.abandon();
        if abandoned {
            trace!(request = self.token.request().id(), "wait abandoned");
        }
        abandoned
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.abandon();
    }
}
