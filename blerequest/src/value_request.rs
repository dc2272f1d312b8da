use std::any::type_name;
use std::marker::PhantomData;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::callback::ValueCallback;
use crate::data::{RequestValue, Value};
use crate::error::{Error, ErrorKind, Result};
use crate::execution::{Dispatcher, Pending, Waiter, WaiterGuard};
use crate::gate::OutcomeGate;
use crate::request::{Outcome, Request};
use crate::status::Status;

/// A [`Request`] that produces or carries a value of type `V`.
///
/// Besides the callbacks of `Request`, a value request has a value callback set with
/// [`with()`][Self::with], and can be waited on synchronously with [`wait()`][Self::wait].
pub struct ValueRequest<V> {
    request: Request,
    phantom: PhantomData<fn(&V)>,
}

impl<V> Clone for ValueRequest<V> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            phantom: PhantomData,
        }
    }
}

impl<V> std::fmt::Debug for ValueRequest<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValueRequest").field(&self.request).finish()
    }
}

impl<V> Deref for ValueRequest<V> {
    type Target = Request;

    fn deref(&self) -> &Self::Target {
        &self.request
    }
}

impl<V> From<ValueRequest<V>> for Request {
    fn from(request: ValueRequest<V>) -> Self {
        request.request
    }
}

impl<V: RequestValue> ValueRequest<V> {
    pub(crate) fn new(request: Request) -> Self {
        Self {
            request,
            phantom: PhantomData,
        }
    }

    pub fn done(self, callback: impl FnMut() + Send + 'static) -> Self {
        Self::new(self.request.done(callback))
    }

    pub fn fail(self, callback: impl FnMut(Status) + Send + 'static) -> Self {
        Self::new(self.request.fail(callback))
    }

    pub fn invalid(self, callback: impl FnMut() + Send + 'static) -> Self {
        Self::new(self.request.invalid(callback))
    }

    pub fn before(self, callback: impl FnMut() + Send + 'static) -> Self {
        Self::new(self.request.before(callback))
    }

    pub fn then(self, callback: impl FnMut() + Send + 'static) -> Self {
        Self::new(self.request.then(callback))
    }

    pub fn attach(self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self::new(self.request.attach(dispatcher))
    }

    /// Sets the value callback, replacing the previous one.
    pub fn with(self, mut callback: impl ValueCallback<V> + 'static) -> Self {
        self.request.set_value_slot(Box::new(move |value: &Value| {
            if let Some(value) = V::extract(value) {
                callback.on_value(value);
            }
        }));
        self
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    /// Submits the request and blocks until it completes, returning a default-constructed `R`
    /// populated with the value.
    ///
    /// See [`wait_with_timeout()`][Self::wait_with_timeout].
    pub fn wait<R>(&self) -> Result<R>
    where
        R: ValueCallback<V> + Default + 'static,
    {
        self.wait_with_timeout(R::default, Duration::ZERO)
    }

    /// Like [`wait()`][Self::wait], failing with [`ErrorKind::Timeout`] after `timeout`.
    ///
    /// A zero `timeout` waits without bound.
    pub fn wait_timeout<R>(&self, timeout: Duration) -> Result<R>
    where
        R: ValueCallback<V> + Default + 'static,
    {
        self.wait_with_timeout(R::default, timeout)
    }

    pub fn wait_with<R, F>(&self, factory: F) -> Result<R>
    where
        R: ValueCallback<V> + 'static,
        F: FnOnce() -> R,
    {
        self.wait_with_timeout(factory, Duration::ZERO)
    }

    /// Submits the request and blocks the calling thread until it completes or `timeout` elapses.
    ///
    /// `factory` builds a fresh response container that receives the value in place of the
    /// callback set with [`with()`][Self::with]. While the wait is active, the outcome goes to
    /// the wait and not to the success, failure or value callbacks; those stay configured as
    /// they were and serve later submissions.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidUsage`] when called on the dispatch thread, when the request is not
    ///   attached to a dispatcher, or while another wait on this request is in progress.
    /// - [`ErrorKind::InstantiationFailed`] when `factory` panics.
    /// - [`ErrorKind::Timeout`] when no outcome arrived in time. The request stays queued and
    ///   a late outcome is delivered to the request's callbacks.
    /// - [`ErrorKind::DeviceDisconnected`], [`ErrorKind::TransportDisabled`],
    ///   [`ErrorKind::OperationFailed`] or [`ErrorKind::InvalidRequest`] for the reported outcome.
    pub fn wait_with_timeout<R, F>(&self, factory: F, timeout: Duration) -> Result<R>
    where
        R: ValueCallback<V> + 'static,
        F: FnOnce() -> R,
    {
        let token = self.request.begin_wait(true)?;

        let container = panic::catch_unwind(AssertUnwindSafe(factory)).map_err(|_| {
            Error::with_message(
                ErrorKind::InstantiationFailed,
                format!("the factory for `{}` panicked", type_name::<R>()),
            )
        })?;

        let gate = Arc::new(OutcomeGate::new());
        let response = Arc::new(Mutex::new(None));
        gate.close();

        let guard = token.submit(Waiter::new(Box::new(Armed::<V, R, _>::new(container, {
            let gate = gate.clone();
            let response = response.clone();
            move |result: Result<R>| {
                let status = match &result {
                    Ok(_) => Status::SUCCESS,
                    Err(error) => error.status().unwrap_or(Status::REQUEST_FAILED),
                };
                *response.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
                gate.release(status);
            }
        }))));

        if !gate.block(timeout) {
            if guard.abandon() {
                debug!(request = self.request.id(), ?timeout, "wait timed out");
                return Err(ErrorKind::Timeout.into());
            }
            // The outcome arrived while timing out and is being handed over.
            gate.block(Duration::ZERO);
        }
        drop(guard);

        let status = gate.status();
        debug!(request = self.request.id(), %status, "wait released");
        let result = response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        result.unwrap_or_else(|| Err(Error::from_status(status)))
    }

    /// Submits the request with `container` standing in for the value callback, and calls
    /// `complete` with the populated container or the classified error once it completes.
    ///
    /// `complete` runs on the dispatch thread. The wait stays registered for as long as the
    /// returned guard lives; dropping it earlier routes the outcome to the request's callbacks.
    /// Unlike [`wait()`][Self::wait] this may be called on the dispatch thread.
    pub fn submit_with<R, F>(&self, container: R, complete: F) -> Result<WaiterGuard>
    where
        R: ValueCallback<V> + 'static,
        F: FnOnce(Result<R>) + Send + 'static,
    {
        let token = self.request.begin_wait(false)?;
        Ok(token.submit(Waiter::new(Box::new(Armed::<V, R, F>::new(
            container, complete,
        )))))
    }
}

struct Armed<V, R, F> {
    container: R,
    complete: F,
    phantom: PhantomData<fn(&V)>,
}

impl<V, R, F> Armed<V, R, F> {
    fn new(container: R, complete: F) -> Self {
        Self {
            container,
            complete,
            phantom: PhantomData,
        }
    }
}

impl<V, R, F> Pending for Armed<V, R, F>
where
    V: RequestValue,
    R: ValueCallback<V>,
    F: FnOnce(Result<R>) + Send,
{
    fn value(&mut self, value: &Value) {
        if let Some(value) = V::extract(value) {
            self.container.on_value(value);
        }
    }

    fn complete(self: Box<Self>, outcome: Outcome) {
        let Armed {
            container,
            complete,
            ..
        } = *self;
        complete(outcome.into_result().map(|()| container));
    }
}
