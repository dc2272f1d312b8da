use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};

use blerequest::{RequestValue, ValueCallback, ValueRequest, WaiterGuard};
use futures_channel::oneshot;
use tracing::debug;

use crate::error::{ErrorKind, Result};

/// An asynchronous wrapper around a [`ValueRequest`].
pub struct ValueRequestAsync<V> {
    inner: ValueRequest<V>,
}

impl<V> Clone for ValueRequestAsync<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> std::fmt::Debug for ValueRequestAsync<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueRequestAsync")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<V> From<ValueRequest<V>> for ValueRequestAsync<V> {
    fn from(inner: ValueRequest<V>) -> Self {
        Self { inner }
    }
}

impl<V> Deref for ValueRequestAsync<V> {
    type Target = ValueRequest<V>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<V: RequestValue> ValueRequestAsync<V> {
    pub fn new(inner: ValueRequest<V>) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> ValueRequest<V> {
        self.inner
    }

    /// Submits the request and resolves to a default-constructed `R` populated with its value.
    pub async fn response<R>(&self) -> Result<R>
    where
        R: ValueCallback<V> + Default + 'static,
    {
        self.response_with(R::default).await
    }

    /// Submits the request and resolves to the container built by `factory`, populated with the
    /// request's value.
    ///
    /// Like [`ValueRequest::wait()`], the outcome goes to the returned future and not to the
    /// request's callbacks. Dropping the future before it resolves detaches it, and a later
    /// outcome is delivered to the callbacks instead. Unlike `wait()`, this may be awaited on the
    /// dispatch thread.
    pub async fn response_with<R, F>(&self, factory: F) -> Result<R>
    where
        R: ValueCallback<V> + 'static,
        F: FnOnce() -> R,
    {
        let container = panic::catch_unwind(AssertUnwindSafe(factory))
            .map_err(|_| ErrorKind::InstantiationFailed)?;

        let (sender, receiver) = oneshot::channel();
        let guard = self.inner.submit_with(container, move |result| {
            // The receiver is gone if the future was dropped while the outcome was in flight.
            let _ = sender.send(result);
        })?;
        let in_flight = InFlight {
            guard: Some(guard),
            request: self.inner.id(),
        };

        let result = receiver.await?;
        in_flight.finish();
        Ok(result?)
    }
}

struct InFlight {
    guard: Option<WaiterGuard>,
    request: u64,
}

impl InFlight {
    fn finish(mut self) {
        self.guard.take();
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            if guard.abandon() {
                debug!(request = self.request, "response dropped before the request completed");
            }
        }
    }
}
