//! Observer types registered on a request.

use crate::status::Status;

/// Called when the request completed successfully.
pub type SuccessCallback = Box<dyn FnMut() + Send>;

/// Called with the failure status when the request failed.
pub type FailCallback = Box<dyn FnMut(Status) + Send>;

/// Called when the dispatcher rejected the request as invalid.
pub type InvalidCallback = Box<dyn FnMut() + Send>;

/// Called when the request is handed to the dispatcher.
pub type BeforeCallback = Box<dyn FnMut() + Send>;

/// Called after the outcome callback of the request has run.
pub type AfterCallback = Box<dyn FnMut() + Send>;

/// Receives the value produced or carried by a [`ValueRequest`][crate::ValueRequest].
///
/// Response containers passed to [`wait()`][crate::ValueRequest::wait] implement this trait and
/// are populated in place. Closures taking `&V` implement it automatically.
pub trait ValueCallback<V>: Send {
    fn on_value(&mut self, value: &V);
}

impl<V, F> ValueCallback<V> for F
where
    F: FnMut(&V) + Send,
{
    fn on_value(&mut self, value: &V) {
        self(value)
    }
}
