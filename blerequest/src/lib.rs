//! Requests against a single connected Bluetooth LE peripheral, observed through callbacks or by
//! blocking the calling thread.
//!
//! A [`Request`] describes one operation (connect, read, write, notification toggle, MTU or
//! connection priority change, ...). It is configured with callbacks, attached to a
//! [`Dispatcher`] that executes one request at a time, and submitted with
//! [`enqueue()`][Request::enqueue]. Requests that produce a value are [`ValueRequest`]s; they
//! can also be submitted with [`wait()`][ValueRequest::wait], which blocks until the
//! dispatcher reports the outcome and returns the value or a classified [`Error`].
//!
//! [`RequestQueue`] is a FIFO dispatcher running on its own dispatch thread on top of a
//! platform [`Device`].

mod callback;
mod data;
mod device;
pub mod dispatch;
pub mod error;
mod execution;
mod gate;
mod queue;
mod request;
mod status;
mod target;
mod value_request;

pub use callback::*;
pub use data::*;
pub use device::*;
pub use dispatch::QueueConfig;
pub use error::{Error, ErrorKind, Result};
pub use execution::{Dispatcher, Execution, WaiterGuard};
pub use gate::*;
pub use queue::*;
pub use request::{Outcome, Request, RequestKind};
pub use status::*;
pub use target::*;
pub use value_request::*;

pub use btuuid::BluetoothUuid;
