//! An asynchronous wrapper for the `blerequest` crate.
//!
//! [`ValueRequestAsync`] submits a [`ValueRequest`] and resolves once its dispatcher reports the
//! outcome, without blocking a thread. Dropping the future before then detaches it from the
//! request; the outcome is then delivered to the request's own callbacks.

pub mod error;
mod value_request;

pub use blerequest::{
    Characteristic, Data, Descriptor, Dispatcher, QueueConfig, Request, RequestQueue, Response,
    Status, ValueCallback, ValueRequest,
};
pub use value_request::*;
