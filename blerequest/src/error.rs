//! Error types for this crate.

use std::borrow::Cow;
use std::fmt::Display;

use crate::status::Status;

/// A convenience type alias for a `Result` with an `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

/// An error raised by a synchronous wait or by misuse of a request.
#[derive(Debug, Clone)]
pub struct Error {
    data: ErrorData,
}

/// The kind of error that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// The operation completed with a non-success status.
    OperationFailed(Status),
    /// The device disconnected before the operation completed.
    DeviceDisconnected,
    /// The Bluetooth adapter is disabled.
    TransportDisabled,
    /// The dispatcher rejected the request as invalid.
    InvalidRequest,
    /// No outcome arrived before the deadline. The true outcome is unknown.
    Timeout,
    /// The API was used in a way its contract forbids.
    InvalidUsage,
    /// The response container could not be constructed.
    InstantiationFailed,
}

#[derive(Debug, Clone)]
enum ErrorData {
    Simple(ErrorKind),
    Message(ErrorKind, Cow<'static, str>),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            ErrorData::Simple(kind) => kind.fmt(f),
            ErrorData::Message(kind, message) => write!(f, "{kind}: {message}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            data: ErrorData::Simple(kind),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::from_status(status)
    }
}

impl Error {
    /// Classifies a failure status reported for a request.
    pub fn from_status(status: Status) -> Self {
        ErrorKind::from(status).into()
    }

    pub(crate) fn with_message(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Error {
            data: ErrorData::Message(kind, message.into()),
        }
    }

    pub(crate) fn usage(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(ErrorKind::InvalidUsage, message)
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> ErrorKind {
        match &self.data {
            ErrorData::Simple(kind) => *kind,
            ErrorData::Message(kind, _) => *kind,
        }
    }

    /// The status reported by the device, if this error carries one.
    pub fn status(&self) -> Option<Status> {
        match self.kind() {
            ErrorKind::OperationFailed(status) => Some(status),
            ErrorKind::DeviceDisconnected => Some(Status::DEVICE_DISCONNECTED),
            ErrorKind::TransportDisabled => Some(Status::BLUETOOTH_DISABLED),
            _ => None,
        }
    }
}

impl From<Status> for ErrorKind {
    fn from(status: Status) -> Self {
        match status {
            Status::DEVICE_DISCONNECTED => ErrorKind::DeviceDisconnected,
            Status::BLUETOOTH_DISABLED => ErrorKind::TransportDisabled,
            status => ErrorKind::OperationFailed(status),
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::OperationFailed(status) => {
                write!(f, "operation failed: {status} ({})", status.code())
            }
            ErrorKind::DeviceDisconnected => f.write_str("device disconnected"),
            ErrorKind::TransportDisabled => f.write_str("bluetooth disabled"),
            ErrorKind::InvalidRequest => f.write_str("invalid request"),
            ErrorKind::Timeout => f.write_str("timed out waiting for the request to complete"),
            ErrorKind::InvalidUsage => f.write_str("invalid usage"),
            ErrorKind::InstantiationFailed => f.write_str("could not create the response container"),
        }
    }
}
