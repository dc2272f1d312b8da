//! Error types for this crate.

use std::fmt::Display;

use blerequest::Status;
use futures_channel::oneshot;

/// A convenience type alias for a `Result` with an `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in this crate.
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
    /// The request was used in a way its contract forbids.
    InvalidUsage,
    /// The response container could not be constructed.
    InstantiationFailed,
    /// No outcome arrived before the deadline.
    Timeout,
    /// The outcome will never arrive.
    Canceled,
}

#[derive(Debug, Clone)]
enum ErrorData {
    Request(blerequest::Error),
    Simple(ErrorKind),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            ErrorData::Request(error) => error.fmt(f),
            ErrorData::Simple(kind) => kind.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl From<blerequest::Error> for Error {
    fn from(error: blerequest::Error) -> Self {
        Error {
            data: ErrorData::Request(error),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            data: ErrorData::Simple(kind),
        }
    }
}

impl From<oneshot::Canceled> for Error {
    fn from(_value: oneshot::Canceled) -> Self {
        ErrorKind::Canceled.into()
    }
}

impl Error {
    /// If this error was reported by `blerequest`, returns a reference to it.
    pub fn get_ref(&self) -> Option<&blerequest::Error> {
        match &self.data {
            ErrorData::Request(error) => Some(error),
            ErrorData::Simple(_) => None,
        }
    }

    /// If this error was reported by `blerequest`, returns it.
    pub fn into_inner(self) -> Option<blerequest::Error> {
        match self.data {
            ErrorData::Request(error) => Some(error),
            ErrorData::Simple(_) => None,
        }
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> ErrorKind {
        match &self.data {
            ErrorData::Request(error) => error.kind().into(),
            ErrorData::Simple(kind) => *kind,
        }
    }

    /// The failure status, for errors that carry one.
    pub fn status(&self) -> Option<Status> {
        match self.kind() {
            ErrorKind::OperationFailed(status) => Some(status),
            ErrorKind::DeviceDisconnected => Some(Status::DEVICE_DISCONNECTED),
            ErrorKind::TransportDisabled => Some(Status::BLUETOOTH_DISABLED),
            _ => None,
        }
    }
}

impl From<blerequest::ErrorKind> for ErrorKind {
    fn from(kind: blerequest::ErrorKind) -> Self {
        match kind {
            blerequest::ErrorKind::OperationFailed(status) => ErrorKind::OperationFailed(status),
            blerequest::ErrorKind::DeviceDisconnected => ErrorKind::DeviceDisconnected,
            blerequest::ErrorKind::TransportDisabled => ErrorKind::TransportDisabled,
            blerequest::ErrorKind::InvalidRequest => ErrorKind::InvalidRequest,
            blerequest::ErrorKind::InvalidUsage => ErrorKind::InvalidUsage,
            blerequest::ErrorKind::InstantiationFailed => ErrorKind::InstantiationFailed,
            blerequest::ErrorKind::Timeout => ErrorKind::Timeout,
        }
    }
}

impl TryFrom<ErrorKind> for blerequest::ErrorKind {
    type Error = ErrorKind;

    fn try_from(kind: ErrorKind) -> std::result::Result<Self, Self::Error> {
        match kind {
            ErrorKind::OperationFailed(status) => Ok(blerequest::ErrorKind::OperationFailed(status)),
            ErrorKind::DeviceDisconnected => Ok(blerequest::ErrorKind::DeviceDisconnected),
            ErrorKind::TransportDisabled => Ok(blerequest::ErrorKind::TransportDisabled),
            ErrorKind::InvalidRequest => Ok(blerequest::ErrorKind::InvalidRequest),
            ErrorKind::InvalidUsage => Ok(blerequest::ErrorKind::InvalidUsage),
            ErrorKind::InstantiationFailed => Ok(blerequest::ErrorKind::InstantiationFailed),
            ErrorKind::Timeout => Ok(blerequest::ErrorKind::Timeout),
            ErrorKind::Canceled => Err(kind),
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Canceled => f.write_str("canceled"),
            kind => match blerequest::ErrorKind::try_from(*kind) {
                Ok(kind) => kind.fmt(f),
                Err(_) => f.write_str("unknown"),
            },
        }
    }
}
