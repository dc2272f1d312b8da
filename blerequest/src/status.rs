use std::fmt::Display;

/// An opaque status code reported by the platform for a completed operation.
///
/// Two values are reserved and recognized by this crate:
/// [`DEVICE_DISCONNECTED`][Status::DEVICE_DISCONNECTED] and
/// [`BLUETOOTH_DISABLED`][Status::BLUETOOTH_DISABLED]. Every other non-success value is passed
/// through unchanged as a generic operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const SUCCESS: Status = Status(0);

    pub const GATT_READ_NOT_PERMITTED: Status = Status(2);
    pub const GATT_WRITE_NOT_PERMITTED: Status = Status(3);
    pub const GATT_INSUFFICIENT_AUTHENTICATION: Status = Status(5);
    pub const GATT_REQUEST_NOT_SUPPORTED: Status = Status(6);
    pub const GATT_INVALID_OFFSET: Status = Status(7);
    pub const GATT_INVALID_ATTRIBUTE_LENGTH: Status = Status(13);
    pub const GATT_INSUFFICIENT_ENCRYPTION: Status = Status(15);
    pub const GATT_ERROR: Status = Status(133);
    pub const GATT_FAILURE: Status = Status(257);

    /// The device disconnected before the request completed.
    pub const DEVICE_DISCONNECTED: Status = Status(-1);
    /// The device does not have the required service or characteristic.
    pub const DEVICE_NOT_SUPPORTED: Status = Status(-2);
    /// The addressed attribute was missing.
    pub const NULL_ATTRIBUTE: Status = Status(-3);
    pub const REQUEST_FAILED: Status = Status(-4);
    pub const TIMEOUT: Status = Status(-5);
    pub const VALIDATION: Status = Status(-6);
    /// The request was removed from the queue before it ran.
    pub const CANCELLED: Status = Status(-7);
    /// The Bluetooth adapter is turned off.
    pub const BLUETOOTH_DISABLED: Status = Status(-100);

    pub fn is_success(self) -> bool {
        self == Status::SUCCESS
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.0
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Status::SUCCESS => f.write_str("success"),
            Status::GATT_READ_NOT_PERMITTED => f.write_str("read not permitted"),
            Status::GATT_WRITE_NOT_PERMITTED => f.write_str("write not permitted"),
            Status::GATT_INSUFFICIENT_AUTHENTICATION => f.write_str("insufficient authentication"),
            Status::GATT_REQUEST_NOT_SUPPORTED => f.write_str("request not supported"),
            Status::GATT_INVALID_OFFSET => f.write_str("invalid offset"),
            Status::GATT_INVALID_ATTRIBUTE_LENGTH => f.write_str("invalid attribute value length"),
            Status::GATT_INSUFFICIENT_ENCRYPTION => f.write_str("insufficient encryption"),
            Status::GATT_ERROR => f.write_str("GATT error"),
            Status::GATT_FAILURE => f.write_str("GATT failure"),
            Status::DEVICE_DISCONNECTED => f.write_str("device disconnected"),
            Status::DEVICE_NOT_SUPPORTED => f.write_str("device not supported"),
            Status::NULL_ATTRIBUTE => f.write_str("null attribute"),
            Status::REQUEST_FAILED => f.write_str("request failed"),
            Status::TIMEOUT => f.write_str("timeout"),
            Status::VALIDATION => f.write_str("validation failed"),
            Status::CANCELLED => f.write_str("cancelled"),
            Status::BLUETOOTH_DISABLED => f.write_str("bluetooth disabled"),
            Status(code) => write!(f, "unknown status ({code})"),
        }
    }
}
