//! Values carried by requests.

use std::fmt::Display;

use crate::callback::ValueCallback;

/// Bytes read from or written to an attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Data {
    value: Option<Vec<u8>>,
}

impl Data {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            value: Some(bytes.into()),
        }
    }

    /// The received bytes, or `None` if nothing was delivered yet.
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn into_inner(self) -> Option<Vec<u8>> {
        self.value
    }

    pub fn len(&self) -> usize {
        self.value.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn u8_at(&self, offset: usize) -> Option<u8> {
        self.bytes_at::<1>(offset).map(u8::from_le_bytes)
    }

    pub fn i8_at(&self, offset: usize) -> Option<i8> {
        self.bytes_at::<1>(offset).map(i8::from_le_bytes)
    }

    pub fn u16_at(&self, offset: usize) -> Option<u16> {
        self.bytes_at::<2>(offset).map(u16::from_le_bytes)
    }

    pub fn i16_at(&self, offset: usize) -> Option<i16> {
        self.bytes_at::<2>(offset).map(i16::from_le_bytes)
    }

    pub fn u32_at(&self, offset: usize) -> Option<u32> {
        self.bytes_at::<4>(offset).map(u32::from_le_bytes)
    }

    pub fn i32_at(&self, offset: usize) -> Option<i32> {
        self.bytes_at::<4>(offset).map(i32::from_le_bytes)
    }

    /// Decodes the bytes from `offset` to the end as UTF-8, replacing invalid sequences.
    pub fn string(&self, offset: usize) -> Option<String> {
        let bytes = self.value.as_deref()?.get(offset..)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    fn bytes_at<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        let bytes = self.value.as_deref()?.get(offset..offset.checked_add(N)?)?;
        bytes.try_into().ok()
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Data::new(bytes)
    }
}

impl From<&[u8]> for Data {
    fn from(bytes: &[u8]) -> Self {
        Data::new(bytes)
    }
}

impl Display for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            None => f.write_str("(null)"),
            Some(bytes) if bytes.is_empty() => f.write_str("()"),
            Some(bytes) => {
                f.write_str("(0x)")?;
                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str("-")?;
                    }
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
        }
    }
}

impl ValueCallback<Data> for Data {
    fn on_value(&mut self, value: &Data) {
        self.value.clone_from(&value.value);
    }
}

/// A generic response container that keeps the last value delivered to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<V> {
    value: Option<V>,
}

impl<V> Default for Response<V> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<V> Response<V> {
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn into_inner(self) -> Option<V> {
        self.value
    }
}

impl<V: Clone + Send> ValueCallback<V> for Response<V> {
    fn on_value(&mut self, value: &V) {
        self.value = Some(value.clone());
    }
}

/// How a characteristic value is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WriteType {
    #[default]
    WithResponse,
    WithoutResponse,
    Signed,
}

/// Connection interval presets a central may request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionPriority {
    #[default]
    Balanced,
    High,
    LowPower,
}

/// Connection parameters negotiated after a connection priority change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConnectionParameters {
    /// Connection interval in units of 1.25 ms.
    pub interval: u16,
    pub latency: u16,
    /// Supervision timeout in units of 10 ms.
    pub supervision_timeout: u16,
}

/// Whether a characteristic sends notifications, indications, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationMode {
    Disabled,
    Notify,
    Indicate,
}

/// A value produced by a completed operation, before it is handed to a typed callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    None,
    Data(Data),
    Mtu(u16),
    ConnectionParameters(ConnectionParameters),
    Rssi(i16),
}

impl From<Data> for Value {
    fn from(data: Data) -> Self {
        Value::Data(data)
    }
}

impl From<ConnectionParameters> for Value {
    fn from(parameters: ConnectionParameters) -> Self {
        Value::ConnectionParameters(parameters)
    }
}

/// Types that a [`ValueRequest`][crate::ValueRequest] can deliver to its value callback.
pub trait RequestValue: Send + 'static {
    /// Borrows `Self` out of `value`, or returns `None` if `value` holds a different variant.
    fn extract(value: &Value) -> Option<&Self>;
}

impl RequestValue for () {
    fn extract(value: &Value) -> Option<&Self> {
        match value {
            Value::None => Some(&()),
            _ => None,
        }
    }
}

impl RequestValue for Data {
    fn extract(value: &Value) -> Option<&Self> {
        match value {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }
}

/// The negotiated MTU.
impl RequestValue for u16 {
    fn extract(value: &Value) -> Option<&Self> {
        match value {
            Value::Mtu(mtu) => Some(mtu),
            _ => None,
        }
    }
}

/// The RSSI in dBm.
impl RequestValue for i16 {
    fn extract(value: &Value) -> Option<&Self> {
        match value {
            Value::Rssi(rssi) => Some(rssi),
            _ => None,
        }
    }
}

impl RequestValue for ConnectionParameters {
    fn extract(value: &Value) -> Option<&Self> {
        match value {
            Value::ConnectionParameters(parameters) => Some(parameters),
            _ => None,
        }
    }
}
