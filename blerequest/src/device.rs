use crate::data::{ConnectionParameters, ConnectionPriority, Data, NotificationMode, WriteType};
use crate::status::Status;
use crate::target::{Characteristic, Descriptor};

/// The platform operations a dispatcher performs on a connected peripheral.
///
/// Each method runs on the dispatch thread and returns once the peripheral answered. Operations a
/// platform cannot perform keep the default implementation, which fails with
/// [`Status::DEVICE_NOT_SUPPORTED`].
pub trait Device: Send {
    fn connect(&mut self) -> Result<(), Status>;

    fn disconnect(&mut self) -> Result<(), Status>;

    fn read(&mut self, characteristic: &Characteristic) -> Result<Data, Status>;

    fn write(
        &mut self,
        characteristic: &Characteristic,
        value: &[u8],
        write_type: WriteType,
    ) -> Result<(), Status>;

    fn read_descriptor(&mut self, _descriptor: &Descriptor) -> Result<Data, Status> {
        Err(Status::DEVICE_NOT_SUPPORTED)
    }

    fn write_descriptor(&mut self, _descriptor: &Descriptor, _value: &[u8]) -> Result<(), Status> {
        Err(Status::DEVICE_NOT_SUPPORTED)
    }

    fn set_notifications(
        &mut self,
        _characteristic: &Characteristic,
        _mode: NotificationMode,
    ) -> Result<(), Status> {
        Err(Status::DEVICE_NOT_SUPPORTED)
    }

    /// Requests `mtu` and returns the MTU the peripheral agreed to.
    fn request_mtu(&mut self, _mtu: u16) -> Result<u16, Status> {
        Err(Status::DEVICE_NOT_SUPPORTED)
    }

    fn request_connection_priority(
        &mut self,
        _priority: ConnectionPriority,
    ) -> Result<ConnectionParameters, Status> {
        Err(Status::DEVICE_NOT_SUPPORTED)
    }

    fn read_rssi(&mut self) -> Result<i16, Status> {
        Err(Status::DEVICE_NOT_SUPPORTED)
    }

    fn create_bond(&mut self) -> Result<(), Status> {
        Err(Status::DEVICE_NOT_SUPPORTED)
    }

    fn remove_bond(&mut self) -> Result<(), Status> {
        Err(Status::DEVICE_NOT_SUPPORTED)
    }

    /// Clears the platform's cache of discovered services.
    fn refresh_cache(&mut self) -> Result<(), Status> {
        Err(Status::DEVICE_NOT_SUPPORTED)
    }
}
