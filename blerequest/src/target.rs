use btuuid::BluetoothUuid;

/// A characteristic of a remote GATT service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    service: BluetoothUuid,
    uuid: BluetoothUuid,
    instance_id: u32,
}

impl Characteristic {
    pub fn new(service: BluetoothUuid, uuid: BluetoothUuid, instance_id: u32) -> Self {
        Self {
            service,
            uuid,
            instance_id,
        }
    }

    pub fn uuid(&self) -> &BluetoothUuid {
        &self.uuid
    }

    pub fn service(&self) -> &BluetoothUuid {
        &self.service
    }

    /// Distinguishes characteristics sharing a UUID within one service.
    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }
}

/// A descriptor of a remote characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    characteristic: Characteristic,
    uuid: BluetoothUuid,
}

impl Descriptor {
    pub fn new(characteristic: Characteristic, uuid: BluetoothUuid) -> Self {
        Self {
            characteristic,
            uuid,
        }
    }

    pub fn uuid(&self) -> &BluetoothUuid {
        &self.uuid
    }

    pub fn characteristic(&self) -> &Characteristic {
        &self.characteristic
    }
}

/// The attribute addressed by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Characteristic(Characteristic),
    Descriptor(Descriptor),
}

impl Target {
    pub fn as_characteristic(&self) -> Option<&Characteristic> {
        match self {
            Target::Characteristic(characteristic) => Some(characteristic),
            Target::Descriptor(_) => None,
        }
    }

    pub fn as_descriptor(&self) -> Option<&Descriptor> {
        match self {
            Target::Characteristic(_) => None,
            Target::Descriptor(descriptor) => Some(descriptor),
        }
    }
}

impl From<Characteristic> for Target {
    fn from(characteristic: Characteristic) -> Self {
        Target::Characteristic(characteristic)
    }
}

impl From<Descriptor> for Target {
    fn from(descriptor: Descriptor) -> Self {
        Target::Descriptor(descriptor)
    }
}
