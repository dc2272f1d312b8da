#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use blerequest::{
    BluetoothUuid, Characteristic, ConnectionParameters, ConnectionPriority, Data, Device,
    Dispatcher, Execution, NotificationMode, Status, Value, WriteType,
};

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn battery_level() -> Characteristic {
    Characteristic::new(
        BluetoothUuid::from_u16(0x180F),
        BluetoothUuid::from_u16(0x2A19),
        0,
    )
}

pub fn heart_rate() -> Characteristic {
    Characteristic::new(
        BluetoothUuid::from_u16(0x180D),
        BluetoothUuid::from_u16(0x2A37),
        0,
    )
}

/// What [`ScriptedDispatcher`] does with the next submission.
pub enum Script {
    Succeed { after: Duration, value: Option<Value> },
    Fail { after: Duration, status: Status },
    Invalid,
    Hold,
    Drop,
}

impl Script {
    pub fn data(after_ms: u64, bytes: &[u8]) -> Self {
        Script::Succeed {
            after: Duration::from_millis(after_ms),
            value: Some(Value::Data(Data::new(bytes))),
        }
    }

    pub fn fail(status: Status) -> Self {
        Script::Fail {
            after: Duration::ZERO,
            status,
        }
    }
}

/// A dispatcher whose behavior is scripted per submission. Executions without a script are held
/// until [`release_held()`][Self::release_held] is called.
#[derive(Default)]
pub struct ScriptedDispatcher {
    scripts: Mutex<VecDeque<Script>>,
    held: Mutex<Vec<Execution>>,
    submissions: AtomicUsize,
    confined: bool,
}

impl ScriptedDispatcher {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Default::default()
        })
    }

    /// A dispatcher that claims every thread is its dispatch thread.
    pub fn confined() -> Arc<Self> {
        Arc::new(Self {
            confined: true,
            ..Default::default()
        })
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn held(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Completes every held execution with `value` and success.
    pub fn release_held(&self, value: Option<Value>) {
        let held = std::mem::take(&mut *self.held.lock().unwrap());
        for execution in held {
            if let Some(value) = &value {
                execution.notify_value(value);
            }
            execution.notify_success();
        }
    }
}

impl Dispatcher for ScriptedDispatcher {
    fn submit(&self, execution: Execution) {
        assert!(!self.confined, "confined dispatcher must not receive submissions");
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Hold);
        match script {
            Script::Succeed { after, value } => {
                thread::spawn(move || {
                    thread::sleep(after);
                    if let Some(value) = value {
                        execution.notify_value(&value);
                    }
                    execution.notify_success();
                });
            }
            Script::Fail { after, status } => {
                thread::spawn(move || {
                    thread::sleep(after);
                    execution.notify_failure(status);
                });
            }
            Script::Invalid => execution.notify_invalid(),
            Script::Hold => self.held.lock().unwrap().push(execution),
            Script::Drop => drop(execution),
        }
    }

    fn is_dispatch_thread(&self) -> bool {
        self.confined
    }
}

/// An in-memory peripheral with a small attribute table.
#[derive(Default)]
pub struct FakeDevice {
    pub connected: bool,
    pub values: HashMap<u16, Vec<u8>>,
    pub notifying: HashMap<u16, NotificationMode>,
    pub log: Arc<Mutex<Vec<String>>>,
    pub mtu_limit: u16,
    pub read_delay: Duration,
}

fn short_uuid(characteristic: &Characteristic) -> u16 {
    match characteristic.uuid() {
        BluetoothUuid::Uuid16(uuid) => uuid.to_u16(),
        _ => 0,
    }
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            mtu_limit: 247,
            ..Default::default()
        }
    }

    fn ensure_connected(&self) -> Result<(), Status> {
        if self.connected {
            Ok(())
        } else {
            Err(Status::DEVICE_DISCONNECTED)
        }
    }

    fn record(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }
}

impl Device for FakeDevice {
    fn connect(&mut self) -> Result<(), Status> {
        self.record("connect");
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Status> {
        self.record("disconnect");
        self.connected = false;
        Ok(())
    }

    fn read(&mut self, characteristic: &Characteristic) -> Result<Data, Status> {
        self.ensure_connected()?;
        thread::sleep(self.read_delay);
        let uuid = short_uuid(characteristic);
        self.record(format!("read {uuid:04X}"));
        self.values
            .get(&uuid)
            .map(|value| Data::new(value.clone()))
            .ok_or(Status::GATT_READ_NOT_PERMITTED)
    }

    fn write(
        &mut self,
        characteristic: &Characteristic,
        value: &[u8],
        _write_type: WriteType,
    ) -> Result<(), Status> {
        self.ensure_connected()?;
        let uuid = short_uuid(characteristic);
        self.record(format!("write {uuid:04X}"));
        self.values.insert(uuid, value.to_vec());
        Ok(())
    }

    fn set_notifications(
        &mut self,
        characteristic: &Characteristic,
        mode: NotificationMode,
    ) -> Result<(), Status> {
        self.ensure_connected()?;
        let uuid = short_uuid(characteristic);
        self.record(format!("notify {uuid:04X} {mode:?}"));
        self.notifying.insert(uuid, mode);
        Ok(())
    }

    fn request_mtu(&mut self, mtu: u16) -> Result<u16, Status> {
        self.ensure_connected()?;
        Ok(mtu.min(self.mtu_limit))
    }

    fn request_connection_priority(
        &mut self,
        priority: ConnectionPriority,
    ) -> Result<ConnectionParameters, Status> {
        self.ensure_connected()?;
        let interval = match priority {
            ConnectionPriority::High => 6,
            ConnectionPriority::Balanced => 36,
            ConnectionPriority::LowPower => 80,
        };
        Ok(ConnectionParameters {
            interval,
            latency: 0,
            supervision_timeout: 500,
        })
    }
}
