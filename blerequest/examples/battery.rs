use std::error::Error;
use std::time::Duration;

use blerequest::{
    BluetoothUuid, Characteristic, Data, Device, QueueConfig, Request, RequestQueue, Response,
    Status, WriteType,
};
use tracing::info;
use tracing::metadata::LevelFilter;

/// A peripheral with a battery that drains by one percent per read.
struct Simulated {
    connected: bool,
    level: u8,
}

impl Device for Simulated {
    fn connect(&mut self) -> Result<(), Status> {
        std::thread::sleep(Duration::from_millis(100));
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Status> {
        self.connected = false;
        Ok(())
    }

    fn read(&mut self, _characteristic: &Characteristic) -> Result<Data, Status> {
        if !self.connected {
            return Err(Status::DEVICE_DISCONNECTED);
        }
        self.level = self.level.saturating_sub(1);
        Ok(Data::new(vec![self.level]))
    }

    fn write(
        &mut self,
        _characteristic: &Characteristic,
        _value: &[u8],
        _write_type: WriteType,
    ) -> Result<(), Status> {
        Err(Status::GATT_WRITE_NOT_PERMITTED)
    }

    fn request_mtu(&mut self, mtu: u16) -> Result<u16, Status> {
        Ok(mtu.min(185))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let battery_level = Characteristic::new(
        BluetoothUuid::from_u16(0x180F),
        BluetoothUuid::from_u16(0x2A19),
        0,
    );
    let queue = RequestQueue::new(
        Simulated {
            connected: false,
            level: 100,
        },
        QueueConfig::new("battery"),
    )?;

    Request::connect()
        .done(|| info!("connected"))
        .fail(|status| info!(%status, "connection failed"))
        .attach(queue.dispatcher())
        .enqueue()?;

    let mtu: Response<u16> = Request::request_mtu(517)
        .attach(queue.dispatcher())
        .wait_timeout(Duration::from_secs(1))?;
    info!(mtu = ?mtu.value(), "negotiated");

    let read = Request::read(battery_level.clone())
        .with(|data: &Data| info!("battery at {}% (notified)", data.u8_at(0).unwrap_or(0)))
        .attach(queue.dispatcher());
    for _ in 0..3 {
        let level: Data = read.wait_timeout(Duration::from_secs(1))?;
        info!("battery at {}%", level.u8_at(0).unwrap_or(0));
    }
    read.enqueue()?;

    let error = Request::write(battery_level, vec![0], WriteType::WithResponse)
        .attach(queue.dispatcher())
        .wait::<Data>()
        .unwrap_err();
    info!(%error, "write rejected");

    let (sender, receiver) = std::sync::mpsc::channel();
    Request::disconnect()
        .then(move || {
            let _ = sender.send(());
        })
        .attach(queue.dispatcher())
        .enqueue()?;
    receiver.recv_timeout(Duration::from_secs(1))?;
    info!("disconnected");
    Ok(())
}
