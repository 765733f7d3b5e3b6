//! Scripted stand-ins for the bus, the sensor and the clock.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use crate::ccs811::{HARDWARE_ID, RegisterBus};
use crate::poller::Sleeper;
use crate::sensor::{AlgorithmResult, Channels, FirmwareInfo, GasSensor, Status, Version};

#[derive(Debug, Default)]
pub struct FakeBus {
    pub address: Option<u16>,
    pub registers: HashMap<u8, Vec<u8>>,
    pub writes: Vec<Vec<u8>>,
    fail: bool,
}

impl FakeBus {
    pub fn with_register(mut self, register: u8, bytes: &[u8]) -> Self {
        self.registers.insert(register, bytes.to_vec());
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl RegisterBus for FakeBus {
    fn set_address(&mut self, address: u16) -> Result<(), anyhow::Error> {
        self.address = Some(address);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), anyhow::Error> {
        if self.fail {
            return Err(anyhow::anyhow!("bus unavailable"));
        }
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    fn write_read(&mut self, bytes: &[u8], buffer: &mut [u8]) -> Result<(), anyhow::Error> {
        if self.fail {
            return Err(anyhow::anyhow!("bus unavailable"));
        }
        let data = self.registers.get(&bytes[0]).map(Vec::as_slice).unwrap_or(&[]);
        for (slot, byte) in buffer.iter_mut().zip(data) {
            *slot = *byte;
        }
        Ok(())
    }
}

pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

pub struct FakeSensor {
    firmware: FirmwareInfo,
    startup_gate: Option<mpsc::Receiver<()>>,
    error_id: u8,
    statuses: VecDeque<Result<Status, anyhow::Error>>,
    measurements: VecDeque<Result<AlgorithmResult, anyhow::Error>>,
    hold: Option<mpsc::Receiver<()>>,
    calls: CallLog,
}

impl FakeSensor {
    /// A sensor that passes every startup check.
    pub fn booted() -> Self {
        FakeSensor {
            firmware: FirmwareInfo {
                hardware_id: HARDWARE_ID,
                hardware_version: 0x12,
                boot_version: Version::from_bytes([0x10, 0x00]),
                app_version: Version::from_bytes([0x20, 0x00]),
            },
            startup_gate: None,
            error_id: 0,
            statuses: VecDeque::from([Ok(Status(0x10)), Ok(Status(0x90))]),
            measurements: VecDeque::new(),
            hold: None,
            calls: CallLog::default(),
        }
    }

    pub fn with_hardware_id(mut self, hardware_id: u8) -> Self {
        self.firmware.hardware_id = hardware_id;
        self
    }

    pub fn with_error_id(mut self, error_id: u8) -> Self {
        self.error_id = error_id;
        self
    }

    /// Replaces the startup status reads (before and after APP_START).
    pub fn with_boot_statuses(mut self, before: u8, after: u8) -> Self {
        self.statuses = VecDeque::from([Ok(Status(before)), Ok(Status(after))]);
        self
    }

    pub fn then_status(mut self, status: u8) -> Self {
        self.statuses.push_back(Ok(Status(status)));
        self
    }

    pub fn then_status_error(mut self, message: &'static str) -> Self {
        self.statuses.push_back(Err(anyhow::anyhow!(message)));
        self
    }

    pub fn then_measurement(self, co2_ppm: u16, voc_ppm: u16) -> Self {
        self.then_measurement_with_status(co2_ppm, voc_ppm, 0x98)
    }

    /// Queues a measurement whose embedded STATUS byte is `status`.
    pub fn then_measurement_with_status(mut self, co2_ppm: u16, voc_ppm: u16, status: u8) -> Self {
        self.measurements.push_back(Ok(AlgorithmResult {
            co2_ppm,
            voc_ppm,
            status: Some(Status(status)),
            error_id: Some(0),
        }));
        self
    }

    pub fn then_measurement_error(mut self, message: &'static str) -> Self {
        self.measurements.push_back(Err(anyhow::anyhow!(message)));
        self
    }

    /// Blocks `firmware_info` until `gate` yields or disconnects.
    pub fn gate_startup(mut self, gate: mpsc::Receiver<()>) -> Self {
        self.startup_gate = Some(gate);
        self
    }

    /// Once the status script runs out, blocks until `hold` yields or
    /// disconnects, then fails.
    pub fn hold_when_exhausted(mut self, hold: mpsc::Receiver<()>) -> Self {
        self.hold = Some(hold);
        self
    }

    pub fn calls(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl GasSensor for FakeSensor {
    fn reset(&mut self) -> Result<(), anyhow::Error> {
        self.record("reset");
        Ok(())
    }

    fn firmware_info(&mut self) -> Result<FirmwareInfo, anyhow::Error> {
        if let Some(gate) = self.startup_gate.take() {
            let _ = gate.recv();
        }
        self.record("firmware_info");
        Ok(self.firmware)
    }

    fn start_application(&mut self) -> Result<(), anyhow::Error> {
        self.record("start_application");
        Ok(())
    }

    fn configure(&mut self) -> Result<(), anyhow::Error> {
        self.record("configure");
        Ok(())
    }

    fn status(&mut self) -> Result<Status, anyhow::Error> {
        self.record("status");
        if let Some(status) = self.statuses.pop_front() {
            return status;
        }
        if let Some(hold) = self.hold.take() {
            let _ = hold.recv();
        }
        Err(anyhow::anyhow!("sensor disconnected"))
    }

    fn error_id(&mut self) -> Result<u8, anyhow::Error> {
        self.record("error_id");
        Ok(self.error_id)
    }

    fn measure(&mut self, _channels: Channels) -> Result<AlgorithmResult, anyhow::Error> {
        self.record("measure");
        self.measurements
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("measurement script exhausted")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
