use std::fmt;

use anyhow::Context;
use rppal::i2c::I2c;

use crate::sensor::{AlgorithmResult, Channels, FirmwareInfo, GasSensor, Status, Version};

pub const DEFAULT_ADDRESS: u16 = 0x5a;
pub const HARDWARE_ID: u8 = 0x81;

pub const REG_STATUS: u8 = 0x00;
pub const REG_MEAS_MODE: u8 = 0x01;
pub const REG_ALG_RESULT_DATA: u8 = 0x02;
pub const REG_HW_ID: u8 = 0x20;
pub const REG_HW_VERSION: u8 = 0x21;
pub const REG_FW_BOOT_VERSION: u8 = 0x23;
pub const REG_FW_APP_VERSION: u8 = 0x24;
pub const REG_ERROR_ID: u8 = 0xe0;
pub const REG_APP_START: u8 = 0xf4;
pub const REG_SW_RESET: u8 = 0xff;

/// Key that must follow SW_RESET for the reset to take effect.
pub const RESET_SEQUENCE: [u8; 4] = [0x11, 0xe5, 0x72, 0x8a];

const ERROR_ID_FLAGS: [(u8, &str); 6] = [
    (0x01, "WRITE_REG_INVALID"),
    (0x02, "READ_REG_INVALID"),
    (0x04, "MEASMODE_INVALID"),
    (0x08, "MAX_RESISTANCE"),
    (0x10, "HEATER_FAULT"),
    (0x20, "HEATER_SUPPLY"),
];

/// Drive modes of the MEAS_MODE register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementMode {
    Idle = 0,
    ConstantPower1s = 1,
    Pulse10s = 2,
    LowPower60s = 3,
    ConstantPower250ms = 4,
}

impl MeasurementMode {
    pub fn register_value(self) -> u8 {
        (self as u8) << 4
    }
}

/// Byte-level access to a device register map.
pub trait RegisterBus {
    fn set_address(&mut self, address: u16) -> Result<(), anyhow::Error>;

    fn write(&mut self, bytes: &[u8]) -> Result<(), anyhow::Error>;

    fn write_read(&mut self, bytes: &[u8], buffer: &mut [u8]) -> Result<(), anyhow::Error>;
}

impl RegisterBus for I2c {
    fn set_address(&mut self, address: u16) -> Result<(), anyhow::Error> {
        self.set_slave_address(address)
            .context("Failed to set I2C slave address")
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), anyhow::Error> {
        let written = I2c::write(self, bytes).context("Failed to write to I2C")?;
        if written != bytes.len() {
            return Err(anyhow::anyhow!(
                "Short I2C write: {} of {} bytes",
                written,
                bytes.len()
            ));
        }
        Ok(())
    }

    fn write_read(&mut self, bytes: &[u8], buffer: &mut [u8]) -> Result<(), anyhow::Error> {
        I2c::write_read(self, bytes, buffer).context("Failed to read from I2C")
    }
}

#[derive(Debug)]
pub struct Ccs811<B> {
    bus: B,
    mode: MeasurementMode,
}

impl<B: RegisterBus> Ccs811<B> {
    pub fn new(mut bus: B, address: u16, mode: MeasurementMode) -> Result<Ccs811<B>, anyhow::Error> {
        bus.set_address(address)
            .with_context(|| format!("Failed to address CCS811 at {address:#04x}"))?;

        Ok(Ccs811 { bus, mode })
    }

    fn read_register<const N: usize>(&mut self, register: u8) -> Result<[u8; N], anyhow::Error> {
        let mut buffer = [0u8; N];
        self.bus
            .write_read(&[register], &mut buffer)
            .with_context(|| format!("Failed to read register {register:#04x}"))?;
        Ok(buffer)
    }
}

impl<B: RegisterBus> GasSensor for Ccs811<B> {
    fn reset(&mut self) -> Result<(), anyhow::Error> {
        let mut command = [REG_SW_RESET; 5];
        command[1..].copy_from_slice(&RESET_SEQUENCE);
        self.bus.write(&command).context("Failed to send SW_RESET")
    }

    fn firmware_info(&mut self) -> Result<FirmwareInfo, anyhow::Error> {
        let [hardware_id] = self.read_register::<1>(REG_HW_ID)?;
        let [hardware_version] = self.read_register::<1>(REG_HW_VERSION)?;
        let boot_version = self.read_register::<2>(REG_FW_BOOT_VERSION)?;
        let app_version = self.read_register::<2>(REG_FW_APP_VERSION)?;

        Ok(FirmwareInfo {
            hardware_id,
            hardware_version,
            boot_version: Version::from_bytes(boot_version),
            app_version: Version::from_bytes(app_version),
        })
    }

    fn start_application(&mut self) -> Result<(), anyhow::Error> {
        self.bus
            .write(&[REG_APP_START])
            .context("Failed to send APP_START")
    }

    fn configure(&mut self) -> Result<(), anyhow::Error> {
        self.bus
            .write(&[REG_MEAS_MODE, self.mode.register_value()])
            .with_context(|| format!("Failed to set measurement mode {:?}", self.mode))
    }

    fn status(&mut self) -> Result<Status, anyhow::Error> {
        let [status] = self.read_register::<1>(REG_STATUS)?;
        Ok(Status(status))
    }

    fn error_id(&mut self) -> Result<u8, anyhow::Error> {
        let [error_id] = self.read_register::<1>(REG_ERROR_ID)?;
        Ok(error_id)
    }

    fn measure(&mut self, channels: Channels) -> Result<AlgorithmResult, anyhow::Error> {
        let mut buffer = [0u8; 6];
        let data = &mut buffer[..channels.byte_len()];
        self.bus
            .write_read(&[REG_ALG_RESULT_DATA], data)
            .context("Failed to read algorithm result data")?;

        Ok(decode_algorithm_result(data))
    }
}

/// Decodes the big-endian ALG_RESULT_DATA block. `data` holds at least the
/// two 16-bit readings; the status and error bytes are optional.
pub fn decode_algorithm_result(data: &[u8]) -> AlgorithmResult {
    AlgorithmResult {
        co2_ppm: u16::from_be_bytes([data[0], data[1]]),
        voc_ppm: u16::from_be_bytes([data[2], data[3]]),
        status: data.get(4).map(|&b| Status(b)),
        error_id: data.get(5).copied(),
    }
}

/// Contents of the ERROR_ID register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorFlags(pub u8);

impl ErrorFlags {
    pub fn names(self) -> Vec<&'static str> {
        ERROR_ID_FLAGS
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|&(_, name)| name)
            .collect()
    }
}

impl fmt::Display for ErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010b} ({})", self.0, self.names().join(", "))
    }
}
