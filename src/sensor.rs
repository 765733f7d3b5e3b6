use std::fmt;

pub const STATUS_ERROR: u8 = 0b0000_0001;
pub const STATUS_DATA_READY: u8 = 0b0000_1000;
pub const STATUS_APP_VALID: u8 = 0b0001_0000;
pub const STATUS_FW_MODE: u8 = 0b1000_0000;

/// Raw STATUS register of the sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status(pub u8);

impl Status {
    pub fn error(self) -> bool {
        self.0 & STATUS_ERROR != 0
    }

    pub fn data_ready(self) -> bool {
        self.0 & STATUS_DATA_READY != 0
    }

    pub fn app_valid(self) -> bool {
        self.0 & STATUS_APP_VALID != 0
    }

    /// Set once the sensor left boot mode and runs its application.
    pub fn firmware_mode(self) -> bool {
        self.0 & STATUS_FW_MODE != 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010b}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub trivial: u8,
}

impl Version {
    pub fn from_bytes(bytes: [u8; 2]) -> Version {
        Version {
            major: bytes[0] >> 4,
            minor: bytes[0] & 0x0f,
            trivial: bytes[1],
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.trivial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub hardware_id: u8,
    pub hardware_version: u8,
    pub boot_version: Version,
    pub app_version: Version,
}

/// Which part of the algorithm result block to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Co2Voc,
    Co2VocStatusError,
}

impl Channels {
    pub fn byte_len(self) -> usize {
        match self {
            Channels::Co2Voc => 4,
            Channels::Co2VocStatusError => 6,
        }
    }
}

/// Decoded algorithm result. `status` and `error_id` are `None` unless
/// the requested channels cover them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlgorithmResult {
    pub co2_ppm: u16,
    pub voc_ppm: u16,
    pub status: Option<Status>,
    pub error_id: Option<u8>,
}

/// Operations the poller needs from a gas sensor.
pub trait GasSensor {
    /// Software reset; the sensor comes back in boot mode.
    fn reset(&mut self) -> Result<(), anyhow::Error>;

    fn firmware_info(&mut self) -> Result<FirmwareInfo, anyhow::Error>;

    fn start_application(&mut self) -> Result<(), anyhow::Error>;

    /// Applies the measurement mode the device was constructed with.
    fn configure(&mut self) -> Result<(), anyhow::Error>;

    fn status(&mut self) -> Result<Status, anyhow::Error>;

    fn error_id(&mut self) -> Result<u8, anyhow::Error>;

    fn measure(&mut self, channels: Channels) -> Result<AlgorithmResult, anyhow::Error>;
}
