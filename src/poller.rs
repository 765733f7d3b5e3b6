use std::convert::Infallible;
use std::time::Duration;

use anyhow::Context;
use backon::{BlockingRetryable, ConstantBuilder};
use chrono::Local;
use tokio::sync::oneshot;

use crate::ccs811::{ErrorFlags, HARDWARE_ID};
use crate::reading::{Reading, ReadingCell};
use crate::sensor::{Channels, FirmwareInfo, GasSensor, Status};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const RESET_DELAY: Duration = Duration::from_millis(2);
pub const SETTLE_DELAY: Duration = Duration::from_millis(1);
pub const RETRY_DELAY: Duration = Duration::from_millis(100);
pub const RETRY_TIMES: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Unsupported hardware ID: {0:#04x}")]
    UnsupportedHardware(u8),
    #[error("Sensor not in boot mode after reset, status {0}")]
    NotInBootMode(Status),
    #[error("No valid application firmware, status {0}")]
    NoValidApplication(Status),
    #[error("Sensor still in boot mode after APP_START, status {0}")]
    StillInBootMode(Status),
    #[error("Sensor raised error {0}")]
    DeviceError(ErrorFlags),
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub expected_hardware_id: u8,
    pub poll_interval: Duration,
    pub reset_delay: Duration,
    pub settle_delay: Duration,
    pub retry: ConstantBuilder,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            expected_hardware_id: HARDWARE_ID,
            poll_interval: POLL_INTERVAL,
            reset_delay: RESET_DELAY,
            settle_delay: SETTLE_DELAY,
            retry: ConstantBuilder::default()
                .with_delay(RETRY_DELAY)
                .with_max_times(RETRY_TIMES),
        }
    }
}

/// Owns the sensor and keeps the [`ReadingCell`] up to date.
#[derive(Debug)]
pub struct Poller<S, C = ThreadSleeper> {
    sensor: S,
    sleeper: C,
    cell: ReadingCell,
    config: PollerConfig,
}

impl<S, C> Poller<S, C>
where
    S: GasSensor,
    C: Sleeper + Clone + 'static,
{
    pub fn new(sensor: S, sleeper: C, cell: ReadingCell, config: PollerConfig) -> Self {
        Self {
            sensor,
            sleeper,
            cell,
            config,
        }
    }

    /// Resets and validates the sensor, then switches it into measurement
    /// mode.
    pub fn start(&mut self) -> Result<FirmwareInfo, anyhow::Error> {
        // APP_START is only accepted in boot mode.
        self.sensor.reset().context("Failed to reset sensor")?;
        self.sleeper.sleep(self.config.reset_delay);

        let firmware = self
            .sensor
            .firmware_info()
            .context("Failed to read firmware information")?;

        log::info!("=== Hardware information ===");
        log::info!("Hardware ID:         {:#x}", firmware.hardware_id);
        log::info!("Hardware version:    {:#x}", firmware.hardware_version);
        log::info!("Boot version:        {}", firmware.boot_version);
        log::info!("Application version: {}", firmware.app_version);

        if firmware.hardware_id != self.config.expected_hardware_id {
            return Err(StartupError::UnsupportedHardware(firmware.hardware_id).into());
        }

        let status = self.sensor.status().context("Failed to read status")?;
        if status.firmware_mode() {
            return Err(StartupError::NotInBootMode(status).into());
        }
        if !status.app_valid() {
            return Err(StartupError::NoValidApplication(status).into());
        }

        self.sensor
            .start_application()
            .context("Failed to start sensor application")?;
        self.sleeper.sleep(self.config.settle_delay);

        let status = self.sensor.status().context("Failed to read status")?;
        if !status.firmware_mode() {
            return Err(StartupError::StillInBootMode(status).into());
        }

        self.sensor
            .configure()
            .context("Failed to set measurement mode")?;

        let error_id = self.sensor.error_id().context("Failed to read error register")?;
        if error_id != 0 {
            return Err(StartupError::DeviceError(ErrorFlags(error_id)).into());
        }

        Ok(firmware)
    }

    /// Runs startup, fires `ready`, then polls until an error occurs.
    ///
    /// `ready` is dropped unfired when startup fails.
    pub fn run(mut self, ready: oneshot::Sender<FirmwareInfo>) -> Result<Infallible, anyhow::Error> {
        let firmware = self.start()?;

        if ready.send(firmware).is_err() {
            log::warn!("Nobody is waiting for the sensor to become ready");
        }

        loop {
            let reading = self.poll_once()?;
            log::info!("{reading:?}");
            self.sleeper.sleep(self.config.poll_interval);
        }
    }

    /// Waits for the next sample and stores it in the cell.
    pub fn poll_once(&mut self) -> Result<Reading, anyhow::Error> {
        let status = self.wait_for_data()?;
        if status.error() {
            log::warn!("Sensor reported error status {status}");
        }

        let result = self
            .retrying(|sensor| sensor.measure(Channels::Co2VocStatusError))
            .context("Failed to read measurement")?;

        if let Some(result_status) = result.status.filter(|s| !s.firmware_mode()) {
            return Err(anyhow::anyhow!(
                "Sensor left application mode, status {result_status}"
            ));
        }
        if let Some(error_id) = result.error_id.filter(|&id| id != 0) {
            log::warn!("Sensor reported error {}", ErrorFlags(error_id));
        }

        let reading = Reading {
            co2_ppm: result.co2_ppm,
            voc_ppm: result.voc_ppm,
            status,
            measured_at: Some(Local::now()),
        };
        self.cell.write(reading);

        Ok(reading)
    }

    /// Polls STATUS until the data-ready or error bit shows up.
    fn wait_for_data(&mut self) -> Result<Status, anyhow::Error> {
        loop {
            let status = self
                .retrying(|sensor| sensor.status())
                .context("Failed to read status")?;
            if status.data_ready() || status.error() {
                return Ok(status);
            }
            self.sleeper.sleep(self.config.poll_interval);
        }
    }

    fn retrying<T>(
        &mut self,
        mut op: impl FnMut(&mut S) -> Result<T, anyhow::Error>,
    ) -> Result<T, anyhow::Error> {
        let sensor = &mut self.sensor;
        let sleeper = self.sleeper.clone();

        (|| op(&mut *sensor))
            .retry(self.config.retry)
            .sleep(move |dur| sleeper.sleep(dur))
            .notify(|e, dur| {
                log::error!("{e}");
                log::info!("Retrying in {:?}", dur);
            })
            .call()
    }
}
