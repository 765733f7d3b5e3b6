//! Polls a CCS811 gas sensor over I2C and serves the latest reading as
//! Prometheus metrics.

use std::convert::Infallible;
use std::future::IntoFuture;

use anyhow::Context;
use rppal::i2c::I2c;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinError;

use crate::ccs811::{Ccs811, MeasurementMode};
use crate::poller::{Poller, PollerConfig, Sleeper, ThreadSleeper};
use crate::reading::{ReadingCell, ReadingView};
use crate::sensor::GasSensor;

pub mod ccs811;
#[cfg(test)]
mod fake;
pub mod metrics;
pub mod poller;
pub mod reading;
pub mod sensor;

pub const LISTEN_ADDR: &str = "0.0.0.0:2112";
pub const MEASUREMENT_MODE: MeasurementMode = MeasurementMode::ConstantPower1s;

pub async fn run() -> Result<(), anyhow::Error> {
    let i2c = I2c::new().context("Failed to initialize I2C")?;
    log::info!(
        "Sensor will be run at address {:#04x} in mode {:?}",
        ccs811::DEFAULT_ADDRESS,
        MEASUREMENT_MODE
    );
    let sensor = Ccs811::new(i2c, ccs811::DEFAULT_ADDRESS, MEASUREMENT_MODE)
        .context("Failed to initialize CCS811")?;

    let cell = ReadingCell::new();
    let poller = Poller::new(sensor, ThreadSleeper, cell.clone(), PollerConfig::default());

    serve(poller, cell.view(), LISTEN_ADDR).await
}

/// Starts the poller and, once the sensor is ready, the metrics listener.
///
/// Returns when either side fails, or `Ok` on Ctrl+C.
pub async fn serve<S, C>(
    poller: Poller<S, C>,
    view: ReadingView,
    addr: impl ToSocketAddrs,
) -> Result<(), anyhow::Error>
where
    S: GasSensor + Send + 'static,
    C: Sleeper + Clone + Send + 'static,
{
    let (ready_tx, ready_rx) = oneshot::channel();
    let mut polling = tokio::task::spawn_blocking(move || poller.run(ready_tx));

    if ready_rx.await.is_err() {
        return Err(poller_failure(polling.await));
    }

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind metrics listener")?;
    log::info!(
        "Serving metrics on http://{}{}",
        listener.local_addr().context("Failed to read listener address")?,
        metrics::METRICS_PATH
    );

    tokio::select! {
        result = &mut polling => Err(poller_failure(result)),
        result = axum::serve(listener, metrics::router(view)).into_future() => {
            result.context("Metrics server failed")
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to wait for Ctrl+C signal")?;
            log::info!("Shutting down");
            Ok(())
        }
    }
}

fn poller_failure(result: Result<Result<Infallible, anyhow::Error>, JoinError>) -> anyhow::Error {
    match result {
        Ok(Err(e)) => e,
        Ok(Ok(never)) => match never {},
        Err(e) => anyhow::Error::new(e).context("Sensor poller stopped unexpectedly"),
    }
}
