use anyhow::Context;
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    TermLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new()
            .set_time_format_rfc3339()
            .set_time_offset_to_local()
            .map_err(|_| anyhow::anyhow!("Failed to set time offset to local"))?
            .build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;

    log::info!("Starting CO2 sensor reader");

    let code = match co2_reader::run().await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{e:#}");
            1
        }
    };

    // The poller thread may be parked in a blocking sleep and is never joined.
    std::process::exit(code);
}
