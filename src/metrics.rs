use axum::{Router, extract::State, routing::get};

use crate::reading::{Reading, ReadingView};

pub const METRICS_PATH: &str = "/metrics";

/// Renders a reading in the Prometheus text exposition format.
pub fn render(reading: &Reading) -> String {
    format!(
        "# HELP sensor_co2_ppm Shows how many parts per million of the ambient atmosphere are CO2\n\
         # TYPE sensor_co2_ppm gauge\n\
         sensor_co2_ppm {}\n\
         \n\
         # HELP sensor_voc_ppm Shows how many parts per million of the ambient atmosphere are VOC\n\
         # TYPE sensor_voc_ppm gauge\n\
         sensor_voc_ppm {}\n",
        reading.co2_ppm, reading.voc_ppm,
    )
}

pub fn router(view: ReadingView) -> Router {
    Router::new()
        .route(METRICS_PATH, get(metrics))
        .with_state(view)
}

async fn metrics(State(view): State<ReadingView>) -> String {
    let reading = view.read();
    render(&reading)
}
