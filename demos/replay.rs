//! Replays newline-delimited JSON frames from stdin through a [`Monitor`] and
//! logs every alert that survives the cooldown.
//!
//! ```text
//! {"camera":"gate","frame_id":1,"timestamp":1700000000.0,"detections":[{"bbox":[10,20,70,180],"c":"person","p":0.9}]}
//! ```
//!
//! Usage: `cargo run --example replay [config.json] < frames.ndjson`

use std::collections::HashMap;
use std::io::BufRead;

use qguard::error::Error;
use qguard::{AlertDispatcher, AlertPayload, Config, Detection, Frame, Monitor, Monitoring};
use serde_derive::Deserialize;

#[derive(Debug, Deserialize)]
struct Record {
    camera: String,
    frame_id: u64,
    timestamp: f64,
    #[serde(default)]
    detections: Vec<Detection>,
}

type Sink = fn(&AlertPayload) -> Result<(), Error>;

fn log_alert(payload: &AlertPayload) -> Result<(), Error> {
    log::warn!("{}", payload.caption().replace('\n', " | "));
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut monitor = Monitor::new(config.clone())?;

    // track ids are only unique per camera, so cooldowns are too
    let mut dispatchers: HashMap<String, AlertDispatcher<Sink>> = HashMap::new();

    let stdin = std::io::stdin();
    for (lineno, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: Record = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(err) => {
                log::error!("line {}: {}", lineno + 1, err);
                continue;
            }
        };

        let frame = Frame::new(record.frame_id, record.timestamp, record.detections);
        let report = match monitor.update(&record.camera, &frame) {
            Ok(r) => r,
            Err(err) => {
                log::error!("{} frame {}: {}", record.camera, record.frame_id, err);
                continue;
            }
        };

        for d in &report.decisions {
            log::debug!(
                "{} frame {} track {}: {} ({})",
                report.camera_id,
                report.frame_id,
                d.track_id,
                d.decision,
                d.reason
            );
        }

        let dispatcher = dispatchers
            .entry(record.camera)
            .or_insert_with(|| AlertDispatcher::new(log_alert as Sink, &config.dispatch));

        if !report.removed.is_empty() {
            dispatcher.retain_tracks(|id| !report.removed.contains(&id));
        }

        for alert in report.alerts() {
            dispatcher.dispatch(&report.payload(alert, None), report.timestamp);
        }
    }

    for src in monitor.sources() {
        log::info!("{}: {} live tracks", src, monitor.tracks(src).len());
    }

    Ok(())
}
