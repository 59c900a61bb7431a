use thiserror::Error;

use crate::TrackId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid bbox [{0}, {1}, {2}, {3}]: expected finite x1 < x2, y1 < y2")]
    InvalidBBox(f32, f32, f32, f32),

    #[error("Unknown track {0}")]
    UnknownTrack(TrackId),

    #[error("Track {track_id}: frame {got} does not follow frame {last}")]
    NonMonotonicFrame { track_id: TrackId, last: u64, got: u64 },

    #[error("Frame {got} does not follow frame {last}")]
    StaleFrame { last: u64, got: u64 },

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Delivery Error: {0}")]
    Delivery(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn delivery<S: Into<String>>(msg: S) -> Self {
        Self::Delivery(msg.into())
    }
}
