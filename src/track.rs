use serde_derive::{Deserialize, Serialize};

use crate::attributes::Attributes;
use crate::bbox::{BBox, Ltrb};
use crate::TrackId;

/// A live subject identity and its lifecycle counters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: TrackId,
    pub bbox: BBox<Ltrb>,
    pub class: String,
    pub confidence: f32,

    // frames since creation
    pub age: u32,

    // consecutive frames without a match
    pub misses: u32,

    // consecutive frames with a match
    pub hits: u32,

    pub confirmed: bool,
    pub attributes: Attributes,
}

impl Track {
    #[inline]
    pub fn is_coasting(&self) -> bool {
        self.misses > 0
    }
}
