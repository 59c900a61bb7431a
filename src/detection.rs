use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::error::Error;

/// One detector output for one frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "c")]
    pub class: String,
    #[serde(rename = "p", default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl Detection {
    pub fn new<S: Into<String>>(bbox: BBox<Ltrb>, class: S, confidence: f32) -> Self {
        Self {
            bbox,
            class: class.into(),
            confidence,
        }
    }

    #[inline]
    pub fn validate(&self) -> Result<(), Error> {
        self.bbox.validate()
    }

    #[inline]
    pub fn iou(&self, other: &Detection) -> f32 {
        self.bbox.iou(&other.bbox)
    }
}
