use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::circular_queue::CircularQueue;
use crate::config::MotionConfig;
use crate::error::Error;
use crate::math;
use crate::TrackId;

/// Heading changes sharper than this count as a change of direction.
pub const DIRECTION_CHANGE_DEG: f32 = 45.0;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct MotionSample {
    pub frame_id: u64,
    pub x: f32,
    pub y: f32,
}

impl MotionSample {
    #[inline]
    pub fn point(&self) -> na::Point2<f32> {
        na::Point2::new(self.x, self.y)
    }
}

/// Motion summary of one track, recomputed every frame from its history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MotionFeatures {
    /// `(horizon, displacement)` in configured horizon order.
    pub displacements: Vec<(usize, f32)>,
    pub path_length: f32,
    pub direction_changes: usize,

    // px per sample
    pub avg_speed: f32,

    pub net_displacement: f32,
    pub samples: usize,
}

impl MotionFeatures {
    fn from_history(horizons: &[usize], history: &CircularQueue<MotionSample>) -> Self {
        let newest = match history.newest() {
            Some(s) => s.point(),
            None => return Self::default(),
        };

        let displacements = horizons
            .iter()
            .map(|&g| {
                let d = history
                    .nth_newest(g)
                    .map(|old| na::distance(&old.point(), &newest))
                    .unwrap_or(0.0);

                (g, d)
            })
            .collect();

        let mut path_length = 0.0;
        let mut direction_changes = 0;
        let mut last_bearing: Option<f32> = None;

        let mut points = history.asc_iter().map(MotionSample::point);
        if let Some(mut prev) = points.next() {
            for curr in points {
                path_length += na::distance(&prev, &curr);

                if let Some(b) = math::bearing(&prev, &curr) {
                    if let Some(last) = last_bearing {
                        if math::angle_delta(last, b) > DIRECTION_CHANGE_DEG {
                            direction_changes += 1;
                        }
                    }
                    last_bearing = Some(b);
                }

                prev = curr;
            }
        }

        let segments = history.len().saturating_sub(1).max(1);

        let net_displacement = history
            .oldest()
            .map(|s| na::distance(&s.point(), &newest))
            .unwrap_or(0.0);

        Self {
            displacements,
            path_length,
            direction_changes,
            avg_speed: path_length / segments as f32,
            net_displacement,
            samples: history.len(),
        }
    }

    /// Displacement over `horizon` frames, `None` if it is not configured.
    pub fn displacement(&self, horizon: usize) -> Option<f32> {
        self.displacements
            .iter()
            .find(|(g, _)| *g == horizon)
            .map(|(_, d)| *d)
    }

    pub fn max_displacement(&self) -> f32 {
        self.displacements
            .iter()
            .map(|(_, d)| *d)
            .fold(0.0, f32::max)
    }
}

/// Bounded per-track trail of bbox centers.
#[derive(Debug)]
pub struct MotionHistory {
    horizons: Vec<usize>,
    capacity: usize,
    histories: HashMap<TrackId, CircularQueue<MotionSample>>,
}

impl MotionHistory {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            horizons: config.horizons.clone(),
            capacity: config.capacity,
            histories: HashMap::new(),
        }
    }

    /// Appends this frame's center of `track_id` and returns its features.
    ///
    /// Frame ids must strictly increase per track; a repeated or older id is
    /// refused without touching the history.
    pub fn update(
        &mut self,
        track_id: TrackId,
        center: na::Point2<f32>,
        frame_id: u64,
    ) -> Result<MotionFeatures, Error> {
        let capacity = self.capacity;
        let history = self
            .histories
            .entry(track_id)
            .or_insert_with(|| CircularQueue::with_capacity(capacity));

        if let Some(last) = history.newest() {
            if frame_id <= last.frame_id {
                return Err(Error::NonMonotonicFrame {
                    track_id,
                    last: last.frame_id,
                    got: frame_id,
                });
            }
        }

        history.push(MotionSample {
            frame_id,
            x: center.x,
            y: center.y,
        });

        Ok(MotionFeatures::from_history(&self.horizons, history))
    }

    pub fn features(&self, track_id: TrackId) -> Option<MotionFeatures> {
        self.histories
            .get(&track_id)
            .map(|h| MotionFeatures::from_history(&self.horizons, h))
    }

    /// Retained samples of `track_id`, oldest first.
    pub fn samples(&self, track_id: TrackId) -> Vec<MotionSample> {
        self.histories
            .get(&track_id)
            .map(|h| h.asc_iter().copied().collect())
            .unwrap_or_default()
    }

    #[inline]
    pub fn contains(&self, track_id: TrackId) -> bool {
        self.histories.contains_key(&track_id)
    }

    pub fn remove(&mut self, track_id: TrackId) {
        self.histories.remove(&track_id);
    }

    /// Drops every history whose track fails `keep`.
    pub fn retain<F: FnMut(TrackId) -> bool>(&mut self, mut keep: F) {
        self.histories.retain(|id, _| keep(*id));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}
