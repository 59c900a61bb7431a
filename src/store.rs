use nalgebra as na;

use crate::attributes::Attributes;
use crate::bbox::{BBox, Ltrb};
use crate::config::Prediction;
use crate::detection::Detection;
use crate::error::Error;
use crate::{Track, TrackId};

/// Internal per-track record, mutated only by the association step.
#[derive(Debug, Clone)]
pub struct TrackState {
    pub id: TrackId,
    pub bbox: BBox<Ltrb>,
    pub class: String,
    pub confidence: f32,
    pub age: u32,
    pub misses: u32,
    pub hits: u32,
    pub confirmed: bool,
    pub attributes: Attributes,

    // center shift between the last two matches, px per frame
    velocity: na::Vector2<f32>,
}

impl TrackState {
    fn new(id: TrackId, det: &Detection, min_hits: u32) -> Self {
        Self {
            id,
            bbox: det.bbox,
            class: det.class.clone(),
            confidence: det.confidence,
            age: 0,
            misses: 0,
            hits: 1,
            confirmed: min_hits <= 1,
            attributes: Attributes::default(),
            velocity: na::Vector2::zeros(),
        }
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        self.bbox.center()
    }

    /// Where the track is expected in the current frame.
    pub fn predicted_bbox(&self, prediction: Prediction) -> BBox<Ltrb> {
        match prediction {
            Prediction::LastKnown => self.bbox,
            Prediction::ConstantVelocity => {
                // the bbox stays put while coasting, so extrapolate over the gap
                let steps = (self.misses + 1) as f32;
                self.bbox
                    .translate(self.velocity.x * steps, self.velocity.y * steps)
            }
        }
    }

    pub(crate) fn mark_hit(&mut self, det: &Detection, min_hits: u32) {
        let frames = (self.misses + 1) as f32;
        self.velocity = (det.bbox.center() - self.bbox.center()) / frames;

        self.bbox = det.bbox;
        self.class.clone_from(&det.class);
        self.confidence = det.confidence;
        self.hits += 1;
        self.misses = 0;

        if self.hits >= min_hits {
            self.confirmed = true;
        }
    }

    pub(crate) fn mark_miss(&mut self) {
        self.misses += 1;
        self.hits = 0;
    }
}

impl From<&TrackState> for Track {
    fn from(t: &TrackState) -> Track {
        Track {
            track_id: t.id,
            bbox: t.bbox,
            class: t.class.clone(),
            confidence: t.confidence,
            age: t.age,
            misses: t.misses,
            hits: t.hits,
            confirmed: t.confirmed,
            attributes: t.attributes,
        }
    }
}

/// Authoritative set of live tracks.
///
/// Records are kept in creation order, which is also ascending id order since
/// ids are handed out monotonically and never reused.
#[derive(Debug)]
pub struct TrackStore {
    tracks: Vec<TrackState>,
    next_id: TrackId,
}

impl TrackStore {
    pub fn new() -> Self {
        Self {
            tracks: Vec::with_capacity(32),
            next_id: 1,
        }
    }

    pub(crate) fn spawn(&mut self, det: &Detection, min_hits: u32) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;
        self.tracks.push(TrackState::new(id, det, min_hits));

        id
    }

    /// Ages every live track by one frame.
    pub(crate) fn tick(&mut self) {
        for t in &mut self.tracks {
            t.age += 1;
        }
    }

    /// Destroys tracks whose misses exceed `max_age`; returns their ids.
    pub(crate) fn remove_expired(&mut self, max_age: u32) -> Vec<TrackId> {
        let mut removed = Vec::new();

        self.tracks.retain(|t| {
            if t.misses > max_age {
                removed.push(t.id);
                false
            } else {
                true
            }
        });

        removed
    }

    #[inline]
    fn position(&self, id: TrackId) -> Option<usize> {
        self.tracks.binary_search_by_key(&id, |t| t.id).ok()
    }

    #[inline]
    pub fn contains(&self, id: TrackId) -> bool {
        self.position(id).is_some()
    }

    #[inline]
    pub fn get(&self, id: TrackId) -> Option<&TrackState> {
        self.position(id).map(|idx| &self.tracks[idx])
    }

    pub fn set_attributes(&mut self, id: TrackId, attributes: Attributes) -> Result<(), Error> {
        let idx = self.position(id).ok_or(Error::UnknownTrack(id))?;
        self.tracks[idx].attributes = attributes;

        Ok(())
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [TrackState] {
        &mut self.tracks
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &TrackState> {
        self.tracks.iter()
    }

    #[inline]
    pub fn confirmed(&self) -> impl Iterator<Item = &TrackState> {
        self.tracks.iter().filter(|t| t.confirmed)
    }

    /// Id the next spawned track will receive.
    #[inline]
    pub fn next_id(&self) -> TrackId {
        self.next_id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new()
    }
}
