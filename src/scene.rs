use serde_derive::{Deserialize, Serialize};

use crate::association::AssociationEngine;
use crate::attributes::{self, Attributes};
use crate::behavior::{BehaviorStateMachine, Decision, Reason};
use crate::config::Config;
use crate::dispatch::AlertPayload;
use crate::error::Error;
use crate::motion::{MotionFeatures, MotionHistory};
use crate::store::TrackStore;
use crate::{Frame, Track, TrackId};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackDecision {
    pub track_id: TrackId,
    pub decision: Decision,
    pub reason: Reason,
    pub features: MotionFeatures,
}

/// Result of one processed frame, read-only for renderers and dispatchers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub camera_id: String,
    pub frame_id: u64,
    pub timestamp: f64,

    /// Confirmed tracks, including ones coasting through a miss.
    pub tracks: Vec<Track>,
    pub decisions: Vec<TrackDecision>,

    /// Tracks destroyed during this frame.
    pub removed: Vec<TrackId>,

    /// Detections refused for a malformed bbox.
    pub rejected: usize,
}

impl FrameReport {
    /// Decisions worth notifying about.
    pub fn alerts(&self) -> impl Iterator<Item = &TrackDecision> {
        self.decisions.iter().filter(|d| d.decision.is_escalated())
    }

    pub fn decision(&self, track_id: TrackId) -> Option<&TrackDecision> {
        self.decisions.iter().find(|d| d.track_id == track_id)
    }

    pub fn track(&self, track_id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }

    pub fn payload(&self, decision: &TrackDecision, snapshot: Option<Vec<u8>>) -> AlertPayload {
        AlertPayload {
            track_id: decision.track_id,
            camera_id: self.camera_id.clone(),
            decision: decision.decision,
            reason: decision.reason,
            timestamp: self.timestamp,
            snapshot,
        }
    }
}

/// Full per-frame pipeline of a single camera.
///
/// Every stage owns its own per-track state; nothing is shared between scenes,
/// so independent cameras can be processed on independent threads.
#[derive(Debug)]
pub struct Scene {
    camera_id: String,
    config: Config,
    store: TrackStore,
    association: AssociationEngine,
    motion: MotionHistory,
    behavior: BehaviorStateMachine,
    last_frame: Option<u64>,
}

impl Scene {
    pub fn new<S: Into<String>>(camera_id: S, config: Config) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            camera_id: camera_id.into(),
            store: TrackStore::new(),
            association: AssociationEngine::new(config.association.clone()),
            motion: MotionHistory::new(&config.motion),
            behavior: BehaviorStateMachine::new(config.behavior.clone()),
            last_frame: None,
            config,
        })
    }

    #[inline]
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    #[inline]
    pub fn motion(&self) -> &MotionHistory {
        &self.motion
    }

    #[inline]
    pub fn behavior(&self) -> &BehaviorStateMachine {
        &self.behavior
    }

    /// Overrides the attributes of a live track. Only sticks when automatic
    /// attachment is disabled, otherwise the next frame recomputes them.
    pub fn set_attributes(&mut self, track_id: TrackId, attrs: Attributes) -> Result<(), Error> {
        self.store.set_attributes(track_id, attrs)
    }

    /// Confirmed tracks as of the last processed frame.
    pub fn tracks(&self) -> Vec<Track> {
        self.store.confirmed().map(Into::into).collect()
    }

    pub fn process(&mut self, frame: &Frame) -> Result<FrameReport, Error> {
        if let Some(last) = self.last_frame {
            if frame.frame_id <= last {
                return Err(Error::StaleFrame {
                    last,
                    got: frame.frame_id,
                });
            }
        }
        self.last_frame = Some(frame.frame_id);

        let assoc = self.association.update(&mut self.store, &frame.detections);

        if self.config.attributes.attach {
            for t in self.store.as_mut_slice().iter_mut().filter(|t| t.confirmed) {
                t.attributes = attributes::collect(&t.bbox, &frame.detections);
            }
        }

        let tracks: Vec<Track> = self.tracks();
        let mut decisions = Vec::with_capacity(tracks.len());

        for track in &tracks {
            let features = match self
                .motion
                .update(track.track_id, track.bbox.center(), frame.frame_id)
            {
                Ok(f) => f,
                Err(err) => {
                    log::warn!("{}: skipping track {}: {}", self.camera_id, track.track_id, err);
                    continue;
                }
            };

            let verdict = self.behavior.update(track, &features, frame.timestamp);

            decisions.push(TrackDecision {
                track_id: track.track_id,
                decision: verdict.decision,
                reason: verdict.reason,
                features,
            });
        }

        let store = &self.store;
        self.motion.retain(|id| store.contains(id));
        self.behavior.retain(|id| store.contains(id));

        log::debug!(
            "{}: frame {} -> {} tracks, {} escalated",
            self.camera_id,
            frame.frame_id,
            tracks.len(),
            decisions.iter().filter(|d| d.decision.is_escalated()).count()
        );

        Ok(FrameReport {
            camera_id: self.camera_id.clone(),
            frame_id: frame.frame_id,
            timestamp: frame.timestamp,
            tracks,
            decisions,
            removed: assoc.removed,
            rejected: assoc.rejected.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::detection::Detection;

    fn person(x: f32) -> Detection {
        Detection::new(BBox::ltrb(x, 100.0, x + 40.0, 200.0), "person", 0.9)
    }

    fn scene() -> Scene {
        Scene::new("cam", Config::default()).unwrap()
    }

    #[test]
    fn refuses_stale_frames() {
        let mut s = scene();
        s.process(&Frame::new(3, 0.0, vec![])).unwrap();

        assert!(matches!(
            s.process(&Frame::new(3, 0.1, vec![])),
            Err(Error::StaleFrame { last: 3, got: 3 })
        ));
        assert!(s.process(&Frame::new(4, 0.2, vec![])).is_ok());
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = Config::default();
        config.motion.horizons.clear();
        assert!(Scene::new("cam", config).is_err());
    }

    #[test]
    fn attaches_attributes_from_overlapping_items() {
        let mut s = scene();
        for i in 0..3 {
            s.process(&Frame::new(i, i as f64, vec![person(0.0)])).unwrap();
        }

        let helmet = Detection::new(BBox::ltrb(10.0, 95.0, 30.0, 115.0), "helmet", 0.8);
        let report = s
            .process(&Frame::new(3, 3.0, vec![person(0.0), helmet]))
            .unwrap();

        let id = report.tracks[0].track_id;
        assert!(report.track(id).unwrap().attributes.helmet);
        assert_eq!(report.decision(id).unwrap().reason, Reason::HelmetWorn);

        // recomputed each frame
        let report = s.process(&Frame::new(4, 4.0, vec![person(0.0)])).unwrap();
        assert!(!report.track(id).unwrap().attributes.helmet);
    }

    #[test]
    fn manual_attributes_stick_when_attachment_is_off() {
        let mut config = Config::default();
        config.attributes.attach = false;
        config.association.min_hits = 1;
        let mut s = Scene::new("cam", config).unwrap();

        let id = s.process(&Frame::new(0, 0.0, vec![person(0.0)])).unwrap().tracks[0].track_id;
        s.set_attributes(id, Attributes { hat: true, ..Default::default() })
            .unwrap();

        let report = s.process(&Frame::new(1, 1.0, vec![person(0.0)])).unwrap();
        let d = report.decision(id).unwrap();
        assert_eq!((d.decision, d.reason), (Decision::Warning, Reason::HatWorn));

        assert!(matches!(
            s.set_attributes(999, Attributes::default()),
            Err(Error::UnknownTrack(999))
        ));
    }

    #[test]
    fn prunes_state_of_destroyed_tracks() {
        let mut config = Config::default();
        config.association.max_age = 2;
        let mut s = Scene::new("cam", config).unwrap();

        for i in 0..4 {
            s.process(&Frame::new(i, i as f64, vec![person(0.0)])).unwrap();
        }
        let id = s.tracks()[0].track_id;
        assert!(s.motion().contains(id) && s.behavior().contains(id));

        let mut removed = Vec::new();
        for i in 4..8 {
            removed.extend(s.process(&Frame::new(i, i as f64, vec![])).unwrap().removed);
        }

        assert_eq!(removed, vec![id]);
        assert!(s.store().is_empty());
        assert!(s.motion().is_empty());
        assert!(s.behavior().is_empty());
    }

    #[test]
    fn payload_carries_camera_and_decision() {
        let report = FrameReport {
            camera_id: "gate-2".to_string(),
            frame_id: 10,
            timestamp: 99.0,
            tracks: vec![],
            decisions: vec![TrackDecision {
                track_id: 5,
                decision: Decision::Alert,
                reason: Reason::StandingStillTooLong,
                features: MotionFeatures::default(),
            }],
            removed: vec![],
            rejected: 0,
        };

        let alerts: Vec<_> = report.alerts().collect();
        assert_eq!(alerts.len(), 1);

        let p = report.payload(alerts[0], Some(vec![1, 2, 3]));
        assert_eq!(p.camera_id, "gate-2");
        assert_eq!(p.track_id, 5);
        assert_eq!(p.timestamp, 99.0);
        assert_eq!(p.snapshot.as_deref(), Some(&[1u8, 2, 3][..]));
    }
}
