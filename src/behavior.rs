//! Per-track escalation `Normal -> Warning -> Alert`.
//!
//! The decision itself is recomputed from scratch on every call; the only
//! state carried between frames is each track's last position and its
//! stillness timer. Rules are evaluated in priority order and the first one
//! that fires wins:
//!
//! 1. first observation of a track
//! 2. worn attributes (helmet, then mask, then hat)
//! 3. disoriented navigation (fast, many turns, little net progress)
//! 4. stillness timer
//!
//! The stillness timer runs on the caller's wall clock, so slow frames stretch
//! the apparent standing time.

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::attributes::Attributes;
use crate::config::BehaviorConfig;
use crate::motion::MotionFeatures;
use crate::{Track, TrackId};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Decision {
    Normal,
    Warning,
    Alert,
}

impl Decision {
    #[inline]
    pub fn is_escalated(&self) -> bool {
        !matches!(self, Decision::Normal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Normal => "Normal",
            Decision::Warning => "Warning",
            Decision::Alert => "Alert",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Reason {
    Init,
    HelmetWorn,
    MaskWorn,
    HatWorn,
    DisorientedNavigation,
    StandingStillTooLong,
    StandingStill,
    Stationary,
    Moving,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Init => "Init",
            Reason::HelmetWorn => "Helmet worn",
            Reason::MaskWorn => "Mask worn",
            Reason::HatWorn => "Hat worn",
            Reason::DisorientedNavigation => "Disoriented navigation",
            Reason::StandingStillTooLong => "Standing still too long",
            Reason::StandingStill => "Standing still",
            Reason::Stationary => "Stationary",
            Reason::Moving => "Moving",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: Reason,
}

impl Verdict {
    #[inline]
    pub const fn new(decision: Decision, reason: Reason) -> Self {
        Self { decision, reason }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Stillness {
    Moving,
    Still { since: f64 },
}

impl Stillness {
    /// Seconds spent still at `now`, zero while moving.
    #[inline]
    pub fn elapsed(&self, now: f64) -> f64 {
        match self {
            Stillness::Moving => 0.0,
            Stillness::Still { since } => (now - since).max(0.0),
        }
    }
}

#[derive(Debug, Clone)]
struct BehaviorState {
    last_position: na::Point2<f32>,
    stillness: Stillness,
}

#[derive(Debug)]
pub struct BehaviorStateMachine {
    config: BehaviorConfig,
    states: HashMap<TrackId, BehaviorState>,
}

impl BehaviorStateMachine {
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    fn attribute_rule(attrs: &Attributes) -> Option<Verdict> {
        if attrs.helmet {
            Some(Verdict::new(Decision::Alert, Reason::HelmetWorn))
        } else if attrs.mask {
            Some(Verdict::new(Decision::Warning, Reason::MaskWorn))
        } else if attrs.hat {
            Some(Verdict::new(Decision::Warning, Reason::HatWorn))
        } else {
            None
        }
    }

    fn is_disoriented(&self, features: &MotionFeatures) -> bool {
        features.avg_speed > self.config.disoriented_speed
            && features.direction_changes >= self.config.disoriented_direction_changes
            && features.net_displacement <= self.config.disoriented_displacement
    }

    fn stillness_rule(&self, state: &mut BehaviorState, center: na::Point2<f32>, now: f64) -> Verdict {
        let moved = na::distance(&state.last_position, &center);

        if moved >= self.config.move_threshold {
            state.stillness = Stillness::Moving;
            return Verdict::new(Decision::Normal, Reason::Moving);
        }

        if state.stillness == Stillness::Moving {
            state.stillness = Stillness::Still { since: now };
        }

        let still_for = state.stillness.elapsed(now);

        if still_for >= self.config.alert_time {
            Verdict::new(Decision::Alert, Reason::StandingStillTooLong)
        } else if still_for >= self.config.warning_time {
            Verdict::new(Decision::Warning, Reason::StandingStill)
        } else {
            Verdict::new(Decision::Normal, Reason::Stationary)
        }
    }

    /// Decides the state of `track` for the frame observed at `now` (seconds).
    pub fn update(&mut self, track: &Track, features: &MotionFeatures, now: f64) -> Verdict {
        let center = track.bbox.center();

        let mut state = match self.states.get(&track.track_id) {
            Some(state) => state.clone(),
            None => {
                self.states.insert(
                    track.track_id,
                    BehaviorState {
                        last_position: center,
                        stillness: Stillness::Moving,
                    },
                );

                return Verdict::new(Decision::Normal, Reason::Init);
            }
        };

        let verdict = if let Some(v) = Self::attribute_rule(&track.attributes) {
            v
        } else if self.is_disoriented(features) {
            Verdict::new(Decision::Warning, Reason::DisorientedNavigation)
        } else {
            self.stillness_rule(&mut state, center, now)
        };

        state.last_position = center;
        self.states.insert(track.track_id, state);

        log::debug!(
            "track {}: {} ({})",
            track.track_id,
            verdict.decision,
            verdict.reason
        );

        verdict
    }

    pub fn stillness(&self, track_id: TrackId) -> Option<Stillness> {
        self.states.get(&track_id).map(|s| s.stillness)
    }

    #[inline]
    pub fn contains(&self, track_id: TrackId) -> bool {
        self.states.contains_key(&track_id)
    }

    pub fn remove(&mut self, track_id: TrackId) {
        self.states.remove(&track_id);
    }

    pub fn retain<F: FnMut(TrackId) -> bool>(&mut self, mut keep: F) {
        self.states.retain(|id, _| keep(*id));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
