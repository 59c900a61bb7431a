//! Tunables for every stage of a [`Scene`](crate::scene::Scene).
//!
//! All sections deserialize from JSON with per-field defaults, so a config
//! file only needs the values it overrides.

use serde_derive::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;

/// How detections are matched to tracks.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Assignment {
    /// Highest IoU first, each track and detection consumed once.
    Greedy,
    /// Globally optimal assignment on `1 - IoU` costs.
    Hungarian,
}

/// Where a track is expected to be in the current frame.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    LastKnown,
    ConstantVelocity,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AssociationConfig {
    /// Class allow-list; empty tracks every class.
    pub classes: Vec<String>,
    pub min_iou: f32,
    pub min_hits: u32,
    pub max_age: u32,
    pub assignment: Assignment,
    pub prediction: Prediction,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            classes: vec!["person".to_string()],
            min_iou: 0.3,
            min_hits: 3,
            max_age: 30,
            assignment: Assignment::Greedy,
            prediction: Prediction::LastKnown,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MotionConfig {
    /// Frame-count lookbacks.
    pub horizons: Vec<usize>,
    pub capacity: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            horizons: vec![1, 5, 10, 15, 20],
            capacity: 25,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BehaviorConfig {
    // px
    pub move_threshold: f32,

    // seconds
    pub warning_time: f64,
    pub alert_time: f64,

    // px per sample
    pub disoriented_speed: f32,
    pub disoriented_direction_changes: usize,

    // px
    pub disoriented_displacement: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            move_threshold: 50.0,
            warning_time: 180.0,
            alert_time: 300.0,
            disoriented_speed: 15.0,
            disoriented_direction_changes: 4,
            disoriented_displacement: 60.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AttributeConfig {
    /// Derive track attributes from overlapping mask/helmet/hat detections.
    pub attach: bool,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self { attach: true }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    // seconds
    pub cooldown: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { cooldown: 240.0 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub association: AssociationConfig,
    pub motion: MotionConfig,
    pub behavior: BehaviorConfig,
    pub attributes: AttributeConfig,
    pub dispatch: DispatchConfig,
}

impl Config {
    pub fn from_json_str(s: &str) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(s)?;
        config.validate()?;

        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;

        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let a = &self.association;
        if !(a.min_iou > 0.0 && a.min_iou <= 1.0) {
            return Err(Error::config(format!(
                "association.min_iou must be in (0, 1], got {}",
                a.min_iou
            )));
        }

        if a.min_hits == 0 {
            return Err(Error::config("association.min_hits must be positive"));
        }

        let m = &self.motion;
        let largest = match m.horizons.iter().max() {
            Some(&h) => h,
            None => return Err(Error::config("motion.horizons must not be empty")),
        };

        if m.horizons.contains(&0) {
            return Err(Error::config("motion.horizons must be positive"));
        }

        if m.capacity <= largest {
            return Err(Error::config(format!(
                "motion.capacity ({}) must exceed the largest horizon ({})",
                m.capacity, largest
            )));
        }

        let b = &self.behavior;
        if b.move_threshold <= 0.0 {
            return Err(Error::config("behavior.move_threshold must be positive"));
        }

        if b.warning_time < 0.0 || b.warning_time > b.alert_time {
            return Err(Error::config(format!(
                "behavior.warning_time ({}) must be within [0, alert_time ({})]",
                b.warning_time, b.alert_time
            )));
        }

        if b.disoriented_speed < 0.0 || b.disoriented_displacement < 0.0 {
            return Err(Error::config(
                "behavior disoriented thresholds must not be negative",
            ));
        }

        if self.dispatch.cooldown < 0.0 {
            return Err(Error::config("dispatch.cooldown must not be negative"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.association.classes, vec!["person".to_string()]);
        assert_eq!(config.motion.horizons, vec![1, 5, 10, 15, 20]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json_str(
            r#"{"association":{"max_age":10,"assignment":"hungarian"},"dispatch":{"cooldown":60}}"#,
        )
        .unwrap();

        assert_eq!(config.association.max_age, 10);
        assert_eq!(config.association.min_hits, 3);
        assert_eq!(config.association.assignment, Assignment::Hungarian);
        assert_eq!(config.dispatch.cooldown, 60.0);
        assert_eq!(config.behavior, BehaviorConfig::default());
    }

    #[test]
    fn rejects_capacity_not_covering_horizons() {
        let err = Config::from_json_str(r#"{"motion":{"horizons":[1,30],"capacity":25}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_inverted_escalation_times() {
        let mut config = Config::default();
        config.behavior.warning_time = 400.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Config::from_json_str("{association:"),
            Err(Error::Json(_))
        ));
    }
}
