use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::behavior::{Decision, Reason};
use crate::config::DispatchConfig;
use crate::error::Error;
use crate::TrackId;

/// Everything a transport needs to report one escalated track.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AlertPayload {
    pub track_id: TrackId,
    pub camera_id: String,
    pub decision: Decision,
    pub reason: Reason,
    pub timestamp: f64,

    // encoded frame or crop, format is up to the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Vec<u8>>,
}

impl AlertPayload {
    pub fn caption(&self) -> String {
        format!(
            "Camera: {}\nTrack ID: {}\nDecision: {}\nReason: {}",
            self.camera_id, self.track_id, self.decision, self.reason
        )
    }
}

/// Outbound alert channel.
pub trait Notifier {
    fn deliver(&mut self, payload: &AlertPayload) -> Result<(), Error>;
}

impl<F> Notifier for F
where
    F: FnMut(&AlertPayload) -> Result<(), Error>,
{
    fn deliver(&mut self, payload: &AlertPayload) -> Result<(), Error> {
        self(payload)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Same track and severity delivered less than a cooldown ago.
    Suppressed,
    /// The notifier failed; logged and swallowed.
    Failed,
    /// Normal decisions are never delivered.
    Skipped,
}

/// Deduplicates escalations per `(track, severity)` and hands the survivors to
/// a [`Notifier`].
///
/// A cooldown is armed only by a successful delivery, so a failed attempt is
/// made again the next time the track escalates.
pub struct AlertDispatcher<N: Notifier> {
    notifier: N,
    cooldown: f64,
    last_sent: HashMap<(TrackId, Decision), f64>,
}

impl<N: Notifier> AlertDispatcher<N> {
    pub fn new(notifier: N, config: &DispatchConfig) -> Self {
        Self {
            notifier,
            cooldown: config.cooldown,
            last_sent: HashMap::new(),
        }
    }

    /// Delivers `payload` unless it is Normal or still cooling down at `now`
    /// (seconds).
    pub fn dispatch(&mut self, payload: &AlertPayload, now: f64) -> DispatchOutcome {
        if !payload.decision.is_escalated() {
            return DispatchOutcome::Skipped;
        }

        let key = (payload.track_id, payload.decision);

        if let Some(&sent) = self.last_sent.get(&key) {
            if now - sent < self.cooldown {
                log::debug!(
                    "suppressing {} for track {} ({:.0}s since last)",
                    payload.decision,
                    payload.track_id,
                    now - sent
                );
                return DispatchOutcome::Suppressed;
            }
        }

        match self.notifier.deliver(payload) {
            Ok(()) => {
                log::info!(
                    "alert delivered: camera {} track {} {} ({})",
                    payload.camera_id,
                    payload.track_id,
                    payload.decision,
                    payload.reason
                );
                self.last_sent.insert(key, now);
                DispatchOutcome::Delivered
            }
            Err(err) => {
                log::error!(
                    "failed to deliver {} for track {}: {}",
                    payload.decision,
                    payload.track_id,
                    err
                );
                DispatchOutcome::Failed
            }
        }
    }

    /// Forgets cooldowns of tracks rejected by `keep`.
    pub fn retain_tracks<F: FnMut(TrackId) -> bool>(&mut self, mut keep: F) {
        self.last_sent.retain(|(id, _), _| keep(*id));
    }

    #[inline]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    #[inline]
    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<AlertPayload>,
        fail: bool,
    }

    impl Notifier for Recorder {
        fn deliver(&mut self, payload: &AlertPayload) -> Result<(), Error> {
            if self.fail {
                return Err(Error::delivery("transport down"));
            }

            self.sent.push(payload.clone());
            Ok(())
        }
    }

    fn payload(track_id: TrackId, decision: Decision) -> AlertPayload {
        AlertPayload {
            track_id,
            camera_id: "CAM1".to_string(),
            decision,
            reason: Reason::StandingStill,
            timestamp: 0.0,
            snapshot: None,
        }
    }

    fn dispatcher() -> AlertDispatcher<Recorder> {
        AlertDispatcher::new(Recorder::default(), &DispatchConfig::default())
    }

    #[test]
    fn cooldown_suppresses_repeats() {
        let mut d = dispatcher();
        let p = payload(1, Decision::Warning);

        assert_eq!(d.dispatch(&p, 0.0), DispatchOutcome::Delivered);
        assert_eq!(d.dispatch(&p, 100.0), DispatchOutcome::Suppressed);
        assert_eq!(d.dispatch(&p, 239.9), DispatchOutcome::Suppressed);
        assert_eq!(d.dispatch(&p, 240.0), DispatchOutcome::Delivered);
        assert_eq!(d.notifier().sent.len(), 2);
    }

    #[test]
    fn severities_and_tracks_cool_down_separately() {
        let mut d = dispatcher();

        assert_eq!(d.dispatch(&payload(1, Decision::Warning), 0.0), DispatchOutcome::Delivered);
        assert_eq!(d.dispatch(&payload(1, Decision::Alert), 1.0), DispatchOutcome::Delivered);
        assert_eq!(d.dispatch(&payload(2, Decision::Warning), 2.0), DispatchOutcome::Delivered);
        assert_eq!(d.dispatch(&payload(1, Decision::Warning), 3.0), DispatchOutcome::Suppressed);
    }

    #[test]
    fn normal_is_never_sent() {
        let mut d = dispatcher();
        assert_eq!(d.dispatch(&payload(1, Decision::Normal), 0.0), DispatchOutcome::Skipped);
        assert!(d.notifier().sent.is_empty());
    }

    #[test]
    fn failures_are_swallowed_and_retried() {
        let mut d = dispatcher();
        d.notifier_mut().fail = true;
        let p = payload(1, Decision::Alert);

        assert_eq!(d.dispatch(&p, 0.0), DispatchOutcome::Failed);

        d.notifier_mut().fail = false;
        assert_eq!(d.dispatch(&p, 1.0), DispatchOutcome::Delivered);
    }

    #[test]
    fn forgetting_a_track_drops_its_cooldown() {
        let mut d = dispatcher();
        let p = payload(4, Decision::Warning);
        d.dispatch(&p, 0.0);

        d.retain_tracks(|id| id != 4);
        assert_eq!(d.dispatch(&p, 1.0), DispatchOutcome::Delivered);
    }

    #[test]
    fn closures_are_notifiers() {
        let mut count = 0;
        {
            let mut d = AlertDispatcher::new(
                |_: &AlertPayload| -> Result<(), Error> {
                    count += 1;
                    Ok(())
                },
                &DispatchConfig::default(),
            );
            d.dispatch(&payload(1, Decision::Alert), 0.0);
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn caption_lists_fields() {
        let p = payload(7, Decision::Alert);
        assert_eq!(
            p.caption(),
            "Camera: CAM1\nTrack ID: 7\nDecision: Alert\nReason: Standing still"
        );
    }
}
