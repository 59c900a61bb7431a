use munkres::{solve_assignment, WeightMatrix};
use ndarray::prelude::*;

use crate::bbox::{BBox, Ltrb};
use crate::config::{Assignment, AssociationConfig};
use crate::detection::Detection;
use crate::error::Error;
use crate::store::TrackStore;
use crate::TrackId;

/// What one association pass did to the store.
#[derive(Debug, Default)]
pub struct AssociationResult {
    /// `(track, detection index)` pairs.
    pub matched: Vec<(TrackId, usize)>,
    pub spawned: Vec<TrackId>,
    pub removed: Vec<TrackId>,

    /// Detections dropped for violating bbox preconditions, by index.
    pub rejected: Vec<(usize, Error)>,
}

/// IoU between every predicted track box (rows) and detection box (columns).
pub fn iou_matrix(tracks: &[BBox<Ltrb>], dets: &[BBox<Ltrb>]) -> Array2<f32> {
    Array2::from_shape_fn((tracks.len(), dets.len()), |(r, c)| tracks[r].iou(&dets[c]))
}

/// Consumes pairs by descending IoU, never below `gate`. Ties resolve to the
/// lower track index, then the lower detection index.
pub fn greedy_assignment(ious: ArrayView2<'_, f32>, gate: f32) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f32)> = ious
        .indexed_iter()
        .filter(|&(_, &iou)| iou >= gate)
        .map(|((r, c), &iou)| (r, c, iou))
        .collect();

    pairs.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
            .then(a.1.cmp(&b.1))
    });

    let mut used_rows = vec![false; ious.nrows()];
    let mut used_cols = vec![false; ious.ncols()];
    let mut assignments = Vec::new();

    for (r, c, _) in pairs {
        if used_rows[r] || used_cols[c] {
            continue;
        }

        used_rows[r] = true;
        used_cols[c] = true;
        assignments.push((r, c));
    }

    assignments
}

/// Globally optimal assignment maximizing the summed IoU of gated pairs.
/// `None` when the solver gives up.
pub fn hungarian_assignment(ious: ArrayView2<'_, f32>, gate: f32) -> Option<Vec<(usize, usize)>> {
    let (rows, cols) = ious.dim();
    if rows == 0 || cols == 0 {
        return Some(Vec::new());
    }

    let n = rows.max(cols);

    // gated pairs cost the same as padding, i.e. as leaving both sides unmatched
    let mut mat = WeightMatrix::from_fn(n, |(r, c)| {
        if r < rows && c < cols && ious[[r, c]] >= gate {
            1.0 - ious[[r, c]]
        } else {
            1.0
        }
    });

    match solve_assignment(&mut mat) {
        Ok(positions) => Some(
            positions
                .into_iter()
                .filter(|p| p.row < rows && p.column < cols)
                .filter(|p| ious[[p.row, p.column]] >= gate)
                .map(|p| (p.row, p.column))
                .collect(),
        ),
        Err(err) => {
            log::warn!("assignment could not be solved: {:?}", err);
            None
        }
    }
}

/// Matches each frame's detections to the tracks of one [`TrackStore`].
#[derive(Debug, Clone)]
pub struct AssociationEngine {
    config: AssociationConfig,
}

impl AssociationEngine {
    pub fn new(config: AssociationConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &AssociationConfig {
        &self.config
    }

    /// Whether detections of `class` take part in association.
    #[inline]
    pub fn accepts(&self, class: &str) -> bool {
        self.config.classes.is_empty() || self.config.classes.iter().any(|c| c == class)
    }

    fn assign(&self, ious: ArrayView2<'_, f32>) -> Vec<(usize, usize)> {
        let gate = self.config.min_iou;

        match self.config.assignment {
            Assignment::Greedy => greedy_assignment(ious, gate),
            Assignment::Hungarian => hungarian_assignment(ious, gate).unwrap_or_else(|| {
                log::warn!("falling back to greedy assignment");
                greedy_assignment(ious, gate)
            }),
        }
    }

    /// Runs one frame of association against `store`: ages every track,
    /// applies matches and misses, destroys expired tracks and spawns tracks
    /// for unmatched detections.
    pub fn update(&self, store: &mut TrackStore, detections: &[Detection]) -> AssociationResult {
        let mut result = AssociationResult::default();

        let mut candidates = Vec::with_capacity(detections.len());
        for (idx, det) in detections.iter().enumerate() {
            if !self.accepts(&det.class) {
                continue;
            }

            match det.validate() {
                Ok(()) => candidates.push(idx),
                Err(err) => {
                    log::warn!("rejecting detection #{}: {}", idx, err);
                    result.rejected.push((idx, err));
                }
            }
        }

        store.tick();

        let predicted: Vec<BBox<Ltrb>> = store
            .iter()
            .map(|t| t.predicted_bbox(self.config.prediction))
            .collect();

        let det_boxes: Vec<BBox<Ltrb>> = candidates.iter().map(|&i| detections[i].bbox).collect();

        let ious = iou_matrix(&predicted, &det_boxes);
        let assignments = self.assign(ious.view());

        let mut track_matched = vec![false; predicted.len()];
        let mut det_matched = vec![false; candidates.len()];

        for &(r, c) in &assignments {
            track_matched[r] = true;
            det_matched[c] = true;

            let det_idx = candidates[c];
            let track = &mut store.as_mut_slice()[r];

            log::debug!(
                "track {} matched detection #{} (iou {:.3})",
                track.id,
                det_idx,
                ious[[r, c]]
            );

            let was_confirmed = track.confirmed;
            track.mark_hit(&detections[det_idx], self.config.min_hits);

            if !was_confirmed && track.confirmed {
                log::info!("track {} confirmed", track.id);
            }

            result.matched.push((track.id, det_idx));
        }

        for (track, matched) in store.as_mut_slice().iter_mut().zip(track_matched) {
            if !matched {
                track.mark_miss();
            }
        }

        result.removed = store.remove_expired(self.config.max_age);
        for id in &result.removed {
            log::info!("track {} lost", id);
        }

        for (c, matched) in det_matched.into_iter().enumerate() {
            if !matched {
                let id = store.spawn(&detections[candidates[c]], self.config.min_hits);
                log::debug!("track {} spawned from detection #{}", id, candidates[c]);
                result.spawned.push(id);
            }
        }

        log::debug!(
            "association: {} candidates, {} matched, {} spawned, {} removed, {} live",
            candidates.len(),
            result.matched.len(),
            result.spawned.len(),
            result.removed.len(),
            store.len()
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prediction;

    fn person(x: f32, y: f32) -> Detection {
        Detection::new(BBox::ltrb(x, y, x + 40.0, y + 100.0), "person", 0.9)
    }

    fn engine() -> AssociationEngine {
        AssociationEngine::new(AssociationConfig::default())
    }

    #[test]
    fn greedy_takes_highest_iou_first() {
        let ious = array![[0.5, 0.6], [0.0, 0.55]];

        // row 0 takes col 1 (0.6), so row 1 cannot get its only option
        assert_eq!(greedy_assignment(ious.view(), 0.3), vec![(0, 1)]);
    }

    #[test]
    fn greedy_never_assigns_below_gate() {
        let ious = array![[0.29, 0.1], [0.05, 0.2]];
        assert!(greedy_assignment(ious.view(), 0.3).is_empty());
    }

    #[test]
    fn greedy_breaks_ties_by_index() {
        let ious = array![[0.5, 0.5], [0.5, 0.5]];
        assert_eq!(greedy_assignment(ious.view(), 0.3), vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn hungarian_maximizes_total_iou() {
        let ious = array![[0.5, 0.6], [0.0, 0.55]];
        let mut res = hungarian_assignment(ious.view(), 0.3).unwrap();
        res.sort();

        assert_eq!(res, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn hungarian_handles_rectangular_and_gated() {
        let ious = array![[0.8, 0.1, 0.0]];
        assert_eq!(hungarian_assignment(ious.view(), 0.3).unwrap(), vec![(0, 0)]);

        let ious = array![[0.1], [0.2]];
        assert!(hungarian_assignment(ious.view(), 0.3).unwrap().is_empty());

        let empty = Array2::<f32>::zeros((0, 3));
        assert!(hungarian_assignment(empty.view(), 0.3).unwrap().is_empty());
    }

    #[test]
    fn filters_classes_before_matching() {
        let mut store = TrackStore::new();
        let dets = vec![
            person(0.0, 0.0),
            Detection::new(BBox::ltrb(0.0, 0.0, 40.0, 100.0), "helmet", 0.9),
        ];

        let res = engine().update(&mut store, &dets);

        assert_eq!(res.spawned.len(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.iter().next().unwrap().class, "person");
    }

    #[test]
    fn empty_allow_list_tracks_everything() {
        let mut config = AssociationConfig::default();
        config.classes.clear();

        let mut store = TrackStore::new();
        let dets = vec![
            person(0.0, 0.0),
            Detection::new(BBox::ltrb(500.0, 0.0, 540.0, 100.0), "car", 0.9),
        ];
        AssociationEngine::new(config).update(&mut store, &dets);

        assert_eq!(store.len(), 2);
    }

    #[test]
    fn rejects_degenerate_detections() {
        let mut store = TrackStore::new();
        let dets = vec![
            Detection::new(BBox::ltrb(10.0, 10.0, 5.0, 50.0), "person", 0.9),
            person(100.0, 0.0),
        ];

        let res = engine().update(&mut store, &dets);

        assert_eq!(res.rejected.len(), 1);
        assert_eq!(res.rejected[0].0, 0);
        assert!(matches!(res.rejected[0].1, Error::InvalidBBox(..)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn keeps_identity_and_counts() {
        let mut store = TrackStore::new();
        let e = engine();

        let first = e.update(&mut store, &[person(0.0, 0.0)]);
        let id = first.spawned[0];

        for i in 1..5 {
            let res = e.update(&mut store, &[person(i as f32 * 5.0, 0.0)]);
            assert_eq!(res.matched, vec![(id, 0)]);
            assert!(res.spawned.is_empty());
        }

        let t = store.get(id).unwrap();
        assert_eq!((t.age, t.hits, t.misses), (4, 5, 0));
        assert!(t.confirmed);
    }

    #[test]
    fn empty_frames_age_tracks() {
        let mut store = TrackStore::new();
        let e = engine();
        let id = e.update(&mut store, &[person(0.0, 0.0)]).spawned[0];

        e.update(&mut store, &[]);
        e.update(&mut store, &[]);

        let t = store.get(id).unwrap();
        assert_eq!((t.age, t.hits, t.misses), (2, 0, 2));
    }

    #[test]
    fn constant_velocity_follows_fast_subject() {
        let mut config = AssociationConfig::default();
        config.prediction = Prediction::ConstantVelocity;
        let e = AssociationEngine::new(config);
        let mut store = TrackStore::new();

        // 30 px per frame on a 40 px wide box: last-known IoU is 10/70
        let id = e.update(&mut store, &[person(0.0, 0.0)]).spawned[0];
        let res = e.update(&mut store, &[person(20.0, 0.0)]);
        assert_eq!(res.matched, vec![(id, 0)]);

        for i in 2..6 {
            let res = e.update(&mut store, &[person(20.0 + (i - 1) as f32 * 30.0, 0.0)]);
            assert_eq!(res.matched, vec![(id, 0)], "frame {}", i);
        }
    }
}
