use nalgebra as na;

/// Segments shorter than this have no meaningful heading.
pub const MIN_SEGMENT_LEN: f32 = 1e-3;

/// Heading of the segment `from -> to` in degrees, `(-180, 180]`.
/// `None` for a zero-length segment.
#[inline]
pub fn bearing(from: &na::Point2<f32>, to: &na::Point2<f32>) -> Option<f32> {
    let d = to - from;

    if d.norm() < MIN_SEGMENT_LEN {
        None
    } else {
        Some(d.y.atan2(d.x).to_degrees())
    }
}

/// Smallest absolute difference between two headings, `[0, 180]`.
#[inline]
pub fn angle_delta(a: f32, b: f32) -> f32 {
    let d = (a - b).abs() % 360.0;

    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}
