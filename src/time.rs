//! Mapping of continuous time onto the piecewise linear time segments of a geometry.
//!
//! A geometry with `n` time steps has `n - 1` segments evenly covering [0, 1].

use crate::bounds::BBox1;
use glam::{IVec4, Vec4};
use itertools::izip;
use std::ops::RangeInclusive;

/// Lane types the segment lookup is defined for. Every implementation uses the same
/// formula, lane-wise.
pub trait SegmentTime: Copy {
    type Index;

    /// Returns the segment index and the fractional time inside that segment.
    fn time_segment(self, num_time_segments: Self) -> (Self::Index, Self);
}

impl SegmentTime for f32 {
    type Index = i32;

    fn time_segment(self, num_time_segments: f32) -> (i32, f32) {
        let time_scaled = self * num_time_segments;
        // upper bound first, a static geometry has no segment and lands on 0
        let itime = time_scaled.floor().min(num_time_segments - 1.0).max(0.0);
        (itime as i32, time_scaled - itime)
    }
}

impl SegmentTime for Vec4 {
    type Index = IVec4;

    fn time_segment(self, num_time_segments: Vec4) -> (IVec4, Vec4) {
        let time_scaled = self * num_time_segments;
        let itime = time_scaled
            .floor()
            .min(num_time_segments - Vec4::ONE)
            .max(Vec4::ZERO);
        (itime.as_ivec4(), time_scaled - itime)
    }
}

impl<const K: usize> SegmentTime for [f32; K] {
    type Index = [i32; K];

    fn time_segment(self, num_time_segments: [f32; K]) -> ([i32; K], [f32; K]) {
        let mut itime = [0; K];
        let mut ftime = [0.0; K];
        for (i, f, &t, &n) in izip!(&mut itime, &mut ftime, &self, &num_time_segments) {
            let (segment, fraction) = t.time_segment(n);
            *i = segment;
            *f = fraction;
        }

        (itime, ftime)
    }
}

/// Segment index and fractional time of `time` for a geometry with
/// `num_time_segments` segments.
pub fn time_segment<T: SegmentTime>(time: T, num_time_segments: T) -> (T::Index, T) {
    time.time_segment(num_time_segments)
}

/// Inclusive range of time step indices whose segments overlap `time_range`.
///
/// Not clamped: callers intersect the result with `0..=num_time_segments` themselves.
pub fn time_segment_range(time_range: BBox1, num_time_segments: f32) -> RangeInclusive<i32> {
    let lower = (time_range.lower * num_time_segments).floor() as i32;
    let upper = (time_range.upper * num_time_segments).ceil() as i32;
    lower..=upper
}
