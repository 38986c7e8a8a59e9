use super::{BBox1, BBox3};
use crate::time::time_segment_range;
use std::fmt;

/// Bounds that move linearly over a time range: `bounds0` at its start and
/// `bounds1` at its end.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LBBox3 {
    pub bounds0: BBox3,
    pub bounds1: BBox3,
}

impl LBBox3 {
    pub fn new(bounds0: BBox3, bounds1: BBox3) -> Self {
        Self { bounds0, bounds1 }
    }

    /// Bounds that do not move
    pub fn constant(bounds: BBox3) -> Self {
        Self::new(bounds, bounds)
    }

    pub fn empty() -> Self {
        Self::constant(BBox3::EMPTY)
    }

    /// Conservative linear bounds over `time_range` of a primitive whose bounds are
    /// known at each of the `num_time_segments + 1` time steps.
    ///
    /// The end boxes are interpolated from the neighbouring steps and then grown until
    /// every time step strictly inside the range lies within the interpolated box.
    pub fn from_time_segments(
        time_range: BBox1,
        num_time_segments: f32,
        mut bounds_at: impl FnMut(usize) -> BBox3,
    ) -> Self {
        let lower = time_range.lower * num_time_segments;
        let upper = time_range.upper * num_time_segments;
        let (ilower, iupper) = time_segment_range(time_range, num_time_segments).into_inner();
        let (ilowerf, iupperf) = (ilower as f32, iupper as f32);
        let (ilower, iupper) = (ilower.max(0) as usize, iupper.max(0) as usize);

        if iupper <= ilower {
            return Self::constant(bounds_at(ilower));
        }

        let blower0 = bounds_at(ilower);
        let bupper1 = bounds_at(iupper);
        if iupper - ilower == 1 {
            return Self::new(
                BBox3::lerp(blower0, bupper1, lower - ilowerf),
                BBox3::lerp(bupper1, blower0, iupperf - upper),
            );
        }

        let blower1 = bounds_at(ilower + 1);
        let bupper0 = bounds_at(iupper - 1);
        let mut b0 = BBox3::lerp(blower0, blower1, lower - ilowerf);
        let mut b1 = BBox3::lerp(bupper1, bupper0, iupperf - upper);

        for i in ilower + 1..iupper {
            let f = (i as f32 / num_time_segments - time_range.lower) / time_range.size();
            let bt = BBox3::lerp(b0, b1, f);
            let bi = bounds_at(i);
            let dlower = (bi.min - bt.min).min(glam::Vec3::ZERO);
            let dupper = (bi.max - bt.max).max(glam::Vec3::ZERO);
            b0.min += dlower;
            b1.min += dlower;
            b0.max += dupper;
            b1.max += dupper;
        }

        Self::new(b0, b1)
    }

    pub fn interpolate(&self, t: f32) -> BBox3 {
        BBox3::lerp(self.bounds0, self.bounds1, t)
    }

    /// Static bounds over the whole time range
    pub fn bounds(&self) -> BBox3 {
        self.bounds0.union(self.bounds1)
    }

    pub fn is_empty(&self) -> bool {
        self.bounds0.is_empty() || self.bounds1.is_empty()
    }

    pub fn extend(&mut self, other: LBBox3) {
        self.bounds0.extend(other.bounds0);
        self.bounds1.extend(other.bounds1);
    }
}

impl fmt::Display for LBBox3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ bounds0 = {}, bounds1 = {} }}", self.bounds0, self.bounds1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn cube_at(x: f32) -> BBox3 {
        BBox3::new(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0))
    }

    #[test]
    fn interpolate_midpoint() {
        let lb = LBBox3::new(cube_at(0.0), cube_at(2.0));
        assert_eq!(lb.interpolate(0.5), cube_at(1.0));
        assert_eq!(lb.bounds(), cube_at(0.0).union(cube_at(2.0)));
    }

    #[test]
    fn single_segment_is_exact() {
        let lb = LBBox3::from_time_segments(BBox1::unit(), 1.0, |i| cube_at(i as f32));
        assert_eq!(lb, LBBox3::new(cube_at(0.0), cube_at(1.0)));
    }

    #[test]
    fn linear_motion_needs_no_growth() {
        let lb = LBBox3::from_time_segments(BBox1::unit(), 4.0, |i| cube_at(i as f32));
        assert_eq!(lb, LBBox3::new(cube_at(0.0), cube_at(4.0)));
    }

    #[test]
    fn interior_steps_are_contained() {
        // Moves out to x = 3 at the middle step and comes back
        let steps = [0.0, 3.0, 0.0];
        let lb = LBBox3::from_time_segments(BBox1::unit(), 2.0, |i| cube_at(steps[i]));
        let mid = lb.interpolate(0.5);
        assert!(mid.min.x <= 3.0 && mid.max.x >= 4.0);
        assert!(lb.bounds0.min.x <= 0.0 && lb.bounds1.min.x <= 0.0);
    }

    #[test]
    fn sub_range_interpolates_ends() {
        let lb = LBBox3::from_time_segments(BBox1::new(0.25, 0.75), 1.0, |i| {
            cube_at(4.0 * i as f32)
        });
        assert_eq!(lb.bounds0, cube_at(1.0));
        assert_eq!(lb.bounds1, cube_at(3.0));
    }
}
