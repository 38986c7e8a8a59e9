use glam::{Affine3A, Vec3};
use std::fmt;

/// A closed interval, mostly used for time ranges inside [0, 1]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox1 {
    pub lower: f32,
    pub upper: f32,
}

impl BBox1 {
    pub fn new(lower: f32, upper: f32) -> Self {
        Self { lower, upper }
    }

    /// The whole animation time range [0, 1]
    pub fn unit() -> Self {
        Self::new(0.0, 1.0)
    }

    pub fn size(&self) -> f32 {
        self.upper - self.lower
    }
}

impl Default for BBox1 {
    fn default() -> Self {
        Self::unit()
    }
}

/// An axis aligned bounding box. The default box is empty and absorbs anything it is
/// unioned with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox3 {
    pub const EMPTY: Self = Self {
        min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self::EMPTY
    }

    /// True when the box contains no point, i.e. min > max along any axis
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    // Create a union BBox3 of two boxes that surrounds both of them
    pub fn union(self, other: BBox3) -> Self {
        BBox3::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn point_union(self, other: Vec3) -> Self {
        BBox3::new(self.min.min(other), self.max.max(other))
    }

    pub fn extend(&mut self, other: BBox3) {
        *self = self.union(other);
    }

    /// Twice the center, which is what the binners work with
    pub fn center2(&self) -> Vec3 {
        self.min + self.max
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Bounds of all eight corners after the affine transform
    pub fn transform(&self, space: &Affine3A) -> Self {
        if self.is_empty() {
            return *self;
        }

        (0..8).fold(BBox3::EMPTY, |b, corner| {
            let p = Vec3::new(
                if corner & 1 == 0 { self.min.x } else { self.max.x },
                if corner & 2 == 0 { self.min.y } else { self.max.y },
                if corner & 4 == 0 { self.min.z } else { self.max.z },
            );
            b.point_union(space.transform_point3(p))
        })
    }

    pub fn lerp(a: BBox3, b: BBox3, t: f32) -> Self {
        BBox3::new(a.min.lerp(b.min, t), a.max.lerp(b.max, t))
    }
}

impl Default for BBox3 {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for BBox3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[({}, {}, {}), ({}, {}, {})]",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}
