use bitflags::bitflags;
use glam::Vec3;

/// Marks an unset geometry, primitive or instance ID in a hit record
pub const INVALID_ID: u32 = u32::MAX;

/// The ray data type
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub org: Vec3,
    pub tnear: f32,
    pub dir: Vec3,
    pub time: f32,
    /// Far end of the ray. Occlusion queries set it to -inf on a hit.
    pub tfar: f32,
    pub mask: u32,
    pub id: u32,
    pub flags: u32,
}

impl Ray {
    pub fn new(org: Vec3, dir: Vec3) -> Self {
        Self {
            org,
            tnear: 0.0,
            dir,
            time: 0.0,
            tfar: f32::INFINITY,
            mask: u32::MAX,
            id: 0,
            flags: 0,
        }
    }

    /// Marks the ray as blocked, the way occlusion queries report a hit
    pub fn set_occluded(&mut self) {
        self.tfar = f32::NEG_INFINITY;
    }

    pub fn is_occluded(&self) -> bool {
        self.tfar < 0.0
    }
}

impl Default for Ray {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Z)
    }
}

/// Closest hit found so far for a ray
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub ng: Vec3,
    pub u: f32,
    pub v: f32,
    pub prim_id: u32,
    pub geom_id: u32,
    pub inst_id: u32,
}

impl Default for Hit {
    fn default() -> Self {
        Self {
            ng: Vec3::ZERO,
            u: 0.0,
            v: 0.0,
            prim_id: INVALID_ID,
            geom_id: INVALID_ID,
            inst_id: INVALID_ID,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayHit {
    pub ray: Ray,
    pub hit: Hit,
}

impl RayHit {
    pub fn new(ray: Ray) -> Self {
        Self {
            ray,
            hit: Hit::default(),
        }
    }
}

/// A packet of `K` rays stored lane by lane
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayK<const K: usize> {
    pub org_x: [f32; K],
    pub org_y: [f32; K],
    pub org_z: [f32; K],
    pub tnear: [f32; K],
    pub dir_x: [f32; K],
    pub dir_y: [f32; K],
    pub dir_z: [f32; K],
    pub time: [f32; K],
    pub tfar: [f32; K],
    pub mask: [u32; K],
    pub id: [u32; K],
    pub flags: [u32; K],
}

impl<const K: usize> RayK<K> {
    pub fn splat(ray: &Ray) -> Self {
        Self {
            org_x: [ray.org.x; K],
            org_y: [ray.org.y; K],
            org_z: [ray.org.z; K],
            tnear: [ray.tnear; K],
            dir_x: [ray.dir.x; K],
            dir_y: [ray.dir.y; K],
            dir_z: [ray.dir.z; K],
            time: [ray.time; K],
            tfar: [ray.tfar; K],
            mask: [ray.mask; K],
            id: [ray.id; K],
            flags: [ray.flags; K],
        }
    }

    pub fn get(&self, lane: usize) -> Ray {
        Ray {
            org: Vec3::new(self.org_x[lane], self.org_y[lane], self.org_z[lane]),
            tnear: self.tnear[lane],
            dir: Vec3::new(self.dir_x[lane], self.dir_y[lane], self.dir_z[lane]),
            time: self.time[lane],
            tfar: self.tfar[lane],
            mask: self.mask[lane],
            id: self.id[lane],
            flags: self.flags[lane],
        }
    }

    pub fn set(&mut self, lane: usize, ray: &Ray) {
        self.org_x[lane] = ray.org.x;
        self.org_y[lane] = ray.org.y;
        self.org_z[lane] = ray.org.z;
        self.tnear[lane] = ray.tnear;
        self.dir_x[lane] = ray.dir.x;
        self.dir_y[lane] = ray.dir.y;
        self.dir_z[lane] = ray.dir.z;
        self.time[lane] = ray.time;
        self.tfar[lane] = ray.tfar;
        self.mask[lane] = ray.mask;
        self.id[lane] = ray.id;
        self.flags[lane] = ray.flags;
    }
}

impl<const K: usize> Default for RayK<K> {
    fn default() -> Self {
        Self::splat(&Ray::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitK<const K: usize> {
    pub ng_x: [f32; K],
    pub ng_y: [f32; K],
    pub ng_z: [f32; K],
    pub u: [f32; K],
    pub v: [f32; K],
    pub prim_id: [u32; K],
    pub geom_id: [u32; K],
    pub inst_id: [u32; K],
}

impl<const K: usize> HitK<K> {
    pub fn get(&self, lane: usize) -> Hit {
        Hit {
            ng: Vec3::new(self.ng_x[lane], self.ng_y[lane], self.ng_z[lane]),
            u: self.u[lane],
            v: self.v[lane],
            prim_id: self.prim_id[lane],
            geom_id: self.geom_id[lane],
            inst_id: self.inst_id[lane],
        }
    }

    pub fn set(&mut self, lane: usize, hit: &Hit) {
        self.ng_x[lane] = hit.ng.x;
        self.ng_y[lane] = hit.ng.y;
        self.ng_z[lane] = hit.ng.z;
        self.u[lane] = hit.u;
        self.v[lane] = hit.v;
        self.prim_id[lane] = hit.prim_id;
        self.geom_id[lane] = hit.geom_id;
        self.inst_id[lane] = hit.inst_id;
    }
}

impl<const K: usize> Default for HitK<K> {
    fn default() -> Self {
        Self {
            ng_x: [0.0; K],
            ng_y: [0.0; K],
            ng_z: [0.0; K],
            u: [0.0; K],
            v: [0.0; K],
            prim_id: [INVALID_ID; K],
            geom_id: [INVALID_ID; K],
            inst_id: [INVALID_ID; K],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayHitK<const K: usize> {
    pub ray: RayK<K>,
    pub hit: HitK<K>,
}

impl<const K: usize> RayHitK<K> {
    pub fn splat(ray: &Ray) -> Self {
        Self {
            ray: RayK::splat(ray),
            hit: HitK::default(),
        }
    }

    pub fn get(&self, lane: usize) -> RayHit {
        RayHit {
            ray: self.ray.get(lane),
            hit: self.hit.get(lane),
        }
    }

    pub fn set(&mut self, lane: usize, rayhit: &RayHit) {
        self.ray.set(lane, &rayhit.ray);
        self.hit.set(lane, &rayhit.hit);
    }
}

pub type Ray4 = RayK<4>;
pub type Ray8 = RayK<8>;
pub type Ray16 = RayK<16>;
pub type RayHit4 = RayHitK<4>;
pub type RayHit8 = RayHitK<8>;
pub type RayHit16 = RayHitK<16>;

/// True while at least one lane is both active and not yet blocked
pub fn any_unoccluded(valid: &[bool], tfar: &[f32]) -> bool {
    valid.iter().zip(tfar).any(|(&v, &t)| v && t >= 0.0)
}

bitflags! {
    /// Hints passed along with every query
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct IntersectFlags: u32 {
        /// Rays of the query are spatially coherent
        const COHERENT = 0b0000_0001;
    }
}

/// Per-query state handed through the acceleration structures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntersectContext {
    pub flags: IntersectFlags,
    /// Instance currently being traversed, or [`INVALID_ID`] at the top level
    pub inst_id: u32,
}

impl Default for IntersectContext {
    fn default() -> Self {
        Self {
            flags: IntersectFlags::empty(),
            inst_id: INVALID_ID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn lanes_round_trip() {
        let mut packet = RayHit8::default();
        let mut rayhit = RayHit::new(Ray::new(vec3(1.0, 2.0, 3.0), vec3(0.0, 1.0, 0.0)));
        rayhit.ray.tfar = 7.0;
        rayhit.hit.geom_id = 3;

        packet.set(5, &rayhit);
        assert_eq!(packet.get(5), rayhit);
        assert_eq!(packet.get(4), RayHit::default());
    }

    #[test]
    fn occlusion_sentinel() {
        let mut ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(!ray.is_occluded());
        ray.set_occluded();
        assert!(ray.is_occluded());
    }

    #[test]
    fn unoccluded_lanes_respect_mask() {
        let tfar = [f32::NEG_INFINITY, 1.0, f32::NEG_INFINITY, 3.0];
        assert!(any_unoccluded(&[true, true, false, false], &tfar));
        assert!(!any_unoccluded(&[true, false, true, false], &tfar));
        assert!(!any_unoccluded(&[false; 4], &tfar));
    }
}
