//! Primitive references for building acceleration structures over moving geometry.
//!
//! Builders create millions of these per build, bin them by [`PrimRefMB::bin_center`]
//! and partition them, then throw them away once the structure is finished.

use crate::{
    bounds::{BBox1, BBox3, LBBox3},
    Result,
};
use glam::{Affine3A, Vec3};
use std::{cmp::Ordering, fmt};

/// Bounds representation a primitive reference stores for binning.
pub trait BinBounds: Copy + fmt::Debug + fmt::Display {
    fn from_linear(lbounds: &LBBox3) -> Self;

    /// Twice the centroid used to assign the reference to a bin
    fn bin_center(&self) -> Vec3;
}

/// Compact mode: the bounds at the middle of the time range
impl BinBounds for BBox3 {
    fn from_linear(lbounds: &LBBox3) -> Self {
        lbounds.interpolate(0.5)
    }

    fn bin_center(&self) -> Vec3 {
        self.center2()
    }
}

/// Precise mode: the full linear bounds
impl BinBounds for LBBox3 {
    fn from_linear(lbounds: &LBBox3) -> Self {
        *lbounds
    }

    fn bin_center(&self) -> Vec3 {
        self.interpolate(0.5).center2()
    }
}

#[cfg(not(feature = "lbbox-binning"))]
pub type DefaultBinBounds = BBox3;
#[cfg(feature = "lbbox-binning")]
pub type DefaultBinBounds = LBBox3;

/// Gives access to the exact time-varying bounds of a primitive, for primitive kinds
/// whose motion the stored bounds only approximate.
pub trait GeometryLookup {
    fn linear_bounds(
        &self,
        geom_id: u32,
        space: &Affine3A,
        prim_id: u32,
        time_range: BBox1,
    ) -> Result<LBBox3>;
}

/// A motion blur primitive reference: bounds of the primitive, its IDs and how many
/// time segments it spans.
#[derive(Clone, Copy, Debug)]
pub struct PrimRefMB<B = DefaultBinBounds> {
    bounds: B,
    geom_id: u32,
    prim_id: u32,
    active_time_segments: u32,
    total_time_segments: u32,
}

impl<B: BinBounds> PrimRefMB<B> {
    pub fn new(
        lbounds: &LBBox3,
        active_time_segments: u32,
        total_time_segments: u32,
        geom_id: u32,
        prim_id: u32,
    ) -> Self {
        debug_assert!(active_time_segments > 0);
        Self {
            bounds: B::from_linear(lbounds),
            geom_id,
            prim_id,
            active_time_segments,
            total_time_segments,
        }
    }

    /// Stores a flat 64 bit identifier, low half in the geometry slot and high half in
    /// the primitive slot.
    pub fn with_id(
        lbounds: &LBBox3,
        active_time_segments: u32,
        total_time_segments: u32,
        id: u64,
    ) -> Self {
        Self::new(
            lbounds,
            active_time_segments,
            total_time_segments,
            id as u32,
            (id >> 32) as u32,
        )
    }

    /// Bounds used for binning. In compact mode these can be looser than the true
    /// motion bounds.
    pub fn bounds(&self) -> B {
        self.bounds
    }

    /// Number of time segments the primitive is active in
    pub fn size(&self) -> u32 {
        self.active_time_segments
    }

    pub fn total_time_segments(&self) -> u32 {
        self.total_time_segments
    }

    pub fn bin_center(&self) -> Vec3 {
        self.bounds.bin_center()
    }

    pub fn bin_bounds_and_center(&self) -> (B, Vec3) {
        (self.bounds, self.bin_center())
    }

    /// Recomputes the exact linear bounds of the primitive over `time_range` in
    /// `space` and returns the bin center derived from them.
    pub fn bin_center_in(
        &self,
        space: &Affine3A,
        geometries: &(impl GeometryLookup + ?Sized),
        time_range: BBox1,
    ) -> Result<Vec3> {
        self.bin_bounds_and_center_in(space, geometries, time_range)
            .map(|(_, center)| center)
    }

    pub fn bin_bounds_and_center_in(
        &self,
        space: &Affine3A,
        geometries: &(impl GeometryLookup + ?Sized),
        time_range: BBox1,
    ) -> Result<(B, Vec3)> {
        let lbounds = geometries.linear_bounds(self.geom_id, space, self.prim_id, time_range)?;
        Ok((B::from_linear(&lbounds), lbounds.interpolate(0.5).center2()))
    }

    pub fn geom_id(&self) -> u32 {
        self.geom_id
    }

    pub fn prim_id(&self) -> u32 {
        self.prim_id
    }

    /// The flat identifier given to [`PrimRefMB::with_id`]
    pub fn id(&self) -> u64 {
        u64::from(self.geom_id) | (u64::from(self.prim_id) << 32)
    }

    /// Sort key, primitive ID first
    pub fn id64(&self) -> u64 {
        (u64::from(self.prim_id) << 32) | u64::from(self.geom_id)
    }
}

// References compare by ID only, bounds play no part in the order.
impl<B: BinBounds> PartialEq for PrimRefMB<B> {
    fn eq(&self, other: &Self) -> bool {
        self.id64() == other.id64()
    }
}

impl<B: BinBounds> Eq for PrimRefMB<B> {}

impl<B: BinBounds> PartialOrd for PrimRefMB<B> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<B: BinBounds> Ord for PrimRefMB<B> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id64().cmp(&other.id64())
    }
}

impl<B: BinBounds> fmt::Display for PrimRefMB<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ bounds = {}, geomID = {}, primID = {} }}",
            self.bounds, self.geom_id, self.prim_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256Plus;

    fn moving_cube() -> LBBox3 {
        LBBox3::new(
            BBox3::new(Vec3::ZERO, Vec3::ONE),
            BBox3::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 1.0, 1.0)),
        )
    }

    struct OneGeometry {
        lbounds: LBBox3,
    }

    impl GeometryLookup for OneGeometry {
        fn linear_bounds(
            &self,
            geom_id: u32,
            space: &Affine3A,
            _prim_id: u32,
            _time_range: BBox1,
        ) -> Result<LBBox3> {
            if geom_id != 0 {
                return Err(Error::InvalidArgument(format!("no geometry {}", geom_id)));
            }
            Ok(LBBox3::new(
                self.lbounds.bounds0.transform(space),
                self.lbounds.bounds1.transform(space),
            ))
        }
    }

    #[test]
    fn compact_mode_bins_the_middle() {
        let prim = PrimRefMB::<BBox3>::new(&moving_cube(), 2, 4, 7, 9);
        let mid = BBox3::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert_eq!(prim.bounds(), mid);
        assert_eq!(prim.bin_center(), mid.center2());
        assert_eq!(prim.size(), 2);
        assert_eq!(prim.total_time_segments(), 4);
    }

    #[test]
    fn precise_mode_keeps_linear_bounds() {
        let prim = PrimRefMB::<LBBox3>::new(&moving_cube(), 1, 1, 0, 0);
        assert_eq!(prim.bounds(), moving_cube());
        assert_eq!(prim.bin_center(), Vec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn exact_bounds_come_from_the_geometry() {
        let geometries = OneGeometry {
            lbounds: moving_cube(),
        };
        let space = Affine3A::from_translation(Vec3::new(0.0, 10.0, 0.0));
        let prim = PrimRefMB::<BBox3>::new(&LBBox3::empty(), 1, 1, 0, 5);

        let (bounds, center) = prim
            .bin_bounds_and_center_in(&space, &geometries, BBox1::unit())
            .unwrap();
        assert_eq!(bounds.min, Vec3::new(1.0, 10.0, 0.0));
        assert_eq!(center, bounds.center2());

        let missing = PrimRefMB::<BBox3>::new(&LBBox3::empty(), 1, 1, 3, 5);
        let err = missing
            .bin_center_in(&space, &geometries, BBox1::unit())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn display_names_ids() {
        let prim = PrimRefMB::<BBox3>::new(&moving_cube(), 1, 1, 3, 4);
        let text = prim.to_string();
        assert!(text.ends_with("geomID = 3, primID = 4 }"), "{}", text);
    }

    #[test]
    fn random_sort_is_deterministic() {
        let mut rng = Xoshiro256Plus::seed_from_u64(17);
        let prims: Vec<PrimRefMB<BBox3>> = (0..1000)
            .map(|_| {
                // Small ID ranges so that ties on the primitive ID are common
                let geom_id = rng.gen_range(0, 8);
                let prim_id = rng.gen_range(0, 64);
                PrimRefMB::new(&moving_cube(), 1, 1, geom_id, prim_id)
            })
            .collect();

        let mut sorted = prims.clone();
        sorted.sort();
        let mut again = prims.iter().rev().cloned().collect::<Vec<_>>();
        again.sort_unstable();

        let keys = |v: &[PrimRefMB<BBox3>]| {
            v.iter()
                .map(|p| (p.prim_id(), p.geom_id()))
                .collect::<Vec<_>>()
        };
        let mut expected = keys(&prims);
        expected.sort();
        assert_eq!(keys(&sorted), expected);
        assert_eq!(keys(&again), expected);
    }

    proptest! {
        #[test]
        fn ids_round_trip(geom_id in any::<u32>(), prim_id in any::<u32>()) {
            let prim = PrimRefMB::<BBox3>::new(&moving_cube(), 1, 1, geom_id, prim_id);
            prop_assert_eq!(prim.geom_id(), geom_id);
            prop_assert_eq!(prim.prim_id(), prim_id);
        }

        #[test]
        fn flat_id_round_trips(id in any::<u64>()) {
            let prim = PrimRefMB::<LBBox3>::with_id(&moving_cube(), 1, 1, id);
            prop_assert_eq!(prim.id(), id);
        }

        #[test]
        fn order_is_prim_then_geom(a in any::<(u32, u32)>(), b in any::<(u32, u32)>()) {
            let pa = PrimRefMB::<BBox3>::new(&moving_cube(), 1, 1, a.0, a.1);
            let pb = PrimRefMB::<BBox3>::new(&moving_cube(), 1, 1, b.0, b.1);
            prop_assert_eq!(pa < pb, (a.1, a.0) < (b.1, b.0));
        }
    }
}
