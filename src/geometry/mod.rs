//! Geometries: named collections of primitives with an enable/modify/commit lifecycle.
//!
//! Every kind implements [`Geometry`] on top of a shared [`GeometryBase`]. Operations a
//! kind does not support keep their default, which fails with
//! [`Error::InvalidOperation`].

mod base;
mod callbacks;
mod instance;
mod user;

pub use base::*;
pub use callbacks::*;
pub use instance::*;
pub use user::*;

use crate::{
    bounds::{BBox1, LBBox3},
    config::BuildQuality,
    scene::{Scene, SceneState},
    Error, Result,
};
use bitflags::bitflags;
use glam::Affine3A;
use std::sync::{Arc, RwLock};

/// A geometry shared between the application and the scene it is attached to
pub type GeometryRef = Arc<RwLock<dyn Geometry>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GeometryType {
    TriangleMesh = 1,
    QuadMesh = 2,
    BezierCurves = 4,
    LineSegments = 8,
    SubdivMesh = 16,
    UserGeometry = 32,
    Instance = 64,
    Group = 128,
}

impl GeometryType {
    pub const COUNT: usize = 8;

    pub fn mask(self) -> GeometryTypeMask {
        GeometryTypeMask::from_bits_truncate(self as u32)
    }
}

bitflags! {
    /// A set of geometry kinds
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct GeometryTypeMask: u32 {
        const TRIANGLE_MESH = 1;
        const QUAD_MESH = 2;
        const BEZIER_CURVES = 4;
        const LINE_SEGMENTS = 8;
        const SUBDIV_MESH = 16;
        const USER_GEOMETRY = 32;
        const INSTANCE = 64;
        const GROUP = 128;
    }
}

/// Kinds that never run filter functions themselves
const NO_FILTER_TYPES: GeometryTypeMask = GeometryTypeMask::INSTANCE.union(GeometryTypeMask::GROUP);

pub trait Geometry: Send + Sync {
    fn base(&self) -> &GeometryBase;

    fn base_mut(&mut self) -> &mut GeometryBase;

    /// Called when the geometry becomes active in its scene, i.e. it is enabled while
    /// attached.
    fn enabling(&mut self) {}

    /// Called when the geometry stops being active in its scene
    fn disabling(&mut self) {}

    fn attach(&mut self, scene: &Arc<SceneState>, geom_id: u32) -> Result<()> {
        self.base_mut().bind(scene, geom_id)?;
        if self.base().is_enabled() {
            self.base().update_intersection_filters(true);
            self.enabling();
        }
        self.update();

        Ok(())
    }

    /// Unbinds the geometry from its scene. Does nothing when already detached.
    fn detach(&mut self) {
        let scene = match self.base().scene() {
            Some(scene) => scene.clone(),
            None => return,
        };

        if self.base().is_enabled() {
            self.base().update_intersection_filters(false);
            self.disabling();
        }
        scene.set_modified();
        self.base_mut().unbind();
    }

    fn enable(&mut self) {
        if self.base().is_enabled() {
            return;
        }

        let base = self.base_mut();
        base.inc_used();
        base.set_enabled(true);
        if base.is_attached() {
            base.update_intersection_filters(true);
            self.enabling();
        }
        self.update();
    }

    /// Takes the geometry out of subsequent builds. Its data stays as it is.
    fn disable(&mut self) {
        if self.base().is_disabled() {
            return;
        }

        if self.base().is_attached() {
            self.base().update_intersection_filters(false);
            self.disabling();
        }
        let base = self.base_mut();
        base.dec_used();
        base.set_enabled(false);
        self.update();
    }

    /// Marks the structures built over this geometry as out of date
    fn update(&mut self) {
        self.base_mut().mark_modified();
    }

    fn verify(&self) -> bool {
        true
    }

    /// Kind specific work done on commit
    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.verify() {
            return Err(Error::InvalidOperation("invalid geometry specified".into()));
        }

        self.finalize()?;
        self.base_mut().set_state(State::Committed);
        Ok(())
    }

    /// Runs right before the acceleration structures over this geometry are built
    fn pre_commit(&mut self) {}

    /// Runs right after the acceleration structures over this geometry are built
    fn post_commit(&mut self) {}

    fn set_num_primitives(&mut self, num_primitives: u32) -> Result<()> {
        self.base_mut().set_num_primitives(num_primitives);
        self.update();
        Ok(())
    }

    fn set_num_time_steps(&mut self, num_time_steps: u32) -> Result<()> {
        self.base_mut().set_num_time_steps(num_time_steps)?;
        self.update();
        Ok(())
    }

    fn set_build_quality(&mut self, quality: BuildQuality) {
        self.base_mut().set_build_quality(quality);
        self.update();
    }

    fn set_user_data(&mut self, user_data: Option<UserData>) {
        self.base_mut().set_user_data(user_data);
    }

    fn set_intersection_filter_function(&mut self, filter: Option<FilterFunction>) -> Result<()> {
        if self.base().geometry_type().mask().intersects(NO_FILTER_TYPES) {
            return Err(Error::not_supported());
        }

        self.base_mut().replace_intersection_filter(filter);
        Ok(())
    }

    fn set_occlusion_filter_function(&mut self, filter: Option<FilterFunction>) -> Result<()> {
        if self.base().geometry_type().mask().intersects(NO_FILTER_TYPES) {
            return Err(Error::not_supported());
        }

        self.base_mut().replace_occlusion_filter(filter);
        Ok(())
    }

    fn has_intersection_filter(&self) -> bool {
        self.base().has_intersection_filter()
    }

    fn has_occlusion_filter(&self) -> bool {
        self.base().has_occlusion_filter()
    }

    fn set_mask(&mut self, _mask: u32) -> Result<()> {
        Err(Error::not_supported())
    }

    fn set_vertex_attribute_count(&mut self, _count: u32) -> Result<()> {
        Err(Error::not_supported())
    }

    fn set_topology_count(&mut self, _count: u32) -> Result<()> {
        Err(Error::not_supported())
    }

    fn set_tessellation_rate(&mut self, _rate: f32) -> Result<()> {
        Err(Error::not_supported())
    }

    fn set_subdivision_mode(&mut self, _topology_id: u32, _mode: SubdivisionMode) -> Result<()> {
        Err(Error::not_supported())
    }

    fn set_vertex_attribute_topology(
        &mut self,
        _vertex_buffer_slot: u32,
        _index_buffer_slot: u32,
    ) -> Result<()> {
        Err(Error::not_supported())
    }

    fn set_displacement_function(
        &mut self,
        _displacement: Option<DisplacementFunction>,
    ) -> Result<()> {
        Err(Error::not_supported())
    }

    fn set_instanced_scene(&mut self, _scene: Arc<Scene>) -> Result<()> {
        Err(Error::not_supported())
    }

    fn set_transform(&mut self, _transform: Affine3A, _time_step: u32) -> Result<()> {
        Err(Error::not_supported())
    }

    fn get_transform(&self, _time: f32) -> Result<Affine3A> {
        Err(Error::not_supported())
    }

    fn set_bounds_function(&mut self, _bounds: Option<BoundsFunction>) -> Result<()> {
        Err(Error::not_supported())
    }

    fn set_intersect_function(&mut self, _intersect: Option<IntersectFunction>) -> Result<()> {
        Err(Error::not_supported())
    }

    fn set_occluded_function(&mut self, _occluded: Option<OccludedFunction>) -> Result<()> {
        Err(Error::not_supported())
    }

    fn interpolate(&self, _args: &mut InterpolateArgs<'_>) -> Result<()> {
        Err(Error::not_supported())
    }

    /// Interpolates lane by lane through [`Geometry::interpolate`]
    fn interpolate_n(&self, args: &mut InterpolateNArgs<'_>) -> Result<()> {
        let lanes = args.valid.len();
        let value_count = args.value_count;
        if args.prim_ids.len() < lanes || args.u.len() < lanes || args.v.len() < lanes {
            return Err(Error::InvalidArgument(format!(
                "interpolation inputs shorter than {} lanes",
                lanes
            )));
        }
        if args.p.len() < lanes * value_count {
            return Err(Error::InvalidArgument("interpolation output too small".into()));
        }

        for (i, &valid) in args.valid.iter().enumerate() {
            if !valid {
                continue;
            }

            let p = &mut args.p[i * value_count..(i + 1) * value_count];
            self.interpolate(&mut InterpolateArgs {
                prim_id: args.prim_ids[i],
                u: args.u[i],
                v: args.v[i],
                slot: args.slot,
                p,
            })?;
        }

        Ok(())
    }

    /// Linear bounds of one primitive over `time_range`, transformed by `space`
    fn linear_bounds(
        &self,
        _space: &Affine3A,
        _prim_id: u32,
        _time_range: BBox1,
    ) -> Result<LBBox3> {
        Err(Error::not_supported())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Device, ErrorKind};

    /// A kind that only has what every geometry has
    struct Bare {
        base: GeometryBase,
    }

    impl Geometry for Bare {
        fn base(&self) -> &GeometryBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut GeometryBase {
            &mut self.base
        }
    }

    fn bare(ty: GeometryType) -> Bare {
        let device = Device::new(Config::default());
        Bare {
            base: GeometryBase::new(&device, ty, 10, 3),
        }
    }

    #[test]
    fn time_segments_follow_steps() {
        let mut g = bare(GeometryType::TriangleMesh);
        assert_eq!(g.base().num_time_segments(), 2);
        assert_eq!(g.base().fnum_time_segments(), 2.0);

        g.set_num_time_steps(1).unwrap();
        assert_eq!(g.base().num_time_segments(), 0);

        let err = g.set_num_time_steps(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = g.set_num_time_steps(130).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(g.base().num_time_steps(), 1);
    }

    #[test]
    fn unsupported_by_default() {
        let mut g = bare(GeometryType::TriangleMesh);
        let results = [
            g.set_vertex_attribute_count(2),
            g.set_topology_count(1),
            g.set_tessellation_rate(4.0),
            g.set_mask(1),
            g.set_displacement_function(None),
            g.set_transform(Affine3A::IDENTITY, 0),
            g.set_bounds_function(None),
            g.set_intersect_function(None),
            g.set_occluded_function(None),
            g.get_transform(0.5).map(|_| ()),
            g.linear_bounds(&Affine3A::IDENTITY, 0, BBox1::unit()).map(|_| ()),
        ];
        for result in results {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidOperation);
        }
    }

    #[test]
    fn interpolate_n_skips_inactive_lanes() {
        let g = bare(GeometryType::TriangleMesh);
        let mut p = [0.0; 4];
        let mut args = InterpolateNArgs {
            valid: &[false, false],
            prim_ids: &[0, 1],
            u: &[0.0, 0.0],
            v: &[0.0, 0.0],
            slot: 0,
            value_count: 2,
            p: &mut p,
        };
        assert!(g.interpolate_n(&mut args).is_ok());

        args.valid = &[false, true];
        assert_eq!(
            g.interpolate_n(&mut args).unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );
    }

    #[test]
    fn interpolate_n_checks_lengths() {
        let g = bare(GeometryType::TriangleMesh);
        let mut p = [0.0; 4];
        let mut args = InterpolateNArgs {
            valid: &[false, false, false],
            prim_ids: &[0, 1, 2],
            u: &[0.0, 0.0],
            v: &[0.0, 0.0, 0.0],
            slot: 0,
            value_count: 1,
            p: &mut p,
        };
        assert_eq!(
            g.interpolate_n(&mut args).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        args.u = &[0.0, 0.0, 0.0];
        args.value_count = 2;
        assert_eq!(
            g.interpolate_n(&mut args).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        args.value_count = 1;
        assert!(g.interpolate_n(&mut args).is_ok());
    }

    #[test]
    fn filters_are_optional() {
        let mut g = bare(GeometryType::BezierCurves);
        assert!(!g.has_intersection_filter());
        assert!(!g.has_occlusion_filter());

        let filter: FilterFunction = Arc::new(|args: &mut FilterArgs<'_>| args.valid.fill(false));
        g.set_intersection_filter_function(Some(filter.clone())).unwrap();
        assert!(g.has_intersection_filter());
        assert!(!g.has_occlusion_filter());

        g.set_intersection_filter_function(None).unwrap();
        assert!(!g.has_intersection_filter());

        let mut group = bare(GeometryType::Group);
        let err = group.set_occlusion_filter_function(Some(filter)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn commit_and_update_drive_state() {
        let mut g = bare(GeometryType::QuadMesh);
        assert_eq!(g.base().state(), State::Modified);

        g.commit().unwrap();
        assert_eq!(g.base().state(), State::Committed);
        assert!(g.base().is_modified());

        g.set_build_quality(BuildQuality::High);
        assert_eq!(g.base().state(), State::Modified);
        assert_eq!(g.base().build_quality(), BuildQuality::High);
    }

    #[test]
    fn enable_disable_count_usage() {
        let mut g = bare(GeometryType::TriangleMesh);
        assert!(g.base().is_enabled());
        assert!(g.base().is_used());
        assert!(!g.base().is_instanced());

        g.disable();
        g.disable();
        assert!(g.base().is_disabled());
        assert!(!g.base().is_used());

        g.base().inc_used();
        assert!(g.base().is_instanced());

        g.enable();
        assert!(g.base().is_instanced());
        g.base().dec_used();
        assert!(!g.base().is_instanced());
        assert!(g.base().is_used());
    }
}
