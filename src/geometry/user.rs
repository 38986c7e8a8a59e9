use super::{
    BoundsFunction, Geometry, GeometryBase, GeometryType, IntersectFunction, OccludedFunction,
};
use crate::{
    bounds::{BBox1, LBBox3},
    Device, Error, Result,
};
use glam::Affine3A;
use std::sync::Arc;

/// Primitives defined entirely by user callbacks: one for bounds, one each for
/// intersection and occlusion.
pub struct UserGeometry {
    base: GeometryBase,
    bounds_function: Option<BoundsFunction>,
    intersect_function: Option<IntersectFunction>,
    occluded_function: Option<OccludedFunction>,
}

impl UserGeometry {
    pub fn new(device: &Arc<Device>, num_primitives: u32, num_time_steps: u32) -> Self {
        Self {
            base: GeometryBase::new(
                device,
                GeometryType::UserGeometry,
                num_primitives,
                num_time_steps,
            ),
            bounds_function: None,
            intersect_function: None,
            occluded_function: None,
        }
    }

    pub fn intersect_function(&self) -> Option<&IntersectFunction> {
        self.intersect_function.as_ref()
    }

    pub fn occluded_function(&self) -> Option<&OccludedFunction> {
        self.occluded_function.as_ref()
    }
}

impl Geometry for UserGeometry {
    fn base(&self) -> &GeometryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut GeometryBase {
        &mut self.base
    }

    fn verify(&self) -> bool {
        self.bounds_function.is_some()
    }

    fn set_mask(&mut self, mask: u32) -> Result<()> {
        self.base.set_mask(mask);
        self.update();
        Ok(())
    }

    fn set_bounds_function(&mut self, bounds: Option<BoundsFunction>) -> Result<()> {
        self.bounds_function = bounds;
        self.update();
        Ok(())
    }

    fn set_intersect_function(&mut self, intersect: Option<IntersectFunction>) -> Result<()> {
        self.intersect_function = intersect;
        Ok(())
    }

    fn set_occluded_function(&mut self, occluded: Option<OccludedFunction>) -> Result<()> {
        self.occluded_function = occluded;
        Ok(())
    }

    fn linear_bounds(&self, space: &Affine3A, prim_id: u32, time_range: BBox1) -> Result<LBBox3> {
        let bounds = self
            .bounds_function
            .as_ref()
            .ok_or_else(|| Error::InvalidOperation("no bounds function set".into()))?;
        if prim_id >= self.base.size() {
            return Err(Error::InvalidArgument(format!(
                "primitive {} out of range, geometry has {}",
                prim_id,
                self.base.size()
            )));
        }

        let last_step = self.base.num_time_segments();
        Ok(LBBox3::from_time_segments(
            time_range,
            self.base.fnum_time_segments(),
            |step| bounds(prim_id, (step as u32).min(last_step)).transform(space),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bounds::BBox3, geometry::IntersectFunctionArgs, Config, ErrorKind};
    use glam::Vec3;

    /// Unit cubes, primitive `i` sits at x = i and moves one unit along y per time step
    fn cubes(num_time_steps: u32) -> UserGeometry {
        let device = Device::new(Config::default());
        let mut geometry = UserGeometry::new(&device, 4, num_time_steps);
        let bounds: BoundsFunction = Arc::new(|prim_id: u32, time_step: u32| {
            let min = Vec3::new(prim_id as f32, time_step as f32, 0.0);
            BBox3::new(min, min + Vec3::ONE)
        });
        geometry.set_bounds_function(Some(bounds)).unwrap();
        geometry
    }

    #[test]
    fn commit_requires_bounds() {
        let device = Device::new(Config::default());
        let mut geometry = UserGeometry::new(&device, 1, 1);
        assert_eq!(
            geometry.commit().unwrap_err().kind(),
            ErrorKind::InvalidOperation
        );
        assert!(cubes(1).commit().is_ok());
    }

    #[test]
    fn static_bounds() {
        let geometry = cubes(1);
        let lbounds = geometry
            .linear_bounds(&Affine3A::IDENTITY, 2, BBox1::unit())
            .unwrap();
        assert_eq!(lbounds.bounds0, lbounds.bounds1);
        assert_eq!(lbounds.bounds0.min, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn moving_bounds_in_space() {
        let geometry = cubes(3);
        let space = Affine3A::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let lbounds = geometry.linear_bounds(&space, 1, BBox1::unit()).unwrap();
        assert_eq!(lbounds.bounds0.min, Vec3::new(1.0, 0.0, 5.0));
        assert_eq!(lbounds.bounds1.min, Vec3::new(1.0, 2.0, 5.0));

        let half = geometry
            .linear_bounds(&Affine3A::IDENTITY, 1, BBox1::new(0.5, 1.0))
            .unwrap();
        assert_eq!(half.bounds0.min.y, 1.0);
    }

    #[test]
    fn out_of_range_primitive() {
        let err = cubes(1)
            .linear_bounds(&Affine3A::IDENTITY, 4, BBox1::unit())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn callbacks_are_registered() {
        let mut geometry = cubes(1);
        assert!(geometry.intersect_function().is_none());
        let intersect: IntersectFunction =
            Arc::new(|args: &mut IntersectFunctionArgs<'_>| args.valid.fill(false));
        geometry.set_intersect_function(Some(intersect)).unwrap();
        assert!(geometry.intersect_function().is_some());
        assert!(geometry.set_mask(0b10).is_ok());
        assert_eq!(geometry.base().mask(), 0b10);
    }
}
