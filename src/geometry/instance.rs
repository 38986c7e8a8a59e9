use super::{Geometry, GeometryBase, GeometryRef, GeometryType};
use crate::{scene::Scene, sys::mutex::read_lock, time::time_segment, Device, Error, Result};
use glam::{Affine3A, Quat, Vec3};
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl From<Transform> for Affine3A {
    fn from(transform: Transform) -> Self {
        Affine3A::from_scale_rotation_translation(
            transform.scale,
            transform.rotation,
            transform.translation,
        )
    }
}

/// Places a whole scene into another one, with one transform per time step.
///
/// While active the instance counts as a user of every geometry of the instanced scene.
pub struct Instance {
    base: GeometryBase,
    object: Option<Arc<Scene>>,
    /// Geometries of `object` whose usage counter this instance raised
    used: Vec<GeometryRef>,
    local2world: Vec<Affine3A>,
}

impl Instance {
    pub fn new(device: &Arc<Device>, num_time_steps: u32) -> Self {
        let base = GeometryBase::new(device, GeometryType::Instance, 1, num_time_steps);
        let local2world = vec![Affine3A::IDENTITY; base.num_time_steps() as usize];

        Self {
            base,
            object: None,
            used: Vec::new(),
            local2world,
        }
    }

    pub fn instanced_scene(&self) -> Option<&Arc<Scene>> {
        self.object.as_ref()
    }

    fn is_active(&self) -> bool {
        self.base.is_attached() && self.base.is_enabled()
    }
}

fn lerp_affine(a: &Affine3A, b: &Affine3A, t: f32) -> Affine3A {
    Affine3A {
        matrix3: a.matrix3 * (1.0 - t) + b.matrix3 * t,
        translation: a.translation.lerp(b.translation, t),
    }
}

impl Geometry for Instance {
    fn base(&self) -> &GeometryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut GeometryBase {
        &mut self.base
    }

    fn enabling(&mut self) {
        if let Some(object) = &self.object {
            self.used = object.geometries();
        }
        for geometry in &self.used {
            read_lock(geometry).base().inc_used();
        }
    }

    fn disabling(&mut self) {
        for geometry in self.used.drain(..) {
            read_lock(&geometry).base().dec_used();
        }
    }

    fn verify(&self) -> bool {
        self.object.is_some()
    }

    fn set_num_time_steps(&mut self, num_time_steps: u32) -> Result<()> {
        self.base.set_num_time_steps(num_time_steps)?;
        let last = self.local2world.last().copied().unwrap_or(Affine3A::IDENTITY);
        self.local2world.resize(num_time_steps as usize, last);
        self.update();
        Ok(())
    }

    fn set_mask(&mut self, mask: u32) -> Result<()> {
        self.base.set_mask(mask);
        self.update();
        Ok(())
    }

    fn set_instanced_scene(&mut self, scene: Arc<Scene>) -> Result<()> {
        let active = self.is_active();
        if active {
            self.disabling();
        }
        self.object = Some(scene);
        if active {
            self.enabling();
        }
        self.update();
        Ok(())
    }

    fn set_transform(&mut self, transform: Affine3A, time_step: u32) -> Result<()> {
        let slot = self
            .local2world
            .get_mut(time_step as usize)
            .ok_or_else(|| Error::InvalidArgument(format!("invalid time step {}", time_step)))?;
        *slot = transform;
        self.update();
        Ok(())
    }

    /// Local to world transform at `time`, linear between time steps
    fn get_transform(&self, time: f32) -> Result<Affine3A> {
        if self.base.num_time_steps() == 1 {
            return Ok(self.local2world[0]);
        }

        let (itime, ftime) = time_segment(time, self.base.fnum_time_segments());
        let itime = itime as usize;
        Ok(lerp_affine(
            &self.local2world[itime],
            &self.local2world[itime + 1],
            ftime,
        ))
    }
}
