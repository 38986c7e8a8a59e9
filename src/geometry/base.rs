use super::{FilterFunction, GeometryType, UserData};
use crate::{config::BuildQuality, ray::INVALID_ID, scene::SceneState, Device, Error, Result};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Lifecycle of a geometry relative to the acceleration structures built over it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Changed since the last commit
    Modified,
    /// Committed but not yet part of a finished build
    Committed,
    /// Part of the acceleration structures of its scene
    Building,
}

/// State every geometry kind shares. Concrete kinds own one and hand it out through
/// [`Geometry::base`](super::Geometry::base).
pub struct GeometryBase {
    device: Arc<Device>,
    scene: Option<Arc<SceneState>>,
    geom_id: u32,
    ty: GeometryType,
    num_primitives: u32,
    num_time_steps: u32,
    fnum_time_segments: f32,
    quality: BuildQuality,
    enabled: bool,
    state: State,
    user_data: Option<UserData>,
    mask: u32,
    /// Enabled world usage plus one per enabled instance referencing this geometry
    used: AtomicUsize,
    intersection_filter: Option<FilterFunction>,
    occlusion_filter: Option<FilterFunction>,
}

impl GeometryBase {
    pub fn new(
        device: &Arc<Device>,
        ty: GeometryType,
        num_primitives: u32,
        num_time_steps: u32,
    ) -> Self {
        let num_time_steps = num_time_steps.max(1);
        Self {
            device: device.clone(),
            scene: None,
            geom_id: INVALID_ID,
            ty,
            num_primitives,
            num_time_steps,
            fnum_time_segments: (num_time_steps - 1) as f32,
            quality: device.config().build_quality,
            enabled: true,
            state: State::Modified,
            user_data: None,
            mask: u32::MAX,
            used: AtomicUsize::new(1),
            intersection_filter: None,
            occlusion_filter: None,
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn scene(&self) -> Option<&Arc<SceneState>> {
        self.scene.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.scene.is_some()
    }

    /// The ID the scene assigned on attach, `None` while detached
    pub fn geom_id(&self) -> Option<u32> {
        self.scene.as_ref().map(|_| self.geom_id)
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.ty
    }

    /// Number of primitives
    pub fn size(&self) -> u32 {
        self.num_primitives
    }

    pub fn num_time_steps(&self) -> u32 {
        self.num_time_steps
    }

    pub fn num_time_segments(&self) -> u32 {
        self.num_time_steps - 1
    }

    pub fn fnum_time_segments(&self) -> f32 {
        self.fnum_time_segments
    }

    pub fn build_quality(&self) -> BuildQuality {
        self.quality
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_disabled(&self) -> bool {
        !self.enabled
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// True until the geometry took part in a finished build
    pub fn is_modified(&self) -> bool {
        self.state != State::Building
    }

    /// Used by any enabled instance, including the world itself
    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire) > 0
    }

    /// Used by at least one enabled instance other than the world
    pub fn is_instanced(&self) -> bool {
        self.used.load(Ordering::Acquire) > usize::from(self.enabled)
    }

    pub fn inc_used(&self) {
        self.used.fetch_add(1, Ordering::AcqRel);
    }

    pub fn dec_used(&self) {
        self.used.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    pub fn intersection_filter(&self) -> Option<&FilterFunction> {
        self.intersection_filter.as_ref()
    }

    pub fn occlusion_filter(&self) -> Option<&FilterFunction> {
        self.occlusion_filter.as_ref()
    }

    pub fn has_intersection_filter(&self) -> bool {
        self.intersection_filter.is_some()
    }

    pub fn has_occlusion_filter(&self) -> bool {
        self.occlusion_filter.is_some()
    }

    pub(crate) fn bind(&mut self, scene: &Arc<SceneState>, geom_id: u32) -> Result<()> {
        if self.scene.is_some() {
            return Err(Error::InvalidOperation(
                "geometry is already attached to a scene".into(),
            ));
        }

        self.scene = Some(scene.clone());
        self.geom_id = geom_id;
        Ok(())
    }

    pub(crate) fn unbind(&mut self) {
        self.scene = None;
        self.geom_id = INVALID_ID;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_state(&mut self, state: State) {
        self.state = state;
    }

    /// Flags the geometry and its scene for a rebuild
    pub(crate) fn mark_modified(&mut self) {
        self.state = State::Modified;
        if let Some(scene) = &self.scene {
            scene.set_modified();
        }
    }

    pub(crate) fn set_num_primitives(&mut self, num_primitives: u32) {
        self.num_primitives = num_primitives;
    }

    pub(crate) fn set_num_time_steps(&mut self, num_time_steps: u32) -> Result<()> {
        let max = self.device.config().max_time_steps;
        if num_time_steps == 0 || num_time_steps > max {
            return Err(Error::InvalidArgument(format!(
                "number of time steps {} is out of range 1..={}",
                num_time_steps, max
            )));
        }

        self.num_time_steps = num_time_steps;
        self.fnum_time_segments = (num_time_steps - 1) as f32;
        Ok(())
    }

    pub(crate) fn set_build_quality(&mut self, quality: BuildQuality) {
        self.quality = quality;
    }

    pub(crate) fn set_mask(&mut self, mask: u32) {
        self.mask = mask;
    }

    pub(crate) fn set_user_data(&mut self, user_data: Option<UserData>) {
        self.user_data = user_data;
    }

    fn num_filters(&self) -> usize {
        usize::from(self.has_intersection_filter()) + usize::from(self.has_occlusion_filter())
    }

    /// Adds or removes this geometry's filters from the scene wide filter count
    pub(crate) fn update_intersection_filters(&self, enable: bool) {
        if let Some(scene) = &self.scene {
            if enable {
                scene.add_intersection_filters(self.num_filters());
            } else {
                scene.remove_intersection_filters(self.num_filters());
            }
        }
    }

    fn counts_filters(&self) -> bool {
        self.scene.is_some() && self.enabled
    }

    pub(crate) fn replace_intersection_filter(&mut self, filter: Option<FilterFunction>) {
        let counted = self.counts_filters();
        if counted {
            self.update_intersection_filters(false);
        }
        self.intersection_filter = filter;
        if counted {
            self.update_intersection_filters(true);
        }
    }

    pub(crate) fn replace_occlusion_filter(&mut self, filter: Option<FilterFunction>) {
        let counted = self.counts_filters();
        if counted {
            self.update_intersection_filters(false);
        }
        self.occlusion_filter = filter;
        if counted {
            self.update_intersection_filters(true);
        }
    }
}

impl std::fmt::Debug for GeometryBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryBase")
            .field("geom_id", &self.geom_id())
            .field("type", &self.ty)
            .field("num_primitives", &self.num_primitives)
            .field("num_time_steps", &self.num_time_steps)
            .field("enabled", &self.enabled)
            .field("state", &self.state)
            .field("used", &self.used.load(Ordering::Relaxed))
            .finish()
    }
}
