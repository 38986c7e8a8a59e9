use crate::{
    bounds::{BBox1, LBBox3},
    geometry::{GeometryRef, State},
    primref::GeometryLookup,
    sys::{
        mutex::{read_lock, write_lock},
        MutexSys,
    },
    Device, Error, Result,
};
use glam::Affine3A;
use log::trace;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

/// The part of a scene its geometries report back to while attached
#[derive(Debug, Default)]
pub struct SceneState {
    num_intersection_filters: AtomicUsize,
    modified: AtomicBool,
}

impl SceneState {
    pub fn num_intersection_filters(&self) -> usize {
        self.num_intersection_filters.load(Ordering::Acquire)
    }

    pub fn add_intersection_filters(&self, n: usize) {
        self.num_intersection_filters.fetch_add(n, Ordering::AcqRel);
    }

    pub fn remove_intersection_filters(&self, n: usize) {
        self.num_intersection_filters.fetch_sub(n, Ordering::AcqRel);
    }

    pub fn set_modified(&self) {
        self.modified.store(true, Ordering::Release);
    }

    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    fn clear_modified(&self) {
        self.modified.store(false, Ordering::Release);
    }
}

/// Geometries indexed by the ID they were attached under
pub struct Scene {
    device: Arc<Device>,
    state: Arc<SceneState>,
    geometries: MutexSys<Vec<Option<GeometryRef>>>,
}

impl Scene {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            state: Arc::new(SceneState::default()),
            geometries: MutexSys::new(Vec::new()),
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn state(&self) -> &Arc<SceneState> {
        &self.state
    }

    /// Attaches `geometry` under the lowest free ID and returns that ID
    pub fn attach(&self, geometry: GeometryRef) -> Result<u32> {
        let mut geometries = self.geometries.lock();
        let id = geometries
            .iter()
            .position(Option::is_none)
            .unwrap_or(geometries.len());

        write_lock(&geometry).attach(&self.state, id as u32)?;
        if id == geometries.len() {
            geometries.push(Some(geometry));
        } else {
            geometries[id] = Some(geometry);
        }

        trace!("attached geometry {}", id);
        Ok(id as u32)
    }

    pub fn attach_by_id(&self, geometry: GeometryRef, id: u32) -> Result<()> {
        let mut geometries = self.geometries.lock();
        let slot = id as usize;
        if geometries.get(slot).map_or(false, Option::is_some) {
            return Err(Error::InvalidArgument(format!(
                "geometry ID {} is already in use",
                id
            )));
        }

        write_lock(&geometry).attach(&self.state, id)?;
        if slot >= geometries.len() {
            geometries.resize(slot + 1, None);
        }
        geometries[slot] = Some(geometry);

        trace!("attached geometry {}", id);
        Ok(())
    }

    pub fn detach(&self, id: u32) -> Result<GeometryRef> {
        let geometry = self
            .geometries
            .lock()
            .get_mut(id as usize)
            .and_then(Option::take)
            .ok_or_else(|| Error::InvalidArgument(format!("invalid geometry ID {}", id)))?;

        write_lock(&geometry).detach();

        trace!("detached geometry {}", id);
        Ok(geometry)
    }

    pub fn get(&self, id: u32) -> Option<GeometryRef> {
        self.geometries.lock().get(id as usize).cloned().flatten()
    }

    /// All attached geometries in ID order
    pub fn geometries(&self) -> Vec<GeometryRef> {
        self.geometries.lock().iter().flatten().cloned().collect()
    }

    pub fn num_intersection_filters(&self) -> usize {
        self.state.num_intersection_filters()
    }

    pub fn is_modified(&self) -> bool {
        self.state.is_modified()
    }

    /// Runs before the acceleration structures are built. Every enabled geometry must
    /// have been committed since it last changed.
    pub fn pre_commit_geometries(&self) -> Result<()> {
        let geometries = self.geometries();
        for geometry in &geometries {
            let geometry = read_lock(geometry);
            let base = geometry.base();
            if base.is_enabled() && base.state() == State::Modified {
                return Err(Error::InvalidOperation("geometry not committed".into()));
            }
        }

        for geometry in &geometries {
            write_lock(geometry).pre_commit();
        }
        Ok(())
    }

    /// Runs after the acceleration structures are built
    pub fn post_commit_geometries(&self) {
        for geometry in self.geometries() {
            let mut geometry = write_lock(&geometry);
            geometry.post_commit();
            if geometry.base().is_enabled() {
                geometry.base_mut().set_state(State::Building);
            }
        }
        self.state.clear_modified();
    }
}

impl GeometryLookup for Scene {
    fn linear_bounds(
        &self,
        geom_id: u32,
        space: &Affine3A,
        prim_id: u32,
        time_range: BBox1,
    ) -> Result<LBBox3> {
        let geometry = self
            .get(geom_id)
            .ok_or_else(|| Error::InvalidArgument(format!("invalid geometry ID {}", geom_id)))?;
        let geometry = read_lock(&geometry);
        geometry.linear_bounds(space, prim_id, time_range)
    }
}
