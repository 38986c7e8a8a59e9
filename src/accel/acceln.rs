use super::{Accel, AccelType, Intersectors, Traverser, Width};
use crate::{
    bounds::BBox3,
    ray::{
        any_unoccluded, IntersectContext, Ray, Ray16, Ray4, Ray8, RayHit, RayHit16, RayHit4,
        RayHit8, RayK,
    },
    Device, Error, Result,
};
use log::{debug, warn};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::{fmt, sync::Arc};

/// A composite acceleration structure. Queries fan out over every child that was
/// non-empty after the last build, in the order the children were added.
pub struct AccelN {
    accels: Vec<Box<dyn Accel>>,
    /// Indices into `accels`, recomputed by every build
    valid_accels: SmallVec<[usize; 8]>,
    intersectors: Intersectors,
    bounds: BBox3,
    max_accels: usize,
}

impl AccelN {
    pub fn new(device: &Arc<Device>) -> Self {
        Self {
            accels: Vec::new(),
            valid_accels: SmallVec::new(),
            intersectors: Intersectors::default(),
            bounds: BBox3::EMPTY,
            max_accels: device.config().max_accels,
        }
    }

    pub fn add(&mut self, accel: Box<dyn Accel>) -> Result<()> {
        if self.accels.len() >= self.max_accels {
            return Err(Error::Internal(format!(
                "internal error in AccelN::add: too many children, at most {}",
                self.max_accels
            )));
        }

        self.accels.push(accel);
        Ok(())
    }

    /// Drops all children, the composite is empty afterwards
    pub fn init(&mut self) {
        self.accels.clear();
        self.valid_accels.clear();
        self.intersectors = Intersectors::default();
        self.bounds = BBox3::EMPTY;
    }

    pub fn accels(&self) -> &[Box<dyn Accel>] {
        &self.accels
    }

    /// Children that take part in traversal
    pub fn valid_accels(&self) -> impl Iterator<Item = &dyn Accel> + '_ {
        self.valid_accels.iter().map(move |&i| self.accels[i].as_ref())
    }

    pub fn num_valid_accels(&self) -> usize {
        self.valid_accels.len()
    }

    /// Picks the non-empty children and merges their bounds. Only build calls this.
    fn filter_valid(&mut self) {
        let accels = &self.accels;
        self.valid_accels = (0..accels.len())
            .filter(|&i| !accels[i].bounds().is_empty())
            .collect();

        self.bounds = self
            .valid_accels()
            .fold(BBox3::EMPTY, |bounds, accel| bounds.union(accel.bounds()));
    }

    /// Sets up dispatch over the current valid children, taking their traversers as they
    /// are now
    fn install_dispatch(&mut self) {
        let accels = &self.accels;
        if let &[only] = self.valid_accels.as_slice() {
            self.intersectors = accels[only].intersectors().clone();
            debug!("AccelN passes queries through to child {}", only);
        } else {
            let valid: SmallVec<[&Intersectors; 8]> = self
                .valid_accels
                .iter()
                .map(|&i| accels[i].intersectors())
                .collect();
            let fan_out = FanOut {
                children: valid.iter().filter_map(|x| x.traverser().cloned()).collect(),
            };

            let mut intersectors = Intersectors::new(Arc::new(fan_out));
            for width in [Width::One, Width::Four, Width::Eight, Width::Sixteen] {
                if valid.iter().all(|x| x.supports(width)) {
                    intersectors.set_name(width, Some(fan_out_name(width)));
                }
            }
            intersectors.set_name(Width::Stream, Some(fan_out_name(Width::Stream)));

            self.intersectors = intersectors;
            debug!("AccelN fans out over {} children", self.valid_accels.len());
        }
    }
}

fn fan_out_name(width: Width) -> &'static str {
    match width {
        Width::One => "AccelN::intersector1",
        Width::Four => "AccelN::intersector4",
        Width::Eight => "AccelN::intersector8",
        Width::Sixteen => "AccelN::intersector16",
        Width::Stream => "AccelN::intersectorN",
    }
}

impl Accel for AccelN {
    fn accel_type(&self) -> AccelType {
        AccelType::AccelN
    }

    /// Builds all children in parallel, then picks the non-empty ones and sets up
    /// dispatch over them. A failed child does not stop the others, the first error is
    /// returned once the composite is set up.
    fn build(&mut self) -> Result<()> {
        let results: Vec<Result<()>> = self
            .accels
            .par_iter_mut()
            .map(|accel| accel.build())
            .collect();

        let mut first_error = None;
        for (i, result) in results.into_iter().enumerate() {
            if let Err(e) = result {
                warn!("AccelN child {} failed to build: {}", i, e);
                first_error.get_or_insert(e);
            }
        }

        self.filter_valid();
        self.install_dispatch();
        debug!(
            "AccelN built {} children, {} valid, bounds {}",
            self.accels.len(),
            self.valid_accels.len(),
            self.bounds
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn bounds(&self) -> BBox3 {
        self.bounds
    }

    fn intersectors(&self) -> &Intersectors {
        &self.intersectors
    }

    fn intersectors_mut(&mut self) -> &mut Intersectors {
        &mut self.intersectors
    }

    fn select(&mut self, filter: bool) {
        for accel in &mut self.accels {
            accel.select(filter);
        }
        self.install_dispatch();
    }

    fn immutable(&mut self) {
        for accel in &mut self.accels {
            accel.immutable();
        }
    }

    fn delete_geometry(&mut self, geom_id: u32) {
        for accel in &mut self.accels {
            accel.delete_geometry(geom_id);
        }
    }

    fn clear(&mut self) {
        for accel in &mut self.accels {
            accel.clear();
        }
    }

    /// Children are labelled by their position among the valid ones
    fn print(&self, indent: usize, out: &mut dyn fmt::Write) -> fmt::Result {
        for (i, accel) in self.valid_accels().enumerate() {
            writeln!(out, "{:indent$}accels[{}]", "", i, indent = indent)?;
            accel.print(indent + 2, out)?;
        }

        Ok(())
    }
}

impl fmt::Debug for AccelN {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccelN")
            .field("accels", &self.accels.len())
            .field("valid_accels", &self.valid_accels)
            .field("intersectors", &self.intersectors)
            .field("bounds", &self.bounds)
            .finish()
    }
}

/// Traverser of a composite with zero or several valid children
struct FanOut {
    children: SmallVec<[Arc<dyn Traverser>; 8]>,
}

impl FanOut {
    /// Stops as soon as no active lane is left unblocked
    fn occluded_packet<const K: usize>(
        &self,
        valid: &[bool; K],
        ray: &mut RayK<K>,
        mut occluded: impl FnMut(&Arc<dyn Traverser>, &mut RayK<K>),
    ) {
        for child in &self.children {
            occluded(child, ray);
            if !any_unoccluded(valid, &ray.tfar) {
                break;
            }
        }
    }
}

impl Traverser for FanOut {
    fn intersect1(&self, rayhit: &mut RayHit, context: &IntersectContext) {
        for child in &self.children {
            child.intersect1(rayhit, context);
        }
    }

    fn occluded1(&self, ray: &mut Ray, context: &IntersectContext) {
        for child in &self.children {
            child.occluded1(ray, context);
            if ray.is_occluded() {
                break;
            }
        }
    }

    fn intersect4(&self, valid: &[bool; 4], rayhit: &mut RayHit4, context: &IntersectContext) {
        for child in &self.children {
            child.intersect4(valid, rayhit, context);
        }
    }

    fn occluded4(&self, valid: &[bool; 4], ray: &mut Ray4, context: &IntersectContext) {
        self.occluded_packet(valid, ray, |child, ray| {
            child.occluded4(valid, ray, context)
        });
    }

    fn intersect8(&self, valid: &[bool; 8], rayhit: &mut RayHit8, context: &IntersectContext) {
        for child in &self.children {
            child.intersect8(valid, rayhit, context);
        }
    }

    fn occluded8(&self, valid: &[bool; 8], ray: &mut Ray8, context: &IntersectContext) {
        self.occluded_packet(valid, ray, |child, ray| {
            child.occluded8(valid, ray, context)
        });
    }

    fn intersect16(&self, valid: &[bool; 16], rayhit: &mut RayHit16, context: &IntersectContext) {
        for child in &self.children {
            child.intersect16(valid, rayhit, context);
        }
    }

    fn occluded16(&self, valid: &[bool; 16], ray: &mut Ray16, context: &IntersectContext) {
        self.occluded_packet(valid, ray, |child, ray| {
            child.occluded16(valid, ray, context)
        });
    }

    fn intersect_n(&self, valid: &[bool], rayhits: &mut [RayHit], context: &IntersectContext) {
        for child in &self.children {
            child.intersect_n(valid, rayhits, context);
        }
    }

    fn occluded_n(&self, valid: &[bool], rays: &mut [Ray], context: &IntersectContext) {
        for child in &self.children {
            child.occluded_n(valid, rays, context);
            let unresolved = valid
                .iter()
                .zip(rays.iter())
                .any(|(&active, ray)| active && !ray.is_occluded());
            if !unresolved {
                break;
            }
        }
    }
}
