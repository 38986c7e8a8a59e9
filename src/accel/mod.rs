//! Acceleration structures as the rest of the kernel sees them: something that can be
//! built, has bounds, and answers ray queries through an [`Intersectors`] table.

mod acceln;

pub use acceln::*;

use crate::{
    bounds::BBox3,
    ray::{
        IntersectContext, Ray, Ray16, Ray4, Ray8, RayHit, RayHit16, RayHit4, RayHit8, RayHitK, RayK,
    },
    Error, Result,
};
use std::{fmt, sync::Arc};

/// Packet widths a query can be issued with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Width {
    One,
    Four,
    Eight,
    Sixteen,
    /// Runtime width, rays passed as slices
    Stream,
}

impl Width {
    pub const ALL: [Width; 5] = [
        Width::One,
        Width::Four,
        Width::Eight,
        Width::Sixteen,
        Width::Stream,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn suffix(self) -> &'static str {
        match self {
            Width::One => "1",
            Width::Four => "4",
            Width::Eight => "8",
            Width::Sixteen => "16",
            Width::Stream => "N",
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intersector{}", self.suffix())
    }
}

/// Ray queries, one method per packet width.
///
/// Only the single ray methods are required. The wider ones default to running the
/// single ray methods lane by lane over the active lanes.
pub trait Traverser: Send + Sync {
    /// Finds the closest hit, updating `rayhit` in place if it is closer than `tfar`
    fn intersect1(&self, rayhit: &mut RayHit, context: &IntersectContext);

    /// Finds any hit. A blocked ray gets a negative `tfar`.
    fn occluded1(&self, ray: &mut Ray, context: &IntersectContext);

    fn intersect4(&self, valid: &[bool; 4], rayhit: &mut RayHit4, context: &IntersectContext) {
        intersect_lanes(self, valid, rayhit, context);
    }

    fn occluded4(&self, valid: &[bool; 4], ray: &mut Ray4, context: &IntersectContext) {
        occluded_lanes(self, valid, ray, context);
    }

    fn intersect8(&self, valid: &[bool; 8], rayhit: &mut RayHit8, context: &IntersectContext) {
        intersect_lanes(self, valid, rayhit, context);
    }

    fn occluded8(&self, valid: &[bool; 8], ray: &mut Ray8, context: &IntersectContext) {
        occluded_lanes(self, valid, ray, context);
    }

    fn intersect16(&self, valid: &[bool; 16], rayhit: &mut RayHit16, context: &IntersectContext) {
        intersect_lanes(self, valid, rayhit, context);
    }

    fn occluded16(&self, valid: &[bool; 16], ray: &mut Ray16, context: &IntersectContext) {
        occluded_lanes(self, valid, ray, context);
    }

    /// `valid` and `rayhits` have the same length
    fn intersect_n(&self, valid: &[bool], rayhits: &mut [RayHit], context: &IntersectContext) {
        for (&active, rayhit) in valid.iter().zip(rayhits) {
            if active {
                self.intersect1(rayhit, context);
            }
        }
    }

    /// `valid` and `rays` have the same length
    fn occluded_n(&self, valid: &[bool], rays: &mut [Ray], context: &IntersectContext) {
        for (&active, ray) in valid.iter().zip(rays) {
            if active && !ray.is_occluded() {
                self.occluded1(ray, context);
            }
        }
    }
}

fn intersect_lanes<T: Traverser + ?Sized, const K: usize>(
    traverser: &T,
    valid: &[bool; K],
    rayhit: &mut RayHitK<K>,
    context: &IntersectContext,
) {
    for lane in (0..K).filter(|&lane| valid[lane]) {
        let mut single = rayhit.get(lane);
        traverser.intersect1(&mut single, context);
        rayhit.set(lane, &single);
    }
}

fn occluded_lanes<T: Traverser + ?Sized, const K: usize>(
    traverser: &T,
    valid: &[bool; K],
    ray: &mut RayK<K>,
    context: &IntersectContext,
) {
    for lane in 0..K {
        if !valid[lane] || ray.tfar[lane] < 0.0 {
            continue;
        }

        let mut single = ray.get(lane);
        traverser.occluded1(&mut single, context);
        ray.set(lane, &single);
    }
}

/// The dispatch table of an acceleration structure.
///
/// A width is answered only if the table carries a name for it, queries of any other
/// width fail with [`Error::InvalidOperation`]. Tables are cheap to clone and clones
/// share the traverser.
#[derive(Clone, Default)]
pub struct Intersectors {
    traverser: Option<Arc<dyn Traverser>>,
    /// Without and with filter function support, if the structure has both
    variants: Option<(Arc<dyn Traverser>, Arc<dyn Traverser>)>,
    names: [Option<&'static str>; 5],
}

impl Intersectors {
    pub fn new(traverser: Arc<dyn Traverser>) -> Self {
        Self {
            traverser: Some(traverser),
            variants: None,
            names: [None; 5],
        }
    }

    /// A table that switches between two traversers on [`Intersectors::select`].
    /// Starts out with filter support.
    pub fn with_variants(no_filter: Arc<dyn Traverser>, filter: Arc<dyn Traverser>) -> Self {
        Self {
            traverser: Some(filter.clone()),
            variants: Some((no_filter, filter)),
            names: [None; 5],
        }
    }

    /// Advertises `width` under `name`
    pub fn named(mut self, width: Width, name: &'static str) -> Self {
        self.set_name(width, Some(name));
        self
    }

    pub fn set_name(&mut self, width: Width, name: Option<&'static str>) {
        self.names[width.index()] = name;
    }

    pub fn name(&self, width: Width) -> Option<&'static str> {
        self.names[width.index()]
    }

    pub fn supports(&self, width: Width) -> bool {
        self.traverser.is_some() && self.name(width).is_some()
    }

    pub fn traverser(&self) -> Option<&Arc<dyn Traverser>> {
        self.traverser.as_ref()
    }

    /// Picks the traverser with or without filter support. Tables without variants
    /// keep their single traverser.
    pub fn select(&mut self, filter: bool) {
        if let Some((no_filter, with_filter)) = &self.variants {
            let selected = if filter { with_filter } else { no_filter };
            self.traverser = Some(selected.clone());
        }
    }

    /// True if both tables dispatch to the same traverser under the same names
    pub fn ptr_eq(&self, other: &Intersectors) -> bool {
        match (&self.traverser, &other.traverser) {
            (Some(a), Some(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
                    && self.names == other.names
            }
            _ => false,
        }
    }

    fn get(&self, width: Width) -> Result<&dyn Traverser> {
        match (&self.traverser, self.name(width)) {
            (Some(traverser), Some(_)) => Ok(traverser.as_ref()),
            _ => Err(Error::InvalidOperation(format!(
                "{} not supported by this acceleration structure",
                width
            ))),
        }
    }

    pub fn intersect1(&self, rayhit: &mut RayHit, context: &IntersectContext) -> Result<()> {
        self.get(Width::One)?.intersect1(rayhit, context);
        Ok(())
    }

    pub fn occluded1(&self, ray: &mut Ray, context: &IntersectContext) -> Result<()> {
        self.get(Width::One)?.occluded1(ray, context);
        Ok(())
    }

    pub fn intersect4(
        &self,
        valid: &[bool; 4],
        rayhit: &mut RayHit4,
        context: &IntersectContext,
    ) -> Result<()> {
        self.get(Width::Four)?.intersect4(valid, rayhit, context);
        Ok(())
    }

    pub fn occluded4(
        &self,
        valid: &[bool; 4],
        ray: &mut Ray4,
        context: &IntersectContext,
    ) -> Result<()> {
        self.get(Width::Four)?.occluded4(valid, ray, context);
        Ok(())
    }

    pub fn intersect8(
        &self,
        valid: &[bool; 8],
        rayhit: &mut RayHit8,
        context: &IntersectContext,
    ) -> Result<()> {
        self.get(Width::Eight)?.intersect8(valid, rayhit, context);
        Ok(())
    }

    pub fn occluded8(
        &self,
        valid: &[bool; 8],
        ray: &mut Ray8,
        context: &IntersectContext,
    ) -> Result<()> {
        self.get(Width::Eight)?.occluded8(valid, ray, context);
        Ok(())
    }

    pub fn intersect16(
        &self,
        valid: &[bool; 16],
        rayhit: &mut RayHit16,
        context: &IntersectContext,
    ) -> Result<()> {
        self.get(Width::Sixteen)?.intersect16(valid, rayhit, context);
        Ok(())
    }

    pub fn occluded16(
        &self,
        valid: &[bool; 16],
        ray: &mut Ray16,
        context: &IntersectContext,
    ) -> Result<()> {
        self.get(Width::Sixteen)?.occluded16(valid, ray, context);
        Ok(())
    }

    pub fn intersect_n(
        &self,
        valid: &[bool],
        rayhits: &mut [RayHit],
        context: &IntersectContext,
    ) -> Result<()> {
        let traverser = self.get(Width::Stream)?;
        check_stream(valid.len(), rayhits.len())?;
        traverser.intersect_n(valid, rayhits, context);
        Ok(())
    }

    pub fn occluded_n(
        &self,
        valid: &[bool],
        rays: &mut [Ray],
        context: &IntersectContext,
    ) -> Result<()> {
        let traverser = self.get(Width::Stream)?;
        check_stream(valid.len(), rays.len())?;
        traverser.occluded_n(valid, rays, context);
        Ok(())
    }

    /// Writes one line per advertised width
    pub fn print(&self, indent: usize, out: &mut dyn fmt::Write) -> fmt::Result {
        for width in Width::ALL {
            if let Some(name) = self.name(width) {
                writeln!(out, "{:indent$}{} = {}", "", width, name, indent = indent)?;
            }
        }

        Ok(())
    }
}

fn check_stream(valid: usize, rays: usize) -> Result<()> {
    if valid != rays {
        return Err(Error::InvalidArgument(format!(
            "{} lanes in the valid mask for {} rays",
            valid, rays
        )));
    }

    Ok(())
}

impl fmt::Debug for Intersectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intersectors")
            .field("names", &self.names)
            .field("variants", &self.variants.is_some())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccelType {
    Unknown,
    AccelN,
    Instance,
    Bvh4,
    Bvh8,
}

/// An acceleration structure over some subset of a scene.
///
/// Bounds start out empty and are valid after [`Accel::build`]. Traversal goes through
/// [`Accel::intersectors`] and must not overlap a build or clear of the same structure.
pub trait Accel: Send + Sync {
    fn accel_type(&self) -> AccelType {
        AccelType::Unknown
    }

    fn build(&mut self) -> Result<()>;

    fn bounds(&self) -> BBox3;

    fn intersectors(&self) -> &Intersectors;

    fn intersectors_mut(&mut self) -> &mut Intersectors;

    /// Switches traversal to the variant with or without filter function support
    fn select(&mut self, filter: bool) {
        self.intersectors_mut().select(filter);
    }

    /// Called once the structure will not be rebuilt anymore
    fn immutable(&mut self) {}

    /// Drops whatever the structure keeps for geometry `geom_id`
    fn delete_geometry(&mut self, _geom_id: u32) {}

    fn clear(&mut self);

    fn print(&self, indent: usize, out: &mut dyn fmt::Write) -> fmt::Result {
        self.intersectors().print(indent, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hits every ray at distance 1, counting single ray calls
    #[derive(Default)]
    struct Wall {
        calls: AtomicUsize,
    }

    impl Traverser for Wall {
        fn intersect1(&self, rayhit: &mut RayHit, _: &IntersectContext) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if rayhit.ray.tfar > 1.0 {
                rayhit.ray.tfar = 1.0;
                rayhit.hit.geom_id = 0;
            }
        }

        fn occluded1(&self, ray: &mut Ray, _: &IntersectContext) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            ray.set_occluded();
        }
    }

    fn ray() -> Ray {
        Ray::new(Vec3::ZERO, Vec3::Z)
    }

    #[test]
    fn lanes_fall_back_to_single_rays() {
        let wall = Arc::new(Wall::default());
        let table = Intersectors::new(wall.clone()).named(Width::Four, "wall4");

        let mut packet = RayHit4::splat(&ray());
        let valid = [true, false, true, false];
        table
            .intersect4(&valid, &mut packet, &IntersectContext::default())
            .unwrap();
        assert_eq!(wall.calls.load(Ordering::Relaxed), 2);
        assert_eq!(packet.ray.tfar, [1.0, f32::INFINITY, 1.0, f32::INFINITY]);
        assert_eq!(packet.hit.geom_id[0], 0);

        let mut rays = Ray4::splat(&ray());
        rays.tfar[2] = f32::NEG_INFINITY;
        table
            .occluded4(&valid, &mut rays, &IntersectContext::default())
            .unwrap();
        // lane 2 was blocked already
        assert_eq!(wall.calls.load(Ordering::Relaxed), 3);
        assert!(rays.tfar[0] < 0.0);
        assert_eq!(rays.tfar[1], f32::INFINITY);
    }

    #[test]
    fn unnamed_widths_are_rejected() {
        let table = Intersectors::new(Arc::new(Wall::default())).named(Width::One, "wall1");
        assert!(table.supports(Width::One));
        assert!(!table.supports(Width::Stream));

        let mut rays = [ray(); 3];
        let err = table
            .occluded_n(&[true; 3], &mut rays, &IntersectContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidOperation);

        let empty = Intersectors::default().named(Width::One, "nothing");
        let err = empty
            .occluded1(&mut ray(), &IntersectContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidOperation);
    }

    #[test]
    fn stream_lengths_must_match() {
        let table = Intersectors::new(Arc::new(Wall::default())).named(Width::Stream, "wallN");
        let mut rayhits = [RayHit::new(ray()); 2];
        let err = table
            .intersect_n(&[true; 3], &mut rayhits, &IntersectContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);

        table
            .intersect_n(&[false, true], &mut rayhits, &IntersectContext::default())
            .unwrap();
        assert_eq!(rayhits[0].ray.tfar, f32::INFINITY);
        assert_eq!(rayhits[1].ray.tfar, 1.0);
    }

    #[test]
    fn select_swaps_variants() {
        let plain: Arc<dyn Traverser> = Arc::new(Wall::default());
        let filtered: Arc<dyn Traverser> = Arc::new(Wall::default());
        let mut table = Intersectors::with_variants(plain.clone(), filtered.clone());
        let with_filter = Intersectors::new(filtered);
        let without_filter = Intersectors::new(plain);

        assert!(table.ptr_eq(&with_filter));
        table.select(false);
        assert!(table.ptr_eq(&without_filter));
        table.select(true);
        assert!(table.ptr_eq(&with_filter));
    }

    #[test]
    fn print_lists_named_widths() {
        let table = Intersectors::new(Arc::new(Wall::default()))
            .named(Width::One, "wall1")
            .named(Width::Stream, "wallN");
        let mut out = String::new();
        table.print(2, &mut out).unwrap();
        assert_eq!(out, "  intersector1 = wall1\n  intersectorN = wallN\n");
    }
}
