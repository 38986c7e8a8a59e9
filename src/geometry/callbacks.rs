//! User supplied callbacks a geometry can carry, and the arguments they receive

use crate::{
    bounds::BBox3,
    ray::{Hit, IntersectContext, Ray, RayHit},
};
use glam::{Vec2, Vec3};
use std::{any::Any, sync::Arc};

pub type UserData = Arc<dyn Any + Send + Sync>;

/// Arguments of an intersection or occlusion filter, one lane per ray
pub struct FilterArgs<'a> {
    /// Lanes the filter runs for. Clearing a lane rejects its hit.
    pub valid: &'a mut [bool],
    pub user_data: Option<&'a (dyn Any + Send + Sync)>,
    pub context: &'a IntersectContext,
    pub rays: &'a mut [Ray],
    pub hits: &'a mut [Hit],
}

pub type FilterFunction = Arc<dyn Fn(&mut FilterArgs<'_>) + Send + Sync>;

/// Bounds of primitive `prim_id` at time step `time_step`
pub type BoundsFunction = Arc<dyn Fn(u32, u32) -> BBox3 + Send + Sync>;

pub struct IntersectFunctionArgs<'a> {
    pub valid: &'a mut [bool],
    pub geom_id: u32,
    pub prim_id: u32,
    pub context: &'a IntersectContext,
    pub rays: &'a mut [RayHit],
}

pub type IntersectFunction = Arc<dyn Fn(&mut IntersectFunctionArgs<'_>) + Send + Sync>;

pub struct OccludedFunctionArgs<'a> {
    pub valid: &'a mut [bool],
    pub geom_id: u32,
    pub prim_id: u32,
    pub context: &'a IntersectContext,
    pub rays: &'a mut [Ray],
}

pub type OccludedFunction = Arc<dyn Fn(&mut OccludedFunctionArgs<'_>) + Send + Sync>;

pub struct DisplacementArgs<'a> {
    pub prim_id: u32,
    pub time_step: u32,
    pub uv: &'a [Vec2],
    pub normals: &'a [Vec3],
    pub positions: &'a mut [Vec3],
}

pub type DisplacementFunction = Arc<dyn Fn(&mut DisplacementArgs<'_>) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubdivisionMode {
    NoBoundary,
    SmoothBoundary,
    PinCorners,
    PinBoundary,
    PinAll,
}

/// Interpolation of a vertex attribute at one surface location
pub struct InterpolateArgs<'a> {
    pub prim_id: u32,
    pub u: f32,
    pub v: f32,
    pub slot: u32,
    /// Receives the interpolated value, one float per attribute component
    pub p: &'a mut [f32],
}

/// Interpolation at many locations. Output lane `i` occupies
/// `p[i * value_count..(i + 1) * value_count]`.
pub struct InterpolateNArgs<'a> {
    pub valid: &'a [bool],
    pub prim_ids: &'a [u32],
    pub u: &'a [f32],
    pub v: &'a [f32],
    pub slot: u32,
    pub value_count: usize,
    pub p: &'a mut [f32],
}
