//! Composition layer of a ray tracing kernel: composite acceleration structures, motion
//! blur primitive references and the geometry lifecycle they are built over.

pub mod accel;
pub mod bounds;
pub mod config;
pub mod device;
pub mod error;
pub mod geometry;
pub mod primref;
pub mod ray;
pub mod scene;
pub mod sys;
pub mod time;

pub use crate::{
    config::{BuildQuality, Config},
    device::Device,
    error::{Error, ErrorKind, Result},
};
