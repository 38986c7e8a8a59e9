//! Static and time-interpolated bounding volumes

mod bbox;
mod lbbox;

pub use bbox::*;
pub use lbbox::*;
