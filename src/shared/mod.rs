//! Types shared between the window manager subsystems

pub mod geometry;

pub use geometry::{Geometry, Point, Xid};
