//! Core primitives.
//!
//! Value types with no simulation behavior attached.

pub mod math;

pub use math::{Quat, Vec3};
