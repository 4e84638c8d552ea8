//! Curve modeling and tessellation.
//!
//! Splines interpolate user-placed knots with piecewise cubic Bezier
//! patches; each patch sweeps a tube mesh on a background thread that the
//! render loop uploads when ready.

pub mod config;
pub mod curve;
pub mod render;
pub mod scene;
pub mod tube;
