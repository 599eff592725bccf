//! Geometry, projection, viewport state and configuration shared by the
//! tile machinery and the pyramid manager.

pub mod config;
pub mod constants;
pub mod geo;
pub mod observer;
pub mod projection;
pub mod viewport;
