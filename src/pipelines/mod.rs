//! Render pipelines of the showcase.
//!
//! - `basic`: the lit, shadowed main pass over every mesh
//! - `light`: light uniform, shadow map and their bind groups
//! - `shadow`: the depth-only pass rendering the shadow map from the sun

pub mod basic;
pub mod light;
pub mod shadow;
