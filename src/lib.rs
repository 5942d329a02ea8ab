//! scene-showcase
//!
//! A small cross-platform 3D scene demo on wgpu, native and WASM. It shows a
//! lit, shadowed scene with a spinning cube, damped orbit controls and a
//! glTF model that is loaded asynchronously while the scene already renders,
//! plus a checklist of which features came up.
//!
//! High-level modules
//! - `app`: winit event loop and the `run` entry point
//! - `showcase`: the demo state, independent of window and GPU
//! - `camera`: perspective camera, uniforms and orbit controls
//! - `frame`: render loop step, stop token and resize handling
//! - `loader`: async model loading with progress and a single outcome
//! - `readiness`: feature checklist state, `ui`: its presentation
//! - `spin`: the cube spin toggle
//! - `config`: scene constants and environment overrides
//! - `context`: window surface and GPU device
//! - `render`, `pipelines`: shadow and main passes
//! - `data_structures`: meshes, textures, transforms and the scene graph
//! - `resources`: asset fetching and glTF conversion

pub mod app;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod frame;
pub mod loader;
pub mod pipelines;
pub mod readiness;
pub mod render;
pub mod resources;
pub mod showcase;
pub mod spin;
pub mod ui;

pub use app::run;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    run().map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
