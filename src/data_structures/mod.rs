//! Scene data: meshes, materials, textures, transforms and the scene graph.
//!
//! - `model` contains mesh and material definitions and their GPU upload
//! - `texture` contains the GPU texture wrapper, depth and shadow map targets
//! - `instance` holds per-node transformation data
//! - `scene_graph` enables hierarchical scene organization
//! - `shapes` builds the procedural ground plane and cube

pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod shapes;
pub mod texture;
