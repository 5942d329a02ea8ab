//! Showcase configuration.
//!
//! Every constant the scene is built from lives in [`ShowcaseConfig`]. The
//! defaults reproduce the reference page; [`ShowcaseConfig::from_env`]
//! overlays the asset root and model path from the environment.

use std::path::PathBuf;

use cgmath::{Deg, Point3, Vector3};

use crate::{
    camera::OrbitConfig,
    data_structures::scene_graph::{AmbientLight, DirectionalLight, ShadowConfig},
};

pub const ASSETS_ENV: &str = "SHOWCASE_ASSETS";
pub const MODEL_ENV: &str = "SHOWCASE_MODEL";

/// Where the loaded model lands in the scene.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Placement {
    pub position: Vector3<f32>,
    pub scale: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vector3::new(3.0, 0.5, 2.0),
            scale: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroundConfig {
    pub width: f32,
    pub depth: f32,
    pub colour: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CubeConfig {
    pub size: f32,
    pub colour: u32,
    pub position: Vector3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShowcaseConfig {
    pub title: String,
    pub background: u32,
    pub camera: CameraConfig,
    pub controls: OrbitConfig,
    pub ambient: AmbientLight,
    pub sun: DirectionalLight,
    pub ground: GroundConfig,
    pub cube: CubeConfig,
    pub assets_root: PathBuf,
    pub model_path: String,
    pub placement: Placement,
    pub spin_increment: f32,
}

impl Default for ShowcaseConfig {
    fn default() -> Self {
        Self {
            title: "Scene Showcase".to_string(),
            background: 0x282c34,
            camera: CameraConfig {
                fovy: Deg(75.0),
                znear: 0.1,
                zfar: 1000.0,
                position: Point3::new(5.0, 5.0, 10.0),
                target: Point3::new(0.0, 0.0, 0.0),
            },
            controls: OrbitConfig::default(),
            ambient: AmbientLight {
                colour: [1.0; 3],
                intensity: 0.5,
            },
            sun: DirectionalLight {
                colour: [1.0; 3],
                intensity: 1.0,
                position: Point3::new(5.0, 10.0, 7.5),
                target: Point3::new(0.0, 0.0, 0.0),
                cast_shadow: true,
                shadow: ShadowConfig {
                    map_size: 1024,
                    left: -10.0,
                    right: 10.0,
                    bottom: -10.0,
                    top: 10.0,
                    near: 0.5,
                    far: 50.0,
                },
            },
            ground: GroundConfig {
                width: 20.0,
                depth: 20.0,
                colour: 0x808080,
            },
            cube: CubeConfig {
                size: 1.0,
                colour: 0x61dafb,
                position: Vector3::new(0.0, 1.0, 0.0),
            },
            assets_root: PathBuf::from("assets"),
            model_path: "/myModel.glb".to_string(),
            placement: Placement::default(),
            spin_increment: crate::frame::SPIN_INCREMENT,
        }
    }
}

impl ShowcaseConfig {
    /// Defaults with `SHOWCASE_ASSETS` and `SHOWCASE_MODEL` applied when set.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(ASSETS_ENV).filter(|v| !v.is_empty()) {
            self.assets_root = PathBuf::from(root);
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.is_empty()) {
            self.model_path = model;
        }
        self
    }
}

/// Convert a `0xRRGGBB` sRGB colour to linear RGB.
pub fn srgb_hex(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0)]
}

/// [`srgb_hex`] with an opaque alpha channel.
pub fn srgb_hex_rgba(hex: u32) -> [f32; 4] {
    let [r, g, b] = srgb_hex(hex);
    [r, g, b, 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_paths() {
        let config = ShowcaseConfig::default().with_overrides(|key| match key {
            ASSETS_ENV => Some("/srv/assets".to_string()),
            MODEL_ENV => Some("/other.glb".to_string()),
            _ => None,
        });
        assert_eq!(config.assets_root, PathBuf::from("/srv/assets"));
        assert_eq!(config.model_path, "/other.glb");
    }

    #[test]
    fn empty_overrides_are_ignored() {
        let config = ShowcaseConfig::default().with_overrides(|_| Some(String::new()));
        assert_eq!(config, ShowcaseConfig::default());
    }

    #[test]
    fn hex_colours_are_linearised() {
        assert_eq!(srgb_hex(0x000000), [0.0; 3]);
        assert_eq!(srgb_hex(0xffffff), [1.0; 3]);
        let [r, g, b] = srgb_hex(0x808080);
        assert!((r - 0.2158).abs() < 1e-3);
        assert_eq!(r, g);
        assert_eq!(g, b);
    }
}
