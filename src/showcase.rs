//! The demo itself, independent of any window or GPU.
//!
//! [`Showcase`] builds the scene (ground, cube, lights), the camera with its
//! orbit controls, the readiness tracker and the frame loop, and owns the
//! in-flight model load. The app feeds it window events and frames; tests
//! drive it with a mock renderer.

use std::f32::consts::FRAC_PI_2;

use cgmath::{Euler, Rad};
use winit::event::WindowEvent;

use crate::{
    camera::{Camera, OrbitControls, Projection},
    config::{ShowcaseConfig, srgb_hex, srgb_hex_rgba},
    data_structures::{
        model::{Material, MeshData},
        scene_graph::{NodeId, Scene, SceneNode},
        shapes,
    },
    frame::{FrameLoop, LoopState, SceneRenderer, SpinRotation, StopToken, handle_resize},
    loader::{self, AssetLoader, LoadHandle, LoaderEvent},
    readiness::ReadinessTracker,
    spin::SpinToggle,
    ui::ChecklistView,
};

pub const GROUND_NAME: &str = "ground";
pub const CUBE_NAME: &str = "cube";

pub struct Showcase {
    config: ShowcaseConfig,
    scene: Scene,
    cube: NodeId,
    camera: Camera,
    controls: OrbitControls,
    spin: SpinToggle,
    readiness: ReadinessTracker,
    frame_loop: FrameLoop,
    load: Option<LoadHandle>,
    model: Option<NodeId>,
}

fn build_scene(config: &ShowcaseConfig) -> (Scene, NodeId) {
    let mut scene = Scene::new(srgb_hex(config.background), config.ambient, config.sun);

    let (vertices, indices) = shapes::plane(config.ground.width, config.ground.depth);
    let ground_material = Material {
        double_sided: true,
        ..Material::coloured(GROUND_NAME, srgb_hex_rgba(config.ground.colour))
    };
    let mut ground = SceneNode::mesh(
        GROUND_NAME,
        MeshData::new(GROUND_NAME, vertices, indices, ground_material),
    );
    ground.transform.rotation = Euler::new(Rad(-FRAC_PI_2), Rad(0.0), Rad(0.0)).into();
    ground.receive_shadow = true;
    scene.add(ground);

    let size = config.cube.size;
    let (vertices, indices) = shapes::cuboid(size, size, size);
    let cube_material = Material::coloured(CUBE_NAME, srgb_hex_rgba(config.cube.colour));
    let mut cube = SceneNode::mesh(
        CUBE_NAME,
        MeshData::new(CUBE_NAME, vertices, indices, cube_material),
    );
    cube.transform.position = config.cube.position;
    cube.cast_shadow = true;
    let cube = scene.add(cube);

    (scene, cube)
}

impl Showcase {
    pub fn new(
        config: ShowcaseConfig,
        view: Box<dyn ChecklistView>,
        width: u32,
        height: u32,
    ) -> Self {
        let (scene, cube) = build_scene(&config);

        let projection = Projection::new(
            width.max(1),
            height.max(1),
            config.camera.fovy,
            config.camera.znear,
            config.camera.zfar,
        );
        let camera = Camera::new(config.camera.position, config.camera.target, projection);
        let controls = OrbitControls::new(config.controls, &camera, width, height);
        let frame_loop = FrameLoop::with_increment(cube, StopToken::new(), config.spin_increment);

        Self {
            config,
            scene,
            cube,
            camera,
            controls,
            spin: SpinToggle::default(),
            readiness: ReadinessTracker::new(view),
            frame_loop,
            load: None,
            model: None,
        }
    }

    /// Every statically known feature is ready once the scene is built and a
    /// renderer exists.
    pub fn mark_startup(&mut self) {
        self.readiness.mark_startup();
        self.readiness.show_spin_label(self.spin.label());
    }

    /// Start loading the configured model. Returns immediately.
    pub fn start_loading(&mut self, loader: &AssetLoader) {
        if let Some(mut previous) = self.load.take() {
            previous.cancel();
        }
        self.load = Some(loader.start(&self.config.model_path));
    }

    fn apply_events(&mut self, events: Vec<LoaderEvent>) -> bool {
        let mut settled = false;
        for event in events {
            match event {
                LoaderEvent::Progress(progress) => match progress.percent() {
                    Some(percent) => log::debug!("model {:.0}% loaded", percent),
                    None => log::debug!("model {} bytes loaded", progress.loaded),
                },
                LoaderEvent::Finished(outcome) => {
                    settled = true;
                    self.model = loader::apply_outcome(
                        outcome,
                        &mut self.scene,
                        &mut self.readiness,
                        &self.config.placement,
                    );
                }
            }
        }
        settled
    }

    /// Apply whatever the loader reported since the last call. Returns true
    /// when the load settled during this call.
    pub fn drain_loader(&mut self) -> bool {
        let Some(handle) = self.load.as_mut() else {
            return false;
        };
        let events = handle.poll();
        let finished = handle.is_finished();
        let settled = self.apply_events(events);
        if finished {
            self.load = None;
        }
        settled
    }

    /// Wait until the in-flight load settles and apply its outcome.
    pub async fn finish_loading(&mut self) -> bool {
        let Some(mut handle) = self.load.take() else {
            return false;
        };
        let events = handle.wait().await;
        self.apply_events(events)
    }

    pub fn is_loading(&self) -> bool {
        self.load.is_some()
    }

    pub fn toggle_spin(&mut self) -> &'static str {
        let label = self.spin.toggle();
        log::debug!("spin toggled: {}", label);
        self.readiness.show_spin_label(label);
        label
    }

    /// Forward pointer input to the orbit controls.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.controls.handle_window_event(event)
    }

    pub fn resize<R: SceneRenderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        width: u32,
        height: u32,
    ) -> bool {
        if width > 0 && height > 0 {
            self.controls.set_viewport(width, height);
        }
        handle_resize(&mut self.camera, renderer, width, height)
    }

    /// One iteration of the render loop, after applying pending loader events.
    pub fn frame<R: SceneRenderer>(
        &mut self,
        renderer: &mut R,
        schedule_next: impl FnOnce(),
    ) -> Result<LoopState, R::Error> {
        if !self.frame_loop.stop_token().is_stopped() {
            self.drain_loader();
        }
        self.frame_loop.step(
            self.spin.is_spinning(),
            &mut self.scene,
            &mut self.camera,
            &mut self.controls,
            renderer,
            schedule_next,
        )
    }

    /// Stop the render loop and cancel a load still in flight.
    pub fn stop(&mut self) {
        self.frame_loop.stop_token().stop();
        if let Some(mut handle) = self.load.take() {
            handle.cancel();
        }
    }

    pub fn stop_token(&self) -> StopToken {
        self.frame_loop.stop_token().clone()
    }

    pub fn config(&self) -> &ShowcaseConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn cube(&self) -> NodeId {
        self.cube
    }

    /// The attached model, once it loaded.
    pub fn model(&self) -> Option<NodeId> {
        self.model
    }

    pub fn readiness(&self) -> &ReadinessTracker {
        &self.readiness
    }

    pub fn is_spinning(&self) -> bool {
        self.spin.is_spinning()
    }

    pub fn rotation(&self) -> SpinRotation {
        self.frame_loop.rotation()
    }

    pub fn frames(&self) -> u64 {
        self.frame_loop.frames()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::InnerSpace;

    use super::*;
    use crate::{readiness::Feature, ui::NullChecklist};

    struct NoopRenderer {
        draws: usize,
        size: (u32, u32),
    }

    impl SceneRenderer for NoopRenderer {
        type Error = ();

        fn draw(&mut self, _scene: &Scene, _camera: &Camera) -> Result<(), ()> {
            self.draws += 1;
            Ok(())
        }

        fn resize(&mut self, width: u32, height: u32) -> bool {
            let changed = self.size != (width, height);
            self.size = (width, height);
            changed
        }
    }

    fn showcase() -> Showcase {
        Showcase::new(ShowcaseConfig::default(), Box::new(NullChecklist), 800, 600)
    }

    #[test]
    fn scene_has_ground_and_cube() {
        let showcase = showcase();
        let scene = showcase.scene();

        let ground = scene.find(GROUND_NAME).and_then(|id| scene.node(id)).unwrap();
        assert!(ground.receive_shadow && !ground.cast_shadow);
        assert!(ground.meshes[0].material.double_sided);

        let cube = scene.node(showcase.cube()).unwrap();
        assert_eq!(cube.name, CUBE_NAME);
        assert!(cube.cast_shadow);
        assert_eq!(cube.transform.position, cgmath::Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn ground_lies_flat() {
        let showcase = showcase();
        let scene = showcase.scene();
        let ground = scene.find(GROUND_NAME).and_then(|id| scene.node(id)).unwrap();
        let normal = ground.transform.rotation * cgmath::Vector3::unit_z();
        assert!((normal - cgmath::Vector3::unit_y()).magnitude() < 1e-5);
    }

    #[test]
    fn startup_leaves_the_loader_unset() {
        let mut showcase = showcase();
        showcase.mark_startup();

        let readiness = showcase.readiness();
        assert_eq!(readiness.get(Feature::Loader), None);
        assert_eq!(
            readiness.entries().filter(|(_, ready)| *ready == Some(true)).count(),
            11
        );
    }

    #[test]
    fn frames_spin_the_cube_until_toggled() {
        let mut showcase = showcase();
        let mut renderer = NoopRenderer {
            draws: 0,
            size: (800, 600),
        };

        for _ in 0..3 {
            showcase.frame(&mut renderer, || {}).unwrap();
        }
        assert_eq!(showcase.toggle_spin(), crate::spin::LABEL_OFF);
        showcase.frame(&mut renderer, || {}).unwrap();

        assert_eq!(renderer.draws, 4);
        assert!((showcase.rotation().x - 0.03).abs() < 1e-6);
        assert!(!showcase.is_spinning());
    }

    #[test]
    fn stop_ends_the_loop() {
        let mut showcase = showcase();
        let mut renderer = NoopRenderer {
            draws: 0,
            size: (800, 600),
        };
        showcase.stop();

        let state = showcase.frame(&mut renderer, || panic!("scheduled after stop"));

        assert_eq!(state, Ok(LoopState::Stopped));
        assert_eq!(renderer.draws, 0);
        assert!(showcase.stop_token().is_stopped());
    }

    #[test]
    fn resize_updates_aspect() {
        let mut showcase = showcase();
        let mut renderer = NoopRenderer {
            draws: 0,
            size: (800, 600),
        };

        assert!(showcase.resize(&mut renderer, 1000, 500));
        assert!((showcase.camera().projection.aspect - 2.0).abs() < 1e-6);
        assert!(!showcase.resize(&mut renderer, 1000, 500));
        assert!(!showcase.resize(&mut renderer, 0, 500));
        assert!((showcase.camera().projection.aspect - 2.0).abs() < 1e-6);
    }
}
