//! Per-frame stepping of the showcase.
//!
//! [`FrameLoop::step`] is called once per `RedrawRequested`. It re-schedules
//! itself first, then advances the cube's spin, eases the camera controls and
//! finally issues exactly one draw. A shared [`StopToken`] turns every later
//! step into a no-op.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    camera::Camera,
    data_structures::scene_graph::{NodeId, Scene},
};

/// Radians added to the cube's x and y rotation each frame while spinning.
pub const SPIN_INCREMENT: f32 = 0.01;

/// The drawing side of a frame: anything that can present a scene through a
/// camera and follow viewport changes.
pub trait SceneRenderer {
    type Error;

    fn draw(&mut self, scene: &Scene, camera: &Camera) -> Result<(), Self::Error>;

    /// Returns false when the size was ignored (zero sized) or unchanged.
    fn resize(&mut self, width: u32, height: u32) -> bool;
}

pub trait CameraControls {
    /// Ease `camera` towards the pending input. `scene` already carries this
    /// frame's spin. Returns whether the camera moved.
    fn update(&mut self, camera: &mut Camera, scene: &Scene) -> bool;
}

/// Cloneable flag that ends the frame loop.
#[derive(Clone, Debug, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SpinRotation {
    pub x: f32,
    pub y: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

#[derive(Debug)]
pub struct FrameLoop {
    stop: StopToken,
    rotation: SpinRotation,
    increment: f32,
    target: NodeId,
    frames: u64,
}

impl FrameLoop {
    /// A loop spinning the top-level node `target`.
    pub fn new(target: NodeId, stop: StopToken) -> Self {
        Self::with_increment(target, stop, SPIN_INCREMENT)
    }

    pub fn with_increment(target: NodeId, stop: StopToken, increment: f32) -> Self {
        Self {
            stop,
            rotation: SpinRotation::default(),
            increment,
            target,
            frames: 0,
        }
    }

    pub fn rotation(&self) -> SpinRotation {
        self.rotation
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn stop_token(&self) -> &StopToken {
        &self.stop
    }

    pub fn state(&self) -> LoopState {
        if self.stop.is_stopped() {
            LoopState::Stopped
        } else {
            LoopState::Running
        }
    }

    /// Run one iteration. Draw errors are handed back to the caller untouched;
    /// the frame still counts as run.
    pub fn step<R, C>(
        &mut self,
        spinning: bool,
        scene: &mut Scene,
        camera: &mut Camera,
        controls: &mut C,
        renderer: &mut R,
        schedule_next: impl FnOnce(),
    ) -> Result<LoopState, R::Error>
    where
        R: SceneRenderer,
        C: CameraControls + ?Sized,
    {
        if self.stop.is_stopped() {
            return Ok(LoopState::Stopped);
        }
        schedule_next();

        if spinning {
            self.rotation.x += self.increment;
            self.rotation.y += self.increment;
            match scene.node_mut(self.target) {
                Some(node) => node.transform.set_euler(self.rotation.x, self.rotation.y, 0.0),
                None => log::warn!("spin target {:?} is not in the scene", self.target),
            }
        }

        controls.update(camera, scene);
        self.frames += 1;
        renderer.draw(scene, camera)?;
        Ok(LoopState::Running)
    }
}

/// Follow a viewport change. Zero sized viewports (minimised windows) are
/// ignored, and an unchanged size leaves both camera and renderer alone.
pub fn handle_resize<R: SceneRenderer + ?Sized>(
    camera: &mut Camera,
    renderer: &mut R,
    width: u32,
    height: u32,
) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    camera.projection.resize(width, height);
    renderer.resize(width, height)
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use cgmath::{Deg, EuclideanSpace, One, Point3, Quaternion};

    use super::*;
    use crate::{
        camera::Projection,
        data_structures::{
            instance::Instance,
            model::{Material, MeshData},
            scene_graph::{AmbientLight, DirectionalLight, SceneNode, ShadowConfig},
            shapes,
        },
    };

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct MockRenderer {
        log: Log,
        draws: usize,
        size: (u32, u32),
        configures: usize,
        fail: bool,
    }

    impl MockRenderer {
        fn new(log: Log) -> Self {
            Self {
                log,
                draws: 0,
                size: (800, 600),
                configures: 0,
                fail: false,
            }
        }
    }

    impl SceneRenderer for MockRenderer {
        type Error = &'static str;

        fn draw(&mut self, _scene: &Scene, _camera: &Camera) -> Result<(), Self::Error> {
            self.log.borrow_mut().push("draw");
            self.draws += 1;
            if self.fail { Err("lost") } else { Ok(()) }
        }

        fn resize(&mut self, width: u32, height: u32) -> bool {
            if self.size == (width, height) {
                return false;
            }
            self.size = (width, height);
            self.configures += 1;
            true
        }
    }

    struct MockControls {
        log: Log,
        target: Option<NodeId>,
        seen: Vec<Quaternion<f32>>,
    }

    impl MockControls {
        fn new(log: Log) -> Self {
            Self {
                log,
                target: None,
                seen: Vec::new(),
            }
        }

        fn watching(log: Log, target: NodeId) -> Self {
            Self {
                target: Some(target),
                ..Self::new(log)
            }
        }
    }

    impl CameraControls for MockControls {
        fn update(&mut self, _camera: &mut Camera, scene: &Scene) -> bool {
            self.log.borrow_mut().push("controls");
            if let Some(node) = self.target.and_then(|id| scene.node(id)) {
                self.seen.push(node.transform.rotation);
            }
            false
        }
    }

    fn fixture() -> (Scene, NodeId, Camera) {
        let mut scene = Scene::new(
            [0.0; 3],
            AmbientLight {
                colour: [1.0; 3],
                intensity: 0.5,
            },
            DirectionalLight {
                colour: [1.0; 3],
                intensity: 1.0,
                position: Point3::new(5.0, 10.0, 7.5),
                target: Point3::origin(),
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
        );
        let (vertices, indices) = shapes::cuboid(1.0, 1.0, 1.0);
        let cube = scene.add(SceneNode::mesh(
            "cube",
            MeshData::new("cube", vertices, indices, Material::default()),
        ));
        let camera = Camera::new(
            Point3::new(5.0, 5.0, 10.0),
            Point3::origin(),
            Projection::new(800, 600, Deg(75.0), 0.1, 1000.0),
        );
        (scene, cube, camera)
    }

    #[test]
    fn step_runs_schedule_rotation_controls_draw_in_order() {
        let log: Log = Rc::default();
        let (mut scene, cube, mut camera) = fixture();
        let mut renderer = MockRenderer::new(log.clone());
        let mut controls = MockControls::watching(log.clone(), cube);
        let mut frame = FrameLoop::new(cube, StopToken::new());

        let schedule_log = log.clone();
        let state = frame
            .step(true, &mut scene, &mut camera, &mut controls, &mut renderer, || {
                schedule_log.borrow_mut().push("schedule")
            })
            .unwrap();

        assert_eq!(state, LoopState::Running);
        assert_eq!(*log.borrow(), vec!["schedule", "controls", "draw"]);
        assert_eq!(renderer.draws, 1);
        // The controls already saw this frame's rotation.
        let mut spun = Instance::new();
        spun.set_euler(SPIN_INCREMENT, SPIN_INCREMENT, 0.0);
        assert_eq!(controls.seen, vec![spun.rotation]);
        assert_ne!(controls.seen[0], Quaternion::one());
    }

    #[test]
    fn spinning_frames_accumulate_the_increment() {
        let log: Log = Rc::default();
        let (mut scene, cube, mut camera) = fixture();
        let mut renderer = MockRenderer::new(log.clone());
        let mut controls = MockControls::new(log);
        let mut frame = FrameLoop::new(cube, StopToken::new());

        for _ in 0..120 {
            frame
                .step(true, &mut scene, &mut camera, &mut controls, &mut renderer, || {})
                .unwrap();
        }

        let rotation = frame.rotation();
        assert!((rotation.x - 120.0 * SPIN_INCREMENT).abs() < 1e-4);
        assert!((rotation.y - 120.0 * SPIN_INCREMENT).abs() < 1e-4);
        assert_ne!(scene.node(cube).unwrap().transform.rotation, Quaternion::one());
        assert_eq!(renderer.draws, 120);
    }

    #[test]
    fn paused_frames_keep_rotation() {
        let log: Log = Rc::default();
        let (mut scene, cube, mut camera) = fixture();
        let mut renderer = MockRenderer::new(log.clone());
        let mut controls = MockControls::new(log);
        let mut frame = FrameLoop::new(cube, StopToken::new());

        frame
            .step(true, &mut scene, &mut camera, &mut controls, &mut renderer, || {})
            .unwrap();
        let before = frame.rotation();
        let transform = scene.node(cube).unwrap().transform.clone();
        frame
            .step(false, &mut scene, &mut camera, &mut controls, &mut renderer, || {})
            .unwrap();

        assert_eq!(frame.rotation(), before);
        assert_eq!(scene.node(cube).unwrap().transform, transform);
        assert_eq!(renderer.draws, 2);
    }

    #[test]
    fn stopped_loop_neither_schedules_nor_draws() {
        let log: Log = Rc::default();
        let (mut scene, cube, mut camera) = fixture();
        let mut renderer = MockRenderer::new(log.clone());
        let mut controls = MockControls::new(log.clone());
        let stop = StopToken::new();
        let mut frame = FrameLoop::new(cube, stop.clone());

        stop.stop();
        let state = frame
            .step(true, &mut scene, &mut camera, &mut controls, &mut renderer, || {
                panic!("a stopped loop must not schedule")
            })
            .unwrap();

        assert_eq!(state, LoopState::Stopped);
        assert_eq!(frame.state(), LoopState::Stopped);
        assert!(log.borrow().is_empty());
        assert_eq!(frame.rotation(), SpinRotation::default());
    }

    #[test]
    fn draw_errors_are_returned() {
        let log: Log = Rc::default();
        let (mut scene, cube, mut camera) = fixture();
        let mut renderer = MockRenderer::new(log.clone());
        renderer.fail = true;
        let mut controls = MockControls::new(log);
        let mut frame = FrameLoop::new(cube, StopToken::new());

        let result = frame.step(true, &mut scene, &mut camera, &mut controls, &mut renderer, || {});

        assert_eq!(result, Err("lost"));
        assert_eq!(frame.frames(), 1);
    }

    #[test]
    fn resize_is_idempotent() {
        let log: Log = Rc::default();
        let (_, _, mut camera) = fixture();
        let mut renderer = MockRenderer::new(log);

        assert!(handle_resize(&mut camera, &mut renderer, 1280, 720));
        let aspect = camera.projection.aspect;
        assert!(!handle_resize(&mut camera, &mut renderer, 1280, 720));

        assert_eq!(camera.projection.aspect, aspect);
        assert_eq!(renderer.size, (1280, 720));
        assert_eq!(renderer.configures, 1);
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let log: Log = Rc::default();
        let (_, _, mut camera) = fixture();
        let mut renderer = MockRenderer::new(log);
        let aspect = camera.projection.aspect;

        assert!(!handle_resize(&mut camera, &mut renderer, 0, 720));
        assert!(!handle_resize(&mut camera, &mut renderer, 1280, 0));

        assert_eq!(camera.projection.aspect, aspect);
        assert_eq!(renderer.configures, 0);
    }
}
