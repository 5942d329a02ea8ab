//! Perspective camera and damped orbit controls.
//!
//! [`Camera`] is a look-at camera with its own [`Projection`]. [`OrbitControls`]
//! turns pointer and wheel input into a pending spherical delta around a
//! target and eases the camera towards it a little on every
//! [`update`](OrbitControls::update), the same way the browser orbit controls
//! do with damping enabled.

use std::f32::consts::{FRAC_PI_2, PI};

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::{data_structures::scene_graph::Scene, frame::CameraControls};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const EPS: f32 = 1e-6;
/// Smaller camera moves are float noise from the spherical round trip.
const MOVE_EPS: f32 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Projection {
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub projection: Projection,
}

impl Camera {
    pub fn new(position: Point3<f32>, target: Point3<f32>, projection: Projection) -> Self {
        Self {
            position,
            target,
            up: Vector3::unit_y(),
            projection,
        }
    }

    pub fn calc_view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.projection.calc_matrix() * self.calc_view()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = camera.view_proj().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Tuning of [`OrbitControls`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OrbitConfig {
    /// Share of the pending motion applied per update. `None` disables damping.
    pub damping: Option<f32>,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar: f32,
    pub max_polar: f32,
    /// Pan along the screen plane instead of the ground plane.
    pub screen_space_panning: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            damping: Some(0.05),
            min_distance: 3.0,
            max_distance: 50.0,
            min_polar: 0.0,
            max_polar: FRAC_PI_2 - 0.05,
            screen_space_panning: false,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct Spherical {
    radius: f32,
    /// Polar angle from +Y.
    phi: f32,
    /// Azimuth around +Y, measured from +Z.
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius < EPS {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Drag {
    None,
    Rotate,
    Pan,
}

/// Damped orbit/dolly/pan controls around `camera.target`.
#[derive(Debug)]
pub struct OrbitControls {
    config: OrbitConfig,
    pending: Spherical,
    scale: f32,
    pan_offset: Vector3<f32>,
    drag: Drag,
    cursor: Option<(f64, f64)>,
    viewport: (u32, u32),
    /// Cached when input arrives so pan distance can be scaled without the camera.
    target_distance: f32,
    fovy: Rad<f32>,
    camera_basis: (Vector3<f32>, Vector3<f32>),
}

impl OrbitControls {
    pub fn new(config: OrbitConfig, camera: &Camera, width: u32, height: u32) -> Self {
        let mut controls = Self {
            config,
            pending: Spherical::default(),
            scale: 1.0,
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
            drag: Drag::None,
            cursor: None,
            viewport: (width, height),
            target_distance: 1.0,
            fovy: camera.projection.fovy,
            camera_basis: (Vector3::unit_x(), Vector3::unit_y()),
        };
        controls.observe(camera);
        controls
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    /// Rotate around the target: positive `angle` moves the camera to the left.
    pub fn rotate_left(&mut self, angle: f32) {
        self.pending.theta -= angle;
    }

    /// Positive `angle` moves the camera up towards the pole.
    pub fn rotate_up(&mut self, angle: f32) {
        self.pending.phi -= angle;
    }

    /// `factor < 1` moves the camera closer to the target.
    pub fn dolly_in(&mut self, factor: f32) {
        self.scale *= factor;
    }

    pub fn dolly_out(&mut self, factor: f32) {
        self.scale /= factor;
    }

    /// Pan by a pointer delta in physical pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let height = self.viewport.1.max(1) as f32;
        let distance = self.target_distance * (self.fovy.0 / 2.0).tan();
        let (right, up) = self.camera_basis;
        let left = -right * (2.0 * dx * distance / height) * self.config.pan_speed;
        let up_dir = if self.config.screen_space_panning {
            up
        } else {
            // Forward along the ground plane.
            Vector3::unit_y().cross(right)
        };
        let upward = up_dir * (2.0 * dy * distance / height) * self.config.pan_speed;
        self.pan_offset += left + upward;
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.config.zoom_speed)
    }

    fn observe(&mut self, camera: &Camera) {
        let offset = camera.position - camera.target;
        self.target_distance = offset.magnitude();
        self.fovy = camera.projection.fovy;
        let forward = -offset.normalize();
        let right = forward.cross(camera.up).normalize();
        let up = right.cross(forward);
        if right.x.is_finite() {
            self.camera_basis = (right, up);
        }
    }

    /// Feed a winit window event. Returns true when the event was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (state, button) {
                    (ElementState::Pressed, MouseButton::Left) => Drag::Rotate,
                    (ElementState::Pressed, MouseButton::Right) => Drag::Pan,
                    (ElementState::Pressed, MouseButton::Middle) => Drag::Pan,
                    (ElementState::Released, _) => Drag::None,
                    _ => self.drag,
                };
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let previous = self.cursor.replace((position.x, position.y));
                let Some((px, py)) = previous else {
                    return false;
                };
                let (dx, dy) = ((position.x - px) as f32, (position.y - py) as f32);
                self.drag_by(dx, dy)
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = Drag::None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                if scroll > 0.0 {
                    self.dolly_in(self.zoom_scale());
                } else if scroll < 0.0 {
                    self.dolly_out(self.zoom_scale());
                }
                scroll != 0.0
            }
            _ => false,
        }
    }

    /// Apply a pointer drag of `dx`, `dy` physical pixels with the current button.
    pub fn drag_by(&mut self, dx: f32, dy: f32) -> bool {
        let height = self.viewport.1.max(1) as f32;
        match self.drag {
            Drag::Rotate => {
                self.rotate_left(2.0 * PI * dx / height * self.config.rotate_speed);
                self.rotate_up(2.0 * PI * dy / height * self.config.rotate_speed);
                true
            }
            Drag::Pan => {
                self.pan(dx, dy);
                true
            }
            Drag::None => false,
        }
    }

    pub fn start_rotate(&mut self) {
        self.drag = Drag::Rotate;
    }

    pub fn start_pan(&mut self) {
        self.drag = Drag::Pan;
    }

    /// Whether any motion is still being eased in.
    pub fn is_settling(&self) -> bool {
        self.pending.theta.abs() > EPS
            || self.pending.phi.abs() > EPS
            || self.pan_offset.magnitude2() > EPS * EPS
            || (self.scale - 1.0).abs() > EPS
    }

    /// Ease `camera` towards the pending input. Returns whether it moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let before = camera.position;
        let offset = camera.position - camera.target;
        let mut spherical = Spherical::from_offset(offset);

        let damping = self.config.damping;
        match damping {
            Some(factor) => {
                spherical.theta += self.pending.theta * factor;
                spherical.phi += self.pending.phi * factor;
            }
            None => {
                spherical.theta += self.pending.theta;
                spherical.phi += self.pending.phi;
            }
        }

        spherical.phi = spherical
            .phi
            .clamp(self.config.min_polar, self.config.max_polar)
            .clamp(EPS, PI - EPS);
        spherical.radius = (spherical.radius * self.scale)
            .clamp(self.config.min_distance, self.config.max_distance);

        match damping {
            Some(factor) => camera.target += self.pan_offset * factor,
            None => camera.target += self.pan_offset,
        }

        camera.position = camera.target + spherical.to_offset();

        match damping {
            Some(factor) => {
                self.pending.theta *= 1.0 - factor;
                self.pending.phi *= 1.0 - factor;
                self.pan_offset *= 1.0 - factor;
            }
            None => {
                self.pending = Spherical::default();
                self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
            }
        }
        self.scale = 1.0;
        self.observe(camera);

        (camera.position - before).magnitude2() > MOVE_EPS * MOVE_EPS
    }
}

impl CameraControls for OrbitControls {
    fn update(&mut self, camera: &mut Camera, _scene: &Scene) -> bool {
        OrbitControls::update(self, camera)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, EuclideanSpace};

    use super::*;

    fn camera() -> Camera {
        Camera::new(
            Point3::new(5.0, 5.0, 10.0),
            Point3::origin(),
            Projection::new(1600, 900, Deg(75.0), 0.1, 1000.0),
        )
    }

    fn distance(camera: &Camera) -> f32 {
        (camera.position - camera.target).magnitude()
    }

    #[test]
    fn resize_recomputes_aspect() {
        let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
        projection.resize(1920, 1080);
        assert!((projection.aspect - 1920.0 / 1080.0).abs() < 1e-6);
        let once = projection;
        projection.resize(1920, 1080);
        assert_eq!(projection, once);
    }

    #[test]
    fn idle_controls_leave_camera_in_place() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(OrbitConfig::default(), &camera, 1600, 900);
        let start = camera.position;

        let moved = controls.update(&mut camera);

        assert!(!moved);
        assert!((camera.position - start).magnitude() < 1e-4);
    }

    #[test]
    fn damped_rotation_eases_in_and_settles() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(OrbitConfig::default(), &camera, 1600, 900);
        controls.rotate_left(0.5);
        let radius = distance(&camera);

        let first = camera.position;
        controls.update(&mut camera);
        let step_one = (camera.position - first).magnitude();
        let second = camera.position;
        controls.update(&mut camera);
        let step_two = (camera.position - second).magnitude();

        assert!(step_one > 0.0);
        assert!(step_two < step_one, "motion should decay under damping");
        for _ in 0..2000 {
            controls.update(&mut camera);
        }
        assert!(!controls.is_settling());
        assert!((distance(&camera) - radius).abs() < 1e-3);
    }

    #[test]
    fn undamped_rotation_applies_at_once() {
        let mut camera = camera();
        let config = OrbitConfig {
            damping: None,
            ..Default::default()
        };
        let mut controls = OrbitControls::new(config, &camera, 1600, 900);
        controls.rotate_left(0.3);
        controls.update(&mut camera);
        assert!(!controls.is_settling());
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn distance_is_clamped() {
        let mut camera = camera();
        let config = OrbitConfig {
            damping: None,
            ..Default::default()
        };
        let mut controls = OrbitControls::new(config, &camera, 1600, 900);

        controls.dolly_in(0.01);
        controls.update(&mut camera);
        assert!((distance(&camera) - 3.0).abs() < 1e-4);

        controls.dolly_out(0.001);
        controls.update(&mut camera);
        assert!((distance(&camera) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn dolly_in_moves_closer() {
        let mut camera = camera();
        let config = OrbitConfig {
            damping: None,
            ..Default::default()
        };
        let mut controls = OrbitControls::new(config, &camera, 1600, 900);
        let start = distance(&camera);

        controls.dolly_in(controls.zoom_scale());
        controls.update(&mut camera);
        let closer = distance(&camera);
        assert!(closer < start);

        controls.dolly_out(controls.zoom_scale());
        controls.update(&mut camera);
        assert!((distance(&camera) - start).abs() < 1e-3);
    }

    #[test]
    fn camera_never_dips_below_the_ground() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(OrbitConfig::default(), &camera, 1600, 900);
        controls.start_rotate();
        for _ in 0..50 {
            controls.drag_by(0.0, -400.0);
            controls.update(&mut camera);
        }
        let offset = camera.position - camera.target;
        let phi = (offset.y / offset.magnitude()).acos();
        assert!(phi <= FRAC_PI_2 - 0.05 + 1e-4);
        assert!(camera.position.y > camera.target.y);
    }

    #[test]
    fn ground_panning_keeps_height() {
        let mut camera = camera();
        let config = OrbitConfig {
            damping: None,
            ..Default::default()
        };
        let mut controls = OrbitControls::new(config, &camera, 1600, 900);
        controls.start_pan();
        controls.drag_by(120.0, 80.0);
        controls.update(&mut camera);

        assert!(camera.target.y.abs() < 1e-5);
        assert!(camera.target.to_vec().magnitude() > 0.0);
    }
}
