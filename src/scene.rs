//! Scene setup around the particle field: camera, model rotation and the
//! scripted obstacle.

use glam::{Mat4, Vec3};

use crate::lighting::Light;
use crate::physics::Obstacle;

/// Fixed camera looking at the field.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fovy: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fovy: 1.0,
            near: 1.0,
            far: 10.0,
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Perspective projection in the OpenGL depth convention the slicer expects.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fovy, aspect.max(f32::EPSILON), self.near, self.far)
    }
}

/// Mouse-driven rotation of the field around its origin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModelRotation {
    /// Rotation about the vertical axis in radians.
    pub yaw: f32,
    /// Rotation about the horizontal axis in radians.
    pub pitch: f32,
}

impl ModelRotation {
    /// Apply a pointer drag given in pixels.
    pub fn drag(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * 0.005;
        self.pitch = (self.pitch + dy * 0.005).clamp(-1.5, 1.5);
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.yaw) * Mat4::from_rotation_x(self.pitch)
    }
}

/// Straight-line path of the obstacle sphere through the field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleScript {
    /// Center at time zero.
    pub start: Vec3,
    /// Velocity in units per second.
    pub velocity: Vec3,
    pub radius: f32,
}

impl Default for ObstacleScript {
    fn default() -> Self {
        Self {
            start: Vec3::new(0.0, 0.0, 3.0),
            velocity: Vec3::new(0.0, 0.0, -2.0),
            radius: 0.5,
        }
    }
}

impl ObstacleScript {
    /// Obstacle state at simulation time `t`.
    pub fn at(&self, t: f32) -> Obstacle {
        Obstacle::new(self.start + self.velocity * t, self.radius)
    }
}

/// Everything the viewer needs besides the engine configuration.
#[derive(Clone, Debug)]
pub struct SceneConfig {
    pub camera: Camera,
    pub obstacle: ObstacleScript,
    /// Simulation seconds between particle resets.
    pub reset_interval: f32,
    /// Simulation seconds per physics step.
    pub timestep: f32,
    pub light: Light,
    /// Window title.
    pub title: String,
    pub window_size: (u32, u32),
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            camera: Camera::default(),
            obstacle: ObstacleScript::default(),
            reset_interval: 5.0,
            timestep: 1.0 / 60.0,
            light: Light::default(),
            title: "FlowMetaball".to_string(),
            window_size: (1280, 720),
        }
    }
}

impl SceneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_obstacle(mut self, obstacle: ObstacleScript) -> Self {
        self.obstacle = obstacle;
        self
    }

    pub fn with_reset_interval(mut self, seconds: f32) -> Self {
        self.reset_interval = seconds;
        self
    }

    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.light = light;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }
}
