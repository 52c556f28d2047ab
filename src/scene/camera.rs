use glam::{Mat4, Vec3};

/// Fixed perspective camera looking down -Z at the origin.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub eye: Vec3,
    pub target: Vec3,
}

impl Camera {
    pub fn new(fov_y_degrees: f32, distance: f32, width: u32, height: u32) -> Self {
        Self {
            fov_y_degrees,
            aspect: width as f32 / height.max(1) as f32,
            near: 0.1,
            far: 1000.0,
            eye: Vec3::new(0.0, 0.0, distance),
            target: Vec3::ZERO,
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    /// wgpu clip space (depth 0..1).
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// World-space right and up vectors of the image plane, for billboards.
    pub fn billboard_axes(&self) -> (Vec3, Vec3) {
        let inverse = self.view().inverse();
        (
            inverse.x_axis.truncate().normalize(),
            inverse.y_axis.truncate().normalize(),
        )
    }
}
