use glam::{EulerRot, Mat4, Quat, Vec3};

use super::color::Color;

/// Local position, XYZ Euler rotation (radians) and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// Per-vertex positions and colours. Mutation marks the buffer dirty so the
/// renderer knows to re-upload it.
#[derive(Clone, Debug)]
pub struct VertexBuffer {
    positions: Vec<Vec3>,
    colors: Vec<Color>,
    dirty: bool,
}

impl VertexBuffer {
    pub fn new(positions: Vec<Vec3>, colors: Vec<Color>) -> Self {
        debug_assert_eq!(positions.len(), colors.len());
        Self {
            positions,
            colors,
            dirty: true,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn set_position(&mut self, index: usize, position: Vec3) {
        self.positions[index] = position;
        self.dirty = true;
    }

    pub fn set_color(&mut self, index: usize, color: Color) {
        self.colors[index] = color;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[derive(Clone, Debug)]
pub enum Geometry {
    /// Transform-only node; children inherit its transform.
    Group,
    /// Polyline through the buffer's vertices.
    Line(VertexBuffer),
    /// One camera-facing square per vertex.
    Points(VertexBuffer),
    Cuboid { size: Vec3 },
    Sphere { radius: f32, segments: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blending {
    Normal,
    Additive,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub color: Color,
    /// Use the vertex buffer colours instead of `color`.
    pub vertex_colors: bool,
    pub blending: Blending,
    /// World-space edge length of each point for `Geometry::Points`.
    pub point_size: f32,
}

impl Material {
    pub fn basic(color: Color) -> Self {
        Self {
            color,
            vertex_colors: false,
            blending: Blending::Normal,
            point_size: 1.0,
        }
    }

    pub fn vertex_colored() -> Self {
        Self {
            vertex_colors: true,
            ..Self::basic(Color::WHITE)
        }
    }
}

/// A renderable node owned by exactly one visualizer.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub transform: Transform,
    pub geometry: Geometry,
    pub material: Material,
}

impl Primitive {
    pub fn group() -> Self {
        Self {
            transform: Transform::default(),
            geometry: Geometry::Group,
            material: Material::basic(Color::WHITE),
        }
    }

    pub fn line(buffer: VertexBuffer) -> Self {
        Self {
            transform: Transform::default(),
            geometry: Geometry::Line(buffer),
            material: Material::vertex_colored(),
        }
    }

    pub fn points(buffer: VertexBuffer, point_size: f32) -> Self {
        Self {
            transform: Transform::default(),
            geometry: Geometry::Points(buffer),
            material: Material {
                point_size,
                ..Material::vertex_colored()
            },
        }
    }

    pub fn cuboid(size: Vec3, color: Color) -> Self {
        Self {
            transform: Transform::default(),
            geometry: Geometry::Cuboid { size },
            material: Material::basic(color),
        }
    }

    pub fn sphere(radius: f32, segments: u32, material: Material) -> Self {
        Self {
            transform: Transform::default(),
            geometry: Geometry::Sphere { radius, segments },
            material,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    #[cfg(test)]
    pub fn vertex_buffer(&self) -> Option<&VertexBuffer> {
        match &self.geometry {
            Geometry::Line(buffer) | Geometry::Points(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn vertex_buffer_mut(&mut self) -> Option<&mut VertexBuffer> {
        match &mut self.geometry {
            Geometry::Line(buffer) | Geometry::Points(buffer) => Some(buffer),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn is_cuboid(&self) -> bool {
        matches!(self.geometry, Geometry::Cuboid { .. })
    }
}
