use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use std::collections::{HashMap, HashSet};
use std::f32::consts::{PI, TAU};

use crate::scene::{Blending, Camera, Color, Geometry, Primitive, PrimitiveId, Scene, VertexBuffer};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    fn new(position: Vec3, color: Color) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_rgba(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Lines,
    Triangles,
    Additive,
}

/// World-space vertex lists for one frame.
#[derive(Debug, Default)]
pub struct DrawList {
    /// Line-list pairs.
    pub lines: Vec<Vertex>,
    /// Depth-tested, depth-writing triangles.
    pub triangles: Vec<Vertex>,
    /// Triangles blended additively on top.
    pub additive: Vec<Vertex>,
}

impl DrawList {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.triangles.is_empty() && self.additive.is_empty()
    }

    fn target_mut(&mut self, target: Target) -> &mut Vec<Vertex> {
        match target {
            Target::Lines => &mut self.lines,
            Target::Triangles => &mut self.triangles,
            Target::Additive => &mut self.additive,
        }
    }
}

struct CachedBuffer {
    world: Mat4,
    axes: (Vec3, Vec3),
    target: Target,
    vertices: Vec<Vertex>,
}

/// Flattens a scene into draw lists. Line and point buffers are rebuilt
/// only when their contents are dirty or their world placement or the
/// camera moved; otherwise last frame's vertices are reused.
#[derive(Default)]
pub struct Tessellator {
    cache: HashMap<PrimitiveId, CachedBuffer>,
    rebuilt: u64,
    reused: u64,
}

impl Tessellator {
    pub fn rebuilt(&self) -> u64 {
        self.rebuilt
    }

    pub fn reused(&self) -> u64 {
        self.reused
    }

    pub fn tessellate(&mut self, scene: &Scene, camera: &Camera) -> DrawList {
        let axes = camera.billboard_axes();
        let mut list = DrawList::default();
        let mut seen = HashSet::new();
        let cache = &mut self.cache;
        let (rebuilt, reused) = (&mut self.rebuilt, &mut self.reused);

        scene.walk(|id, primitive, world| {
            let target = match (&primitive.geometry, primitive.material.blending) {
                (Geometry::Line(_), _) => Target::Lines,
                (_, Blending::Normal) => Target::Triangles,
                (_, Blending::Additive) => Target::Additive,
            };

            match &primitive.geometry {
                Geometry::Group => {}
                Geometry::Line(buffer) | Geometry::Points(buffer) => {
                    seen.insert(id);
                    let fresh = cache.get(&id).is_some_and(|cached| {
                        !buffer.is_dirty()
                            && cached.world == world
                            && cached.axes == axes
                            && cached.target == target
                    });
                    if fresh {
                        *reused += 1;
                    } else {
                        *rebuilt += 1;
                        cache.insert(
                            id,
                            CachedBuffer {
                                world,
                                axes,
                                target,
                                vertices: buffer_vertices(primitive, buffer, world, axes),
                            },
                        );
                    }
                    if let Some(cached) = cache.get(&id) {
                        list.target_mut(target).extend_from_slice(&cached.vertices);
                    }
                }
                Geometry::Cuboid { size } => {
                    push_cuboid(list.target_mut(target), world, *size, primitive.material.color)
                }
                Geometry::Sphere { radius, segments } => push_sphere(
                    list.target_mut(target),
                    world,
                    *radius,
                    *segments,
                    primitive.material.color,
                ),
            }
        });

        self.cache.retain(|id, _| seen.contains(id));
        list
    }
}

fn buffer_vertices(
    primitive: &Primitive,
    buffer: &VertexBuffer,
    world: Mat4,
    (right, up): (Vec3, Vec3),
) -> Vec<Vertex> {
    let mut out = Vec::new();
    match primitive.geometry {
        Geometry::Line(_) => {
            let points: Vec<Vertex> = buffer
                .positions()
                .iter()
                .enumerate()
                .map(|(i, &p)| Vertex::new(world.transform_point3(p), vertex_color(primitive, buffer.colors(), i)))
                .collect();
            for pair in points.windows(2) {
                out.extend_from_slice(pair);
            }
        }
        _ => {
            let half = primitive.material.point_size / 2.0;
            for (i, &p) in buffer.positions().iter().enumerate() {
                let centre = world.transform_point3(p);
                push_quad(
                    &mut out,
                    [
                        centre - right * half - up * half,
                        centre + right * half - up * half,
                        centre + right * half + up * half,
                        centre - right * half + up * half,
                    ],
                    vertex_color(primitive, buffer.colors(), i),
                );
            }
        }
    }
    out
}

fn vertex_color(primitive: &Primitive, colors: &[Color], index: usize) -> Color {
    if primitive.material.vertex_colors {
        colors.get(index).copied().unwrap_or(primitive.material.color)
    } else {
        primitive.material.color
    }
}

fn push_quad(out: &mut Vec<Vertex>, corners: [Vec3; 4], color: Color) {
    for i in [0, 1, 2, 0, 2, 3] {
        out.push(Vertex::new(corners[i], color));
    }
}

// Unit cube faces as corner indices, two triangles each.
const CUBE_FACES: [[usize; 4]; 6] = [
    [0, 1, 3, 2], // -x
    [4, 6, 7, 5], // +x
    [0, 4, 5, 1], // -y
    [2, 3, 7, 6], // +y
    [0, 2, 6, 4], // -z
    [1, 5, 7, 3], // +z
];

fn push_cuboid(out: &mut Vec<Vertex>, world: Mat4, size: Vec3, color: Color) {
    let half = size / 2.0;
    let corners: Vec<Vec3> = (0..8)
        .map(|i| {
            let local = Vec3::new(
                if i & 4 != 0 { half.x } else { -half.x },
                if i & 2 != 0 { half.y } else { -half.y },
                if i & 1 != 0 { half.z } else { -half.z },
            );
            world.transform_point3(local)
        })
        .collect();

    for face in CUBE_FACES {
        push_quad(out, face.map(|i| corners[i]), color);
    }
}

fn push_sphere(out: &mut Vec<Vertex>, world: Mat4, radius: f32, segments: u32, color: Color) {
    let segments = segments.max(3);
    let rings = segments;
    let point = |ring: u32, segment: u32| {
        let phi = ring as f32 / rings as f32 * PI;
        let theta = segment as f32 / segments as f32 * TAU;
        let local = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()) * radius;
        world.transform_point3(local)
    };

    for ring in 0..rings {
        for segment in 0..segments {
            push_quad(
                out,
                [
                    point(ring, segment),
                    point(ring + 1, segment),
                    point(ring + 1, segment + 1),
                    point(ring, segment + 1),
                ],
                color,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, SceneHost, Transform};

    fn camera() -> Camera {
        Camera::new(75.0, 10.0, 640, 480)
    }

    fn tessellate(scene: &Scene) -> DrawList {
        Tessellator::default().tessellate(scene, &camera())
    }

    #[test]
    fn empty_scene_draws_nothing() {
        assert!(tessellate(&Scene::new()).is_empty());
    }

    #[test]
    fn line_becomes_segment_pairs() {
        let mut scene = Scene::new();
        let buffer = VertexBuffer::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![Color::WHITE; 3]);
        scene.add(Primitive::line(buffer), None);

        let list = tessellate(&scene);
        assert_eq!(list.lines.len(), 4);
        assert_eq!(list.lines[1], list.lines[2]);
    }

    #[test]
    fn cuboid_inherits_group_transform() {
        let mut scene = Scene::new();
        let group = scene.add(
            Primitive::group().with_transform(Transform::at(Vec3::new(0.0, 3.0, 0.0))),
            None,
        );
        scene.add(Primitive::cuboid(Vec3::ONE, Color::WHITE), Some(group));

        let list = tessellate(&scene);
        assert_eq!(list.triangles.len(), 36);
        let min_y = list
            .triangles
            .iter()
            .map(|v| v.position[1])
            .fold(f32::MAX, f32::min);
        assert!((min_y - 2.5).abs() < 1e-5);
    }

    #[test]
    fn points_face_the_camera() {
        let mut scene = Scene::new();
        let buffer = VertexBuffer::new(vec![Vec3::ZERO], vec![Color::WHITE]);
        scene.add(Primitive::points(buffer, 0.2), None);

        let list = tessellate(&scene);
        assert_eq!(list.triangles.len(), 6);
        assert!(list.triangles.iter().all(|v| v.position[2].abs() < 1e-6));
    }

    #[test]
    fn additive_spheres_are_kept_apart() {
        let mut scene = Scene::new();
        let material = Material {
            blending: Blending::Additive,
            ..Material::basic(Color::WHITE)
        };
        scene.add(Primitive::sphere(0.1, 8, material), None);

        let list = tessellate(&scene);
        assert!(list.triangles.is_empty());
        assert_eq!(list.additive.len(), 8 * 8 * 6);
    }

    #[test]
    fn clean_buffers_are_reused_until_mutated() {
        let mut scene = Scene::new();
        let buffer = VertexBuffer::new(vec![Vec3::ZERO, Vec3::X], vec![Color::WHITE; 2]);
        let id = scene.add(Primitive::points(buffer, 0.2), None);
        let camera = camera();
        let mut tessellator = Tessellator::default();

        let first = tessellator.tessellate(&scene, &camera);
        scene.mark_clean();
        let second = tessellator.tessellate(&scene, &camera);
        assert_eq!((tessellator.rebuilt(), tessellator.reused()), (1, 1));
        assert_eq!(first.triangles, second.triangles);

        scene
            .get_mut(id)
            .and_then(Primitive::vertex_buffer_mut)
            .unwrap()
            .set_position(1, Vec3::new(0.0, 2.0, 0.0));
        let third = tessellator.tessellate(&scene, &camera);
        assert_eq!(tessellator.rebuilt(), 2);
        assert_ne!(second.triangles, third.triangles);
    }

    #[test]
    fn moved_transform_invalidates_clean_buffer() {
        let mut scene = Scene::new();
        let buffer = VertexBuffer::new(vec![Vec3::ZERO, Vec3::X], vec![Color::WHITE; 2]);
        let id = scene.add(Primitive::line(buffer), None);
        let camera = camera();
        let mut tessellator = Tessellator::default();

        tessellator.tessellate(&scene, &camera);
        scene.mark_clean();
        scene.get_mut(id).unwrap().transform.rotation.y += 0.5;
        tessellator.tessellate(&scene, &camera);
        assert_eq!((tessellator.rebuilt(), tessellator.reused()), (2, 0));
    }

    #[test]
    fn removed_primitives_leave_the_cache() {
        let mut scene = Scene::new();
        let buffer = VertexBuffer::new(vec![Vec3::ZERO], vec![Color::WHITE]);
        let id = scene.add(Primitive::points(buffer, 0.2), None);
        let mut tessellator = Tessellator::default();

        tessellator.tessellate(&scene, &camera());
        assert_eq!(tessellator.cache.len(), 1);
        scene.remove(id);
        assert!(tessellator.tessellate(&scene, &camera()).is_empty());
        assert!(tessellator.cache.is_empty());
    }
}
