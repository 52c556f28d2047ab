use glam::Vec3;
use std::f32::consts::TAU;

use super::{band_averages, Visualizer, VisualizerKind};
use crate::audio::AudioFrameSource;
use crate::scene::{Color, Primitive, PrimitiveId, SceneHost, Transform};

pub const SHAPE_COUNT: usize = 32;
const RING_RADIUS: f32 = 5.0;
const SHAPE_SIZE: f32 = 0.5;
const SHAPE_SPIN: f32 = 0.01;
const RING_SPIN: f32 = 0.005;

/// Ring of boxes, one per frequency band, growing up from the ring plane.
pub struct GeometricPatterns {
    ring: PrimitiveId,
    shapes: Vec<PrimitiveId>,
    bins: Vec<u8>,
    bands: Vec<f32>,
}

impl GeometricPatterns {
    pub fn new(scene: &mut dyn SceneHost, audio: &dyn AudioFrameSource) -> Self {
        let ring = scene.add(Primitive::group(), None);
        let shapes = (0..SHAPE_COUNT)
            .map(|i| {
                let angle = i as f32 / SHAPE_COUNT as f32 * TAU;
                let position = Vec3::new(angle.cos() * RING_RADIUS, 0.0, angle.sin() * RING_RADIUS);
                let color = Color::from_hsl(i as f32 / SHAPE_COUNT as f32, 1.0, 0.5);
                scene.add(
                    Primitive::cuboid(Vec3::splat(SHAPE_SIZE), color)
                        .with_transform(Transform::at(position)),
                    Some(ring),
                )
            })
            .collect();

        Self {
            ring,
            shapes,
            bins: vec![0; audio.frame_size()],
            bands: vec![0.0; SHAPE_COUNT],
        }
    }
}

pub fn shape_scale(level: f32) -> f32 {
    0.5 + level * 2.0
}

impl Visualizer for GeometricPatterns {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::GeometricPatterns
    }

    fn update(&mut self, _time: f32, audio: &mut dyn AudioFrameSource, scene: &mut dyn SceneHost) {
        audio.frequency_frame(&mut self.bins);
        band_averages(&self.bins, &mut self.bands);

        for (&shape, &level) in self.shapes.iter().zip(&self.bands) {
            let Some(primitive) = scene.get_mut(shape) else {
                continue;
            };
            let scale = shape_scale(level);
            primitive.transform.scale.y = scale;
            primitive.transform.position.y = (scale - 0.5) / 2.0;
            primitive.transform.rotation.y += SHAPE_SPIN;
        }

        if let Some(ring) = scene.get_mut(self.ring) {
            ring.transform.rotation.y += RING_SPIN;
        }
    }

    fn dispose(self: Box<Self>, scene: &mut dyn SceneHost) {
        scene.remove(self.ring);
    }
}
