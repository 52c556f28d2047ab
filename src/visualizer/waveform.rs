use glam::Vec3;
use std::f32::consts::TAU;

use super::{Visualizer, VisualizerKind};
use crate::audio::{source::amplitude, AudioFrameSource};
use crate::scene::{Color, Primitive, PrimitiveId, SceneHost, VertexBuffer};

const SPAN: f32 = 10.0;
const HEIGHT_SCALE: f32 = 2.0;
const RIPPLE_DEPTH: f32 = 2.0;

/// Time-domain polyline with a travelling depth ripple.
pub struct Waveform {
    line: PrimitiveId,
    samples: Vec<u8>,
}

impl Waveform {
    pub fn new(scene: &mut dyn SceneHost, audio: &dyn AudioFrameSource) -> Self {
        let n = audio.frame_size();
        let positions = (0..n)
            .map(|i| Vec3::new(gradient(i, n) * SPAN - SPAN / 2.0, 0.0, 0.0))
            .collect();
        let colors = (0..n)
            .map(|i| Color::from_hsl(gradient(i, n), 1.0, 0.5))
            .collect();

        let line = scene.add(Primitive::line(VertexBuffer::new(positions, colors)), None);

        Self {
            line,
            samples: vec![0; n],
        }
    }
}

/// Position of vertex `i` along the line, 0.0 at the first vertex and 1.0 at the last.
fn gradient(i: usize, n: usize) -> f32 {
    if n <= 1 {
        return 0.0;
    }
    i as f32 / (n - 1) as f32
}

pub fn vertex_height(sample: u8) -> f32 {
    amplitude(sample) * HEIGHT_SCALE
}

impl Visualizer for Waveform {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::Waveform
    }

    fn update(&mut self, time: f32, audio: &mut dyn AudioFrameSource, scene: &mut dyn SceneHost) {
        audio.time_domain_frame(&mut self.samples);

        let Some(buffer) = scene
            .get_mut(self.line)
            .and_then(|line| line.vertex_buffer_mut())
        else {
            return;
        };

        let n = self.samples.len();
        for (i, &sample) in self.samples.iter().enumerate() {
            let y = vertex_height(sample);
            let z = (i as f32 / n as f32 * TAU + time).sin() * RIPPLE_DEPTH;
            let x = buffer.positions()[i].x;
            buffer.set_position(i, Vec3::new(x, y, z));

            let lightness = ((y + HEIGHT_SCALE) / (2.0 * HEIGHT_SCALE)).clamp(0.0, 1.0);
            buffer.set_color(i, Color::from_hsl(gradient(i, n), 1.0, lightness));
        }
    }

    fn dispose(self: Box<Self>, scene: &mut dyn SceneHost) {
        scene.remove(self.line);
    }
}
