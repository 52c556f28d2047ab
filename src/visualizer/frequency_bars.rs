use glam::Vec3;

use super::{band_averages, Visualizer, VisualizerKind};
use crate::audio::AudioFrameSource;
use crate::scene::{Color, Primitive, PrimitiveId, SceneHost, Transform};

pub const BAR_COUNT: usize = 64;
const BAR_SPACING: f32 = 0.4;
const BAR_SIZE: Vec3 = Vec3::new(0.3, 1.0, 0.3);

struct Bar {
    id: PrimitiveId,
    hue: f32,
}

/// A row of bars on a shared baseline, one per frequency band.
pub struct FrequencyBars {
    row: PrimitiveId,
    bars: Vec<Bar>,
    bins: Vec<u8>,
    bands: Vec<f32>,
}

impl FrequencyBars {
    pub fn new(scene: &mut dyn SceneHost, audio: &dyn AudioFrameSource) -> Self {
        let row = scene.add(Primitive::group(), None);
        let start_x = -(BAR_COUNT as f32 * BAR_SPACING) / 2.0;

        let bars = (0..BAR_COUNT)
            .map(|i| {
                let hue = i as f32 / BAR_COUNT as f32;
                let position = Vec3::new(start_x + i as f32 * BAR_SPACING, 0.5, 0.0);
                let id = scene.add(
                    Primitive::cuboid(BAR_SIZE, Color::from_hsl(hue, 1.0, 0.5))
                        .with_transform(Transform::at(position)),
                    Some(row),
                );
                Bar { id, hue }
            })
            .collect();

        Self {
            row,
            bars,
            bins: vec![0; audio.frame_size()],
            bands: vec![0.0; BAR_COUNT],
        }
    }
}

pub fn bar_height(level: f32) -> f32 {
    0.1 + level * 5.0
}

pub fn bar_lightness(level: f32) -> f32 {
    (0.3 + level * 0.7).clamp(0.0, 1.0)
}

impl Visualizer for FrequencyBars {
    fn kind(&self) -> VisualizerKind {
        VisualizerKind::FrequencyBars
    }

    fn update(&mut self, _time: f32, audio: &mut dyn AudioFrameSource, scene: &mut dyn SceneHost) {
        audio.frequency_frame(&mut self.bins);
        band_averages(&self.bins, &mut self.bands);

        for (bar, &level) in self.bars.iter().zip(&self.bands) {
            let Some(primitive) = scene.get_mut(bar.id) else {
                continue;
            };
            let height = bar_height(level);
            primitive.transform.scale.y = height;
            primitive.transform.position.y = height / 2.0;
            primitive.material.color = Color::from_hsl(bar.hue, 1.0, bar_lightness(level));
        }
    }

    fn dispose(self: Box<Self>, scene: &mut dyn SceneHost) {
        scene.remove(self.row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;
    use crate::visualizer::testing::ScriptedSource;

    #[test]
    fn row_is_built_left_to_right() {
        let mut scene = Scene::new();
        let viz = FrequencyBars::new(&mut scene, &ScriptedSource::silent(128));
        assert_eq!(scene.count_where(Primitive::is_cuboid), BAR_COUNT);

        let xs: Vec<f32> = viz
            .bars
            .iter()
            .map(|bar| scene.get(bar.id).unwrap().transform.position.x)
            .collect();
        assert!((xs[0] + 12.8).abs() < 1e-5);
        assert!(xs.windows(2).all(|w| (w[1] - w[0] - BAR_SPACING).abs() < 1e-5));
    }

    #[test]
    fn bars_grow_from_baseline_and_lighten() {
        let mut scene = Scene::new();
        let mut audio = ScriptedSource::silent(128);
        // Two bins per band.
        audio.frequency[..2].fill(255);
        audio.frequency[2..4].fill(0);
        let mut viz = FrequencyBars::new(&mut scene, &audio);
        viz.update(0.0, &mut audio, &mut scene);

        let loud = scene.get(viz.bars[0].id).unwrap();
        assert!((loud.transform.scale.y - 5.1).abs() < 1e-6);
        assert!((loud.transform.position.y - 2.55).abs() < 1e-6);
        assert!((loud.material.color.to_hsl().l - 1.0).abs() < 1e-5);

        let quiet = scene.get(viz.bars[1].id).unwrap();
        assert!((quiet.transform.scale.y - 0.1).abs() < 1e-6);
        assert!((quiet.material.color.to_hsl().l - 0.3).abs() < 1e-5);
    }

    #[test]
    fn recolouring_keeps_hue() {
        let mut scene = Scene::new();
        let mut audio = ScriptedSource::constant(128, 100, 128);
        let mut viz = FrequencyBars::new(&mut scene, &audio);
        viz.update(0.0, &mut audio, &mut scene);

        let bar = &viz.bars[16];
        let hsl = scene.get(bar.id).unwrap().material.color.to_hsl();
        assert!((hsl.h - 0.25).abs() < 1e-4);
    }

    #[test]
    fn height_is_monotonic_in_level() {
        let levels = [0.0, 0.2, 0.4, 0.8, 1.0];
        assert!(levels.windows(2).all(|w| bar_height(w[0]) < bar_height(w[1])));
    }

    #[test]
    fn dispose_releases_every_bar() {
        let mut scene = Scene::new();
        let viz = Box::new(FrequencyBars::new(&mut scene, &ScriptedSource::silent(128)));
        viz.dispose(&mut scene);
        assert_eq!(scene.len(), 0);
    }
}
