use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{Visualizer, VisualizerKind};
use crate::audio::AudioFrameSource;
use crate::scene::SceneHost;

/// User-facing selection, written only by the switcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub visualizer_style: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            visualizer_style: VisualizerKind::DEFAULT.label().to_string(),
        }
    }
}

/// Owner of the active visualizer.
pub struct Switcher {
    settings: Settings,
    current: Option<Box<dyn Visualizer>>,
    seed: Option<u64>,
}

impl Switcher {
    /// With a seed, every construction of a randomised variant starts from
    /// the same state; without one each construction draws fresh entropy.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            settings: Settings::default(),
            current: None,
            seed,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_kind(&self) -> Option<VisualizerKind> {
        self.current.as_ref().map(|viz| viz.kind())
    }

    /// Dispose the active visualizer, then construct the one named by
    /// `name`. Unrecognised names select the default variant.
    pub fn switch_visualizer(
        &mut self,
        name: &str,
        scene: &mut dyn SceneHost,
        audio: &dyn AudioFrameSource,
    ) -> VisualizerKind {
        self.settings.visualizer_style = name.to_string();

        if VisualizerKind::try_from_label(name).is_none() {
            log::warn!(
                "Unknown visualizer '{}', using {}",
                name,
                VisualizerKind::DEFAULT.label()
            );
        }
        let kind = VisualizerKind::from_label(name);

        if let Some(previous) = self.current.take() {
            log::debug!("Disposing {}", previous.kind().label());
            previous.dispose(scene);
        }

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.current = Some(kind.build(scene, audio, rng));
        log::debug!("Switched to {} ({} primitives in scene)", kind.label(), scene.len());
        kind
    }

    pub fn update(&mut self, time: f32, audio: &mut dyn AudioFrameSource, scene: &mut dyn SceneHost) {
        if let Some(viz) = self.current.as_mut() {
            viz.update(time, audio, scene);
        }
    }

    /// Dispose the active visualizer, leaving none.
    pub fn shutdown(&mut self, scene: &mut dyn SceneHost) {
        if let Some(viz) = self.current.take() {
            viz.dispose(scene);
        }
    }
}
