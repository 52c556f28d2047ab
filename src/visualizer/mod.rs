//! Audio-reactive visualizers and the switcher that swaps them.
//!
//! Every visualizer owns its primitives outright: it attaches them in its
//! constructor, mutates them on each `update`, and detaches them all in
//! `dispose`. Nothing is shared between variants.

pub mod frequency_bars;
pub mod geometric;
pub mod particles;
pub mod switcher;
pub mod waveform;

use rand::rngs::StdRng;

use crate::audio::AudioFrameSource;
use crate::scene::SceneHost;

pub use frequency_bars::FrequencyBars;
pub use geometric::GeometricPatterns;
pub use particles::ParticleExplosion;
pub use switcher::Switcher;
pub use waveform::Waveform;

pub trait Visualizer {
    fn kind(&self) -> VisualizerKind;

    /// Pull fresh frames from `audio` and restyle the owned primitives for
    /// `time` (seconds, non-decreasing between calls).
    fn update(&mut self, time: f32, audio: &mut dyn AudioFrameSource, scene: &mut dyn SceneHost);

    /// Detach and release every owned primitive.
    fn dispose(self: Box<Self>, scene: &mut dyn SceneHost);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VisualizerKind {
    Waveform,
    ParticleExplosion,
    GeometricPatterns,
    FrequencyBars,
}

impl VisualizerKind {
    pub const ALL: [VisualizerKind; 4] = [
        VisualizerKind::Waveform,
        VisualizerKind::ParticleExplosion,
        VisualizerKind::GeometricPatterns,
        VisualizerKind::FrequencyBars,
    ];

    pub const DEFAULT: VisualizerKind = VisualizerKind::Waveform;

    pub fn label(self) -> &'static str {
        match self {
            VisualizerKind::Waveform => "Waveform",
            VisualizerKind::ParticleExplosion => "Particle Explosion",
            VisualizerKind::GeometricPatterns => "Geometric Patterns",
            VisualizerKind::FrequencyBars => "Frequency Bars",
        }
    }

    /// Exact, case-sensitive label match.
    pub fn try_from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }

    /// Like `try_from_label`, but anything unrecognised is the default.
    pub fn from_label(label: &str) -> Self {
        Self::try_from_label(label).unwrap_or(Self::DEFAULT)
    }

    pub fn build(
        self,
        scene: &mut dyn SceneHost,
        audio: &dyn AudioFrameSource,
        rng: StdRng,
    ) -> Box<dyn Visualizer> {
        match self {
            VisualizerKind::Waveform => Box::new(Waveform::new(scene, audio)),
            VisualizerKind::ParticleExplosion => Box::new(ParticleExplosion::new(scene, audio, rng)),
            VisualizerKind::GeometricPatterns => Box::new(GeometricPatterns::new(scene, audio)),
            VisualizerKind::FrequencyBars => Box::new(FrequencyBars::new(scene, audio)),
        }
    }
}

/// Split `frame` into `out.len()` contiguous bands of `frame.len() / out.len()`
/// bins each and store each band's mean, normalised to 0.0-1.0. Trailing
/// bins that do not fill a band are ignored; bands are 0 when the frame is
/// shorter than the band count.
pub fn band_averages(frame: &[u8], out: &mut [f32]) {
    let step = if out.is_empty() { 0 } else { frame.len() / out.len() };
    for (i, band) in out.iter_mut().enumerate() {
        if step == 0 {
            *band = 0.0;
            continue;
        }
        let sum: u32 = frame[i * step..(i + 1) * step].iter().map(|&b| b as u32).sum();
        *band = sum as f32 / step as f32 / 255.0;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::audio::AudioFrameSource;

    /// Hands out whatever frames the test put in.
    pub struct ScriptedSource {
        pub frequency: Vec<u8>,
        pub time_domain: Vec<u8>,
    }

    impl ScriptedSource {
        pub fn constant(frame_size: usize, frequency: u8, time_domain: u8) -> Self {
            Self {
                frequency: vec![frequency; frame_size],
                time_domain: vec![time_domain; frame_size],
            }
        }

        pub fn silent(frame_size: usize) -> Self {
            Self::constant(frame_size, 0, 128)
        }
    }

    impl AudioFrameSource for ScriptedSource {
        fn frame_size(&self) -> usize {
            self.frequency.len()
        }

        fn frequency_frame(&mut self, out: &mut [u8]) {
            out.copy_from_slice(&self.frequency);
        }

        fn time_domain_frame(&mut self, out: &mut [u8]) {
            out.copy_from_slice(&self.time_domain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for kind in VisualizerKind::ALL {
            assert_eq!(VisualizerKind::from_label(kind.label()), kind);
        }
    }

    #[test]
    fn unknown_or_miscased_labels_fall_back_to_waveform() {
        assert_eq!(VisualizerKind::from_label("bogus"), VisualizerKind::Waveform);
        assert_eq!(VisualizerKind::from_label("frequency bars"), VisualizerKind::Waveform);
        assert_eq!(VisualizerKind::try_from_label(""), None);
    }

    #[test]
    fn bands_use_floor_division() {
        // 10 bins into 3 bands: 3 bins each, the last bin is ignored.
        let frame = [255, 255, 255, 0, 0, 0, 51, 51, 51, 255];
        let mut bands = [0.0; 3];
        band_averages(&frame, &mut bands);
        assert_eq!(bands, [1.0, 0.0, 0.2]);
    }

    #[test]
    fn short_frame_yields_silent_bands() {
        let mut bands = [1.0; 4];
        band_averages(&[255, 255], &mut bands);
        assert_eq!(bands, [0.0; 4]);
    }
}
