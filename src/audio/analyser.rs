use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;
use thiserror::Error;

use super::decode::AudioData;
use super::source::AudioFrameSource;

#[derive(Debug, Error, PartialEq)]
pub enum AnalyserError {
    #[error("fft size {0} must be a power of two between 32 and 32768")]
    InvalidFftSize(usize),
    #[error("smoothing time constant {0} must be within 0.0-1.0")]
    InvalidSmoothing(f32),
    #[error("min decibels ({min}) must be below max decibels ({max})")]
    InvalidDecibelRange { min: f32, max: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalyserSettings {
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserSettings {
    pub fn validate(&self) -> Result<(), AnalyserError> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(AnalyserError::InvalidFftSize(self.fft_size));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(AnalyserError::InvalidSmoothing(self.smoothing));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(AnalyserError::InvalidDecibelRange {
                min: self.min_decibels,
                max: self.max_decibels,
            });
        }
        Ok(())
    }
}

/// Byte frequency and waveform frames over a decoded track, read at a
/// movable playhead. Matches the browser analyser: Blackman window,
/// exponential smoothing across analyses, dB mapped onto 0-255.
pub struct AnalyserSource {
    samples: Vec<f32>,
    sample_rate: u32,
    settings: AnalyserSettings,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    frequency_bytes: Vec<u8>,
    playhead: usize,
    analysed_at: Option<usize>,
}

impl AnalyserSource {
    pub fn new(audio: AudioData, settings: AnalyserSettings) -> Result<Self, AnalyserError> {
        settings.validate()?;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(settings.fft_size);
        let bins = settings.fft_size / 2;

        Ok(Self {
            samples: audio.samples,
            sample_rate: audio.sample_rate.max(1),
            settings,
            fft,
            window: blackman_window(settings.fft_size),
            buffer: vec![Complex::new(0.0, 0.0); settings.fft_size],
            smoothed: vec![0.0; bins],
            frequency_bytes: vec![0; bins],
            playhead: 0,
            analysed_at: None,
        })
    }

    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Sample at `offset` within the window ending at the playhead; zero
    /// outside the track.
    fn window_sample(&self, offset: usize) -> f32 {
        let start = self.playhead as isize - self.settings.fft_size as isize;
        let index = start + offset as isize;
        if index < 0 {
            return 0.0;
        }
        self.samples.get(index as usize).copied().unwrap_or(0.0)
    }

    fn analyse(&mut self) {
        let n = self.settings.fft_size;
        for i in 0..n {
            self.buffer[i] = Complex::new(self.window_sample(i) * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let tau = self.settings.smoothing;
        let min_db = self.settings.min_decibels;
        let range = self.settings.max_decibels - min_db;

        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() / n as f32;
            let next = tau * *smoothed + (1.0 - tau) * magnitude;
            *smoothed = if next.is_finite() { next } else { 0.0 };

            let db = 20.0 * smoothed.log10();
            let scaled = (255.0 / range * (db - min_db)).floor();
            self.frequency_bytes[k] = if scaled.is_finite() {
                scaled.clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }

        self.analysed_at = Some(self.playhead);
    }
}

impl AudioFrameSource for AnalyserSource {
    fn frame_size(&self) -> usize {
        self.settings.fft_size / 2
    }

    fn frequency_frame(&mut self, out: &mut [u8]) {
        // Smoothing advances once per playhead position, however many
        // visualizers read the same tick.
        if self.analysed_at != Some(self.playhead) {
            self.analyse();
        }
        let len = out.len().min(self.frequency_bytes.len());
        out[..len].copy_from_slice(&self.frequency_bytes[..len]);
        out[len..].fill(0);
    }

    fn time_domain_frame(&mut self, out: &mut [u8]) {
        for (i, byte) in out.iter_mut().enumerate() {
            let sample = if i < self.settings.fft_size {
                self.window_sample(i)
            } else {
                0.0
            };
            *byte = (128.0 * (1.0 + sample)).floor().clamp(0.0, 255.0) as u8;
        }
    }

    fn seek(&mut self, seconds: f32) {
        self.playhead = (seconds.max(0.0) * self.sample_rate as f32) as usize;
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42, 0.5, 0.08);
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}
