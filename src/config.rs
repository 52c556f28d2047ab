use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audio::analyser::{AnalyserError, AnalyserSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("output {0} must be greater than zero")]
    ZeroOutput(&'static str),
    #[error("crf {0} is outside 0-51")]
    InvalidCrf(u32),
    #[error("camera fov {0} must be between 0 and 180 degrees")]
    InvalidFov(f32),
    #[error("camera distance {0} must be positive")]
    InvalidDistance(f32),
    #[error("switch time {0} must be a non-negative number of seconds")]
    InvalidSwitchTime(f32),
    #[error(transparent)]
    Analyser(#[from] AnalyserError),
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub visualizer: VisualizerConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    #[serde(default)]
    pub font: Option<PathBuf>,
}

/// Analyser node parameters.
#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

#[derive(Debug, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default = "default_distance")]
    pub distance: f32,
}

#[derive(Debug, Deserialize)]
pub struct VisualizerConfig {
    #[serde(default = "default_visualizer")]
    pub default: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub switch: Vec<SwitchEntry>,
}

/// `[[visualizer.switch]]`: select `visualizer` once playback reaches `at`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SwitchEntry {
    pub at: f32,
    pub visualizer: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
            font: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: default_fov(),
            distance: default_distance(),
        }
    }
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            default: default_visualizer(),
            seed: None,
            switch: Vec::new(),
        }
    }
}

fn default_width() -> u32 { 1920 }
fn default_height() -> u32 { 1080 }
fn default_fps() -> u32 { 60 }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }
fn default_pix_fmt() -> String { "yuv420p".into() }
fn default_fft_size() -> usize { 256 }
fn default_smoothing() -> f32 { 0.8 }
fn default_min_decibels() -> f32 { -100.0 }
fn default_max_decibels() -> f32 { -30.0 }
fn default_fov() -> f32 { 75.0 }
fn default_distance() -> f32 { 10.0 }
fn default_visualizer() -> String { "Waveform".into() }

impl AudioConfig {
    pub fn analyser_settings(&self) -> AnalyserSettings {
        AnalyserSettings {
            fft_size: self.fft_size,
            smoothing: self.smoothing,
            min_decibels: self.min_decibels,
            max_decibels: self.max_decibels,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let output = &self.output;
        for (name, value) in [("width", output.width), ("height", output.height), ("fps", output.fps)] {
            if value == 0 {
                return Err(ConfigError::ZeroOutput(name));
            }
        }
        if output.crf > 51 {
            return Err(ConfigError::InvalidCrf(output.crf));
        }
        if !(self.camera.fov > 0.0 && self.camera.fov < 180.0) {
            return Err(ConfigError::InvalidFov(self.camera.fov));
        }
        if !(self.camera.distance > 0.0) {
            return Err(ConfigError::InvalidDistance(self.camera.distance));
        }
        if let Some(entry) = self
            .visualizer
            .switch
            .iter()
            .find(|entry| !(entry.at >= 0.0) || !entry.at.is_finite())
        {
            return Err(ConfigError::InvalidSwitchTime(entry.at));
        }
        self.audio.analyser_settings().validate()?;
        Ok(())
    }
}

pub fn parse_config(content: &str, path: &Path) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, path)
}

/// `pulseviz.toml` in the working directory, then the per-user config dir.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("pulseviz.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("pulseviz").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    let platform = dirs::config_dir()?.join("pulseviz").join("config.toml");
    platform.exists().then_some(platform)
}
