use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::AnalyzerConfig;
use crate::error::{Result, VizError};
use crate::mapper::MapperConfig;
use crate::render::{Mode, RenderConfig};
use crate::visualizer::{FftSizes, VisualizerConfig};

const CONFIG_FILE: &str = "cosmoscope.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub analyzer: AnalyzerSection,
    #[serde(default)]
    pub mapper: MapperConfig,
    #[serde(default)]
    pub render: RenderConfig,
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
    pub bitrate: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default = "default_cycle_secs")]
    pub cycle_secs: f32,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzerSection {
    #[serde(default = "default_smoothing")]
    pub smoothing_time_constant: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
    #[serde(default)]
    pub fft_size: FftSizes,
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
            bitrate: None,
            mode: None,
            cycle_secs: default_cycle_secs(),
        }
    }
}

impl Default for AnalyzerSection {
    fn default() -> Self {
        Self {
            smoothing_time_constant: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
            fft_size: FftSizes::default(),
        }
    }
}

fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_fps() -> u32 { 60 }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }
fn default_pix_fmt() -> String { "yuv420p".into() }
fn default_cycle_secs() -> f32 { 10.0 }
fn default_smoothing() -> f32 { 0.8 }
fn default_min_decibels() -> f32 { -100.0 }
fn default_max_decibels() -> f32 { -30.0 }

impl Config {
    /// Core settings for a [`crate::visualizer::Visualizer`] starting in `mode`.
    pub fn visualizer_config(&self, mode: Mode) -> Result<VisualizerConfig> {
        let config = VisualizerConfig {
            analyzer: AnalyzerConfig {
                fft_size: self.analyzer.fft_size.for_mode(mode),
                smoothing_time_constant: self.analyzer.smoothing_time_constant,
                min_decibels: self.analyzer.min_decibels,
                max_decibels: self.analyzer.max_decibels,
            },
            fft_sizes: self.analyzer.fft_size,
            mapper: self.mapper,
            render: self.render.clone(),
            mode,
        };
        config.validate()?;
        Ok(config)
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|err| VizError::InvalidConfig(err.to_string()))
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// `explicit`, else `./cosmoscope.toml`, else `~/.config/cosmoscope/config.toml`,
/// else the platform config directory.
pub fn discover_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("cosmoscope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("cosmoscope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
