use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::render::Colormap;
use crate::transform::TransformKind;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub score: ScoreConfig,
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
    #[serde(default)]
    pub font: Option<PathBuf>,
    #[serde(default)]
    pub font_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_transform")]
    pub transform: TransformKind,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_bins")]
    pub bins: usize,
    #[serde(default = "default_min_freq")]
    pub min_freq: f32,
    #[serde(default = "default_max_freq")]
    pub max_freq: f32,
    #[serde(default = "default_span")]
    pub span: f32,
    #[serde(default = "default_floor_db")]
    pub floor_db: f32,
    #[serde(default = "default_colormap")]
    pub colormap: Colormap,
}

#[derive(Debug, Deserialize)]
pub struct ScoreConfig {
    #[serde(default = "default_musescore")]
    pub musescore: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            font: None,
            font_url: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            transform: default_transform(),
            fft_size: default_fft_size(),
            bins: default_bins(),
            min_freq: default_min_freq(),
            max_freq: default_max_freq(),
            span: default_span(),
            floor_db: default_floor_db(),
            colormap: default_colormap(),
        }
    }
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            musescore: default_musescore(),
            workers: default_workers(),
        }
    }
}

pub fn default_width() -> u32 { 1920 }
pub fn default_height() -> u32 { 1080 }
pub fn default_fps() -> u32 { 30 }
pub fn default_crf() -> u32 { 18 }
pub fn default_codec() -> String { "libx264".into() }
pub fn default_transform() -> TransformKind { TransformKind::Stft }
pub fn default_fft_size() -> usize { 4096 }
pub fn default_bins() -> usize { 128 }
pub fn default_min_freq() -> f32 { 40.0 }
pub fn default_max_freq() -> f32 { 16000.0 }
pub fn default_span() -> f32 { 4.0 }
pub fn default_floor_db() -> f32 { -90.0 }
pub fn default_colormap() -> Colormap { Colormap::Magma }
pub fn default_musescore() -> PathBuf { "mscore".into() }
pub fn default_workers() -> usize { 8 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

/// Explicit path first, then `./amusing.toml`, then the per-user config files.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("amusing.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("amusing").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("amusing").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
