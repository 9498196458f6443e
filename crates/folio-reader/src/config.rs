//! Reader settings loaded from JSON.

use core::fmt;
use std::path::Path;
use std::time::Duration;

use folio::ConvertOptions;
use folio_render::{LayoutConfig, RenderEngineOptions, Viewport};
use serde::{Deserialize, Serialize};

/// CBZ page decoding settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Horizontal space around a comic page, split over both sides.
    pub padding_x_px: u32,
    /// Vertical space around a comic page, including the label line.
    pub padding_y_px: u32,
    /// Gray levels after quantization; `0` keeps full 8-bit gray.
    pub gray_levels: u8,
    /// Window in which navigation and resize events coalesce.
    pub debounce_ms: u64,
    /// Decode threads allowed to run at once, superseded ones included.
    pub max_workers: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            padding_x_px: 32,
            padding_y_px: 64,
            gray_levels: 4,
            debounce_ms: 40,
            max_workers: 3,
        }
    }
}

impl LoaderConfig {
    /// Largest page size that fits `canvas`. A degenerate canvas falls back
    /// to the default viewport.
    pub fn fit_box(&self, canvas: Viewport) -> (u32, u32) {
        let canvas = if canvas.width == 0 || canvas.height == 0 {
            Viewport::default()
        } else {
            canvas
        };
        (
            canvas.width.saturating_sub(self.padding_x_px).max(1),
            canvas.height.saturating_sub(self.padding_y_px).max(1),
        )
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Worker cap, never below one.
    pub fn worker_limit(&self) -> usize {
        self.max_workers.max(1)
    }
}

/// Top-level reader settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub viewport: Viewport,
    pub layout: LayoutConfig,
    /// Element names treated as blocks by the converter.
    pub block_tags: Vec<String>,
    pub loader: LoaderConfig,
    /// A second PRESS inside this window is ignored while reading.
    pub press_guard_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            layout: LayoutConfig::default(),
            block_tags: ConvertOptions::default().block_tags,
            loader: LoaderConfig::default(),
            press_guard_ms: 300,
        }
    }
}

impl ReaderConfig {
    /// Parse JSON; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&json)
    }

    pub fn press_guard(&self) -> Duration {
        Duration::from_millis(self.press_guard_ms)
    }

    /// Engine options derived from these settings.
    pub fn engine_options(&self) -> RenderEngineOptions {
        RenderEngineOptions {
            convert: ConvertOptions::with_block_tags(&self.block_tags),
            layout: self.layout,
        }
    }
}

/// Failure loading a [`ReaderConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "config unreadable: {}", err),
            Self::Parse(err) => write!(f, "config invalid: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}
