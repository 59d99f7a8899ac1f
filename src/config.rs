//! Reader configuration and defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;
use crate::model::{RenderMode, ThumbSize};

/// Returned by `Reader::count` when no comic is loaded.
pub const NOFILE: i32 = -100;
/// Pixel cap for one tile edge.
pub const DEFAULT_MAX_TILE_EDGE: u32 = 512;
/// Minimum number of image files a directory needs to be read as a comic.
pub const DEFAULT_MIN_IMAGES_FOR_DIR: usize = 1;
/// Name of the side-car directory holding cover thumbnails.
pub const THUMBNAILS_DIR: &str = ".thumbnails";
/// Size of one chunk handed through the RAR extraction pipe.
pub const PIPE_BUFFER_SIZE: usize = 32 * 1024;

/// Everything a [`Reader`](crate::reader::Reader) can be tuned with.
///
/// Can be built in code or parsed from TOML; keys left out of the document
/// keep their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Rotate pages whose natural aspect is landscape.
    pub auto_rotate_landscape: bool,
    /// Compare entry names case-insensitively when sorting.
    pub ignore_case: bool,
    pub max_tile_edge: u32,
    /// Starting downscale factor for the single-bitmap path.
    pub initial_scale: u32,
    pub cover_thumb_size: ThumbSize,
    pub min_images_for_dir_backend: usize,
    /// Bytes of decoded pixels the reader may hold at once. `None` is unlimited.
    pub memory_budget: Option<u64>,
    pub render_mode: RenderMode,
    pub thumbnail_dir_name: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            auto_rotate_landscape: true,
            ignore_case: true,
            max_tile_edge: DEFAULT_MAX_TILE_EDGE,
            initial_scale: 1,
            cover_thumb_size: ThumbSize::default(),
            min_images_for_dir_backend: DEFAULT_MIN_IMAGES_FOR_DIR,
            memory_budget: None,
            render_mode: RenderMode::default(),
            thumbnail_dir_name: THUMBNAILS_DIR.to_string(),
        }
    }
}

impl ReaderConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ReaderError> {
        let config: ReaderConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ReaderError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ReaderError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ReaderError> {
        if self.max_tile_edge == 0 {
            return Err(ReaderError::Config("max_tile_edge must be at least 1".into()));
        }
        if self.initial_scale == 0 {
            return Err(ReaderError::Config("initial_scale must be at least 1".into()));
        }
        if self.cover_thumb_size.width == 0 || self.cover_thumb_size.height == 0 {
            return Err(ReaderError::Config(
                "cover_thumb_size must be non-zero".into(),
            ));
        }
        if self.thumbnail_dir_name.is_empty() {
            return Err(ReaderError::Config(
                "thumbnail_dir_name must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn decode_policy(&self) -> DecodePolicy {
        DecodePolicy {
            max_tile_edge: self.max_tile_edge,
            auto_rotate_landscape: self.auto_rotate_landscape,
            ignore_case: self.ignore_case,
            initial_scale: self.initial_scale,
            render_mode: self.render_mode,
        }
    }
}

/// The subset of [`ReaderConfig`] the image decoder consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodePolicy {
    pub max_tile_edge: u32,
    pub auto_rotate_landscape: bool,
    pub ignore_case: bool,
    pub initial_scale: u32,
    pub render_mode: RenderMode,
}

impl Default for DecodePolicy {
    fn default() -> Self {
        ReaderConfig::default().decode_policy()
    }
}
