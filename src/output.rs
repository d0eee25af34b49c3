//! Creation options for the output GeoTIFF.

use crate::error::{Result, TiledPredictError};
use std::fmt;
use std::str::FromStr;

/// Smallest overview dimension worth building.
const MIN_OVERVIEW_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Deflate,
    Lzw,
    Zstd,
    None,
}

impl FromStr for Compression {
    type Err = TiledPredictError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DEFLATE" => Ok(Self::Deflate),
            "LZW" => Ok(Self::Lzw),
            "ZSTD" => Ok(Self::Zstd),
            "NONE" => Ok(Self::None),
            _ => Err(TiledPredictError::InvalidCompression(s.to_string())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deflate => "DEFLATE",
            Self::Lzw => "LZW",
            Self::Zstd => "ZSTD",
            Self::None => "NONE",
        };
        f.write_str(name)
    }
}

/// Layout of the written prediction raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    pub compression: Compression,
    /// Block size of a tiled GeoTIFF; `None` writes scanlines.
    pub tile_size: Option<usize>,
    /// Write NaN where no patch contributed instead of ~0.
    pub mask_uncovered: bool,
    pub build_overviews: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Deflate,
            tile_size: Some(512),
            mask_uncovered: false,
            build_overviews: false,
        }
    }
}

impl OutputOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(tile_size) = self.tile_size {
            if tile_size == 0 || tile_size % 16 != 0 {
                return Err(TiledPredictError::InvalidTileSize(tile_size));
            }
        }
        Ok(())
    }

    /// GTiff driver creation options (`KEY=VALUE`).
    pub fn creation_options(&self) -> Vec<String> {
        let mut options = vec![format!("COMPRESS={}", self.compression)];
        if let Some(tile_size) = self.tile_size {
            options.push("TILED=YES".to_string());
            options.push(format!("BLOCKXSIZE={}", tile_size));
            options.push(format!("BLOCKYSIZE={}", tile_size));
        }
        options.push("BIGTIFF=IF_SAFER".to_string());
        options
    }
}

/// Power-of-two overview factors, stopping once the smaller side would drop
/// below 256 pixels.
pub fn overview_levels(width: usize, height: usize) -> Vec<i32> {
    let min_dim = width.min(height);
    let mut levels = Vec::new();
    let mut level = 2usize;

    while min_dim / level >= MIN_OVERVIEW_SIZE {
        levels.push(level as i32);
        level *= 2;
    }

    levels
}
