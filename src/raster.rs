//! In-memory raster handle and the metadata passed through to the writer.

use crate::error::{Result, TiledPredictError};
use ndarray::Array3;

/// Georeferencing and layout of a raster, carried unchanged to the output.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geotransform: [f64; 6],
    pub projection: String,
    pub nodata: Option<f64>,
}

impl RasterMetadata {
    /// Metadata for an ungeoreferenced raster (identity pixel grid, no CRS).
    pub fn plain(band_count: usize, height: usize, width: usize) -> Self {
        Self {
            width,
            height,
            band_count,
            geotransform: [0.0, 1.0, 0.0, 0.0, 0.0, -1.0],
            projection: String::new(),
            nodata: None,
        }
    }

    pub fn pixel_width(&self) -> f64 {
        self.geotransform[1].abs()
    }

    pub fn pixel_height(&self) -> f64 {
        self.geotransform[5].abs()
    }
}

/// A readable multi-band raster of shape `(bands, height, width)`.
pub trait RasterSource {
    fn metadata(&self) -> &RasterMetadata;

    fn read(&self) -> Result<Array3<f32>>;
}

/// Raster held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    data: Array3<f32>,
    metadata: RasterMetadata,
}

impl MemoryRaster {
    pub fn new(data: Array3<f32>) -> Result<Self> {
        let (bands, height, width) = data.dim();
        let metadata = RasterMetadata::plain(bands, height, width);
        Self::with_metadata(data, metadata)
    }

    pub fn with_metadata(data: Array3<f32>, metadata: RasterMetadata) -> Result<Self> {
        let (bands, height, width) = data.dim();
        if bands == 0 || height == 0 || width == 0 {
            return Err(TiledPredictError::InvalidDimensions(width, height));
        }
        if (metadata.band_count, metadata.height, metadata.width) != (bands, height, width) {
            return Err(TiledPredictError::InvalidDimensions(metadata.width, metadata.height));
        }
        Ok(Self { data, metadata })
    }
}

impl RasterSource for MemoryRaster {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    fn read(&self) -> Result<Array3<f32>> {
        Ok(self.data.clone())
    }
}
