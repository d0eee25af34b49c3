use crate::error::{Result, TiledPredictError};
use log::debug;
use std::fmt;

/// Top-left corner of a patch, in raster pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchOrigin {
    pub row: usize,
    pub col: usize,
}

impl PatchOrigin {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for PatchOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(usize, usize)> for PatchOrigin {
    fn from((row, col): (usize, usize)) -> Self {
        Self::new(row, col)
    }
}

/// Sliding-window plan over a raster.
///
/// Origins sit at multiples of `stride` and every patch lies fully inside the
/// raster. A bottom or right strip narrower than one stride step is left
/// without its own patch (sliding-window truncation).
#[derive(Debug, Clone)]
pub struct PatchGrid {
    raster_height: usize,
    raster_width: usize,
    patch_size: usize,
    stride: usize,
    pub num_patches_y: usize,
    pub num_patches_x: usize,
    pub total_patches: usize,
}

impl PatchGrid {
    pub fn new(
        raster_height: usize,
        raster_width: usize,
        patch_size: usize,
        stride: usize,
    ) -> Result<Self> {
        if patch_size == 0 {
            return Err(TiledPredictError::InvalidPatchSize(patch_size));
        }
        if stride == 0 {
            return Err(TiledPredictError::InvalidStride { patch_size, stride });
        }
        if patch_size > raster_height || patch_size > raster_width {
            return Err(TiledPredictError::PatchLargerThanRaster {
                patch_size,
                width: raster_width,
                height: raster_height,
            });
        }

        // Number of steps that keep the patch inside the raster, plus the origin at 0
        let num_patches_y = (raster_height - patch_size) / stride + 1;
        let num_patches_x = (raster_width - patch_size) / stride + 1;
        let total_patches = num_patches_y * num_patches_x;

        debug!(
            "PatchGrid: {}x{} raster, patch_size={}, stride={} → {}x{} patches ({} total)",
            raster_width, raster_height, patch_size, stride, num_patches_x, num_patches_y, total_patches
        );

        Ok(Self {
            raster_height,
            raster_width,
            patch_size,
            stride,
            num_patches_y,
            num_patches_x,
            total_patches,
        })
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn iter(&self) -> PatchIterator<'_> {
        PatchIterator::new(self)
    }

    /// Origin of the `patch_idx`-th patch in row-major order.
    pub fn origin(&self, patch_idx: usize) -> PatchOrigin {
        let patch_y = patch_idx / self.num_patches_x;
        let patch_x = patch_idx % self.num_patches_x;
        PatchOrigin::new(patch_y * self.stride, patch_x * self.stride)
    }

    /// Bottom rows that no patch reaches.
    pub fn uncovered_rows(&self) -> usize {
        self.raster_height - self.covered_extent(self.num_patches_y)
    }

    /// Right-hand columns that no patch reaches.
    pub fn uncovered_cols(&self) -> usize {
        self.raster_width - self.covered_extent(self.num_patches_x)
    }

    fn covered_extent(&self, num_patches: usize) -> usize {
        (num_patches - 1) * self.stride + self.patch_size
    }
}

pub struct PatchIterator<'a> {
    grid: &'a PatchGrid,
    current_idx: usize,
}

impl<'a> PatchIterator<'a> {
    fn new(grid: &'a PatchGrid) -> Self {
        Self {
            grid,
            current_idx: 0,
        }
    }
}

impl<'a> Iterator for PatchIterator<'a> {
    type Item = PatchOrigin;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_idx < self.grid.total_patches {
            let origin = self.grid.origin(self.current_idx);
            self.current_idx += 1;
            Some(origin)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.total_patches - self.current_idx;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PatchIterator<'_> {}
