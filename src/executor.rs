use crate::error::{Result, TiledPredictError};
use crate::grid::{PatchGrid, PatchIterator, PatchOrigin};
use crate::predictor::Predictor;
use log::debug;
use ndarray::{s, Array2, ArrayView3};
use rayon::prelude::*;

/// Cuts patches out of a raster and runs them through a predictor.
///
/// Every prediction is checked to be a `patch_size` x `patch_size` tile.
/// Failures are tagged with the patch origin and never retried.
pub struct PatchExecutor<'r, 'p, P: ?Sized> {
    raster: ArrayView3<'r, f32>,
    predictor: &'p P,
    patch_size: usize,
}

impl<'r, 'p, P: Predictor + ?Sized> PatchExecutor<'r, 'p, P> {
    pub fn new(raster: ArrayView3<'r, f32>, predictor: &'p P, patch_size: usize) -> Self {
        Self {
            raster,
            predictor,
            patch_size,
        }
    }

    /// All bands of the patch starting at `origin`.
    pub fn extract(&self, origin: PatchOrigin) -> Result<ArrayView3<'r, f32>> {
        let (_, height, width) = self.raster.dim();
        let row_end = origin.row + self.patch_size;
        let col_end = origin.col + self.patch_size;

        if row_end > height || col_end > width {
            return Err(TiledPredictError::DimensionMismatch {
                origin,
                expected: (self.patch_size, self.patch_size),
                found: (
                    height.saturating_sub(origin.row),
                    width.saturating_sub(origin.col),
                ),
            });
        }

        Ok(self
            .raster
            .slice_move(s![.., origin.row..row_end, origin.col..col_end]))
    }

    /// Extract, predict and shape-check a single patch.
    pub fn predict_patch(&self, origin: PatchOrigin) -> Result<Array2<f32>> {
        let tile = self.extract(origin)?;

        let prediction = self
            .predictor
            .predict(tile)
            .map_err(|source| TiledPredictError::Prediction { origin, source })?;

        let expected = (self.patch_size, self.patch_size);
        if prediction.dim() != expected {
            return Err(TiledPredictError::DimensionMismatch {
                origin,
                expected,
                found: prediction.dim(),
            });
        }

        debug!("Predicted patch at {}", origin);
        Ok(prediction)
    }

    /// Predictions for every patch of `grid`, lazily and in row-major order.
    pub fn iter<'e>(&'e self, grid: &'e PatchGrid) -> PatchPredictions<'e, 'r, 'p, P> {
        PatchPredictions {
            executor: self,
            origins: grid.iter(),
        }
    }
}

pub struct PatchPredictions<'e, 'r, 'p, P: ?Sized> {
    executor: &'e PatchExecutor<'r, 'p, P>,
    origins: PatchIterator<'e>,
}

impl<P: Predictor + ?Sized> Iterator for PatchPredictions<'_, '_, '_, P> {
    type Item = Result<(PatchOrigin, Array2<f32>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let origin = self.origins.next()?;
        Some(self.executor.predict_patch(origin).map(|tile| (origin, tile)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.origins.size_hint()
    }
}

impl<P: Predictor + Sync + ?Sized> PatchExecutor<'_, '_, P> {
    /// Predict a batch of patches on the rayon pool.
    ///
    /// Results come back in the order of `origins`. When several patches
    /// fail, the error of the earliest origin in that order is returned.
    pub fn predict_batch(&self, origins: &[PatchOrigin]) -> Result<Vec<Array2<f32>>> {
        let results: Vec<Result<Array2<f32>>> = origins
            .par_iter()
            .map(|&origin| self.predict_patch(origin))
            .collect();

        results.into_iter().collect()
    }
}
