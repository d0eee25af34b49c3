//! Overlap-add accumulation of weighted patch predictions.

use crate::error::{Result, TiledPredictError};
use crate::grid::PatchOrigin;
use log::{debug, warn};
use ndarray::{s, Array2, ArrayView2, Zip};

/// Running sums for one reconstruction run.
///
/// `weighted_sum` collects `prediction * mask` and `weight_sum` collects
/// `mask`, both over the full raster. Overlapping patches add up; nothing is
/// ever overwritten.
#[derive(Debug, Clone)]
pub struct AccumulationBuffer {
    weighted_sum: Array2<f64>,
    weight_sum: Array2<f64>,
    patches: usize,
}

impl AccumulationBuffer {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            weighted_sum: Array2::zeros((height, width)),
            weight_sum: Array2::zeros((height, width)),
            patches: 0,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.weight_sum.dim()
    }

    /// Number of patches accumulated so far.
    pub fn patch_count(&self) -> usize {
        self.patches
    }

    /// Add one weighted prediction tile at `origin`.
    pub fn accumulate(
        &mut self,
        origin: PatchOrigin,
        prediction: ArrayView2<'_, f32>,
        mask: ArrayView2<'_, f64>,
    ) -> Result<()> {
        let (tile_height, tile_width) = mask.dim();
        if prediction.dim() != mask.dim() {
            return Err(TiledPredictError::DimensionMismatch {
                origin,
                expected: mask.dim(),
                found: prediction.dim(),
            });
        }

        let (height, width) = self.dim();
        let row_end = origin.row + tile_height;
        let col_end = origin.col + tile_width;
        if row_end > height || col_end > width {
            return Err(TiledPredictError::DimensionMismatch {
                origin,
                expected: mask.dim(),
                found: (
                    height.saturating_sub(origin.row),
                    width.saturating_sub(origin.col),
                ),
            });
        }

        let rows = origin.row..row_end;
        let cols = origin.col..col_end;
        Zip::from(self.weighted_sum.slice_mut(s![rows.clone(), cols.clone()]))
            .and(self.weight_sum.slice_mut(s![rows, cols]))
            .and(&prediction)
            .and(&mask)
            .for_each(|sum, weight, &value, &w| {
                *sum += value as f64 * w;
                *weight += w;
            });

        self.patches += 1;
        debug!("Accumulated patch {} at {}", self.patches, origin);
        Ok(())
    }

    /// Divide the weighted sums by the summed weights.
    ///
    /// Weights are floored at `epsilon`, so a pixel no patch reached comes
    /// out as 0.0 rather than a no-data value. The summed weights are kept
    /// in the result as coverage.
    pub fn finalize(self, epsilon: f64) -> Reconstruction {
        let values = Zip::from(&self.weighted_sum)
            .and(&self.weight_sum)
            .map_collect(|&sum, &weight| (sum / weight.max(epsilon)) as f32);

        let uncovered = self.weight_sum.iter().filter(|&&w| w <= 0.0).count();
        if uncovered > 0 {
            warn!(
                "{} pixels received no patch coverage and were set to 0",
                uncovered
            );
        }

        Reconstruction {
            values,
            coverage: self.weight_sum,
        }
    }
}

/// Blended output raster with the per-pixel weight that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub values: Array2<f32>,
    pub coverage: Array2<f64>,
}

impl Reconstruction {
    /// True where the summed weight exceeds `threshold`.
    pub fn covered_mask(&self, threshold: f64) -> Array2<bool> {
        self.coverage.mapv(|w| w > threshold)
    }

    pub fn uncovered_count(&self, threshold: f64) -> usize {
        self.coverage.iter().filter(|&&w| w <= threshold).count()
    }

    /// Values with every pixel at or below `threshold` coverage replaced by `nodata`.
    pub fn values_with_nodata(&self, threshold: f64, nodata: f32) -> Array2<f32> {
        Zip::from(&self.values)
            .and(&self.coverage)
            .map_collect(|&value, &weight| if weight > threshold { value } else { nodata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_single_patch_normalises_to_prediction() {
        let mut buffer = AccumulationBuffer::new(3, 3);
        let prediction = arr2(&[[2.0f32, 4.0], [6.0, 8.0]]);
        let mask = arr2(&[[0.5, 1.0], [1.5, 2.0]]);

        buffer
            .accumulate(PatchOrigin::new(1, 1), prediction.view(), mask.view())
            .unwrap();
        assert_eq!(buffer.patch_count(), 1);

        let result = buffer.finalize(1e-6);
        assert_eq!(result.values[[1, 1]], 2.0);
        assert_eq!(result.values[[2, 2]], 8.0);
        assert_eq!(result.coverage[[2, 1]], 1.5);
        // untouched pixels
        assert_eq!(result.values[[0, 0]], 0.0);
        assert_eq!(result.coverage[[0, 2]], 0.0);
    }

    #[test]
    fn test_overlapping_patches_are_summed() {
        let mut buffer = AccumulationBuffer::new(1, 3);
        let mask = arr2(&[[1.0, 3.0]]);

        buffer
            .accumulate(PatchOrigin::new(0, 0), arr2(&[[1.0f32, 1.0]]).view(), mask.view())
            .unwrap();
        buffer
            .accumulate(PatchOrigin::new(0, 1), arr2(&[[5.0f32, 5.0]]).view(), mask.view())
            .unwrap();

        let result = buffer.finalize(1e-6);
        // (1 * 3 + 5 * 1) / (3 + 1)
        assert!((result.values[[0, 1]] - 2.0).abs() < 1e-6);
        assert_eq!(result.coverage[[0, 1]], 4.0);
        assert_eq!(result.values[[0, 0]], 1.0);
        assert_eq!(result.values[[0, 2]], 5.0);
    }

    #[test]
    fn test_epsilon_floor_for_tiny_weights() {
        let mut buffer = AccumulationBuffer::new(1, 1);
        buffer
            .accumulate(PatchOrigin::new(0, 0), arr2(&[[10.0f32]]).view(), arr2(&[[1e-7]]).view())
            .unwrap();

        let result = buffer.finalize(1e-6);
        // 10 * 1e-7 / 1e-6
        assert!((result.values[[0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nan_prediction_poisons_overlap() {
        let mut buffer = AccumulationBuffer::new(1, 3);
        let mask = arr2(&[[1.0, 1.0]]);
        buffer
            .accumulate(PatchOrigin::new(0, 0), arr2(&[[1.0f32, f32::NAN]]).view(), mask.view())
            .unwrap();
        buffer
            .accumulate(PatchOrigin::new(0, 1), arr2(&[[2.0f32, 2.0]]).view(), mask.view())
            .unwrap();

        let result = buffer.finalize(1e-6);
        assert_eq!(result.values[[0, 0]], 1.0);
        assert!(result.values[[0, 1]].is_nan());
        assert_eq!(result.values[[0, 2]], 2.0);
        assert_eq!(result.coverage[[0, 1]], 2.0);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut buffer = AccumulationBuffer::new(4, 4);
        let err = buffer
            .accumulate(
                PatchOrigin::new(0, 0),
                Array2::<f32>::zeros((2, 3)).view(),
                Array2::<f64>::ones((2, 2)).view(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TiledPredictError::DimensionMismatch {
                expected: (2, 2),
                found: (2, 3),
                ..
            }
        ));
        assert_eq!(buffer.patch_count(), 0);
    }

    #[test]
    fn test_out_of_bounds_origin_rejected() {
        let mut buffer = AccumulationBuffer::new(4, 4);
        let tile = Array2::<f32>::zeros((2, 2));
        let mask = Array2::<f64>::ones((2, 2));
        assert!(buffer
            .accumulate(PatchOrigin::new(3, 0), tile.view(), mask.view())
            .is_err());
        assert!(buffer.weight_sum.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_coverage_mask_and_nodata() {
        let mut buffer = AccumulationBuffer::new(2, 3);
        buffer
            .accumulate(
                PatchOrigin::new(0, 0),
                Array2::from_elem((2, 2), 7.0f32).view(),
                Array2::ones((2, 2)).view(),
            )
            .unwrap();

        let result = buffer.finalize(1e-6);
        assert_eq!(result.uncovered_count(0.0), 2);
        assert_eq!(
            result.covered_mask(0.0),
            arr2(&[[true, true, false], [true, true, false]])
        );

        let masked = result.values_with_nodata(0.0, -9999.0);
        assert_eq!(masked, arr2(&[[7.0, 7.0, -9999.0], [7.0, 7.0, -9999.0]]));
    }
}
