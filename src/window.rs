//! Spline blending window and the 2-D weight mask derived from it.
//!
//! The window is a squared spline (for `power = 2`): a quadratic rise over
//! the outer quarter at each end and a mirrored quadratic plateau in the
//! middle, rescaled so that its mean is exactly 1. Patches weighted by its
//! outer product fade out towards their borders, so overlapping predictions
//! blend without seams.

use crate::error::{Result, TiledPredictError};
use log::debug;
use ndarray::{Array1, Array2, Axis};

/// Smallest window for which the outer quarter is non-empty.
pub const MIN_WINDOW_SIZE: usize = 4;

pub const DEFAULT_SPLINE_POWER: f64 = 2.0;

/// Symmetric triangular window of length `size`.
///
/// Follows the usual signal-processing definition without zero end points:
/// odd sizes peak at exactly 1, even sizes have two equal centre samples at
/// `(size - 1) / size`.
pub fn triangular(size: usize) -> Array1<f64> {
    let half = (size + 1) / 2;
    let rising: Vec<f64> = if size % 2 == 1 {
        (1..=half)
            .map(|n| 2.0 * n as f64 / (size as f64 + 1.0))
            .collect()
    } else {
        (1..=half)
            .map(|n| (2.0 * n as f64 - 1.0) / size as f64)
            .collect()
    };

    // Mirror, skipping the peak sample for odd sizes
    let mirrored = rising.iter().rev().skip(size % 2);
    rising.iter().chain(mirrored).copied().collect()
}

/// 1-D spline window of length `window_size`, normalised to mean 1.
pub fn spline_window(window_size: usize, power: f64) -> Result<Array1<f64>> {
    if window_size < MIN_WINDOW_SIZE {
        return Err(TiledPredictError::WindowTooSmall(window_size));
    }
    if !power.is_finite() || power <= 0.0 {
        return Err(TiledPredictError::InvalidSplinePower(power));
    }

    let intersection = window_size / 4;
    let triang = triangular(window_size);

    let mut window: Array1<f64> = triang
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let in_outer = i < intersection || i >= window_size - intersection;
            if in_outer {
                (2.0 * t).abs().powf(power) / 2.0
            } else {
                1.0 - (2.0 * (t - 1.0)).abs().powf(power) / 2.0
            }
        })
        .collect();

    // Mean is strictly positive: every outer sample is > 0 for window_size >= 4
    let mean = window.sum() / window_size as f64;
    window.mapv_inplace(|w| w / mean);

    debug!(
        "Spline window: size={}, power={}, edge weight={:.3e}, peak weight={:.6}",
        window_size,
        power,
        window[0],
        window.fold(f64::MIN, |acc, &w| acc.max(w))
    );

    Ok(window)
}

/// Outer product of a 1-D window with itself.
pub fn weight_mask(window: &Array1<f64>) -> Array2<f64> {
    let column = window.view().insert_axis(Axis(1));
    let row = window.view().insert_axis(Axis(0));
    &column * &row
}

/// Square `window_size` x `window_size` blending mask.
pub fn create_weight_mask(window_size: usize, power: f64) -> Result<Array2<f64>> {
    let window = spline_window(window_size, power)?;
    Ok(weight_mask(&window))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn assert_close(a: &Array1<f64>, b: &Array1<f64>) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_triangular_odd() {
        assert_close(&triangular(5), &arr1(&[1.0 / 3.0, 2.0 / 3.0, 1.0, 2.0 / 3.0, 1.0 / 3.0]));
    }

    #[test]
    fn test_triangular_even() {
        assert_close(&triangular(4), &arr1(&[0.25, 0.75, 0.75, 0.25]));
    }

    #[test]
    fn test_spline_window_size_4() {
        // outer ends: (2 * 0.25)^2 / 2 = 0.125, inner: 1 - (2 * 0.25)^2 / 2 = 0.875, mean 0.5
        let window = spline_window(4, 2.0).unwrap();
        assert_close(&window, &arr1(&[0.25, 1.75, 1.75, 0.25]));
    }

    #[test]
    fn test_spline_window_size_8() {
        let window = spline_window(8, 2.0).unwrap();
        assert_close(
            &window,
            &arr1(&[0.0625, 0.5625, 1.4375, 1.9375, 1.9375, 1.4375, 0.5625, 0.0625]),
        );
    }

    #[test]
    fn test_spline_window_64_edge_weight() {
        let window = spline_window(64, 2.0).unwrap();
        // (2 / 64)^2 / 2 before normalisation; the window sums to 32 before scaling
        assert!((window[0] - 1.0 / 1024.0).abs() < 1e-12);
        assert!((window[63] - window[0]).abs() < 1e-15);
    }

    #[test]
    fn test_spline_window_mean_is_one() {
        for size in 4..=130 {
            for &power in &[1.0, 1.5, 2.0, 3.0] {
                let window = spline_window(size, power).unwrap();
                let mean = window.sum() / size as f64;
                assert!((mean - 1.0).abs() < 1e-12, "size={} power={} mean={}", size, power, mean);
                assert!(window.iter().all(|&w| w > 0.0));
            }
        }
    }

    #[test]
    fn test_spline_window_is_symmetric() {
        for size in [4, 7, 64, 65] {
            let window = spline_window(size, 2.0).unwrap();
            for i in 0..size {
                assert!((window[i] - window[size - 1 - i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_spline_window_rejects_small_sizes() {
        for size in 0..MIN_WINDOW_SIZE {
            assert!(matches!(
                spline_window(size, 2.0),
                Err(TiledPredictError::WindowTooSmall(s)) if s == size
            ));
        }
    }

    #[test]
    fn test_spline_window_rejects_bad_power() {
        assert!(spline_window(16, 0.0).is_err());
        assert!(spline_window(16, -2.0).is_err());
        assert!(spline_window(16, f64::NAN).is_err());
    }

    #[test]
    fn test_weight_mask_outer_product() {
        let window = spline_window(6, 2.0).unwrap();
        let mask = weight_mask(&window);
        assert_eq!(mask.dim(), (6, 6));
        for r in 0..6 {
            for c in 0..6 {
                assert_eq!(mask[[r, c]], window[r] * window[c]);
                assert_eq!(mask[[r, c]], mask[[c, r]]);
            }
        }
    }

    #[test]
    fn test_weight_mask_mean_is_one() {
        let mask = create_weight_mask(64, 2.0).unwrap();
        let mean = mask.sum() / mask.len() as f64;
        assert!((mean - 1.0).abs() < 1e-9);
        assert!(mask.iter().all(|&w| w >= 0.0));
    }
}
