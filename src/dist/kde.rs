//! Weighted Gaussian kernel density estimation on a regular grid.

use super::point_set::{ContinuousShape, XYShape};
use super::{DistError, Result};

/// Fewer samples than this are never smoothed into a density.
pub const MIN_SAMPLES_FOR_KDE: usize = 5;

/// Kernel is cut off beyond this many bandwidths.
const KERNEL_RADIUS: f64 = 4.0;

/// Silverman's rule of thumb, using the effective sample size when weighted.
pub fn silverman_bandwidth(xs: &[f64], weights: Option<&[f64]>) -> f64 {
  let w = |i: usize| weights.map_or(1.0, |ws| ws[i]);
  let total: f64 = (0..xs.len()).map(w).sum();
  if !(total > 0.0) {
    return 0.0;
  }
  let mean = xs.iter().enumerate().map(|(i, x)| w(i) * x).sum::<f64>() / total;
  let var = xs
    .iter()
    .enumerate()
    .map(|(i, x)| w(i) * (x - mean).powi(2))
    .sum::<f64>()
    / total;
  let sum_sq: f64 = (0..xs.len()).map(|i| w(i).powi(2)).sum();
  let n_eff = total * total / sum_sq;
  1.06 * var.sqrt() * n_eff.powf(-0.2)
}

/// Density estimate with `n_points` grid points, normalized to integrate to 1.
pub fn kde(xs: &[f64], weights: Option<&[f64]>, n_points: usize) -> Result<ContinuousShape> {
  if xs.is_empty() {
    return Err(DistError::TooFewSamples { got: 0, need: 1 });
  }
  if let Some(ws) = weights {
    if ws.len() != xs.len() {
      return Err(DistError::Internal("kde weights and samples differ in length".into()));
    }
  }
  let h = silverman_bandwidth(xs, weights);
  if !(h > 0.0) || !h.is_finite() {
    return Err(DistError::domain("samples have no spread to estimate a density from"));
  }

  let (min, max) = xs
    .iter()
    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(*x), hi.max(*x)));
  let lo = min - KERNEL_RADIUS * h;
  let hi = max + KERNEL_RADIUS * h;
  let n = n_points.max(3);
  let step = (hi - lo) / (n - 1) as f64;

  let mut bins = vec![0.0; n];
  for (i, x) in xs.iter().enumerate() {
    let w = weights.map_or(1.0, |ws| ws[i]);
    let pos = (x - lo) / step;
    let j = (pos.floor() as usize).min(n - 2);
    let frac = pos - j as f64;
    bins[j] += w * (1.0 - frac);
    bins[j + 1] += w * frac;
  }

  let radius = ((KERNEL_RADIUS * h) / step).ceil() as usize;
  let kernel: Vec<f64> = (0..=radius)
    .map(|k| (-0.5 * (k as f64 * step / h).powi(2)).exp())
    .collect();
  let ys: Vec<f64> = (0..n)
    .map(|i| {
      let from = i.saturating_sub(radius);
      let to = (i + radius).min(n - 1);
      (from..=to)
        .map(|j| bins[j] * kernel[if j > i { j - i } else { i - j }])
        .sum()
    })
    .collect();

  let xs_grid = (0..n).map(|i| lo + step * i as f64).collect();
  ContinuousShape::new(XYShape::new(xs_grid, ys)?).normalize()
}
