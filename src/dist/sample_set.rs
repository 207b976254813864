use super::kde::{self, MIN_SAMPLES_FOR_KDE};
use super::point_set::{ContinuousShape, DiscreteShape, PointSetDist, XYShape};
use super::{DistError, Result};
use rand::rngs::StdRng;
use rand::Rng;
use std::rc::Rc;
use tracing::warn;

/// A value drawn at least this often becomes a point mass when the set is
/// turned into a density.
const DISCRETE_REPEAT_THRESHOLD: usize = 3;

/// An immutable, shared vector of draws.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSetDist {
  samples: Rc<Vec<f64>>,
}

impl SampleSetDist {
  pub fn new(samples: Vec<f64>) -> Result<Self> {
    if samples.is_empty() {
      return Err(DistError::TooFewSamples { got: 0, need: 1 });
    }
    if samples.iter().any(|x| x.is_nan()) {
      return Err(DistError::invalid("sample set contains NaN"));
    }
    Ok(SampleSetDist {
      samples: Rc::new(samples),
    })
  }

  pub fn samples(&self) -> &[f64] {
    &self.samples
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn mean(&self) -> f64 {
    self.samples.iter().sum::<f64>() / self.len() as f64
  }

  /// Unbiased sample variance; zero for a single draw.
  pub fn variance(&self) -> f64 {
    let n = self.len();
    if n < 2 {
      return 0.0;
    }
    let mean = self.mean();
    self.samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
  }

  pub fn stdev(&self) -> f64 {
    self.variance().sqrt()
  }

  pub fn min(&self) -> f64 {
    self.samples.iter().copied().fold(f64::INFINITY, f64::min)
  }

  pub fn max(&self) -> f64 {
    self.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max)
  }

  fn sorted(&self) -> Vec<f64> {
    let mut xs = self.samples.to_vec();
    xs.sort_by(|a, b| a.total_cmp(b));
    xs
  }

  /// Linear interpolation between order statistics.
  pub fn percentile(&self, p: f64) -> f64 {
    let xs = self.sorted();
    let h = (xs.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    if lo + 1 >= xs.len() {
      return xs[xs.len() - 1];
    }
    xs[lo] + (h - lo as f64) * (xs[lo + 1] - xs[lo])
  }

  pub fn cdf(&self, x: f64) -> f64 {
    self.samples.iter().filter(|s| **s <= x).count() as f64 / self.len() as f64
  }

  pub fn sample(&self, rng: &mut StdRng) -> f64 {
    self.samples[rng.gen_range(0..self.len())]
  }

  pub fn sample_n(&self, n: usize, rng: &mut StdRng) -> Vec<f64> {
    (0..n).map(|_| self.sample(rng)).collect()
  }

  /// Keeps the draws that are numbers; a NaN result is dropped.
  fn from_mapped(samples: Vec<f64>) -> Result<Self> {
    let before = samples.len();
    let kept: Vec<f64> = samples.into_iter().filter(|x| !x.is_nan()).collect();
    if kept.len() < before {
      warn!(dropped = before - kept.len(), "dropping NaN samples");
    }
    if kept.is_empty() {
      return Err(DistError::domain("operation produced no valid samples"));
    }
    SampleSetDist::new(kept)
  }

  pub fn map(&self, f: impl Fn(f64) -> f64) -> Result<Self> {
    SampleSetDist::from_mapped(self.samples.iter().map(|x| f(*x)).collect())
  }

  /// Applies a fallible map, stopping at the first error.
  pub fn try_map<E>(
    &self,
    mut f: impl FnMut(f64) -> std::result::Result<f64, E>,
  ) -> std::result::Result<Vec<f64>, E> {
    self.samples.iter().map(|x| f(*x)).collect()
  }

  /// Index-paired combination; the shorter set bounds the result.
  pub fn map2(a: &SampleSetDist, b: &SampleSetDist, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
    SampleSetDist::from_mapped(
      a.samples
        .iter()
        .zip(b.samples.iter())
        .map(|(x, y)| f(*x, *y))
        .collect(),
    )
  }

  pub fn truncate(&self, low: Option<f64>, high: Option<f64>) -> Result<Self> {
    let lo = low.unwrap_or(f64::NEG_INFINITY);
    let hi = high.unwrap_or(f64::INFINITY);
    let kept: Vec<f64> = self.samples.iter().copied().filter(|x| *x >= lo && *x <= hi).collect();
    if kept.is_empty() {
      return Err(DistError::domain("truncation left no samples"));
    }
    SampleSetDist::new(kept)
  }

  /// Splits frequently repeated values into point masses and smooths the
  /// rest with a kernel density estimate.
  pub fn to_point_set(&self, n_points: usize) -> Result<PointSetDist> {
    let n = self.len();
    if n < MIN_SAMPLES_FOR_KDE {
      return Err(DistError::TooFewSamples {
        got: n,
        need: MIN_SAMPLES_FOR_KDE,
      });
    }
    let sorted = self.sorted();
    let mut discrete: Vec<(f64, f64)> = Vec::new();
    let mut rest: Vec<f64> = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
      let mut j = i;
      while j < sorted.len() && sorted[j] == sorted[i] {
        j += 1;
      }
      let count = j - i;
      if count >= DISCRETE_REPEAT_THRESHOLD {
        discrete.push((sorted[i], count as f64 / n as f64));
      } else {
        rest.extend_from_slice(&sorted[i..j]);
      }
      i = j;
    }

    let mut continuous = ContinuousShape::empty();
    if rest.len() >= MIN_SAMPLES_FOR_KDE {
      match kde::kde(&rest, None, n_points) {
        Ok(shape) => continuous = shape.scale_by(rest.len() as f64 / n as f64),
        Err(e) => {
          warn!(error = %e, "density estimate failed, keeping samples as point masses");
          discrete.extend(rest.iter().map(|x| (*x, 1.0 / n as f64)));
        }
      }
    } else {
      discrete.extend(rest.iter().map(|x| (*x, 1.0 / n as f64)));
    }
    let discrete = DiscreteShape::new(XYShape::from_points(discrete)?);
    Ok(PointSetDist::from_parts(continuous, discrete))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  #[test]
  fn percentile_interpolates() {
    let s = SampleSetDist::new(vec![4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
    assert_relative_eq!(s.percentile(0.5), 3.0);
    assert_relative_eq!(s.percentile(0.125), 1.5);
    assert_relative_eq!(s.percentile(1.0), 5.0);
    assert_relative_eq!(s.cdf(2.0), 0.4);
  }

  #[test]
  fn repeated_values_become_point_masses() {
    let s = SampleSetDist::new(vec![7.0; 20]).unwrap();
    let ps = s.to_point_set(100).unwrap();
    assert_eq!(ps.kind(), "discrete");
    assert_relative_eq!(ps.mean().unwrap(), 7.0);
  }

  #[test]
  fn mixed_samples_split_mass() {
    let mut xs: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
    xs.extend(vec![100.0; 50]);
    let ps = SampleSetDist::new(xs).unwrap().to_point_set(200).unwrap();
    assert_eq!(ps.kind(), "mixed");
    assert_relative_eq!(ps.integral_sum(), 1.0, epsilon = 1e-9);
    if let PointSetDist::Mixed(m) = &ps {
      assert_relative_eq!(m.discrete_probability_mass(), 0.5, epsilon = 1e-9);
    }
  }

  #[test]
  fn too_few_samples_for_density() {
    let s = SampleSetDist::new(vec![1.0, 2.0]).unwrap();
    assert_eq!(
      s.to_point_set(100),
      Err(DistError::TooFewSamples { got: 2, need: MIN_SAMPLES_FOR_KDE })
    );
  }

  #[test]
  fn empty_truncation_is_an_error() {
    let s = SampleSetDist::new(vec![1.0, 2.0, 3.0]).unwrap();
    assert!(s.truncate(Some(10.0), None).is_err());
    assert_eq!(s.truncate(Some(2.0), None).unwrap().len(), 2);
  }
}
