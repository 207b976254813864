//! Discretized distributions: continuous density curves, discrete point
//! masses, and mixtures of the two.

use super::kde;
use super::ops::AlgebraicOp;
use super::{DistError, Result};
use rand::rngs::StdRng;
use rand::Rng;
use std::cmp::Ordering;
use tracing::warn;

/// Continuous parts are discretized to at most this many masses before an
/// algebraic convolution.
const MAX_CONVOLUTION_POINTS: usize = 200;

const NORMALIZED_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XYShape {
  xs: Vec<f64>,
  ys: Vec<f64>,
}

impl XYShape {
  /// `xs` must be strictly increasing and every coordinate finite.
  pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
    if xs.len() != ys.len() {
      return Err(DistError::invalid(format!(
        "xs and ys differ in length ({} vs {})",
        xs.len(),
        ys.len()
      )));
    }
    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
      return Err(DistError::invalid("point set coordinates must be finite"));
    }
    if xs.windows(2).any(|w| w[0] >= w[1]) {
      return Err(DistError::invalid("point set xs must be strictly increasing"));
    }
    if ys.iter().any(|y| *y < 0.0) {
      return Err(DistError::invalid("point set ys must be non-negative"));
    }
    Ok(XYShape { xs, ys })
  }

  /// Sorts by x and sums the ys of repeated xs.
  pub fn from_points(mut points: Vec<(f64, f64)>) -> Result<Self> {
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut xs: Vec<f64> = Vec::with_capacity(points.len());
    let mut ys: Vec<f64> = Vec::with_capacity(points.len());
    for (x, y) in points {
      match xs.last() {
        Some(last) if *last == x => {
          if let Some(prev) = ys.last_mut() {
            *prev += y;
          }
        }
        _ => {
          xs.push(x);
          ys.push(y);
        }
      }
    }
    XYShape::new(xs, ys)
  }

  pub fn xs(&self) -> &[f64] {
    &self.xs
  }

  pub fn ys(&self) -> &[f64] {
    &self.ys
  }

  pub fn len(&self) -> usize {
    self.xs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.xs.is_empty()
  }

  pub fn min_x(&self) -> Option<f64> {
    self.xs.first().copied()
  }

  pub fn max_x(&self) -> Option<f64> {
    self.xs.last().copied()
  }

  /// Linear interpolation, zero outside the covered range.
  pub fn interpolate(&self, x: f64) -> f64 {
    let n = self.xs.len();
    if n == 0 || x < self.xs[0] || x > self.xs[n - 1] {
      return 0.0;
    }
    let i = self.xs.partition_point(|v| *v <= x);
    if i == 0 {
      return self.ys[0];
    }
    if i >= n {
      return self.ys[n - 1];
    }
    let (x0, x1, y0, y1) = (self.xs[i - 1], self.xs[i], self.ys[i - 1], self.ys[i]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
  }

  fn map_y(&self, f: impl Fn(f64) -> f64) -> XYShape {
    XYShape {
      xs: self.xs.clone(),
      ys: self.ys.iter().map(|y| f(*y)).collect(),
    }
  }

  fn union_xs(&self, other: &XYShape) -> Vec<f64> {
    let mut xs: Vec<f64> = self.xs.iter().chain(other.xs.iter()).copied().collect();
    xs.sort_by(|a, b| a.total_cmp(b));
    xs.dedup();
    xs
  }

  fn argmax(&self) -> Option<usize> {
    self
      .ys
      .iter()
      .enumerate()
      .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
      .map(|(i, _)| i)
  }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContinuousShape {
  xy: XYShape,
}

impl ContinuousShape {
  pub fn new(xy: XYShape) -> Self {
    ContinuousShape { xy }
  }

  pub fn empty() -> Self {
    ContinuousShape::default()
  }

  pub fn xy(&self) -> &XYShape {
    &self.xy
  }

  pub fn is_empty(&self) -> bool {
    self.xy.is_empty()
  }

  fn segments(&self) -> impl Iterator<Item = (f64, f64, f64, f64)> + '_ {
    self
      .xy
      .xs
      .windows(2)
      .zip(self.xy.ys.windows(2))
      .map(|(x, y)| (x[0], x[1], y[0], y[1]))
  }

  /// Raw moments `(∫f, ∫xf, ∫x²f)` of the piecewise-linear density.
  fn moments(&self) -> (f64, f64, f64) {
    self
      .segments()
      .fold((0.0, 0.0, 0.0), |(m0, m1, m2), (x0, x1, y0, y1)| {
        let h = x1 - x0;
        (
          m0 + h * (y0 + y1) / 2.0,
          m1 + h / 6.0 * (y0 * (2.0 * x0 + x1) + y1 * (x0 + 2.0 * x1)),
          m2 + h / 12.0
            * (y0 * (3.0 * x0 * x0 + 2.0 * x0 * x1 + x1 * x1)
              + y1 * (x0 * x0 + 2.0 * x0 * x1 + 3.0 * x1 * x1)),
        )
      })
  }

  pub fn integral(&self) -> f64 {
    self.moments().0
  }

  fn cumulative(&self) -> Vec<f64> {
    let mut acc = 0.0;
    let mut out = Vec::with_capacity(self.xy.len());
    if !self.xy.is_empty() {
      out.push(0.0);
    }
    for (x0, x1, y0, y1) in self.segments() {
      acc += (x1 - x0) * (y0 + y1) / 2.0;
      out.push(acc);
    }
    out
  }

  pub fn pdf(&self, x: f64) -> f64 {
    self.xy.interpolate(x)
  }

  /// Unnormalized cumulative mass up to `x`.
  pub fn cdf(&self, x: f64) -> f64 {
    let xs = &self.xy.xs;
    if xs.is_empty() || x < xs[0] {
      return 0.0;
    }
    let cumulative = self.cumulative();
    if x >= xs[xs.len() - 1] {
      return cumulative[cumulative.len() - 1];
    }
    let i = xs.partition_point(|v| *v <= x) - 1;
    let y_x = self.xy.interpolate(x);
    cumulative[i] + (x - xs[i]) * (self.xy.ys[i] + y_x) / 2.0
  }

  /// Inverse of the normalized CDF.
  pub fn inv(&self, p: f64) -> f64 {
    let xs = &self.xy.xs;
    if xs.is_empty() {
      return f64::NAN;
    }
    let cumulative = self.cumulative();
    let total = cumulative[cumulative.len() - 1];
    if total <= 0.0 {
      return xs[0];
    }
    let target = p * total;
    let i = cumulative.partition_point(|c| *c < target);
    if i == 0 {
      return xs[0];
    }
    if i >= xs.len() {
      return xs[xs.len() - 1];
    }
    let (c0, c1) = (cumulative[i - 1], cumulative[i]);
    if c1 <= c0 {
      return xs[i];
    }
    xs[i - 1] + (target - c0) / (c1 - c0) * (xs[i] - xs[i - 1])
  }

  pub fn mode(&self) -> Option<f64> {
    self.xy.argmax().map(|i| self.xy.xs[i])
  }

  pub fn scale_by(&self, k: f64) -> Self {
    ContinuousShape::new(self.xy.map_y(|y| y * k))
  }

  pub fn normalize(&self) -> Result<Self> {
    let total = self.integral();
    if !(total > 0.0) {
      return Err(DistError::domain("cannot normalize a distribution with no probability mass"));
    }
    Ok(self.scale_by(1.0 / total))
  }

  pub fn truncate(&self, low: Option<f64>, high: Option<f64>) -> Self {
    let lo = low.unwrap_or(f64::NEG_INFINITY);
    let hi = high.unwrap_or(f64::INFINITY);
    let mut points = Vec::new();
    if lo.is_finite() && self.xy.min_x().map_or(false, |m| m < lo) {
      points.push((lo, self.pdf(lo)));
    }
    for (x, y) in self.xy.xs.iter().zip(self.xy.ys.iter()) {
      if *x >= lo && *x <= hi && points.last().map_or(true, |(px, _)| px < x) {
        points.push((*x, *y));
      }
    }
    if hi.is_finite()
      && self.xy.max_x().map_or(false, |m| m > hi)
      && points.last().map_or(true, |(px, _)| *px < hi)
    {
      points.push((hi, self.pdf(hi)));
    }
    let (xs, ys) = points.into_iter().unzip();
    ContinuousShape::new(XYShape { xs, ys })
  }

  pub fn pointwise(&self, other: &ContinuousShape, f: impl Fn(f64, f64) -> f64) -> Self {
    let xs = self.xy.union_xs(&other.xy);
    let ys = xs
      .iter()
      .map(|x| {
        let y = f(self.pdf(*x), other.pdf(*x));
        if y.is_finite() {
          y.max(0.0)
        } else {
          0.0
        }
      })
      .collect();
    ContinuousShape::new(XYShape { xs, ys })
  }

  /// Density of `m * X + a`.
  fn affine(&self, m: f64, a: f64) -> Self {
    let mut points: Vec<(f64, f64)> = self
      .xy
      .xs
      .iter()
      .zip(self.xy.ys.iter())
      .map(|(x, y)| (m * x + a, y / m.abs()))
      .collect();
    if m < 0.0 {
      points.reverse();
    }
    let (xs, ys) = points.into_iter().unzip();
    ContinuousShape::new(XYShape { xs, ys })
  }

  /// Approximates the curve by at most `max_points` masses at bin midpoints.
  fn discretize(&self, max_points: usize) -> Vec<(f64, f64)> {
    let (lo, hi) = match (self.xy.min_x(), self.xy.max_x()) {
      (Some(lo), Some(hi)) if hi > lo => (lo, hi),
      _ => return Vec::new(),
    };
    let bins = max_points.min(self.xy.len().saturating_sub(1)).max(1);
    let width = (hi - lo) / bins as f64;
    let mut prev = 0.0;
    (0..bins)
      .filter_map(|i| {
        let edge = if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 };
        let c = self.cdf(edge);
        let mass = c - prev;
        prev = c;
        if mass > 0.0 {
          Some((lo + width * (i as f64 + 0.5), mass))
        } else {
          None
        }
      })
      .collect()
  }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscreteShape {
  xy: XYShape,
}

impl DiscreteShape {
  pub fn new(xy: XYShape) -> Self {
    DiscreteShape { xy }
  }

  pub fn empty() -> Self {
    DiscreteShape::default()
  }

  pub fn xy(&self) -> &XYShape {
    &self.xy
  }

  pub fn is_empty(&self) -> bool {
    self.xy.is_empty()
  }

  pub fn total(&self) -> f64 {
    self.xy.ys.iter().sum()
  }

  pub fn mass_at(&self, x: f64) -> f64 {
    match self.xy.xs.binary_search_by(|v| v.total_cmp(&x)) {
      Ok(i) => self.xy.ys[i],
      Err(_) => 0.0,
    }
  }

  pub fn cdf(&self, x: f64) -> f64 {
    self
      .xy
      .xs
      .iter()
      .zip(self.xy.ys.iter())
      .take_while(|(px, _)| **px <= x)
      .map(|(_, m)| m)
      .sum()
  }

  pub fn inv(&self, p: f64) -> f64 {
    let total = self.total();
    let target = p * total;
    let mut acc = 0.0;
    for (x, m) in self.xy.xs.iter().zip(self.xy.ys.iter()) {
      acc += m;
      if acc >= target - f64::EPSILON * total {
        return *x;
      }
    }
    self.xy.max_x().unwrap_or(f64::NAN)
  }

  fn moments(&self) -> (f64, f64, f64) {
    self
      .xy
      .xs
      .iter()
      .zip(self.xy.ys.iter())
      .fold((0.0, 0.0, 0.0), |(m0, m1, m2), (x, m)| (m0 + m, m1 + x * m, m2 + x * x * m))
  }

  pub fn mode(&self) -> Option<f64> {
    self.xy.argmax().map(|i| self.xy.xs[i])
  }

  pub fn scale_by(&self, k: f64) -> Self {
    DiscreteShape::new(self.xy.map_y(|y| y * k))
  }

  pub fn normalize(&self) -> Result<Self> {
    let total = self.total();
    if !(total > 0.0) {
      return Err(DistError::domain("cannot normalize a distribution with no probability mass"));
    }
    Ok(self.scale_by(1.0 / total))
  }

  pub fn truncate(&self, low: Option<f64>, high: Option<f64>) -> Self {
    let lo = low.unwrap_or(f64::NEG_INFINITY);
    let hi = high.unwrap_or(f64::INFINITY);
    let (xs, ys) = self
      .xy
      .xs
      .iter()
      .zip(self.xy.ys.iter())
      .filter(|(x, _)| **x >= lo && **x <= hi)
      .map(|(x, y)| (*x, *y))
      .unzip();
    DiscreteShape::new(XYShape { xs, ys })
  }

  pub fn pointwise(&self, other: &DiscreteShape, f: impl Fn(f64, f64) -> f64) -> Self {
    let xs = self.xy.union_xs(&other.xy);
    let ys = xs
      .iter()
      .map(|x| {
        let y = f(self.mass_at(*x), other.mass_at(*x));
        if y.is_finite() {
          y.max(0.0)
        } else {
          0.0
        }
      })
      .collect();
    DiscreteShape::new(XYShape { xs, ys })
  }

  fn affine(&self, m: f64, a: f64) -> Self {
    let mut points: Vec<(f64, f64)> = self
      .xy
      .xs
      .iter()
      .zip(self.xy.ys.iter())
      .map(|(x, y)| (m * x + a, *y))
      .collect();
    if m < 0.0 {
      points.reverse();
    }
    let (xs, ys) = points.into_iter().unzip();
    DiscreteShape::new(XYShape { xs, ys })
  }

  fn points(&self) -> Vec<(f64, f64)> {
    self.xy.xs.iter().copied().zip(self.xy.ys.iter().copied()).collect()
  }
}

/// A continuous part and a discrete part, each normalized to 1, combined
/// with an explicit discrete probability mass.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedShape {
  continuous: ContinuousShape,
  discrete: DiscreteShape,
  discrete_mass: f64,
  total: f64,
}

fn unit_continuous(c: &ContinuousShape) -> ContinuousShape {
  c.normalize().unwrap_or_else(|_| ContinuousShape::empty())
}

fn unit_discrete(d: &DiscreteShape) -> DiscreteShape {
  d.normalize().unwrap_or_else(|_| DiscreteShape::empty())
}

impl MixedShape {
  /// From parts whose raw masses are the true probabilities.
  pub fn from_parts(continuous: &ContinuousShape, discrete: &DiscreteShape) -> Self {
    let c = continuous.integral();
    let d = discrete.total();
    let total = c + d;
    MixedShape {
      continuous: unit_continuous(continuous),
      discrete: unit_discrete(discrete),
      discrete_mass: if total > 0.0 { d / total } else { 0.0 },
      total,
    }
  }

  pub fn continuous(&self) -> &ContinuousShape {
    &self.continuous
  }

  pub fn discrete(&self) -> &DiscreteShape {
    &self.discrete
  }

  pub fn discrete_probability_mass(&self) -> f64 {
    self.discrete_mass
  }

  pub fn total_mass(&self) -> f64 {
    self.total
  }

  fn raw_parts(&self) -> (ContinuousShape, DiscreteShape) {
    (
      self.continuous.scale_by(self.total * (1.0 - self.discrete_mass)),
      self.discrete.scale_by(self.total * self.discrete_mass),
    )
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MassAssumption {
  AddsTo1,
  AddsToCorrectProbability,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MixedAssumptions {
  pub continuous: MassAssumption,
  pub discrete: MassAssumption,
  pub discrete_probability_mass: Option<f64>,
}

/// Combines a continuous and a discrete part into a mixed shape. `None` means
/// the inputs do not determine a consistent mixture.
pub fn build_mixed(
  continuous: &ContinuousShape,
  discrete: &DiscreteShape,
  assumptions: MixedAssumptions,
) -> Option<MixedShape> {
  use MassAssumption::*;
  let c = continuous.integral();
  let d = discrete.total();
  let make = |r: f64, total: f64| -> Option<MixedShape> {
    if !(0.0..=1.0).contains(&r) || (r < 1.0 && !(c > 0.0)) || (r > 0.0 && !(d > 0.0)) {
      return None;
    }
    Some(MixedShape {
      continuous: unit_continuous(continuous),
      discrete: unit_discrete(discrete),
      discrete_mass: r,
      total,
    })
  };
  match (
    assumptions.continuous,
    assumptions.discrete,
    assumptions.discrete_probability_mass,
  ) {
    (AddsToCorrectProbability, AddsToCorrectProbability, Some(r)) => {
      // The raw masses fix the fraction.
      let total = c + d;
      if !(total > 0.0) {
        return None;
      }
      let derived = d / total;
      if (derived - r).abs() > NORMALIZED_TOLERANCE {
        return None;
      }
      make(derived, total)
    }
    (AddsTo1, AddsTo1, Some(r)) => make(r, 1.0),
    (AddsTo1, AddsToCorrectProbability, None) => make(d, 1.0),
    _ => None,
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointSetDist {
  Continuous(ContinuousShape),
  Discrete(DiscreteShape),
  Mixed(MixedShape),
}

impl PointSetDist {
  pub fn kind(&self) -> &'static str {
    match self {
      PointSetDist::Continuous(_) => "continuous",
      PointSetDist::Discrete(_) => "discrete",
      PointSetDist::Mixed(_) => "mixed",
    }
  }

  /// Simplest representation of raw parts.
  pub fn from_parts(continuous: ContinuousShape, discrete: DiscreteShape) -> Self {
    let has_c = continuous.integral() > 0.0;
    let has_d = discrete.total() > 0.0;
    match (has_c, has_d) {
      (true, false) => PointSetDist::Continuous(continuous),
      (false, true) => PointSetDist::Discrete(discrete),
      (false, false) if discrete.is_empty() => PointSetDist::Continuous(continuous),
      (false, false) => PointSetDist::Discrete(discrete),
      (true, true) => PointSetDist::Mixed(MixedShape::from_parts(&continuous, &discrete)),
    }
  }

  /// Continuous and discrete parts scaled to their true masses.
  pub fn raw_parts(&self) -> (ContinuousShape, DiscreteShape) {
    match self {
      PointSetDist::Continuous(c) => (c.clone(), DiscreteShape::empty()),
      PointSetDist::Discrete(d) => (ContinuousShape::empty(), d.clone()),
      PointSetDist::Mixed(m) => m.raw_parts(),
    }
  }

  pub fn integral_sum(&self) -> f64 {
    match self {
      PointSetDist::Continuous(c) => c.integral(),
      PointSetDist::Discrete(d) => d.total(),
      PointSetDist::Mixed(m) => m.total,
    }
  }

  pub fn is_normalized(&self) -> bool {
    (self.integral_sum() - 1.0).abs() < NORMALIZED_TOLERANCE
  }

  pub fn normalize(&self) -> Result<Self> {
    Ok(match self {
      PointSetDist::Continuous(c) => PointSetDist::Continuous(c.normalize()?),
      PointSetDist::Discrete(d) => PointSetDist::Discrete(d.normalize()?),
      PointSetDist::Mixed(m) => {
        if !(m.total > 0.0) {
          return Err(DistError::domain("cannot normalize a distribution with no probability mass"));
        }
        PointSetDist::Mixed(MixedShape { total: 1.0, ..m.clone() })
      }
    })
  }

  /// Density of the continuous part plus the mass of any point at `x`.
  pub fn pdf(&self, x: f64) -> f64 {
    let (c, d) = self.raw_parts();
    c.pdf(x) + d.mass_at(x)
  }

  pub fn cdf(&self, x: f64) -> f64 {
    let (c, d) = self.raw_parts();
    c.cdf(x) + d.cdf(x)
  }

  pub fn min_x(&self) -> Option<f64> {
    let (c, d) = self.raw_parts();
    match (c.xy.min_x(), d.xy.min_x()) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    }
  }

  pub fn max_x(&self) -> Option<f64> {
    let (c, d) = self.raw_parts();
    match (c.xy.max_x(), d.xy.max_x()) {
      (Some(a), Some(b)) => Some(a.max(b)),
      (a, b) => a.or(b),
    }
  }

  /// Inverse of the normalized CDF; `p` must lie in `[0, 1]`.
  pub fn inv(&self, p: f64) -> f64 {
    match self {
      PointSetDist::Continuous(c) => c.inv(p),
      PointSetDist::Discrete(d) => d.inv(p),
      PointSetDist::Mixed(m) => {
        let (mut lo, mut hi) = match (self.min_x(), self.max_x()) {
          (Some(lo), Some(hi)) => (lo, hi),
          _ => return f64::NAN,
        };
        let r = m.discrete_mass;
        let cdf = |x: f64| (1.0 - r) * m.continuous.cdf(x) + r * m.discrete.cdf(x);
        if cdf(lo) >= p {
          return lo;
        }
        for _ in 0..100 {
          let mid = (lo + hi) / 2.0;
          if cdf(mid) >= p {
            hi = mid;
          } else {
            lo = mid;
          }
        }
        hi
      }
    }
  }

  fn moments(&self) -> (f64, f64, f64) {
    let (c, d) = self.raw_parts();
    let (c0, c1, c2) = c.moments();
    let (d0, d1, d2) = d.moments();
    (c0 + d0, c1 + d1, c2 + d2)
  }

  pub fn mean(&self) -> Result<f64> {
    let (m0, m1, _) = self.moments();
    if !(m0 > 0.0) {
      return Err(DistError::domain("distribution has no probability mass"));
    }
    Ok(m1 / m0)
  }

  pub fn variance(&self) -> Result<f64> {
    let (m0, m1, m2) = self.moments();
    if !(m0 > 0.0) {
      return Err(DistError::domain("distribution has no probability mass"));
    }
    let mean = m1 / m0;
    Ok((m2 / m0 - mean * mean).max(0.0))
  }

  /// Point masses have unbounded density, so the heaviest one wins over any
  /// continuous peak.
  pub fn mode(&self) -> Result<f64> {
    let found = match self {
      PointSetDist::Continuous(c) => c.mode(),
      PointSetDist::Discrete(d) => d.mode(),
      PointSetDist::Mixed(m) => m.discrete.mode().or_else(|| m.continuous.mode()),
    };
    found.ok_or_else(|| DistError::domain("empty distribution has no mode"))
  }

  pub fn sample(&self, rng: &mut StdRng) -> f64 {
    let u: f64 = rng.gen();
    self.inv(u)
  }

  pub fn sample_n(&self, n: usize, rng: &mut StdRng) -> Vec<f64> {
    (0..n).map(|_| self.sample(rng)).collect()
  }

  /// Multiplies densities and masses by `k`.
  pub fn scale_y(&self, k: f64) -> Self {
    let (c, d) = self.raw_parts();
    PointSetDist::from_parts(c.scale_by(k), d.scale_by(k))
  }

  pub fn truncate(&self, low: Option<f64>, high: Option<f64>) -> Self {
    let (c, d) = self.raw_parts();
    PointSetDist::from_parts(c.truncate(low, high), d.truncate(low, high))
  }

  pub fn pointwise(&self, other: &PointSetDist, f: impl Fn(f64, f64) -> f64 + Copy) -> Self {
    let (c1, d1) = self.raw_parts();
    let (c2, d2) = other.raw_parts();
    PointSetDist::from_parts(c1.pointwise(&c2, f), d1.pointwise(&d2, f))
  }

  /// Weighted sum of the components' raw parts; weights are used as given.
  pub fn mixture(items: &[(PointSetDist, f64)]) -> Self {
    let mut c_acc = ContinuousShape::empty();
    let mut d_acc = DiscreteShape::empty();
    for (dist, w) in items {
      let (c, d) = dist.raw_parts();
      c_acc = c_acc.pointwise(&c.scale_by(*w), |a, b| a + b);
      d_acc = d_acc.pointwise(&d.scale_by(*w), |a, b| a + b);
    }
    PointSetDist::from_parts(c_acc, d_acc)
  }

  /// Distribution of `m * X + a`; `m` must be non-zero.
  pub fn affine(&self, m: f64, a: f64) -> Result<Self> {
    if m == 0.0 || !m.is_finite() || !a.is_finite() {
      return Err(DistError::invalid("affine map needs a finite non-zero scale"));
    }
    let (c, d) = self.raw_parts();
    Ok(PointSetDist::from_parts(c.affine(m, a), d.affine(m, a)))
  }

  /// Numeric convolution: pairwise combination of discretized masses,
  /// re-densified with a weighted kernel density estimate.
  pub fn combine_algebraically(
    op: AlgebraicOp,
    a: &PointSetDist,
    b: &PointSetDist,
    n_points: usize,
  ) -> Result<Self> {
    let (ca, da) = a.raw_parts();
    let (cb, db) = b.raw_parts();
    let (ca, da) = (ca.discretize(MAX_CONVOLUTION_POINTS), da.points());
    let (cb, db) = (cb.discretize(MAX_CONVOLUTION_POINTS), db.points());

    let pairs = |xs: &[(f64, f64)], ys: &[(f64, f64)], out: &mut Vec<(f64, f64)>| {
      for (x, mx) in xs {
        for (y, my) in ys {
          let z = op.apply(*x, *y);
          if z.is_finite() {
            out.push((z, mx * my));
          }
        }
      }
    };

    let mut discrete = Vec::new();
    pairs(&da, &db, &mut discrete);
    let mut continuous = Vec::new();
    pairs(&ca, &cb, &mut continuous);
    pairs(&ca, &db, &mut continuous);
    pairs(&da, &cb, &mut continuous);

    let continuous_shape = if continuous.is_empty() {
      ContinuousShape::empty()
    } else {
      let (xs, ws): (Vec<f64>, Vec<f64>) = continuous.iter().copied().unzip();
      let mass: f64 = ws.iter().sum();
      match kde::kde(&xs, Some(&ws), n_points) {
        Ok(shape) => shape.scale_by(mass),
        Err(e) => {
          warn!(error = %e, "convolution result has no spread, keeping point masses");
          discrete.extend(continuous);
          ContinuousShape::empty()
        }
      }
    };
    let discrete_shape = DiscreteShape::new(XYShape::from_points(discrete)?);
    Ok(PointSetDist::from_parts(continuous_shape, discrete_shape))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::{assert_abs_diff_eq, assert_relative_eq};

  fn uniform01(n: usize) -> ContinuousShape {
    let xs: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
    let ys = vec![1.0; n];
    ContinuousShape::new(XYShape::new(xs, ys).unwrap())
  }

  fn discrete(points: Vec<(f64, f64)>) -> DiscreteShape {
    DiscreteShape::new(XYShape::from_points(points).unwrap())
  }

  #[test]
  fn continuous_moments_are_exact_for_linear_pieces() {
    let u = uniform01(11);
    assert_relative_eq!(u.integral(), 1.0);
    let ps = PointSetDist::Continuous(u.clone());
    assert_relative_eq!(ps.mean().unwrap(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(ps.variance().unwrap(), 1.0 / 12.0, epsilon = 1e-12);
    assert_relative_eq!(u.cdf(0.25), 0.25, epsilon = 1e-12);
    assert_relative_eq!(u.inv(0.75), 0.75, epsilon = 1e-12);
  }

  #[test]
  fn inv_is_monotonic() {
    let shape = PointSetDist::Mixed(MixedShape::from_parts(
      &uniform01(20).scale_by(0.6),
      &discrete(vec![(0.3, 0.3), (2.0, 0.1)]),
    ));
    let mut prev = f64::NEG_INFINITY;
    for i in 0..=100 {
      let x = shape.inv(i as f64 / 100.0);
      assert!(x >= prev, "inv decreased at p = {}", i);
      prev = x;
    }
  }

  #[test]
  fn builder_without_mass_for_two_unit_parts_is_none() {
    let r = build_mixed(&uniform01(5), &discrete(vec![(1.0, 1.0)]), MixedAssumptions {
      continuous: MassAssumption::AddsTo1,
      discrete: MassAssumption::AddsTo1,
      discrete_probability_mass: None,
    });
    assert!(r.is_none());
  }

  #[test]
  fn builder_derives_mass_from_correct_discrete_part() {
    let d = discrete(vec![(1.0, 0.1), (3.0, 0.2)]);
    let m = build_mixed(&uniform01(5), &d, MixedAssumptions {
      continuous: MassAssumption::AddsTo1,
      discrete: MassAssumption::AddsToCorrectProbability,
      discrete_probability_mass: None,
    })
    .unwrap();
    assert_relative_eq!(m.discrete_probability_mass(), 0.3, epsilon = 1e-12);
    assert_relative_eq!(m.discrete().total(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(m.continuous().integral(), 1.0, epsilon = 1e-12);
  }

  #[test]
  fn builder_with_explicit_mass() {
    let m = build_mixed(&uniform01(5), &discrete(vec![(2.0, 1.0)]), MixedAssumptions {
      continuous: MassAssumption::AddsTo1,
      discrete: MassAssumption::AddsTo1,
      discrete_probability_mass: Some(0.25),
    })
    .unwrap();
    let ps = PointSetDist::Mixed(m);
    assert_relative_eq!(ps.integral_sum(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(ps.mean().unwrap(), 0.75 * 0.5 + 0.25 * 2.0, epsilon = 1e-12);
  }

  #[test]
  fn builder_reconciles_correct_probability_parts() {
    let c = uniform01(5).scale_by(0.6);
    let d = discrete(vec![(2.0, 0.2)]);
    let assumptions = |r| MixedAssumptions {
      continuous: MassAssumption::AddsToCorrectProbability,
      discrete: MassAssumption::AddsToCorrectProbability,
      discrete_probability_mass: Some(r),
    };
    let m = build_mixed(&c, &d, assumptions(0.25)).unwrap();
    assert_relative_eq!(m.total_mass(), 0.8, epsilon = 1e-12);
    assert_relative_eq!(m.discrete_probability_mass(), 0.25, epsilon = 1e-12);
    assert!(build_mixed(&c, &d, assumptions(0.5)).is_none());
  }

  #[test]
  fn builder_rejects_other_combinations() {
    let c = uniform01(5);
    let d = discrete(vec![(2.0, 0.2)]);
    let none = |ca, da, r| {
      build_mixed(&c, &d, MixedAssumptions {
        continuous: ca,
        discrete: da,
        discrete_probability_mass: r,
      })
      .is_none()
    };
    use MassAssumption::*;
    assert!(none(AddsToCorrectProbability, AddsTo1, None));
    assert!(none(AddsToCorrectProbability, AddsToCorrectProbability, None));
    assert!(none(AddsTo1, AddsToCorrectProbability, Some(0.2)));
    assert!(none(AddsTo1, AddsTo1, Some(1.5)));
  }

  #[test]
  fn mixture_weights_components() {
    let a = PointSetDist::Discrete(discrete(vec![(0.0, 1.0)]));
    let b = PointSetDist::Discrete(discrete(vec![(10.0, 1.0)]));
    let m = PointSetDist::mixture(&[(a, 0.75), (b, 0.25)]);
    assert_relative_eq!(m.mean().unwrap(), 2.5);
    assert_eq!(m.inv(0.5), 0.0);
    assert_eq!(m.inv(0.9), 10.0);
  }

  #[test]
  fn truncation_keeps_inner_mass() {
    let t = PointSetDist::Continuous(uniform01(11)).truncate(Some(0.25), Some(0.75));
    assert_relative_eq!(t.integral_sum(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(t.normalize().unwrap().mean().unwrap(), 0.5, epsilon = 1e-12);
  }

  #[test]
  fn affine_map_shifts_and_scales() {
    let ps = PointSetDist::Continuous(uniform01(11)).affine(-2.0, 1.0).unwrap();
    assert_relative_eq!(ps.mean().unwrap(), 0.0, epsilon = 1e-12);
    assert_relative_eq!(ps.integral_sum(), 1.0, epsilon = 1e-12);
  }

  #[test]
  fn discrete_convolution_is_exact() {
    let a = PointSetDist::Discrete(discrete(vec![(1.0, 0.5), (2.0, 0.5)]));
    let b = PointSetDist::Discrete(discrete(vec![(10.0, 0.5), (20.0, 0.5)]));
    let c = PointSetDist::combine_algebraically(AlgebraicOp::Add, &a, &b, 100).unwrap();
    assert_eq!(c.kind(), "discrete");
    assert_abs_diff_eq!(c.mean().unwrap(), 16.5, epsilon = 1e-12);
  }
}
