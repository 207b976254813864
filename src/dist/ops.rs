//! The generic operation engine: representation conversion, statistics and
//! combination of distributions regardless of how they are stored.

use super::point_set::PointSetDist;
use super::sample_set::SampleSetDist;
use super::symbolic::SymbolicDist;
use super::{DistError, GenericDist, Result};
use crate::env::Environment;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgebraicOp {
  Add,
  Subtract,
  Multiply,
  Divide,
  Power,
  Logarithm,
}

impl AlgebraicOp {
  pub fn apply(self, a: f64, b: f64) -> f64 {
    match self {
      AlgebraicOp::Add => a + b,
      AlgebraicOp::Subtract => a - b,
      AlgebraicOp::Multiply => a * b,
      AlgebraicOp::Divide => a / b,
      AlgebraicOp::Power => a.powf(b),
      AlgebraicOp::Logarithm => a.ln() / b.ln(),
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      AlgebraicOp::Add => "add",
      AlgebraicOp::Subtract => "subtract",
      AlgebraicOp::Multiply => "multiply",
      AlgebraicOp::Divide => "divide",
      AlgebraicOp::Power => "pow",
      AlgebraicOp::Logarithm => "log",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Some(match name {
      "add" => AlgebraicOp::Add,
      "subtract" => AlgebraicOp::Subtract,
      "multiply" => AlgebraicOp::Multiply,
      "divide" => AlgebraicOp::Divide,
      "pow" => AlgebraicOp::Power,
      "log" => AlgebraicOp::Logarithm,
      _ => return None,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlgebraicStrategy {
  #[default]
  Auto,
  MonteCarlo,
  Convolution,
}

impl AlgebraicStrategy {
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "auto" => Some(AlgebraicStrategy::Auto),
      "monteCarlo" => Some(AlgebraicStrategy::MonteCarlo),
      "convolution" => Some(AlgebraicStrategy::Convolution),
      _ => None,
    }
  }
}

/// Operations applied to densities at each x rather than to random variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointwiseOp {
  Add,
  Subtract,
  Multiply,
  Divide,
  Power,
}

impl PointwiseOp {
  pub fn apply(self, a: f64, b: f64) -> f64 {
    match self {
      PointwiseOp::Add => a + b,
      PointwiseOp::Subtract => a - b,
      PointwiseOp::Multiply => a * b,
      PointwiseOp::Divide => a / b,
      PointwiseOp::Power => a.powf(b),
    }
  }
}

fn check_probability(p: f64) -> Result<()> {
  if (0.0..=1.0).contains(&p) {
    Ok(())
  } else {
    Err(DistError::domain(format!("probability {} is outside [0, 1]", p)))
  }
}

impl GenericDist {
  pub fn to_sample_set(&self, env: &Environment, rng: &mut StdRng) -> Result<SampleSetDist> {
    match self {
      GenericDist::SampleSet(s) => Ok(s.clone()),
      GenericDist::Symbolic(d) => SampleSetDist::new(d.sample_n(env.sample_count, rng)?),
      GenericDist::PointSet(d) => SampleSetDist::new(d.normalize()?.sample_n(env.sample_count, rng)),
    }
  }

  pub fn to_point_set(&self, env: &Environment) -> Result<PointSetDist> {
    match self {
      GenericDist::PointSet(d) => Ok(d.clone()),
      GenericDist::Symbolic(d) => d.to_point_set(env.xy_point_length),
      GenericDist::SampleSet(s) => s.to_point_set(env.xy_point_length),
    }
  }

  pub fn mean(&self) -> Result<f64> {
    match self {
      GenericDist::Symbolic(d) => d.mean(),
      GenericDist::SampleSet(s) => Ok(s.mean()),
      GenericDist::PointSet(d) => d.mean(),
    }
  }

  pub fn variance(&self) -> Result<f64> {
    match self {
      GenericDist::Symbolic(d) => d.variance(),
      GenericDist::SampleSet(s) => Ok(s.variance()),
      GenericDist::PointSet(d) => d.variance(),
    }
  }

  pub fn stdev(&self) -> Result<f64> {
    Ok(self.variance()?.sqrt())
  }

  pub fn mode(&self, env: &Environment) -> Result<f64> {
    match self {
      GenericDist::Symbolic(d) => d.mode(),
      _ => self.to_point_set(env)?.mode(),
    }
  }

  pub fn inv(&self, p: f64) -> Result<f64> {
    check_probability(p)?;
    match self {
      GenericDist::Symbolic(d) => d.inv(p),
      GenericDist::SampleSet(s) => Ok(s.percentile(p)),
      GenericDist::PointSet(d) => Ok(d.inv(p)),
    }
  }

  pub fn median(&self) -> Result<f64> {
    self.inv(0.5)
  }

  pub fn cdf(&self, x: f64) -> Result<f64> {
    match self {
      GenericDist::Symbolic(d) => d.cdf(x),
      GenericDist::SampleSet(s) => Ok(s.cdf(x)),
      GenericDist::PointSet(d) => Ok(d.cdf(x)),
    }
  }

  pub fn pdf(&self, x: f64, env: &Environment) -> Result<f64> {
    match self {
      GenericDist::Symbolic(d) => d.pdf(x),
      GenericDist::SampleSet(s) => Ok(s.to_point_set(env.xy_point_length)?.pdf(x)),
      GenericDist::PointSet(d) => Ok(d.pdf(x)),
    }
  }

  pub fn sample(&self, rng: &mut StdRng) -> Result<f64> {
    Ok(match self {
      GenericDist::Symbolic(d) => d.sample(rng)?,
      GenericDist::SampleSet(s) => s.sample(rng),
      GenericDist::PointSet(d) => d.normalize()?.sample(rng),
    })
  }

  pub fn sample_n(&self, n: usize, rng: &mut StdRng) -> Result<Vec<f64>> {
    Ok(match self {
      GenericDist::Symbolic(d) => d.sample_n(n, rng)?,
      GenericDist::SampleSet(s) => s.sample_n(n, rng),
      GenericDist::PointSet(d) => d.normalize()?.sample_n(n, rng),
    })
  }

  pub fn integral_sum(&self) -> f64 {
    match self {
      GenericDist::PointSet(d) => d.integral_sum(),
      _ => 1.0,
    }
  }

  pub fn is_normalized(&self) -> bool {
    match self {
      GenericDist::PointSet(d) => d.is_normalized(),
      _ => true,
    }
  }

  pub fn normalize(&self) -> Result<GenericDist> {
    match self {
      GenericDist::PointSet(d) => Ok(GenericDist::PointSet(d.normalize()?)),
      other => Ok(other.clone()),
    }
  }

  /// Restricts to `[low, high]` and renormalizes.
  pub fn truncate(&self, low: Option<f64>, high: Option<f64>, env: &Environment) -> Result<GenericDist> {
    if let (Some(lo), Some(hi)) = (low, high) {
      if lo >= hi {
        return Err(DistError::domain(format!(
          "truncation bounds must be increasing, got {} and {}",
          lo, hi
        )));
      }
    }
    if low.is_none() && high.is_none() {
      return Ok(self.clone());
    }
    match self {
      GenericDist::SampleSet(s) => Ok(GenericDist::SampleSet(s.truncate(low, high)?)),
      _ => {
        let truncated = self.to_point_set(env)?.truncate(low, high);
        Ok(GenericDist::PointSet(truncated.normalize()?))
      }
    }
  }

  /// `a op b` for two distributions.
  pub fn algebraic_combination(
    op: AlgebraicOp,
    a: &GenericDist,
    b: &GenericDist,
    strategy: AlgebraicStrategy,
    env: &Environment,
    rng: &mut StdRng,
  ) -> Result<GenericDist> {
    match strategy {
      AlgebraicStrategy::Auto => {
        if let (GenericDist::Symbolic(x), GenericDist::Symbolic(y)) = (a, b) {
          if let Some(d) = SymbolicDist::combine(op, x, y) {
            trace!(op = op.name(), "closed-form combination");
            return Ok(GenericDist::Symbolic(d));
          }
        }
        Self::monte_carlo(op, a, b, env, rng)
      }
      AlgebraicStrategy::MonteCarlo => Self::monte_carlo(op, a, b, env, rng),
      AlgebraicStrategy::Convolution => {
        trace!(op = op.name(), "numeric convolution");
        let combined = PointSetDist::combine_algebraically(
          op,
          &a.to_point_set(env)?,
          &b.to_point_set(env)?,
          env.xy_point_length,
        )?;
        Ok(GenericDist::PointSet(combined))
      }
    }
  }

  /// Existing sample sets pair index-wise, so `x - x` is exactly zero.
  fn monte_carlo(
    op: AlgebraicOp,
    a: &GenericDist,
    b: &GenericDist,
    env: &Environment,
    rng: &mut StdRng,
  ) -> Result<GenericDist> {
    trace!(op = op.name(), "monte carlo combination");
    let xs = a.to_sample_set(env, rng)?;
    let ys = b.to_sample_set(env, rng)?;
    Ok(GenericDist::SampleSet(SampleSetDist::map2(&xs, &ys, |x, y| op.apply(x, y))?))
  }

  /// `d op k`, or `k op d` when `scalar_first` is set.
  pub fn scalar_combination(
    op: AlgebraicOp,
    d: &GenericDist,
    k: f64,
    scalar_first: bool,
    env: &Environment,
    rng: &mut StdRng,
  ) -> Result<GenericDist> {
    let apply = |x: f64| if scalar_first { op.apply(k, x) } else { op.apply(x, k) };
    match d {
      GenericDist::Symbolic(s) => {
        let point = SymbolicDist::PointMass(k);
        let closed = if scalar_first {
          SymbolicDist::combine(op, &point, s)
        } else {
          SymbolicDist::combine(op, s, &point)
        };
        if let Some(r) = closed {
          trace!(op = op.name(), "closed-form scalar combination");
          return Ok(GenericDist::Symbolic(r));
        }
        let samples = d.to_sample_set(env, rng)?;
        Ok(GenericDist::SampleSet(samples.map(apply)?))
      }
      GenericDist::SampleSet(s) => Ok(GenericDist::SampleSet(s.map(apply)?)),
      GenericDist::PointSet(p) => {
        let affine = match (op, scalar_first) {
          (AlgebraicOp::Add, _) => Some((1.0, k)),
          (AlgebraicOp::Subtract, false) => Some((1.0, -k)),
          (AlgebraicOp::Subtract, true) => Some((-1.0, k)),
          (AlgebraicOp::Multiply, _) if k != 0.0 => Some((k, 0.0)),
          (AlgebraicOp::Divide, false) if k != 0.0 => Some((1.0 / k, 0.0)),
          _ => None,
        };
        match affine {
          Some((m, a)) => Ok(GenericDist::PointSet(p.affine(m, a)?)),
          None => {
            let samples = d.to_sample_set(env, rng)?;
            Ok(GenericDist::SampleSet(samples.map(apply)?))
          }
        }
      }
    }
  }

  /// Combines densities at each x.
  pub fn pointwise_combination(
    op: PointwiseOp,
    a: &GenericDist,
    b: &GenericDist,
    env: &Environment,
  ) -> Result<GenericDist> {
    let x = a.to_point_set(env)?;
    let y = b.to_point_set(env)?;
    Ok(GenericDist::PointSet(x.pointwise(&y, move |p, q| op.apply(p, q))))
  }

  /// Multiplies densities by a constant.
  pub fn scale_density(&self, k: f64, env: &Environment) -> Result<GenericDist> {
    Ok(GenericDist::PointSet(self.to_point_set(env)?.scale_y(k)))
  }

  /// Weighted mixture; weights are normalized to sum to 1.
  pub fn mixture(items: &[(GenericDist, f64)], env: &Environment, rng: &mut StdRng) -> Result<GenericDist> {
    if items.is_empty() {
      return Err(DistError::Mixture("needs at least one distribution".into()));
    }
    if let Some((_, w)) = items.iter().find(|(_, w)| !(*w >= 0.0) || !w.is_finite()) {
      return Err(DistError::Mixture(format!("weights must be non-negative, got {}", w)));
    }
    let total: f64 = items.iter().map(|(_, w)| w).sum();
    if !(total > 0.0) {
      return Err(DistError::Mixture("weights must have a positive sum".into()));
    }
    let weights: Vec<f64> = items.iter().map(|(_, w)| w / total).collect();

    if items.iter().any(|(d, _)| matches!(d, GenericDist::SampleSet(_))) {
      trace!(components = items.len(), "sample set mixture");
      let sets = items
        .iter()
        .map(|(d, _)| d.to_sample_set(env, rng))
        .collect::<Result<Vec<_>>>()?;
      let samples = (0..env.sample_count)
        .map(|i| {
          let u: f64 = rng.gen();
          let mut acc = 0.0;
          let mut chosen = sets.len() - 1;
          for (j, w) in weights.iter().enumerate() {
            acc += w;
            if u < acc {
              chosen = j;
              break;
            }
          }
          let set = sets[chosen].samples();
          set[i % set.len()]
        })
        .collect();
      return Ok(GenericDist::SampleSet(SampleSetDist::new(samples)?));
    }

    trace!(components = items.len(), "point set mixture");
    let parts = items
      .iter()
      .zip(weights.iter())
      .map(|((d, _), w)| Ok((d.to_point_set(env)?.normalize()?, *w)))
      .collect::<Result<Vec<_>>>()?;
    Ok(GenericDist::PointSet(PointSetDist::mixture(&parts)))
  }

  fn fold(
    op: AlgebraicOp,
    dists: &[GenericDist],
    env: &Environment,
    rng: &mut StdRng,
  ) -> Result<GenericDist> {
    let (first, rest) = dists
      .split_first()
      .ok_or_else(|| DistError::invalid(format!("{} of an empty list", op.name())))?;
    rest.iter().try_fold(first.clone(), |acc, d| {
      GenericDist::algebraic_combination(op, &acc, d, AlgebraicStrategy::Auto, env, rng)
    })
  }

  pub fn sum(dists: &[GenericDist], env: &Environment, rng: &mut StdRng) -> Result<GenericDist> {
    Self::fold(AlgebraicOp::Add, dists, env, rng)
  }

  pub fn product(dists: &[GenericDist], env: &Environment, rng: &mut StdRng) -> Result<GenericDist> {
    Self::fold(AlgebraicOp::Multiply, dists, env, rng)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  fn setup() -> (Environment, StdRng) {
    let env = Environment::default().with_seed("ops");
    let rng = env.rng();
    (env, rng)
  }

  fn normal(mean: f64, stdev: f64) -> GenericDist {
    GenericDist::Symbolic(SymbolicDist::normal(mean, stdev).unwrap())
  }

  #[test]
  fn normal_sum_means_add() {
    let (env, mut rng) = setup();
    for (m1, m2) in [(0.0, 1.0), (-3.5, 10.0), (1e6, 2e-3)] {
      let sum = GenericDist::algebraic_combination(
        AlgebraicOp::Add,
        &normal(m1, 1.0),
        &normal(m2, 2.0),
        AlgebraicStrategy::Auto,
        &env,
        &mut rng,
      )
      .unwrap();
      assert_eq!(sum.representation(), "Symbolic");
      assert_relative_eq!(sum.mean().unwrap(), m1 + m2, max_relative = 1e-12);
    }
  }

  #[test]
  fn paired_sample_sets_cancel() {
    let (env, mut rng) = setup();
    let x = GenericDist::SampleSet(normal(0.0, 1.0).to_sample_set(&env, &mut rng).unwrap());
    let diff = GenericDist::algebraic_combination(
      AlgebraicOp::Subtract,
      &x,
      &x,
      AlgebraicStrategy::Auto,
      &env,
      &mut rng,
    )
    .unwrap();
    assert_eq!(diff.variance().unwrap(), 0.0);
  }

  #[test]
  fn round_trip_mean_is_close() {
    let (env, mut rng) = setup();
    let d = normal(10.0, 1.0);
    let samples = GenericDist::SampleSet(d.to_sample_set(&env, &mut rng).unwrap());
    let ps = samples.to_point_set(&env).unwrap();
    assert!((ps.mean().unwrap() - 10.0).abs() < 0.5);
  }

  #[test]
  fn inv_rejects_bad_probability() {
    assert!(matches!(normal(0.0, 1.0).inv(1.5), Err(DistError::Domain(_))));
    assert!(matches!(normal(0.0, 1.0).inv(-0.1), Err(DistError::Domain(_))));
  }

  #[test]
  fn mixture_median_leans_to_heavier_component() {
    let (env, mut rng) = setup();
    let low = GenericDist::mixture(&[(normal(0.0, 1.0), 3.0), (normal(10.0, 1.0), 1.0)], &env, &mut rng).unwrap();
    let median = low.inv(0.5).unwrap();
    assert!(median > 0.0 && median < 5.0, "median was {}", median);

    let high = GenericDist::mixture(&[(normal(0.0, 1.0), 1.0), (normal(10.0, 1.0), 3.0)], &env, &mut rng).unwrap();
    let median = high.inv(0.5).unwrap();
    assert!(median > 5.0 && median < 10.0, "median was {}", median);
  }

  #[test]
  fn sample_set_components_mix_by_sampling() {
    let (env, mut rng) = setup();
    let samples = GenericDist::SampleSet(normal(10.0, 1.0).to_sample_set(&env, &mut rng).unwrap());
    for (weights, low, high) in [((3.0, 1.0), 0.0, 5.0), ((1.0, 3.0), 5.0, 10.0)] {
      let mix = GenericDist::mixture(
        &[(normal(0.0, 1.0), weights.0), (samples.clone(), weights.1)],
        &env,
        &mut rng,
      )
      .unwrap();
      assert!(matches!(mix, GenericDist::SampleSet(_)));
      let median = mix.inv(0.5).unwrap();
      assert!(median > low && median < high, "weights {:?} gave median {}", weights, median);
    }
  }

  #[test]
  fn mixture_rejects_bad_weights() {
    let (env, mut rng) = setup();
    let bad = GenericDist::mixture(&[(normal(0.0, 1.0), -1.0)], &env, &mut rng);
    assert!(matches!(bad, Err(DistError::Mixture(_))));
    let zero = GenericDist::mixture(&[(normal(0.0, 1.0), 0.0)], &env, &mut rng);
    assert!(matches!(zero, Err(DistError::Mixture(_))));
  }

  #[test]
  fn convolution_matches_closed_form_mean() {
    let env = Environment::default().with_xy_point_length(400);
    let mut rng = env.rng();
    let sum = GenericDist::algebraic_combination(
      AlgebraicOp::Add,
      &normal(1.0, 1.0),
      &normal(2.0, 1.0),
      AlgebraicStrategy::Convolution,
      &env,
      &mut rng,
    )
    .unwrap();
    assert!((sum.mean().unwrap() - 3.0).abs() < 0.05);
  }

  #[test]
  fn scalar_shift_of_point_set() {
    let (env, mut rng) = setup();
    let ps = GenericDist::PointSet(normal(0.0, 1.0).to_point_set(&env).unwrap());
    let shifted =
      GenericDist::scalar_combination(AlgebraicOp::Subtract, &ps, 4.0, true, &env, &mut rng).unwrap();
    assert!((shifted.mean().unwrap() - 4.0).abs() < 1e-6);
  }

  #[test]
  fn truncation_renormalizes() {
    let (env, _) = setup();
    let t = normal(0.0, 1.0).truncate(Some(0.0), None, &env).unwrap();
    assert_relative_eq!(t.integral_sum(), 1.0, epsilon = 1e-9);
    assert!(t.mean().unwrap() > 0.7);
  }
}
