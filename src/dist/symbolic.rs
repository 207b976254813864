//! Closed-form distribution families.

use super::ops::AlgebraicOp;
use super::point_set::{ContinuousShape, DiscreteShape, PointSetDist, XYShape};
use super::{DistError, Result};
use crate::value::format_number;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Distribution;
use statrs::distribution::{Continuous, ContinuousCDF};
use std::f64::consts::PI;
use std::fmt;

/// z-score of the 95th percentile of a standard normal.
const Z_95: f64 = 1.644_853_626_951_472_2;

/// Tail mass cut off on each side when discretizing unbounded families.
const TAIL: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolicDist {
  Normal { mean: f64, stdev: f64 },
  Lognormal { mu: f64, sigma: f64 },
  Uniform { low: f64, high: f64 },
  Beta { alpha: f64, beta: f64 },
  Cauchy { local: f64, scale: f64 },
  Gamma { shape: f64, scale: f64 },
  Exponential { rate: f64 },
  Triangular { low: f64, mode: f64, high: f64 },
  Logistic { location: f64, scale: f64 },
  Bernoulli { p: f64 },
  PointMass(f64),
}

fn positive(name: &str, x: f64) -> Result<f64> {
  if x.is_finite() && x > 0.0 {
    Ok(x)
  } else {
    Err(DistError::invalid(format!("{} must be a positive finite number, got {}", name, x)))
  }
}

fn finite(name: &str, x: f64) -> Result<f64> {
  if x.is_finite() {
    Ok(x)
  } else {
    Err(DistError::invalid(format!("{} must be finite, got {}", name, x)))
  }
}

fn statrs_err(e: statrs::StatsError) -> DistError {
  DistError::invalid(e.to_string())
}

fn rand_err(e: impl fmt::Display) -> DistError {
  DistError::invalid(e.to_string())
}

impl SymbolicDist {
  pub fn normal(mean: f64, stdev: f64) -> Result<Self> {
    Ok(SymbolicDist::Normal {
      mean: finite("mean", mean)?,
      stdev: positive("stdev", stdev)?,
    })
  }

  pub fn lognormal(mu: f64, sigma: f64) -> Result<Self> {
    Ok(SymbolicDist::Lognormal {
      mu: finite("mu", mu)?,
      sigma: positive("sigma", sigma)?,
    })
  }

  /// Lognormal with the given mean and standard deviation of the variable itself.
  pub fn lognormal_from_mean_stdev(mean: f64, stdev: f64) -> Result<Self> {
    positive("mean", mean)?;
    positive("stdev", stdev)?;
    let sigma2 = (1.0 + (stdev * stdev) / (mean * mean)).ln();
    SymbolicDist::lognormal(mean.ln() - sigma2 / 2.0, sigma2.sqrt())
  }

  /// Normal whose 5th and 95th percentiles are `p5` and `p95`.
  pub fn normal_from_ci(p5: f64, p95: f64) -> Result<Self> {
    if !(p5 < p95) {
      return Err(DistError::invalid(format!("p5 ({}) must be less than p95 ({})", p5, p95)));
    }
    SymbolicDist::normal((p5 + p95) / 2.0, (p95 - p5) / (2.0 * Z_95))
  }

  pub fn lognormal_from_ci(p5: f64, p95: f64) -> Result<Self> {
    if !(p5 > 0.0 && p5 < p95) {
      return Err(DistError::invalid(format!(
        "lognormal 90% interval needs 0 < p5 < p95, got {} and {}",
        p5, p95
      )));
    }
    let (l5, l95) = (p5.ln(), p95.ln());
    SymbolicDist::lognormal((l5 + l95) / 2.0, (l95 - l5) / (2.0 * Z_95))
  }

  /// `low to high`: lognormal when both bounds are positive, normal otherwise.
  pub fn from_to(low: f64, high: f64) -> Result<Self> {
    if !(low < high) {
      return Err(DistError::domain(format!(
        "low value must be less than high value, got {} to {}",
        format_number(low),
        format_number(high)
      )));
    }
    if low > 0.0 {
      SymbolicDist::lognormal_from_ci(low, high)
    } else {
      SymbolicDist::normal_from_ci(low, high)
    }
  }

  pub fn uniform(low: f64, high: f64) -> Result<Self> {
    finite("low", low)?;
    finite("high", high)?;
    if low >= high {
      return Err(DistError::invalid(format!("uniform low ({}) must be less than high ({})", low, high)));
    }
    Ok(SymbolicDist::Uniform { low, high })
  }

  pub fn beta(alpha: f64, beta: f64) -> Result<Self> {
    Ok(SymbolicDist::Beta {
      alpha: positive("alpha", alpha)?,
      beta: positive("beta", beta)?,
    })
  }

  pub fn beta_from_mean_stdev(mean: f64, stdev: f64) -> Result<Self> {
    let var = stdev * stdev;
    if !(mean > 0.0 && mean < 1.0) || !(var > 0.0 && var < mean * (1.0 - mean)) {
      return Err(DistError::invalid(format!(
        "no beta distribution has mean {} and stdev {}",
        mean, stdev
      )));
    }
    let nu = mean * (1.0 - mean) / var - 1.0;
    SymbolicDist::beta(mean * nu, (1.0 - mean) * nu)
  }

  pub fn cauchy(local: f64, scale: f64) -> Result<Self> {
    Ok(SymbolicDist::Cauchy {
      local: finite("location", local)?,
      scale: positive("scale", scale)?,
    })
  }

  pub fn gamma(shape: f64, scale: f64) -> Result<Self> {
    Ok(SymbolicDist::Gamma {
      shape: positive("shape", shape)?,
      scale: positive("scale", scale)?,
    })
  }

  pub fn exponential(rate: f64) -> Result<Self> {
    Ok(SymbolicDist::Exponential {
      rate: positive("rate", rate)?,
    })
  }

  pub fn triangular(low: f64, mode: f64, high: f64) -> Result<Self> {
    finite("low", low)?;
    finite("mode", mode)?;
    finite("high", high)?;
    if !(low <= mode && mode <= high && low < high) {
      return Err(DistError::invalid(format!(
        "triangular needs low <= mode <= high with low < high, got {}, {}, {}",
        low, mode, high
      )));
    }
    Ok(SymbolicDist::Triangular { low, mode, high })
  }

  pub fn logistic(location: f64, scale: f64) -> Result<Self> {
    Ok(SymbolicDist::Logistic {
      location: finite("location", location)?,
      scale: positive("scale", scale)?,
    })
  }

  pub fn bernoulli(p: f64) -> Result<Self> {
    if !(0.0..=1.0).contains(&p) {
      return Err(DistError::invalid(format!("bernoulli p must be in [0, 1], got {}", p)));
    }
    Ok(SymbolicDist::Bernoulli { p })
  }

  pub fn point_mass(x: f64) -> Result<Self> {
    Ok(SymbolicDist::PointMass(finite("point mass", x)?))
  }

  pub fn family(&self) -> &'static str {
    use SymbolicDist::*;
    match self {
      Normal { .. } => "Normal",
      Lognormal { .. } => "Lognormal",
      Uniform { .. } => "Uniform",
      Beta { .. } => "Beta",
      Cauchy { .. } => "Cauchy",
      Gamma { .. } => "Gamma",
      Exponential { .. } => "Exponential",
      Triangular { .. } => "Triangular",
      Logistic { .. } => "Logistic",
      Bernoulli { .. } => "Bernoulli",
      PointMass(..) => "PointMass",
    }
  }

  pub fn params(&self) -> Vec<(&'static str, f64)> {
    use SymbolicDist::*;
    match *self {
      Normal { mean, stdev } => vec![("mean", mean), ("stdev", stdev)],
      Lognormal { mu, sigma } => vec![("mu", mu), ("sigma", sigma)],
      Uniform { low, high } => vec![("low", low), ("high", high)],
      Beta { alpha, beta } => vec![("alpha", alpha), ("beta", beta)],
      Cauchy { local, scale } => vec![("local", local), ("scale", scale)],
      Gamma { shape, scale } => vec![("shape", shape), ("scale", scale)],
      Exponential { rate } => vec![("rate", rate)],
      Triangular { low, mode, high } => vec![("low", low), ("mode", mode), ("high", high)],
      Logistic { location, scale } => vec![("location", location), ("scale", scale)],
      Bernoulli { p } => vec![("p", p)],
      PointMass(x) => vec![("value", x)],
    }
  }

  pub fn is_discrete(&self) -> bool {
    matches!(self, SymbolicDist::Bernoulli { .. } | SymbolicDist::PointMass(..))
  }

  pub fn mean(&self) -> Result<f64> {
    use SymbolicDist::*;
    Ok(match *self {
      Normal { mean, .. } => mean,
      Lognormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
      Uniform { low, high } => (low + high) / 2.0,
      Beta { alpha, beta } => alpha / (alpha + beta),
      Cauchy { .. } => return Err(DistError::domain("Cauchy distributions have no mean")),
      Gamma { shape, scale } => shape * scale,
      Exponential { rate } => 1.0 / rate,
      Triangular { low, mode, high } => (low + mode + high) / 3.0,
      Logistic { location, .. } => location,
      Bernoulli { p } => p,
      PointMass(x) => x,
    })
  }

  pub fn variance(&self) -> Result<f64> {
    use SymbolicDist::*;
    Ok(match *self {
      Normal { stdev, .. } => stdev * stdev,
      Lognormal { mu, sigma } => {
        let s2 = sigma * sigma;
        (s2.exp() - 1.0) * (2.0 * mu + s2).exp()
      }
      Uniform { low, high } => (high - low).powi(2) / 12.0,
      Beta { alpha, beta } => {
        let s = alpha + beta;
        alpha * beta / (s * s * (s + 1.0))
      }
      Cauchy { .. } => return Err(DistError::domain("Cauchy distributions have no variance")),
      Gamma { shape, scale } => shape * scale * scale,
      Exponential { rate } => 1.0 / (rate * rate),
      Triangular { low, mode, high } => {
        (low * low + mode * mode + high * high - low * mode - low * high - mode * high) / 18.0
      }
      Logistic { scale, .. } => scale * scale * PI * PI / 3.0,
      Bernoulli { p } => p * (1.0 - p),
      PointMass(_) => 0.0,
    })
  }

  pub fn mode(&self) -> Result<f64> {
    use SymbolicDist::*;
    Ok(match *self {
      Normal { mean, .. } => mean,
      Lognormal { mu, sigma } => (mu - sigma * sigma).exp(),
      Uniform { .. } => return Err(DistError::domain("uniform distributions have no unique mode")),
      Beta { alpha, beta } if alpha > 1.0 && beta > 1.0 => (alpha - 1.0) / (alpha + beta - 2.0),
      Beta { .. } => return Err(DistError::domain("beta mode is only defined for alpha, beta > 1")),
      Cauchy { local, .. } => local,
      Gamma { shape, scale } => ((shape - 1.0) * scale).max(0.0),
      Exponential { .. } => 0.0,
      Triangular { mode, .. } => mode,
      Logistic { location, .. } => location,
      Bernoulli { p } => {
        if p > 0.5 {
          1.0
        } else {
          0.0
        }
      }
      PointMass(x) => x,
    })
  }

  /// Density for continuous families, probability mass for discrete ones.
  pub fn pdf(&self, x: f64) -> Result<f64> {
    use SymbolicDist::*;
    Ok(match *self {
      Normal { mean, stdev } => statrs::distribution::Normal::new(mean, stdev)
        .map_err(statrs_err)?
        .pdf(x),
      Lognormal { mu, sigma } => {
        if x <= 0.0 {
          0.0
        } else {
          statrs::distribution::LogNormal::new(mu, sigma)
            .map_err(statrs_err)?
            .pdf(x)
        }
      }
      Uniform { low, high } => {
        if x >= low && x <= high {
          1.0 / (high - low)
        } else {
          0.0
        }
      }
      Beta { alpha, beta } => {
        if x < 0.0 || x > 1.0 {
          0.0
        } else {
          statrs::distribution::Beta::new(alpha, beta)
            .map_err(statrs_err)?
            .pdf(x)
        }
      }
      Cauchy { local, scale } => statrs::distribution::Cauchy::new(local, scale)
        .map_err(statrs_err)?
        .pdf(x),
      Gamma { shape, scale } => {
        if x < 0.0 {
          0.0
        } else {
          statrs::distribution::Gamma::new(shape, 1.0 / scale)
            .map_err(statrs_err)?
            .pdf(x)
        }
      }
      Exponential { rate } => {
        if x < 0.0 {
          0.0
        } else {
          rate * (-rate * x).exp()
        }
      }
      Triangular { low, mode, high } => {
        if x < low || x > high {
          0.0
        } else if x < mode {
          2.0 * (x - low) / ((high - low) * (mode - low))
        } else if x == mode {
          2.0 / (high - low)
        } else {
          2.0 * (high - x) / ((high - low) * (high - mode))
        }
      }
      Logistic { location, scale } => {
        let z = (-(x - location) / scale).exp();
        z / (scale * (1.0 + z).powi(2))
      }
      Bernoulli { p } => {
        if x == 1.0 {
          p
        } else if x == 0.0 {
          1.0 - p
        } else {
          0.0
        }
      }
      PointMass(v) => {
        if x == v {
          1.0
        } else {
          0.0
        }
      }
    })
  }

  pub fn cdf(&self, x: f64) -> Result<f64> {
    use SymbolicDist::*;
    Ok(match *self {
      Normal { mean, stdev } => statrs::distribution::Normal::new(mean, stdev)
        .map_err(statrs_err)?
        .cdf(x),
      Lognormal { mu, sigma } => {
        if x <= 0.0 {
          0.0
        } else {
          statrs::distribution::LogNormal::new(mu, sigma)
            .map_err(statrs_err)?
            .cdf(x)
        }
      }
      Uniform { low, high } => ((x - low) / (high - low)).clamp(0.0, 1.0),
      Beta { alpha, beta } => statrs::distribution::Beta::new(alpha, beta)
        .map_err(statrs_err)?
        .cdf(x.clamp(0.0, 1.0)),
      Cauchy { local, scale } => statrs::distribution::Cauchy::new(local, scale)
        .map_err(statrs_err)?
        .cdf(x),
      Gamma { shape, scale } => {
        if x <= 0.0 {
          0.0
        } else {
          statrs::distribution::Gamma::new(shape, 1.0 / scale)
            .map_err(statrs_err)?
            .cdf(x)
        }
      }
      Exponential { rate } => {
        if x <= 0.0 {
          0.0
        } else {
          1.0 - (-rate * x).exp()
        }
      }
      Triangular { low, mode, high } => {
        if x <= low {
          0.0
        } else if x >= high {
          1.0
        } else if x <= mode {
          (x - low).powi(2) / ((high - low) * (mode - low))
        } else {
          1.0 - (high - x).powi(2) / ((high - low) * (high - mode))
        }
      }
      Logistic { location, scale } => 1.0 / (1.0 + (-(x - location) / scale).exp()),
      Bernoulli { p } => {
        if x < 0.0 {
          0.0
        } else if x < 1.0 {
          1.0 - p
        } else {
          1.0
        }
      }
      PointMass(v) => {
        if x < v {
          0.0
        } else {
          1.0
        }
      }
    })
  }

  /// Inverse CDF; `p` must already be validated to lie in `[0, 1]`.
  pub fn inv(&self, p: f64) -> Result<f64> {
    use SymbolicDist::*;
    Ok(match *self {
      Normal { mean, stdev } => statrs::distribution::Normal::new(mean, stdev)
        .map_err(statrs_err)?
        .inverse_cdf(p),
      Lognormal { mu, sigma } => {
        let z = statrs::distribution::Normal::new(mu, sigma)
          .map_err(statrs_err)?
          .inverse_cdf(p);
        z.exp()
      }
      Uniform { low, high } => low + p * (high - low),
      Beta { alpha, beta } => statrs::distribution::Beta::new(alpha, beta)
        .map_err(statrs_err)?
        .inverse_cdf(p),
      Cauchy { local, scale } => {
        if p <= 0.0 {
          f64::NEG_INFINITY
        } else if p >= 1.0 {
          f64::INFINITY
        } else {
          local + scale * (PI * (p - 0.5)).tan()
        }
      }
      Gamma { shape, scale } => statrs::distribution::Gamma::new(shape, 1.0 / scale)
        .map_err(statrs_err)?
        .inverse_cdf(p),
      Exponential { rate } => -(1.0 - p).ln() / rate,
      Triangular { low, mode, high } => {
        let split = (mode - low) / (high - low);
        if p < split {
          low + (p * (high - low) * (mode - low)).sqrt()
        } else {
          high - ((1.0 - p) * (high - low) * (high - mode)).sqrt()
        }
      }
      Logistic { location, scale } => location + scale * (p / (1.0 - p)).ln(),
      Bernoulli { p: prob } => {
        if p <= 1.0 - prob {
          0.0
        } else {
          1.0
        }
      }
      PointMass(x) => x,
    })
  }

  pub fn sample(&self, rng: &mut StdRng) -> Result<f64> {
    use SymbolicDist::*;
    Ok(match *self {
      Normal { mean, stdev } => rand_distr::Normal::new(mean, stdev)
        .map_err(rand_err)?
        .sample(rng),
      Lognormal { mu, sigma } => rand_distr::LogNormal::new(mu, sigma)
        .map_err(rand_err)?
        .sample(rng),
      Uniform { low, high } => rng.gen_range(low..high),
      Beta { alpha, beta } => rand_distr::Beta::new(alpha, beta)
        .map_err(rand_err)?
        .sample(rng),
      Cauchy { local, scale } => rand_distr::Cauchy::new(local, scale)
        .map_err(rand_err)?
        .sample(rng),
      Gamma { shape, scale } => rand_distr::Gamma::new(shape, scale)
        .map_err(rand_err)?
        .sample(rng),
      Exponential { rate } => rand_distr::Exp::new(rate).map_err(rand_err)?.sample(rng),
      Triangular { low, mode, high } => rand_distr::Triangular::new(low, high, mode)
        .map_err(rand_err)?
        .sample(rng),
      Logistic { .. } | Bernoulli { .. } => {
        let u: f64 = rng.gen();
        self.inv(u)?
      }
      PointMass(x) => x,
    })
  }

  pub fn sample_n(&self, n: usize, rng: &mut StdRng) -> Result<Vec<f64>> {
    (0..n).map(|_| self.sample(rng)).collect()
  }

  /// Interval covering all but `TAIL` mass on each unbounded side.
  fn support(&self) -> Result<(f64, f64)> {
    use SymbolicDist::*;
    Ok(match *self {
      Uniform { low, high } | Triangular { low, high, .. } => (low, high),
      Exponential { .. } | Gamma { .. } => (0.0, self.inv(1.0 - TAIL)?),
      _ => (self.inv(TAIL)?, self.inv(1.0 - TAIL)?),
    })
  }

  pub fn to_point_set(&self, n: usize) -> Result<PointSetDist> {
    use SymbolicDist::*;
    match *self {
      PointMass(x) => Ok(PointSetDist::Discrete(DiscreteShape::new(XYShape::new(
        vec![x],
        vec![1.0],
      )?))),
      Bernoulli { p } => {
        let points: Vec<(f64, f64)> = vec![(0.0, 1.0 - p), (1.0, p)]
          .into_iter()
          .filter(|(_, m)| *m > 0.0)
          .collect();
        Ok(PointSetDist::Discrete(DiscreteShape::new(XYShape::from_points(points)?)))
      }
      _ => {
        let (low, high) = self.support()?;
        let n = n.max(2);
        let step = (high - low) / (n - 1) as f64;
        let xs: Vec<f64> = (0..n).map(|i| low + step * i as f64).collect();
        let ys = xs
          .iter()
          .map(|x| self.pdf(*x).map(|y| if y.is_finite() { y } else { 0.0 }))
          .collect::<Result<Vec<_>>>()?;
        let shape = ContinuousShape::new(XYShape::new(xs, ys)?);
        Ok(PointSetDist::Continuous(shape.normalize()?))
      }
    }
  }

  /// Closed-form result of `a op b` when one is known.
  pub fn combine(op: AlgebraicOp, a: &SymbolicDist, b: &SymbolicDist) -> Option<SymbolicDist> {
    use AlgebraicOp::*;
    use SymbolicDist::*;
    let result = match (op, a, b) {
      (_, PointMass(x), PointMass(y)) => {
        let z = op.apply(*x, *y);
        if z.is_finite() {
          PointMass(z)
        } else {
          return None;
        }
      }
      (Add, Normal { mean: m1, stdev: s1 }, Normal { mean: m2, stdev: s2 }) => Normal {
        mean: m1 + m2,
        stdev: s1.hypot(*s2),
      },
      (Subtract, Normal { mean: m1, stdev: s1 }, Normal { mean: m2, stdev: s2 }) => Normal {
        mean: m1 - m2,
        stdev: s1.hypot(*s2),
      },
      (Add, Normal { mean, stdev }, PointMass(k)) | (Add, PointMass(k), Normal { mean, stdev }) => {
        Normal {
          mean: mean + k,
          stdev: *stdev,
        }
      }
      (Subtract, Normal { mean, stdev }, PointMass(k)) => Normal {
        mean: mean - k,
        stdev: *stdev,
      },
      (Subtract, PointMass(k), Normal { mean, stdev }) => Normal {
        mean: k - mean,
        stdev: *stdev,
      },
      (Multiply, Normal { mean, stdev }, PointMass(k))
      | (Multiply, PointMass(k), Normal { mean, stdev })
        if *k != 0.0 =>
      {
        Normal {
          mean: mean * k,
          stdev: stdev * k.abs(),
        }
      }
      (Divide, Normal { mean, stdev }, PointMass(k)) if *k != 0.0 => Normal {
        mean: mean / k,
        stdev: stdev / k.abs(),
      },
      (Multiply, Lognormal { mu: m1, sigma: s1 }, Lognormal { mu: m2, sigma: s2 }) => Lognormal {
        mu: m1 + m2,
        sigma: s1.hypot(*s2),
      },
      (Divide, Lognormal { mu: m1, sigma: s1 }, Lognormal { mu: m2, sigma: s2 }) => Lognormal {
        mu: m1 - m2,
        sigma: s1.hypot(*s2),
      },
      (Multiply, Lognormal { mu, sigma }, PointMass(k))
      | (Multiply, PointMass(k), Lognormal { mu, sigma })
        if *k > 0.0 =>
      {
        Lognormal {
          mu: mu + k.ln(),
          sigma: *sigma,
        }
      }
      (Divide, Lognormal { mu, sigma }, PointMass(k)) if *k > 0.0 => Lognormal {
        mu: mu - k.ln(),
        sigma: *sigma,
      },
      (Add, Uniform { low, high }, PointMass(k)) | (Add, PointMass(k), Uniform { low, high }) => {
        Uniform {
          low: low + k,
          high: high + k,
        }
      }
      (Subtract, Uniform { low, high }, PointMass(k)) => Uniform {
        low: low - k,
        high: high - k,
      },
      (Multiply, Uniform { low, high }, PointMass(k))
      | (Multiply, PointMass(k), Uniform { low, high })
        if *k != 0.0 =>
      {
        let (a, b) = (low * k, high * k);
        Uniform {
          low: a.min(b),
          high: a.max(b),
        }
      }
      (Multiply, Exponential { rate }, PointMass(k))
      | (Multiply, PointMass(k), Exponential { rate })
        if *k > 0.0 =>
      {
        Exponential { rate: rate / k }
      }
      _ => return None,
    };
    Some(result)
  }
}

impl fmt::Display for SymbolicDist {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let params = self
      .params()
      .into_iter()
      .map(|(_, x)| format_number(x))
      .collect::<Vec<_>>()
      .join(",");
    write!(f, "{}({})", self.family(), params)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;
  use rand::SeedableRng;

  #[test]
  fn normal_sum_adds_means_and_variances() {
    let a = SymbolicDist::normal(5.0, 3.0).unwrap();
    let b = SymbolicDist::normal(-2.0, 4.0).unwrap();
    let c = SymbolicDist::combine(AlgebraicOp::Add, &a, &b).unwrap();
    assert_relative_eq!(c.mean().unwrap(), 3.0);
    assert_relative_eq!(c.variance().unwrap(), 25.0);
  }

  #[test]
  fn lognormal_product_stays_lognormal() {
    let a = SymbolicDist::lognormal(1.0, 0.3).unwrap();
    let b = SymbolicDist::lognormal(2.0, 0.4).unwrap();
    match SymbolicDist::combine(AlgebraicOp::Multiply, &a, &b) {
      Some(SymbolicDist::Lognormal { mu, sigma }) => {
        assert_relative_eq!(mu, 3.0);
        assert_relative_eq!(sigma, 0.5);
      }
      other => panic!("expected lognormal, got {:?}", other),
    }
  }

  #[test]
  fn to_builds_from_ninety_percent_interval() {
    let d = SymbolicDist::from_to(1.0, 10.0).unwrap();
    assert!(matches!(d, SymbolicDist::Lognormal { .. }));
    assert_relative_eq!(d.inv(0.05).unwrap(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(d.inv(0.95).unwrap(), 10.0, epsilon = 1e-6);
    assert!(matches!(SymbolicDist::from_to(-5.0, 5.0).unwrap(), SymbolicDist::Normal { .. }));
    assert!(SymbolicDist::from_to(5.0, 1.0).is_err());
  }

  #[test]
  fn invalid_parameters_are_rejected() {
    assert!(SymbolicDist::normal(0.0, -1.0).is_err());
    assert!(SymbolicDist::uniform(3.0, 1.0).is_err());
    assert!(SymbolicDist::beta_from_mean_stdev(0.5, 0.9).is_err());
    assert!(SymbolicDist::bernoulli(1.5).is_err());
  }

  #[test]
  fn cdf_and_inv_agree() {
    let dists = vec![
      SymbolicDist::normal(1.0, 2.0).unwrap(),
      SymbolicDist::uniform(0.0, 4.0).unwrap(),
      SymbolicDist::triangular(0.0, 1.0, 4.0).unwrap(),
      SymbolicDist::exponential(2.0).unwrap(),
      SymbolicDist::logistic(0.0, 1.0).unwrap(),
      SymbolicDist::cauchy(0.0, 1.0).unwrap(),
    ];
    for d in dists {
      for p in [0.1, 0.5, 0.9] {
        let x = d.inv(p).unwrap();
        assert_relative_eq!(d.cdf(x).unwrap(), p, epsilon = 1e-6);
      }
    }
  }

  #[test]
  fn discretized_normal_keeps_mean() {
    let d = SymbolicDist::normal(3.0, 1.0).unwrap();
    let ps = d.to_point_set(500).unwrap();
    assert_relative_eq!(ps.mean().unwrap(), 3.0, epsilon = 1e-3);
    assert_relative_eq!(ps.integral_sum(), 1.0, epsilon = 1e-9);
  }

  #[test]
  fn samples_match_family_mean() {
    let mut rng = StdRng::seed_from_u64(11);
    let d = SymbolicDist::gamma(2.0, 3.0).unwrap();
    let xs = d.sample_n(20_000, &mut rng).unwrap();
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    assert_relative_eq!(mean, 6.0, max_relative = 0.05);
  }

  #[test]
  fn display_uses_family_and_parameters() {
    assert_eq!(SymbolicDist::normal(5.0, 2.0).unwrap().to_string(), "Normal(5,2)");
  }
}
