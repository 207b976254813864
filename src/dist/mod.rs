//! Distributions in three interchangeable representations and the generic
//! operation engine over them.

pub mod kde;
pub mod ops;
pub mod point_set;
pub mod sample_set;
pub mod symbolic;

pub use ops::{AlgebraicOp, AlgebraicStrategy, PointwiseOp};
pub use point_set::{
  build_mixed, ContinuousShape, DiscreteShape, MassAssumption, MixedAssumptions, MixedShape,
  PointSetDist, XYShape,
};
pub use sample_set::SampleSetDist;
pub use symbolic::SymbolicDist;

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistError {
  #[error("{0}")]
  Domain(String),

  #[error("too few samples to estimate a density: got {got}, need at least {need}")]
  TooFewSamples { got: usize, need: usize },

  #[error("invalid parameters: {0}")]
  InvalidParameters(String),

  #[error("mixture: {0}")]
  Mixture(String),

  #[error("not yet implemented: {0}")]
  NotYetImplemented(String),

  #[error("{0}")]
  Internal(String),
}

impl DistError {
  pub fn domain(msg: impl Into<String>) -> Self {
    DistError::Domain(msg.into())
  }

  pub fn invalid(msg: impl Into<String>) -> Self {
    DistError::InvalidParameters(msg.into())
  }
}

pub type Result<T> = std::result::Result<T, DistError>;

#[derive(Debug, Clone, PartialEq)]
pub enum GenericDist {
  Symbolic(SymbolicDist),
  SampleSet(SampleSetDist),
  PointSet(PointSetDist),
}

impl GenericDist {
  pub fn representation(&self) -> &'static str {
    match self {
      GenericDist::Symbolic(_) => "Symbolic",
      GenericDist::SampleSet(_) => "SampleSet",
      GenericDist::PointSet(_) => "PointSet",
    }
  }

  pub fn as_symbolic(&self) -> Option<&SymbolicDist> {
    match self {
      GenericDist::Symbolic(d) => Some(d),
      _ => None,
    }
  }

  pub fn point_mass(x: f64) -> Self {
    GenericDist::Symbolic(SymbolicDist::PointMass(x))
  }
}

impl From<SymbolicDist> for GenericDist {
  fn from(d: SymbolicDist) -> Self {
    GenericDist::Symbolic(d)
  }
}

impl From<SampleSetDist> for GenericDist {
  fn from(d: SampleSetDist) -> Self {
    GenericDist::SampleSet(d)
  }
}

impl From<PointSetDist> for GenericDist {
  fn from(d: PointSetDist) -> Self {
    GenericDist::PointSet(d)
  }
}

impl fmt::Display for GenericDist {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      GenericDist::Symbolic(d) => write!(f, "{}", d),
      GenericDist::SampleSet(d) => write!(f, "Sample Set Distribution ({} samples)", d.len()),
      GenericDist::PointSet(d) => write!(f, "Point Set Distribution ({})", d.kind()),
    }
  }
}
