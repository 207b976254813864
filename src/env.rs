use crate::error::ErrorMessage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Run-wide numeric approximation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Environment {
  /// Draws per sample set.
  pub sample_count: usize,
  /// Points per continuous point-set curve.
  pub xy_point_length: usize,
  pub seed: Option<String>,
  pub max_call_depth: usize,
}

impl Default for Environment {
  fn default() -> Self {
    Environment {
      sample_count: 1000,
      xy_point_length: 1000,
      seed: None,
      max_call_depth: 256,
    }
  }
}

impl Environment {
  pub fn with_sample_count(mut self, n: usize) -> Self {
    self.sample_count = n;
    self
  }

  pub fn with_xy_point_length(mut self, n: usize) -> Self {
    self.xy_point_length = n;
    self
  }

  pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
    self.seed = Some(seed.into());
    self
  }

  pub fn with_max_call_depth(mut self, n: usize) -> Self {
    self.max_call_depth = n;
    self
  }

  pub fn validate(&self) -> Result<(), ErrorMessage> {
    let check = |name: &str, n: usize| {
      if n == 0 {
        Err(ErrorMessage::argument(format!("{} must be positive", name)))
      } else {
        Ok(())
      }
    };
    check("sampleCount", self.sample_count)?;
    check("xyPointLength", self.xy_point_length)?;
    check("maxCallDepth", self.max_call_depth)
  }

  /// Deterministic when a seed is set.
  pub fn rng(&self) -> StdRng {
    match &self.seed {
      Some(seed) => {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
      }
      None => StdRng::from_entropy(),
    }
  }

  pub fn from_json(json: &str) -> Result<Self, ErrorMessage> {
    let env: Environment = serde_json::from_str(json)
      .map_err(|e| ErrorMessage::argument(format!("invalid environment: {}", e)))?;
    env.validate()?;
    Ok(env)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::Rng;

  #[test]
  fn json_fills_missing_keys_with_defaults() {
    let env = Environment::from_json(r#"{"sampleCount": 50, "seed": "abc"}"#).unwrap();
    assert_eq!(env.sample_count, 50);
    assert_eq!(env.xy_point_length, 1000);
    assert_eq!(env.seed.as_deref(), Some("abc"));
  }

  #[test]
  fn zero_counts_are_rejected() {
    assert!(Environment::default().with_sample_count(0).validate().is_err());
    assert!(Environment::from_json(r#"{"xyPointLength": 0}"#).is_err());
  }

  #[test]
  fn seeded_rngs_repeat() {
    let env = Environment::default().with_seed("s");
    let a: f64 = env.rng().gen();
    let b: f64 = env.rng().gen();
    assert_eq!(a, b);
  }
}
