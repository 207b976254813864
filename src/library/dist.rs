use super::{array, dist, list_length, number, number_list, numbers, optional, string};
use crate::dist::{self as engine, AlgebraicOp, AlgebraicStrategy, DistError, GenericDist, SymbolicDist};
use crate::error::{Error, ErrorMessage};
use crate::reducer::Context;
use crate::registry::{FnEntry, FrType, RegistryBuilder};
use crate::value::Value;

const NS: &str = "Dist";

fn entry(name: &str) -> FnEntry {
  FnEntry::new(NS, name).unqualified()
}

fn symbolic(d: engine::Result<SymbolicDist>) -> Result<Value, Error> {
  Ok(Value::dist(d?))
}

fn field(v: &Value, key: &str) -> Result<f64, ErrorMessage> {
  super::dict(v)?
    .get(key)
    .ok_or_else(|| ErrorMessage::argument(format!("missing field {}", key)))
    .and_then(number)
}

fn ci() -> FrType {
  FrType::record(vec![("p5", FrType::Number), ("p95", FrType::Number)])
}

fn mean_stdev() -> FrType {
  FrType::record(vec![("mean", FrType::Number), ("stdev", FrType::Number)])
}

fn two_params(b: &mut RegistryBuilder, name: &str, description: &str, f: fn(f64, f64) -> engine::Result<SymbolicDist>) {
  b.add(
    entry(name)
      .describe(description)
      .def(vec![FrType::Number, FrType::Number], move |args, _| {
        symbolic(f(number(&args[0])?, number(&args[1])?))
      }),
  );
}

fn one_param(b: &mut RegistryBuilder, name: &str, f: fn(f64) -> engine::Result<SymbolicDist>) {
  b.add(entry(name).def(vec![FrType::Number], move |args, _| symbolic(f(number(&args[0])?))));
}

fn non_negative_integer(x: f64, what: &str) -> Result<usize, ErrorMessage> {
  if x >= 0.0 && x.fract() == 0.0 {
    Ok(x as usize)
  } else {
    Err(ErrorMessage::argument(format!("{} must be a non-negative integer, got {}", what, x)))
  }
}

fn mix(dists: Vec<GenericDist>, weights: Option<Vec<f64>>, ctx: &mut Context) -> Result<Value, Error> {
  let weights = match weights {
    Some(ws) if ws.len() != dists.len() => {
      return Err(
        DistError::Mixture(format!(
          "got {} weights for {} distributions",
          ws.len(),
          dists.len()
        ))
        .into(),
      )
    }
    Some(ws) => ws,
    None => vec![1.0; dists.len()],
  };
  let items: Vec<(GenericDist, f64)> = dists.into_iter().zip(weights).collect();
  Ok(Value::Dist(GenericDist::mixture(&items, &ctx.env, &mut ctx.rng)?))
}

fn dists(v: &Value) -> Result<Vec<GenericDist>, ErrorMessage> {
  array(v)?.iter().map(dist).collect()
}

fn statistic(b: &mut RegistryBuilder, name: &str, f: fn(&GenericDist, &Context) -> engine::Result<f64>) {
  b.add(entry(name).def(vec![FrType::Dist], move |args, ctx| {
    Ok(Value::Number(f(&dist(&args[0])?, ctx)?))
  }));
}

fn at_point(b: &mut RegistryBuilder, name: &str, f: fn(&GenericDist, f64, &Context) -> engine::Result<f64>) {
  b.add(entry(name).def(vec![FrType::Dist, FrType::Number], move |args, ctx| {
    Ok(Value::Number(f(&dist(&args[0])?, number(&args[1])?, ctx)?))
  }));
}

fn truncation(b: &mut RegistryBuilder, name: &str, inputs: Vec<FrType>, bounds: fn(&[Value]) -> Result<(Option<f64>, Option<f64>), ErrorMessage>) {
  b.add(entry(name).def(inputs, move |args, ctx| {
    let (low, high) = bounds(args)?;
    Ok(Value::Dist(dist(&args[0])?.truncate(low, high, &ctx.env)?))
  }));
}

pub fn register(b: &mut RegistryBuilder) {
  two_params(b, "normal", "Normal distribution from a mean and standard deviation.", SymbolicDist::normal);
  b.add(
    entry("normal")
      .def(vec![ci()], |args, _| symbolic(SymbolicDist::normal_from_ci(field(&args[0], "p5")?, field(&args[0], "p95")?)))
      .def(vec![mean_stdev()], |args, _| {
        symbolic(SymbolicDist::normal(field(&args[0], "mean")?, field(&args[0], "stdev")?))
      }),
  );
  two_params(b, "lognormal", "Lognormal distribution from mu and sigma of the underlying normal.", SymbolicDist::lognormal);
  b.add(
    entry("lognormal")
      .def(vec![ci()], |args, _| {
        symbolic(SymbolicDist::lognormal_from_ci(field(&args[0], "p5")?, field(&args[0], "p95")?))
      })
      .def(vec![mean_stdev()], |args, _| {
        symbolic(SymbolicDist::lognormal_from_mean_stdev(field(&args[0], "mean")?, field(&args[0], "stdev")?))
      }),
  );
  two_params(b, "uniform", "Uniform distribution between low and high.", SymbolicDist::uniform);
  two_params(b, "beta", "Beta distribution from alpha and beta.", SymbolicDist::beta);
  b.add(entry("beta").def(vec![mean_stdev()], |args, _| {
    symbolic(SymbolicDist::beta_from_mean_stdev(field(&args[0], "mean")?, field(&args[0], "stdev")?))
  }));
  two_params(b, "cauchy", "Cauchy distribution from location and scale.", SymbolicDist::cauchy);
  two_params(b, "gamma", "Gamma distribution from shape and scale.", SymbolicDist::gamma);
  two_params(b, "logistic", "Logistic distribution from location and scale.", SymbolicDist::logistic);
  one_param(b, "exponential", SymbolicDist::exponential);
  one_param(b, "pointMass", SymbolicDist::point_mass);
  one_param(b, "bernoulli", SymbolicDist::bernoulli);
  b.add(
    entry("triangular").def(vec![FrType::Number, FrType::Number, FrType::Number], |args, _| {
      symbolic(SymbolicDist::triangular(number(&args[0])?, number(&args[1])?, number(&args[2])?))
    }),
  );

  for name in ["mixture", "mx"] {
    let weights = FrType::optional(FrType::array(FrType::Number));
    b.add(
      entry(name)
        .describe("Weighted mixture; weights default to equal.")
        .def(vec![FrType::array(FrType::DistOrNumber), weights.clone()], |args, ctx| {
          mix(dists(&args[0])?, optional(&args[1], numbers)?, ctx)
        })
        .def(vec![FrType::DistOrNumber, FrType::DistOrNumber, weights.clone()], |args, ctx| {
          mix(vec![dist(&args[0])?, dist(&args[1])?], optional(&args[2], numbers)?, ctx)
        })
        .def(
          vec![FrType::DistOrNumber, FrType::DistOrNumber, FrType::DistOrNumber, weights],
          |args, ctx| {
            let ds = vec![dist(&args[0])?, dist(&args[1])?, dist(&args[2])?];
            mix(ds, optional(&args[3], numbers)?, ctx)
          },
        ),
    );
  }

  statistic(b, "mean", |d, _| d.mean());
  statistic(b, "stdev", |d, _| d.stdev());
  statistic(b, "variance", |d, _| d.variance());
  statistic(b, "mode", |d, ctx| d.mode(&ctx.env));
  statistic(b, "median", |d, _| d.median());
  statistic(b, "integralSum", |d, _| Ok(d.integral_sum()));
  at_point(b, "inv", |d, p, _| d.inv(p));
  at_point(b, "quantile", |d, p, _| d.inv(p));
  at_point(b, "cdf", |d, x, _| d.cdf(x));
  at_point(b, "pdf", |d, x, ctx| d.pdf(x, &ctx.env));

  b.add(entry("sample").def(vec![FrType::Dist], |args, ctx| {
    Ok(Value::Number(dist(&args[0])?.sample(&mut ctx.rng)?))
  }));
  b.add(entry("sampleN").def(vec![FrType::Dist, FrType::Number], |args, ctx| {
    let n = non_negative_integer(number(&args[1])?, "sample count")?;
    let n = list_length(n as i128, "sample count")?;
    Ok(number_list(dist(&args[0])?.sample_n(n, &mut ctx.rng)?))
  }));
  b.add(entry("normalize").def(vec![FrType::Dist], |args, _| {
    Ok(Value::Dist(dist(&args[0])?.normalize()?))
  }));
  b.add(entry("isNormalized").def(vec![FrType::Dist], |args, _| {
    Ok(Value::Bool(dist(&args[0])?.is_normalized()))
  }));
  truncation(b, "truncate", vec![FrType::Dist, FrType::Number, FrType::Number], |args| {
    Ok((Some(number(&args[1])?), Some(number(&args[2])?)))
  });
  truncation(b, "truncateLeft", vec![FrType::Dist, FrType::Number], |args| {
    Ok((Some(number(&args[1])?), None))
  });
  truncation(b, "truncateRight", vec![FrType::Dist, FrType::Number], |args| {
    Ok((None, Some(number(&args[1])?)))
  });

  b.add(FnEntry::new(NS, "sum").def(vec![FrType::array(FrType::DistOrNumber)], |args, ctx| {
    Ok(Value::Dist(GenericDist::sum(&dists(&args[0])?, &ctx.env, &mut ctx.rng)?))
  }));
  b.add(FnEntry::new(NS, "product").def(vec![FrType::array(FrType::DistOrNumber)], |args, ctx| {
    Ok(Value::Dist(GenericDist::product(&dists(&args[0])?, &ctx.env, &mut ctx.rng)?))
  }));
  b.add(
    FnEntry::new(NS, "combineAlgebraically")
      .describe("Combines two distributions with an operation name and an optional strategy.")
      .def(
        vec![
          FrType::DistOrNumber,
          FrType::DistOrNumber,
          FrType::String,
          FrType::optional(FrType::String),
        ],
        |args, ctx| {
          let op_name = string(&args[2])?;
          let op = AlgebraicOp::from_name(op_name)
            .ok_or_else(|| ErrorMessage::argument(format!("unknown operation {:?}", op_name)))?;
          let strategy = match optional(&args[3], string)? {
            Some(name) => AlgebraicStrategy::from_name(name)
              .ok_or_else(|| ErrorMessage::argument(format!("unknown strategy {:?}", name)))?,
            None => AlgebraicStrategy::default(),
          };
          let (x, y) = (dist(&args[0])?, dist(&args[1])?);
          Ok(Value::Dist(GenericDist::algebraic_combination(
            op,
            &x,
            &y,
            strategy,
            &ctx.env,
            &mut ctx.rng,
          )?))
        },
      ),
  );
}

#[cfg(test)]
mod tests {
  use crate::env::Environment;
  use crate::error::ErrorMessage;
  use crate::value::Value;
  use crate::evaluate;
  use approx::assert_relative_eq;

  fn number(src: &str) -> f64 {
    let out = evaluate(src, &Environment::default().with_seed("dist-lib")).unwrap();
    out.result.as_number().unwrap()
  }

  #[test]
  fn sample_counts_are_capped() {
    let env = Environment::default().with_seed("dist-lib");
    let err = evaluate("sampleN(normal(0, 1), 1e12)", &env).unwrap_err();
    assert!(matches!(err.message, ErrorMessage::Argument(_)), "{}", err);
    assert_relative_eq!(number("List.length(sampleN(normal(0, 1), 20))"), 20.0);
  }

  #[test]
  fn constructors_accept_records() {
    assert_relative_eq!(number("mean(normal({p5: 0, p95: 10}))"), 5.0, epsilon = 1e-9);
    assert_relative_eq!(number("stdev(normal({mean: 3, stdev: 2}))"), 2.0, epsilon = 1e-9);
    assert_relative_eq!(number("Dist.mean(uniform(0, 4))"), 2.0);
  }

  #[test]
  fn mixture_median_leans_to_the_heavier_side() {
    let m = number("inv(mx(normal(0, 1), normal(10, 1), [0.8, 0.2]), 0.5)");
    assert!(m > 0.0 && m < 5.0, "{}", m);
  }

  #[test]
  fn mismatched_weights_are_rejected() {
    let err = evaluate("mx([normal(0, 1), 3], [1])", &Environment::default()).unwrap_err();
    assert!(matches!(err.message, ErrorMessage::Dist(_)));
  }

  #[test]
  fn quantiles_outside_unit_interval_are_domain_errors() {
    let err = evaluate("inv(normal(0, 1), 1.5)", &Environment::default()).unwrap_err();
    assert!(err.message.is_domain());
  }

  #[test]
  fn sample_n_returns_a_list() {
    let out = evaluate("sampleN(uniform(0, 1), 4)", &Environment::default().with_seed("n")).unwrap();
    let xs = out.result.as_array().map(|xs| xs.to_vec()).unwrap_or_default();
    assert_eq!(xs.len(), 4);
    assert!(xs.iter().all(|x| matches!(x, Value::Number(v) if (0.0..=1.0).contains(v))));
  }

  #[test]
  fn combine_algebraically_by_convolution() {
    let src = "Dist.mean(Dist.combineAlgebraically(normal(1, 1), normal(2, 1), \"add\", \"convolution\"))";
    let env = Environment::default().with_xy_point_length(400);
    let out = evaluate(src, &env).unwrap();
    assert_relative_eq!(out.result.as_number().unwrap(), 3.0, epsilon = 0.1);
  }
}
