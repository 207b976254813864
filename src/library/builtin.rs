//! Operators and unqualified helpers.

use super::{array, boolean, date_ms, duration_ms, number, optional, string};
use crate::dist::{AlgebraicOp, AlgebraicStrategy, GenericDist, PointwiseOp, SymbolicDist};
use crate::error::{Error, ErrorMessage};
use crate::reducer::Context;
use crate::registry::{FnEntry, FrType, RegistryBuilder, BUILTIN_NAMESPACE};
use crate::value::Value;
use std::cmp::Ordering;
use tracing::info;

fn builtin(name: &str) -> FnEntry {
  FnEntry::new(BUILTIN_NAMESPACE, name)
}

/// Arithmetic where at least one side is a distribution.
fn algebraic(op: AlgebraicOp, a: &Value, b: &Value, ctx: &mut Context) -> Result<Value, Error> {
  let result = match (a.untagged(), b.untagged()) {
    (Value::Dist(x), Value::Dist(y)) => {
      GenericDist::algebraic_combination(op, x, y, AlgebraicStrategy::Auto, &ctx.env, &mut ctx.rng)?
    }
    (Value::Dist(x), Value::Number(k)) => GenericDist::scalar_combination(op, x, *k, false, &ctx.env, &mut ctx.rng)?,
    (Value::Number(k), Value::Dist(y)) => GenericDist::scalar_combination(op, y, *k, true, &ctx.env, &mut ctx.rng)?,
    (a, b) => {
      return Err(
        ErrorMessage::argument(format!("cannot {} a {} and a {}", op.name(), a.type_name(), b.type_name())).into(),
      )
    }
  };
  Ok(Value::Dist(result))
}

fn arithmetic(b: &mut RegistryBuilder, name: &str, op: AlgebraicOp) {
  b.add(
    builtin(name)
      .def(vec![FrType::Number, FrType::Number], move |args, _| {
        Ok(Value::Number(op.apply(number(&args[0])?, number(&args[1])?)))
      })
      .def(vec![FrType::DistOrNumber, FrType::DistOrNumber], move |args, ctx| {
        algebraic(op, &args[0], &args[1], ctx)
      }),
  );
}

fn pointwise(b: &mut RegistryBuilder, name: &str, op: PointwiseOp) {
  b.add(
    builtin(name)
      .def(vec![FrType::Number, FrType::Number], move |args, _| {
        Ok(Value::Number(op.apply(number(&args[0])?, number(&args[1])?)))
      })
      .def(vec![FrType::Dist, FrType::Dist], move |args, ctx| {
        let (x, y) = (super::dist(&args[0])?, super::dist(&args[1])?);
        Ok(Value::Dist(GenericDist::pointwise_combination(op, &x, &y, &ctx.env)?))
      }),
  );
}

fn ordering(a: &Value, b: &Value) -> Result<Option<Ordering>, ErrorMessage> {
  Ok(match (a.untagged(), b.untagged()) {
    (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
    (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
    (Value::Date(x), Value::Date(y)) | (Value::Duration(x), Value::Duration(y)) => x.partial_cmp(y),
    (a, b) => {
      return Err(ErrorMessage::argument(format!(
        "cannot compare a {} with a {}",
        a.type_name(),
        b.type_name()
      )))
    }
  })
}

fn comparison(b: &mut RegistryBuilder, name: &str, accept: fn(Ordering) -> bool) {
  let comparable = FrType::Union(vec![FrType::Number, FrType::String, FrType::Date, FrType::Duration]);
  b.add(builtin(name).def(vec![comparable.clone(), comparable], move |args, _| {
    Ok(Value::Bool(ordering(&args[0], &args[1])?.map_or(false, accept)))
  }));
}

fn math(b: &mut RegistryBuilder, name: &str, f: fn(f64) -> f64) {
  b.add(builtin(name).def(vec![FrType::Number], move |args, _| Ok(Value::Number(f(number(&args[0])?)))));
}

/// `f(d)` as the scalar combination `op` with a constant.
fn dist_math(b: &mut RegistryBuilder, name: &str, op: AlgebraicOp, k: f64, scalar_first: bool) {
  b.add(builtin(name).def(vec![FrType::Dist], move |args, ctx| {
    let d = super::dist(&args[0])?;
    Ok(Value::Dist(GenericDist::scalar_combination(
      op,
      &d,
      k,
      scalar_first,
      &ctx.env,
      &mut ctx.rng,
    )?))
  }));
}

pub fn register(b: &mut RegistryBuilder) {
  arithmetic(b, "add", AlgebraicOp::Add);
  arithmetic(b, "subtract", AlgebraicOp::Subtract);
  arithmetic(b, "multiply", AlgebraicOp::Multiply);
  arithmetic(b, "divide", AlgebraicOp::Divide);
  arithmetic(b, "pow", AlgebraicOp::Power);

  b.add(
    builtin("add")
      .def(vec![FrType::String, FrType::String], |args, _| {
        Ok(Value::string(format!("{}{}", string(&args[0])?, string(&args[1])?)))
      })
      .def(vec![FrType::Date, FrType::Duration], |args, _| {
        Ok(Value::Date(date_ms(&args[0])? + duration_ms(&args[1])?))
      })
      .def(vec![FrType::Duration, FrType::Date], |args, _| {
        Ok(Value::Date(duration_ms(&args[0])? + date_ms(&args[1])?))
      })
      .def(vec![FrType::Duration, FrType::Duration], |args, _| {
        Ok(Value::Duration(duration_ms(&args[0])? + duration_ms(&args[1])?))
      }),
  );
  b.add(
    builtin("subtract")
      .def(vec![FrType::Date, FrType::Date], |args, _| {
        Ok(Value::Duration(date_ms(&args[0])? - date_ms(&args[1])?))
      })
      .def(vec![FrType::Date, FrType::Duration], |args, _| {
        Ok(Value::Date(date_ms(&args[0])? - duration_ms(&args[1])?))
      })
      .def(vec![FrType::Duration, FrType::Duration], |args, _| {
        Ok(Value::Duration(duration_ms(&args[0])? - duration_ms(&args[1])?))
      }),
  );
  b.add(
    builtin("multiply")
      .def(vec![FrType::Duration, FrType::Number], |args, _| {
        Ok(Value::Duration(duration_ms(&args[0])? * number(&args[1])?))
      })
      .def(vec![FrType::Number, FrType::Duration], |args, _| {
        Ok(Value::Duration(number(&args[0])? * duration_ms(&args[1])?))
      }),
  );
  b.add(
    builtin("divide")
      .def(vec![FrType::Duration, FrType::Number], |args, _| {
        Ok(Value::Duration(duration_ms(&args[0])? / number(&args[1])?))
      })
      .def(vec![FrType::Duration, FrType::Duration], |args, _| {
        Ok(Value::Number(duration_ms(&args[0])? / duration_ms(&args[1])?))
      }),
  );

  pointwise(b, "dotAdd", PointwiseOp::Add);
  pointwise(b, "dotSubtract", PointwiseOp::Subtract);
  pointwise(b, "dotMultiply", PointwiseOp::Multiply);
  pointwise(b, "dotDivide", PointwiseOp::Divide);
  pointwise(b, "dotPow", PointwiseOp::Power);
  b.add(builtin("dotMultiply").def(vec![FrType::Dist, FrType::Number], |args, ctx| {
    let d = super::dist(&args[0])?;
    Ok(Value::Dist(d.scale_density(number(&args[1])?, &ctx.env)?))
  }));
  b.add(builtin("dotDivide").def(vec![FrType::Dist, FrType::Number], |args, ctx| {
    let d = super::dist(&args[0])?;
    Ok(Value::Dist(d.scale_density(1.0 / number(&args[1])?, &ctx.env)?))
  }));

  b.add(builtin("equal").def(vec![FrType::Any, FrType::Any], |args, _| Ok(Value::Bool(args[0] == args[1]))));
  b.add(builtin("unequal").def(vec![FrType::Any, FrType::Any], |args, _| Ok(Value::Bool(args[0] != args[1]))));
  comparison(b, "smaller", |o| o == Ordering::Less);
  comparison(b, "smallerEq", |o| o != Ordering::Greater);
  comparison(b, "larger", |o| o == Ordering::Greater);
  comparison(b, "largerEq", |o| o != Ordering::Less);

  b.add(
    builtin("unaryMinus")
      .def(vec![FrType::Number], |args, _| Ok(Value::Number(-number(&args[0])?)))
      .def(vec![FrType::Duration], |args, _| Ok(Value::Duration(-duration_ms(&args[0])?)))
      .def(vec![FrType::Dist], |args, ctx| {
        algebraic(AlgebraicOp::Multiply, &args[0], &Value::Number(-1.0), ctx)
      }),
  );
  b.add(builtin("not").def(vec![FrType::Bool], |args, _| Ok(Value::Bool(!boolean(&args[0])?))));

  b.add(
    builtin("to")
      .describe("A distribution with 90% of its mass between the bounds; lognormal when both are positive.")
      .def(vec![FrType::Number, FrType::Number], |args, _| {
        Ok(Value::dist(SymbolicDist::from_to(number(&args[0])?, number(&args[1])?)?))
      }),
  );

  b.add(builtin("typeOf").def(vec![FrType::Any], |args, _| Ok(Value::string(args[0].type_name()))));
  b.add(
    builtin("inspect")
      .describe("Logs a value and returns it unchanged.")
      .def(vec![FrType::Any, FrType::optional(FrType::String)], |args, _| {
        match optional(&args[1], string)? {
          Some(label) => info!(label, value = %args[0], "inspect"),
          None => info!(value = %args[0], "inspect"),
        }
        Ok(args[0].clone())
      }),
  );
  b.add(builtin("throw").def(vec![FrType::optional(FrType::String)], |args, _| {
    let message = optional(&args[0], string)?.unwrap_or("Common error");
    Err(ErrorMessage::User(message.to_string()).into())
  }));
  b.add(
    builtin("concat")
      .def(vec![FrType::String, FrType::String], |args, _| {
        Ok(Value::string(format!("{}{}", string(&args[0])?, string(&args[1])?)))
      })
      .def(vec![FrType::array(FrType::Any), FrType::array(FrType::Any)], |args, _| {
        let mut xs = array(&args[0])?.to_vec();
        xs.extend_from_slice(array(&args[1])?);
        Ok(Value::array(xs))
      }),
  );

  math(b, "exp", f64::exp);
  math(b, "log", f64::ln);
  math(b, "log10", f64::log10);
  math(b, "sqrt", f64::sqrt);
  math(b, "abs", f64::abs);
  math(b, "floor", f64::floor);
  math(b, "ceil", f64::ceil);
  math(b, "round", f64::round);
  dist_math(b, "exp", AlgebraicOp::Power, std::f64::consts::E, true);
  dist_math(b, "log", AlgebraicOp::Logarithm, std::f64::consts::E, false);
  dist_math(b, "log10", AlgebraicOp::Logarithm, 10.0, false);
  dist_math(b, "sqrt", AlgebraicOp::Power, 0.5, false);
  b.add(builtin("log").def(vec![FrType::Number, FrType::Number], |args, _| {
    Ok(Value::Number(AlgebraicOp::Logarithm.apply(number(&args[0])?, number(&args[1])?)))
  }));
  b.add(builtin("min").def(vec![FrType::Number, FrType::Number], |args, _| {
    Ok(Value::Number(number(&args[0])?.min(number(&args[1])?)))
  }));
  b.add(builtin("max").def(vec![FrType::Number, FrType::Number], |args, _| {
    Ok(Value::Number(number(&args[0])?.max(number(&args[1])?)))
  }));
}

#[cfg(test)]
mod tests {
  use crate::env::Environment;
  use crate::error::ErrorMessage;
  use crate::value::Value;
  use crate::{evaluate, GenericDist};
  use approx::assert_relative_eq;

  fn eval(src: &str) -> Value {
    evaluate(src, &Environment::default().with_seed("builtin")).unwrap().result
  }

  #[test]
  fn number_arithmetic_and_precedence() {
    assert_eq!(eval("1 + 2 * 3 ^ 2"), Value::Number(19.0));
    assert_eq!(eval("-2 ^ 2"), Value::Number(4.0));
    assert_eq!(eval("(10 - 4) / 4"), Value::Number(1.5));
  }

  #[test]
  fn normal_sum_is_closed_form() {
    match eval("normal(1, 3) + normal(2, 4)") {
      Value::Dist(GenericDist::Symbolic(d)) => {
        assert_relative_eq!(d.mean().unwrap(), 3.0);
        assert_relative_eq!(d.variance().unwrap(), 25.0, epsilon = 1e-9);
      }
      other => panic!("expected a symbolic dist, got {}", other),
    }
  }

  #[test]
  fn comparisons_and_equality() {
    assert_eq!(eval("2 <= 2 && \"a\" < \"b\" && [1, 2] == [1, 2]"), Value::Bool(true));
    let err = evaluate("1 < \"a\"", &Environment::default()).unwrap_err();
    assert!(matches!(err.message, ErrorMessage::Argument(_)));
  }

  #[test]
  fn throw_is_a_user_error() {
    let err = evaluate("throw(\"nope\")", &Environment::default()).unwrap_err();
    assert_eq!(err.message, ErrorMessage::User("nope".into()));
  }

  #[test]
  fn dates_and_durations_mix() {
    let v = eval("Date.make(2020, 1, 1) + Duration.fromDays(31)");
    assert_eq!(v.to_string(), "2020-02-01");
    assert_eq!(eval("Duration.toHours(Duration.fromMinutes(90) * 2)"), Value::Number(3.0));
  }

  #[test]
  fn type_of_names_the_variant() {
    assert_eq!(eval("typeOf(2 to 5)"), Value::string("Distribution"));
    assert_eq!(eval("typeOf({})"), Value::string("Dict"));
  }
}
