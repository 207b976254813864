use super::{date_ms, number, optional, string};
use crate::error::{Error, ErrorMessage};
use crate::registry::{FnEntry, FrType, RegistryBuilder};
use crate::value::{Scale, ScaleMethod, Value};
use indexmap::IndexMap;
use std::rc::Rc;

const NS: &str = "Scale";

fn params(extra: Option<&str>, bound: FrType) -> FrType {
  let mut fields = vec![
    ("min", FrType::optional(bound.clone())),
    ("max", FrType::optional(bound)),
    ("tickFormat", FrType::optional(FrType::String)),
    ("title", FrType::optional(FrType::String)),
  ];
  if let Some(name) = extra {
    fields.push((name, FrType::optional(FrType::Number)));
  }
  FrType::optional(FrType::record(fields))
}

fn field<'a>(d: Option<&'a IndexMap<String, Value>>, key: &str) -> &'a Value {
  const VOID: &Value = &Value::Void;
  d.and_then(|d| d.get(key)).unwrap_or(VOID)
}

fn bound(v: &Value) -> Result<f64, ErrorMessage> {
  match v.untagged() {
    Value::Date(_) => date_ms(v),
    _ => number(v),
  }
}

/// Reads the shared fields and checks the bounds every scale needs.
fn build(method: ScaleMethod, arg: &Value) -> Result<Value, Error> {
  let d = arg.as_dict();
  let min = optional(field(d, "min"), bound)?;
  let max = optional(field(d, "max"), bound)?;
  if let (Some(lo), Some(hi)) = (min, max) {
    if lo > hi {
      return Err(ErrorMessage::domain(format!("scale min {} is greater than max {}", lo, hi)).into());
    }
  }
  if method == ScaleMethod::Log {
    if let Some(lo) = min {
      if lo <= 0.0 {
        return Err(ErrorMessage::domain(format!("log scale min must be positive, got {}", lo)).into());
      }
    }
  }
  Ok(Value::Scale(Rc::new(Scale {
    method,
    min,
    max,
    tick_format: optional(field(d, "tickFormat"), string)?.map(str::to_owned),
    title: optional(field(d, "title"), string)?.map(str::to_owned),
  })))
}

fn positive_param(arg: &Value, key: &str, default: f64) -> Result<f64, ErrorMessage> {
  let x = optional(field(arg.as_dict(), key), number)?.unwrap_or(default);
  if x > 0.0 {
    Ok(x)
  } else {
    Err(ErrorMessage::domain(format!("scale {} must be positive, got {}", key, x)))
  }
}

pub fn register(b: &mut RegistryBuilder) {
  b.add(
    FnEntry::new(NS, "linear")
      .def(vec![params(None, FrType::Number)], |args, _| build(ScaleMethod::Linear, &args[0])),
  );
  b.add(
    FnEntry::new(NS, "log")
      .describe("Logarithmic axis; min must be positive.")
      .def(vec![params(None, FrType::Number)], |args, _| build(ScaleMethod::Log, &args[0])),
  );
  b.add(
    FnEntry::new(NS, "symlog")
      .describe("Symmetric log axis, linear within `constant` of zero.")
      .def(vec![params(Some("constant"), FrType::Number)], |args, _| {
        let constant = positive_param(&args[0], "constant", 1.0)?;
        build(ScaleMethod::Symlog { constant }, &args[0])
      }),
  );
  b.add(
    FnEntry::new(NS, "power").def(vec![params(Some("exponent"), FrType::Number)], |args, _| {
      let exponent = positive_param(&args[0], "exponent", 0.1)?;
      build(ScaleMethod::Power { exponent }, &args[0])
    }),
  );
  b.add(
    FnEntry::new(NS, "date").def(vec![params(None, FrType::Union(vec![FrType::Date, FrType::Number]))], |args, _| {
      build(ScaleMethod::Date, &args[0])
    }),
  );
}

#[cfg(test)]
mod tests {
  use crate::env::Environment;
  use crate::evaluate;
  use crate::value::{ScaleMethod, Value};

  fn eval(src: &str) -> Result<Value, crate::Error> {
    evaluate(src, &Environment::default()).map(|out| out.result)
  }

  #[test]
  fn log_scale_needs_a_positive_min() {
    let err = eval("Scale.log({min: -5})").unwrap_err();
    assert!(err.message.is_domain());
    assert!(eval("Scale.log({min: 1, max: 100})").is_ok());
  }

  #[test]
  fn bounds_must_be_ordered() {
    assert!(eval("Scale.linear({min: 5, max: 1})").unwrap_err().message.is_domain());
    assert!(eval("Scale.symlog({constant: 0})").unwrap_err().message.is_domain());
  }

  #[test]
  fn options_are_optional() {
    match eval("Scale.power()").unwrap() {
      Value::Scale(s) => assert_eq!(s.method, ScaleMethod::Power { exponent: 0.1 }),
      other => panic!("expected a scale, got {}", other),
    }
    assert_eq!(eval("Scale.linear({min: 0, title: \"t\"})").unwrap().to_string(), "linear scale(min=0)");
  }
}
