use super::numbers;
use crate::error::ErrorMessage;
use crate::registry::{FnEntry, FrType, RegistryBuilder};
use crate::value::Value;

const NS: &str = "Number";

fn reduction(b: &mut RegistryBuilder, name: &str, f: fn(&[f64]) -> Option<f64>) {
  let empty = format!("{}.{} of an empty list", NS, name);
  b.add(FnEntry::new(NS, name).def(vec![FrType::array(FrType::Number)], move |args, _| {
    let xs = numbers(&args[0])?;
    f(&xs)
      .map(Value::Number)
      .ok_or_else(|| ErrorMessage::argument(empty.clone()).into())
  }));
}

pub fn register(b: &mut RegistryBuilder) {
  reduction(b, "sum", |xs| Some(xs.iter().sum()));
  reduction(b, "product", |xs| Some(xs.iter().product()));
  reduction(b, "mean", |xs| {
    if xs.is_empty() {
      None
    } else {
      Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
  });
  reduction(b, "min", |xs| xs.iter().copied().reduce(f64::min));
  reduction(b, "max", |xs| xs.iter().copied().reduce(f64::max));
}

#[cfg(test)]
mod tests {
  use crate::env::Environment;
  use crate::evaluate;
  use crate::value::Value;

  fn eval(src: &str) -> Result<Value, crate::Error> {
    evaluate(src, &Environment::default()).map(|out| out.result)
  }

  #[test]
  fn reductions() {
    assert_eq!(eval("Number.sum([1, 2, 3])").unwrap(), Value::Number(6.0));
    assert_eq!(eval("Number.product([])").unwrap(), Value::Number(1.0));
    assert_eq!(eval("Number.mean([1, 2, 3, 6])").unwrap(), Value::Number(3.0));
    assert_eq!(eval("Number.max([4, -1, 9])").unwrap(), Value::Number(9.0));
    assert!(eval("Number.min([])").is_err());
  }
}
