use super::{array, boolean, lambda, list_length, number, optional, string, strings};
use crate::error::{Error, ErrorMessage};
use crate::reducer::Context;
use crate::registry::{FnEntry, FrType, RegistryBuilder};
use crate::value::{Lambda, Value};

const NS: &str = "List";

fn list() -> FrType {
  FrType::array(FrType::Any)
}

fn integer(x: f64, what: &str) -> Result<i64, ErrorMessage> {
  if x.fract() == 0.0 && x.is_finite() {
    Ok(x as i64)
  } else {
    Err(ErrorMessage::argument(format!("{} must be an integer, got {}", what, x)))
  }
}

/// Calls `f` with the element, and with its index too when `f` takes two parameters.
fn call_with_index(f: &Lambda, x: &Value, i: usize, ctx: &mut Context) -> Result<Value, Error> {
  let args = if f.parameter_names().len() == 2 {
    vec![x.clone(), Value::Number(i as f64)]
  } else {
    vec![x.clone()]
  };
  ctx.call(f, args, None)
}

fn non_empty<'a>(xs: &'a [Value], what: &str) -> Result<&'a [Value], ErrorMessage> {
  if xs.is_empty() {
    Err(ErrorMessage::argument(format!("{} of an empty list", what)))
  } else {
    Ok(xs)
  }
}

pub fn register(b: &mut RegistryBuilder) {
  b.add(
    FnEntry::new(NS, "upTo")
      .describe("Integers from low to high, both included.")
      .def(vec![FrType::Number, FrType::Number], |args, _| {
        let low = integer(number(&args[0])?, "low")?;
        let high = integer(number(&args[1])?, "high")?;
        list_length(high as i128 - low as i128 + 1, "range length")?;
        Ok(Value::array((low..=high).map(|i| Value::Number(i as f64)).collect()))
      }),
  );
  b.add(
    FnEntry::new(NS, "make")
      .def(vec![FrType::Number, FrType::Lambda], |args, ctx| {
        let n = list_length(integer(number(&args[0])?, "length")?.into(), "length")?;
        let f = lambda(&args[1])?.clone();
        let takes_index = !f.parameter_names().is_empty();
        let xs = (0..n)
          .map(|i| {
            let args = if takes_index { vec![Value::Number(i as f64)] } else { vec![] };
            ctx.call(&f, args, None)
          })
          .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::array(xs))
      })
      .def(vec![FrType::Number, FrType::Any], |args, _| {
        let n = list_length(integer(number(&args[0])?, "length")?.into(), "length")?;
        Ok(Value::array(vec![args[1].clone(); n]))
      }),
  );
  b.add(FnEntry::new(NS, "length").def(vec![list()], |args, _| {
    Ok(Value::Number(array(&args[0])?.len() as f64))
  }));
  b.add(FnEntry::new(NS, "map").def(vec![list(), FrType::Lambda], |args, ctx| {
    let f = lambda(&args[1])?.clone();
    let xs = array(&args[0])?
      .iter()
      .enumerate()
      .map(|(i, x)| call_with_index(&f, x, i, ctx))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::array(xs))
  }));
  b.add(FnEntry::new(NS, "filter").def(vec![list(), FrType::Lambda], |args, ctx| {
    let f = lambda(&args[1])?.clone();
    let mut kept = Vec::new();
    for x in array(&args[0])? {
      if boolean(&ctx.call(&f, vec![x.clone()], None)?)? {
        kept.push(x.clone());
      }
    }
    Ok(Value::array(kept))
  }));
  b.add(
    FnEntry::new(NS, "reduce")
      .describe("Folds from the left: f(acc, x).")
      .def(vec![list(), FrType::Any, FrType::Lambda], |args, ctx| {
        let f = lambda(&args[2])?.clone();
        let mut acc = args[1].clone();
        for x in array(&args[0])? {
          acc = ctx.call(&f, vec![acc, x.clone()], None)?;
        }
        Ok(acc)
      }),
  );
  b.add(FnEntry::new(NS, "reverse").def(vec![list()], |args, _| {
    Ok(Value::array(array(&args[0])?.iter().rev().cloned().collect()))
  }));
  b.add(FnEntry::new(NS, "first").def(vec![list()], |args, _| {
    Ok(non_empty(array(&args[0])?, "first")?[0].clone())
  }));
  b.add(FnEntry::new(NS, "last").def(vec![list()], |args, _| {
    let xs = non_empty(array(&args[0])?, "last")?;
    Ok(xs[xs.len() - 1].clone())
  }));
  b.add(FnEntry::new(NS, "concat").def(vec![list(), list()], |args, _| {
    let mut xs = array(&args[0])?.to_vec();
    xs.extend_from_slice(array(&args[1])?);
    Ok(Value::array(xs))
  }));
  b.add(FnEntry::new(NS, "append").def(vec![list(), FrType::Any], |args, _| {
    let mut xs = array(&args[0])?.to_vec();
    xs.push(args[1].clone());
    Ok(Value::array(xs))
  }));
  b.add(FnEntry::new(NS, "flatten").def(vec![FrType::array(list())], |args, _| {
    let mut out = Vec::new();
    for xs in array(&args[0])? {
      out.extend_from_slice(array(xs)?);
    }
    Ok(Value::array(out))
  }));
  b.add(
    FnEntry::new(NS, "uniq")
      .describe("Keeps the first occurrence of each value.")
      .def(vec![list()], |args, _| {
        let mut out: Vec<Value> = Vec::new();
        for x in array(&args[0])? {
          if !out.contains(x) {
            out.push(x.clone());
          }
        }
        Ok(Value::array(out))
      }),
  );
  b.add(
    FnEntry::new(NS, "join").def(
      vec![FrType::array(FrType::String), FrType::optional(FrType::String)],
      |args, _| {
        let separator = optional(&args[1], string)?.unwrap_or(",");
        Ok(Value::string(strings(&args[0])?.join(separator)))
      },
    ),
  );
  b.add(
    FnEntry::new(NS, "sortBy")
      .describe("Stable sort by a numeric key.")
      .def(vec![list(), FrType::Lambda], |args, ctx| {
        let f = lambda(&args[1])?.clone();
        let mut keyed = array(&args[0])?
          .iter()
          .map(|x| -> Result<(f64, Value), Error> {
            let key = ctx.call(&f, vec![x.clone()], None)?;
            Ok((number(&key)?, x.clone()))
          })
          .collect::<Result<Vec<_>, _>>()?;
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Value::array(keyed.into_iter().map(|(_, x)| x).collect()))
      }),
  );
}

#[cfg(test)]
mod tests {
  use crate::env::Environment;
  use crate::error::ErrorMessage;
  use crate::evaluate;

  fn show(src: &str) -> String {
    evaluate(src, &Environment::default()).unwrap().result.to_string()
  }

  #[test]
  fn up_to_is_inclusive() {
    assert_eq!(show("List.upTo(1, 5)"), "[1, 2, 3, 4, 5]");
    assert_eq!(show("List.upTo(3, 1)"), "[]");
  }

  #[test]
  fn oversized_lists_are_argument_errors() {
    let env = Environment::default();
    for src in ["List.upTo(0, 1e10)", "List.make(1e12, 0)", "List.make(1e7, {|i| i})"] {
      let err = evaluate(src, &env).unwrap_err();
      assert!(matches!(err.message, ErrorMessage::Argument(_)), "{}: {}", src, err);
    }
    assert_eq!(show("List.length(List.make(1000, 1))"), "1000");
  }

  #[test]
  fn higher_order_functions() {
    assert_eq!(show("List.map([1, 2, 3], {|x| x * x})"), "[1, 4, 9]");
    assert_eq!(show("List.map([5, 5], {|x, i| x + i})"), "[5, 6]");
    assert_eq!(show("List.filter(List.upTo(1, 6), {|x| x > 3})"), "[4, 5, 6]");
    assert_eq!(show("List.reduce([1, 2, 3], 10, {|acc, x| acc + x})"), "16");
    assert_eq!(show("List.sortBy([3, 1, 2], {|x| -x})"), "[3, 2, 1]");
  }

  #[test]
  fn structural_helpers() {
    assert_eq!(show("List.flatten([[1], [2, 3], []])"), "[1, 2, 3]");
    assert_eq!(show("List.uniq([1, 2, 1, 3, 2])"), "[1, 2, 3]");
    assert_eq!(show("List.join([\"a\", \"b\"], \"-\")"), "\"a-b\"");
    assert_eq!(show("List.make(3, {|i| i * 2})"), "[0, 2, 4]");
    assert_eq!(show("[1, 2] -> List.append(3)"), "[1, 2, 3]");
  }

  #[test]
  fn first_of_empty_list_fails() {
    let err = evaluate("List.first([])", &Environment::default()).unwrap_err();
    assert!(matches!(err.message, ErrorMessage::Argument(_)));
  }
}
