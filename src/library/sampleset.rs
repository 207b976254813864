use super::{dist, lambda, number, number_list, numbers};
use crate::dist::{GenericDist, SampleSetDist};
use crate::error::{Error, ErrorMessage};
use crate::reducer::Context;
use crate::registry::{FnEntry, FrType, RegistryBuilder};
use crate::value::{Lambda, Value};

const NS: &str = "SampleSet";

fn sample_set(v: &Value) -> Result<&SampleSetDist, ErrorMessage> {
  match v.as_dist() {
    Some(GenericDist::SampleSet(s)) => Ok(s),
    _ => Err(ErrorMessage::Type(format!("expected a sample set, got {}", v.type_name()))),
  }
}

fn call_for_number(f: &Lambda, args: Vec<Value>, ctx: &mut Context) -> Result<f64, Error> {
  let v = ctx.call(f, args, None)?;
  v.as_number().ok_or_else(|| {
    ErrorMessage::Type(format!("{} must return a Number, got {}", f.name(), v.type_name())).into()
  })
}

pub fn register(b: &mut RegistryBuilder) {
  b.add(
    FnEntry::new(NS, "fromDist")
      .describe("Draws the environment's sample count from a distribution.")
      .def(vec![FrType::Dist], |args, ctx| {
        Ok(Value::dist(dist(&args[0])?.to_sample_set(&ctx.env, &mut ctx.rng)?))
      }),
  );
  b.add(FnEntry::new(NS, "fromList").def(vec![FrType::array(FrType::Number)], |args, _| {
    Ok(Value::dist(SampleSetDist::new(numbers(&args[0])?)?))
  }));
  b.add(FnEntry::new(NS, "toList").def(vec![FrType::SampleSet], |args, _| {
    Ok(number_list(sample_set(&args[0])?.samples().iter().copied()))
  }));
  b.add(
    FnEntry::new(NS, "fromFn")
      .describe("Calls a function once per sample, passing the sample index when it takes one.")
      .def(vec![FrType::Lambda], |args, ctx| {
        let f = lambda(&args[0])?.clone();
        let takes_index = !f.parameter_names().is_empty();
        let samples = (0..ctx.env.sample_count)
          .map(|i| {
            let args = if takes_index { vec![Value::Number(i as f64)] } else { vec![] };
            call_for_number(&f, args, ctx)
          })
          .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::dist(SampleSetDist::new(samples)?))
      }),
  );
  b.add(
    FnEntry::new(NS, "map").def(vec![FrType::SampleSet, FrType::Lambda], |args, ctx| {
      let set = sample_set(&args[0])?.clone();
      let f = lambda(&args[1])?.clone();
      let mapped = set.try_map(|x| call_for_number(&f, vec![Value::Number(x)], ctx))?;
      Ok(Value::dist(SampleSetDist::new(mapped)?))
    }),
  );
  b.add(FnEntry::new(NS, "mean").def(vec![FrType::SampleSet], |args, _| {
    Ok(Value::Number(sample_set(&args[0])?.mean()))
  }));
  b.add(FnEntry::new(NS, "percentile").def(vec![FrType::SampleSet, FrType::Number], |args, _| {
    Ok(Value::Number(sample_set(&args[0])?.percentile(number(&args[1])?)))
  }));
}

#[cfg(test)]
mod tests {
  use crate::env::Environment;
  use crate::evaluate;
  use crate::value::Value;
  use approx::assert_relative_eq;

  fn eval(src: &str) -> Value {
    let env = Environment::default().with_seed("samples").with_sample_count(200);
    evaluate(src, &env).unwrap().result
  }

  #[test]
  fn from_fn_passes_the_index() {
    let v = eval("SampleSet.toList(SampleSet.fromFn({|i| i * 2}))");
    let xs = v.as_array().map(|xs| xs.len()).unwrap_or(0);
    assert_eq!(xs, 200);
    assert_eq!(eval("SampleSet.mean(SampleSet.fromFn({|i| i}))"), Value::Number(99.5));
  }

  #[test]
  fn paired_samples_cancel() {
    let v = eval("s = SampleSet.fromDist(normal(5, 2))\nstdev(s - s)");
    assert_eq!(v, Value::Number(0.0));
  }

  #[test]
  fn map_applies_a_function_to_every_sample() {
    let v = eval("s = SampleSet.fromList([1, 2, 3])\nSampleSet.toList(SampleSet.map(s, {|x| x * 10}))");
    assert_eq!(v.to_string(), "[10, 20, 30]");
  }

  #[test]
  fn from_dist_mean_is_close() {
    let v = eval("mean(SampleSet.fromDist(normal(10, 1)))");
    assert_relative_eq!(v.as_number().unwrap_or(0.0), 10.0, epsilon = 0.3);
  }
}
