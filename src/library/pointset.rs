use super::{array, dist, number, optional};
use crate::dist::{
  build_mixed, ContinuousShape, DiscreteShape, DistError, MassAssumption, MixedAssumptions, PointSetDist,
  XYShape,
};
use crate::error::{Error, ErrorMessage};
use crate::registry::{FnEntry, FrType, RegistryBuilder};
use crate::value::Value;

const NS: &str = "PointSet";

fn xy_point() -> FrType {
  FrType::record(vec![("x", FrType::Number), ("y", FrType::Number)])
}

fn shape(v: &Value) -> Result<XYShape, Error> {
  let points = array(v)?
    .iter()
    .map(|p| -> Result<(f64, f64), ErrorMessage> {
      let d = super::dict(p)?;
      let get = |k: &str| {
        d.get(k)
          .ok_or_else(|| ErrorMessage::argument(format!("point is missing {}", k)))
          .and_then(number)
      };
      Ok((get("x")?, get("y")?))
    })
    .collect::<Result<Vec<_>, _>>()?;
  Ok(XYShape::from_points(points)?)
}

pub fn register(b: &mut RegistryBuilder) {
  b.add(
    FnEntry::new(NS, "fromDist")
      .describe("Converts a distribution to a density on the environment's point count.")
      .def(vec![FrType::Dist], |args, ctx| {
        Ok(Value::dist(dist(&args[0])?.to_point_set(&ctx.env)?))
      }),
  );
  b.add(FnEntry::new(NS, "makeContinuous").def(vec![FrType::array(xy_point())], |args, _| {
    let c = ContinuousShape::new(shape(&args[0])?);
    Ok(Value::dist(PointSetDist::from_parts(c, DiscreteShape::empty())))
  }));
  b.add(FnEntry::new(NS, "makeDiscrete").def(vec![FrType::array(xy_point())], |args, _| {
    let d = DiscreteShape::new(shape(&args[0])?);
    Ok(Value::dist(PointSetDist::from_parts(ContinuousShape::empty(), d)))
  }));
  b.add(
    FnEntry::new(NS, "makeMixed")
      .describe(
        "Mixes a density and point masses. With discreteProbabilityMass both parts are \
         normalized and weighted by it; without it the point masses are taken as true probabilities.",
      )
      .def(
        vec![FrType::record(vec![
          ("continuous", FrType::array(xy_point())),
          ("discrete", FrType::array(xy_point())),
          ("discreteProbabilityMass", FrType::optional(FrType::Number)),
        ])],
        |args, _| {
          let spec = super::dict(&args[0])?;
          let part = |k: &str| spec.get(k).cloned().unwrap_or(Value::Void);
          let continuous = ContinuousShape::new(shape(&part("continuous"))?);
          let discrete = DiscreteShape::new(shape(&part("discrete"))?);
          let mass = optional(&part("discreteProbabilityMass"), number)?;
          let assumptions = MixedAssumptions {
            continuous: MassAssumption::AddsTo1,
            discrete: if mass.is_some() {
              MassAssumption::AddsTo1
            } else {
              MassAssumption::AddsToCorrectProbability
            },
            discrete_probability_mass: mass,
          };
          let mixed = build_mixed(&continuous, &discrete, assumptions)
            .ok_or_else(|| DistError::invalid("the parts do not form a consistent mixed distribution"))?;
          Ok(Value::dist(PointSetDist::Mixed(mixed)))
        },
      ),
  );
}

#[cfg(test)]
mod tests {
  use crate::env::Environment;
  use crate::evaluate;
  use approx::assert_relative_eq;

  fn number(src: &str) -> f64 {
    evaluate(src, &Environment::default()).unwrap().result.as_number().unwrap_or(f64::NAN)
  }

  #[test]
  fn discrete_points_have_exact_moments() {
    let src = "d = PointSet.makeDiscrete([{x: 1, y: 0.25}, {x: 3, y: 0.75}])\nmean(d)";
    assert_relative_eq!(number(src), 2.5);
  }

  #[test]
  fn mixed_from_true_probabilities() {
    let src = "m = PointSet.makeMixed({
      continuous: [{x: 0, y: 0}, {x: 1, y: 2}, {x: 2, y: 0}],
      discrete: [{x: 10, y: 0.5}]
    })
    mean(m)";
    assert_relative_eq!(number(src), 5.5, epsilon = 1e-9);
  }

  #[test]
  fn out_of_range_mass_is_rejected() {
    let src = "PointSet.makeMixed({continuous: [{x: 0, y: 1}, {x: 1, y: 1}], discrete: [{x: 5, y: 1}], discreteProbabilityMass: 2})";
    assert!(evaluate(src, &Environment::default()).is_err());
  }
}
