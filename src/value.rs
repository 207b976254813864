//! Runtime values of the language.

use crate::dist::{GenericDist, PointSetDist};
use crate::lang::{LambdaDef, Location, Var};
use crate::library::date::{format_date, format_duration};
use crate::path::PathItem;
use crate::registry::FnEntry;
use crate::tags::ValueTags;
use indexmap::IndexMap;
use pretty::RcDoc;
use serde_json::json;
use std::fmt;
use std::rc::Rc;

/// A persistent scope. Extending it never affects earlier copies.
pub type Bindings = im::HashMap<Var, Value>;

pub struct UserLambda {
  pub name: Option<String>,
  pub def: Rc<LambdaDef>,
  pub captured: Bindings,
  pub location: Location,
}

#[derive(Clone)]
pub enum Lambda {
  User(Rc<UserLambda>),
  Builtin(Rc<FnEntry>),
}

impl Lambda {
  pub fn name(&self) -> String {
    match self {
      Lambda::User(l) => l.name.clone().unwrap_or_else(|| "<anonymous>".to_string()),
      Lambda::Builtin(entry) => entry.qualified_name(),
    }
  }

  /// Parameter names for user lambdas, the first signature for builtins.
  pub fn parameter_names(&self) -> Vec<String> {
    match self {
      Lambda::User(l) => l.def.params.iter().map(|p| p.name()).collect(),
      Lambda::Builtin(entry) => entry
        .definitions
        .first()
        .map(|d| d.inputs.iter().map(|t| t.to_string()).collect())
        .unwrap_or_default(),
    }
  }

  fn ptr_eq(&self, other: &Lambda) -> bool {
    match (self, other) {
      (Lambda::User(a), Lambda::User(b)) => Rc::ptr_eq(a, b),
      (Lambda::Builtin(a), Lambda::Builtin(b)) => Rc::ptr_eq(a, b),
      _ => false,
    }
  }
}

impl fmt::Debug for Lambda {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "Lambda({}({}))", self.name(), self.parameter_names().join(", "))
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleMethod {
  Linear,
  Log,
  Symlog { constant: f64 },
  Power { exponent: f64 },
  Date,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
  pub method: ScaleMethod,
  pub min: Option<f64>,
  pub max: Option<f64>,
  pub tick_format: Option<String>,
  pub title: Option<String>,
}

impl Scale {
  pub fn method_name(&self) -> &'static str {
    match self.method {
      ScaleMethod::Linear => "linear",
      ScaleMethod::Log => "log",
      ScaleMethod::Symlog { .. } => "symlog",
      ScaleMethod::Power { .. } => "power",
      ScaleMethod::Date => "date",
    }
  }
}

#[derive(Debug, Clone)]
pub enum Value {
  Number(f64),
  String(String),
  Bool(bool),
  Array(Rc<Vec<Value>>),
  Dict(Rc<IndexMap<String, Value>>),
  Lambda(Lambda),
  Dist(GenericDist),
  /// Milliseconds since the Unix epoch.
  Date(f64),
  /// Milliseconds.
  Duration(f64),
  Scale(Rc<Scale>),
  Void,
  Tagged(Rc<Value>, Rc<ValueTags>),
}

impl PartialEq for Value {
  /// Tags never take part in equality.
  fn eq(&self, other: &Value) -> bool {
    use Value::*;
    match (self.untagged(), other.untagged()) {
      (Number(a), Number(b)) => a == b,
      (String(a), String(b)) => a == b,
      (Bool(a), Bool(b)) => a == b,
      (Array(a), Array(b)) => a == b,
      (Dict(a), Dict(b)) => a == b,
      (Lambda(a), Lambda(b)) => a.ptr_eq(b),
      (Dist(a), Dist(b)) => a == b,
      (Date(a), Date(b)) | (Duration(a), Duration(b)) => a == b,
      (Scale(a), Scale(b)) => a == b,
      (Void, Void) => true,
      _ => false,
    }
  }
}

/// Integers print without a fractional part; very large or small magnitudes
/// use exponent notation.
pub fn format_number(x: f64) -> String {
  if x.is_nan() {
    "NaN".to_string()
  } else if x.is_infinite() {
    if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
  } else if x == 0.0 {
    "0".to_string()
  } else if x.fract() == 0.0 && x.abs() < 1e15 {
    format!("{:.0}", x)
  } else if x.abs() >= 1e15 || x.abs() < 1e-5 {
    format!("{:e}", x)
  } else {
    format!("{}", x)
  }
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn json_number(x: f64) -> serde_json::Value {
  serde_json::Number::from_f64(x)
    .map(serde_json::Value::Number)
    .unwrap_or_else(|| serde_json::Value::String(format_number(x)))
}

fn dist_to_json(d: &GenericDist) -> serde_json::Value {
  match d {
    GenericDist::Symbolic(s) => {
      let params: serde_json::Map<String, serde_json::Value> = s
        .params()
        .into_iter()
        .map(|(k, v)| (k.to_string(), json_number(v)))
        .collect();
      json!({
        "type": "distribution",
        "representation": "Symbolic",
        "family": s.family(),
        "parameters": params,
      })
    }
    GenericDist::SampleSet(s) => json!({
      "type": "distribution",
      "representation": "SampleSet",
      "samples": s.samples().iter().map(|x| json_number(*x)).collect::<Vec<_>>(),
    }),
    GenericDist::PointSet(p) => {
      let (c, d) = p.raw_parts();
      let xy = |xs: &[f64], ys: &[f64]| {
        json!({
          "xs": xs.iter().map(|x| json_number(*x)).collect::<Vec<_>>(),
          "ys": ys.iter().map(|y| json_number(*y)).collect::<Vec<_>>(),
        })
      };
      let mut out = json!({
        "type": "distribution",
        "representation": "PointSet",
        "kind": p.kind(),
        "continuous": xy(c.xy().xs(), c.xy().ys()),
        "discrete": xy(d.xy().xs(), d.xy().ys()),
      });
      if let PointSetDist::Mixed(m) = p {
        out["discreteProbabilityMass"] = json_number(m.discrete_probability_mass());
      }
      out
    }
  }
}

impl Value {
  pub fn number(x: f64) -> Value {
    Value::Number(x)
  }

  pub fn string(s: impl Into<String>) -> Value {
    Value::String(s.into())
  }

  pub fn array(xs: Vec<Value>) -> Value {
    Value::Array(Rc::new(xs))
  }

  /// Later entries replace earlier ones with the same key.
  pub fn dict(entries: Vec<(String, Value)>) -> Value {
    Value::Dict(Rc::new(entries.into_iter().collect()))
  }

  pub fn from_map(map: IndexMap<String, Value>) -> Value {
    Value::Dict(Rc::new(map))
  }

  pub fn dist(d: impl Into<GenericDist>) -> Value {
    Value::Dist(d.into())
  }

  pub fn untagged(&self) -> &Value {
    match self {
      Value::Tagged(v, _) => v.untagged(),
      v => v,
    }
  }

  pub fn tags(&self) -> Option<&ValueTags> {
    match self {
      Value::Tagged(_, tags) => Some(tags),
      _ => None,
    }
  }

  /// Merges `tags` over any tags already present.
  pub fn with_tags(&self, tags: ValueTags) -> Value {
    let merged = match self.tags() {
      Some(existing) => existing.merge(&tags),
      None => tags,
    };
    let inner = self.untagged().clone();
    if merged.is_empty() {
      inner
    } else {
      Value::Tagged(Rc::new(inner), Rc::new(merged))
    }
  }

  /// Replaces all tags.
  pub fn set_tags(&self, tags: ValueTags) -> Value {
    self.untagged().clone().with_tags(tags)
  }

  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Tagged(v, _) => v.type_name(),
      Value::Number(_) => "Number",
      Value::String(_) => "String",
      Value::Bool(_) => "Bool",
      Value::Array(_) => "List",
      Value::Dict(_) => "Dict",
      Value::Lambda(_) => "Lambda",
      Value::Dist(_) => "Distribution",
      Value::Date(_) => "Date",
      Value::Duration(_) => "Duration",
      Value::Scale(_) => "Scale",
      Value::Void => "Void",
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self.untagged() {
      Value::Number(x) => Some(*x),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self.untagged() {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self.untagged() {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_array(&self) -> Option<&[Value]> {
    match self.untagged() {
      Value::Array(xs) => Some(xs),
      _ => None,
    }
  }

  pub fn as_dict(&self) -> Option<&IndexMap<String, Value>> {
    match self.untagged() {
      Value::Dict(d) => Some(d),
      _ => None,
    }
  }

  pub fn as_dist(&self) -> Option<&GenericDist> {
    match self.untagged() {
      Value::Dist(d) => Some(d),
      _ => None,
    }
  }

  pub fn as_lambda(&self) -> Option<&Lambda> {
    match self.untagged() {
      Value::Lambda(l) => Some(l),
      _ => None,
    }
  }

  pub fn is_void(&self) -> bool {
    matches!(self.untagged(), Value::Void)
  }

  /// Follows keys and indices into records and lists.
  pub fn subvalue_by_path(&self, path: &[PathItem]) -> Option<Value> {
    let mut current = self.clone();
    for item in path {
      let next = match (current.untagged(), item) {
        (Value::Dict(d), PathItem::Key(k)) => d.get(k).cloned(),
        (Value::Array(xs), PathItem::Index(i)) => xs.get(*i).cloned(),
        _ => None,
      }?;
      current = next;
    }
    Some(current)
  }

  /// Host-native export.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Value::Tagged(v, _) => v.to_json(),
      Value::Number(x) => json_number(*x),
      Value::String(s) => json!(s),
      Value::Bool(b) => json!(b),
      Value::Array(xs) => serde_json::Value::Array(xs.iter().map(Value::to_json).collect()),
      Value::Dict(d) => serde_json::Value::Object(d.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
      Value::Lambda(l) => json!({
        "type": "lambda",
        "name": l.name(),
        "parameters": l.parameter_names(),
      }),
      Value::Dist(d) => dist_to_json(d),
      Value::Date(ms) => json!({ "type": "date", "value": json_number(*ms) }),
      Value::Duration(ms) => json!({ "type": "duration", "value": json_number(*ms) }),
      Value::Scale(s) => json!({
        "type": "scale",
        "method": s.method_name(),
        "min": s.min.map(json_number),
        "max": s.max.map(json_number),
        "tickFormat": s.tick_format,
        "title": s.title,
      }),
      Value::Void => serde_json::Value::Null,
    }
  }

  pub fn to_doc(&self) -> RcDoc<'static, ()> {
    fn bracketed(open: &'static str, items: Vec<RcDoc<'static, ()>>, close: &'static str) -> RcDoc<'static, ()> {
      if items.is_empty() {
        return RcDoc::text(open).append(close);
      }
      RcDoc::text(open)
        .append(
          RcDoc::line_()
            .append(RcDoc::intersperse(items, RcDoc::text(",").append(RcDoc::line())))
            .nest(2),
        )
        .append(RcDoc::line_())
        .append(close)
        .group()
    }

    match self {
      Value::Tagged(v, _) => v.to_doc(),
      Value::Number(x) => RcDoc::text(format_number(*x)),
      Value::String(s) => RcDoc::text(format!("{:?}", s)),
      Value::Bool(b) => RcDoc::text(b.to_string()),
      Value::Array(xs) => bracketed("[", xs.iter().map(Value::to_doc).collect(), "]"),
      Value::Dict(d) => bracketed(
        "{",
        d.iter()
          .map(|(k, v)| {
            let key = if is_identifier(k) { k.clone() } else { format!("{:?}", k) };
            RcDoc::text(key).append(": ").append(v.to_doc())
          })
          .collect(),
        "}",
      ),
      Value::Lambda(Lambda::User(l)) => RcDoc::text(format!(
        "lambda({})=>internal code",
        l.def.params.iter().map(|p| p.name()).collect::<Vec<_>>().join(",")
      )),
      Value::Lambda(Lambda::Builtin(entry)) => RcDoc::text(format!("Builtin({})", entry.qualified_name())),
      Value::Dist(d) => RcDoc::text(d.to_string()),
      Value::Date(ms) => RcDoc::text(format_date(*ms)),
      Value::Duration(ms) => RcDoc::text(format_duration(*ms)),
      Value::Scale(s) => {
        let mut parts = Vec::new();
        if let Some(min) = s.min {
          parts.push(format!("min={}", format_number(min)));
        }
        if let Some(max) = s.max {
          parts.push(format!("max={}", format_number(max)));
        }
        match s.method {
          ScaleMethod::Symlog { constant } => parts.push(format!("constant={}", format_number(constant))),
          ScaleMethod::Power { exponent } => parts.push(format!("exponent={}", format_number(exponent))),
          _ => {}
        }
        RcDoc::text(format!("{} scale({})", s.method_name(), parts.join(", ")))
      }
      Value::Void => RcDoc::text("()"),
    }
  }

  pub fn to_pretty(&self, width: usize) -> String {
    let mut out = String::new();
    match self.to_doc().render_fmt(width, &mut out) {
      Ok(()) => out,
      Err(_) => format!("<{}>", self.type_name()),
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    self.to_doc().render_fmt(80, f)
  }
}

impl From<f64> for Value {
  fn from(x: f64) -> Self {
    Value::Number(x)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<GenericDist> for Value {
  fn from(d: GenericDist) -> Self {
    Value::Dist(d)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dist::SymbolicDist;

  fn sample() -> Value {
    Value::dict(vec![
      ("x".to_string(), Value::number(5.0)),
      (
        "y".to_string(),
        Value::array(vec![
          Value::number(3.0),
          Value::string("foo"),
          Value::dict(vec![(
            "dist".to_string(),
            Value::dist(SymbolicDist::normal(5.0, 2.0).unwrap()),
          )]),
        ]),
      ),
    ])
  }

  #[test]
  fn numbers_format_compactly() {
    assert_eq!(format_number(5.0), "5");
    assert_eq!(format_number(-0.25), "-0.25");
    assert_eq!(format_number(1e20), "1e20");
    assert_eq!(format_number(f64::INFINITY), "Infinity");
  }

  #[test]
  fn displays_nested_values() {
    assert_eq!(sample().to_string(), r#"{x: 5, y: [3, "foo", {dist: Normal(5,2)}]}"#);
  }

  #[test]
  fn narrow_layout_breaks_lines() {
    let v = Value::array((0..3).map(|i| Value::number(i as f64)).collect());
    assert_eq!(v.to_pretty(4), "[\n  0,\n  1,\n  2\n]");
  }

  #[test]
  fn path_lookup_descends() {
    let v = sample();
    let path = vec![PathItem::Key("y".into()), PathItem::Index(1)];
    assert_eq!(v.subvalue_by_path(&path), Some(Value::string("foo")));
    assert_eq!(v.subvalue_by_path(&[PathItem::Key("z".into())]), None);
  }

  #[test]
  fn tags_do_not_affect_equality() {
    let tagged = Value::number(1.0).with_tags(ValueTags {
      name: Some("one".into()),
      ..Default::default()
    });
    assert_eq!(tagged, Value::number(1.0));
    assert_eq!(tagged.tags().and_then(|t| t.name.clone()).as_deref(), Some("one"));
  }

  #[test]
  fn exports_json() {
    let json = sample().to_json();
    assert_eq!(json["x"], json!(5.0));
    assert_eq!(json["y"][2]["dist"]["family"], json!("Normal"));
  }
}
